//! Length-prefixed framed transport over a TCP stream.
//!
//! Wire format, per frame:
//!
//! ```text
//! Frame := Length (u16, big-endian) || Body
//! Body  := MessageType (u16, big-endian) || FieldSet
//! ```
//!
//! `Length` counts itself, so a frame is `2 + len(body)` bytes and never
//! exceeds 65535. Frames carrying an unregistered message type are dropped
//! and the read loop continues; a stream-level fault transitions the
//! transport to `StopPending` and is not retried here.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::codec::{DecodeContext, EncodeContext};
use crate::error::{Error, Result};
use crate::message::factory::MessageFactory;
use crate::message::queue::MessageQueue;
use crate::message::{Message, MessageId, MessageLength, SessionId};
use crate::service::ServiceState;
use crate::session::Session;
use crate::transport::{ResponseFuture, Transport, TransportListener};
use crate::util::Listeners;

/// Name of the reply field carrying the originating request id. Request
/// correlation happens purely on this field's presence and value.
pub const SRC_MSG_ID_FIELD: &str = "srcMsgId";

/// How long a pending request may wait for its reply before the sweeper
/// fails it with [`Error::RequestExpired`].
pub const REQUEST_EXPIRY: Duration = Duration::from_secs(30);

const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Frame length prefix plus the message type tag.
const FRAME_HEADER_LEN: usize = 2 + 2;

const MAX_FRAME_LEN: usize = MessageLength::MAX as usize;

struct Owner {
    session_id: SessionId,
    session: Weak<Session>,
}

struct PendingRequest {
    reply_tx: oneshot::Sender<Result<Message>>,
    issued_at: Instant,
}

/// The framed stream transport.
///
/// All methods are non-blocking; I/O runs on three tasks spawned onto the
/// runtime handle captured at construction: the read loop, the write loop
/// (a single in-flight write pulling from the outgoing queue, preserving
/// send order) and the request-expiry sweeper.
pub struct FramedTransport {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<ServiceState>,
    handle: Handle,
    factory: Arc<MessageFactory>,
    owner: OnceLock<Owner>,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<(OwnedWriteHalf, mpsc::UnboundedReceiver<Message>)>>,
    outgoing_tx: mpsc::UnboundedSender<Message>,
    incoming: MessageQueue,
    pending: Mutex<HashMap<MessageId, PendingRequest>>,
    listeners: Listeners<dyn TransportListener>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl FramedTransport {
    /// Wraps an established stream. The transport stays `Stopped` until its
    /// owning session starts it.
    pub fn new(stream: TcpStream, handle: Handle, factory: Arc<MessageFactory>) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ServiceState::Stopped),
                handle,
                factory,
                owner: OnceLock::new(),
                reader: Mutex::new(Some(read_half)),
                writer: Mutex::new(Some((write_half, outgoing_rx))),
                outgoing_tx,
                incoming: MessageQueue::new(),
                pending: Mutex::new(HashMap::new()),
                listeners: Listeners::new(),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn probe(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn expire_requests_older_than(&self, max_age: Duration) {
        self.inner.expire_older_than(max_age);
    }
}

impl Transport for FramedTransport {
    fn attach(&self, session_id: SessionId, owner: Weak<Session>) {
        if self
            .inner
            .owner
            .set(Owner {
                session_id,
                session: owner,
            })
            .is_err()
        {
            warn!("transport is already attached to session; ignoring rebind");
        }
    }

    fn start(&self) {
        let inner = &self.inner;
        let Some(reader) = inner.reader.lock().take() else {
            warn!("transport has already been started");
            return;
        };
        let Some((writer, outgoing_rx)) = inner.writer.lock().take() else {
            return;
        };

        inner.set_state(ServiceState::StartPending);
        // Started before the first spawn; a failing read may immediately
        // move the state on to StopPending.
        inner.set_state(ServiceState::Started);

        let tasks = [
            inner.handle.spawn(read_loop(inner.clone(), reader)),
            inner
                .handle
                .spawn(write_loop(inner.clone(), writer, outgoing_rx)),
            inner.handle.spawn(sweep_loop(inner.clone())),
        ];
        inner.tasks.lock().extend(tasks);
    }

    fn stop(&self) {
        let inner = &self.inner;
        if inner.state() == ServiceState::Stopped && inner.tasks.lock().is_empty() {
            return;
        }

        inner.set_state(ServiceState::StopPending);

        for task in inner.tasks.lock().drain(..) {
            task.abort();
        }

        let aborted: Vec<PendingRequest> = inner.pending.lock().drain().map(|(_, p)| p).collect();
        for pending in aborted {
            let _ = pending.reply_tx.send(Err(Error::TransportStopped));
        }
        inner.incoming.clear();

        inner.set_state(ServiceState::Stopped);
    }

    fn state(&self) -> ServiceState {
        self.inner.state()
    }

    fn send(&self, msg: Message) -> Result<()> {
        let state = self.inner.state();
        if !state.is_active() {
            return Err(Error::TransportNotStarted(state));
        }

        // Fail loudly before enqueueing rather than truncating on write.
        let frame_len = FRAME_HEADER_LEN + msg.encoded_size();
        if frame_len > MAX_FRAME_LEN {
            return Err(Error::FrameTooLarge { size: frame_len });
        }

        self.inner
            .outgoing_tx
            .send(msg)
            .map_err(|_| Error::TransportStopped)
    }

    fn receive(&self) -> Option<Message> {
        self.inner.incoming.pull()
    }

    fn request(&self, msg: Message) -> Result<ResponseFuture> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let id = msg.id();
        self.inner.pending.lock().insert(
            id,
            PendingRequest {
                reply_tx,
                issued_at: Instant::now(),
            },
        );

        if let Err(e) = self.send(msg) {
            self.inner.pending.lock().remove(&id);
            return Err(e);
        }
        Ok(ResponseFuture::new(reply_rx))
    }

    fn remove_expired_requests(&self) {
        self.inner.expire_older_than(REQUEST_EXPIRY);
    }

    fn add_listener(&self, listener: Arc<dyn TransportListener>) {
        self.inner.listeners.add(listener);
    }
}

impl std::fmt::Debug for FramedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedTransport")
            .field("state", &self.inner.state())
            .field("pending", &self.inner.pending.lock().len())
            .field("queued", &self.inner.incoming.len())
            .finish()
    }
}

impl Inner {
    fn state(&self) -> ServiceState {
        *self.state.lock()
    }

    fn set_state(&self, to: ServiceState) {
        let from = {
            let mut state = self.state.lock();
            std::mem::replace(&mut *state, to)
        };
        if from != to {
            self.listeners.notify(|l| l.on_state_changed(from, to));
        }
    }

    /// Records an I/O fault: notifies listeners and moves to `StopPending`.
    /// EOF and connection-refused land here as well; they are not retried.
    fn fail_io(&self, error: &std::io::Error) {
        debug!("transport i/o failed: {error}");
        self.listeners.notify(|l| l.on_error_occurred(error));
        self.set_state(ServiceState::StopPending);
    }

    /// Serializes one outgoing message into a frame-sized buffer.
    fn encode_frame(&self, msg: &Message) -> Result<Vec<u8>> {
        let frame_len = FRAME_HEADER_LEN + msg.encoded_size();
        if frame_len > MAX_FRAME_LEN {
            return Err(Error::FrameTooLarge { size: frame_len });
        }

        let mut buf = Vec::with_capacity(frame_len);
        buf.extend_from_slice(&(frame_len as MessageLength).to_be_bytes());
        buf.extend_from_slice(&msg.message_type().to_be_bytes());
        let mut ctx = EncodeContext::binary(&mut buf);
        msg.encode(&mut ctx)?;
        debug_assert_eq!(buf.len(), frame_len);
        Ok(buf)
    }

    /// Handles one complete frame body: decode, correlate, enqueue.
    /// Undecodable frames are logged and dropped; the read loop continues.
    fn on_frame(&self, body: &[u8]) {
        let mut ctx = DecodeContext::binary(body);
        let message_type = match ctx.take_array::<2>() {
            Ok(bytes) => u16::from_be_bytes(bytes),
            Err(_) => {
                warn!("dropping frame too short to carry a message type");
                return;
            }
        };

        if !self.factory.has_descriptor(message_type) {
            debug!("dropping frame with unregistered message type {message_type}");
            return;
        }

        let Some(owner) = self.owner.get() else {
            warn!("received frame on a detached transport; dropping");
            return;
        };
        let Some(session) = owner.session.upgrade() else {
            return;
        };

        let mut msg = match self.factory.create_message(message_type, &session) {
            Ok(msg) => msg,
            Err(e) => {
                debug!("dropping frame of type {message_type}: {e}");
                return;
            }
        };
        if let Err(e) = msg.decode(&mut ctx) {
            warn!("dropping undecodable frame of type {message_type}: {e}");
            return;
        }

        if let Ok(src_msg_id) = msg.get::<MessageId>(SRC_MSG_ID_FIELD) {
            let entry = self.pending.lock().remove(&src_msg_id);
            if let Some(entry) = entry {
                let _ = entry.reply_tx.send(Ok(msg));
                return;
            }
        }

        self.incoming.push(msg);
    }

    fn expire_older_than(&self, max_age: Duration) {
        let now = Instant::now();
        let expired: Vec<(MessageId, PendingRequest)> = {
            let mut pending = self.pending.lock();
            let ids: Vec<MessageId> = pending
                .iter()
                .filter(|(_, p)| now.duration_since(p.issued_at) > max_age)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| pending.remove(&id).map(|p| (id, p)))
                .collect()
        };

        for (id, pending) in expired {
            debug!("request {id} expired without a reply");
            let _ = pending.reply_tx.send(Err(Error::RequestExpired));
        }
    }
}

async fn read_loop(inner: Arc<Inner>, mut reader: OwnedReadHalf) {
    loop {
        let mut len_bytes = [0u8; 2];
        if let Err(e) = reader.read_exact(&mut len_bytes).await {
            inner.fail_io(&e);
            return;
        }
        let frame_len = MessageLength::from_be_bytes(len_bytes) as usize;
        if frame_len < 2 {
            error!("peer sent an impossible frame length {frame_len}; stopping transport");
            inner.set_state(ServiceState::StopPending);
            return;
        }

        let mut body = vec![0u8; frame_len - 2];
        if let Err(e) = reader.read_exact(&mut body).await {
            inner.fail_io(&e);
            return;
        }

        inner.on_frame(&body);
    }
}

async fn write_loop(
    inner: Arc<Inner>,
    mut writer: OwnedWriteHalf,
    mut outgoing: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = outgoing.recv().await {
        let frame = match inner.encode_frame(&msg) {
            Ok(frame) => frame,
            Err(e) => {
                error!("failed to serialize outgoing message {}: {e}", msg.id());
                continue;
            }
        };

        if let Err(e) = writer.write_all(&frame).await {
            inner.fail_io(&e);
            return;
        }
        if let Err(e) = writer.flush().await {
            inner.fail_io(&e);
            return;
        }
        debug!("wrote frame of {} bytes for message {}", frame.len(), msg.id());
    }
}

async fn sweep_loop(inner: Arc<Inner>) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        if !inner.state().is_active() {
            return;
        }
        inner.expire_older_than(REQUEST_EXPIRY);
    }
}
