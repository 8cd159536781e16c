//! Transport abstraction: the connection-side endcap of the messaging
//! stack, plus the framed TCP implementation and the factory registry.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::message::{Message, SessionId};
use crate::service::ServiceState;
use crate::session::Session;

pub mod framed;
pub mod registry;
pub mod tcp;

pub use framed::{FramedTransport, REQUEST_EXPIRY};
pub use registry::{TransportFactory, TransportRegistry};
pub use tcp::TcpTransportFactory;

/// Observer for transport-level events.
pub trait TransportListener: Send + Sync {
    /// The transport moved from one lifecycle state to another.
    fn on_state_changed(&self, from: ServiceState, to: ServiceState);

    /// An I/O fault occurred; the transport is heading for `StopPending`.
    fn on_error_occurred(&self, error: &io::Error);
}

/// A message transport.
///
/// `send` and `receive` are non-blocking queue operations; all actual I/O
/// happens on reactor tasks owned by the implementation. Implementations
/// are driven by their owning [`Session`]: attached and started at session
/// construction, stopped at session shutdown.
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Binds the non-owning back-edge to the session that owns this
    /// transport. Called exactly once, before `start`.
    fn attach(&self, session_id: SessionId, owner: Weak<Session>);

    /// Starts the transport's I/O. State moves through `StartPending` to
    /// `Started`.
    fn start(&self);

    /// Stops the transport: aborts I/O, fails outstanding requests and
    /// settles in `Stopped`.
    fn stop(&self);

    fn state(&self) -> ServiceState;

    /// Queues a message for transmission. Errors when the transport is not
    /// started or the serialized frame cannot fit the length prefix.
    fn send(&self, msg: Message) -> Result<()>;

    /// Next queued incoming message, if any.
    fn receive(&self) -> Option<Message>;

    /// Queues a message and registers it for reply correlation.
    fn request(&self, msg: Message) -> Result<ResponseFuture>;

    /// Expires pending requests older than the library expiry window,
    /// failing their futures with [`Error::RequestExpired`]. A sweeper task
    /// calls this periodically; it is public as an explicit trigger.
    fn remove_expired_requests(&self);

    fn add_listener(&self, listener: std::sync::Arc<dyn TransportListener>);
}

/// Future side of a correlated request.
///
/// Resolves with the reply message, [`Error::RequestExpired`] when the
/// expiry sweep removes the pending entry, or
/// [`Error::TransportStopped`] when the transport stops first.
#[derive(Debug)]
pub struct ResponseFuture {
    rx: oneshot::Receiver<Result<Message>>,
}

impl ResponseFuture {
    /// Wraps the receiving side of a reply channel. Transport
    /// implementations complete the sender with the correlated reply or an
    /// error.
    pub fn new(rx: oneshot::Receiver<Result<Message>>) -> Self {
        Self { rx }
    }
}

impl Future for ResponseFuture {
    type Output = Result<Message>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(Error::TransportStopped)))
    }
}
