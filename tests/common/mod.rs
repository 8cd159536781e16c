//! Shared test doubles for the integration suites.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use msglink::{
    Error, Message, ResponseFuture, Result, ServiceState, Session, SessionId, Transport,
    TransportListener,
};

/// In-memory transport double: records what is sent, hands out queued
/// messages, and lets tests drive the lifecycle state directly.
#[derive(Clone)]
pub struct FakeTransport {
    inner: Arc<FakeInner>,
}

struct FakeInner {
    state: Mutex<ServiceState>,
    sent: Mutex<Vec<Message>>,
    incoming: Mutex<VecDeque<Message>>,
    fail_sends: AtomicBool,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FakeInner {
                state: Mutex::new(ServiceState::Stopped),
                sent: Mutex::new(Vec::new()),
                incoming: Mutex::new(VecDeque::new()),
                fail_sends: AtomicBool::new(false),
            }),
        }
    }

    /// Messages the session under test has sent so far.
    pub fn sent(&self) -> Vec<Message> {
        self.inner.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.inner.sent.lock().len()
    }

    /// Queues a message the session will observe via `receive`.
    pub fn push_incoming(&self, msg: Message) {
        self.inner.incoming.lock().push_back(msg);
    }

    /// Forces the lifecycle state, bypassing start/stop.
    pub fn force_state(&self, state: ServiceState) {
        *self.inner.state.lock() = state;
    }

    /// Makes every subsequent send fail while leaving the state active.
    pub fn fail_sends(&self, fail: bool) {
        self.inner.fail_sends.store(fail, Ordering::Relaxed);
    }
}

impl Transport for FakeTransport {
    fn attach(&self, _session_id: SessionId, _owner: Weak<Session>) {}

    fn start(&self) {
        *self.inner.state.lock() = ServiceState::Started;
    }

    fn stop(&self) {
        *self.inner.state.lock() = ServiceState::Stopped;
    }

    fn state(&self) -> ServiceState {
        *self.inner.state.lock()
    }

    fn send(&self, msg: Message) -> Result<()> {
        let state = self.state();
        if !state.is_active() {
            return Err(Error::TransportNotStarted(state));
        }
        if self.inner.fail_sends.load(Ordering::Relaxed) {
            return Err(Error::TransportStopped);
        }
        self.inner.sent.lock().push(msg);
        Ok(())
    }

    fn receive(&self) -> Option<Message> {
        self.inner.incoming.lock().pop_front()
    }

    fn request(&self, msg: Message) -> Result<ResponseFuture> {
        self.send(msg)?;
        // The double never answers; the future reports a stopped transport.
        let (_tx, rx) = oneshot::channel();
        Ok(ResponseFuture::new(rx))
    }

    fn remove_expired_requests(&self) {}

    fn add_listener(&self, _listener: Arc<dyn TransportListener>) {}
}

impl std::fmt::Debug for FakeTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeTransport")
            .field("state", &self.state())
            .field("sent", &self.sent_count())
            .finish()
    }
}
