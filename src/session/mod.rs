//! Sessions: the logical conversation over one transport.

use std::sync::{Arc, Weak};

use crate::error::Result;
use crate::message::{Message, SessionId};
use crate::transport::{ResponseFuture, Transport};

pub mod manager;
pub mod properties;

pub use properties::PropertySet;

/// A messaging session.
///
/// Sessions are created by the [`manager::SessionManager`], always handled
/// as `Arc<Session>`, and own their transport exclusively; the transport
/// keeps only a weak back-reference to its session.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    transport: Box<dyn Transport>,
    properties: PropertySet,
}

impl Session {
    /// Binds the transport to a fresh session and starts it.
    pub(crate) fn spawn(id: SessionId, transport: Box<dyn Transport>) -> Arc<Session> {
        let session = Arc::new_cyclic(|weak: &Weak<Session>| {
            transport.attach(id, weak.clone());
            Session {
                id,
                transport,
                properties: PropertySet::new(),
            }
        });
        session.transport.start();
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Fire-and-forget enqueue. Errors when the transport is not started.
    pub fn send(&self, msg: Message) -> Result<()> {
        self.transport.send(msg)
    }

    /// Non-blocking poll of the incoming queue.
    pub fn receive(&self) -> Option<Message> {
        self.transport.receive()
    }

    /// Sends `msg` and returns a future for the correlated reply.
    ///
    /// The replier must echo this message's id in a `srcMsgId` field; the
    /// future fails with [`crate::Error::RequestExpired`] if no reply
    /// arrives within the expiry window.
    pub fn request(&self, msg: Message) -> Result<ResponseFuture> {
        self.transport.request(msg)
    }

    /// Moves the transport toward `Stopped`; does not wait for a drain.
    pub fn shutdown(&self) {
        self.transport.stop();
    }

    /// True while the owned transport is `StartPending` or `Started`.
    pub fn active(&self) -> bool {
        self.transport.state().is_active()
    }

    /// Application-defined tags for this session.
    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }
}
