//! Session manager: owns sessions keyed by id, allocates identifiers and
//! drives session lifecycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::message::SessionId;
use crate::session::Session;
use crate::transport::Transport;
use crate::util::run_callback;

/// Lifecycle notification handler.
pub type SessionHandler = Box<dyn Fn(&Arc<Session>) + Send + Sync>;

/// Owns every live session under a single lock.
#[derive(Default)]
pub struct SessionManager {
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
    next_id: AtomicU64,
    on_session_opened: Mutex<Option<SessionHandler>>,
    on_session_terminating: Mutex<Option<SessionHandler>>,
    on_session_terminated: Mutex<Option<SessionHandler>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn generate_id(&self) -> SessionId {
        // Ids are monotonic and never 0 (the reserved invalid id).
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Wraps the transport in a new session (starting it), stores the
    /// session and fires the opened notification.
    pub fn create_session(&self, transport: Box<dyn Transport>) -> Arc<Session> {
        let mut sessions = self.sessions.lock();

        let session = Session::spawn(self.generate_id(), transport);
        debug!("session {} opened", session.id());
        sessions.insert(session.id(), session.clone());

        if let Some(handler) = self.on_session_opened.lock().as_ref() {
            run_callback("on_session_opened", || handler(&session));
        }

        session
    }

    pub fn has_session(&self, id: SessionId) -> bool {
        self.sessions.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Terminates the session with the given id: notifies, shuts the
    /// transport down, removes the entry, notifies again. Returns whether a
    /// session was found.
    pub fn terminate(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.lock();
        self.terminate_locked(&mut sessions, id)
    }

    /// Terminates every session, tolerating per-session failures.
    pub fn terminate_all(&self) {
        let mut sessions = self.sessions.lock();
        let ids: Vec<SessionId> = sessions.keys().copied().collect();
        for id in ids {
            self.terminate_locked(&mut sessions, id);
        }
    }

    fn terminate_locked(
        &self,
        sessions: &mut HashMap<SessionId, Arc<Session>>,
        id: SessionId,
    ) -> bool {
        let Some(session) = sessions.get(&id).cloned() else {
            return false;
        };

        if let Some(handler) = self.on_session_terminating.lock().as_ref() {
            run_callback("on_session_terminating", || handler(&session));
        }
        run_callback("session shutdown", || session.shutdown());
        sessions.remove(&id);
        debug!("session {id} terminated");
        if let Some(handler) = self.on_session_terminated.lock().as_ref() {
            run_callback("on_session_terminated", || handler(&session));
        }
        true
    }

    /// Runs `action` for every session under the lock.
    pub fn for_each(&self, mut action: impl FnMut(&Arc<Session>)) {
        for session in self.sessions.lock().values() {
            action(session);
        }
    }

    /// First session matching the predicate, if any.
    pub fn find(&self, predicate: impl Fn(&Arc<Session>) -> bool) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .values()
            .find(|s| predicate(s))
            .cloned()
    }

    /// First session whose property `key` holds a `T` equal to `value`.
    pub fn find_by_property<T: PartialEq + 'static>(
        &self,
        key: &str,
        value: &T,
    ) -> Option<Arc<Session>> {
        self.find(|session| session.properties().matches(key, value))
    }

    /// Invoked after a session is stored.
    pub fn set_on_session_opened(&self, handler: impl Fn(&Arc<Session>) + Send + Sync + 'static) {
        *self.on_session_opened.lock() = Some(Box::new(handler));
    }

    /// Invoked before a session's transport is shut down.
    pub fn set_on_session_terminating(
        &self,
        handler: impl Fn(&Arc<Session>) + Send + Sync + 'static,
    ) {
        *self.on_session_terminating.lock() = Some(Box::new(handler));
    }

    /// Invoked after a session is removed.
    pub fn set_on_session_terminated(
        &self,
        handler: impl Fn(&Arc<Session>) + Send + Sync + 'static,
    ) {
        *self.on_session_terminated.lock() = Some(Box::new(handler));
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.len())
            .finish()
    }
}
