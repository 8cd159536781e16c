//! The messaging service facade: the I/O reactor, the transport factory
//! registry and the session manager under one roof.

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::message::factory::MessageFactory;
use crate::net::url::Url;
use crate::session::manager::SessionManager;
use crate::session::Session;
use crate::transport::registry::TransportRegistry;

/// Lifecycle state shared by services and transports.
///
/// Transitions run `Stopped -> StartPending -> Started -> StopPending ->
/// Stopped`, driven by explicit start/stop and, for transports, by I/O
/// faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    StartPending,
    Started,
    StopPending,
}

impl ServiceState {
    /// The states in which a transport (and hence its session) counts as
    /// alive.
    pub fn is_active(self) -> bool {
        matches!(self, ServiceState::StartPending | ServiceState::Started)
    }
}

/// Facade over the messaging stack.
///
/// Owns a dedicated single-threaded tokio runtime (the reactor) that drives
/// every transport created through [`MessagingService::connect`]. There are
/// no global singletons: the message factory is injected and shared with
/// the transport factories the embedder registers.
pub struct MessagingService {
    runtime: Arc<Runtime>,
    state: Arc<Mutex<ServiceState>>,
    shutdown: Arc<Notify>,
    reactor: Mutex<Option<thread::JoinHandle<()>>>,
    registry: TransportRegistry,
    sessions: SessionManager,
    factory: Arc<MessageFactory>,
}

impl MessagingService {
    pub fn new(factory: Arc<MessageFactory>) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
            state: Arc::new(Mutex::new(ServiceState::Stopped)),
            shutdown: Arc::new(Notify::new()),
            reactor: Mutex::new(None),
            registry: TransportRegistry::new(),
            sessions: SessionManager::new(),
            factory,
        })
    }

    pub fn state(&self) -> ServiceState {
        *self.state.lock()
    }

    pub fn message_factory(&self) -> &Arc<MessageFactory> {
        &self.factory
    }

    pub fn transports(&self) -> &TransportRegistry {
        &self.registry
    }

    pub fn session_manager(&self) -> &SessionManager {
        &self.sessions
    }

    /// Handle onto the reactor runtime, for embedders that spawn their own
    /// transport-adjacent tasks.
    pub fn handle(&self) -> &Handle {
        self.runtime.handle()
    }

    /// Launches the reactor thread. It drives the runtime until the state
    /// becomes `StopPending`, re-entering the drive loop on spurious
    /// wakeups.
    pub fn start(&self) {
        {
            let mut state = self.state.lock();
            if state.is_active() {
                warn!("messaging service is already started");
                return;
            }
            *state = ServiceState::StartPending;
        }

        let runtime = self.runtime.clone();
        let state = self.state.clone();
        let shutdown = self.shutdown.clone();

        let reactor = thread::Builder::new()
            .name("msglink-reactor".to_owned())
            .spawn(move || {
                *state.lock() = ServiceState::Started;
                debug!("reactor running");
                loop {
                    runtime.block_on(shutdown.notified());
                    if *state.lock() == ServiceState::StopPending {
                        break;
                    }
                }
                *state.lock() = ServiceState::Stopped;
                debug!("reactor stopped");
            })
            .expect("failed to spawn reactor thread");

        *self.reactor.lock() = Some(reactor);
    }

    /// Terminates all sessions, halts the reactor and joins its thread.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            if *state == ServiceState::Stopped {
                return;
            }
            *state = ServiceState::StopPending;
        }

        self.sessions.terminate_all();
        self.shutdown.notify_one();

        if let Some(reactor) = self.reactor.lock().take() {
            if reactor.join().is_err() {
                warn!("reactor thread terminated abnormally");
            }
        }
        *self.state.lock() = ServiceState::Stopped;
    }

    /// Resolves the URL's protocol against the registered transport
    /// factories, connects, and wraps the transport in a new session.
    ///
    /// Blocks the calling thread for the duration of the connect; must not
    /// be called from the reactor thread itself.
    pub fn connect(&self, url: &Url) -> Result<Arc<Session>> {
        let factory = self
            .registry
            .factory_for(url.protocol())
            .ok_or_else(|| Error::ProtocolNotSupported(url.protocol().to_owned()))?;

        let transport = self.runtime.block_on(factory.create_transport(url))?;
        Ok(self.sessions.create_session(transport))
    }
}

impl Drop for MessagingService {
    fn drop(&mut self) {
        // A still-running reactor would otherwise outlive the facade.
        self.stop();
    }
}

impl std::fmt::Debug for MessagingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingService")
            .field("state", &self.state())
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
