//! Transport factories and the protocol registry.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;
use crate::net::url::Url;
use crate::transport::Transport;

/// Produces transports for the protocol(s) it supports.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Whether this factory handles the given protocol string. Matching is
    /// case-sensitive.
    fn supports(&self, protocol: &str) -> bool;

    /// Establishes a connection described by `url` and wraps it in a
    /// transport. The transport is returned stopped; the session that
    /// adopts it starts it.
    async fn create_transport(&self, url: &Url) -> Result<Box<dyn Transport>>;
}

/// Registry mapping protocol strings to transport factories.
#[derive(Default)]
pub struct TransportRegistry {
    factories: Mutex<Vec<Arc<dyn TransportFactory>>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory. When several factories support the same
    /// protocol, the most recently registered one wins.
    pub fn register(&self, factory: impl TransportFactory + 'static) {
        self.register_shared(Arc::new(factory));
    }

    pub fn register_shared(&self, factory: Arc<dyn TransportFactory>) {
        self.factories.lock().push(factory);
    }

    /// Resolves the factory for a protocol, if any is registered.
    pub fn factory_for(&self, protocol: &str) -> Option<Arc<dyn TransportFactory>> {
        self.factories
            .lock()
            .iter()
            .rev()
            .find(|f| f.supports(protocol))
            .cloned()
    }
}

impl std::fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("factories", &self.factories.lock().len())
            .finish()
    }
}
