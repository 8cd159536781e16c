//! Message dispatch: routes messages to per-type handlers behind a filter
//! chain.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::message::filter::MessageFilterChain;
use crate::message::{Message, MessageType};

/// Handler consuming a dispatched message.
pub type MessageHandler = Box<dyn Fn(Message) + Send + Sync>;

/// Consumes messages and distributes them to handlers.
///
/// A message whose type has no local handler is offered to the delegated
/// dispatchers; if none claims it, it is dropped. Messages rejected by the
/// filter chain go to the `on_message_rejected` handler instead.
#[derive(Default)]
pub struct MessageDispatcher {
    handlers: RwLock<HashMap<MessageType, MessageHandler>>,
    delegates: RwLock<Vec<Arc<MessageDispatcher>>>,
    filter_chain: MessageFilterChain,
    on_message_rejected: Mutex<Option<MessageHandler>>,
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(
        &self,
        message_type: MessageType,
        handler: impl Fn(Message) + Send + Sync + 'static,
    ) {
        self.handlers
            .write()
            .insert(message_type, Box::new(handler));
    }

    pub fn has_handler(&self, message_type: MessageType) -> bool {
        self.handlers.read().contains_key(&message_type)
    }

    /// Adds a dispatcher consulted for types this one cannot handle.
    pub fn add_delegate(&self, dispatcher: Arc<MessageDispatcher>) {
        self.delegates.write().push(dispatcher);
    }

    /// The filter chain gating local handlers.
    pub fn filter(&self) -> &MessageFilterChain {
        &self.filter_chain
    }

    pub fn set_on_message_rejected(&self, handler: impl Fn(Message) + Send + Sync + 'static) {
        *self.on_message_rejected.lock() = Some(Box::new(handler));
    }

    pub fn dispatch(&self, msg: Message) {
        let message_type = msg.message_type();

        if !self.has_handler(message_type) {
            let delegate = self
                .delegates
                .read()
                .iter()
                .find(|d| d.has_handler(message_type))
                .cloned();
            match delegate {
                Some(delegate) => delegate.dispatch(msg),
                None => debug!("no handler for message type {message_type}; dropping"),
            }
            return;
        }

        if !self.filter_chain.matches(&msg) {
            if let Some(rejected) = self.on_message_rejected.lock().as_ref() {
                rejected(msg);
            }
            return;
        }

        let handlers = self.handlers.read();
        if let Some(handler) = handlers.get(&message_type) {
            handler(msg);
        }
    }
}

impl std::fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageDispatcher")
            .field("handlers", &self.handlers.read().len())
            .field("delegates", &self.delegates.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::factory::MessageFactory;
    use crate::message::filter::{FilterPolicy, RuleBasedMessageFilter};
    use crate::session::testing::test_session;

    const PING: u16 = 1;
    const PONG: u16 = 2;

    fn build(message_type: u16) -> Message {
        let factory = MessageFactory::new();
        factory.define(PING, |_| Ok(())).unwrap();
        factory.define(PONG, |_| Ok(())).unwrap();
        factory
            .create_message(message_type, &test_session(1))
            .unwrap()
    }

    #[test]
    fn dispatch_reaches_the_typed_handler() {
        let dispatcher = MessageDispatcher::new();
        let hits: Arc<Mutex<Vec<MessageType>>> = Arc::default();

        let sink = hits.clone();
        dispatcher.add_handler(PING, move |msg| sink.lock().push(msg.message_type()));

        dispatcher.dispatch(build(PING));
        dispatcher.dispatch(build(PONG)); // no handler anywhere: dropped

        assert_eq!(hits.lock().as_slice(), [PING]);
    }

    #[test]
    fn unhandled_types_fall_through_to_delegates() {
        let dispatcher = MessageDispatcher::new();
        let delegate = Arc::new(MessageDispatcher::new());
        let hits: Arc<Mutex<Vec<MessageType>>> = Arc::default();

        let sink = hits.clone();
        delegate.add_handler(PONG, move |msg| sink.lock().push(msg.message_type()));
        dispatcher.add_delegate(delegate);

        dispatcher.dispatch(build(PONG));
        assert_eq!(hits.lock().as_slice(), [PONG]);
    }

    #[test]
    fn filtered_messages_go_to_the_rejection_handler() {
        let dispatcher = MessageDispatcher::new();
        let handled: Arc<Mutex<Vec<MessageType>>> = Arc::default();
        let rejected: Arc<Mutex<Vec<MessageType>>> = Arc::default();

        let sink = handled.clone();
        dispatcher.add_handler(PING, move |msg| sink.lock().push(msg.message_type()));
        let sink = rejected.clone();
        dispatcher.set_on_message_rejected(move |msg| sink.lock().push(msg.message_type()));
        dispatcher.filter().add_filter(RuleBasedMessageFilter::new(
            FilterPolicy::ForbidAllExceptPermitted,
        ));

        dispatcher.dispatch(build(PING));

        assert!(handled.lock().is_empty());
        assert_eq!(rejected.lock().as_slice(), [PING]);
    }
}
