//! Message factory: maps message types to their schemas and constructs
//! fresh messages bound to a session.
//!
//! There is no global instance; embedders create a factory, register their
//! schemas during configuration, and pass it to whatever needs it (the
//! messaging service, transport factories, tests).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::message::descriptor::MessageDescriptor;
use crate::message::{Message, MessageType};
use crate::session::Session;

/// Registry of message schemas keyed by [`MessageType`].
///
/// Registration is expected to happen during configuration (single writer);
/// lookup is read-only and concurrent thereafter.
#[derive(Debug, Default)]
pub struct MessageFactory {
    descriptors: RwLock<HashMap<MessageType, MessageDescriptor>>,
}

impl MessageFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a schema. Returns `false`, leaving the registered schema
    /// untouched, when the type is already known; there is no silent
    /// overwrite.
    pub fn add_descriptor(&self, descriptor: MessageDescriptor) -> bool {
        let mut descriptors = self.descriptors.write();
        match descriptors.entry(descriptor.message_type()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(descriptor);
                true
            }
        }
    }

    /// Builds and registers a schema in one go.
    ///
    /// ```ignore
    /// factory.define(LOGIN, |d| {
    ///     d.register_field::<String>("user")?
    ///         .register_field::<String>("token")?;
    ///     Ok(())
    /// })?;
    /// ```
    pub fn define(
        &self,
        message_type: MessageType,
        configure: impl FnOnce(&mut MessageDescriptor) -> Result<()>,
    ) -> Result<bool> {
        let mut descriptor = MessageDescriptor::new(message_type);
        configure(&mut descriptor)?;
        Ok(self.add_descriptor(descriptor))
    }

    pub fn has_descriptor(&self, message_type: MessageType) -> bool {
        self.descriptors.read().contains_key(&message_type)
    }

    /// Constructs an empty message of the given type, bound to `session`,
    /// with every schema field instantiated in registration order.
    pub fn create_message(
        &self,
        message_type: MessageType,
        session: &Arc<Session>,
    ) -> Result<Message> {
        let descriptors = self.descriptors.read();
        let descriptor = descriptors
            .get(&message_type)
            .ok_or(Error::UnknownMessageType(message_type))?;
        Ok(Message::new(descriptor, session))
    }
}

/// Convenience for embedders that share the factory across components.
pub type SharedMessageFactory = Arc<MessageFactory>;
