//! Message model: identifiers, the [`Message`] unit itself, schemas and the
//! factory, plus the channel/dispatch layers built on top of it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use crate::codec::{DecodeContext, EncodeContext};
use crate::error::{Error, Result};
use crate::message::descriptor::MessageDescriptor;
use crate::message::field::{FieldSet, FieldType};
use crate::session::Session;

pub mod channel;
pub mod descriptor;
pub mod dispatcher;
pub mod factory;
pub mod field;
pub mod filter;
pub(crate) mod queue;

/// Identifies a session. Monotonically increasing; `0` is reserved as
/// "invalid".
pub type SessionId = u64;

/// Identifies a message within the process. Monotonically increasing; `0`
/// is reserved.
pub type MessageId = u32;

/// Application-defined message type tag.
pub type MessageType = u16;

/// The framing length prefix type; used literally on the wire.
pub type MessageLength = u16;

/// The reserved "no session" identifier.
pub const INVALID_SESSION_ID: SessionId = 0;

static NEXT_MESSAGE_ID: AtomicU32 = AtomicU32::new(1);

fn generate_message_id() -> MessageId {
    loop {
        let id = NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed);
        if id != 0 {
            return id;
        }
    }
}

/// Communication unit of the messaging system.
///
/// A message is created through the [`factory::MessageFactory`], mutable
/// until serialized, and holds a weak handle to the session it belongs to:
/// the session may outlive the message or vice versa, and dropping a
/// message never forces session teardown.
#[derive(Debug)]
pub struct Message {
    id: MessageId,
    message_type: MessageType,
    fields: FieldSet,
    session: Weak<Session>,
    session_id: SessionId,
}

impl Message {
    pub(crate) fn new(descriptor: &MessageDescriptor, session: &Arc<Session>) -> Self {
        Self {
            id: generate_message_id(),
            message_type: descriptor.message_type(),
            fields: descriptor.instantiate(),
            session: Arc::downgrade(session),
            session_id: session.id(),
        }
    }

    /// Never-reused identifier assigned at construction.
    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// The owning session, when it is still alive.
    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.upgrade()
    }

    /// Identifier of the session this message was created on.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains(name)
    }

    /// Typed field read.
    ///
    /// Fails with [`Error::FieldDoesNotExist`] when no field with that name
    /// exists or its stored shape differs from `T`; there is no implicit
    /// conversion.
    pub fn get<T: FieldType>(&self, name: &str) -> Result<T> {
        self.fields
            .get_typed(name)
            .ok_or_else(|| self.missing_field(name))
    }

    /// Typed field write, under the same contract as [`Message::get`].
    pub fn set<T: FieldType>(&mut self, name: &str, value: T) -> Result<()> {
        if self.fields.set_typed(name, value) {
            Ok(())
        } else {
            Err(self.missing_field(name))
        }
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// Field-wise equality; identifiers and session binding are ignored.
    pub fn fields_eq(&self, other: &Message) -> bool {
        self.message_type == other.message_type && self.fields == other.fields
    }

    /// Serializes the field set, in schema order, into the context.
    pub fn encode(&self, ctx: &mut EncodeContext<'_>) -> Result<()> {
        self.fields.encode(ctx)
    }

    /// Replaces the field values by deserializing from the context, in
    /// schema order.
    pub fn decode(&mut self, ctx: &mut DecodeContext<'_>) -> Result<()> {
        self.fields.decode(ctx)
    }

    /// Exact serialized size of the field set, in bytes.
    pub fn encoded_size(&self) -> usize {
        self.fields.encoded_size()
    }

    fn missing_field(&self, name: &str) -> Error {
        Error::FieldDoesNotExist {
            name: name.to_owned(),
            session_id: self.session_id,
            message_id: self.id,
        }
    }
}

/// Cloning deep-copies the field set and assigns a fresh message id.
impl Clone for Message {
    fn clone(&self) -> Self {
        Self {
            id: generate_message_id(),
            message_type: self.message_type,
            fields: self.fields.clone(),
            session: self.session.clone(),
            session_id: self.session_id,
        }
    }
}
