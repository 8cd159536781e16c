//! Library-wide error type.
//!
//! Every fallible operation in the crate returns [`crate::Result`]. The
//! variants mirror the failure surfaces of the subsystems: schema lookup,
//! typed field access, the binary codec, URL parsing, transport I/O and
//! request correlation.

use std::io;

use thiserror::Error;

use crate::codec::CodecKind;
use crate::message::{MessageId, MessageType, SessionId};
use crate::service::ServiceState;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by the messaging core.
#[derive(Debug, Error)]
pub enum Error {
    /// Schema lookup miss during message construction or frame decoding.
    #[error("no descriptor registered for message type {0}")]
    UnknownMessageType(MessageType),

    /// Typed field accessor miss: no field with that name, or the stored
    /// value shape does not match the requested type. There is no coercion.
    #[error("message {message_id} (session {session_id}) has no field `{name}` of the requested type")]
    FieldDoesNotExist {
        name: String,
        session_id: SessionId,
        message_id: MessageId,
    },

    /// A field with this name is already registered in the schema.
    #[error("field `{0}` has already been registered")]
    DuplicateField(String),

    /// URL string could not be parsed.
    #[error("malformed url: {0}")]
    MalformedUrl(String),

    /// No transport factory registered for the requested protocol.
    #[error("protocol `{0}` is not supported by any registered transport factory")]
    ProtocolNotSupported(String),

    /// I/O failure on the underlying byte stream, including connection
    /// refused and EOF.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// The pending request outlived the 30 second expiry window without a
    /// correlated reply.
    #[error("request expired without a reply")]
    RequestExpired,

    /// The transport stopped while the request was still pending.
    #[error("transport stopped before a reply arrived")]
    TransportStopped,

    /// An operation that needs a running transport found it in another state.
    #[error("transport is not started (state: {0:?})")]
    TransportNotStarted(ServiceState),

    /// A field's codec does not match the codec the context was created for.
    #[error("codec {field:?} cannot run against a {context:?} context")]
    CodecMismatch { field: CodecKind, context: CodecKind },

    /// A serialized frame would exceed the u16 length prefix.
    #[error("frame of {size} bytes exceeds the 65535 byte frame limit")]
    FrameTooLarge { size: usize },

    /// A container has more elements than the u16 count prefix can carry.
    #[error("container of {len} elements exceeds the 65535 element limit")]
    SequenceTooLong { len: usize },

    /// A decoded fixed-size array carried the wrong element count.
    #[error("array count {actual} does not match the expected {expected}")]
    ArrayLengthMismatch { expected: usize, actual: usize },

    /// The frame ended before the value was fully decoded.
    #[error("unexpected end of frame")]
    UnexpectedEof,

    /// The frame bytes decoded to an invalid value (e.g. non-UTF-8 text).
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// API misuse for the object's current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
}
