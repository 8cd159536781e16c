//! # msglink
//!
//! An asynchronous message-passing library for peers connected by a
//! stream-oriented transport. Three subsystems form the core:
//!
//! - **Message model**: typed, named-field messages described by runtime
//!   schemas; each field is serialized by a pluggable codec chosen at the
//!   call site, not by the schema.
//! - **Framed transport + session**: a length-prefixed framing protocol
//!   over a bidirectional byte stream, paired with a session exposing
//!   fire-and-forget `send`, queued `receive` and correlated `request`
//!   with timeout-based expiry.
//! - **Pub/Sub channel**: fan-out broadcast over sessions with automatic
//!   eviction of dead subscribers.
//!
//! ```ignore
//! let factory = Arc::new(MessageFactory::new());
//! factory.define(LOGIN, |d| {
//!     d.register_field::<String>("user")?;
//!     Ok(())
//! })?;
//!
//! let service = MessagingService::new(factory.clone())?;
//! service
//!     .transports()
//!     .register(TcpTransportFactory::new(factory.clone()));
//! service.start();
//!
//! let session = service.connect(&Url::parse("tcp://127.0.0.1:7400")?)?;
//! let mut msg = factory.create_message(LOGIN, &session)?;
//! msg.set("user", "ada".to_string())?;
//! session.send(msg)?;
//! ```

pub mod codec;
pub mod error;
pub mod message;
pub mod net;
pub mod service;
pub mod session;
pub mod transport;
mod util;

pub use codec::{CodecKind, DecodeContext, EncodeContext, Serializable};
pub use error::{Error, Result};
pub use message::channel::{PubSubChannel, ReasonForLeaving, SubscribeResult, UnsubscribeResult};
pub use message::descriptor::{FieldDescriptor, MessageDescriptor};
pub use message::dispatcher::MessageDispatcher;
pub use message::factory::MessageFactory;
pub use message::field::{Field, FieldSet, FieldType, Value, ValueKind};
pub use message::filter::{FilterPolicy, MessageFilter, MessageFilterChain, RuleBasedMessageFilter};
pub use message::{
    Message, MessageId, MessageLength, MessageType, SessionId, INVALID_SESSION_ID,
};
pub use net::url::{Url, UrlBuilder};
pub use service::{MessagingService, ServiceState};
pub use session::manager::SessionManager;
pub use session::{PropertySet, Session};
pub use transport::framed::SRC_MSG_ID_FIELD;
pub use transport::{
    FramedTransport, ResponseFuture, TcpTransportFactory, Transport, TransportFactory,
    TransportListener, TransportRegistry, REQUEST_EXPIRY,
};

/// The crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
