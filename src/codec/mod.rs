//! # Codec Layer
//!
//! Serializers are identified by a [`CodecKind`] tag. Every field in a
//! message schema names the codec that owns it, and every encode/decode pass
//! runs against a context created for exactly one codec. The dispatch
//! functions below match the two tags at the call site and refuse to run a
//! field against a context it was not created for, which is the
//! composite-serializer contract.
//!
//! The calling convention for a codec is `(context, value, name)`. The
//! binary codec is positional and ignores `name`; a name-addressed codec
//! (e.g. JSON) would key on it. Only the binary codec ships here.

use std::any::Any;
use std::fmt;

use crate::error::{Error, Result};
use crate::message::field::{Value, ValueKind};

pub mod binary;

/// Identifies a serializer implementation.
///
/// The set of codecs is closed at compile time, so dispatch is a plain
/// `match` rather than dynamic lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecKind {
    /// Endian-normalized positional binary encoding.
    Binary,
}

/// Write-side serialization context: a codec tag plus the output buffer the
/// frame body is accumulated into.
pub struct EncodeContext<'a> {
    kind: CodecKind,
    out: &'a mut Vec<u8>,
}

impl<'a> EncodeContext<'a> {
    /// Creates a context for the binary codec writing into `out`.
    pub fn binary(out: &'a mut Vec<u8>) -> Self {
        Self {
            kind: CodecKind::Binary,
            out,
        }
    }

    pub fn kind(&self) -> CodecKind {
        self.kind
    }

    pub(crate) fn put(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
    }
}

/// Read-side serialization context: a codec tag plus a sequential cursor
/// over the frame body.
pub struct DecodeContext<'a> {
    kind: CodecKind,
    data: &'a [u8],
}

impl<'a> DecodeContext<'a> {
    /// Creates a context for the binary codec reading from `data`.
    pub fn binary(data: &'a [u8]) -> Self {
        Self {
            kind: CodecKind::Binary,
            data,
        }
    }

    pub fn kind(&self) -> CodecKind {
        self.kind
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.data.len() < n {
            return Err(Error::UnexpectedEof);
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    pub(crate) fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }
}

/// Encodes `value` with the codec `field_codec`, verifying it matches the
/// context's tag. `name` is forwarded for name-addressed codecs; the binary
/// codec ignores it.
pub fn encode_value(
    ctx: &mut EncodeContext<'_>,
    value: &Value,
    _name: &str,
    field_codec: CodecKind,
) -> Result<()> {
    if ctx.kind() != field_codec {
        return Err(Error::CodecMismatch {
            field: field_codec,
            context: ctx.kind(),
        });
    }
    match field_codec {
        CodecKind::Binary => binary::encode(ctx, value),
    }
}

/// Decodes a value of shape `kind` with the codec `field_codec`, verifying
/// it matches the context's tag.
pub fn decode_value(
    ctx: &mut DecodeContext<'_>,
    kind: &ValueKind,
    _name: &str,
    field_codec: CodecKind,
) -> Result<Value> {
    if ctx.kind() != field_codec {
        return Err(Error::CodecMismatch {
            field: field_codec,
            context: ctx.kind(),
        });
    }
    match field_codec {
        CodecKind::Binary => binary::decode(ctx, kind),
    }
}

/// Exact number of bytes `encode_value` would produce for `value`, without
/// touching any buffer.
pub fn value_size(value: &Value, field_codec: CodecKind) -> usize {
    match field_codec {
        CodecKind::Binary => binary::byte_size(value),
    }
}

/// Serialization capability for nested message-like objects.
///
/// A type implementing `Serializable` (together with `Clone`, `PartialEq`,
/// `Debug` and `Default`) can be carried as a message field; register it
/// with the [`crate::composite_field!`] macro. The object owns its own wire
/// layout and size accounting; the codec delegates to it wholesale.
pub trait Serializable: fmt::Debug + Send + Sync + 'static {
    /// Writes the object into the context.
    fn encode(&self, ctx: &mut EncodeContext<'_>) -> Result<()>;

    /// Reads the object back from the context, replacing `self`.
    fn decode(&mut self, ctx: &mut DecodeContext<'_>) -> Result<()>;

    /// Exact number of bytes `encode` writes.
    fn encoded_size(&self) -> usize;
}

/// Object-safe closure over [`Serializable`] used by the runtime value
/// model. Implemented automatically for every `Serializable + Clone +
/// PartialEq` type; not meant to be implemented by hand.
pub trait DynSerializable: Serializable {
    fn clone_boxed(&self) -> Box<dyn DynSerializable>;
    fn eq_dyn(&self, other: &dyn DynSerializable) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<T> DynSerializable for T
where
    T: Serializable + Clone + PartialEq,
{
    fn clone_boxed(&self) -> Box<dyn DynSerializable> {
        Box::new(self.clone())
    }

    fn eq_dyn(&self, other: &dyn DynSerializable) -> bool {
        other.as_any().downcast_ref::<T>().map_or(false, |o| self == o)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Clone for Box<dyn DynSerializable> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

impl PartialEq for Box<dyn DynSerializable> {
    fn eq(&self, other: &Self) -> bool {
        self.eq_dyn(other.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::field::FieldType;

    #[test]
    fn context_cursor_consumes_sequentially() {
        let data = [1u8, 2, 3, 4, 5];
        let mut ctx = DecodeContext::binary(&data);
        assert_eq!(ctx.take(2).unwrap(), &[1, 2]);
        assert_eq!(ctx.remaining(), 3);
        assert_eq!(ctx.take_array::<3>().unwrap(), [3, 4, 5]);
        assert!(matches!(ctx.take(1), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn dispatch_runs_the_matching_codec() {
        let mut buf = Vec::new();
        let mut ctx = EncodeContext::binary(&mut buf);
        encode_value(&mut ctx, &7i32.into_value(), "n", CodecKind::Binary).unwrap();
        assert_eq!(buf, [0, 0, 0, 7]);
    }
}
