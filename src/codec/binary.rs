//! Endian-normalized binary codec.
//!
//! Wire layout per value shape:
//!
//! - fixed integrals / floats: raw bytes, network (big-endian) order
//! - bool: one byte, `0` / non-zero
//! - string / sequence / set: `count (u16 BE)` then the elements
//! - map: `count (u16 BE)` then `key || value` pairs
//! - optional: presence bool, then the value when present
//! - pair: `first || second`
//! - fixed array: `count (u16 BE)` then the elements; on read the count
//!   must equal the declared length
//! - composite object: delegated to the object's own `Serializable` impl
//!
//! Containers are capped at 65535 elements by the u16 count prefix;
//! oversized producers fail before a single byte is written.

use crate::codec::{DecodeContext, EncodeContext};
use crate::error::{Error, Result};
use crate::message::field::{Value, ValueKind};

/// Largest element count the u16 prefix can carry.
pub const MAX_CONTAINER_LEN: usize = u16::MAX as usize;

fn encode_count(ctx: &mut EncodeContext<'_>, len: usize) -> Result<()> {
    if len > MAX_CONTAINER_LEN {
        return Err(Error::SequenceTooLong { len });
    }
    ctx.put(&(len as u16).to_be_bytes());
    Ok(())
}

fn decode_count(ctx: &mut DecodeContext<'_>) -> Result<usize> {
    Ok(u16::from_be_bytes(ctx.take_array::<2>()?) as usize)
}

/// Writes `value` into the context.
pub(crate) fn encode(ctx: &mut EncodeContext<'_>, value: &Value) -> Result<()> {
    match value {
        Value::Bool(v) => ctx.put(&[u8::from(*v)]),
        Value::I8(v) => ctx.put(&v.to_be_bytes()),
        Value::I16(v) => ctx.put(&v.to_be_bytes()),
        Value::I32(v) => ctx.put(&v.to_be_bytes()),
        Value::I64(v) => ctx.put(&v.to_be_bytes()),
        Value::U8(v) => ctx.put(&v.to_be_bytes()),
        Value::U16(v) => ctx.put(&v.to_be_bytes()),
        Value::U32(v) => ctx.put(&v.to_be_bytes()),
        Value::U64(v) => ctx.put(&v.to_be_bytes()),
        Value::F32(v) => ctx.put(&v.to_be_bytes()),
        Value::F64(v) => ctx.put(&v.to_be_bytes()),
        Value::Str(v) => {
            encode_count(ctx, v.len())?;
            ctx.put(v.as_bytes());
        }
        Value::Optional(_, v) => {
            ctx.put(&[u8::from(v.is_some())]);
            if let Some(inner) = v {
                encode(ctx, inner)?;
            }
        }
        Value::Pair(a, b) => {
            encode(ctx, a)?;
            encode(ctx, b)?;
        }
        Value::Seq(_, items) | Value::Set(_, items) | Value::Array(_, items) => {
            encode_count(ctx, items.len())?;
            for item in items {
                encode(ctx, item)?;
            }
        }
        Value::Map(_, _, entries) => {
            encode_count(ctx, entries.len())?;
            for (key, val) in entries {
                encode(ctx, key)?;
                encode(ctx, val)?;
            }
        }
        Value::Object(object) => object.encode(ctx)?,
    }
    Ok(())
}

/// Reads a value of shape `kind` from the context.
pub(crate) fn decode(ctx: &mut DecodeContext<'_>, kind: &ValueKind) -> Result<Value> {
    let value = match kind {
        ValueKind::Bool => Value::Bool(ctx.take_array::<1>()?[0] != 0),
        ValueKind::I8 => Value::I8(i8::from_be_bytes(ctx.take_array()?)),
        ValueKind::I16 => Value::I16(i16::from_be_bytes(ctx.take_array()?)),
        ValueKind::I32 => Value::I32(i32::from_be_bytes(ctx.take_array()?)),
        ValueKind::I64 => Value::I64(i64::from_be_bytes(ctx.take_array()?)),
        ValueKind::U8 => Value::U8(u8::from_be_bytes(ctx.take_array()?)),
        ValueKind::U16 => Value::U16(u16::from_be_bytes(ctx.take_array()?)),
        ValueKind::U32 => Value::U32(u32::from_be_bytes(ctx.take_array()?)),
        ValueKind::U64 => Value::U64(u64::from_be_bytes(ctx.take_array()?)),
        ValueKind::F32 => Value::F32(f32::from_be_bytes(ctx.take_array()?)),
        ValueKind::F64 => Value::F64(f64::from_be_bytes(ctx.take_array()?)),
        ValueKind::Str => {
            let len = decode_count(ctx)?;
            let bytes = ctx.take(len)?;
            let text = std::str::from_utf8(bytes)
                .map_err(|e| Error::MalformedFrame(format!("invalid utf-8 in string: {e}")))?;
            Value::Str(text.to_owned())
        }
        ValueKind::Optional(elem) => {
            let present = ctx.take_array::<1>()?[0] != 0;
            let inner = if present {
                Some(Box::new(decode(ctx, elem)?))
            } else {
                None
            };
            Value::Optional(elem.clone(), inner)
        }
        ValueKind::Pair(a, b) => {
            let first = decode(ctx, a)?;
            let second = decode(ctx, b)?;
            Value::Pair(Box::new(first), Box::new(second))
        }
        ValueKind::Seq(elem) => {
            let count = decode_count(ctx)?;
            let mut items = Vec::with_capacity(count.min(MAX_CONTAINER_LEN));
            for _ in 0..count {
                items.push(decode(ctx, elem)?);
            }
            Value::Seq(elem.clone(), items)
        }
        ValueKind::Set(elem) => {
            let count = decode_count(ctx)?;
            let mut items = Vec::with_capacity(count.min(MAX_CONTAINER_LEN));
            for _ in 0..count {
                items.push(decode(ctx, elem)?);
            }
            Value::Set(elem.clone(), items)
        }
        ValueKind::Map(key_kind, val_kind) => {
            let count = decode_count(ctx)?;
            let mut entries = Vec::with_capacity(count.min(MAX_CONTAINER_LEN));
            for _ in 0..count {
                let key = decode(ctx, key_kind)?;
                let val = decode(ctx, val_kind)?;
                entries.push((key, val));
            }
            Value::Map(key_kind.clone(), val_kind.clone(), entries)
        }
        ValueKind::Array(elem, expected) => {
            let actual = decode_count(ctx)?;
            if actual != *expected {
                return Err(Error::ArrayLengthMismatch {
                    expected: *expected,
                    actual,
                });
            }
            let mut items = Vec::with_capacity(actual);
            for _ in 0..actual {
                items.push(decode(ctx, elem)?);
            }
            Value::Array(elem.clone(), items)
        }
        ValueKind::Object(object_kind) => {
            let mut object = object_kind.prototype();
            object.decode(ctx)?;
            Value::Object(object)
        }
    };
    Ok(value)
}

/// Exact number of bytes `encode` would write for `value`.
pub(crate) fn byte_size(value: &Value) -> usize {
    match value {
        Value::Bool(_) | Value::I8(_) | Value::U8(_) => 1,
        Value::I16(_) | Value::U16(_) => 2,
        Value::I32(_) | Value::U32(_) | Value::F32(_) => 4,
        Value::I64(_) | Value::U64(_) | Value::F64(_) => 8,
        Value::Str(v) => 2 + v.len(),
        Value::Optional(_, v) => 1 + v.as_deref().map_or(0, byte_size),
        Value::Pair(a, b) => byte_size(a) + byte_size(b),
        Value::Seq(_, items) | Value::Set(_, items) | Value::Array(_, items) => {
            2 + items.iter().map(byte_size).sum::<usize>()
        }
        Value::Map(_, _, entries) => {
            2 + entries
                .iter()
                .map(|(k, v)| byte_size(k) + byte_size(v))
                .sum::<usize>()
        }
        Value::Object(object) => object.encoded_size(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;
    use crate::message::field::FieldType;

    fn round_trip<T: FieldType + PartialEq + std::fmt::Debug + Clone>(value: T) {
        let wire = value.clone().into_value();
        let mut buf = Vec::new();
        let mut out = EncodeContext::binary(&mut buf);
        encode(&mut out, &wire).unwrap();
        assert_eq!(buf.len(), byte_size(&wire), "byte_size law broken");

        let mut input = DecodeContext::binary(&buf);
        let decoded = decode(&mut input, &T::kind()).unwrap();
        assert_eq!(input.remaining(), 0, "trailing bytes after decode");
        assert_eq!(T::from_value(&decoded).unwrap(), value);
    }

    #[test]
    fn integral_round_trips() {
        round_trip(true);
        round_trip(false);
        round_trip(-5i8);
        round_trip(-1234i16);
        round_trip(-123456i32);
        round_trip(-1234567890123i64);
        round_trip(200u8);
        round_trip(54321u16);
        round_trip(3123456789u32);
        round_trip(18446744073709551615u64);
    }

    #[test]
    fn float_round_trips() {
        round_trip(1.5f32);
        round_trip(-0.25f64);
    }

    #[test]
    fn string_round_trips() {
        round_trip(String::new());
        round_trip("framed".to_string());
        round_trip("žluťoučký kůň".to_string());
    }

    #[test]
    fn optional_round_trips() {
        round_trip(Some(42i32));
        round_trip(None::<i32>);
        round_trip(Some("nested".to_string()));
    }

    #[test]
    fn pair_round_trips() {
        round_trip((7u16, "seven".to_string()));
        round_trip((Some(1i8), vec![2u32, 3]));
    }

    #[test]
    fn container_round_trips() {
        round_trip(vec![1i32, 2, 3]);
        round_trip(Vec::<u8>::new());
        round_trip(BTreeSet::from(["a".to_string(), "b".to_string()]));
        round_trip(BTreeMap::from([(1u16, "one".to_string()), (2, "two".to_string())]));
        round_trip([10i64, 20, 30]);
    }

    #[test]
    fn endianness_is_network_order() {
        let mut buf = Vec::new();
        encode(&mut EncodeContext::binary(&mut buf), &Value::U16(0x0102)).unwrap();
        assert_eq!(buf, [0x01, 0x02]);

        buf.clear();
        encode(&mut EncodeContext::binary(&mut buf), &Value::U32(0x01020304)).unwrap();
        assert_eq!(buf, [0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn string_layout_is_count_prefixed() {
        let mut buf = Vec::new();
        encode(&mut EncodeContext::binary(&mut buf), &Value::Str("hi".into())).unwrap();
        assert_eq!(buf, [0x00, 0x02, b'h', b'i']);
    }

    #[test]
    fn oversized_container_fails_before_writing() {
        let huge = Value::Seq(
            Box::new(ValueKind::U8),
            vec![Value::U8(0); MAX_CONTAINER_LEN + 1],
        );
        let mut buf = Vec::new();
        let err = encode(&mut EncodeContext::binary(&mut buf), &huge).unwrap_err();
        assert!(matches!(err, Error::SequenceTooLong { len } if len == MAX_CONTAINER_LEN + 1));
        assert!(buf.is_empty());
    }

    #[test]
    fn array_count_must_match_declared_length() {
        // Encoded as a 2-element array, decoded expecting 3.
        let wire = [1u8, 2].into_value();
        let mut buf = Vec::new();
        encode(&mut EncodeContext::binary(&mut buf), &wire).unwrap();

        let mut input = DecodeContext::binary(&buf);
        let err = decode(&mut input, &<[u8; 3]>::kind()).unwrap_err();
        assert!(matches!(
            err,
            Error::ArrayLengthMismatch { expected: 3, actual: 2 }
        ));
    }

    #[test]
    fn truncated_input_reports_eof() {
        let mut input = DecodeContext::binary(&[0x00]);
        assert!(matches!(
            decode(&mut input, &ValueKind::U32),
            Err(Error::UnexpectedEof)
        ));
    }
}
