//! Runtime field and value model.
//!
//! Messages are described by runtime schemas, so field values live in a
//! closed [`Value`] enum with a parallel shape descriptor, [`ValueKind`].
//! Typed access goes through [`FieldType`], which maps Rust types onto the
//! wire shapes with no implicit conversion: a kind mismatch reads as
//! "field not present".

use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::codec::{self, CodecKind, DecodeContext, DynSerializable, EncodeContext};
use crate::error::{Error, Result};

pub use crate::codec::Serializable;

/// Shape descriptor for a field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Str,
    Optional(Box<ValueKind>),
    Pair(Box<ValueKind>, Box<ValueKind>),
    Seq(Box<ValueKind>),
    Set(Box<ValueKind>),
    Map(Box<ValueKind>, Box<ValueKind>),
    Array(Box<ValueKind>, usize),
    Object(ObjectKind),
}

impl ValueKind {
    /// Shape of a nested composite object type.
    pub fn object<T>() -> Self
    where
        T: Serializable + Clone + PartialEq + Default,
    {
        ValueKind::Object(ObjectKind {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            prototype: Arc::new(T::default()),
        })
    }
}

/// Identity and prototype of a composite object shape. The prototype stamps
/// fresh instances during kind-driven decoding.
#[derive(Clone)]
pub struct ObjectKind {
    type_id: TypeId,
    type_name: &'static str,
    prototype: Arc<dyn DynSerializable>,
}

impl ObjectKind {
    pub(crate) fn prototype(&self) -> Box<dyn DynSerializable> {
        self.prototype.clone_boxed()
    }
}

impl PartialEq for ObjectKind {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ObjectKind {}

impl std::fmt::Debug for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObjectKind").field(&self.type_name).finish()
    }
}

/// A runtime field value.
///
/// Container variants carry their element shape so that empty containers
/// and absent optionals still know what they hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Optional(Box<ValueKind>, Option<Box<Value>>),
    Pair(Box<Value>, Box<Value>),
    Seq(Box<ValueKind>, Vec<Value>),
    Set(Box<ValueKind>, Vec<Value>),
    Map(Box<ValueKind>, Box<ValueKind>, Vec<(Value, Value)>),
    Array(Box<ValueKind>, Vec<Value>),
    Object(Box<dyn DynSerializable>),
}

impl Value {
    /// The shape of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::I8(_) => ValueKind::I8,
            Value::I16(_) => ValueKind::I16,
            Value::I32(_) => ValueKind::I32,
            Value::I64(_) => ValueKind::I64,
            Value::U8(_) => ValueKind::U8,
            Value::U16(_) => ValueKind::U16,
            Value::U32(_) => ValueKind::U32,
            Value::U64(_) => ValueKind::U64,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
            Value::Str(_) => ValueKind::Str,
            Value::Optional(elem, _) => ValueKind::Optional(elem.clone()),
            Value::Pair(a, b) => {
                ValueKind::Pair(Box::new(a.kind()), Box::new(b.kind()))
            }
            Value::Seq(elem, _) => ValueKind::Seq(elem.clone()),
            Value::Set(elem, _) => ValueKind::Set(elem.clone()),
            Value::Map(k, v, _) => ValueKind::Map(k.clone(), v.clone()),
            Value::Array(elem, items) => ValueKind::Array(elem.clone(), items.len()),
            Value::Object(object) => ValueKind::Object(ObjectKind {
                type_id: object.as_any().type_id(),
                type_name: "object",
                prototype: Arc::from(object.clone_boxed()),
            }),
        }
    }

    /// A zero-equivalent value of the given shape; this is what a freshly
    /// instantiated field holds before the application assigns it.
    pub fn default_for(kind: &ValueKind) -> Value {
        match kind {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::I8 => Value::I8(0),
            ValueKind::I16 => Value::I16(0),
            ValueKind::I32 => Value::I32(0),
            ValueKind::I64 => Value::I64(0),
            ValueKind::U8 => Value::U8(0),
            ValueKind::U16 => Value::U16(0),
            ValueKind::U32 => Value::U32(0),
            ValueKind::U64 => Value::U64(0),
            ValueKind::F32 => Value::F32(0.0),
            ValueKind::F64 => Value::F64(0.0),
            ValueKind::Str => Value::Str(String::new()),
            ValueKind::Optional(elem) => Value::Optional(elem.clone(), None),
            ValueKind::Pair(a, b) => Value::Pair(
                Box::new(Value::default_for(a)),
                Box::new(Value::default_for(b)),
            ),
            ValueKind::Seq(elem) => Value::Seq(elem.clone(), Vec::new()),
            ValueKind::Set(elem) => Value::Set(elem.clone(), Vec::new()),
            ValueKind::Map(k, v) => Value::Map(k.clone(), v.clone(), Vec::new()),
            ValueKind::Array(elem, len) => Value::Array(
                elem.clone(),
                (0..*len).map(|_| Value::default_for(elem)).collect(),
            ),
            ValueKind::Object(object_kind) => Value::Object(object_kind.prototype()),
        }
    }
}

/// Maps a Rust type onto the wire value model.
///
/// Implemented for the primitives, `String`, `Option<T>`, `(A, B)`,
/// `Vec<T>`, `BTreeSet<T>`, `BTreeMap<K, V>` and `[T; N]`. Enums get an
/// impl through [`crate::wire_enum!`]; composite objects through
/// [`crate::composite_field!`].
pub trait FieldType: Sized {
    /// Wire shape of this type.
    fn kind() -> ValueKind;

    /// Wraps the typed value into the runtime model.
    fn into_value(self) -> Value;

    /// Extracts the typed value back out; `None` on any shape mismatch.
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! primitive_field_type {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl FieldType for $ty {
                fn kind() -> ValueKind {
                    ValueKind::$variant
                }

                fn into_value(self) -> Value {
                    Value::$variant(self)
                }

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )+
    };
}

primitive_field_type! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => Str,
}

impl<T: FieldType> FieldType for Option<T> {
    fn kind() -> ValueKind {
        ValueKind::Optional(Box::new(T::kind()))
    }

    fn into_value(self) -> Value {
        Value::Optional(
            Box::new(T::kind()),
            self.map(|v| Box::new(v.into_value())),
        )
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Optional(elem, inner) if **elem == T::kind() => match inner {
                Some(v) => T::from_value(v).map(Some),
                None => Some(None),
            },
            _ => None,
        }
    }
}

impl<A: FieldType, B: FieldType> FieldType for (A, B) {
    fn kind() -> ValueKind {
        ValueKind::Pair(Box::new(A::kind()), Box::new(B::kind()))
    }

    fn into_value(self) -> Value {
        Value::Pair(Box::new(self.0.into_value()), Box::new(self.1.into_value()))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Pair(a, b) => Some((A::from_value(a)?, B::from_value(b)?)),
            _ => None,
        }
    }
}

impl<T: FieldType> FieldType for Vec<T> {
    fn kind() -> ValueKind {
        ValueKind::Seq(Box::new(T::kind()))
    }

    fn into_value(self) -> Value {
        Value::Seq(
            Box::new(T::kind()),
            self.into_iter().map(FieldType::into_value).collect(),
        )
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Seq(elem, items) if **elem == T::kind() => {
                items.iter().map(T::from_value).collect()
            }
            _ => None,
        }
    }
}

impl<T: FieldType + Ord> FieldType for BTreeSet<T> {
    fn kind() -> ValueKind {
        ValueKind::Set(Box::new(T::kind()))
    }

    fn into_value(self) -> Value {
        Value::Set(
            Box::new(T::kind()),
            self.into_iter().map(FieldType::into_value).collect(),
        )
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Set(elem, items) if **elem == T::kind() => {
                items.iter().map(T::from_value).collect()
            }
            _ => None,
        }
    }
}

impl<K: FieldType + Ord, V: FieldType> FieldType for BTreeMap<K, V> {
    fn kind() -> ValueKind {
        ValueKind::Map(Box::new(K::kind()), Box::new(V::kind()))
    }

    fn into_value(self) -> Value {
        Value::Map(
            Box::new(K::kind()),
            Box::new(V::kind()),
            self.into_iter()
                .map(|(k, v)| (k.into_value(), v.into_value()))
                .collect(),
        )
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Map(key_kind, val_kind, entries)
                if **key_kind == K::kind() && **val_kind == V::kind() =>
            {
                entries
                    .iter()
                    .map(|(k, v)| Some((K::from_value(k)?, V::from_value(v)?)))
                    .collect()
            }
            _ => None,
        }
    }
}

impl<T: FieldType, const N: usize> FieldType for [T; N] {
    fn kind() -> ValueKind {
        ValueKind::Array(Box::new(T::kind()), N)
    }

    fn into_value(self) -> Value {
        Value::Array(
            Box::new(T::kind()),
            self.into_iter().map(FieldType::into_value).collect(),
        )
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(elem, items) if **elem == T::kind() && items.len() == N => {
                let extracted: Option<Vec<T>> = items.iter().map(T::from_value).collect();
                extracted?.try_into().ok()
            }
            _ => None,
        }
    }
}

/// Implements [`FieldType`] for a fieldless enum, carried on the wire as its
/// underlying integer.
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Mode { Idle = 0, Tracking = 1 }
/// msglink::wire_enum!(Mode as u8 { Idle, Tracking });
/// ```
#[macro_export]
macro_rules! wire_enum {
    ($ty:ty as $repr:ty { $($variant:ident),+ $(,)? }) => {
        impl $crate::FieldType for $ty {
            fn kind() -> $crate::ValueKind {
                <$repr as $crate::FieldType>::kind()
            }

            fn into_value(self) -> $crate::Value {
                <$repr as $crate::FieldType>::into_value(self as $repr)
            }

            fn from_value(value: &$crate::Value) -> ::std::option::Option<Self> {
                let raw = <$repr as $crate::FieldType>::from_value(value)?;
                $(
                    if raw == <$ty>::$variant as $repr {
                        return ::std::option::Option::Some(<$ty>::$variant);
                    }
                )+
                ::std::option::Option::None
            }
        }
    };
}

/// Implements [`FieldType`] for a composite object that carries its own
/// serialization (see [`Serializable`]). The type must also be `Clone`,
/// `PartialEq`, `Debug` and `Default`.
#[macro_export]
macro_rules! composite_field {
    ($ty:ty) => {
        impl $crate::FieldType for $ty {
            fn kind() -> $crate::ValueKind {
                $crate::ValueKind::object::<$ty>()
            }

            fn into_value(self) -> $crate::Value {
                $crate::Value::Object(::std::boxed::Box::new(self))
            }

            fn from_value(value: &$crate::Value) -> ::std::option::Option<Self> {
                match value {
                    $crate::Value::Object(object) => {
                        $crate::codec::DynSerializable::as_any(&**object)
                            .downcast_ref::<$ty>()
                            .cloned()
                    }
                    _ => ::std::option::Option::None,
                }
            }
        }
    };
}

/// A named, codec-tagged value inside a message. The name is fixed at
/// creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    value: Value,
    codec: CodecKind,
}

impl Field {
    pub fn new(name: impl Into<String>, value: Value, codec: CodecKind) -> Self {
        Self {
            name: name.into(),
            value,
            codec,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn codec(&self) -> CodecKind {
        self.codec
    }

    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }

    /// Typed read; `None` unless the stored shape matches `T` exactly.
    pub fn get<T: FieldType>(&self) -> Option<T> {
        T::from_value(&self.value)
    }

    /// Typed write; refused unless the new value keeps the field's shape.
    pub fn set<T: FieldType>(&mut self, value: T) -> bool {
        let value = value.into_value();
        if value.kind() != self.value.kind() {
            return false;
        }
        self.value = value;
        true
    }

    pub(crate) fn encode(&self, ctx: &mut EncodeContext<'_>) -> Result<()> {
        codec::encode_value(ctx, &self.value, &self.name, self.codec)
    }

    pub(crate) fn decode(&mut self, ctx: &mut DecodeContext<'_>) -> Result<()> {
        let kind = self.value.kind();
        self.value = codec::decode_value(ctx, &kind, &self.name, self.codec)?;
        Ok(())
    }

    pub(crate) fn encoded_size(&self) -> usize {
        codec::value_size(&self.value, self.codec)
    }
}

/// Ordered set of fields with name lookup.
///
/// Insertion order is the wire order; the index stays consistent with the
/// sequence through every mutation.
#[derive(Debug, Clone, Default)]
pub struct FieldSet {
    fields: Vec<Field>,
    index: HashMap<String, usize>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field, rejecting duplicate names.
    pub fn add(&mut self, field: Field) -> Result<()> {
        if self.index.contains_key(field.name()) {
            return Err(Error::DuplicateField(field.name().to_owned()));
        }
        self.index.insert(field.name().to_owned(), self.fields.len());
        self.fields.push(field);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Whether a field with this name exists *and* stores a `T`.
    pub fn contains_typed<T: FieldType>(&self, name: &str) -> bool {
        self.get(name).is_some_and(|f| f.kind() == T::kind())
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.index.get(name).map(|&i| &mut self.fields[i])
    }

    /// Typed lookup: the value when the name exists and the shape matches.
    pub fn get_typed<T: FieldType>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(Field::get)
    }

    /// Typed store; `false` when the name is absent or the shape differs.
    pub fn set_typed<T: FieldType>(&mut self, name: &str, value: T) -> bool {
        self.get_mut(name).is_some_and(|f| f.set(value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Serializes every field in insertion order.
    pub fn encode(&self, ctx: &mut EncodeContext<'_>) -> Result<()> {
        for field in &self.fields {
            field.encode(ctx)?;
        }
        Ok(())
    }

    /// Deserializes every field in insertion order.
    pub fn decode(&mut self, ctx: &mut DecodeContext<'_>) -> Result<()> {
        for field in &mut self.fields {
            field.decode(ctx)?;
        }
        Ok(())
    }

    /// Exact serialized size of the whole set, in bytes.
    pub fn encoded_size(&self) -> usize {
        self.fields.iter().map(Field::encoded_size).sum()
    }
}

impl PartialEq for FieldSet {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}
