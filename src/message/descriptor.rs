//! Message schemas: the ordered, named description of a message type's
//! fields. Descriptors are immutable once registered with the factory.

use std::collections::HashSet;

use crate::codec::CodecKind;
use crate::error::{Error, Result};
use crate::message::field::{Field, FieldSet, FieldType, Value};
use crate::message::MessageType;

/// Describes one field: its name, the prototype value that stamps fresh
/// typed fields, and the codec that owns the field on the wire.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    prototype: Value,
    codec: CodecKind,
}

impl FieldDescriptor {
    /// Descriptor for a `T`-shaped field handled by the binary codec.
    pub fn new<T: FieldType + Default>(name: impl Into<String>) -> Self {
        Self::with_codec::<T>(name, CodecKind::Binary)
    }

    /// Descriptor for a `T`-shaped field handled by the given codec.
    pub fn with_codec<T: FieldType + Default>(name: impl Into<String>, codec: CodecKind) -> Self {
        Self {
            name: name.into(),
            prototype: T::default().into_value(),
            codec,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stamps a fresh field from the prototype.
    pub(crate) fn create_field(&self) -> Field {
        Field::new(self.name.clone(), self.prototype.clone(), self.codec)
    }
}

/// Schema of one message type: field descriptors in registration order.
#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    message_type: MessageType,
    fields: Vec<FieldDescriptor>,
    names: HashSet<String>,
}

impl MessageDescriptor {
    pub fn new(message_type: MessageType) -> Self {
        Self {
            message_type,
            fields: Vec::new(),
            names: HashSet::new(),
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Registers a `T`-shaped binary field. Fails with
    /// [`Error::DuplicateField`] when the name is taken; chainable via `?`.
    pub fn register_field<T: FieldType + Default>(
        &mut self,
        name: impl Into<String>,
    ) -> Result<&mut Self> {
        self.add_field_descriptor(FieldDescriptor::new::<T>(name))
    }

    /// Registers a `T`-shaped field owned by the given codec.
    pub fn register_field_with<T: FieldType + Default>(
        &mut self,
        name: impl Into<String>,
        codec: CodecKind,
    ) -> Result<&mut Self> {
        self.add_field_descriptor(FieldDescriptor::with_codec::<T>(name, codec))
    }

    /// Appends a prebuilt field descriptor.
    pub fn add_field_descriptor(&mut self, descriptor: FieldDescriptor) -> Result<&mut Self> {
        if !self.names.insert(descriptor.name().to_owned()) {
            return Err(Error::DuplicateField(descriptor.name().to_owned()));
        }
        self.fields.push(descriptor);
        Ok(self)
    }

    pub fn field_descriptors(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Builds the field set of a fresh message, in registration order.
    pub(crate) fn instantiate(&self) -> FieldSet {
        let mut set = FieldSet::new();
        for descriptor in &self.fields {
            // Duplicates were rejected at registration.
            let _ = set.add(descriptor.create_field());
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_order_is_wire_order() {
        let mut descriptor = MessageDescriptor::new(4);
        descriptor
            .register_field::<i32>("first")
            .unwrap()
            .register_field::<String>("second")
            .unwrap()
            .register_field::<bool>("third")
            .unwrap();

        let names: Vec<_> = descriptor
            .field_descriptors()
            .iter()
            .map(|d| d.name().to_owned())
            .collect();
        assert_eq!(names, ["first", "second", "third"]);
    }

    #[test]
    fn duplicate_field_registration_fails() {
        let mut descriptor = MessageDescriptor::new(4);
        descriptor.register_field::<i32>("x").unwrap();
        let err = descriptor.register_field::<i32>("x").unwrap_err();
        assert!(matches!(err, Error::DuplicateField(name) if name == "x"));
        assert_eq!(descriptor.field_descriptors().len(), 1);
    }

    #[test]
    fn instantiated_fields_hold_zero_values() {
        let mut descriptor = MessageDescriptor::new(9);
        descriptor
            .register_field::<i64>("count")
            .unwrap()
            .register_field::<Option<String>>("label")
            .unwrap();

        let fields = descriptor.instantiate();
        assert_eq!(fields.get_typed::<i64>("count"), Some(0));
        assert_eq!(fields.get_typed::<Option<String>>("label"), Some(None));
    }
}
