//! Schema registration, message construction and binary round-trips
//! through the public API.

mod common;

use common::FakeTransport;
use msglink::codec::{decode_value, encode_value};
use msglink::{
    composite_field, CodecKind, DecodeContext, EncodeContext, Error, FieldType, MessageFactory,
    Result, Serializable, SessionManager, ValueKind,
};
use std::sync::Arc;

const TELEMETRY: u16 = 0;
const UNREGISTERED: u16 = 1;

fn telemetry_factory() -> Arc<MessageFactory> {
    let factory = MessageFactory::new();
    factory
        .define(TELEMETRY, |d| {
            d.register_field::<i32>("a")?.register_field::<i32>("b")?;
            Ok(())
        })
        .unwrap();
    Arc::new(factory)
}

#[test]
fn created_message_holds_zeroed_schema_fields() {
    let factory = telemetry_factory();
    let manager = SessionManager::new();
    let session = manager.create_session(Box::new(FakeTransport::new()));

    let msg = factory.create_message(TELEMETRY, &session).unwrap();
    assert_eq!(msg.get::<i32>("a").unwrap(), 0);
    assert_eq!(msg.get::<i32>("b").unwrap(), 0);
    assert_eq!(msg.message_type(), TELEMETRY);
    assert_eq!(msg.session_id(), session.id());
}

#[test]
fn unregistered_type_is_refused() {
    let factory = telemetry_factory();
    let manager = SessionManager::new();
    let session = manager.create_session(Box::new(FakeTransport::new()));

    let err = factory.create_message(UNREGISTERED, &session).unwrap_err();
    assert!(matches!(err, Error::UnknownMessageType(UNREGISTERED)));
}

#[test]
fn duplicate_field_registration_is_refused() {
    let factory = MessageFactory::new();
    let err = factory
        .define(2, |d| {
            d.register_field::<i32>("x")?.register_field::<bool>("x")?;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateField(name) if name == "x"));
}

#[test]
fn re_registering_a_type_keeps_the_first_schema() {
    let factory = telemetry_factory();
    let registered = factory
        .define(TELEMETRY, |d| {
            d.register_field::<String>("other")?;
            Ok(())
        })
        .unwrap();
    assert!(!registered);

    let manager = SessionManager::new();
    let session = manager.create_session(Box::new(FakeTransport::new()));
    let msg = factory.create_message(TELEMETRY, &session).unwrap();
    assert!(msg.has_field("a"));
    assert!(!msg.has_field("other"));
}

#[test]
fn typed_accessor_refuses_wrong_type_and_unknown_name() {
    let factory = telemetry_factory();
    let manager = SessionManager::new();
    let session = manager.create_session(Box::new(FakeTransport::new()));
    let msg = factory.create_message(TELEMETRY, &session).unwrap();

    let err = msg.get::<i64>("a").unwrap_err();
    assert!(matches!(
        &err,
        Error::FieldDoesNotExist { name, session_id, .. }
            if name == "a" && *session_id == session.id()
    ));
    assert!(msg.get::<i32>("missing").is_err());
}

#[test]
fn binary_round_trip_compares_field_equal() {
    let factory = telemetry_factory();
    let manager = SessionManager::new();
    let session = manager.create_session(Box::new(FakeTransport::new()));

    let mut original = factory.create_message(TELEMETRY, &session).unwrap();
    original.set("a", 10i32).unwrap();
    original.set("b", 20i32).unwrap();

    let mut wire = Vec::new();
    original.encode(&mut EncodeContext::binary(&mut wire)).unwrap();
    assert_eq!(wire.len(), original.encoded_size());

    let mut decoded = factory.create_message(TELEMETRY, &session).unwrap();
    decoded.decode(&mut DecodeContext::binary(&wire)).unwrap();

    assert!(original.fields_eq(&decoded));
    assert_eq!(decoded.get::<i32>("a").unwrap(), 10);
    assert_eq!(decoded.get::<i32>("b").unwrap(), 20);
    assert_ne!(original.id(), decoded.id(), "message ids are never reused");
}

#[test]
fn clone_deep_copies_fields_and_assigns_a_fresh_id() {
    let factory = telemetry_factory();
    let manager = SessionManager::new();
    let session = manager.create_session(Box::new(FakeTransport::new()));

    let mut original = factory.create_message(TELEMETRY, &session).unwrap();
    original.set("a", 5i32).unwrap();

    let mut copy = original.clone();
    assert!(original.fields_eq(&copy));
    assert_ne!(original.id(), copy.id());

    copy.set("a", 6i32).unwrap();
    assert_eq!(original.get::<i32>("a").unwrap(), 5);
}

#[derive(Debug, Clone, PartialEq, Default)]
struct GeoPoint {
    lat: f64,
    lon: f64,
}

impl Serializable for GeoPoint {
    fn encode(&self, ctx: &mut EncodeContext<'_>) -> Result<()> {
        encode_value(ctx, &self.lat.into_value(), "lat", CodecKind::Binary)?;
        encode_value(ctx, &self.lon.into_value(), "lon", CodecKind::Binary)
    }

    fn decode(&mut self, ctx: &mut DecodeContext<'_>) -> Result<()> {
        let lat = decode_value(ctx, &ValueKind::F64, "lat", CodecKind::Binary)?;
        let lon = decode_value(ctx, &ValueKind::F64, "lon", CodecKind::Binary)?;
        self.lat = f64::from_value(&lat).ok_or(Error::UnexpectedEof)?;
        self.lon = f64::from_value(&lon).ok_or(Error::UnexpectedEof)?;
        Ok(())
    }

    fn encoded_size(&self) -> usize {
        16
    }
}

composite_field!(GeoPoint);

#[test]
fn nested_composite_round_trips_inside_a_message() {
    let factory = MessageFactory::new();
    factory
        .define(3, |d| {
            d.register_field::<GeoPoint>("origin")?
                .register_field::<Vec<GeoPoint>>("track")?;
            Ok(())
        })
        .unwrap();

    let manager = SessionManager::new();
    let session = manager.create_session(Box::new(FakeTransport::new()));

    let mut original = factory.create_message(3, &session).unwrap();
    original
        .set("origin", GeoPoint { lat: 48.2, lon: 16.3 })
        .unwrap();
    original
        .set(
            "track",
            vec![
                GeoPoint { lat: 48.3, lon: 16.4 },
                GeoPoint { lat: 48.4, lon: 16.5 },
            ],
        )
        .unwrap();

    let mut wire = Vec::new();
    original.encode(&mut EncodeContext::binary(&mut wire)).unwrap();
    assert_eq!(wire.len(), original.encoded_size());

    let mut decoded = factory.create_message(3, &session).unwrap();
    decoded.decode(&mut DecodeContext::binary(&wire)).unwrap();

    assert!(original.fields_eq(&decoded));
    assert_eq!(
        decoded.get::<GeoPoint>("origin").unwrap(),
        GeoPoint { lat: 48.2, lon: 16.3 }
    );
    assert_eq!(decoded.get::<Vec<GeoPoint>>("track").unwrap().len(), 2);
}
