//! Session manager lifecycle, identifier allocation and lookup.

mod common;

use std::sync::Arc;

use common::FakeTransport;
use msglink::{SessionId, SessionManager, INVALID_SESSION_ID};
use parking_lot::Mutex;

#[test]
fn session_ids_are_unique_monotonic_and_never_zero() {
    let manager = SessionManager::new();

    let mut previous: SessionId = INVALID_SESSION_ID;
    for _ in 0..50 {
        let session = manager.create_session(Box::new(FakeTransport::new()));
        assert_ne!(session.id(), INVALID_SESSION_ID);
        assert!(session.id() > previous, "ids must increase monotonically");
        previous = session.id();
    }
    assert_eq!(manager.len(), 50);
}

#[test]
fn create_starts_the_transport_and_terminate_stops_it() {
    let manager = SessionManager::new();
    let transport = FakeTransport::new();
    let session = manager.create_session(Box::new(transport.clone()));

    assert!(session.active());
    assert!(manager.has_session(session.id()));

    assert!(manager.terminate(session.id()));
    assert!(!session.active());
    assert!(!manager.has_session(session.id()));
    assert!(!manager.terminate(session.id()), "already removed");
}

#[test]
fn lifecycle_callbacks_fire_in_order() {
    let manager = SessionManager::new();
    let log: Arc<Mutex<Vec<(&'static str, SessionId, bool)>>> = Arc::default();

    let sink = log.clone();
    manager.set_on_session_opened(move |s| sink.lock().push(("opened", s.id(), s.active())));
    let sink = log.clone();
    manager
        .set_on_session_terminating(move |s| sink.lock().push(("terminating", s.id(), s.active())));
    let sink = log.clone();
    manager
        .set_on_session_terminated(move |s| sink.lock().push(("terminated", s.id(), s.active())));

    let session = manager.create_session(Box::new(FakeTransport::new()));
    manager.terminate(session.id());

    let events = log.lock();
    assert_eq!(
        events.as_slice(),
        [
            ("opened", session.id(), true),
            // The session is still active when termination is announced and
            // already shut down when it is confirmed.
            ("terminating", session.id(), true),
            ("terminated", session.id(), false),
        ]
    );
}

#[test]
fn panicking_callbacks_are_swallowed() {
    let manager = SessionManager::new();
    manager.set_on_session_opened(|_| panic!("listener bug"));
    manager.set_on_session_terminating(|_| panic!("listener bug"));

    let session = manager.create_session(Box::new(FakeTransport::new()));
    manager.terminate_all();
    assert!(!manager.has_session(session.id()));
    assert!(manager.is_empty());
}

#[test]
fn find_scans_under_the_lock() {
    let manager = SessionManager::new();
    let a = manager.create_session(Box::new(FakeTransport::new()));
    let b = manager.create_session(Box::new(FakeTransport::new()));

    let hit = manager.find(|s| s.id() == b.id()).unwrap();
    assert_eq!(hit.id(), b.id());
    assert!(manager.find(|_| false).is_none());

    let _ = a;
}

#[test]
fn find_by_property_matches_typed_values() {
    let manager = SessionManager::new();
    let a = manager.create_session(Box::new(FakeTransport::new()));
    let b = manager.create_session(Box::new(FakeTransport::new()));

    a.properties().set("topic", "prices".to_string());
    b.properties().set("topic", "orders".to_string());
    b.properties().set("limit", 10u32);

    let hit = manager
        .find_by_property("topic", &"orders".to_string())
        .unwrap();
    assert_eq!(hit.id(), b.id());

    assert!(manager.find_by_property("topic", &"trades".to_string()).is_none());
    // Same value, different type: no coercion.
    assert!(manager.find_by_property("limit", &10u64).is_none());
    assert!(manager.find_by_property("limit", &10u32).is_some());
}

#[test]
fn terminate_all_clears_every_session() {
    let manager = SessionManager::new();
    let sessions: Vec<_> = (0..5)
        .map(|_| manager.create_session(Box::new(FakeTransport::new())))
        .collect();

    manager.terminate_all();

    assert!(manager.is_empty());
    for session in sessions {
        assert!(!session.active());
    }
}
