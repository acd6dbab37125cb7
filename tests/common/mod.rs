#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tutor_booking::auth::{MemoryStore, SessionStore, ACCESS_KEY, REFRESH_KEY};
use tutor_booking::config::ClientOptions;
use tutor_booking::TutorBooking;
use wiremock::MockServer;

pub fn options(server: &MockServer) -> ClientOptions {
    ClientOptions::default()
        .with_api_url(&format!("{}/api/", server.uri()))
        .with_request_timeout(Some(Duration::from_millis(500)))
}

/// Client whose store already holds the given tokens
pub fn client(server: &MockServer, access: Option<&str>, refresh: Option<&str>) -> (TutorBooking, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    if let Some(access) = access {
        store.set(ACCESS_KEY, access).unwrap();
    }
    if let Some(refresh) = refresh {
        store.set(REFRESH_KEY, refresh).unwrap();
    }
    let client = TutorBooking::with_store(options(server), store.clone()).unwrap();
    (client, store)
}

pub fn group_json(id: i64, seats_left: i64) -> Value {
    json!({
        "id": id,
        "name": format!("Group {}", id),
        "stage": "GRADE6",
        "capacity": 10,
        "schedule": "4:00 PM",
        "days": "سبت، تلات",
        "students": [],
        "seats_left": seats_left,
        "is_full": seats_left <= 0,
        "created_at": "2025-09-01T10:00:00Z",
        "updated_at": "2025-09-01T10:00:00Z"
    })
}

pub fn booking_json(id: i64, group: i64) -> Value {
    json!({"id": id, "student": 4, "group": group, "booked_at": "2025-09-10T12:00:00Z"})
}
