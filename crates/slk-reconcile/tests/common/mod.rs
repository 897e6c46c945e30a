//! Shared test doubles for engine scenario tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use slk_config::{load_layered_yaml_from_strings, SyncConfig};
use slk_gateway::{AccessBackend, CreateCodeRequest, CreateOutcome, DeleteOutcome, RemoteCode};
use slk_notify::{Notifier, NotifyError};
use slk_reconcile::ReconcileEngine;
use slk_schemas::IdempotencyRecord;
use slk_store::{BookingStore, MemoryStore, StoreError};

pub const BASE_CONFIG: &str = r#"
properties:
  locks:
    "464082": "dev-1"
    "598609": "dev-2"
  names:
    "464082": "59 Oak Lane"
    "598609": "333 Dobie"
notify:
  email: "ops@example.com"
"#;

pub fn test_config() -> SyncConfig {
    config_from("")
}

/// Base config with an optional overlay document on top.
pub fn config_from(overlay: &str) -> SyncConfig {
    let docs: Vec<&str> = if overlay.is_empty() {
        vec![BASE_CONFIG]
    } else {
        vec![BASE_CONFIG, overlay]
    };
    load_layered_yaml_from_strings(&docs).unwrap().config
}

pub fn fixed_now() -> DateTime<Utc> {
    "2026-03-10T12:00:00Z".parse().unwrap()
}

// ---------------------------------------------------------------------------
// Gateway double
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    List { device_id: String },
    Create { device_id: String, code: String },
    Delete { access_code_id: String },
}

/// Scripted backend: lists a fixed set of codes, pops canned create /
/// delete outcomes (defaulting to success), and records every call.
#[derive(Default)]
pub struct MockBackend {
    pub codes: Mutex<Vec<RemoteCode>>,
    pub create_script: Mutex<Vec<CreateOutcome>>,
    pub delete_script: Mutex<Vec<DeleteOutcome>>,
    pub calls: Mutex<Vec<GatewayCall>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_codes(codes: Vec<RemoteCode>) -> Arc<Self> {
        let backend = Self::new();
        *backend.codes.lock().unwrap() = codes;
        backend
    }

    pub fn script_create(&self, outcomes: Vec<CreateOutcome>) {
        *self.create_script.lock().unwrap() = outcomes;
    }

    pub fn script_delete(&self, outcomes: Vec<DeleteOutcome>) {
        *self.delete_script.lock().unwrap() = outcomes;
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn create_calls(&self) -> Vec<GatewayCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, GatewayCall::Create { .. }))
            .collect()
    }

    pub fn delete_calls(&self) -> Vec<GatewayCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, GatewayCall::Delete { .. }))
            .collect()
    }
}

impl AccessBackend for MockBackend {
    fn list_codes(&self, device_id: &str) -> Vec<RemoteCode> {
        self.calls.lock().unwrap().push(GatewayCall::List {
            device_id: device_id.to_string(),
        });
        self.codes.lock().unwrap().clone()
    }

    fn create_code(&self, request: &CreateCodeRequest) -> CreateOutcome {
        self.calls.lock().unwrap().push(GatewayCall::Create {
            device_id: request.device_id.clone(),
            code: request.code.clone(),
        });
        let mut script = self.create_script.lock().unwrap();
        if script.is_empty() {
            CreateOutcome::Created {
                access_code_id: Some("ac-new".to_string()),
            }
        } else {
            script.remove(0)
        }
    }

    fn delete_code(&self, access_code_id: &str, _device_id: Option<&str>) -> DeleteOutcome {
        self.calls.lock().unwrap().push(GatewayCall::Delete {
            access_code_id: access_code_id.to_string(),
        });
        let mut script = self.delete_script.lock().unwrap();
        if script.is_empty() {
            DeleteOutcome::Deleted
        } else {
            script.remove(0)
        }
    }
}

/// Orphan-rule-safe wrapper so a shared [`MockBackend`] handle can be boxed
/// as `dyn AccessBackend` while the test keeps its own `Arc` for inspection.
pub struct SharedBackend(pub Arc<MockBackend>);

impl AccessBackend for SharedBackend {
    fn list_codes(&self, device_id: &str) -> Vec<RemoteCode> {
        self.0.list_codes(device_id)
    }

    fn create_code(&self, request: &CreateCodeRequest) -> CreateOutcome {
        self.0.create_code(request)
    }

    fn delete_code(&self, access_code_id: &str, device_id: Option<&str>) -> DeleteOutcome {
        self.0.delete_code(access_code_id, device_id)
    }
}

// ---------------------------------------------------------------------------
// Store / notifier doubles
// ---------------------------------------------------------------------------

/// Shared handle around [`MemoryStore`] so tests can inspect records the
/// engine wrote.
#[derive(Clone)]
pub struct SharedStore(pub Arc<MemoryStore>);

impl SharedStore {
    pub fn new() -> Self {
        Self(Arc::new(MemoryStore::new()))
    }

    pub fn seed(&self, record: &IdempotencyRecord) {
        self.0.put(record).unwrap();
    }

    pub fn record(&self, booking_id: &str) -> Option<IdempotencyRecord> {
        self.0.get(booking_id).unwrap()
    }
}

impl BookingStore for SharedStore {
    fn get(&self, booking_id: &str) -> Result<Option<IdempotencyRecord>, StoreError> {
        self.0.get(booking_id)
    }

    fn put(&self, record: &IdempotencyRecord) -> Result<(), StoreError> {
        self.0.put(record)
    }

    fn delete(&self, booking_id: &str) -> Result<(), StoreError> {
        self.0.delete(booking_id)
    }
}

/// A store whose every operation fails; the engine must degrade, not block.
pub struct FailingStore;

impl BookingStore for FailingStore {
    fn get(&self, _booking_id: &str) -> Result<Option<IdempotencyRecord>, StoreError> {
        Err(StoreError::Io("store offline".to_string()))
    }

    fn put(&self, _record: &IdempotencyRecord) -> Result<(), StoreError> {
        Err(StoreError::Io("store offline".to_string()))
    }

    fn delete(&self, _booking_id: &str) -> Result<(), StoreError> {
        Err(StoreError::Io("store offline".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, recipient: &str, subject: &str, _body: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), subject.to_string()));
        Ok(())
    }
}

/// Orphan-rule-safe wrapper so a shared [`RecordingNotifier`] handle can be
/// boxed as `dyn Notifier` while the test keeps its own `Arc`.
pub struct SharedNotifier(pub Arc<RecordingNotifier>);

impl Notifier for SharedNotifier {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.0.send(recipient, subject, body)
    }
}

// ---------------------------------------------------------------------------
// Wiring helpers
// ---------------------------------------------------------------------------

pub struct Harness {
    pub engine: ReconcileEngine,
    pub backend: Arc<MockBackend>,
    pub store: SharedStore,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn harness(cfg: SyncConfig, backend: Arc<MockBackend>) -> Harness {
    let store = SharedStore::new();
    let notifier = RecordingNotifier::new();
    let engine = ReconcileEngine::new(
        cfg,
        Box::new(SharedBackend(Arc::clone(&backend))),
        Box::new(store.clone()),
        Box::new(SharedNotifier(Arc::clone(&notifier))),
    );
    Harness {
        engine,
        backend,
        store,
        notifier,
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn remote_code(
    access_code_id: &str,
    code: &str,
    starts_at: Option<&str>,
    ends_at: Option<&str>,
) -> RemoteCode {
    RemoteCode {
        access_code_id: Some(access_code_id.to_string()),
        code: code.to_string(),
        starts_at: starts_at.map(String::from),
        ends_at: ends_at.map(String::from),
        is_managed: None,
        kind: None,
        name: None,
    }
}

/// A confirmed booking for 59 Oak Lane, Mar 1-4 2026, phone-derived code
/// `5309`, booking-id fallback code `1001`.
pub fn confirmed_event() -> serde_json::Value {
    serde_json::json!({
        "action": "reservation.created",
        "booking": {
            "id": "bk-1001",
            "property_id": "464082",
            "status": "confirmed",
            "date_arrival": "2026-03-01",
            "date_departure": "2026-03-04",
            "guest": {"name": "Pat Quinn", "phone_number": "+1 (555) 867-5309"}
        }
    })
}

pub fn cancellation_event() -> serde_json::Value {
    serde_json::json!({
        "action": "reservation.cancelled",
        "booking": {
            "id": "bk-1001",
            "property_id": "464082",
            "status": "cancelled",
            "date_arrival": "2026-03-01",
            "date_departure": "2026-03-04",
            "guest": {"name": "Pat Quinn", "phone_number": "+1 (555) 867-5309"}
        }
    })
}

/// The record a successful provisioning of [`confirmed_event`] writes.
pub fn provisioned_record() -> IdempotencyRecord {
    IdempotencyRecord {
        booking_id: "bk-1001".to_string(),
        property_id: "464082".to_string(),
        device_id: "dev-1".to_string(),
        access_code_id: Some("ac-old".to_string()),
        code: "5309".to_string(),
        starts_at: DateTime::parse_from_rfc3339("2026-03-01T12:30:00-05:00").unwrap(),
        ends_at: DateTime::parse_from_rfc3339("2026-03-04T13:00:00-05:00").unwrap(),
        guest_name: "Pat Quinn".to_string(),
        code_source: slk_schemas::CodeSource::Phone,
        updated_at: fixed_now(),
        expires_at: None,
    }
}
