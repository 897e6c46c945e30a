//! Idempotency store: best-effort persistence of the last provisioned
//! code per booking.
//!
//! The contract is get / put / delete, nothing more. Callers must not
//! assume durability or strong consistency: a missing record means
//! "state unknown", not "nothing was ever provisioned", and the engine
//! swallows every [`StoreError`] rather than letting store availability
//! block provisioning or deletion decisions.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use slk_schemas::IdempotencyRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Io(String),
    /// A persisted record exists but cannot be decoded.
    Corrupt { booking_id: String, detail: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(msg) => write!(f, "store io error: {msg}"),
            StoreError::Corrupt { booking_id, detail } => {
                write!(f, "corrupt record for booking '{booking_id}': {detail}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// The persistence contract. Implementations must be `Send + Sync`; the
/// engine holds a `Box<dyn BookingStore>`.
pub trait BookingStore: Send + Sync {
    fn get(&self, booking_id: &str) -> Result<Option<IdempotencyRecord>, StoreError>;
    fn put(&self, record: &IdempotencyRecord) -> Result<(), StoreError>;
    fn delete(&self, booking_id: &str) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local store. State dies with the process; useful for tests and
/// for running with persistence disabled.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, IdempotencyRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BookingStore for MemoryStore {
    fn get(&self, booking_id: &str) -> Result<Option<IdempotencyRecord>, StoreError> {
        Ok(self.records.lock().unwrap().get(booking_id).cloned())
    }

    fn put(&self, record: &IdempotencyRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap()
            .insert(record.booking_id.clone(), record.clone());
        Ok(())
    }

    fn delete(&self, booking_id: &str) -> Result<(), StoreError> {
        self.records.lock().unwrap().remove(booking_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON-file store
// ---------------------------------------------------------------------------

/// One pretty-printed JSON file per booking under a directory.
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Creates the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(Self { root })
    }

    /// Booking ids come from external payloads; keep filenames to a safe
    /// alphabet.
    fn sanitize(booking_id: &str) -> String {
        let cleaned: String = booking_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if cleaned.is_empty() {
            "_".to_string()
        } else {
            cleaned
        }
    }

    fn path_for(&self, booking_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", Self::sanitize(booking_id)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BookingStore for JsonFileStore {
    fn get(&self, booking_id: &str) -> Result<Option<IdempotencyRecord>, StoreError> {
        let path = self.path_for(booking_id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };
        let record: IdempotencyRecord =
            serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                booking_id: booking_id.to_string(),
                detail: e.to_string(),
            })?;
        Ok(Some(record))
    }

    fn put(&self, record: &IdempotencyRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        fs::write(self.path_for(&record.booking_id), format!("{json}\n"))
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    fn delete(&self, booking_id: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(booking_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e.to_string())),
        }
    }
}
