//! Wire-facing gateway types and outcome classifications.

use serde_json::Value;
use slk_schemas::StayWindow;

/// An access code as listed by the remote service. Fields the service
/// omits stay `None`; callers skip entries they cannot interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCode {
    pub access_code_id: Option<String>,
    pub code: String,
    pub starts_at: Option<String>,
    pub ends_at: Option<String>,
    /// `false` when the service explicitly flags the code as unmanaged.
    pub is_managed: Option<bool>,
    /// The service's `type` field (e.g. `"time_bound"`, `"ongoing"`).
    pub kind: Option<String>,
    pub name: Option<String>,
}

fn value_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl RemoteCode {
    /// Decode one listing entry. Entries without a `code` value are
    /// useless to every caller and come back as `None`.
    pub fn from_value(entry: &Value) -> Option<Self> {
        let obj = entry.as_object()?;
        let code = obj.get("code").and_then(value_string)?;
        Some(Self {
            access_code_id: obj.get("access_code_id").and_then(value_string),
            code,
            starts_at: obj.get("starts_at").and_then(value_string),
            ends_at: obj.get("ends_at").and_then(value_string),
            is_managed: obj.get("is_managed").and_then(Value::as_bool),
            kind: obj.get("type").and_then(value_string),
            name: obj.get("name").and_then(value_string),
        })
    }
}

/// Parameters for one code creation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCodeRequest {
    pub device_id: String,
    pub code: String,
    /// Label shown in the lock service's dashboard; truncated to 20 chars
    /// at the wire.
    pub name: String,
    pub window: StayWindow,
}

impl CreateCodeRequest {
    pub fn payload(&self) -> Value {
        let name: String = self.name.chars().take(20).collect();
        serde_json::json!({
            "device_id": self.device_id,
            "code": self.code,
            "name": name,
            "starts_at": self.window.starts_at.to_rfc3339(),
            "ends_at": self.window.ends_at.to_rfc3339(),
        })
    }
}

/// Classified result of a create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Created; the service may or may not have returned a remote id.
    Created { access_code_id: Option<String> },
    /// The service reported the code/window already exists instead of
    /// confirming creation.
    Duplicate,
    /// Anything else: transport failure or an unclassified non-2xx.
    Failed { status: Option<u16>, message: String },
}

/// Classified result of a delete call. Deleting twice never fails: a
/// response that says the code no longer exists is a success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyGone,
    Failed { status: Option<u16>, message: String },
}

impl DeleteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted | DeleteOutcome::AlreadyGone)
    }
}
