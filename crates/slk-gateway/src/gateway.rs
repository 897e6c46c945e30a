//! The access-backend contract and its HTTP implementation.

use serde_json::Value;
use slk_schemas::StayWindow;
use tracing::{error, info};

use crate::matching;
use crate::transport::LockTransport;
use crate::types::{CreateCodeRequest, CreateOutcome, DeleteOutcome, RemoteCode};

const LIST_PATH: &str = "/access_codes/list";
const CREATE_PATH: &str = "/access_codes/create";
const DELETE_PATH: &str = "/access_codes/delete";

/// Capped page size for listing queries.
const PAGE_SIZE: u64 = 200;

/// Remote access-code operations, as the engine consumes them.
///
/// Object-safe so the engine can hold a `Box<dyn AccessBackend>`; tests
/// substitute scripted in-process implementations.
pub trait AccessBackend: Send + Sync {
    /// All codes on a device, concatenated across pages. A transport or
    /// decode failure stops pagination and returns what was collected:
    /// callers treat a short list as inconclusive, not as "no codes".
    fn list_codes(&self, device_id: &str) -> Vec<RemoteCode>;

    fn create_code(&self, request: &CreateCodeRequest) -> CreateOutcome;

    fn delete_code(&self, access_code_id: &str, device_id: Option<&str>) -> DeleteOutcome;

    /// List + tolerance match: exact code value, both window edges within
    /// `tolerance_minutes`. Used to resolve duplicate-creation races and
    /// to locate codes with no locally-stored remote identifier.
    fn find_matching(
        &self,
        device_id: &str,
        code: &str,
        window: &StayWindow,
        tolerance_minutes: i64,
    ) -> Option<RemoteCode> {
        let codes = self.list_codes(device_id);
        matching::find_matching(&codes, code, window, tolerance_minutes).cloned()
    }
}

/// Production gateway over a [`LockTransport`].
pub struct HttpAccessGateway {
    transport: Box<dyn LockTransport>,
    /// Treat 409/422 "duplicate access code" message text as a duplicate
    /// even without the structured error type.
    duplicate_fallback: bool,
}

impl HttpAccessGateway {
    pub fn new(transport: Box<dyn LockTransport>, duplicate_fallback: bool) -> Self {
        Self {
            transport,
            duplicate_fallback,
        }
    }
}

/// Pull the entry array and pagination object out of whichever response
/// shape the service produced: a bare array, `{access_codes: [...]}`, or
/// `{data: [...]}`.
fn extract_codes(data: &Value) -> (Vec<RemoteCode>, Value) {
    if let Value::Array(items) = data {
        let codes = items.iter().filter_map(RemoteCode::from_value).collect();
        return (codes, Value::Null);
    }

    let Some(obj) = data.as_object() else {
        return (Vec::new(), Value::Null);
    };

    let entries = if let Some(list) = obj.get("access_codes").and_then(Value::as_array) {
        list.as_slice()
    } else if let Some(list) = obj.get("data").and_then(Value::as_array) {
        list.as_slice()
    } else {
        &[]
    };

    let pagination = obj.get("pagination").cloned().unwrap_or(Value::Null);
    (
        entries.iter().filter_map(RemoteCode::from_value).collect(),
        pagination,
    )
}

/// Dig the remote id out of a create response: `access_code_id` / `id` at
/// the top level, or nested under `access_code` / `data`.
fn extract_access_code_id(data: &Value) -> Option<String> {
    for key in ["access_code_id", "id"] {
        if let Some(id) = data.get(key).and_then(Value::as_str) {
            return Some(id.to_string());
        }
    }
    for nest in ["access_code", "data"] {
        for key in ["access_code_id", "id"] {
            if let Some(id) = data.get(nest).and_then(|v| v.get(key)).and_then(Value::as_str) {
                return Some(id.to_string());
            }
        }
    }
    None
}

/// Structured error type from an error body, when present.
fn extract_error_type(body: &str) -> String {
    let Ok(data) = serde_json::from_str::<Value>(body) else {
        return String::new();
    };
    data.get("error")
        .and_then(|e| e.get("type"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

impl AccessBackend for HttpAccessGateway {
    fn list_codes(&self, device_id: &str) -> Vec<RemoteCode> {
        let mut codes: Vec<RemoteCode> = Vec::new();
        let mut page_cursor: Option<String> = None;

        loop {
            let mut payload = serde_json::json!({
                "device_id": device_id,
                "limit": PAGE_SIZE,
            });
            if let Some(cursor) = &page_cursor {
                payload["page_cursor"] = Value::String(cursor.clone());
            }

            let reply = match self.transport.post_json(LIST_PATH, &payload) {
                Ok(r) => r,
                Err(e) => {
                    error!(device_id, %e, "listing access codes failed");
                    break;
                }
            };

            // Some deployments only serve the list call as GET.
            let reply = if reply.status == 404 || reply.status == 405 {
                match self.transport.get_json(LIST_PATH, &payload) {
                    Ok(r) => r,
                    Err(e) => {
                        error!(device_id, %e, "listing access codes failed");
                        break;
                    }
                }
            } else {
                reply
            };

            if !reply.is_success() {
                error!(
                    device_id,
                    status = reply.status,
                    body = %reply.body,
                    "listing access codes failed"
                );
                break;
            }

            let data: Value = match serde_json::from_str(&reply.body) {
                Ok(v) => v,
                Err(_) => {
                    error!(device_id, "undecodable listing response");
                    break;
                }
            };

            let (batch, pagination) = extract_codes(&data);
            codes.extend(batch);

            let has_next = pagination
                .get("has_next_page")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if !has_next {
                break;
            }
            match pagination.get("next_page_cursor").and_then(Value::as_str) {
                Some(cursor) if !cursor.is_empty() => {
                    page_cursor = Some(cursor.to_string());
                }
                _ => break,
            }
        }

        codes
    }

    fn create_code(&self, request: &CreateCodeRequest) -> CreateOutcome {
        let payload = request.payload();
        let reply = match self.transport.post_json(CREATE_PATH, &payload) {
            Ok(r) => r,
            Err(e) => {
                error!(device_id = %request.device_id, %e, "create request failed");
                return CreateOutcome::Failed {
                    status: None,
                    message: e.to_string(),
                };
            }
        };

        if reply.is_success() {
            let access_code_id = serde_json::from_str::<Value>(&reply.body)
                .ok()
                .as_ref()
                .and_then(extract_access_code_id);
            return CreateOutcome::Created { access_code_id };
        }

        if extract_error_type(&reply.body) == "duplicate_access_code" {
            return CreateOutcome::Duplicate;
        }

        if self.duplicate_fallback
            && matches!(reply.status, 409 | 422)
            && reply.body.to_lowercase().contains("duplicate access code")
        {
            return CreateOutcome::Duplicate;
        }

        error!(
            device_id = %request.device_id,
            status = reply.status,
            body = %reply.body,
            "create rejected by lock service"
        );
        CreateOutcome::Failed {
            status: Some(reply.status),
            message: reply.body,
        }
    }

    fn delete_code(&self, access_code_id: &str, device_id: Option<&str>) -> DeleteOutcome {
        let mut payload = serde_json::json!({ "access_code_id": access_code_id });
        if let Some(device_id) = device_id {
            payload["device_id"] = Value::String(device_id.to_string());
        }

        let reply = match self.transport.post_json(DELETE_PATH, &payload) {
            Ok(r) => r,
            Err(e) => {
                error!(access_code_id, %e, "delete request failed");
                return DeleteOutcome::Failed {
                    status: None,
                    message: e.to_string(),
                };
            }
        };

        if reply.is_success() {
            return DeleteOutcome::Deleted;
        }

        if matches!(reply.status, 404 | 410 | 422) && reply.body.to_lowercase().contains("not") {
            info!(access_code_id, "access code already deleted");
            return DeleteOutcome::AlreadyGone;
        }

        error!(
            access_code_id,
            status = reply.status,
            body = %reply.body,
            "delete rejected by lock service"
        );
        DeleteOutcome::Failed {
            status: Some(reply.status),
            message: reply.body,
        }
    }
}
