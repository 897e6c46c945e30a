//! Layered configuration for the access-code sync engine.
//!
//! YAML documents are deep-merged in order (later documents override
//! earlier ones), canonicalized, hashed, and deserialized into one
//! immutable [`SyncConfig`] that is constructed once and passed by
//! reference into the engine, gateway, and store constructors. No module
//! reads the environment for configuration after startup; secrets are
//! resolved separately in [`secrets`].

use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use tracing::warn;

pub mod secrets;

/// Known secret-like prefixes. If any leaf string value in the effective
/// config starts with one of these, loading aborts: config files carry env
/// var NAMES, never credential values.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",        // Stripe / OpenAI style
    "sk_live",    // Stripe live
    "sk_test",    // Stripe test
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "gho_",       // GitHub OAuth
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
    "xoxp-",      // Slack user token
    "seam_",      // Seam-style lock-service API keys
];

// ---------------------------------------------------------------------------
// Typed config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PropertyTables {
    /// Property id -> lock device id.
    pub locks: BTreeMap<String, String>,
    /// Property id -> display name.
    pub names: BTreeMap<String, String>,
    /// Property id -> IANA timezone name. Missing entries fall back to
    /// `defaults.timezone`.
    pub timezones: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DefaultsSection {
    pub timezone: String,
    /// Local check-in clock time, `HH:MM`.
    pub checkin_time: String,
    /// Local check-out clock time, `HH:MM`.
    pub checkout_time: String,
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            timezone: "US/Eastern".to_string(),
            checkin_time: "12:30".to_string(),
            checkout_time: "13:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingSection {
    /// Permitted deviation, in minutes, when deciding two window edges
    /// "are the same".
    pub tolerance_minutes: i64,
    /// Escape hatch: on cancellation, fall back to code-value-only matching
    /// when no window-qualified match exists. Can match an unrelated code
    /// that shares the same 4 digits on a shared device; deliberately
    /// best-effort for malformed or legacy codes.
    pub allow_code_only: bool,
    /// Treat 409/422 "duplicate access code" message text as a duplicate
    /// even without the service's structured error type.
    pub duplicate_is_success: bool,
}

impl Default for MatchingSection {
    fn default() -> Self {
        Self {
            tolerance_minutes: 15,
            allow_code_only: false,
            duplicate_is_success: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleanupSection {
    /// Delay after a stay's end before the sweep considers a leftover code
    /// safe to remove. Fractional days allowed.
    pub grace_days: f64,
    /// Only touch codes the service flags as managed.
    pub only_managed: bool,
    /// Only touch time-bound codes.
    pub only_timebound: bool,
    /// Report what would be deleted without issuing deletes.
    pub dry_run: bool,
}

impl Default for CleanupSection {
    fn default() -> Self {
        Self {
            grace_days: 1.0,
            only_managed: true,
            only_timebound: true,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventsSection {
    pub cancelled_statuses: Vec<String>,
    pub cancel_keywords: Vec<String>,
    /// Top-level `source` value that marks a scheduled cleanup trigger.
    pub scheduler_source: String,
}

impl Default for EventsSection {
    fn default() -> Self {
        Self {
            cancelled_statuses: vec![
                "cancelled".to_string(),
                "canceled".to_string(),
                "declined".to_string(),
            ],
            cancel_keywords: vec!["cancel".to_string(), "decline".to_string()],
            scheduler_source: "scheduler".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LockApiSection {
    pub base_url: String,
    /// Env var NAME holding the bearer token. The value itself never
    /// appears in config files.
    pub key_env: String,
}

impl Default for LockApiSection {
    fn default() -> Self {
        Self {
            base_url: "https://connect.getseam.com".to_string(),
            key_env: "SLK_LOCK_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct NotifySection {
    /// Confirmation recipient. Empty disables sending.
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StoreSection {
    /// Idempotency record TTL in days past the stay end; 0 disables the
    /// expiry stamp.
    pub ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SyncConfig {
    pub properties: PropertyTables,
    pub defaults: DefaultsSection,
    pub matching: MatchingSection,
    pub cleanup: CleanupSection,
    pub events: EventsSection,
    pub lock_api: LockApiSection,
    pub notify: NotifySection,
    pub store: StoreSection,
}

impl SyncConfig {
    pub fn device_for(&self, property_id: &str) -> Option<&str> {
        self.properties.locks.get(property_id).map(String::as_str)
    }

    pub fn display_name_for(&self, property_id: &str) -> Option<&str> {
        self.properties.names.get(property_id).map(String::as_str)
    }

    /// Reverse lookup table for by-name property resolution. Keys are
    /// trimmed and lowercased display names.
    pub fn name_to_id(&self) -> BTreeMap<String, String> {
        self.properties
            .names
            .iter()
            .map(|(id, name)| (name.trim().to_lowercase(), id.clone()))
            .collect()
    }

    /// Property timezone, falling back to the configured default.
    /// Unknown IANA names are a startup error, not a per-event one.
    pub fn timezone_for(&self, property_id: &str) -> Result<Tz> {
        let name = self
            .properties
            .timezones
            .get(property_id)
            .unwrap_or(&self.defaults.timezone);
        name.parse::<Tz>()
            .map_err(|_| anyhow::anyhow!("unknown timezone name: '{name}'"))
    }

    pub fn checkin_time(&self) -> NaiveTime {
        parse_hhmm(
            &self.defaults.checkin_time,
            NaiveTime::from_hms_opt(12, 30, 0).unwrap(),
        )
    }

    pub fn checkout_time(&self) -> NaiveTime {
        parse_hhmm(
            &self.defaults.checkout_time,
            NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
        )
    }

    pub fn is_cancelled_status(&self, status: &str) -> bool {
        !status.is_empty()
            && self
                .events
                .cancelled_statuses
                .iter()
                .any(|s| s.eq_ignore_ascii_case(status))
    }

    pub fn is_cancel_action(&self, action: &str) -> bool {
        !action.is_empty()
            && self
                .events
                .cancel_keywords
                .iter()
                .any(|k| action.contains(k.to_lowercase().as_str()))
    }

    /// Lock-service base URL with any trailing slash trimmed.
    pub fn lock_api_base(&self) -> &str {
        self.lock_api.base_url.trim_end_matches('/')
    }
}

/// Parse an `HH:MM` clock string. Out-of-range or malformed values fall
/// back with a warning rather than failing the event.
pub fn parse_hhmm(value: &str, fallback: NaiveTime) -> NaiveTime {
    let parts: Vec<&str> = value.trim().split(':').collect();
    if parts.len() == 2 {
        if let (Ok(hour), Ok(minute)) = (parts[0].parse::<u32>(), parts[1].parse::<u32>()) {
            if let Some(t) = NaiveTime::from_hms_opt(hour, minute, 0) {
                return t;
            }
        }
    }
    warn!(value, "invalid HH:MM clock time; using fallback");
    fallback
}

// ---------------------------------------------------------------------------
// Layered loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
    pub config: SyncConfig,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    // Merge YAML docs in order: earlier docs are base, later docs override.
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    let config: SyncConfig =
        serde_json::from_value(merged.clone()).context("config does not match expected shape")?;

    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
        config,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn canonicalize_json(v: &Value) -> Result<String> {
    // Compact serialization; merge order is deterministic given the input
    // document order, so the hash is stable across runs.
    let s = serde_json::to_string(v).context("canonical json serialize failed")?;
    Ok(s)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    hex::encode(out)
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(val) = v.pointer(&ptr) {
            if let Some(s) = val.as_str() {
                if looks_like_secret(s) {
                    bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
                }
            }
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => {
            let p = if prefix.is_empty() {
                "/".to_string()
            } else {
                prefix.to_string()
            };
            out.push(p);
        }
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}
