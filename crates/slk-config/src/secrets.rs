//! Runtime secret resolution.
//!
//! Config YAML stores only env var NAMES (e.g. `"SLK_LOCK_API_KEY"`).
//! Callers invoke [`resolve_secrets`] once at startup and pass the returned
//! value into constructors; no other module reads `std::env::var`. `Debug`
//! output redacts the token, and error messages reference the env var NAME,
//! never its value.

use anyhow::{bail, Result};

use crate::SyncConfig;

/// Secrets resolved from the environment for one invocation.
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Bearer token for the lock-service API.
    pub lock_api_key: String,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("lock_api_key", &"<REDACTED>")
            .finish()
    }
}

/// Resolve a named environment variable; unset or blank counts as missing.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve all secrets the engine needs. The lock-service key is required:
/// without it no gateway call can be authenticated, so failing here beats
/// failing on the first remote call.
pub fn resolve_secrets(config: &SyncConfig) -> Result<ResolvedSecrets> {
    let var_name = config.lock_api.key_env.trim();
    let var_name = if var_name.is_empty() {
        "SLK_LOCK_API_KEY"
    } else {
        var_name
    };

    match resolve_env(var_name) {
        Some(lock_api_key) => Ok(ResolvedSecrets { lock_api_key }),
        None => bail!(
            "SECRETS_MISSING: required env var '{}' (lock-service API key) is not set or empty",
            var_name,
        ),
    }
}
