//! HTTP transport seam.
//!
//! [`LockTransport`] is the narrow boundary the gateway logic sits on:
//! one JSON request out, one status + body back. Production uses the
//! blocking [`HttpLockTransport`]; tests drive the gateway with scripted
//! in-process transports.

use std::fmt;
use std::time::Duration;

use serde_json::Value;

/// Fixed per-call deadline for every remote request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// A raw HTTP response, body undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network or client-construction failure; anything that produced no HTTP
/// status at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError(pub String);

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error: {}", self.0)
    }
}

impl std::error::Error for TransportError {}

/// The request contract the gateway is written against.
pub trait LockTransport: Send + Sync {
    fn post_json(&self, path: &str, payload: &Value) -> Result<HttpReply, TransportError>;

    /// GET with the payload's scalar fields as query parameters. Some
    /// service deployments only accept the list call as GET.
    fn get_json(&self, path: &str, params: &Value) -> Result<HttpReply, TransportError>;
}

/// Bearer-token-authenticated blocking transport.
pub struct HttpLockTransport {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl HttpLockTransport {
    /// `base_url` must not end with a slash (the config layer trims it).
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn read_reply(response: reqwest::blocking::Response) -> Result<HttpReply, TransportError> {
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| TransportError(e.to_string()))?;
        Ok(HttpReply { status, body })
    }
}

impl LockTransport for HttpLockTransport {
    fn post_json(&self, path: &str, payload: &Value) -> Result<HttpReply, TransportError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .map_err(|e| TransportError(e.to_string()))?;
        Self::read_reply(response)
    }

    fn get_json(&self, path: &str, params: &Value) -> Result<HttpReply, TransportError> {
        let query: Vec<(String, String)> = params
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| {
                        let rendered = match v {
                            Value::String(s) => Some(s.clone()),
                            Value::Number(n) => Some(n.to_string()),
                            Value::Bool(b) => Some(b.to_string()),
                            _ => None,
                        };
                        rendered.map(|r| (k.clone(), r))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.api_key)
            .query(&query)
            .send()
            .map_err(|e| TransportError(e.to_string()))?;
        Self::read_reply(response)
    }
}
