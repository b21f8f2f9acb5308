//! Recorded requests and responses
//!
//! A [`RecordedRequest`] is what the interception layer hands to the persister
//! once a request/response pair has completed. It carries the identity fields
//! used to group it into a recording (`recording_id`, `recording_name`) and to
//! address it inside that recording (`id`, `order`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Recording identifier (opaque, filesystem-safe when derived with [`recording_id_for`])
pub type RecordingId = String;

/// Derive a recording ID from a human-readable recording name
///
/// Format: `<slug>_<first 8 hex chars of sha256(name)>`, e.g. `"Users API: list"`
/// becomes `"users-api-list_1f0c9e2a"`. The hash suffix keeps names that
/// slugify identically apart.
pub fn recording_id_for(name: &str) -> RecordingId {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');

    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    format!("{}_{}", slug, &digest[..8])
}

/// A single HTTP header
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Find a header value by name (case-insensitive)
pub(crate) fn header_value<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// Response observed for a recorded request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordedResponse {
    /// HTTP status code
    pub status: u16,

    /// Reason phrase (may be empty)
    pub status_text: String,

    /// Response headers in wire order
    pub headers: Vec<Header>,

    /// Response body, if any
    pub body: Option<String>,
}

impl RecordedResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            status_text: String::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Whether the status code is a success (2xx)
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A request/response pair observed during a test run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordedRequest {
    /// Recording this request belongs to
    pub recording_id: RecordingId,

    /// Display name of the recording
    pub recording_name: String,

    /// Identity shared by repeated calls to the same logical request
    pub id: String,

    /// Position among requests sharing the same `id`
    pub order: u32,

    /// HTTP method
    pub method: String,

    /// Absolute request URL
    pub url: String,

    /// Request headers in wire order
    pub headers: Vec<Header>,

    /// Request body, if any
    pub body: Option<String>,

    /// When the request was sent
    pub started_at: DateTime<Utc>,

    /// Round-trip time in milliseconds
    pub duration_ms: f64,

    /// Response, once the request has completed
    pub response: Option<RecordedResponse>,
}

impl RecordedRequest {
    /// Create a request that has not responded yet
    ///
    /// The request `id` defaults to [`RecordedRequest::fingerprint`] of the
    /// method and URL; `order` defaults to 0.
    pub fn new(
        recording_id: impl Into<RecordingId>,
        recording_name: impl Into<String>,
        method: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        let method = method.into().to_ascii_uppercase();
        let url = url.into();
        let id = Self::fingerprint(&method, &url, None);

        Self {
            recording_id: recording_id.into(),
            recording_name: recording_name.into(),
            id,
            order: 0,
            method,
            url,
            headers: Vec::new(),
            body: None,
            started_at: Utc::now(),
            duration_ms: 0.0,
            response: None,
        }
    }

    /// Stable identity for a request: hex SHA-256 over method, URL and body
    pub fn fingerprint(method: &str, url: &str, body: Option<&str>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(method.to_ascii_uppercase().as_bytes());
        hasher.update(b"\n");
        hasher.update(url.as_bytes());
        hasher.update(b"\n");
        if let Some(body) = body {
            hasher.update(body.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    /// Attach a body and recompute the fingerprint-based `id`
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        let body = body.into();
        self.id = Self::fingerprint(&self.method, &self.url, Some(&body));
        self.body = Some(body);
        self
    }

    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    /// Complete the request with its response
    pub fn respond(mut self, response: RecordedResponse, duration_ms: f64) -> Self {
        self.response = Some(response);
        self.duration_ms = duration_ms;
        self
    }

    pub fn did_respond(&self) -> bool {
        self.response.is_some()
    }

    /// Whether the request completed with a 2xx response
    pub fn is_ok(&self) -> bool {
        self.response.as_ref().is_some_and(RecordedResponse::is_ok)
    }

    /// Status code of the response, if the request has responded
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }
}
