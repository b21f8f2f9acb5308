//! HAR-style recording documents
//!
//! Recordings are stored as `{ "log": { ... } }` documents modelled on the
//! HTTP Archive format. Each entry carries two extra fields, `_id` and
//! `_order`, which form the two-level key used during replay.
//!
//! Fields the persister does not know about are kept in `extra` maps so a
//! document written by another tool (or a newer version) survives a
//! read-modify-write cycle untouched.

use crate::request::{Header, RecordedRequest, header_value};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// HAR format version written into new logs
pub const HAR_VERSION: &str = "1.2";

/// Tool that produced a recording
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Creator {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl Default for Creator {
    fn default() -> Self {
        Self {
            name: "cassette".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            comment: String::new(),
        }
    }
}

/// Durable payload handed to a recording backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordingDocument {
    pub log: Log,
}

/// The `log` object of a recording
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Log {
    pub creator: Creator,

    #[serde(rename = "_recordingName")]
    pub recording_name: String,

    #[serde(default)]
    pub entries: Vec<Entry>,

    /// Any other stored fields (`version`, `pages`, custom data, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Log {
    /// Build the log container for a flush
    ///
    /// Fields are layered in order: defaults (`version`, `creator`, empty
    /// `entries`), then the recording name, then every field of the existing
    /// stored log. Stored data always wins so nothing previously persisted is
    /// dropped.
    pub fn layered(
        creator: &Creator,
        recording_name: &str,
        existing: Option<&RecordingDocument>,
    ) -> Result<Self> {
        let mut fields = Map::new();
        fields.insert("version".to_string(), Value::String(HAR_VERSION.to_string()));
        fields.insert("creator".to_string(), serde_json::to_value(creator)?);
        fields.insert("entries".to_string(), Value::Array(Vec::new()));
        fields.insert(
            "_recordingName".to_string(),
            Value::String(recording_name.to_string()),
        );

        if let Some(existing) = existing {
            let stored: Map<String, Value> =
                serde_json::from_value(serde_json::to_value(&existing.log)?)?;
            fields.extend(stored);
        }

        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    /// Merge entries into the log and keep it ordered by start time
    ///
    /// A new entry replaces a stored entry with the same `(id, order)` key.
    /// The sort is stable, so entries started at the same instant keep their
    /// merge order (new entries first).
    pub fn add_entries(&mut self, entries: impl IntoIterator<Item = Entry>) {
        let stored = std::mem::take(&mut self.entries);
        let mut seen = HashSet::new();

        self.entries = entries
            .into_iter()
            .chain(stored)
            .filter(|entry| seen.insert((entry.id.clone(), entry.order)))
            .collect();
        self.entries
            .sort_by(|a, b| a.started_date_time.cmp(&b.started_date_time));
    }

    /// Find an entry by its `(id, order)` key
    pub fn entry(&self, id: &str, order: u32) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|entry| entry.id == id && entry.order == order)
    }
}

/// One request/response pair inside a recording
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(rename = "_order")]
    pub order: u32,

    pub started_date_time: DateTime<Utc>,

    /// Total elapsed time in milliseconds
    pub time: f64,

    pub request: EntryRequest,

    pub response: EntryResponse,

    #[serde(default)]
    pub cache: Map<String, Value>,

    #[serde(default)]
    pub timings: Timings,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entry {
    /// Build an entry from a completed request
    ///
    /// Fails with a precondition error if the request has not responded.
    pub fn from_request(request: &RecordedRequest) -> Result<Self> {
        let response = request.response.as_ref().ok_or_else(|| {
            Error::Precondition(format!(
                "cannot build an entry for [{}] {} before it has responded",
                request.method, request.url
            ))
        })?;

        let post_data = request.body.as_ref().map(|text| PostData {
            mime_type: header_value(&request.headers, "content-type")
                .unwrap_or_default()
                .to_string(),
            text: text.clone(),
        });

        let content_size = response.body.as_ref().map_or(0, |b| b.len() as i64);

        Ok(Self {
            id: request.id.clone(),
            order: request.order,
            started_date_time: request.started_at,
            time: request.duration_ms,
            request: EntryRequest {
                method: request.method.clone(),
                url: request.url.clone(),
                http_version: "HTTP/1.1".to_string(),
                headers: request.headers.clone(),
                query_string: parse_query_string(&request.url),
                body_size: request.body.as_ref().map_or(0, |b| b.len() as i64),
                post_data,
                headers_size: -1,
            },
            response: EntryResponse {
                status: response.status,
                status_text: response.status_text.clone(),
                http_version: "HTTP/1.1".to_string(),
                headers: response.headers.clone(),
                content: Content {
                    mime_type: header_value(&response.headers, "content-type")
                        .unwrap_or("text/plain")
                        .to_string(),
                    size: content_size,
                    text: response.body.clone(),
                },
                redirect_url: header_value(&response.headers, "location")
                    .unwrap_or_default()
                    .to_string(),
                headers_size: -1,
                body_size: content_size,
            },
            cache: Map::new(),
            timings: Timings {
                wait: request.duration_ms,
                ..Timings::default()
            },
            extra: Map::new(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntryRequest {
    pub method: String,
    pub url: String,
    pub http_version: String,
    pub headers: Vec<Header>,
    #[serde(default)]
    pub query_string: Vec<QueryParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<PostData>,
    pub headers_size: i64,
    pub body_size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    pub status: u16,
    pub status_text: String,
    pub http_version: String,
    pub headers: Vec<Header>,
    pub content: Content,
    #[serde(rename = "redirectURL", default)]
    pub redirect_url: String,
    pub headers_size: i64,
    pub body_size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryParam {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PostData {
    pub mime_type: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub mime_type: String,
    pub size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Phase timings in milliseconds; -1 means not applicable
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Timings {
    pub blocked: f64,
    pub dns: f64,
    pub connect: f64,
    pub send: f64,
    pub wait: f64,
    pub receive: f64,
    pub ssl: f64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            blocked: -1.0,
            dns: -1.0,
            connect: -1.0,
            send: 0.0,
            wait: 0.0,
            receive: 0.0,
            ssl: -1.0,
        }
    }
}

/// Split the query part of a URL into name/value pairs (values are not decoded)
fn parse_query_string(url: &str) -> Vec<QueryParam> {
    let Some((_, query)) = url.split_once('?') else {
        return Vec::new();
    };
    let query = query.split('#').next().unwrap_or_default();

    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            QueryParam {
                name: name.to_string(),
                value: value.to_string(),
            }
        })
        .collect()
}
