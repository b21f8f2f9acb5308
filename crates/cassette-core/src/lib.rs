//! Cassette Core Types and Traits
//!
//! This crate provides the fundamental types and traits used throughout Cassette:
//! - Recorded request/response types
//! - HAR-style recording documents and entries
//! - Backend and persist-hook trait abstractions
//! - Core error types and persister configuration

pub mod backend;
pub mod config;
pub mod error;
pub mod har;
pub mod hooks;
pub mod request;

pub use backend::RecordingBackend;
pub use config::PersisterConfig;
pub use error::{Error, Result};
pub use har::{Creator, Entry, Log, RecordingDocument};
pub use hooks::{FnHook, HeaderRedactionHook, PersistHook};
pub use request::{Header, RecordedRequest, RecordedResponse, RecordingId, recording_id_for};
