//! Cassette Storage Backends
//!
//! This crate provides concrete recording backends and config loading:
//! - In-memory backend (tests, ephemeral runs)
//! - Filesystem backend (one HAR file per recording, atomic writes)
//! - File-based configuration loader (JSON, YAML, TOML)

mod atomic_writer;
pub mod config;
pub mod file_store;
pub mod memory;

pub use config::{ConfigFormat, FileConfigLoader};
pub use file_store::FilesystemBackend;
pub use memory::InMemoryBackend;
