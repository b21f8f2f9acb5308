//! Persister configuration

use crate::har::Creator;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersisterConfig {
    /// Allow persisting requests whose response was not 2xx
    #[serde(default)]
    pub record_failed_requests: bool,

    /// Creator metadata written into new recordings
    #[serde(default)]
    pub creator: Creator,

    /// Root directory for the filesystem backend
    #[serde(default = "default_recordings_dir")]
    pub recordings_dir: PathBuf,

    /// Header names whose values are masked before an entry is persisted
    #[serde(default)]
    pub redact_headers: Vec<String>,
}

impl Default for PersisterConfig {
    fn default() -> Self {
        Self {
            record_failed_requests: false,
            creator: Creator::default(),
            recordings_dir: default_recordings_dir(),
            redact_headers: Vec::new(),
        }
    }
}

fn default_recordings_dir() -> PathBuf {
    PathBuf::from("recordings")
}

impl PersisterConfig {
    pub fn with_record_failed_requests(mut self, enabled: bool) -> Self {
        self.record_failed_requests = enabled;
        self
    }

    pub fn with_creator(mut self, creator: Creator) -> Self {
        self.creator = creator;
        self
    }

    pub fn with_recordings_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.recordings_dir = dir.into();
        self
    }

    pub fn with_redact_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.redact_headers = names.into_iter().map(Into::into).collect();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.creator.name.trim().is_empty() {
            return Err(Error::Config("creator.name must not be empty".to_string()));
        }

        if self.recordings_dir.as_os_str().is_empty() {
            return Err(Error::Config("recordings_dir must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for name in &self.redact_headers {
            if name.trim().is_empty() {
                return Err(Error::Config(
                    "redact_headers must not contain empty names".to_string(),
                ));
            }
            if !seen.insert(name.to_ascii_lowercase()) {
                return Err(Error::Config(format!(
                    "redact_headers contains duplicate header '{}'",
                    name
                )));
            }
        }

        Ok(())
    }
}
