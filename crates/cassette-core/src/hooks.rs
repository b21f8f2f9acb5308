//! Persist hooks
//!
//! A [`PersistHook`] runs on every entry right after it is built and before it
//! is attached to the recording, e.g. to redact credentials. Hooks run in
//! registration order and may mutate the entry in place.

use crate::har::Entry;
use crate::request::Header;
use crate::Result;
use async_trait::async_trait;

/// Placeholder written over redacted header values
pub const REDACTED: &str = "[REDACTED]";

#[async_trait]
pub trait PersistHook: Send + Sync {
    /// Transform an entry before it is persisted
    async fn before_persist(&self, entry: &mut Entry) -> Result<()>;
}

/// Masks the values of selected headers in requests and responses
#[derive(Debug, Clone)]
pub struct HeaderRedactionHook {
    names: Vec<String>,
}

impl HeaderRedactionHook {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    fn redact(&self, headers: &mut [Header]) -> usize {
        let mut redacted = 0;
        for header in headers.iter_mut() {
            if self
                .names
                .iter()
                .any(|n| header.name.eq_ignore_ascii_case(n))
            {
                header.value = REDACTED.to_string();
                redacted += 1;
            }
        }
        redacted
    }
}

#[async_trait]
impl PersistHook for HeaderRedactionHook {
    async fn before_persist(&self, entry: &mut Entry) -> Result<()> {
        let redacted =
            self.redact(&mut entry.request.headers) + self.redact(&mut entry.response.headers);

        if redacted > 0 {
            tracing::debug!(
                entry_id = %entry.id,
                order = entry.order,
                redacted,
                "Redacted headers before persist"
            );
        }
        Ok(())
    }
}

/// Adapts a synchronous closure into a [`PersistHook`]
pub struct FnHook<F> {
    f: F,
}

impl<F> FnHook<F>
where
    F: Fn(&mut Entry) -> Result<()> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> PersistHook for FnHook<F>
where
    F: Fn(&mut Entry) -> Result<()> + Send + Sync,
{
    async fn before_persist(&self, entry: &mut Entry) -> Result<()> {
        (self.f)(entry)
    }
}
