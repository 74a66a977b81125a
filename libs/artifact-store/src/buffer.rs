//! Holding area for artifacts awaiting an explicit flush
use std::{collections::BTreeMap, mem, sync::Arc};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::{ArtifactStore, StoreError};

/// Errors from buffering or writing a single artifact
#[derive(Debug, Error)]
pub enum BufferError {
    /// artifact name was blank
    #[error("invalid argument: artifact name must not be blank")]
    InvalidArgument,
    /// a direct write was requested but no destination is configured
    #[error("no artifact destination configured")]
    NotConfigured,
    /// the store rejected the write
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of [`ArtifactBuffer::flush`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// number of artifacts written
    pub written: usize,
    /// names whose write failed
    pub failed: Vec<String>,
}

impl FlushReport {
    /// true when every buffered artifact was written
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Buffers named payloads until [`flush`](ArtifactBuffer::flush) writes them
/// to the store. Without a store every call is a no-op so unusable data never
/// piles up.
#[derive(Debug, Default)]
pub struct ArtifactBuffer {
    store: Option<Arc<dyn ArtifactStore>>,
    pending: Mutex<BTreeMap<String, Vec<u8>>>,
}

fn check_name(name: &str) -> Result<(), BufferError> {
    if name.trim().is_empty() {
        return Err(BufferError::InvalidArgument);
    }
    Ok(())
}

impl ArtifactBuffer {
    /// buffer writing to `store`, or discarding everything when `None`
    pub fn new(store: Option<Arc<dyn ArtifactStore>>) -> Self {
        Self {
            store,
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    /// number of artifacts waiting for a flush
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Hold `bytes` under `name` until the next flush. Returns whether the
    /// payload was kept; a second payload for the same name replaces the first.
    pub fn buffer(&self, name: &str, bytes: impl Into<Vec<u8>>) -> Result<bool, BufferError> {
        check_name(name)?;
        if self.store.is_none() {
            debug!(name, "no artifact destination, dropping payload");
            return Ok(false);
        }
        self.pending.lock().insert(name.to_owned(), bytes.into());
        Ok(true)
    }

    /// Write `bytes` under `name` immediately
    pub fn write_now(&self, name: &str, bytes: &[u8]) -> Result<(), BufferError> {
        check_name(name)?;
        let store = self.store.as_ref().ok_or(BufferError::NotConfigured)?;
        store.write(name, bytes)?;
        Ok(())
    }

    /// Write every buffered artifact. A failed write does not stop the rest,
    /// the buffer is empty afterwards whatever happened, and failures are
    /// logged rather than returned.
    pub fn flush(&self) -> FlushReport {
        let pending = mem::take(&mut *self.pending.lock());
        let mut report = FlushReport::default();
        let Some(store) = &self.store else {
            return report;
        };

        for (name, bytes) in pending {
            match store.write(&name, &bytes) {
                Ok(()) => report.written += 1,
                Err(err) => {
                    error!(%name, reason = err.reason(), %err, "failed to write buffered artifact");
                    report.failed.push(name);
                }
            }
        }

        if report.is_clean() {
            debug!(written = report.written, "flushed buffered artifacts");
        } else {
            warn!(
                written = report.written,
                failed = ?report.failed,
                "some buffered artifacts could not be written"
            );
        }
        report
    }
}
