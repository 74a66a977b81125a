//! In-memory artifact store, used by dry runs and tests
use std::{collections::BTreeMap, sync::Arc};

use parking_lot::Mutex;

use crate::{ArtifactStore, StoreError};

/// Keeps every written artifact in a shared map
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// payload written under `name`, if any
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.lock().get(name).cloned()
    }

    /// names of every written artifact, sorted
    pub fn names(&self) -> Vec<String> {
        self.inner.lock().keys().cloned().collect()
    }

    /// number of written artifacts
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// whether nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl ArtifactStore for MemoryStore {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.inner.lock().insert(name.to_owned(), bytes.to_vec());
        Ok(())
    }
}
