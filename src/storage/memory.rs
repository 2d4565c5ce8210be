//! In-process storage backend.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{PostId, ProjectId};
use crate::storage::RecordStore;

/// Records kept in a map. Counts writes so callers can observe no-op merges.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: RwLock<HashMap<ProjectId, Vec<PostId>>>,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `write` calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Snapshot of one record.
    pub fn get(&self, project: &ProjectId) -> Option<Vec<PostId>> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(project)
            .cloned()
    }
}

#[async_trait]
impl RecordStore for MemoryStorage {
    async fn read(&self, project: &ProjectId) -> Result<Option<Vec<PostId>>> {
        Ok(self.get(project))
    }

    async fn write(&self, project: &ProjectId, ids: &[PostId]) -> Result<()> {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(project.clone(), ids.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
