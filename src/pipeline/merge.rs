//! Merging newly found post ids into stored project records.
//!
//! Every id ever stored for a project stays in its record; new ids are
//! placed ahead of the existing ones. Merges on the same project are
//! serialized through a per-key lock, different projects proceed in parallel.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use futures::future::FutureExt;
use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{PostId, ProjectId};
use crate::pipeline::ProjectBatch;
use crate::storage::RecordStore;

/// Result of merging one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing new; the record was not written
    Unchanged,
    /// Record rewritten with `added` new ids, `total` ids overall
    Updated { added: usize, total: usize },
}

/// Totals for a whole page of projects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub projects_updated: usize,
    pub ids_added: usize,
    pub failures: usize,
}

/// Combine new ids with an existing record.
///
/// Returns the ids of `new_ids` not yet in `existing`, deduplicated in
/// first-seen order, followed by `existing` unchanged.
pub fn union_ids(existing: &[PostId], new_ids: &[PostId]) -> (Vec<PostId>, usize) {
    let mut seen: HashSet<PostId> = existing.iter().copied().collect();
    let fresh: Vec<PostId> = new_ids.iter().copied().filter(|id| seen.insert(*id)).collect();
    let added = fresh.len();

    let mut merged = fresh;
    merged.extend_from_slice(existing);
    (merged, added)
}

/// Applies batches to a [`RecordStore`].
pub struct Merger {
    store: Arc<dyn RecordStore>,
    locks: Mutex<HashMap<ProjectId, Arc<tokio::sync::Mutex<()>>>>,
    concurrency: usize,
}

impl Merger {
    pub fn new(store: Arc<dyn RecordStore>, concurrency: usize) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
            concurrency: concurrency.max(1),
        }
    }

    fn lock_for(&self, project: &ProjectId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(project.clone()).or_default())
    }

    /// Forget the lock of `project` once no other merge holds or awaits it.
    ///
    /// Clones are only handed out under the table mutex, so a count of two
    /// (table + `lock`) cannot grow while we look at it.
    fn release_lock(&self, project: &ProjectId, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if Arc::strong_count(lock) == 2 {
            locks.remove(project);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Merge `new_ids` into the record of `project`.
    pub async fn merge(&self, project: &ProjectId, new_ids: &[PostId]) -> Result<MergeOutcome> {
        if new_ids.is_empty() {
            return Ok(MergeOutcome::Unchanged);
        }

        let lock = self.lock_for(project);
        let result = {
            let _guard = lock.lock().await;
            self.merge_locked(project, new_ids).await
        };
        self.release_lock(project, &lock);
        result
    }

    async fn merge_locked(&self, project: &ProjectId, new_ids: &[PostId]) -> Result<MergeOutcome> {
        let existing = self.store.read(project).await?.unwrap_or_default();
        let (merged, added) = union_ids(&existing, new_ids);
        if added == 0 {
            return Ok(MergeOutcome::Unchanged);
        }

        self.store.write(project, &merged).await?;
        Ok(MergeOutcome::Updated {
            added,
            total: merged.len(),
        })
    }

    /// Merge every project of a page. Failures are logged and dropped.
    pub async fn merge_all(&self, batch: &ProjectBatch) -> MergeSummary {
        let pending: Vec<_> = batch
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(project, ids)| async move { (project, self.merge(project, ids).await) }.boxed())
            .collect();
        let results: Vec<_> = stream::iter(pending)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut summary = MergeSummary::default();
        for (project, result) in results {
            match result {
                Ok(MergeOutcome::Updated { added, total }) => {
                    summary.projects_updated += 1;
                    summary.ids_added += added;
                    log::info!("Project {project}: +{added} ids ({total} total)");
                }
                Ok(MergeOutcome::Unchanged) => {
                    log::debug!("Project {project}: no new ids");
                }
                Err(e) => {
                    summary.failures += 1;
                    log::error!("Project {project}: update dropped: {e}");
                }
            }
        }
        summary
    }
}
