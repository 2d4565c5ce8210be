//! Poll cycle summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PostId;

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Last page was partial; cursor advanced
    Completed,
    /// First page had no posts
    Empty,
    /// A fetch failed; cursor left alone
    Failed,
    /// Stopped at the configured page cap; cursor not advanced
    PageLimit,
}

/// Statistics for one poll cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: CycleOutcome,
    pub pages: usize,
    pub posts: usize,
    pub projects_updated: usize,
    pub ids_added: usize,
    pub merge_failures: usize,
    pub cursor_before: PostId,
    pub cursor_after: PostId,
}

impl CycleReport {
    pub(crate) fn start(cursor: PostId) -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            outcome: CycleOutcome::Empty,
            pages: 0,
            posts: 0,
            projects_updated: 0,
            ids_added: 0,
            merge_failures: 0,
            cursor_before: cursor,
            cursor_after: cursor,
        }
    }

    pub(crate) fn finish(mut self, outcome: CycleOutcome, cursor: PostId) -> Self {
        self.outcome = outcome;
        self.cursor_after = cursor;
        self.finished_at = Utc::now();
        self
    }

    /// Wall-clock duration in milliseconds.
    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
