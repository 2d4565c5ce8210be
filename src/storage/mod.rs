//! Storage abstractions for project records.
//!
//! A project record is the list of post ids that referenced the project.
//! Records are keyed by the 8-digit project id.
//!
//! ## Directory Structure
//!
//! ```text
//! data/
//! ├── 12345678.json         # [1570000000000000003, 1570000000000000001]
//! └── 87654321.json
//! ```

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{PostId, ProjectId};

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// Trait for project record backends.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load a record. `None` when the project has never been stored.
    async fn read(&self, project: &ProjectId) -> Result<Option<Vec<PostId>>>;

    /// Replace a record as a whole.
    async fn write(&self, project: &ProjectId, ids: &[PostId]) -> Result<()>;
}
