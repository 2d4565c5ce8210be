//! Local filesystem storage implementation.
//!
//! One JSON array per project under the data directory. Writes go to a
//! temporary sibling file which is then renamed over the record, so readers
//! (including the read service) never observe a half-written file.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── 12345678.json         # Record for #ID12345678
//! └── 12345678.json.tmp     # Only while a write is in flight
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{PostId, ProjectId};
use crate::storage::RecordStore;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Directory holding the records.
    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Full path of a project's record.
    pub fn path(&self, project: &ProjectId) -> PathBuf {
        self.root_dir.join(project.file_name())
    }

    /// Write bytes atomically (write to temp, then rename).
    ///
    /// The temp file is removed again whenever any step fails.
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await?;

        let tmp = path.with_extension("json.tmp");
        let written: std::io::Result<()> = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::Io(e));
        }
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// List the projects that have a record, sorted by key.
    pub async fn list_projects(&self) -> Result<Vec<ProjectId>> {
        let mut entries = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut projects = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if let Ok(project) = ProjectId::from_digits(stem) {
                    projects.push(project);
                }
            }
        }
        projects.sort();
        Ok(projects)
    }
}

#[async_trait]
impl RecordStore for LocalStorage {
    async fn read(&self, project: &ProjectId) -> Result<Option<Vec<PostId>>> {
        match self.read_bytes(&self.path(project)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn write(&self, project: &ProjectId, ids: &[PostId]) -> Result<()> {
        let bytes = serde_json::to_vec(ids)?;
        self.write_bytes(&self.path(project), &bytes).await?;
        log::debug!("Wrote {} ids to {}", ids.len(), self.path(project).display());
        Ok(())
    }
}
