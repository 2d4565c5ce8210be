// src/config.rs

//! Configuration loading utilities.
//!
//! This module provides convenience functions for loading the configuration
//! file the way the CLI does: defaults when missing, environment overrides,
//! then validation.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::Config;

/// Load configuration from a TOML file.
///
/// A missing file falls back to defaults; a file that exists but does not
/// parse is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        log::warn!("No config at {}; using default configuration.", path.display());
        return Ok(Config::default());
    }
    Config::load(path)
}

/// Load, apply environment overrides and validate.
pub fn load_all(path: &Path) -> Result<Config> {
    let mut config = load_config(path)?;
    config.apply_env();
    config
        .validate()
        .map_err(|e| AppError::config(format!("Invalid configuration in {}: {e}", path.display())))?;

    if config.allowlist.is_empty() {
        log::warn!("Allowlist is empty; no posts will be recorded.");
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.port, 8081);
    }

    #[test]
    fn broken_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "poller = [").unwrap();
        assert!(matches!(load_config(&path), Err(AppError::Toml(_))));
    }

    #[test]
    fn load_all_rejects_invalid_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[poller]\ninterval_secs = 0\n").unwrap();
        assert!(matches!(load_all(&path), Err(AppError::Config(_))));
    }

    #[test]
    fn load_all_reads_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "allowlist = [\"Someone\"]\n[poller]\nhashtag = \"#builds\"\npage_size = 25\n",
        )
        .unwrap();

        let config = load_all(&path).unwrap();
        assert_eq!(config.poller.hashtag, "#builds");
        assert_eq!(config.poller.page_size, 25);
        assert!(config.allowlist_set().contains("someone"));
    }
}
