//! Project identifiers and the hashtag pattern that carries them.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Hashtag form of a project reference: `ID` followed by exactly 8 digits.
pub const PROJECT_HASHTAG_PATTERN: &str = r"(?i)^ID(\d{8})$";

/// Canonical project identifier: the 8-digit suffix of an `ID########` hashtag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
    /// Build from the bare 8-digit key.
    pub fn from_digits(digits: &str) -> Result<Self> {
        if digits.len() == 8 && digits.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(digits.to_string()))
        } else {
            Err(AppError::InvalidProjectId(digits.to_string()))
        }
    }

    /// The 8-digit storage key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the record for this project.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accepts both `ID12345678` (any case) and `12345678`.
impl FromStr for ProjectId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches('#');
        match trimmed.get(..2) {
            Some(prefix) if prefix.eq_ignore_ascii_case("id") => Self::from_digits(&trimmed[2..]),
            _ => Self::from_digits(trimmed),
        }
    }
}

impl TryFrom<String> for ProjectId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_digits(&value)
    }
}

impl From<ProjectId> for String {
    fn from(id: ProjectId) -> Self {
        id.0
    }
}

/// Compiled matcher for project hashtags.
#[derive(Debug, Clone)]
pub struct ProjectPattern {
    regex: Regex,
}

impl ProjectPattern {
    /// Compile the standard `ID########` pattern.
    pub fn new() -> Self {
        Self {
            regex: Regex::new(PROJECT_HASHTAG_PATTERN).expect("project hashtag pattern is valid"),
        }
    }

    /// Match a hashtag text (without `#`) and return its project.
    pub fn project_of(&self, hashtag: &str) -> Option<ProjectId> {
        let caps = self.regex.captures(hashtag)?;
        ProjectId::from_digits(caps.get(1)?.as_str()).ok()
    }
}

impl Default for ProjectPattern {
    fn default() -> Self {
        Self::new()
    }
}
