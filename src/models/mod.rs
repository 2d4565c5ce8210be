// src/models/mod.rs

//! Domain models for the tracker.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod post;
mod project;
mod report;

// Re-export all public types
pub use config::{
    ApiConfig, BEARER_TOKEN_ENV, Config, MAX_PAGE_SIZE, PollerConfig, ServerConfig, StorageConfig,
};
pub use post::{
    Post, PostId, RawSearchResponse, RawSearchMetadata, RawStatus, SearchQuery, SearchResponse,
};
pub use project::{PROJECT_HASHTAG_PATTERN, ProjectId, ProjectPattern};
pub use report::{CycleOutcome, CycleReport};
