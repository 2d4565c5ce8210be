//! Service layer for the tracker.
//!
//! - Search API access (`SearchClient`, `TwitterSearchClient`)
//! - Read-only record server (`server`)

pub mod search;
pub mod server;

pub use search::{SearchClient, TwitterSearchClient, parse_response};
pub use server::{router, serve};
