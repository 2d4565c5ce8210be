//! Utility functions and helpers.

pub mod filename;
pub mod http;

pub use filename::{sanitize_filename, sanitize_request_path};
