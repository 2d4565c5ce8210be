//! Polling pipeline.
//!
//! - `extract`: project references on one search page
//! - `merge`: fold new post ids into stored records
//! - `poll`: cycle loop, pagination and cursor

pub mod extract;
pub mod merge;
pub mod poll;

pub use extract::{ProjectBatch, extract};
pub use merge::{MergeOutcome, MergeSummary, Merger, union_ids};
pub use poll::{PollState, Poller, PollerCommand, command_channel, spawn_ticker};
