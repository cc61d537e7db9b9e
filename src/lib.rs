//! # devtrack
//!
//! Passive coding-activity log: watches a workspace, batches file saves on a
//! timer, summarizes them with line diffs and pushes the result as a commit.
//!
//! The `devtrack` binary lives in the `devtrack-cli` crate.

pub use devtrack_agent as agent;
pub use devtrack_core as core;
