//! # devtrack-core
//!
//! Core library for devtrack - the change ledger, line diffs, the encrypted
//! content cache and commit summaries.
//!
//! Everything in this crate is synchronous and free of timers; the agent
//! crate drives it from the file watcher and the commit scheduler.

pub mod activity;
pub mod cache;
pub mod cipher;
pub mod config;
pub mod diff;
pub mod error;
pub mod filter;
pub mod ledger;
pub mod models;
pub mod source;
pub mod storage;
pub mod summary;

pub use activity::{ActivityReport, ActivityTracker};
pub use cache::ContentCache;
pub use cipher::{ContentCipher, MachineIdentity};
pub use config::{ConfigSource, FileConfig, OverriddenConfig, Overrides, Settings};
pub use diff::{BlankLines, DiffEngine, DiffResult, Edit, EditKind};
pub use error::{Error, Result};
pub use filter::PathFilter;
pub use ledger::ChangeLedger;
pub use models::{CacheEntry, Change, ChangeKind, FileFingerprint, ProjectMeta, TrackerState};
pub use source::{ContentSource, MemorySource, WorkspaceSource};
pub use storage::ProjectStore;
pub use summary::{Summary, SummaryBuilder, SummaryStats};
