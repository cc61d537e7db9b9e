//! # devtrack-agent
//!
//! Runtime side of devtrack: watches a workspace, schedules commits of the
//! accumulated changes and pushes them to a remote repository.

pub mod git;
pub mod hosting;
pub mod notify;
pub mod retry;
pub mod scheduler;
pub mod service;
pub mod vcs;
pub mod watcher;

pub use git::GitCli;
pub use hosting::{GitHubDirectory, HostingError, RemoteRepoDirectory};
pub use notify::{LogNotifier, NotificationSink};
pub use retry::{RetryPolicy, RetryingVcs};
pub use scheduler::{CommitScheduler, SchedulerError, SchedulerParts, SchedulerState, TickOutcome};
pub use service::DevTrackService;
pub use vcs::{VcsClient, VcsError};
pub use watcher::{EventRouter, FileWatcher};
