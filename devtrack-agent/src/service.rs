use crate::notify::NotificationSink;
use crate::scheduler::{relock, CommitScheduler, SchedulerParts, TickOutcome};
use crate::vcs::VcsClient;
use crate::watcher::{EventRouter, FileWatcher};
use anyhow::Context;
use devtrack_core::{
    ActivityTracker, ChangeLedger, ConfigSource, ContentCache, ContentCipher, ContentSource,
    DiffEngine, ProjectStore, Settings, SummaryBuilder, WorkspaceSource,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A tracked workspace: the ledger, cache and scheduler of one project,
/// wired together.
pub struct DevTrackService {
    root: PathBuf,
    settings: Settings,
    config: Arc<dyn ConfigSource>,
    parts: SchedulerParts,
    scheduler: Arc<CommitScheduler>,
    notifier: Arc<dyn NotificationSink>,
}

impl DevTrackService {
    /// Opens the project store, loads the cache and records edits made since
    /// the last successful commit.
    pub fn new(
        root: impl Into<PathBuf>,
        settings: Settings,
        config: Arc<dyn ConfigSource>,
        vcs: Arc<dyn VcsClient>,
        notifier: Arc<dyn NotificationSink>,
    ) -> anyhow::Result<Self> {
        let root = root.into();
        settings.validate()?;

        let store = ProjectStore::open(&root).context("Failed to open project store")?;
        let source: Arc<dyn ContentSource> = Arc::new(WorkspaceSource::new(&root));

        let mut cache = ContentCache::new(
            store.clone(),
            ContentCipher::local().context("Failed to derive the cache key")?,
            Arc::clone(&source),
        );
        cache.load();

        let mut ledger = ChangeLedger::new(settings.path_filter()?);
        match store.load_tracker_state() {
            Ok(state) => {
                ledger.reconcile(&state, source.as_ref());
            }
            Err(e) => warn!("Skipping startup reconciliation: {}", e),
        }

        let summary = SummaryBuilder::new(
            cache,
            DiffEngine::new(settings.blank_lines()),
            store.meta().name.clone(),
        );

        let parts = SchedulerParts {
            ledger: Arc::new(Mutex::new(ledger)),
            summary: Arc::new(Mutex::new(summary)),
            activity: Arc::new(Mutex::new(ActivityTracker::default())),
            store,
        };

        let scheduler = CommitScheduler::new(parts.clone(), vcs, Arc::clone(&notifier))
            .with_confirmation(settings.confirm_before_commit)
            .with_followup_delay(settings.followup_delay());

        Ok(Self {
            root,
            settings,
            config,
            parts,
            scheduler: Arc::new(scheduler),
            notifier,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn parts(&self) -> &SchedulerParts {
        &self.parts
    }

    pub fn scheduler(&self) -> &Arc<CommitScheduler> {
        &self.scheduler
    }

    pub fn pending_changes(&self) -> usize {
        relock(&self.parts.ledger).len()
    }

    /// Runs the commit pipeline once, outside the timer.
    pub async fn commit_now(&self) -> TickOutcome {
        self.scheduler.on_tick().await
    }

    /// Re-reads the configuration and applies what changed. On error the
    /// current settings stay in effect.
    pub fn reload(&mut self) -> anyhow::Result<()> {
        let next = self.config.load().context("Invalid configuration")?;
        if next == self.settings {
            return Ok(());
        }

        let filter = next.path_filter()?;
        *relock(&self.parts.ledger).filter_mut() = filter;
        if next.blank_lines() != self.settings.blank_lines() {
            relock(&self.parts.summary).set_diff_engine(DiffEngine::new(next.blank_lines()));
        }

        self.scheduler.set_confirm_before_commit(next.confirm_before_commit);
        self.scheduler.set_followup_delay(next.followup_delay());
        if self.scheduler.is_running() {
            self.scheduler.update_frequency(next.commit_interval());
        }

        info!("Configuration reloaded");
        self.settings = next;
        Ok(())
    }

    /// Watches the workspace and commits on the configured interval until
    /// `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let (config_tx, mut config_rx) = mpsc::channel(1);
        let router = EventRouter::new(
            &self.root,
            Arc::clone(&self.parts.ledger),
            Arc::clone(&self.parts.activity),
        )
        .with_config_signal(config_tx);
        let _watcher = FileWatcher::new(router).context("Failed to start file watcher")?;

        self.scheduler.start(self.settings.commit_interval());
        self.notifier.info(&format!(
            "DevTrack is tracking {:?}, committing every {} minute(s)",
            self.root, self.settings.commit_frequency
        ));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(()) = config_rx.recv() => {
                    if let Err(e) = self.reload() {
                        self.notifier.error(&format!("Keeping previous settings: {:#}", e));
                    }
                }
            }
        }

        self.scheduler.stop();
        info!("DevTrack stopped with {} pending change(s)", self.pending_changes());
        Ok(())
    }
}
