use crate::scheduler::relock;
use devtrack_core::{ActivityTracker, ChangeKind, ChangeLedger};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, FileIdMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

const DEBOUNCE: Duration = Duration::from_millis(500);

/// Turns raw file-system events into ledger records.
pub struct EventRouter {
    root: PathBuf,
    config_path: PathBuf,
    ledger: Arc<Mutex<ChangeLedger>>,
    activity: Arc<Mutex<ActivityTracker>>,
    config_tx: Option<mpsc::Sender<()>>,
}

impl EventRouter {
    pub fn new(
        root: impl Into<PathBuf>,
        ledger: Arc<Mutex<ChangeLedger>>,
        activity: Arc<Mutex<ActivityTracker>>,
    ) -> Self {
        let root = root.into();
        Self {
            config_path: devtrack_core::storage::config_path(&root),
            root,
            ledger,
            activity,
            config_tx: None,
        }
    }

    /// Signals `tx` whenever the workspace configuration file changes.
    pub fn with_config_signal(mut self, tx: mpsc::Sender<()>) -> Self {
        self.config_tx = Some(tx);
        self
    }

    /// Records the changes described by `event`; returns how many were
    /// accepted by the ledger.
    pub fn route(&self, event: &Event) -> usize {
        let kinds: Vec<(&PathBuf, ChangeKind)> = match event.kind {
            EventKind::Create(_) => event.paths.iter().map(|p| (p, ChangeKind::Added)).collect(),
            EventKind::Remove(_) => event.paths.iter().map(|p| (p, ChangeKind::Deleted)).collect(),
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                event.paths.iter().map(|p| (p, ChangeKind::Deleted)).collect()
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                event.paths.iter().map(|p| (p, ChangeKind::Added)).collect()
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
                [from, to] => vec![(from, ChangeKind::Deleted), (to, ChangeKind::Added)],
                _ => Vec::new(),
            },
            EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
            EventKind::Modify(_) => event.paths.iter().map(|p| (p, ChangeKind::Modified)).collect(),
            _ => Vec::new(),
        };

        kinds
            .into_iter()
            .map(|(path, kind)| self.record(path, kind))
            .filter(|accepted| *accepted)
            .count()
    }

    fn record(&self, path: &Path, kind: ChangeKind) -> bool {
        if path == self.config_path {
            if let Some(tx) = &self.config_tx {
                debug!("Configuration file changed");
                let _ = tx.try_send(());
            }
            return false;
        }

        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        if kind != ChangeKind::Deleted && path.is_dir() {
            return false;
        }

        let accepted = relock(&self.ledger).record(relative, kind);

        if accepted {
            debug!("File {}: {:?}", kind.as_str(), relative);
            if kind != ChangeKind::Deleted {
                relock(&self.activity).record_edit(relative, chrono::Utc::now());
            }
        }
        accepted
    }
}

/// Recursive, debounced watch of a workspace feeding an [`EventRouter`].
pub struct FileWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher, FileIdMap>,
}

impl FileWatcher {
    pub fn new(router: EventRouter) -> anyhow::Result<Self> {
        let root = router.root.clone();
        let (tx, mut rx) = mpsc::channel(100);

        let mut debouncer = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| {
            if let Err(e) = tx.blocking_send(result) {
                error!("Failed to send event: {}", e);
            }
        })?;

        debouncer.watcher().watch(&root, RecursiveMode::Recursive)?;
        info!("File watcher started for {:?}", root);

        tokio::spawn(async move {
            while let Some(result) = rx.recv().await {
                match result {
                    Ok(events) => {
                        for event in events {
                            router.route(&event.event);
                        }
                    }
                    Err(errors) => {
                        for error in errors {
                            error!("Watch error: {:?}", error);
                        }
                    }
                }
            }
        });

        Ok(Self {
            _debouncer: debouncer,
        })
    }
}
