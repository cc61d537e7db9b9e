pub mod commit;
pub mod diff;
pub mod init;
pub mod log;
pub mod start;
pub mod status;

use anyhow::{Context, Result};
use devtrack_agent::{GitCli, RetryPolicy, RetryingVcs, VcsClient};
use devtrack_core::storage::STORE_DIR;
use devtrack_core::{
    ChangeLedger, ConfigSource, FileConfig, OverriddenConfig, Overrides, ProjectStore, Settings,
    WorkspaceSource,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub fn workspace(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).with_context(|| format!("Workspace {:?} not found", path))
}

pub fn load_settings(root: &Path) -> Result<(Arc<FileConfig>, Settings)> {
    let config = Arc::new(FileConfig::for_workspace(root));
    let settings = config
        .load()
        .with_context(|| format!("Invalid configuration in {:?}", config.path()))?;
    Ok((config, settings))
}

/// Like [`load_settings`], with command-line `overrides` kept in force
/// across configuration reloads.
pub fn load_settings_with(
    root: &Path,
    overrides: Overrides,
) -> Result<(Arc<dyn ConfigSource>, Settings)> {
    let file = FileConfig::for_workspace(root);
    let path = file.path().to_path_buf();
    let config = OverriddenConfig::new(file, overrides);
    let settings = config
        .load()
        .with_context(|| format!("Invalid configuration in {:?}", path))?;
    Ok((Arc::new(config), settings))
}

pub fn is_initialized(root: &Path) -> bool {
    root.join(STORE_DIR).is_dir()
}

/// Git client for the workspace, serialized and retrying.
pub fn git_client(root: &Path, settings: &Settings) -> Arc<dyn VcsClient> {
    let git = GitCli::new(root, settings.branch.clone(), settings.changelog_dir.clone());
    RetryingVcs::new(git, RetryPolicy::default()).into_shared()
}

/// Changes made since the last successful commit, as far as the persisted
/// tracker state can tell.
pub fn changes_since_last_commit(
    root: &Path,
    settings: &Settings,
    store: &ProjectStore,
) -> Result<ChangeLedger> {
    let mut ledger = ChangeLedger::new(settings.path_filter()?);
    let state = store.load_tracker_state()?;
    ledger.reconcile(&state, &WorkspaceSource::new(root));
    Ok(ledger)
}
