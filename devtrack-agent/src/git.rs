//! [`VcsClient`] backed by the `git` command line.
//!
//! Each method performs a single attempt; wrap the client in
//! [`RetryingVcs`](crate::retry::RetryingVcs) for queuing and retries.

use crate::vcs::{VcsClient, VcsError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

const LOCK_FILES: &[&str] = &["index.lock", "HEAD.lock"];

#[derive(Debug, Clone)]
pub struct GitCli {
    repo: PathBuf,
    branch: String,
    changelog_dir: PathBuf,
    binary: String,
}

impl GitCli {
    pub fn new(repo: impl Into<PathBuf>, branch: impl Into<String>, changelog_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            branch: branch.into(),
            changelog_dir: changelog_dir.into(),
            binary: "git".to_string(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    async fn git(&self, args: &[&str]) -> Result<String, VcsError> {
        debug!("git {}", args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .current_dir(&self.repo)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await
            .map_err(|e| VcsError::Fatal(format!("failed to spawn {}: {}", self.binary, e)))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            Err(VcsError::classify(&format!("{}{}", stderr, stdout)))
        }
    }

    async fn is_repository(&self) -> bool {
        self.repo.join(".git").exists() || self.git(&["rev-parse", "--git-dir"]).await.is_ok()
    }

    async fn has_commits(&self) -> bool {
        self.git(&["rev-parse", "--verify", "HEAD"]).await.is_ok()
    }

    async fn has_staged_changes(&self) -> Result<bool, VcsError> {
        let status = self.git(&["status", "--porcelain"]).await?;
        Ok(!status.trim().is_empty())
    }

    /// `<changelog_dir>/<generated_at>.md`, relative to the repository.
    fn write_changelog(
        &self,
        document: &str,
        generated_at: DateTime<Utc>,
    ) -> Result<PathBuf, VcsError> {
        let name = format!("{}.md", generated_at.format("%Y-%m-%d-%H%M%S"));
        let relative = self.changelog_dir.join(name);
        let absolute = self.repo.join(&relative);
        if let Some(parent) = absolute.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| VcsError::Fatal(format!("cannot create {:?}: {}", parent, e)))?;
        }
        std::fs::write(&absolute, document)
            .map_err(|e| VcsError::Fatal(format!("cannot write {:?}: {}", absolute, e)))?;
        Ok(relative)
    }

    async fn push(&self) -> Result<(), VcsError> {
        self.git(&["push", "--set-upstream", "origin", &self.branch])
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl VcsClient for GitCli {
    async fn initialize_repository(&self, remote_url: &str) -> Result<(), VcsError> {
        self.recover().await;

        if !self.is_repository().await {
            self.git(&["init"]).await?;
            info!("Initialized new Git repository in {:?}", self.repo);
        }

        if !self.has_commits().await {
            self.git(&["add", "--all"]).await?;
            self.git(&[
                "commit",
                "--allow-empty",
                "-m",
                "DevTrack: Initial commit with existing project files",
            ])
            .await?;
        }

        let remotes = self.git(&["remote"]).await?;
        if remotes.lines().any(|r| r.trim() == "origin") {
            self.git(&["remote", "set-url", "origin", remote_url]).await?;
        } else {
            self.git(&["remote", "add", "origin", remote_url]).await?;
        }

        let current = self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        if current.trim() != self.branch {
            self.git(&["branch", "-M", &self.branch]).await?;
        }

        match self.push().await {
            Err(VcsError::Rejected(_)) => {
                self.sync_with_remote().await?;
                self.push().await
            }
            other => other,
        }?;

        info!("Repository initialized and pushed to {}", remote_url);
        Ok(())
    }

    async fn commit_and_push(
        &self,
        message: &str,
        document: &str,
        generated_at: DateTime<Utc>,
    ) -> Result<(), VcsError> {
        let changelog = self.write_changelog(document, generated_at)?;
        debug!("Wrote changelog {:?}", changelog);

        self.git(&["add", "--all"]).await?;
        if self.has_staged_changes().await? {
            self.git(&["commit", "-m", message]).await?;
        } else {
            info!("Nothing new to commit, pushing existing history");
        }

        self.push().await?;
        info!("Pushed to origin/{}", self.branch);
        Ok(())
    }

    async fn sync_with_remote(&self) -> Result<(), VcsError> {
        self.git(&["fetch", "origin"]).await?;
        match self
            .git(&["pull", "--rebase=true", "origin", &self.branch])
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("Rebase failed, aborting it: {}", e);
                let _ = self.git(&["rebase", "--abort"]).await;
                Err(e)
            }
        }
    }

    async fn recover(&self) {
        let git_dir = self.repo.join(".git");
        for lock in LOCK_FILES {
            let path = git_dir.join(lock);
            if path.exists() {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => info!("Removed stale lock {:?}", path),
                    Err(e) => warn!("Could not remove lock file {:?}: {}", path, e),
                }
            }
        }
    }
}
