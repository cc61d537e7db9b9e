use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VcsError {
    /// The remote is ahead of us; a fetch + rebase should let the push through.
    #[error("Push rejected by remote: {0}")]
    Rejected(String),

    #[error("Authentication required: {0}")]
    AuthRequired(String),

    /// Network hiccups and stale lock files; worth retrying after a pause.
    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Git operation failed: {0}")]
    Fatal(String),
}

impl VcsError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, VcsError::Rejected(_) | VcsError::Transient(_))
    }

    /// Classifies git's stderr output.
    pub fn classify(stderr: &str) -> Self {
        let lower = stderr.to_lowercase();
        let message = stderr.trim().to_string();

        if ["[rejected]", "non-fast-forward", "fetch first", "failed to push some refs"]
            .iter()
            .any(|p| lower.contains(p))
        {
            VcsError::Rejected(message)
        } else if [
            "authentication failed",
            "could not read username",
            "permission denied",
            "403",
            "invalid username or password",
        ]
        .iter()
        .any(|p| lower.contains(p))
        {
            VcsError::AuthRequired(message)
        } else if [
            "index.lock",
            ".lock': file exists",
            "could not resolve host",
            "timed out",
            "connection reset",
            "connection refused",
            "early eof",
            "remote end hung up",
        ]
        .iter()
        .any(|p| lower.contains(p))
        {
            VcsError::Transient(message)
        } else {
            VcsError::Fatal(message)
        }
    }
}

/// The version-control capability the scheduler pushes through.
#[async_trait]
pub trait VcsClient: Send + Sync {
    /// Idempotent: safe to call on an already initialized repository.
    async fn initialize_repository(&self, remote_url: &str) -> Result<(), VcsError>;

    /// Stages tracked files plus `document`, commits with `message` and
    /// pushes to the default branch. The changelog is named after
    /// `generated_at`; repeating the call for the same summary rewrites the
    /// same file and adds no second commit.
    async fn commit_and_push(
        &self,
        message: &str,
        document: &str,
        generated_at: DateTime<Utc>,
    ) -> Result<(), VcsError>;

    /// Brings the local branch up to date with the remote (fetch + rebase).
    async fn sync_with_remote(&self) -> Result<(), VcsError> {
        Ok(())
    }

    /// Clears leftovers of a crashed operation, such as stale lock files.
    async fn recover(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rejected_push() {
        let stderr = " ! [rejected]        main -> main (fetch first)\n\
                      error: failed to push some refs to 'github.com:me/log.git'";
        assert!(matches!(VcsError::classify(stderr), VcsError::Rejected(_)));
    }

    #[test]
    fn test_classify_auth() {
        let stderr = "fatal: Authentication failed for 'https://github.com/me/log.git/'";
        assert!(matches!(VcsError::classify(stderr), VcsError::AuthRequired(_)));
    }

    #[test]
    fn test_classify_transient() {
        let stderr = "fatal: Unable to create '/repo/.git/index.lock': File exists.";
        assert!(matches!(VcsError::classify(stderr), VcsError::Transient(_)));
        assert!(matches!(
            VcsError::classify("fatal: unable to access: Could not resolve host: github.com"),
            VcsError::Transient(_)
        ));
    }

    #[test]
    fn test_classify_fatal() {
        let err = VcsError::classify("fatal: not a git repository (or any of the parent directories)");
        assert!(matches!(err, VcsError::Fatal(_)));
        assert!(!err.is_retryable());
    }
}
