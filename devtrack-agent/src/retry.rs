use crate::vcs::{VcsClient, VcsError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Bounded retries with linearly growing pauses (`base_delay * attempt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn no_delay(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    /// Pause after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Wraps a [`VcsClient`] so that every operation runs alone and retries its
/// recoverable failures. The lock is FIFO, so callers queue up in arrival
/// order and never interleave on the working copy.
pub struct RetryingVcs<V> {
    inner: V,
    policy: RetryPolicy,
    queue: Mutex<()>,
}

impl<V: VcsClient> RetryingVcs<V> {
    pub fn new(inner: V, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            queue: Mutex::new(()),
        }
    }

    pub fn into_shared(self) -> Arc<dyn VcsClient>
    where
        V: 'static,
    {
        Arc::new(self)
    }

    pub fn inner(&self) -> &V {
        &self.inner
    }

    async fn prepare_retry(&self, error: &VcsError, attempt: u32) {
        tokio::time::sleep(self.policy.backoff(attempt)).await;
        self.inner.recover().await;

        if let VcsError::Rejected(_) = error {
            info!("Remote is ahead, rebasing before the next push");
            if let Err(e) = self.inner.sync_with_remote().await {
                warn!("Rebase onto remote failed: {}", e);
            }
        }
    }
}

#[async_trait]
impl<V: VcsClient> VcsClient for RetryingVcs<V> {
    async fn initialize_repository(&self, remote_url: &str) -> Result<(), VcsError> {
        let _turn = self.queue.lock().await;
        let mut attempt = 1;
        loop {
            match self.inner.initialize_repository(remote_url).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    warn!(
                        "Initialize failed (attempt {}/{}): {}",
                        attempt, self.policy.max_attempts, e
                    );
                    self.prepare_retry(&e, attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn commit_and_push(
        &self,
        message: &str,
        document: &str,
        generated_at: DateTime<Utc>,
    ) -> Result<(), VcsError> {
        let _turn = self.queue.lock().await;
        let mut attempt = 1;
        loop {
            match self
                .inner
                .commit_and_push(message, document, generated_at)
                .await
            {
                Ok(()) => {
                    if attempt > 1 {
                        info!("Push succeeded on attempt {}", attempt);
                    }
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    warn!(
                        "Commit/push failed (attempt {}/{}): {}",
                        attempt, self.policy.max_attempts, e
                    );
                    self.prepare_retry(&e, attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn sync_with_remote(&self) -> Result<(), VcsError> {
        let _turn = self.queue.lock().await;
        self.inner.sync_with_remote().await
    }

    async fn recover(&self) {
        self.inner.recover().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct ScriptedVcs {
        results: StdMutex<VecDeque<Result<(), VcsError>>>,
        pushes: AtomicUsize,
        syncs: AtomicUsize,
        recovers: AtomicUsize,
    }

    impl ScriptedVcs {
        fn new(results: Vec<Result<(), VcsError>>) -> Self {
            Self {
                results: StdMutex::new(results.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl VcsClient for ScriptedVcs {
        async fn initialize_repository(&self, _remote_url: &str) -> Result<(), VcsError> {
            Ok(())
        }

        async fn commit_and_push(
            &self,
            _message: &str,
            _document: &str,
            _generated_at: DateTime<Utc>,
        ) -> Result<(), VcsError> {
            self.pushes.fetch_add(1, Ordering::SeqCst);
            self.results.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }

        async fn sync_with_remote(&self) -> Result<(), VcsError> {
            self.syncs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn recover(&self) {
            self.recovers.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_rejected_push_rebases_and_retries() {
        let vcs = RetryingVcs::new(
            ScriptedVcs::new(vec![Err(VcsError::Rejected("fetch first".into()))]),
            RetryPolicy::no_delay(3),
        );

        vcs.commit_and_push("msg", "doc", Utc::now()).await.unwrap();
        assert_eq!(vcs.inner().pushes.load(Ordering::SeqCst), 2);
        assert_eq!(vcs.inner().syncs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let vcs = RetryingVcs::new(
            ScriptedVcs::new(vec![
                Err(VcsError::Transient("lock".into())),
                Err(VcsError::Transient("lock".into())),
                Err(VcsError::Transient("lock".into())),
                Ok(()),
            ]),
            RetryPolicy::no_delay(3),
        );

        let err = vcs.commit_and_push("msg", "doc", Utc::now()).await.unwrap_err();
        assert!(matches!(err, VcsError::Transient(_)));
        assert_eq!(vcs.inner().pushes.load(Ordering::SeqCst), 3);
        assert_eq!(vcs.inner().recovers.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_auth_errors_are_not_retried() {
        let vcs = RetryingVcs::new(
            ScriptedVcs::new(vec![Err(VcsError::AuthRequired("login".into()))]),
            RetryPolicy::no_delay(3),
        );

        assert!(matches!(
            vcs.commit_and_push("msg", "doc", Utc::now()).await,
            Err(VcsError::AuthRequired(_))
        ));
        assert_eq!(vcs.inner().pushes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));

        let vcs = RetryingVcs::new(
            ScriptedVcs::new(vec![
                Err(VcsError::Transient("net".into())),
                Err(VcsError::Transient("net".into())),
            ]),
            policy,
        );
        let started = tokio::time::Instant::now();
        vcs.commit_and_push("msg", "doc", Utc::now()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
