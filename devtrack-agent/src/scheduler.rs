//! Periodic commit scheduling.
//!
//! A [`CommitScheduler`] owns a repeating timer. Every timer tick is spawned
//! as its own task and runs the commit pipeline: snapshot the ledger, build a
//! summary, optionally ask for confirmation, push, and on success flush the
//! snapshot from the ledger. At most one pipeline runs at a time; a tick that
//! arrives while one is in flight only marks a follow-up, which runs shortly
//! after the current commit finishes.

use crate::notify::NotificationSink;
use crate::vcs::{VcsClient, VcsError};
use chrono::{DateTime, Utc};
use devtrack_core::{ActivityTracker, Change, ChangeLedger, ProjectStore, Summary, SummaryBuilder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const DEFAULT_FOLLOWUP_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Committing,
    /// A commit is in flight and another tick asked for a follow-up.
    PendingRetry,
}

#[derive(Error, Debug, Clone)]
pub enum SchedulerError {
    #[error("Summary generation failed: {0}")]
    Summary(String),

    #[error(transparent)]
    Vcs(#[from] VcsError),
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
    NoChanges,
    /// Another commit was in flight; a follow-up has been requested.
    Deferred,
    Declined,
    Committed { files: usize, message: String },
    Failed(SchedulerError),
}

impl TickOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, TickOutcome::Committed { .. })
    }
}

/// Published on the channel returned by [`CommitScheduler::subscribe`] after
/// every tick.
#[derive(Debug)]
pub struct TickReport {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub outcome: TickOutcome,
}

/// The state a scheduler works on, shared with the watcher and the service.
#[derive(Clone)]
pub struct SchedulerParts {
    pub ledger: Arc<Mutex<ChangeLedger>>,
    pub summary: Arc<Mutex<SummaryBuilder>>,
    pub activity: Arc<Mutex<ActivityTracker>>,
    pub store: ProjectStore,
}

struct Shared {
    parts: SchedulerParts,
    vcs: Arc<dyn VcsClient>,
    notifier: Arc<dyn NotificationSink>,
    state: Mutex<SchedulerState>,
    followup: AtomicBool,
    followup_delay: Mutex<Duration>,
    confirm: AtomicBool,
    stopped: AtomicBool,
    reports: Mutex<Option<mpsc::UnboundedSender<TickReport>>>,
}

struct Timer {
    token: CancellationToken,
    interval: Duration,
}

pub struct CommitScheduler {
    shared: Arc<Shared>,
    timer: Mutex<Option<Timer>>,
}

impl CommitScheduler {
    pub fn new(
        parts: SchedulerParts,
        vcs: Arc<dyn VcsClient>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                parts,
                vcs,
                notifier,
                state: Mutex::new(SchedulerState::Idle),
                followup: AtomicBool::new(false),
                followup_delay: Mutex::new(DEFAULT_FOLLOWUP_DELAY),
                confirm: AtomicBool::new(true),
                stopped: AtomicBool::new(false),
                reports: Mutex::new(None),
            }),
            timer: Mutex::new(None),
        }
    }

    pub fn with_confirmation(self, confirm: bool) -> Self {
        self.set_confirm_before_commit(confirm);
        self
    }

    pub fn with_followup_delay(self, delay: Duration) -> Self {
        self.set_followup_delay(delay);
        self
    }

    pub fn set_confirm_before_commit(&self, confirm: bool) {
        self.shared.confirm.store(confirm, Ordering::SeqCst);
    }

    pub fn set_followup_delay(&self, delay: Duration) {
        *relock(&self.shared.followup_delay) = delay;
    }

    /// Receives a [`TickReport`] for every tick from now on. Only the most
    /// recent subscriber is served.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TickReport> {
        let (tx, rx) = mpsc::unbounded_channel();
        *relock(&self.shared.reports) = Some(tx);
        rx
    }

    pub fn state(&self) -> SchedulerState {
        *relock(&self.shared.state)
    }

    pub fn is_running(&self) -> bool {
        relock(&self.timer).is_some()
    }

    pub fn interval(&self) -> Option<Duration> {
        relock(&self.timer).as_ref().map(|t| t.interval)
    }

    /// Starts the repeating timer, replacing any running one. The first tick
    /// fires one full `interval` from now. Must be called inside a tokio
    /// runtime.
    pub fn start(&self, interval: Duration) {
        let token = CancellationToken::new();
        let previous = relock(&self.timer).replace(Timer {
            token: token.clone(),
            interval,
        });
        if let Some(previous) = previous {
            previous.token.cancel();
        }
        self.shared.stopped.store(false, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        tokio::spawn(run_tick(Arc::clone(&shared)));
                    }
                }
            }
            debug!("Commit timer stopped");
        });

        info!("Commit scheduler started, interval {}s", interval.as_secs());
    }

    /// Cancels future ticks. A commit already in flight runs to completion.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        if let Some(timer) = relock(&self.timer).take() {
            timer.token.cancel();
            info!("Commit scheduler stopped");
        }
    }

    pub fn update_frequency(&self, interval: Duration) {
        if self.interval() == Some(interval) {
            return;
        }
        info!("Commit interval changed to {}s", interval.as_secs());
        self.start(interval);
    }

    /// Runs one tick now, plus any follow-up it triggers, and returns the
    /// outcome of the first one.
    pub async fn on_tick(&self) -> TickOutcome {
        run_tick(Arc::clone(&self.shared)).await
    }
}

impl Drop for CommitScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_tick(shared: Arc<Shared>) -> TickOutcome {
    let outcome = tick_once(&shared).await;
    let first = shared.publish(outcome);

    while shared.followup.swap(false, Ordering::SeqCst) {
        if shared.stopped.load(Ordering::SeqCst) {
            break;
        }
        let delay = *relock(&shared.followup_delay);
        debug!("Changes arrived during commit, follow-up in {}s", delay.as_secs());
        tokio::time::sleep(delay).await;
        if shared.stopped.load(Ordering::SeqCst) {
            break;
        }
        let outcome = tick_once(&shared).await;
        shared.publish(outcome);
    }

    first
}

async fn tick_once(shared: &Arc<Shared>) -> TickOutcome {
    if !shared.has_changes() {
        debug!("No pending changes");
        return TickOutcome::NoChanges;
    }

    let Some(guard) = CommitGuard::acquire(shared) else {
        info!("Commit in progress, deferring");
        return TickOutcome::Deferred;
    };

    // Taken under the guard so a commit finishing meanwhile is not repeated.
    let snapshot = shared.snapshot();
    if snapshot.is_empty() {
        return TickOutcome::NoChanges;
    }

    let outcome = match commit(shared, snapshot).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Commit failed, keeping changes for the next tick: {}", e);
            shared.notifier.error(&format!("DevTrack commit failed: {}", e));
            TickOutcome::Failed(e)
        }
    };
    drop(guard);
    outcome
}

async fn commit(shared: &Arc<Shared>, snapshot: Vec<Change>) -> Result<TickOutcome, SchedulerError> {
    let summary = build_summary(shared, snapshot.clone()).await?;

    if shared.confirm.load(Ordering::SeqCst) {
        let prompt = format!(
            "Commit {} changed file(s)?\n{}",
            snapshot.len(),
            summary.message
        );
        if !shared.notifier.confirm(&prompt).await {
            info!("Commit declined, changes stay pending");
            return Ok(TickOutcome::Declined);
        }
    }

    shared
        .vcs
        .commit_and_push(&summary.message, &summary.document, summary.generated_at)
        .await?;

    let remaining = {
        let mut ledger = relock(&shared.parts.ledger);
        ledger.flush(&snapshot);
        ledger.len()
    };
    relock(&shared.parts.summary).advance_baselines(&summary);
    relock(&shared.parts.activity).reset();
    shared.save_tracker_state(&summary);

    info!(
        "Committed {} change(s), {} still pending",
        snapshot.len(),
        remaining
    );
    shared
        .notifier
        .info(&format!("DevTrack: committed {} change(s)", snapshot.len()));

    Ok(TickOutcome::Committed {
        files: snapshot.len(),
        message: summary.message,
    })
}

async fn build_summary(shared: &Arc<Shared>, changes: Vec<Change>) -> Result<Summary, SchedulerError> {
    let activity = relock(&shared.parts.activity).clone();
    let builder = Arc::clone(&shared.parts.summary);

    tokio::task::spawn_blocking(move || {
        let builder = relock(&builder);
        builder.build(&changes, Some(&activity))
    })
    .await
    .map_err(|e| SchedulerError::Summary(e.to_string()))
}

impl Shared {
    fn has_changes(&self) -> bool {
        !relock(&self.parts.ledger).is_empty()
    }

    fn snapshot(&self) -> Vec<Change> {
        relock(&self.parts.ledger).current_changes()
    }

    fn save_tracker_state(&self, summary: &Summary) {
        let store = &self.parts.store;
        let mut state = match store.load_tracker_state() {
            Ok(state) => state,
            Err(e) => {
                warn!("Rebuilding tracker state: {}", e);
                Default::default()
            }
        };
        state.apply(&summary.fingerprints);
        if let Err(e) = store.save_tracker_state(&state) {
            warn!("Failed to save tracker state: {}", e);
        }
    }

    fn publish(&self, outcome: TickOutcome) -> TickOutcome {
        let mut reports = relock(&self.reports);
        if let Some(tx) = reports.as_ref() {
            let report = TickReport {
                id: Uuid::new_v4(),
                at: Utc::now(),
                outcome: outcome.clone(),
            };
            if tx.send(report).is_err() {
                *reports = None;
            }
        }
        outcome
    }
}

/// Holds the `Committing` state for the duration of one pipeline run. On
/// drop, including unwinding, the scheduler goes back to `Idle` and a
/// follow-up is recorded if one was requested meanwhile.
struct CommitGuard {
    shared: Arc<Shared>,
}

impl CommitGuard {
    fn acquire(shared: &Arc<Shared>) -> Option<Self> {
        let mut state = relock(&shared.state);
        match *state {
            SchedulerState::Idle => {
                *state = SchedulerState::Committing;
                Some(Self {
                    shared: Arc::clone(shared),
                })
            }
            SchedulerState::Committing | SchedulerState::PendingRetry => {
                *state = SchedulerState::PendingRetry;
                None
            }
        }
    }
}

impl Drop for CommitGuard {
    fn drop(&mut self) {
        let mut state = relock(&self.shared.state);
        if *state == SchedulerState::PendingRetry {
            self.shared.followup.store(true, Ordering::SeqCst);
        }
        *state = SchedulerState::Idle;
    }
}

/// Locks past poisoning. A panic inside one tick abandons that tick only;
/// the ledger, cache and tracker it touched stay usable for the next one.
pub(crate) fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;
    use crate::retry::{RetryPolicy, RetryingVcs};
    use async_trait::async_trait;
    use devtrack_core::{
        ChangeKind, ContentCache, ContentCipher, ContentSource, DiffEngine, MachineIdentity,
        MemorySource, Settings,
    };
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct MockVcs {
        results: Mutex<VecDeque<Result<(), VcsError>>>,
        documents: Mutex<Vec<String>>,
        calls: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
        gate: Mutex<Option<Arc<Notify>>>,
    }

    impl MockVcs {
        fn failing(results: Vec<Result<(), VcsError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                ..Self::default()
            }
        }

        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                gate: Mutex::new(Some(gate)),
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn documents(&self) -> Vec<String> {
            self.documents.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VcsClient for MockVcs {
        async fn initialize_repository(&self, _remote_url: &str) -> Result<(), VcsError> {
            Ok(())
        }

        async fn commit_and_push(
            &self,
            _message: &str,
            document: &str,
            _generated_at: DateTime<Utc>,
        ) -> Result<(), VcsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.documents.lock().unwrap().push(document.to_string());
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);

            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.notified().await;
            } else {
                tokio::task::yield_now().await;
            }

            self.active.fetch_sub(1, Ordering::SeqCst);
            self.results.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }
    }

    /// Panics on its first read, then reads through.
    struct PanicOnce {
        inner: Arc<MemorySource>,
        armed: AtomicBool,
    }

    impl ContentSource for PanicOnce {
        fn read(&self, path: &Path) -> std::io::Result<String> {
            if self.armed.swap(false, Ordering::SeqCst) {
                panic!("read of {:?} blew up", path);
            }
            self.inner.read(path)
        }
    }

    struct Harness {
        _dir: TempDir,
        source: Arc<MemorySource>,
        parts: SchedulerParts,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_source(|memory| memory as Arc<dyn ContentSource>)
        }

        fn with_source(wrap: impl FnOnce(Arc<MemorySource>) -> Arc<dyn ContentSource>) -> Self {
            let dir = TempDir::new().unwrap();
            let store = ProjectStore::open_named(dir.path().to_path_buf(), "demo").unwrap();
            let source = Arc::new(MemorySource::new());
            let cipher = ContentCipher::for_machine(&MachineIdentity {
                username: "dev".into(),
                hostname: "box".into(),
                home: "/home/dev".into(),
            })
            .unwrap();
            let cache = ContentCache::new(store.clone(), cipher, wrap(source.clone()));
            let ledger = ChangeLedger::new(Settings::default().path_filter().unwrap());

            Self {
                _dir: dir,
                source,
                parts: SchedulerParts {
                    ledger: Arc::new(Mutex::new(ledger)),
                    summary: Arc::new(Mutex::new(SummaryBuilder::new(
                        cache,
                        DiffEngine::default(),
                        "demo",
                    ))),
                    activity: Arc::new(Mutex::new(ActivityTracker::default())),
                    store,
                },
            }
        }

        fn edit(&self, path: &str, content: &str, kind: ChangeKind) {
            self.source.write(path, content);
            self.parts.ledger.lock().unwrap().record(Path::new(path), kind);
        }

        fn pending(&self) -> Vec<Change> {
            self.parts.ledger.lock().unwrap().current_changes()
        }

        fn baseline(&self, path: &str) -> Option<String> {
            let summary = self.parts.summary.lock().unwrap();
            summary.cache().get(Path::new(path)).map(str::to_string)
        }

        fn scheduler(&self, vcs: Arc<dyn VcsClient>) -> CommitScheduler {
            CommitScheduler::new(
                self.parts.clone(),
                vcs,
                Arc::new(LogNotifier { auto_confirm: true }),
            )
            .with_followup_delay(Duration::from_millis(10))
        }
    }

    #[tokio::test]
    async fn test_empty_ledger_is_a_noop() {
        let harness = Harness::new();
        let vcs = Arc::new(MockVcs::default());
        let scheduler = harness.scheduler(vcs.clone());

        assert!(matches!(scheduler.on_tick().await, TickOutcome::NoChanges));
        assert_eq!(vcs.calls(), 0);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_successful_commit_flushes_ledger() {
        let harness = Harness::new();
        harness.edit("src/main.rs", "fn main() {}\n", ChangeKind::Added);
        let vcs = Arc::new(MockVcs::default());
        let scheduler = harness.scheduler(vcs.clone());

        let outcome = scheduler.on_tick().await;

        assert!(outcome.is_committed());
        assert!(harness.pending().is_empty());
        assert_eq!(vcs.calls(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        let state = harness.parts.store.load_tracker_state().unwrap();
        assert!(state.last_known_state.contains_key("src/main.rs"));
    }

    #[tokio::test]
    async fn test_failed_push_keeps_every_change() {
        let harness = Harness::new();
        harness.edit("a.rs", "a\n", ChangeKind::Added);
        harness.edit("b.rs", "b\n", ChangeKind::Added);
        let before = harness.pending();

        let vcs = Arc::new(MockVcs::failing(vec![Err(VcsError::Fatal("boom".into()))]));
        let scheduler = harness.scheduler(vcs.clone());

        let outcome = scheduler.on_tick().await;

        assert!(matches!(outcome, TickOutcome::Failed(SchedulerError::Vcs(_))));
        assert_eq!(harness.pending(), before);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(harness.baseline("a.rs"), None);
    }

    #[tokio::test]
    async fn test_commit_after_failed_push_reports_original_counts() {
        let harness = Harness::new();
        harness.source.write("a.rs", "a\nb\n");
        harness
            .parts
            .summary
            .lock()
            .unwrap()
            .cache_mut()
            .capture(Path::new("a.rs"))
            .unwrap();
        harness.edit("a.rs", "a\nc\nd\n", ChangeKind::Modified);

        let vcs = Arc::new(MockVcs::failing(vec![Err(VcsError::Fatal("boom".into()))]));
        let scheduler = harness.scheduler(vcs.clone());

        assert!(matches!(scheduler.on_tick().await, TickOutcome::Failed(_)));
        assert_eq!(harness.baseline("a.rs").as_deref(), Some("a\nb\n"));

        let TickOutcome::Committed { message, .. } = scheduler.on_tick().await else {
            panic!("second tick did not commit");
        };
        assert!(message.ends_with("(+2 -1)"), "{}", message);

        let documents = vcs.documents();
        assert_eq!(documents.len(), 2);
        assert!(documents.iter().all(|d| d.contains("2 additions, 1 deletions")));
        assert_eq!(harness.baseline("a.rs").as_deref(), Some("a\nc\nd\n"));
    }

    #[tokio::test]
    async fn test_panicking_tick_does_not_stop_later_ticks() {
        let harness = Harness::with_source(|memory| {
            Arc::new(PanicOnce {
                inner: memory,
                armed: AtomicBool::new(true),
            }) as Arc<dyn ContentSource>
        });
        harness.edit("a.rs", "a\n", ChangeKind::Added);
        let vcs = Arc::new(MockVcs::default());
        let scheduler = harness.scheduler(vcs.clone());

        assert!(matches!(
            scheduler.on_tick().await,
            TickOutcome::Failed(SchedulerError::Summary(_))
        ));
        assert!(harness.parts.summary.is_poisoned());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(harness.pending().len(), 1);

        assert!(scheduler.on_tick().await.is_committed());
        assert_eq!(vcs.calls(), 1);
        assert!(harness.pending().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_push_is_retried_and_clears_ledger() {
        let harness = Harness::new();
        harness.edit("lib.rs", "pub fn x() {}\n", ChangeKind::Added);

        let vcs = Arc::new(RetryingVcs::new(
            MockVcs::failing(vec![Err(VcsError::Rejected("fetch first".into()))]),
            RetryPolicy::no_delay(3),
        ));
        let scheduler = harness.scheduler(vcs.clone());

        assert!(scheduler.on_tick().await.is_committed());
        assert_eq!(vcs.inner().calls(), 2);
        assert!(harness.pending().is_empty());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_declined_confirmation_keeps_changes() {
        let harness = Harness::new();
        harness.edit("a.rs", "a\n", ChangeKind::Added);
        let vcs = Arc::new(MockVcs::default());
        let scheduler = CommitScheduler::new(
            harness.parts.clone(),
            vcs.clone(),
            Arc::new(LogNotifier {
                auto_confirm: false,
            }),
        );

        assert!(matches!(scheduler.on_tick().await, TickOutcome::Declined));
        assert_eq!(vcs.calls(), 0);
        assert_eq!(harness.pending().len(), 1);
        assert_eq!(harness.baseline("a.rs"), None);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_tick_during_commit_defers_and_follows_up() {
        let harness = Harness::new();
        harness.edit("first.rs", "1\n", ChangeKind::Added);

        let gate = Arc::new(Notify::new());
        let vcs = Arc::new(MockVcs::gated(gate.clone()));
        let scheduler = Arc::new(harness.scheduler(vcs.clone()));

        let running = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.on_tick().await })
        };
        while vcs.calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(scheduler.state(), SchedulerState::Committing);

        harness.edit("second.rs", "2\n", ChangeKind::Added);
        assert!(matches!(scheduler.on_tick().await, TickOutcome::Deferred));
        assert_eq!(scheduler.state(), SchedulerState::PendingRetry);

        gate.notify_one();
        assert!(running.await.unwrap().is_committed());

        assert_eq!(vcs.calls(), 2);
        assert_eq!(vcs.max_active.load(Ordering::SeqCst), 1);
        assert!(harness.pending().is_empty());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ticks_commit_once() {
        let harness = Harness::new();
        harness.edit("a.rs", "a\n", ChangeKind::Added);
        let vcs = Arc::new(MockVcs::default());
        let scheduler = Arc::new(harness.scheduler(vcs.clone()));

        let ticks: Vec<_> = (0..8)
            .map(|_| {
                let scheduler = Arc::clone(&scheduler);
                tokio::spawn(async move { scheduler.on_tick().await })
            })
            .collect();
        let mut committed = 0;
        for tick in ticks {
            if tick.await.unwrap().is_committed() {
                committed += 1;
            }
        }

        assert_eq!(committed, 1);
        assert_eq!(vcs.calls(), 1);
        assert_eq!(vcs.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reports_are_published() {
        let harness = Harness::new();
        harness.edit("a.rs", "a\n", ChangeKind::Added);
        let scheduler = harness.scheduler(Arc::new(MockVcs::default()));
        let mut reports = scheduler.subscribe();

        scheduler.on_tick().await;
        scheduler.on_tick().await;

        assert!(reports.recv().await.unwrap().outcome.is_committed());
        assert!(matches!(
            reports.recv().await.unwrap().outcome,
            TickOutcome::NoChanges
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_interval() {
        let harness = Harness::new();
        harness.edit("a.rs", "a\n", ChangeKind::Added);
        let vcs = Arc::new(MockVcs::default());
        let scheduler = harness.scheduler(vcs.clone());
        let mut reports = scheduler.subscribe();

        scheduler.start(Duration::from_secs(60));
        assert!(scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(vcs.calls(), 0);

        while !reports.recv().await.unwrap().outcome.is_committed() {}
        assert_eq!(vcs.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_future_ticks() {
        let harness = Harness::new();
        harness.edit("a.rs", "a\n", ChangeKind::Added);
        let vcs = Arc::new(MockVcs::default());
        let scheduler = harness.scheduler(vcs.clone());

        scheduler.start(Duration::from_secs(60));
        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(vcs.calls(), 0);
        assert_eq!(harness.pending().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_frequency_restarts_timer() {
        let harness = Harness::new();
        let scheduler = harness.scheduler(Arc::new(MockVcs::default()));

        scheduler.start(Duration::from_secs(60));
        scheduler.update_frequency(Duration::from_secs(600));
        assert_eq!(scheduler.interval(), Some(Duration::from_secs(600)));
        assert!(scheduler.is_running());
    }
}
