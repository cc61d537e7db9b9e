use crate::filter::{is_well_formed, PathFilter};
use crate::models::{hash_content, Change, ChangeKind, TrackerState};
use crate::source::ContentSource;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Net-effect changes since the last successful flush, at most one per path.
#[derive(Debug)]
pub struct ChangeLedger {
    changes: BTreeMap<PathBuf, Change>,
    filter: PathFilter,
}

impl ChangeLedger {
    pub fn new(filter: PathFilter) -> Self {
        Self {
            changes: BTreeMap::new(),
            filter,
        }
    }

    /// Applies one file-system event. Returns whether it was recorded.
    pub fn record(&mut self, path: &Path, kind: ChangeKind) -> bool {
        self.record_at(path, kind, Utc::now())
    }

    pub fn record_at(&mut self, path: &Path, kind: ChangeKind, at: DateTime<Utc>) -> bool {
        if !is_well_formed(path) {
            warn!("Ignoring malformed path: {:?}", path);
            return false;
        }
        if !self.filter.accepts(path) {
            debug!("Filtered out {:?}", path);
            return false;
        }

        let kind = match self.changes.get(path) {
            Some(existing) => existing.kind.merge(kind),
            None => kind,
        };
        self.changes
            .insert(path.to_path_buf(), Change::new(kind, path.to_path_buf()).detected_at(at));

        info!("Detected {} in {}", kind.as_str(), path.display());
        true
    }

    /// Path-sorted snapshot of pending changes.
    pub fn current_changes(&self) -> Vec<Change> {
        self.changes.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
        info!("Cleared tracked changes");
    }

    /// Removes the records in `snapshot` that have not been touched since it
    /// was taken; newer events for the same paths stay pending.
    pub fn flush(&mut self, snapshot: &[Change]) -> usize {
        let mut removed = 0;
        for change in snapshot {
            if self.changes.get(&change.path) == Some(change) {
                self.changes.remove(&change.path);
                removed += 1;
            }
        }
        info!(
            "Flushed {} change(s), {} still pending",
            removed,
            self.changes.len()
        );
        removed
    }

    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut PathFilter {
        &mut self.filter
    }

    /// Records edits made while nothing was watching: every path known to
    /// the last flush whose content hash no longer matches becomes Modified,
    /// and every path that can no longer be read becomes Deleted.
    pub fn reconcile(&mut self, state: &TrackerState, source: &dyn ContentSource) -> usize {
        let mut recorded = 0;
        for (path, fingerprint) in &state.last_known_state {
            let path = Path::new(path);
            let kind = match source.read(path) {
                Ok(content) if hash_content(content.as_bytes()) == fingerprint.hash => continue,
                Ok(_) => ChangeKind::Modified,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => ChangeKind::Deleted,
                Err(e) => {
                    warn!("Skipping reconciliation of {}: {}", path.display(), e);
                    continue;
                }
            };
            if self.record(path, kind) {
                recorded += 1;
            }
        }
        if recorded > 0 {
            info!("Reconciled {} offline change(s)", recorded);
        }
        recorded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileFingerprint;
    use crate::source::MemorySource;

    fn ledger(exclude: &[&str]) -> ChangeLedger {
        let exclude: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
        let filter = PathFilter::new(["ts", "rs", "log"], &exclude)
            .unwrap()
            .with_reserved_dir(".devtrack");
        ChangeLedger::new(filter)
    }

    #[test]
    fn test_repeated_modify_collapses() {
        let mut ledger = ledger(&[]);
        for _ in 0..5 {
            ledger.record(Path::new("src/app.ts"), ChangeKind::Modified);
        }

        let changes = ledger.current_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Modified);
    }

    #[test]
    fn test_resurrection() {
        let mut ledger = ledger(&[]);
        ledger.record(Path::new("src/app.ts"), ChangeKind::Deleted);
        ledger.record(Path::new("src/app.ts"), ChangeKind::Added);

        assert_eq!(ledger.current_changes()[0].kind, ChangeKind::Added);
    }

    #[test]
    fn test_added_then_modified_stays_added() {
        let mut ledger = ledger(&[]);
        ledger.record(Path::new("new.rs"), ChangeKind::Added);
        ledger.record(Path::new("new.rs"), ChangeKind::Modified);

        assert_eq!(ledger.current_changes()[0].kind, ChangeKind::Added);
    }

    #[test]
    fn test_refreshes_detected_at() {
        let mut ledger = ledger(&[]);
        let first = Utc::now() - chrono::Duration::minutes(5);
        let second = Utc::now();
        ledger.record_at(Path::new("a.rs"), ChangeKind::Modified, first);
        ledger.record_at(Path::new("a.rs"), ChangeKind::Modified, second);

        assert_eq!(ledger.current_changes()[0].detected_at, second);
    }

    #[test]
    fn test_exclude_pattern() {
        let mut ledger = ledger(&["**/*.log"]);
        assert!(!ledger.record(Path::new("debug.log"), ChangeKind::Added));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_self_tracking_is_ignored() {
        let mut ledger = ledger(&[]);
        assert!(!ledger.record(Path::new(".devtrack/state.rs"), ChangeKind::Modified));
        assert!(!ledger.record(Path::new("../escape.rs"), ChangeKind::Modified));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_changes_are_path_sorted() {
        let mut ledger = ledger(&[]);
        ledger.record(Path::new("z.rs"), ChangeKind::Added);
        ledger.record(Path::new("a.rs"), ChangeKind::Added);
        ledger.record(Path::new("m/b.rs"), ChangeKind::Added);

        let paths: Vec<PathBuf> = ledger.current_changes().into_iter().map(|c| c.path).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("a.rs"), PathBuf::from("m/b.rs"), PathBuf::from("z.rs")]
        );
    }

    #[test]
    fn test_flush_keeps_newer_events() {
        let mut ledger = ledger(&[]);
        let earlier = Utc::now() - chrono::Duration::seconds(30);
        ledger.record_at(Path::new("a.rs"), ChangeKind::Modified, earlier);
        ledger.record_at(Path::new("b.rs"), ChangeKind::Modified, earlier);
        let snapshot = ledger.current_changes();

        ledger.record(Path::new("b.rs"), ChangeKind::Modified);
        ledger.record(Path::new("c.rs"), ChangeKind::Added);

        assert_eq!(ledger.flush(&snapshot), 1);
        let remaining: Vec<PathBuf> = ledger.current_changes().into_iter().map(|c| c.path).collect();
        assert_eq!(remaining, vec![PathBuf::from("b.rs"), PathBuf::from("c.rs")]);

        ledger.clear();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_reconcile_detects_offline_edits() {
        let source = MemorySource::new();
        source.write("same.rs", "fn same() {}");
        source.write("edited.rs", "fn edited() { 1 }");

        let mut state = TrackerState::default();
        for (path, content) in [
            ("same.rs", "fn same() {}"),
            ("edited.rs", "fn edited() {}"),
            ("gone.rs", "fn gone() {}"),
        ] {
            state
                .last_known_state
                .insert(path.to_string(), FileFingerprint::of(content));
        }

        let mut ledger = ledger(&[]);
        assert_eq!(ledger.reconcile(&state, &source), 2);

        let changes = ledger.current_changes();
        assert_eq!(changes[0].path, PathBuf::from("edited.rs"));
        assert_eq!(changes[0].kind, ChangeKind::Modified);
        assert_eq!(changes[1].path, PathBuf::from("gone.rs"));
        assert_eq!(changes[1].kind, ChangeKind::Deleted);
    }
}
