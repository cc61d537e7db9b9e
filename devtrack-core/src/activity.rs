use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Gaps between edits longer than this are idle time and not counted.
pub const IDLE_THRESHOLD_MINUTES: i64 = 5;

#[derive(Debug, Clone)]
struct FileActivity {
    last_edit: DateTime<Utc>,
    edits: u64,
    time_spent: Duration,
}

/// Per-file edit counts and active time between flushes.
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    files: HashMap<PathBuf, FileActivity>,
    idle_threshold: Duration,
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new(Duration::minutes(IDLE_THRESHOLD_MINUTES))
    }
}

impl ActivityTracker {
    pub fn new(idle_threshold: Duration) -> Self {
        Self {
            files: HashMap::new(),
            idle_threshold,
        }
    }

    pub fn record_edit(&mut self, path: &Path, at: DateTime<Utc>) {
        let threshold = self.idle_threshold;
        let activity = self
            .files
            .entry(path.to_path_buf())
            .or_insert_with(|| FileActivity {
                last_edit: at,
                edits: 0,
                time_spent: Duration::zero(),
            });

        let gap = at - activity.last_edit;
        if gap > Duration::zero() && gap < threshold {
            activity.time_spent = activity.time_spent + gap;
        }
        if at > activity.last_edit {
            activity.last_edit = at;
        }
        activity.edits += 1;
    }

    pub fn report(&self, lines_added: usize, lines_deleted: usize) -> ActivityReport {
        let time_spent = self
            .files
            .values()
            .fold(Duration::zero(), |acc, a| acc + a.time_spent);
        let edits = self.files.values().map(|a| a.edits).sum();

        let intervals: Vec<f64> = self
            .files
            .values()
            .filter(|a| a.edits > 1)
            .map(|a| a.time_spent.num_milliseconds() as f64 / (a.edits - 1) as f64)
            .collect();
        let avg_interval_secs = if intervals.is_empty() {
            0
        } else {
            (intervals.iter().sum::<f64>() / intervals.len() as f64 / 1000.0).round() as i64
        };

        ActivityReport {
            time_spent,
            edits,
            lines_added,
            lines_deleted,
            avg_interval_secs,
        }
    }

    pub fn reset(&mut self) {
        self.files.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityReport {
    pub time_spent: Duration,
    pub edits: u64,
    pub lines_added: usize,
    pub lines_deleted: usize,
    pub avg_interval_secs: i64,
}

impl ActivityReport {
    pub fn net_lines(&self) -> i64 {
        self.lines_added as i64 - self.lines_deleted as i64
    }

    /// Net lines changed per hour of active time.
    pub fn velocity(&self) -> i64 {
        let ms = self.time_spent.num_milliseconds();
        if ms <= 0 {
            return 0;
        }
        (self.net_lines().abs() as f64 / ms as f64 * 3_600_000.0).round() as i64
    }

    pub fn to_markdown(&self) -> String {
        format!(
            "## Productivity\n\n\
             | Metric | Value |\n|--------|-------|\n\
             | Time Spent | {} minutes |\n\
             | Lines Added | {} |\n\
             | Lines Deleted | {} |\n\
             | Net Lines | {} |\n\
             | Velocity | {} lines/hour |\n\
             | Avg Time Between Edits | {} seconds |\n\
             | Total Edits | {} |\n",
            self.time_spent.num_minutes(),
            self.lines_added,
            self.lines_deleted,
            self.net_lines(),
            self.velocity(),
            self.avg_interval_secs,
            self.edits
        )
    }
}
