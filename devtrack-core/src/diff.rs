//! Line-level diffing based on the longest common subsequence of two texts.
//!
//! The DP table is `O(n * m)` in time and memory over the line counts that
//! remain after the common prefix and suffix are trimmed. Inputs whose table
//! would exceed [`DiffEngine::max_cells`] are rejected and reported as a
//! zero diff instead.

use crate::error::{Error, Result};
use tracing::warn;

/// Upper bound on DP table cells (~200 MB of `u32`).
pub const DEFAULT_MAX_CELLS: usize = 50_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub kind: EditKind,
    pub line: String,
}

impl Edit {
    fn added(line: &str) -> Self {
        Self {
            kind: EditKind::Added,
            line: line.to_string(),
        }
    }

    fn removed(line: &str) -> Self {
        Self {
            kind: EditKind::Removed,
            line: line.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    pub additions: usize,
    pub deletions: usize,
    pub edits: Vec<Edit>,
}

impl DiffResult {
    fn from_edits(edits: Vec<Edit>) -> Self {
        let additions = edits.iter().filter(|e| e.kind == EditKind::Added).count();
        Self {
            additions,
            deletions: edits.len() - additions,
            edits,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// `+ line` / `- line` rendering of the first `limit` edits.
    pub fn format_preview(&self, limit: usize) -> String {
        let mut output = String::new();
        for edit in self.edits.iter().take(limit) {
            let prefix = match edit.kind {
                EditKind::Added => "+",
                EditKind::Removed => "-",
            };
            output.push_str(&format!("{} {}\n", prefix, edit.line));
        }
        if self.edits.len() > limit {
            output.push_str("...\n");
        }
        output
    }
}

/// Whether whitespace-only lines take part in comparisons and counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlankLines {
    #[default]
    Keep,
    Ignore,
}

#[derive(Debug, Clone)]
pub struct DiffEngine {
    blank_lines: BlankLines,
    max_cells: usize,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new(BlankLines::Keep)
    }
}

impl DiffEngine {
    pub fn new(blank_lines: BlankLines) -> Self {
        Self {
            blank_lines,
            max_cells: DEFAULT_MAX_CELLS,
        }
    }

    pub fn with_max_cells(mut self, max_cells: usize) -> Self {
        self.max_cells = max_cells;
        self
    }

    pub fn max_cells(&self) -> usize {
        self.max_cells
    }

    pub fn blank_lines(&self) -> BlankLines {
        self.blank_lines
    }

    /// Splits `text` into lines under the configured blank-line policy.
    pub fn lines<'a>(&self, text: &'a str) -> Vec<&'a str> {
        text.lines()
            .filter(|line| match self.blank_lines {
                BlankLines::Keep => true,
                BlankLines::Ignore => !line.trim().is_empty(),
            })
            .collect()
    }

    pub fn line_count(&self, text: &str) -> usize {
        self.lines(text).len()
    }

    /// Never fails: internal errors are logged and yield an empty result.
    pub fn diff(&self, old_text: &str, new_text: &str) -> DiffResult {
        match self.try_diff(old_text, new_text) {
            Ok(result) => result,
            Err(e) => {
                warn!("Treating diff as empty: {}", e);
                DiffResult::default()
            }
        }
    }

    pub fn try_diff(&self, old_text: &str, new_text: &str) -> Result<DiffResult> {
        let old_lines = self.lines(old_text);
        let new_lines = self.lines(new_text);

        let prefix = old_lines
            .iter()
            .zip(&new_lines)
            .take_while(|(a, b)| a == b)
            .count();
        let suffix = old_lines[prefix..]
            .iter()
            .rev()
            .zip(new_lines[prefix..].iter().rev())
            .take_while(|(a, b)| a == b)
            .count();

        let old_mid = &old_lines[prefix..old_lines.len() - suffix];
        let new_mid = &new_lines[prefix..new_lines.len() - suffix];

        let edits = self.compute_edits(old_mid, new_mid)?;
        Ok(DiffResult::from_edits(edits))
    }

    fn compute_edits(&self, old: &[&str], new: &[&str]) -> Result<Vec<Edit>> {
        if old.is_empty() {
            return Ok(new.iter().map(|l| Edit::added(l)).collect());
        }
        if new.is_empty() {
            return Ok(old.iter().map(|l| Edit::removed(l)).collect());
        }

        let width = new.len() + 1;
        let cells = (old.len() + 1)
            .checked_mul(width)
            .filter(|cells| *cells <= self.max_cells)
            .ok_or_else(|| {
                Error::DiffComputation(format!(
                    "{} x {} lines exceeds the {} cell limit",
                    old.len(),
                    new.len(),
                    self.max_cells
                ))
            })?;

        // table[i * width + j] = LCS length of old[i..] and new[j..]
        let mut table = vec![0u32; cells];
        for i in (0..old.len()).rev() {
            for j in (0..new.len()).rev() {
                table[i * width + j] = if old[i] == new[j] {
                    table[(i + 1) * width + j + 1] + 1
                } else {
                    table[(i + 1) * width + j].max(table[i * width + j + 1])
                };
            }
        }

        let mut edits = Vec::with_capacity(old.len() + new.len());
        let (mut i, mut j) = (0, 0);
        while i < old.len() && j < new.len() {
            if old[i] == new[j] {
                i += 1;
                j += 1;
            } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
                // Ties favor the removal so a replaced line reads "- old, + new".
                edits.push(Edit::removed(old[i]));
                i += 1;
            } else {
                edits.push(Edit::added(new[j]));
                j += 1;
            }
        }
        edits.extend(old[i..].iter().map(|l| Edit::removed(l)));
        edits.extend(new[j..].iter().map(|l| Edit::added(l)));

        Ok(edits)
    }
}
