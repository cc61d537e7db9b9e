//! Turns a set of pending changes into a commit message and a markdown
//! changelog.
//!
//! Building a summary only reads the content cache. The new baselines travel
//! with the [`Summary`] and reach the cache through
//! [`SummaryBuilder::advance_baselines`] once the commit is accepted, so a
//! failed or declined commit is reported again in full on the next attempt.

use crate::activity::{ActivityReport, ActivityTracker};
use crate::cache::ContentCache;
use crate::diff::{DiffEngine, Edit, EditKind};
use crate::error::Error;
use crate::models::{Change, ChangeKind, FileFingerprint};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const PREVIEW_LINES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub additions: usize,
    pub deletions: usize,
    pub preview: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryStats {
    pub files_added: usize,
    pub files_modified: usize,
    pub files_deleted: usize,
    pub additions: usize,
    pub deletions: usize,
}

impl SummaryStats {
    pub fn change_type(&self) -> &'static str {
        if self.additions > self.deletions * 2 {
            "Feature Addition"
        } else if self.deletions > self.additions * 2 {
            "Code Cleanup"
        } else {
            "Feature Update"
        }
    }

    pub fn impact(&self) -> &'static str {
        match self.additions + self.deletions {
            n if n > 500 => "High",
            n if n > 100 => "Medium",
            _ => "Low",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Summary {
    pub message: String,
    pub document: String,
    pub stats: SummaryStats,
    pub files: Vec<FileSummary>,
    /// New fingerprint per reported path; `None` for deleted files.
    pub fingerprints: BTreeMap<String, Option<FileFingerprint>>,
    /// Content each reported path diffs against after this summary is
    /// committed; `None` drops the path from the cache.
    pub baselines: BTreeMap<PathBuf, Option<String>>,
    pub generated_at: DateTime<Utc>,
}

/// What a successfully reported file contributes beyond its section.
struct Reported {
    fingerprint: Option<FileFingerprint>,
    baseline: Option<String>,
}

pub struct SummaryBuilder {
    cache: ContentCache,
    diff: DiffEngine,
    project_name: String,
}

impl SummaryBuilder {
    pub fn new(cache: ContentCache, diff: DiffEngine, project_name: impl Into<String>) -> Self {
        Self {
            cache,
            diff,
            project_name: project_name.into(),
        }
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ContentCache {
        &mut self.cache
    }

    pub fn set_diff_engine(&mut self, diff: DiffEngine) {
        self.diff = diff;
    }

    /// Never fails as a whole: a file that cannot be read gets an error note
    /// in its section and the remaining files are still reported.
    pub fn build(&self, changes: &[Change], activity: Option<&ActivityTracker>) -> Summary {
        let generated_at = Utc::now();
        let mut stats = SummaryStats::default();
        let mut files = Vec::with_capacity(changes.len());
        let mut fingerprints = BTreeMap::new();
        let mut baselines = BTreeMap::new();

        for change in changes {
            match change.kind {
                ChangeKind::Added => stats.files_added += 1,
                ChangeKind::Modified => stats.files_modified += 1,
                ChangeKind::Deleted => stats.files_deleted += 1,
            }

            let (file, reported) = self.summarize(change);
            stats.additions += file.additions;
            stats.deletions += file.deletions;
            if let Some(reported) = reported {
                fingerprints.insert(key(&change.path), reported.fingerprint);
                baselines.insert(change.path.clone(), reported.baseline);
            }
            files.push(file);
        }

        let message = commit_message(changes, &stats);
        let report = activity.map(|a| a.report(stats.additions, stats.deletions));
        let document = self.render_document(&files, &stats, report.as_ref(), generated_at);
        info!("Generated commit summary: \"{}\"", message);

        Summary {
            message,
            document,
            stats,
            files,
            fingerprints,
            baselines,
            generated_at,
        }
    }

    /// Makes the contents reported by `summary` the new diff baselines.
    /// Call only after the summary has been committed.
    pub fn advance_baselines(&mut self, summary: &Summary) {
        self.cache.apply_baselines(&summary.baselines);
    }

    fn summarize(&self, change: &Change) -> (FileSummary, Option<Reported>) {
        let path = change.path.as_path();
        let mut file = FileSummary {
            path: change.path.clone(),
            kind: change.kind,
            additions: 0,
            deletions: 0,
            preview: Vec::new(),
            error: None,
        };

        match change.kind {
            ChangeKind::Added => match self.read(path) {
                Ok(content) => {
                    let lines = self.diff.lines(&content);
                    file.additions = lines.len();
                    file.preview = lines.iter().take(PREVIEW_LINES).map(|l| l.to_string()).collect();
                    return (file, Some(Reported::content(content)));
                }
                Err(e) => file.error = Some(e.to_string()),
            },
            ChangeKind::Deleted => {
                let baseline = self.cache.get(path).unwrap_or_default();
                file.deletions = self.diff.line_count(baseline);
                return (
                    file,
                    Some(Reported {
                        fingerprint: None,
                        baseline: None,
                    }),
                );
            }
            ChangeKind::Modified => match self.read(path) {
                Ok(content) => {
                    let baseline = self.cache.get(path).unwrap_or_default();
                    let result = self.diff.diff(baseline, &content);
                    file.additions = result.additions;
                    file.deletions = result.deletions;
                    file.preview = result.edits.iter().take(PREVIEW_LINES).map(render_edit).collect();
                    if result.edits.len() > PREVIEW_LINES {
                        file.preview.push("...".into());
                    }
                    return (file, Some(Reported::content(content)));
                }
                Err(e) => file.error = Some(e.to_string()),
            },
        }

        if let Some(error) = &file.error {
            warn!("Skipping {}: {}", path.display(), error);
        }
        (file, None)
    }

    fn read(&self, path: &Path) -> Result<String, Error> {
        self.cache.source().read(path).map_err(|source| Error::FileAccess {
            path: path.display().to_string(),
            source,
        })
    }

    fn render_document(
        &self,
        files: &[FileSummary],
        stats: &SummaryStats,
        activity: Option<&ActivityReport>,
        at: DateTime<Utc>,
    ) -> String {
        let timestamp = at.format("%Y-%m-%d %H:%M UTC");
        let mut doc = format!("# {} Change Log\n\n", self.project_name);

        if let Some(activity) = activity {
            doc.push_str(&activity.to_markdown());
            doc.push('\n');
        }

        doc.push_str("## Change Summary\n\n");
        doc.push_str("| Metric | Count |\n|--------|-------|\n");
        doc.push_str(&format!("| Files Modified | {} |\n", stats.files_modified));
        doc.push_str(&format!("| Files Added | {} |\n", stats.files_added));
        doc.push_str(&format!("| Files Deleted | {} |\n", stats.files_deleted));

        doc.push_str("\n## Detailed Changes\n\n");
        for file in files {
            doc.push_str(&render_file(file));
        }

        doc.push_str("## Overview\n\n");
        doc.push_str(&format!("- **Additions**: +{}\n", stats.additions));
        doc.push_str(&format!("- **Deletions**: -{}\n", stats.deletions));
        doc.push_str(&format!("- **Type**: {}\n", stats.change_type()));
        doc.push_str(&format!("- **Impact**: {}\n", stats.impact()));
        doc.push_str(&format!("- **Timestamp**: {}\n", timestamp));
        doc.push_str(&format!("\n---\n\n*Generated by devtrack on {}*\n", timestamp));
        doc
    }
}

impl Reported {
    fn content(content: String) -> Self {
        Self {
            fingerprint: Some(FileFingerprint::of(&content)),
            baseline: Some(content),
        }
    }
}

fn render_file(file: &FileSummary) -> String {
    let name = file.path.display();
    if let Some(error) = &file.error {
        return format!("### {} (Error processing changes)\n\n{}\n\n", name, error);
    }

    match file.kind {
        ChangeKind::Added => {
            let mut out = format!("### {} (Added)\n\n{} lines\n\n", name, file.additions);
            if file.preview.is_empty() {
                out.push_str("Empty file created\n\n");
            } else {
                out.push_str("```\n");
                out.push_str(&file.preview.join("\n"));
                if file.additions > file.preview.len() {
                    out.push_str("\n...");
                }
                out.push_str("\n```\n\n");
            }
            out
        }
        ChangeKind::Deleted => format!(
            "### {} (Deleted)\n\n- File contained {} lines\n\n",
            name, file.deletions
        ),
        ChangeKind::Modified => {
            let mut out = format!(
                "### {} (Modified)\n\n{} additions, {} deletions\n\n",
                name, file.additions, file.deletions
            );
            if !file.preview.is_empty() {
                out.push_str("```diff\n");
                out.push_str(&file.preview.join("\n"));
                out.push_str("\n```\n\n");
            }
            out
        }
    }
}

fn render_edit(edit: &Edit) -> String {
    match edit.kind {
        EditKind::Added => format!("+ {}", edit.line),
        EditKind::Removed => format!("- {}", edit.line),
    }
}

/// `DevTrack: Files: a.rs, b.rs. | 1 files added, 2 files modified (+10 -3)`
pub fn commit_message(changes: &[Change], stats: &SummaryStats) -> String {
    let mut names: Vec<String> = Vec::new();
    for change in changes {
        let name = change
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| change.path.display().to_string());
        if !names.contains(&name) {
            names.push(name);
        }
    }

    let mut details = Vec::new();
    if stats.files_added > 0 {
        details.push(format!("{} files added", stats.files_added));
    }
    if stats.files_modified > 0 {
        details.push(format!("{} files modified", stats.files_modified));
    }
    if stats.files_deleted > 0 {
        details.push(format!("{} files deleted", stats.files_deleted));
    }

    let mut message = String::from("DevTrack:");
    if !names.is_empty() {
        message.push_str(&format!(" Files: {}.", names.join(", ")));
    }
    if details.is_empty() {
        message.push_str(" | Updated files");
    } else {
        message.push_str(&format!(" | {}", details.join(", ")));
    }
    message.push_str(&format!(" (+{} -{})", stats.additions, stats.deletions));
    message
}

fn key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
