use crate::error::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Include/exclude policy applied to workspace-relative paths before they
/// reach the ledger.
#[derive(Debug, Clone)]
pub struct PathFilter {
    extensions: HashSet<String>,
    exclude: GlobSet,
    exclude_patterns: Vec<String>,
    reserved_dirs: Vec<PathBuf>,
}

impl PathFilter {
    pub fn new<I, S>(extensions: I, exclude_patterns: &[String]) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            exclude: build_globset(exclude_patterns)?,
            exclude_patterns: exclude_patterns.to_vec(),
            reserved_dirs: Vec::new(),
        })
    }

    /// Never track anything under `dir` (the tool's own storage and output).
    pub fn with_reserved_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reserved_dirs.push(dir.into());
        self
    }

    pub fn set_exclude_patterns(&mut self, patterns: &[String]) -> Result<()> {
        self.exclude = build_globset(patterns)?;
        self.exclude_patterns = patterns.to_vec();
        Ok(())
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    pub fn accepts(&self, path: &Path) -> bool {
        if self.reserved_dirs.iter().any(|dir| path.starts_with(dir)) {
            return false;
        }

        let tracked = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(&e.to_lowercase()))
            .unwrap_or(false);

        tracked && !self.exclude.is_match(path)
    }
}

/// Relative, non-empty and free of `..`; anything else is malformed.
pub fn is_well_formed(path: &Path) -> bool {
    path.file_name().is_some()
        && path.to_str().is_some()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
