use crate::diff::BlankLines;
use crate::error::{Error, Result};
use crate::filter::PathFilter;
use crate::storage::{self, STORE_DIR};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MIN_COMMIT_FREQUENCY: u64 = 1;
pub const MAX_COMMIT_FREQUENCY: u64 = 120;

const DEFAULT_EXTENSIONS: &[&str] = &[
    "ts", "js", "py", "java", "c", "cpp", "h", "hpp", "css", "scss", "html", "jsx", "tsx", "vue",
    "php", "rb", "go", "rs", "swift", "md", "json", "yml", "yaml",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Minutes between scheduled commits.
    pub commit_frequency: u64,
    pub exclude: Vec<String>,
    pub confirm_before_commit: bool,
    pub repo_name: String,
    pub tracked_extensions: Vec<String>,
    pub ignore_blank_lines: bool,
    /// Workspace-relative directory the generated changelogs are written to.
    pub changelog_dir: String,
    pub followup_delay_secs: u64,
    pub branch: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            commit_frequency: 1,
            exclude: vec![
                "**/node_modules/**".into(),
                "**/.git/**".into(),
                "**/target/**".into(),
                "**/dist/**".into(),
                "**/out/**".into(),
            ],
            confirm_before_commit: true,
            repo_name: "code-tracking".into(),
            tracked_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            ignore_blank_lines: false,
            changelog_dir: "changelog".into(),
            followup_delay_secs: 5,
            branch: "main".into(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_COMMIT_FREQUENCY..=MAX_COMMIT_FREQUENCY).contains(&self.commit_frequency) {
            return Err(Error::Config(format!(
                "commit_frequency must be between {} and {} minutes, got {}",
                MIN_COMMIT_FREQUENCY, MAX_COMMIT_FREQUENCY, self.commit_frequency
            )));
        }
        if self.repo_name.trim().is_empty() {
            return Err(Error::Config("repo_name must not be empty".into()));
        }
        if self.branch.trim().is_empty() {
            return Err(Error::Config("branch must not be empty".into()));
        }
        if self.changelog_dir.trim().is_empty() || Path::new(&self.changelog_dir).is_absolute() {
            return Err(Error::Config(
                "changelog_dir must be a relative directory".into(),
            ));
        }
        if self.tracked_extensions.is_empty() {
            return Err(Error::Config("tracked_extensions must not be empty".into()));
        }
        Ok(())
    }

    pub fn commit_interval(&self) -> Duration {
        Duration::from_secs(self.commit_frequency * 60)
    }

    pub fn followup_delay(&self) -> Duration {
        Duration::from_secs(self.followup_delay_secs)
    }

    pub fn blank_lines(&self) -> BlankLines {
        if self.ignore_blank_lines {
            BlankLines::Ignore
        } else {
            BlankLines::Keep
        }
    }

    /// Path filter for this configuration, with the tool's own directories
    /// reserved.
    pub fn path_filter(&self) -> Result<PathFilter> {
        Ok(PathFilter::new(&self.tracked_extensions, &self.exclude)?
            .with_reserved_dir(STORE_DIR)
            .with_reserved_dir(&self.changelog_dir))
    }
}

/// Read-only access to the current settings.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<Settings>;
}

/// Settings from `<workspace>/.devtrack/config.toml`; a missing file means
/// defaults.
#[derive(Debug, Clone)]
pub struct FileConfig {
    path: PathBuf,
}

impl FileConfig {
    pub fn for_workspace(root: &Path) -> Self {
        Self {
            path: storage::config_path(root),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        settings.validate()?;
        let text = toml::to_string_pretty(settings)?;
        storage::write_atomic(&self.path, text.as_bytes())
    }
}

impl ConfigSource for FileConfig {
    fn load(&self) -> Result<Settings> {
        let settings = match std::fs::read_to_string(&self.path) {
            Ok(text) => toml::from_str::<Settings>(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => return Err(e.into()),
        };
        settings.validate()?;
        Ok(settings)
    }
}

/// Values fixed on the command line. They win over the configuration file
/// on every load, including hot reloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overrides {
    pub commit_frequency: Option<u64>,
    pub confirm_before_commit: Option<bool>,
}

impl Overrides {
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(minutes) = self.commit_frequency {
            settings.commit_frequency = minutes;
        }
        if let Some(confirm) = self.confirm_before_commit {
            settings.confirm_before_commit = confirm;
        }
        settings
    }
}

/// A [`ConfigSource`] with [`Overrides`] layered over every load.
#[derive(Debug, Clone)]
pub struct OverriddenConfig<C> {
    inner: C,
    overrides: Overrides,
}

impl<C: ConfigSource> OverriddenConfig<C> {
    pub fn new(inner: C, overrides: Overrides) -> Self {
        Self { inner, overrides }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: ConfigSource> ConfigSource for OverriddenConfig<C> {
    fn load(&self) -> Result<Settings> {
        let settings = self.overrides.apply(self.inner.load()?);
        settings.validate()?;
        Ok(settings)
    }
}
