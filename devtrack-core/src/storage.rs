use crate::error::{Error, Result};
use crate::models::{ProjectMeta, TrackerState};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const STORE_DIR: &str = ".devtrack";
pub const CONFIG_FILE: &str = "config.toml";

const PROJECT_FILE: &str = "project.json";
const CACHE_FILE: &str = "cache.json";
const TRACKER_STATE_FILE: &str = "tracker-state.json";

/// Persisted form of the content cache: encrypted contents keyed by
/// workspace-relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheDocument {
    #[serde(default)]
    pub cache: BTreeMap<String, String>,
    #[serde(default)]
    pub initialized: BTreeSet<String>,
}

/// Project-scoped on-disk state under `<workspace>/.devtrack/projects/<id>/`.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
    dir: PathBuf,
    meta: ProjectMeta,
}

impl ProjectStore {
    /// Opens (creating if needed) the store for the project detected in
    /// `workspace_root`.
    pub fn open<P: AsRef<Path>>(workspace_root: P) -> Result<Self> {
        let root = workspace_root.as_ref().to_path_buf();
        let name = detect_project_name(&root);
        Self::open_named(root, &name)
    }

    pub fn open_named(root: PathBuf, name: &str) -> Result<Self> {
        let id = sanitize_project_id(name);
        if id.is_empty() {
            return Err(Error::Config(format!("cannot derive a project id from {:?}", name)));
        }

        let dir = root.join(STORE_DIR).join("projects").join(&id);
        std::fs::create_dir_all(dir.join("cache"))?;

        let meta_path = dir.join(PROJECT_FILE);
        let mut meta = match read_json::<ProjectMeta>(&meta_path) {
            Ok(Some(meta)) => meta,
            Ok(None) => {
                info!("Created project store {:?}", dir);
                ProjectMeta::new(id.clone(), name.to_string())
            }
            Err(e) => {
                warn!("Recreating unreadable project metadata: {}", e);
                ProjectMeta::new(id.clone(), name.to_string())
            }
        };
        meta.touch();
        write_json(&meta_path, &meta)?;

        Ok(Self { root, dir, meta })
    }

    /// Opens the store of the project detected in `workspace_root` without
    /// creating or touching anything on disk.
    pub fn open_existing<P: AsRef<Path>>(workspace_root: P) -> Result<Self> {
        let root = workspace_root.as_ref().to_path_buf();
        let name = detect_project_name(&root);
        let id = sanitize_project_id(&name);
        let dir = root.join(STORE_DIR).join("projects").join(&id);

        match read_json::<ProjectMeta>(&dir.join(PROJECT_FILE))? {
            Some(meta) => Ok(Self { root, dir, meta }),
            None => Err(Error::Config(format!(
                "no devtrack state for project {:?}; run 'devtrack init' first",
                name
            ))),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta(&self) -> &ProjectMeta {
        &self.meta
    }

    pub fn config_path(&self) -> PathBuf {
        config_path(&self.root)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.dir.join("cache").join(CACHE_FILE)
    }

    pub fn tracker_state_path(&self) -> PathBuf {
        self.dir.join(TRACKER_STATE_FILE)
    }

    pub fn load_cache_document(&self) -> Result<CacheDocument> {
        Ok(read_json(&self.cache_path())?.unwrap_or_default())
    }

    pub fn save_cache_document(&self, document: &CacheDocument) -> Result<()> {
        write_json(&self.cache_path(), document)
    }

    pub fn load_tracker_state(&self) -> Result<TrackerState> {
        Ok(read_json(&self.tracker_state_path())?.unwrap_or_default())
    }

    pub fn save_tracker_state(&self, state: &TrackerState) -> Result<()> {
        write_json(&self.tracker_state_path(), state)
    }
}

pub fn config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(STORE_DIR).join(CONFIG_FILE)
}

/// Name from `package.json`, then `Cargo.toml`, then the folder name.
pub fn detect_project_name(root: &Path) -> String {
    if let Some(name) = package_json_name(root) {
        return name;
    }
    if let Some(name) = cargo_package_name(root) {
        return name;
    }
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string())
}

fn package_json_name(root: &Path) -> Option<String> {
    let text = std::fs::read_to_string(root.join("package.json")).ok()?;
    let value: serde_json::Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => {
            warn!("Could not read package.json: {}", e);
            return None;
        }
    };
    value.get("name")?.as_str().map(str::to_string)
}

fn cargo_package_name(root: &Path) -> Option<String> {
    let text = std::fs::read_to_string(root.join("Cargo.toml")).ok()?;
    let value: toml::Value = toml::from_str(&text).ok()?;
    value
        .get("package")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}

pub fn sanitize_project_id(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Writes through a sibling temp file so readers never see a torn document.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    write_atomic(path, text.as_bytes())
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    debug!("Wrote {:?}", path);
    Ok(())
}
