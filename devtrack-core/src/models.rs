use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        }
    }

    /// Net kind after an event of kind `next` lands on a record of kind `self`.
    pub fn merge(self, next: ChangeKind) -> ChangeKind {
        match (self, next) {
            (ChangeKind::Deleted, ChangeKind::Added) => ChangeKind::Added,
            (ChangeKind::Added, ChangeKind::Modified) => ChangeKind::Added,
            (_, next) => next,
        }
    }
}

/// One file's net pending modification since the last flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub detected_at: DateTime<Utc>,
}

impl Change {
    pub fn new(kind: ChangeKind, path: PathBuf) -> Self {
        Self {
            path,
            kind,
            detected_at: Utc::now(),
        }
    }

    pub fn detected_at(mut self, at: DateTime<Utc>) -> Self {
        self.detected_at = at;
        self
    }
}

/// Last observed full content of a tracked file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub content: String,
    pub initialized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMeta {
    pub id: String,
    pub name: String,
    pub created: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl ProjectMeta {
    pub fn new(id: String, name: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            created: now,
            last_accessed: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub hash: String,
    pub timestamp: DateTime<Utc>,
}

impl FileFingerprint {
    pub fn of(content: &str) -> Self {
        Self {
            hash: hash_content(content.as_bytes()),
            timestamp: Utc::now(),
        }
    }
}

/// Content hashes of every file reported by the last successful flush.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerState {
    #[serde(default)]
    pub last_known_state: BTreeMap<String, FileFingerprint>,
}

impl TrackerState {
    pub fn apply(&mut self, updates: &BTreeMap<String, Option<FileFingerprint>>) {
        for (path, fingerprint) in updates {
            match fingerprint {
                Some(fp) => {
                    self.last_known_state.insert(path.clone(), fp.clone());
                }
                None => {
                    self.last_known_state.remove(path);
                }
            }
        }
    }
}

pub fn hash_content(content: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}
