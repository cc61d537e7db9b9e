use crate::cipher::ContentCipher;
use crate::error::{Error, Result};
use crate::models::CacheEntry;
use crate::source::ContentSource;
use crate::storage::{CacheDocument, ProjectStore};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Last-known content of each tracked file, used as the "before" side of
/// diffs. Every mutation is written through to the project store.
pub struct ContentCache {
    entries: BTreeMap<PathBuf, CacheEntry>,
    store: ProjectStore,
    cipher: ContentCipher,
    source: Arc<dyn ContentSource>,
}

impl ContentCache {
    pub fn new(store: ProjectStore, cipher: ContentCipher, source: Arc<dyn ContentSource>) -> Self {
        Self {
            entries: BTreeMap::new(),
            store,
            cipher,
            source,
        }
    }

    /// Replaces the in-memory state with the persisted cache. Entries that
    /// fail to decrypt are dropped; an unreadable document leaves the cache
    /// empty. Returns the number of entries loaded.
    pub fn load(&mut self) -> usize {
        let document = match self.store.load_cache_document() {
            Ok(document) => document,
            Err(e) => {
                warn!("Starting with an empty cache: {}", Error::CacheIo(e.to_string()));
                CacheDocument::default()
            }
        };

        self.entries.clear();
        for (key, encrypted) in &document.cache {
            match self.cipher.decrypt(encrypted) {
                Ok(content) => {
                    let path = PathBuf::from(key);
                    self.entries.insert(
                        path.clone(),
                        CacheEntry {
                            path,
                            content,
                            initialized: document.initialized.contains(key),
                        },
                    );
                }
                Err(e) => warn!("Dropping cache entry for {}: {}", key, e),
            }
        }

        info!("Loaded {} cached file(s)", self.entries.len());
        self.entries.len()
    }

    /// Writes the whole cache to the project store. Failures are logged and
    /// leave the in-memory cache authoritative.
    pub fn persist(&self) -> bool {
        match self.try_persist() {
            Ok(()) => true,
            Err(e) => {
                warn!("Cache persist failed: {}", Error::CacheIo(e.to_string()));
                false
            }
        }
    }

    fn try_persist(&self) -> Result<()> {
        let mut document = CacheDocument::default();
        for (path, entry) in &self.entries {
            let key = path_key(path).to_string();
            document.cache.insert(key.clone(), self.cipher.encrypt(&entry.content)?);
            if entry.initialized {
                document.initialized.insert(key);
            }
        }
        self.store.save_cache_document(&document)
    }

    /// Reads the current on-disk content of `path` and makes it the baseline.
    pub fn capture(&mut self, path: &Path) -> Result<()> {
        let content = self.source.read(path).map_err(|source| Error::FileAccess {
            path: path.display().to_string(),
            source,
        })?;
        self.store_content(path, content);
        Ok(())
    }

    /// Makes already-read `content` the baseline for `path`.
    pub fn store_content(&mut self, path: &Path, content: String) {
        self.entries.insert(
            path.to_path_buf(),
            CacheEntry {
                path: path.to_path_buf(),
                content,
                initialized: true,
            },
        );
        self.persist();
    }

    /// Applies a batch of baseline moves (`None` forgets the path) and
    /// persists once.
    pub fn apply_baselines(&mut self, updates: &BTreeMap<PathBuf, Option<String>>) {
        if updates.is_empty() {
            return;
        }
        for (path, content) in updates {
            match content {
                Some(content) => {
                    self.entries.insert(
                        path.clone(),
                        CacheEntry {
                            path: path.clone(),
                            content: content.clone(),
                            initialized: true,
                        },
                    );
                }
                None => {
                    self.entries.remove(path);
                }
            }
        }
        self.persist();
    }

    pub fn get(&self, path: &Path) -> Option<&str> {
        self.entries.get(path).map(|e| e.content.as_str())
    }

    pub fn entry(&self, path: &Path) -> Option<&CacheEntry> {
        self.entries.get(path)
    }

    pub fn is_initialized(&self, path: &Path) -> bool {
        self.entries.get(path).map(|e| e.initialized).unwrap_or(false)
    }

    pub fn forget(&mut self, path: &Path) {
        if self.entries.remove(path).is_some() {
            self.persist();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn source(&self) -> &Arc<dyn ContentSource> {
        &self.source
    }
}

/// Persisted keys always use `/` separators.
fn path_key(path: &Path) -> std::borrow::Cow<'_, str> {
    let key = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        key
    } else {
        std::borrow::Cow::Owned(key.replace(std::path::MAIN_SEPARATOR, "/"))
    }
}
