//! Load-on-miss dialogue cache backed by the binary codec.
//!
//! Dialogues are keyed by dotted name; `a.b.c` maps to `<base>/a/b/c.dlg`.
//! Loaded trees are shared as `Arc<Dialogue>` across every session that
//! references them. Duplicate concurrent loads of the same uncached name
//! join a single read instead of hitting the filesystem twice.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};

use dialogues_domain::Dialogue;

use crate::infrastructure::binary::{
    BinaryIo, DeserializingError, DialogueAdapter, SerializingError,
};

/// File extension for persisted dialogues.
const EXTENSION: &str = "dlg";

#[derive(Debug, Error)]
pub enum StoreError {
    /// Missing file or a resolved-path case mismatch; recoverable, reported
    /// verbatim to the invoking user.
    #[error("Missing binary file for dialogue '{0}'")]
    NotFound(String),

    #[error("Invalid dialogue name '{0}'")]
    InvalidName(String),

    #[error("Could not decode dialogue '{name}': {source}")]
    Deserializing {
        name: String,
        #[source]
        source: DeserializingError,
    },

    #[error("Could not save dialogue '{name}': {source}")]
    Serializing {
        name: String,
        #[source]
        source: SerializingError,
    },

    #[error("I/O failure for dialogue '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

type LoadCell = Arc<OnceCell<Arc<Dialogue>>>;

/// Process-wide dialogue cache.
pub struct DialogueStore {
    base_dir: PathBuf,
    io: BinaryIo,
    dialogues: Mutex<HashMap<String, LoadCell>>,
}

impl DialogueStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let mut io = BinaryIo::new();
        io.register::<Dialogue>(Arc::new(DialogueAdapter));
        Self {
            base_dir: base_dir.into(),
            io,
            dialogues: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached dialogue, loading it from disk on a miss. Repeat
    /// calls for a cached name return the same instance without re-reading
    /// the file; concurrent calls for an uncached name share one load.
    pub async fn get_or_load(&self, name: &str) -> Result<Arc<Dialogue>, StoreError> {
        let cell = self.cell_for(name).await;
        cell.get_or_try_init(|| self.load(name)).await.cloned()
    }

    /// Returns the cached dialogue without touching the filesystem.
    pub async fn get_if_loaded(&self, name: &str) -> Option<Arc<Dialogue>> {
        let guard = self.dialogues.lock().await;
        guard.get(name).and_then(|cell| cell.get().cloned())
    }

    pub async fn is_loaded(&self, name: &str) -> bool {
        self.get_if_loaded(name).await.is_some()
    }

    /// Puts an already-built dialogue (e.g. fresh from the importer) into the
    /// cache, replacing any previous entry under its name.
    pub async fn insert(&self, dialogue: Arc<Dialogue>) {
        let cell = OnceCell::new();
        // A fresh cell cannot already be set.
        let _ = cell.set(dialogue.clone());
        let mut guard = self.dialogues.lock().await;
        guard.insert(dialogue.name().to_string(), Arc::new(cell));
    }

    /// Persists a dialogue to its binary file, creating parent directories
    /// as needed. Does not touch the cache.
    pub async fn save(&self, dialogue: &Dialogue) -> Result<(), StoreError> {
        let name = dialogue.name();
        let path = self.binary_path(name)?;

        let bytes = self
            .io
            .encode(dialogue)
            .map_err(|source| StoreError::Serializing {
                name: name.to_string(),
                source,
            })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    name: name.to_string(),
                    source,
                })?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| StoreError::Serializing {
                name: name.to_string(),
                source: SerializingError::io(format!("could not write {}", path.display()), source),
            })?;

        tracing::info!(dialogue = %name, path = %path.display(), "saved dialogue");
        Ok(())
    }

    /// Evicts one dialogue, returning the evicted instance if it was loaded.
    pub async fn unload(&self, name: &str) -> Option<Arc<Dialogue>> {
        let mut guard = self.dialogues.lock().await;
        guard.remove(name).and_then(|cell| cell.get().cloned())
    }

    /// Evicts everything, returning how many loaded dialogues were dropped.
    pub async fn unload_all(&self) -> usize {
        let mut guard = self.dialogues.lock().await;
        let count = guard.values().filter(|cell| cell.initialized()).count();
        guard.clear();
        count
    }

    /// Names of all currently loaded dialogues, sorted.
    pub async fn loaded_names(&self) -> Vec<String> {
        let guard = self.dialogues.lock().await;
        let mut names: Vec<String> = guard
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    async fn cell_for(&self, name: &str) -> LoadCell {
        let mut guard = self.dialogues.lock().await;
        guard
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    async fn load(&self, name: &str) -> Result<Arc<Dialogue>, StoreError> {
        let path = self.binary_path(name)?;

        let metadata = tokio::fs::metadata(&path).await;
        if !metadata.map(|m| m.is_file()).unwrap_or(false) {
            return Err(StoreError::NotFound(name.to_string()));
        }

        // File names on some filesystems are case-insensitive while the
        // cache is case-sensitive: "test" and "TEST" would resolve to the
        // same file but occupy two cache slots. Enforce an exact case match
        // between the requested name and the on-disk path.
        let canonical = tokio::fs::canonicalize(&path)
            .await
            .map_err(|source| StoreError::Io {
                name: name.to_string(),
                source,
            })?;
        if !canonical.ends_with(self.relative_path(name)) {
            return Err(StoreError::NotFound(name.to_string()));
        }

        let raw = tokio::fs::read(&path)
            .await
            .map_err(|source| StoreError::Io {
                name: name.to_string(),
                source,
            })?;

        let dialogue: Dialogue = self
            .io
            .decode_with(Bytes::from(raw), |ctx| {
                ctx.set_data("name", name.to_string());
            })
            .map_err(|source| StoreError::Deserializing {
                name: name.to_string(),
                source,
            })?;

        tracing::info!(dialogue = %name, path = %path.display(), "loaded dialogue");
        Ok(Arc::new(dialogue))
    }

    fn relative_path(&self, name: &str) -> PathBuf {
        let mut path: PathBuf = name.split('.').collect();
        path.set_extension(EXTENSION);
        path
    }

    /// Resolves a dotted dialogue name to its binary file path. Names that
    /// would escape the base directory or contain path syntax are invalid.
    fn binary_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        if name.is_empty() {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        for segment in name.split('.') {
            if segment.is_empty()
                || segment.contains(['/', '\\'])
                || segment.contains(std::path::MAIN_SEPARATOR)
            {
                return Err(StoreError::InvalidName(name.to_string()));
            }
        }
        Ok(self.base_dir.join(self.relative_path(name)))
    }
}

impl std::fmt::Debug for DialogueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogueStore")
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}
