//! File Backend
//!
//! Keeps the authoritative map in memory and persists it as a JSON snapshot,
//! one file per origin:
//!
//! ```text
//! <data_dir>/lilguy/origins/<origin>/state.json
//! ```
//!
//! Reads and writes never touch the disk; [`FileBackend::flush`] (or the task
//! started by [`FileBackend::spawn_flusher`]) writes the snapshot through a
//! temporary file and a rename so a crash never leaves a torn file behind.
//!
//! Every write bumps a generation counter. A flush records the generation it
//! persisted only after the rename succeeds, so a flush that fails or is
//! cancelled part way leaves the backend dirty.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Notify;

use super::{StateBackend, StoreError};
use crate::task::ScopedTask;

/// Snapshot path for `origin` under `data_dir`
///
/// Characters outside `[A-Za-z0-9._-]` in the origin are replaced with `_`.
#[must_use]
pub fn origin_state_path(data_dir: &Path, origin: &str) -> PathBuf {
    let sanitized: String = origin
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    data_dir
        .join("lilguy")
        .join("origins")
        .join(sanitized)
        .join("state.json")
}

/// Durable backend persisted as a JSON snapshot
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    values: RwLock<HashMap<String, String>>,
    generation: AtomicU64,
    flushed: AtomicU64,
    flush_lock: tokio::sync::Mutex<()>,
    changed: Notify,
}

impl FileBackend {
    /// Open the snapshot at `path`
    ///
    /// A missing file starts an empty store. A file that is not a JSON string
    /// map is logged and ignored, so a corrupt snapshot never blocks startup.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Read` if the file exists but cannot be read.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<HashMap<String, String>>(&content) {
                Ok(values) => {
                    tracing::info!(path = %path.display(), keys = values.len(), "Loaded state snapshot");
                    values
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Malformed state snapshot, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No state snapshot yet");
                HashMap::new()
            }
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        Ok(Self {
            path,
            values: RwLock::new(values),
            generation: AtomicU64::new(0),
            flushed: AtomicU64::new(0),
            flush_lock: tokio::sync::Mutex::new(()),
            changed: Notify::new(),
        })
    }

    /// Snapshot location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether there are writes not yet flushed
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.generation.load(Ordering::SeqCst) != self.flushed.load(Ordering::SeqCst)
    }

    /// Write the snapshot to disk if anything changed since the last flush
    ///
    /// Flushes are serialized. Dropping the returned future before it
    /// resolves leaves the backend dirty, so the next flush writes again.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem step fails; the
    /// backend stays dirty so a later flush retries.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let _guard = self.flush_lock.lock().await;
        let generation = self.generation.load(Ordering::SeqCst);
        if generation == self.flushed.load(Ordering::SeqCst) {
            return Ok(());
        }

        // Sorted keys keep the file diff-friendly
        let snapshot: BTreeMap<String, String> = self
            .values
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        self.write_snapshot(&snapshot, generation).await?;
        self.flushed.fetch_max(generation, Ordering::SeqCst);
        Ok(())
    }

    async fn write_snapshot(
        &self,
        snapshot: &BTreeMap<String, String>,
        generation: u64,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(snapshot)?;
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        // Per-generation name keeps a write left running by a cancelled flush
        // from mixing older content into a newer snapshot
        let tmp = self.path.with_extension(format!("json.{generation}.tmp"));
        tokio::fs::write(&tmp, json).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(write_err)?;

        tracing::debug!(path = %self.path.display(), keys = snapshot.len(), "State snapshot flushed");
        Ok(())
    }

    /// Flush on every change notification until the returned task is dropped
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn_flusher(self: &Arc<Self>) -> ScopedTask {
        let backend = Arc::clone(self);
        ScopedTask::spawn("state-flusher", async move {
            loop {
                backend.changed.notified().await;
                if let Err(e) = backend.flush().await {
                    tracing::error!(error = %e, "Failed to flush state snapshot");
                }
            }
        })
    }
}

impl StateBackend for FileBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .write()
            .insert(key.to_string(), value.to_string());
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_one();
    }

    fn keys(&self) -> Vec<String> {
        self.values.read().keys().cloned().collect()
    }
}
