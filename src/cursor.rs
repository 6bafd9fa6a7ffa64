// src/cursor.rs
// Per-source forwarding cursors, persisted as one JSON file per source kind
// under the state directory. Loading a missing cursor yields the initial
// value; writes go through a temp file and rename so a crash never leaves a
// half-written cursor behind.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::StorageError;

/// A persisted per-source cursor. `Default` is the initial all-null value
/// used on the first run ever.
pub trait CursorState:
    Serialize + DeserializeOwned + Default + Send + Sync + 'static
{
    /// Stable storage key; also the file stem.
    const KIND: &'static str;
}

struct Slot {
    path: PathBuf,
    lock: Mutex<()>,
}

pub struct CursorStore {
    dir: PathBuf,
    slots: Mutex<HashMap<&'static str, Arc<Slot>>>,
    closed: AtomicBool,
}

impl CursorStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            slots: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// One slot per source kind, created under the map lock so concurrent
    /// runs for the same kind never end up with two handles.
    async fn slot(&self, kind: &'static str) -> Result<Arc<Slot>, StorageError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Closed);
        }

        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get(kind) {
            return Ok(Arc::clone(slot));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StorageError::Write { kind, source })?;

        let slot = Arc::new(Slot {
            path: self.dir.join(format!("{kind}.json")),
            lock: Mutex::new(()),
        });
        slots.insert(kind, Arc::clone(&slot));
        Ok(slot)
    }

    /// Load the cursor for `C`, or its initial value if none was persisted
    /// yet. "Not found" is never an error.
    pub async fn load<C: CursorState>(&self) -> Result<C, StorageError> {
        let slot = self.slot(C::KIND).await?;
        let _guard = slot.lock.lock().await;

        match tokio::fs::read(&slot.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| {
                StorageError::Decode {
                    kind: C::KIND,
                    source,
                }
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(C::default()),
            Err(source) => Err(StorageError::Read {
                kind: C::KIND,
                source,
            }),
        }
    }

    /// Persist the cursor atomically.
    pub async fn store<C: CursorState>(&self, cursor: &C) -> Result<(), StorageError> {
        let slot = self.slot(C::KIND).await?;
        let _guard = slot.lock.lock().await;

        let bytes = serde_json::to_vec_pretty(cursor).map_err(|source| {
            StorageError::Encode {
                kind: C::KIND,
                source,
            }
        })?;

        let tmp_path = self.dir.join(format!(".{}.json.tmp", C::KIND));
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|source| StorageError::Write {
                kind: C::KIND,
                source,
            })?;
        tokio::fs::rename(&tmp_path, &slot.path)
            .await
            .map_err(|source| StorageError::Write {
                kind: C::KIND,
                source,
            })
    }

    /// Release all slots. Safe to call more than once; later loads and
    /// stores fail with `StorageError::Closed`.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.slots.lock().await.clear();
    }
}
