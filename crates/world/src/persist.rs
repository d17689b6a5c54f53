//! Asynchronous durable chunk store.
//!
//! Two logical stores live side by side on disk: `chunks/<cx>,<cz>.chunk`
//! (the raw, uncompressed `S*S*H` block-id bytes, no header) and
//! `meta.json` (the single meta record: seed plus an opaque caller blob).
//! There is no grouping, checksum, or magic number — a flat file-per-key
//! layout rather than a packed region container.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_core::{ChunkKey, OpenError, PersistFailed};
use tokio::fs;
use tracing::{debug, instrument, warn};

use crate::chunk::Volume;

const CHUNKS_DIR: &str = "chunks";
const META_FILE: &str = "meta.json";

/// The durable store's meta record. `seed` is the only field the store
/// inspects; `caller_blob` is opaque and passed through untouched — callers
/// can stash whatever session state they like there.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetaRecord {
    /// World seed, if one has been persisted yet.
    pub seed: Option<u32>,
    /// Opaque bytes the embedder attaches (observer pose, inventory, ...),
    /// stored verbatim and handed back unparsed.
    #[serde(default)]
    pub caller_blob: Vec<u8>,
}

/// Asynchronous durable key -> voxel-volume map plus the single meta
/// record.
///
/// Cloning is cheap (it only copies the root path) so the generation queue
/// can hand a owned handle into a spawned load task without requiring
/// callers to wrap the store in an `Arc` themselves.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    /// Open (creating if absent) the durable store rooted at `root`.
    #[instrument(level = "info", skip(root), fields(root = %root.as_ref().display()))]
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, OpenError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(CHUNKS_DIR))
            .await
            .map_err(|e| OpenError::StoreUnavailable(e.to_string()))?;
        Ok(Self { root })
    }

    fn chunk_path(&self, key: ChunkKey) -> PathBuf {
        self.root.join(CHUNKS_DIR).join(format!("{key}.chunk"))
    }

    fn meta_path(&self) -> PathBuf {
        self.root.join(META_FILE)
    }

    /// Fetch the volume for `key`, if persisted.
    #[instrument(level = "debug", skip(self))]
    pub async fn load(&self, key: ChunkKey) -> Option<Volume> {
        match fs::read(self.chunk_path(key)).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(%key, error = %e, "chunk load failed");
                None
            }
        }
    }

    /// Atomically write every `(key, volume)` pair. Each file is written to
    /// a sibling temp path and renamed into place, so a reader never
    /// observes a partially written chunk. On partial failure, returns the
    /// keys that did not commit; the caller is expected to keep those in
    /// its dirty set.
    #[instrument(level = "debug", skip(self, chunks), fields(count = chunks.len()))]
    pub async fn save_batch(
        &self,
        chunks: &std::collections::HashMap<ChunkKey, Volume>,
    ) -> Result<(), PersistFailed> {
        let mut failed = Vec::new();
        for (&key, volume) in chunks {
            if let Err(e) = self.save_one(key, volume).await {
                warn!(%key, error = %e, "chunk save failed");
                failed.push(key);
            }
        }
        if failed.is_empty() {
            debug!(count = chunks.len(), "save_batch committed");
            Ok(())
        } else {
            Err(PersistFailed { keys: failed })
        }
    }

    async fn save_one(&self, key: ChunkKey, volume: &Volume) -> std::io::Result<()> {
        let final_path = self.chunk_path(key);
        let tmp_path = final_path.with_extension("chunk.tmp");
        fs::write(&tmp_path, volume).await?;
        fs::rename(&tmp_path, &final_path).await
    }

    /// Drop a single chunk's persisted volume, if any.
    pub async fn delete(&self, key: ChunkKey) {
        if let Err(e) = fs::remove_file(self.chunk_path(key)).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(%key, error = %e, "chunk delete failed");
            }
        }
    }

    /// Enumerate every key known to the store, used once at `open` to warm
    /// the coordinator's known-keys set.
    #[instrument(level = "info", skip(self))]
    pub async fn list_keys(&self) -> HashSet<ChunkKey> {
        let mut keys = HashSet::new();
        let mut dir = match fs::read_dir(self.root.join(CHUNKS_DIR)).await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(error = %e, "could not list chunk store");
                return keys;
            }
        };

        while let Ok(Some(entry)) = dir.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(".chunk") else {
                continue;
            };
            if let Ok(key) = stem.parse::<ChunkKey>() {
                keys.insert(key);
            }
        }
        debug!(count = keys.len(), "warmed known-keys set");
        keys
    }

    /// Load the meta record, or a default (seedless) one if none exists yet.
    pub async fn load_meta(&self) -> MetaRecord {
        match fs::read(self.meta_path()).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => MetaRecord::default(),
        }
    }

    /// Persist the meta record.
    pub async fn save_meta(&self, meta: &MetaRecord) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(meta).expect("MetaRecord always serializes");
        let tmp_path = self.meta_path().with_extension("json.tmp");
        fs::write(&tmp_path, bytes).await?;
        fs::rename(&tmp_path, self.meta_path()).await
    }

    /// Drop both logical stores (used on "new world").
    #[instrument(level = "info", skip(self))]
    pub async fn clear(&self) -> std::io::Result<()> {
        let chunks_dir = self.root.join(CHUNKS_DIR);
        fs::remove_dir_all(&chunks_dir).await.ok();
        fs::create_dir_all(&chunks_dir).await?;
        fs::remove_file(self.meta_path()).await.ok();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::empty_volume;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).await.unwrap();
        let key = ChunkKey::new(2, -3);
        let mut volume = empty_volume();
        volume[5] = 9;

        let mut batch = std::collections::HashMap::new();
        batch.insert(key, volume.clone());
        store.save_batch(&batch).await.unwrap();

        let loaded = store.load(key).await.unwrap();
        assert_eq!(loaded, volume);
    }

    #[tokio::test]
    async fn list_keys_reflects_saved_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).await.unwrap();
        let mut batch = std::collections::HashMap::new();
        batch.insert(ChunkKey::new(0, 0), empty_volume());
        batch.insert(ChunkKey::new(-1, 4), empty_volume());
        store.save_batch(&batch).await.unwrap();

        let keys = store.list_keys().await;
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&ChunkKey::new(0, 0)));
        assert!(keys.contains(&ChunkKey::new(-1, 4)));
    }

    #[tokio::test]
    async fn missing_key_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).await.unwrap();
        assert!(store.load(ChunkKey::new(99, 99)).await.is_none());
    }

    #[tokio::test]
    async fn meta_round_trips_seed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).await.unwrap();
        let meta = MetaRecord {
            seed: Some(1234567),
            caller_blob: vec![1, 2, 3],
        };
        store.save_meta(&meta).await.unwrap();
        let loaded = store.load_meta().await;
        assert_eq!(loaded.seed, Some(1234567));
        assert_eq!(loaded.caller_blob, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn clear_drops_chunks_and_meta() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).await.unwrap();
        let mut batch = std::collections::HashMap::new();
        batch.insert(ChunkKey::new(0, 0), empty_volume());
        store.save_batch(&batch).await.unwrap();
        store.save_meta(&MetaRecord { seed: Some(1), caller_blob: vec![] }).await.unwrap();

        store.clear().await.unwrap();
        assert!(store.list_keys().await.is_empty());
        assert_eq!(store.load_meta().await.seed, None);
    }
}
