//! The facade external collaborators call: sliding window around the
//! observer, load/unload, batched rebuild after edits, save-dirty.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use strata_core::{BlockId, ChunkKey, OpenError, PersistFailed, CHUNK_SIZE};
use tracing::{info, instrument, warn};

use crate::mesh::{ChunkMesh, MeshExtractor};
use crate::persist::{ChunkStore, MetaRecord};
use crate::queue::GenerationQueue;
use crate::residency::VoxelResidency;
use crate::worker::{default_worker_count, WorkerPool};

/// Runtime-tunable constants, carried as config rather than
/// hardcoded so an embedder can override them (e.g. a smaller radius on
/// mobile).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Active-set radius in chunks (Chebyshev), desktop default 3.
    pub radius: u32,
    /// Generation queue admission cap (`W_max`).
    pub w_max: usize,
    /// Worker pool thread count.
    pub worker_count: usize,
    /// Ticks between eviction/render-order-hint passes (`K`).
    pub evict_every_ticks: u32,
    /// Ticks between batched rebuild passes (`M`).
    pub rebuild_every_ticks: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            radius: 3,
            w_max: 2,
            worker_count: default_worker_count(),
            evict_every_ticks: 3,
            rebuild_every_ticks: 2,
        }
    }
}

/// A chunk mesh ready for the renderer to attach, plus the key it belongs
/// to.
pub struct MeshUpdate {
    /// The chunk this mesh was built for.
    pub key: ChunkKey,
    /// The extracted mesh.
    pub mesh: ChunkMesh,
}

/// The chunk subsystem's facade.
pub struct ChunkCoordinator {
    store: ChunkStore,
    pool: Option<Arc<WorkerPool>>,
    queue: GenerationQueue,
    residency: VoxelResidency,
    config: CoordinatorConfig,
    known_keys: HashSet<ChunkKey>,
    seed: u32,
    last_observer_chunk: Option<ChunkKey>,
    tick: u64,
    rebuild_pending: HashSet<ChunkKey>,
    pending_meshes: Vec<MeshUpdate>,
}

impl ChunkCoordinator {
    /// Open the store, warm known-keys, read (or generate) the seed, and
    /// start the worker pool.
    #[instrument(level = "info", skip(root))]
    pub async fn open(
        root: impl AsRef<std::path::Path>,
        seed: Option<u32>,
        config: CoordinatorConfig,
    ) -> Result<Self, OpenError> {
        let store = ChunkStore::open(root).await?;
        let known_keys = store.list_keys().await;
        let meta = store.load_meta().await;

        let seed = match seed.or(meta.seed) {
            Some(seed) => seed,
            None => rand::thread_rng().gen_range(1..=i32::MAX as u32),
        };
        if meta.seed != Some(seed) {
            let mut meta = meta;
            meta.seed = Some(seed);
            if let Err(e) = store.save_meta(&meta).await {
                warn!(error = %e, "failed to persist initial seed");
            }
        }

        let pool = match WorkerPool::new(config.worker_count) {
            Ok(pool) => {
                let pool = Arc::new(pool);
                info!(seed, worker_count = pool.worker_count(), known_chunks = known_keys.len(), "chunk coordinator opened");
                Some(pool)
            }
            Err(e) => {
                warn!(seed, error = %e, known_chunks = known_keys.len(), "worker pool unavailable, falling back to synchronous generation");
                None
            }
        };

        Ok(Self {
            store,
            pool,
            queue: GenerationQueue::new(config.w_max, seed),
            residency: VoxelResidency::new(seed),
            config,
            known_keys,
            seed,
            last_observer_chunk: None,
            tick: 0,
            rebuild_pending: HashSet::new(),
            pending_meshes: Vec::new(),
        })
    }

    /// Current world seed.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Reseed. Existing residency keeps its current volumes (they were
    /// generated under the prior seed); only new generations and the
    /// ungenerated-column fallback pick up the new seed. The seed travels
    /// with each generation task rather than living as shared global state.
    pub fn set_seed(&mut self, seed: u32) {
        self.seed = seed;
        self.queue.set_seed(seed);
        self.residency.set_seed(seed);
    }

    /// Per-tick update: compute the active set around `observer`, enqueue
    /// missing chunks by Manhattan priority, drain the generation queue, and
    /// — on the configured cadence or a chunk-boundary crossing — run
    /// eviction.
    #[instrument(level = "debug", skip(self))]
    pub async fn update(&mut self, observer: (f32, f32, f32)) {
        self.tick += 1;
        let observer_chunk = ChunkKey::containing(observer.0.floor() as i32, observer.2.floor() as i32);
        let crossed_boundary = self.last_observer_chunk != Some(observer_chunk);
        self.last_observer_chunk = Some(observer_chunk);

        let radius = self.config.radius as i32;
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let key = ChunkKey::new(observer_chunk.cx + dx, observer_chunk.cz + dz);
                if !self.residency.contains(key) && self.queue.is_free(key) {
                    self.queue.enqueue(key, key.manhattan(observer_chunk));
                }
            }
        }

        self.drain_queue().await;

        let should_evict =
            crossed_boundary || self.tick.is_multiple_of(self.config.evict_every_ticks as u64);
        if should_evict {
            self.evict(observer_chunk).await;
        }
        if self.tick.is_multiple_of(self.config.rebuild_every_ticks as u64) {
            self.rebuild_dirty_meshes();
        }
    }

    async fn drain_queue(&mut self) {
        let mut newly_resident = Vec::new();
        if let Some(pool) = self.pool.clone() {
            let store = &self.store;
            let known_keys = &self.known_keys;
            let residency = &mut self.residency;
            let rebuild_pending = &mut self.rebuild_pending;
            self.queue
                .process(store, &pool, known_keys, |result| {
                    residency.put(result.key, result.volume, result.freshly_generated);
                    rebuild_pending.insert(result.key);
                    for neighbour in result.key.horizontal_neighbours() {
                        if residency.contains(neighbour) {
                            rebuild_pending.insert(neighbour);
                        }
                    }
                    newly_resident.push(result.key);
                })
                .await;
        } else {
            let residency = &mut self.residency;
            let rebuild_pending = &mut self.rebuild_pending;
            self.queue.process_sync(|result| {
                residency.put(result.key, result.volume, result.freshly_generated);
                rebuild_pending.insert(result.key);
                for neighbour in result.key.horizontal_neighbours() {
                    if residency.contains(neighbour) {
                        rebuild_pending.insert(neighbour);
                    }
                }
                newly_resident.push(result.key);
            });
        }
        for key in newly_resident {
            self.known_keys.insert(key);
        }
    }

    async fn evict(&mut self, observer_chunk: ChunkKey) {
        let (dirty, clean) = self.residency.plan_eviction(observer_chunk);
        if dirty.is_empty() && clean.is_empty() {
            return;
        }

        let mut evictable_dirty = dirty.clone();
        if !dirty.is_empty() {
            let mut batch = HashMap::new();
            for &key in &dirty {
                if let Some(volume) = self.residency.get(key) {
                    batch.insert(key, volume.clone());
                }
            }
            // Eviction never removes a dirty chunk without persisting it
            // first: keys that fail to save stay
            // resident and dirty, retried on the next save.
            if let Err(failed) = self.store.save_batch(&batch).await {
                warn!(keys = ?failed.keys, "eviction save failed, retaining dirty chunks in residency");
                let failed_set: HashSet<_> = failed.keys.into_iter().collect();
                evictable_dirty.retain(|k| !failed_set.contains(k));
            }
            for &key in &evictable_dirty {
                self.residency.mark_clean(key);
            }
        }

        self.residency.evict(&evictable_dirty);
        self.residency.evict(&clean);
    }

    fn rebuild_dirty_meshes(&mut self) {
        if self.rebuild_pending.is_empty() {
            return;
        }
        let keys: Vec<_> = self.rebuild_pending.drain().collect();
        for key in keys {
            let Some(volume) = self.residency.get(key) else {
                continue;
            };
            let residency = &self.residency;
            let mesh = MeshExtractor::build(
                volume,
                key.world_origin(),
                |x, y, z| residency.get_block(x, y, z),
                |x, z| residency.contains(ChunkKey::containing(x, z)),
            );
            if let Some(record) = self.residency.record_mut(key) {
                record.mesh_attached = true;
            }
            self.pending_meshes.push(MeshUpdate { key, mesh });
        }
    }

    /// Drain the mesh updates produced by the most recent `update` call. The
    /// embedder is expected to attach each to its renderer scene and clear
    /// this list every tick.
    pub fn drain_mesh_updates(&mut self) -> Vec<MeshUpdate> {
        std::mem::take(&mut self.pending_meshes)
    }

    /// Block the caller until `(cx, cz)` is resident, used at observer
    /// spawn.
    pub async fn ensure_loaded(&mut self, cx: i32, cz: i32) {
        let key = ChunkKey::new(cx, cz);
        if self.residency.contains(key) {
            return;
        }
        if self.queue.is_free(key) {
            self.queue.enqueue(key, 0);
        }
        loop {
            self.drain_queue().await;
            if self.residency.contains(key) {
                self.rebuild_dirty_meshes();
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    /// Read a block (delegates to `VoxelResidency`).
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockId {
        self.residency.get_block(x, y, z)
    }

    /// Whether a block is non-air (delegates to `VoxelResidency`).
    pub fn has_block(&self, x: i32, y: i32, z: i32) -> bool {
        self.residency.has_block(x, y, z)
    }

    /// Topmost non-air `y` in column `(x, z)` (delegates to
    /// `VoxelResidency`, including its ungenerated-column fallback).
    pub fn top_y(&self, x: i32, z: i32) -> i32 {
        self.residency.top_y(x, z)
    }

    /// Write a block, marking the owning chunk (and, if the edit is on a
    /// chunk boundary, the touched neighbour) for batched rebuild.
    #[instrument(level = "debug", skip(self))]
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, t: BlockId) {
        if !self.residency.set_block(x, y, z, t) {
            return;
        }
        let key = ChunkKey::containing(x, z);
        self.rebuild_pending.insert(key);

        let (lx, lz) = key.local_of(x, z);
        if lx == 0 {
            self.rebuild_pending.insert(ChunkKey::new(key.cx - 1, key.cz));
        }
        if lx == CHUNK_SIZE - 1 {
            self.rebuild_pending.insert(ChunkKey::new(key.cx + 1, key.cz));
        }
        if lz == 0 {
            self.rebuild_pending.insert(ChunkKey::new(key.cx, key.cz - 1));
        }
        if lz == CHUNK_SIZE - 1 {
            self.rebuild_pending.insert(ChunkKey::new(key.cx, key.cz + 1));
        }
    }

    /// Snapshot every dirty volume and persist it; clears the dirty set on
    /// full success and retains unsaved keys on partial failure.
    #[instrument(level = "debug", skip(self, caller_blob))]
    pub async fn save_dirty(&mut self, caller_blob: Vec<u8>) -> Result<(), PersistFailed> {
        let dirty_keys: Vec<_> = self.residency.dirty_keys().collect();
        let mut batch = HashMap::with_capacity(dirty_keys.len());
        for key in &dirty_keys {
            if let Some(volume) = self.residency.get(*key) {
                batch.insert(*key, volume.clone());
            }
        }

        let result = self.store.save_batch(&batch).await;
        match &result {
            Ok(()) => {
                for key in &dirty_keys {
                    self.residency.mark_clean(*key);
                }
            }
            Err(failed) => {
                let failed_set: HashSet<_> = failed.keys.iter().copied().collect();
                for key in &dirty_keys {
                    if !failed_set.contains(key) {
                        self.residency.mark_clean(*key);
                    }
                }
            }
        }

        let mut meta = self.store.load_meta().await;
        meta.seed = Some(self.seed);
        meta.caller_blob = caller_blob;
        if let Err(e) = self.store.save_meta(&meta).await {
            warn!(error = %e, "failed to persist meta record alongside dirty chunks");
        }

        result
    }

    /// Drop all in-memory state, clear the durable store, and pick a new
    /// seed.
    #[instrument(level = "info", skip(self))]
    pub async fn clear(&mut self) -> std::io::Result<()> {
        self.store.clear().await?;
        self.known_keys.clear();
        self.queue.clear_queue();
        self.rebuild_pending.clear();
        self.pending_meshes.clear();
        self.residency = VoxelResidency::new(self.seed);
        self.set_seed(rand::thread_rng().gen_range(1..=i32::MAX as u32));
        Ok(())
    }
}
