//! In-memory residency cache: chunk key -> volume, dirty tracking, and
//! distance-based eviction.

use std::collections::{HashMap, HashSet};

use strata_core::{ids, BlockId, ChunkKey, CHUNK_HEIGHT, CHUNK_SIZE};
use tracing::{debug, instrument};

use crate::chunk::{get, set, ChunkRecord, Volume};
use crate::noise::NoiseSource;
use crate::terrain::height_at;

/// Soft cap on resident chunk count before eviction kicks in.
pub const SOFT_CAP: usize = 500;
/// Maximum number of chunks evicted in a single eviction pass.
pub const EVICTION_BATCH: usize = 50;

/// Owns every resident chunk's volume and the dirty/pending-rebuild
/// bookkeeping layered on top of it.
pub struct VoxelResidency {
    chunks: HashMap<ChunkKey, ChunkRecord>,
    dirty: HashSet<ChunkKey>,
    /// Shared with `TerrainSynth` so `top_y`'s ungenerated-column fallback
    /// agrees with whatever terrain would eventually be generated there.
    noise: NoiseSource,
}

impl VoxelResidency {
    /// Construct an empty residency cache seeded with `seed` (for the
    /// ungenerated-column height fallback).
    pub fn new(seed: u32) -> Self {
        Self {
            chunks: HashMap::new(),
            dirty: HashSet::new(),
            noise: NoiseSource::new(seed),
        }
    }

    /// Rebuild the fallback noise source after a reseed.
    pub fn set_seed(&mut self, seed: u32) {
        self.noise = NoiseSource::new(seed);
    }

    /// Borrow a resident volume, if present.
    pub fn get(&self, key: ChunkKey) -> Option<&Volume> {
        self.chunks.get(&key).map(|r| &r.volume)
    }

    /// Borrow a resident chunk record, if present.
    pub fn record(&self, key: ChunkKey) -> Option<&ChunkRecord> {
        self.chunks.get(&key)
    }

    /// Mutably borrow a resident chunk record, if present.
    pub fn record_mut(&mut self, key: ChunkKey) -> Option<&mut ChunkRecord> {
        self.chunks.get_mut(&key)
    }

    /// Whether `key` is currently resident.
    pub fn contains(&self, key: ChunkKey) -> bool {
        self.chunks.contains_key(&key)
    }

    /// Number of resident chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether residency is empty.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Insert (or replace) a chunk's volume. `dirty` marks it dirty
    /// immediately — a freshly generated chunk is dirty until its first
    /// save.
    pub fn put(&mut self, key: ChunkKey, volume: Volume, dirty: bool) {
        self.chunks.insert(key, ChunkRecord::new(volume, dirty));
        if dirty {
            self.dirty.insert(key);
        } else {
            self.dirty.remove(&key);
        }
    }

    /// Remove a chunk from residency. Callers are responsible for
    /// persistence ordering — this does not itself save.
    pub fn remove(&mut self, key: ChunkKey) -> Option<ChunkRecord> {
        self.dirty.remove(&key);
        self.chunks.remove(&key)
    }

    /// The current dirty set, as an iterator of keys.
    pub fn dirty_keys(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        self.dirty.iter().copied()
    }

    /// Whether `key` is currently dirty.
    pub fn is_dirty(&self, key: ChunkKey) -> bool {
        self.dirty.contains(&key)
    }

    /// Clear the dirty flag for `key` (after a successful save).
    pub fn mark_clean(&mut self, key: ChunkKey) {
        self.dirty.remove(&key);
        if let Some(record) = self.chunks.get_mut(&key) {
            record.dirty = false;
        }
    }

    /// Read the block at world coordinates. Out-of-range `y`, or a
    /// non-resident chunk, both read as `AIR`.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockId {
        if !(0..CHUNK_HEIGHT).contains(&y) {
            return ids::AIR;
        }
        let key = ChunkKey::containing(x, z);
        let Some(record) = self.chunks.get(&key) else {
            return ids::AIR;
        };
        let (lx, lz) = key.local_of(x, z);
        get(&record.volume, lx, y, lz)
    }

    /// Write the block at world coordinates, marking the owning chunk dirty.
    /// Out-of-range `y` is a no-op; writing into a non-resident chunk is
    /// also a no-op — there is nothing to mutate yet, so an edit arriving
    /// while the chunk is still in-flight is silently dropped.
    ///
    /// Returns `true` if the write was applied.
    #[instrument(level = "trace", skip(self))]
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, id: BlockId) -> bool {
        if !(0..CHUNK_HEIGHT).contains(&y) {
            return false;
        }
        let key = ChunkKey::containing(x, z);
        let Some(record) = self.chunks.get_mut(&key) else {
            return false;
        };
        let (lx, lz) = key.local_of(x, z);
        set(&mut record.volume, lx, y, lz, id);
        record.dirty = true;
        self.dirty.insert(key);
        true
    }

    /// Whether the block at world coordinates is non-air.
    pub fn has_block(&self, x: i32, y: i32, z: i32) -> bool {
        !ids::is_air(self.get_block(x, y, z))
    }

    /// Topmost non-air local `y` in column `(x, z)`, scanning down from
    /// `H-1`. Falls back to the terrain formula for ungenerated chunks so
    /// physics consulting ungenerated ground still gets a plausible height.
    pub fn top_y(&self, x: i32, z: i32) -> i32 {
        let key = ChunkKey::containing(x, z);
        let Some(record) = self.chunks.get(&key) else {
            return height_at(&self.noise, x, z);
        };
        let (lx, lz) = key.local_of(x, z);
        (0..CHUNK_HEIGHT)
            .rev()
            .find(|&y| get(&record.volume, lx, y, lz) != ids::AIR)
            .unwrap_or(0)
    }

    /// Select up to `EVICTION_BATCH` resident keys farthest from `observer`
    /// when residency exceeds `SOFT_CAP`. Returns `(dirty,
    /// clean)` key lists — dirty keys must be persisted by the caller
    /// before `remove`ing them.
    #[instrument(level = "debug", skip(self))]
    pub fn plan_eviction(&self, observer: ChunkKey) -> (Vec<ChunkKey>, Vec<ChunkKey>) {
        if self.chunks.len() <= SOFT_CAP {
            return (Vec::new(), Vec::new());
        }

        let mut by_distance: Vec<ChunkKey> = self.chunks.keys().copied().collect();
        by_distance.sort_by_key(|&k| std::cmp::Reverse(k.distance_squared(observer)));
        by_distance.truncate(EVICTION_BATCH);

        let (dirty, clean): (Vec<_>, Vec<_>) =
            by_distance.into_iter().partition(|k| self.dirty.contains(k));
        debug!(dirty = dirty.len(), clean = clean.len(), "eviction planned");
        (dirty, clean)
    }

    /// Remove every key in `evicted` from residency (after the caller has
    /// persisted any dirty ones).
    pub fn evict(&mut self, evicted: &[ChunkKey]) {
        for &key in evicted {
            self.remove(key);
        }
    }

    /// Assert that every resident volume has length `S*S*H`. Exposed for
    /// tests/debug assertions, not called on the hot path.
    pub fn all_volumes_correctly_sized(&self) -> bool {
        self.chunks
            .values()
            .all(|r| r.volume.len() == (CHUNK_SIZE * CHUNK_SIZE * CHUNK_HEIGHT) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::empty_volume;

    #[test]
    fn set_then_get_round_trips() {
        let mut residency = VoxelResidency::new(1);
        residency.put(ChunkKey::new(0, 0), empty_volume(), false);
        assert!(residency.set_block(5, 25, 5, ids::STONE));
        assert_eq!(residency.get_block(5, 25, 5), ids::STONE);
        assert!(residency.is_dirty(ChunkKey::new(0, 0)));
    }

    #[test]
    fn out_of_range_y_is_noop_and_reads_air() {
        let mut residency = VoxelResidency::new(1);
        residency.put(ChunkKey::new(0, 0), empty_volume(), false);
        assert!(!residency.set_block(5, -1, 5, ids::STONE));
        assert!(!residency.set_block(5, 1000, 5, ids::STONE));
        assert_eq!(residency.get_block(5, -1, 5), ids::AIR);
    }

    #[test]
    fn top_y_falls_back_to_terrain_formula_when_not_resident() {
        let residency = VoxelResidency::new(42);
        let noise = NoiseSource::new(42);
        assert_eq!(residency.top_y(8, 20), height_at(&noise, 8, 20));
    }

    #[test]
    fn eviction_below_soft_cap_is_a_noop() {
        let mut residency = VoxelResidency::new(1);
        for i in 0..10 {
            residency.put(ChunkKey::new(i, 0), empty_volume(), false);
        }
        let (dirty, clean) = residency.plan_eviction(ChunkKey::new(0, 0));
        assert!(dirty.is_empty() && clean.is_empty());
    }

    #[test]
    fn eviction_prefers_farthest_chunks_and_separates_dirty() {
        let mut residency = VoxelResidency::new(1);
        for i in 0..520 {
            residency.put(ChunkKey::new(i, 0), empty_volume(), false);
        }
        residency.put(ChunkKey::new(519, 0), empty_volume(), true);

        let (dirty, clean) = residency.plan_eviction(ChunkKey::new(0, 0));
        assert_eq!(dirty.len() + clean.len(), EVICTION_BATCH);
        assert!(dirty.contains(&ChunkKey::new(519, 0)));
        // Every evicted key should be farther than every retained key.
        let evicted: HashSet<_> = dirty.iter().chain(clean.iter()).copied().collect();
        let max_retained = residency
            .chunks
            .keys()
            .filter(|k| !evicted.contains(k))
            .map(|k| k.distance_squared(ChunkKey::new(0, 0)))
            .max()
            .unwrap();
        let min_evicted = evicted
            .iter()
            .map(|k| k.distance_squared(ChunkKey::new(0, 0)))
            .min()
            .unwrap();
        assert!(min_evicted >= max_retained);
    }
}
