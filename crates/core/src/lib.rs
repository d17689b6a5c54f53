#![warn(missing_docs)]
//! Shared primitives for the `strata` chunk subsystem: block ids, chunk
//! coordinates/keys, and the error taxonomy propagated by the world crate.
//!
//! This crate does no I/O and spawns no tasks; it exists so `strata-world`'s
//! components can share identical types without a circular dependency.

/// Data-driven break-time table (§9 open question: break tables vary between
/// copies of `World` in the source; the core exposes configuration only).
pub mod break_time;
/// Block id constants and the predicates the mesh extractor and terrain
/// synthesizer need (transparency-for-culling, air/bedrock checks).
pub mod ids;
/// Chunk coordinates and the canonical chunk key encoding.
pub mod key;

pub use break_time::{BreakTime, BreakTimeTable, Tool};
pub use ids::{BlockId, AIR, BEDROCK, COAL_ORE, DIRT, GRASS, IRON_ORE, LEAVES, STONE, WOOD};
pub use key::ChunkKey;

use thiserror::Error;

/// Chunk edge length in voxels (`S`).
pub const CHUNK_SIZE: i32 = 32;
/// Fixed world height in voxels (`H`).
pub const CHUNK_HEIGHT: i32 = 128;
/// Total voxel count of one chunk volume (`S*S*H`).
pub const CHUNK_VOLUME: usize = (CHUNK_SIZE * CHUNK_SIZE * CHUNK_HEIGHT) as usize;

/// Terrain height-curve constants.
pub const TERRAIN_SCALE: f64 = 50.0;
/// Amplitude of the height curve.
pub const TERRAIN_AMP: f64 = 8.0;
/// Base height of the height curve.
pub const TERRAIN_BASE: f64 = 20.0;

/// Index of voxel `(x, y, z)` within a dense chunk volume.
///
/// Panics (via the caller's bounds check) are not performed here; callers
/// are expected to validate `0 <= x,z < CHUNK_SIZE` and `0 <= y < CHUNK_HEIGHT`
/// before indexing. Out-of-range `y` is turned into a no-op at the
/// residency layer rather than at this pure helper.
pub const fn voxel_index(x: i32, y: i32, z: i32) -> usize {
    (x + y * CHUNK_SIZE + z * CHUNK_SIZE * CHUNK_HEIGHT) as usize
}

/// Error taxonomy surfaced by `ChunkCoordinator::open`.
#[derive(Debug, Error)]
pub enum OpenError {
    /// The durable store could not be opened.
    #[error("chunk store unavailable: {0}")]
    StoreUnavailable(String),
    /// A worker thread failed to spawn. Not fatal to `open` itself —
    /// the coordinator catches this and falls back to synchronous
    /// generation — but it is the error `WorkerPool::new` returns to let
    /// its caller decide.
    #[error("worker pool unavailable: {0}")]
    WorkerPoolUnavailable(String),
}

/// Error taxonomy surfaced by `ChunkCoordinator::save_dirty` and
/// `ChunkStore::save_batch`.
#[derive(Debug, Error)]
#[error("failed to persist {} chunk(s)", .keys.len())]
pub struct PersistFailed {
    /// Keys whose volumes did not commit; callers should retain them in the
    /// dirty set and retry on the next save.
    pub keys: Vec<ChunkKey>,
}

/// Error taxonomy surfaced by a `WorkerPool` task.
#[derive(Debug, Error)]
#[error("worker failed for chunk {key}: {reason}")]
pub struct WorkerFailed {
    /// The chunk key the task was generating.
    pub key: ChunkKey,
    /// Human-readable failure rationale (the worker's panic message, an I/O
    /// error, etc).
    pub reason: String,
}

/// Raised when a future tied to `WorkerPool::clear_queue` or
/// `GenerationQueue::clear` is cancelled before completion.
#[derive(Debug, Error)]
#[error("task for chunk {0} was cancelled")]
pub struct Cancelled(pub ChunkKey);
