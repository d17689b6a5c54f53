#![warn(missing_docs)]
//! The `strata` chunk subsystem: deterministic terrain synthesis, background
//! generation, a residency cache with prioritized loading and distance-based
//! eviction, occlusion-aware mesh extraction, and a dirty-tracked
//! persistent store, wired together behind `ChunkCoordinator`.

mod chunk;
mod coordinator;
mod generate;
mod mesh;
mod noise;
mod persist;
mod queue;
mod residency;
mod rng;
mod structures;
mod terrain;
mod trees;
mod worker;

pub use chunk::{empty_volume, ChunkRecord, Volume};
pub use coordinator::{ChunkCoordinator, CoordinatorConfig, MeshUpdate};
pub use generate::generate_chunk;
pub use mesh::{ChunkMesh, EmittedFaces, FaceDir, MeshExtractor, Vertex};
pub use noise::NoiseSource;
pub use persist::{ChunkStore, MetaRecord};
pub use queue::{ChunkResult, GenerationQueue};
pub use residency::{VoxelResidency, EVICTION_BATCH, SOFT_CAP};
pub use structures::generate_ores;
pub use terrain::{fill_terrain, height_at};
pub use trees::generate_trees;
pub use worker::{default_worker_count, SharedWorkerPool, WorkerPool};

pub use strata_core::{
    ids, BlockId, ChunkKey, OpenError, PersistFailed, WorkerFailed, CHUNK_HEIGHT, CHUNK_SIZE,
    CHUNK_VOLUME,
};
