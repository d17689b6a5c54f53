//! Deterministic per-chunk RNG derivation.
//!
//! Ore veins and tree placement both need randomness, but generation must
//! stay deterministic per seed: a global, unseeded RNG would make decoration
//! depend on call order and thread scheduling. Instead each chunk derives
//! its own `StdRng` from the world seed and its coordinates, so determinism
//! covers decoration the same way it already covers terrain height.

use rand::{rngs::StdRng, SeedableRng};

/// Derive a chunk-scoped RNG seed from the world seed and chunk coordinates
/// via `blake3`.
pub fn chunk_rng(seed: u32, cx: i32, cz: i32) -> StdRng {
    let mut input = [0u8; 12];
    input[0..4].copy_from_slice(&seed.to_le_bytes());
    input[4..8].copy_from_slice(&cx.to_le_bytes());
    input[8..12].copy_from_slice(&cz.to_le_bytes());
    let hash = blake3::hash(&input);
    let bytes: [u8; 32] = *hash.as_bytes();
    let mut seed64 = [0u8; 8];
    seed64.copy_from_slice(&bytes[0..8]);
    StdRng::seed_from_u64(u64::from_le_bytes(seed64))
}
