//! Chunk coordinates and the canonical chunk key.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::CHUNK_SIZE;

/// Signed chunk coordinate pair `(cx, cz)`.
///
/// Identity is value-equality; `ChunkKey` also provides a canonical textual
/// encoding (`"cx,cz"`, no padding) used as the persistence key and a packed
/// 64-bit encoding for compact in-memory sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    /// Chunk coordinate along X.
    pub cx: i32,
    /// Chunk coordinate along Z.
    pub cz: i32,
}

impl ChunkKey {
    /// Construct a key from chunk coordinates.
    pub const fn new(cx: i32, cz: i32) -> Self {
        Self { cx, cz }
    }

    /// The chunk containing world coordinate `(x, z)`.
    pub fn containing(x: i32, z: i32) -> Self {
        Self::new(x.div_euclid(CHUNK_SIZE), z.div_euclid(CHUNK_SIZE))
    }

    /// World-space offset of this chunk's local origin.
    pub const fn world_origin(self) -> (i32, i32) {
        (self.cx * CHUNK_SIZE, self.cz * CHUNK_SIZE)
    }

    /// Local coordinates of world `(x, z)` within this chunk, assuming
    /// `ChunkKey::containing(x, z) == self`.
    pub const fn local_of(self, x: i32, z: i32) -> (i32, i32) {
        (x - self.cx * CHUNK_SIZE, z - self.cz * CHUNK_SIZE)
    }

    /// Manhattan distance between two chunk keys, used as generation
    /// priority.
    pub fn manhattan(self, other: Self) -> u32 {
        self.cx.abs_diff(other.cx) + self.cz.abs_diff(other.cz)
    }

    /// Squared Euclidean chunk-distance, used for eviction ordering.
    pub fn distance_squared(self, other: Self) -> i64 {
        let dx = (self.cx - other.cx) as i64;
        let dz = (self.cz - other.cz) as i64;
        dx * dx + dz * dz
    }

    /// Chebyshev distance, used for the observer's active-set radius.
    pub fn chebyshev(self, other: Self) -> u32 {
        self.cx.abs_diff(other.cx).max(self.cz.abs_diff(other.cz))
    }

    /// The four horizontal neighbours, in `+X, -X, +Z, -Z` order.
    pub const fn horizontal_neighbours(self) -> [Self; 4] {
        [
            Self::new(self.cx + 1, self.cz),
            Self::new(self.cx - 1, self.cz),
            Self::new(self.cx, self.cz + 1),
            Self::new(self.cx, self.cz - 1),
        ]
    }

    /// Packed 64-bit encoding (`cx` in the high bits, `cz` in the low bits),
    /// useful as a compact hash map key or an RNG seed ingredient.
    pub const fn packed(self) -> i64 {
        ((self.cx as i64) << 32) | (self.cz as u32 as i64)
    }
}

impl fmt::Display for ChunkKey {
    /// Canonical textual encoding used by the persistence layer: decimal,
    /// unpadded, comma-separated.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.cx, self.cz)
    }
}

/// Errors parsing a canonical chunk key string back into a `ChunkKey`.
#[derive(Debug, thiserror::Error)]
#[error("invalid chunk key {0:?}")]
pub struct ParseChunkKeyError(pub String);

impl std::str::FromStr for ChunkKey {
    type Err = ParseChunkKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (cx, cz) = s
            .split_once(',')
            .ok_or_else(|| ParseChunkKeyError(s.to_string()))?;
        let cx = cx
            .parse()
            .map_err(|_| ParseChunkKeyError(s.to_string()))?;
        let cz = cz
            .parse()
            .map_err(|_| ParseChunkKeyError(s.to_string()))?;
        Ok(Self::new(cx, cz))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn display_and_parse_round_trip() {
        for (cx, cz) in [(0, 0), (-1, 0), (12, -7), (-100, -100)] {
            let key = ChunkKey::new(cx, cz);
            let text = key.to_string();
            assert_eq!(ChunkKey::from_str(&text).unwrap(), key);
        }
    }

    #[test]
    fn containing_matches_manual_div_euclid() {
        assert_eq!(ChunkKey::containing(8, 20), ChunkKey::new(0, 0));
        assert_eq!(ChunkKey::containing(-1, 0), ChunkKey::new(-1, 0));
        assert_eq!(ChunkKey::containing(-33, 0), ChunkKey::new(-2, 0));
    }

    #[test]
    fn manhattan_is_symmetric_priority() {
        let a = ChunkKey::new(0, 0);
        let b = ChunkKey::new(3, -4);
        assert_eq!(a.manhattan(b), 7);
        assert_eq!(b.manhattan(a), 7);
    }

    #[test]
    fn packed_round_trips_through_hashmap_keys() {
        use std::collections::HashSet;
        let mut seen = HashSet::new();
        for cx in -2..=2 {
            for cz in -2..=2 {
                assert!(seen.insert(ChunkKey::new(cx, cz).packed()));
            }
        }
    }
}
