//! Pure terrain synthesis: chunk coordinates -> initial voxel volume.

use strata_core::{ids, BlockId, CHUNK_HEIGHT, CHUNK_SIZE, TERRAIN_AMP, TERRAIN_BASE, TERRAIN_SCALE};

use crate::chunk::{set, Volume};
use crate::noise::NoiseSource;

/// Height curve for world column `(world_x, world_z)`, clamped to
/// `[1, H-1]`. Shared with `top_y`'s ungenerated-column fallback so both
/// paths agree on "plausible ground" for a chunk that hasn't been
/// generated yet.
pub fn height_at(noise: &NoiseSource, world_x: i32, world_z: i32) -> i32 {
    let sample = noise.sample(world_x as f64 / TERRAIN_SCALE, world_z as f64 / TERRAIN_SCALE);
    let h = (sample * TERRAIN_AMP).floor() as i32 + TERRAIN_BASE as i32;
    h.clamp(1, CHUNK_HEIGHT - 1)
}

/// Fill `volume` (assumed zeroed/all-air) with terrain for chunk `(cx, cz)`
/// under `seed`. Pure: calling this twice with the same inputs yields
/// byte-identical output.
#[tracing::instrument(level = "debug", skip(volume, noise))]
pub fn fill_terrain(volume: &mut Volume, cx: i32, cz: i32, noise: &NoiseSource) {
    let (origin_x, origin_z) = (cx * CHUNK_SIZE, cz * CHUNK_SIZE);

    for lz in 0..CHUNK_SIZE {
        for lx in 0..CHUNK_SIZE {
            let world_x = origin_x + lx;
            let world_z = origin_z + lz;
            let h = height_at(noise, world_x, world_z);

            for y in 0..=h {
                let id = column_block_at(y, h);
                set(volume, lx, y, lz, id);
            }
        }
    }
}

/// The block id for local height `y` given the column's surface height `h`.
const fn column_block_at(y: i32, h: i32) -> BlockId {
    if y == 0 {
        ids::BEDROCK
    } else if y == h {
        ids::GRASS
    } else if y >= h - 3 {
        ids::DIRT
    } else {
        ids::STONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{empty_volume, get};

    #[test]
    fn determinism_across_calls() {
        let noise = NoiseSource::new(1234567);
        let mut a = empty_volume();
        let mut b = empty_volume();
        fill_terrain(&mut a, 3, -5, &noise);
        fill_terrain(&mut b, 3, -5, &noise);
        assert_eq!(a, b);
    }

    #[test]
    fn bedrock_floor_everywhere() {
        let noise = NoiseSource::new(42);
        let mut volume = empty_volume();
        fill_terrain(&mut volume, 0, 0, &noise);
        for lx in 0..CHUNK_SIZE {
            for lz in 0..CHUNK_SIZE {
                assert_eq!(get(&volume, lx, 0, lz), ids::BEDROCK);
            }
        }
    }

    #[test]
    fn surface_is_grass_and_height_in_band() {
        let noise = NoiseSource::new(42);
        let h = height_at(&noise, 8, 20);
        assert!((TERRAIN_BASE as i32 - TERRAIN_AMP as i32
            ..=TERRAIN_BASE as i32 + TERRAIN_AMP as i32)
            .contains(&h));

        let mut volume = empty_volume();
        fill_terrain(&mut volume, 0, 0, &noise);
        assert_eq!(get(&volume, 8, h, 20), ids::GRASS);
    }

    #[test]
    fn cells_above_surface_stay_air() {
        let noise = NoiseSource::new(7);
        let mut volume = empty_volume();
        fill_terrain(&mut volume, 0, 0, &noise);
        let h = height_at(&noise, 0, 0);
        if h < CHUNK_HEIGHT - 1 {
            assert_eq!(get(&volume, 0, h + 1, 0), ids::AIR);
        }
    }
}
