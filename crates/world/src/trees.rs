//! Tree decoration, the second of `StructureDecorator`'s two sub-passes.

use rand::{rngs::StdRng, Rng};
use strata_core::{ids, CHUNK_HEIGHT, CHUNK_SIZE};

use crate::chunk::{get, set, Volume};

/// Probability a qualifying grass column grows a tree.
const TREE_CHANCE: f64 = 0.01;
/// Border margin: columns within this many voxels of a chunk edge never
/// grow a tree, so a tree's canopy never crosses into an unwritten
/// neighbour chunk.
const BORDER_MARGIN: i32 = 2;
/// Foliage radius at the canopy's middle layers.
const CANOPY_RADIUS: i32 = 2;
/// Fraction of corner voxels skipped for a rounder canopy silhouette.
const CORNER_REJECTION: f64 = 0.4;

/// Walk every interior column and probabilistically grow a tree on grass
/// surfaces.
pub fn generate_trees(volume: &mut Volume, rng: &mut StdRng) {
    for lz in BORDER_MARGIN..CHUNK_SIZE - BORDER_MARGIN {
        for lx in BORDER_MARGIN..CHUNK_SIZE - BORDER_MARGIN {
            let Some(h) = topmost_non_air(volume, lx, lz) else {
                continue;
            };
            if get(volume, lx, h, lz) != ids::GRASS {
                continue;
            }
            if rng.gen_bool(TREE_CHANCE) {
                plant_tree(volume, lx, h, lz, rng);
            }
        }
    }
}

fn topmost_non_air(volume: &Volume, lx: i32, lz: i32) -> Option<i32> {
    (0..CHUNK_HEIGHT)
        .rev()
        .find(|&y| get(volume, lx, y, lz) != ids::AIR)
}

fn plant_tree(volume: &mut Volume, lx: i32, h: i32, lz: i32, rng: &mut StdRng) {
    let trunk_height = rng.gen_range(4..=5);

    for dy in 1..=trunk_height {
        let y = h + dy;
        if y >= CHUNK_HEIGHT {
            return;
        }
        // Never overwrite existing wood (two trees landing on top of each
        // other keep whichever trunk was placed first).
        if get(volume, lx, y, lz) == ids::WOOD {
            return;
        }
        set(volume, lx, y, lz, ids::WOOD);
    }

    let canopy_bottom = h + trunk_height - 2;
    let canopy_top = h + trunk_height + 1;
    for y in canopy_bottom..=canopy_top {
        if !(0..CHUNK_HEIGHT).contains(&y) {
            continue;
        }
        let radius = if y == canopy_top { 1 } else { CANOPY_RADIUS };
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let (x, z) = (lx + dx, lz + dz);
                if !(0..CHUNK_SIZE).contains(&x) || !(0..CHUNK_SIZE).contains(&z) {
                    continue;
                }
                let is_corner = dx.abs() == radius && dz.abs() == radius;
                if is_corner && rng.gen_bool(CORNER_REJECTION) {
                    continue;
                }
                if get(volume, x, y, z) == ids::AIR {
                    set(volume, x, y, z, ids::LEAVES);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::empty_volume;
    use crate::noise::NoiseSource;
    use crate::rng::chunk_rng;
    use crate::terrain::fill_terrain;

    #[test]
    fn trees_never_touch_chunk_border_columns() {
        let noise = NoiseSource::new(5);
        let mut volume = empty_volume();
        fill_terrain(&mut volume, 0, 0, &noise);
        let mut rng = chunk_rng(5, 0, 0);
        generate_trees(&mut volume, &mut rng);

        for lx in 0..CHUNK_SIZE {
            for lz in 0..CHUNK_SIZE {
                if lx < BORDER_MARGIN
                    || lx >= CHUNK_SIZE - BORDER_MARGIN
                    || lz < BORDER_MARGIN
                    || lz >= CHUNK_SIZE - BORDER_MARGIN
                {
                    for y in 0..CHUNK_HEIGHT {
                        assert_ne!(get(&volume, lx, y, lz), ids::WOOD);
                    }
                }
            }
        }
    }

    #[test]
    fn determinism_for_same_seed() {
        let noise = NoiseSource::new(13);
        let mut a = empty_volume();
        let mut b = empty_volume();
        fill_terrain(&mut a, 4, -1, &noise);
        fill_terrain(&mut b, 4, -1, &noise);
        generate_trees(&mut a, &mut chunk_rng(13, 4, -1));
        generate_trees(&mut b, &mut chunk_rng(13, 4, -1));
        assert_eq!(a, b);
    }
}
