//! Ore vein decoration, the first of `StructureDecorator`'s two sub-passes.

use rand::{rngs::StdRng, Rng};
use strata_core::{ids, BlockId, CHUNK_HEIGHT, CHUNK_SIZE};

use crate::chunk::{get, set, Volume};
use crate::noise::NoiseSource;
use crate::terrain::height_at;

/// The six axis-aligned step directions a vein's random walk can take.
const STEPS: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// One vein type's generation parameters (block id, target length, attempt
/// count) — coal is `(8, 80)`, iron is `(6, 50)`.
struct VeinKind {
    block: BlockId,
    target_length: u32,
    attempts: u32,
}

const COAL: VeinKind = VeinKind {
    block: ids::COAL_ORE,
    target_length: 8,
    attempts: 80,
};
const IRON: VeinKind = VeinKind {
    block: ids::IRON_ORE,
    target_length: 6,
    attempts: 50,
};

const MAX_WALK_FAILURES: u32 = 10;

/// Run both ore passes (coal then iron) on an already-terrain-filled
/// volume, using `rng` for column/position selection and the random walk.
pub fn generate_ores(volume: &mut Volume, cx: i32, cz: i32, noise: &NoiseSource, rng: &mut StdRng) {
    for kind in [&COAL, &IRON] {
        for _ in 0..kind.attempts {
            generate_vein(volume, cx, cz, noise, kind, rng);
        }
    }
}

/// Attempt to place a single vein of `kind`. A vein that cannot seed in
/// stone, or that accumulates `MAX_WALK_FAILURES` failed steps, is silently
/// abandoned, matching the source's "10 failures abort the vein" rule.
fn generate_vein(
    volume: &mut Volume,
    cx: i32,
    cz: i32,
    noise: &NoiseSource,
    kind: &VeinKind,
    rng: &mut StdRng,
) {
    let lx = rng.gen_range(0..CHUNK_SIZE);
    let lz = rng.gen_range(0..CHUNK_SIZE);
    let world_x = cx * CHUNK_SIZE + lx;
    let world_z = cz * CHUNK_SIZE + lz;
    let h = height_at(noise, world_x, world_z);
    let y_max = (h - 3).max(2);

    if y_max < 1 {
        return;
    }
    let mut y = rng.gen_range(1..=y_max);
    if get(volume, lx, y, lz) != ids::STONE {
        return;
    }

    let (mut x, mut z) = (lx, lz);
    let mut placed = 0u32;
    let mut failures = 0u32;

    while placed < kind.target_length && failures < MAX_WALK_FAILURES {
        set(volume, x, y, z, kind.block);
        placed += 1;

        let (dx, dy, dz) = STEPS[rng.gen_range(0..STEPS.len())];
        let (nx, ny, nz) = (x + dx, y + dy, z + dz);
        if !(0..CHUNK_SIZE).contains(&nx)
            || !(0..CHUNK_HEIGHT).contains(&ny)
            || !(0..CHUNK_SIZE).contains(&nz)
            || get(volume, nx, ny, nz) != ids::STONE
        {
            failures += 1;
            continue;
        }
        x = nx;
        y = ny;
        z = nz;
    }
}
