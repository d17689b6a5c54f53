//! Data-driven break-time table.
//!
//! Break times are treated as configuration, not algorithm: this module is
//! a plain lookup table, not a simulation of tool wear or block hardness.

use crate::ids::{self, BlockId};
use serde::{Deserialize, Serialize};

/// Minimal tool tier. Tool identity/durability is out of scope for the core;
/// this only distinguishes "bare hand" from "any tool" for the break-time
/// lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tool {
    /// No tool equipped.
    Hand,
    /// Any tool equipped (tiering is a downstream concern).
    Tool,
}

/// Time required to break a block, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BreakTime {
    /// Never breaks. Bedrock's break time is +infinity; the core encodes
    /// it but does not enforce it.
    Infinite,
    /// Breaks after the given number of seconds.
    Seconds(f32),
}

/// A small table mapping block id to its break time under each tool tier.
///
/// `break_time(block, tool)` is the embedding-facing query; the core does
/// not decide *whether* a break attempt succeeds, only how long it
/// nominally takes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakTimeTable {
    entries: Vec<(BlockId, f32, f32)>,
}

impl BreakTimeTable {
    /// The table used by freshly generated terrain: plausible defaults for
    /// every block id the synthesis and decoration passes can produce.
    pub fn default_table() -> Self {
        Self {
            entries: vec![
                (ids::STONE, 1.5, 0.75),
                (ids::DIRT, 0.5, 0.4),
                (ids::GRASS, 0.6, 0.4),
                (ids::WOOD, 2.0, 1.0),
                (ids::LEAVES, 0.2, 0.2),
                (ids::COAL_ORE, 3.0, 1.5),
                (ids::IRON_ORE, 4.5, 2.0),
            ],
        }
    }

    /// Look up the break time for `block` under `tool`. Bedrock (and any id
    /// absent from the table, which in practice is only air) is `Infinite`.
    pub fn break_time(&self, block: BlockId, tool: Tool) -> BreakTime {
        if block == ids::BEDROCK {
            return BreakTime::Infinite;
        }
        match self
            .entries
            .iter()
            .find(|(id, _, _)| *id == block)
        {
            Some((_, hand, tool_time)) => BreakTime::Seconds(match tool {
                Tool::Hand => *hand,
                Tool::Tool => *tool_time,
            }),
            None => BreakTime::Infinite,
        }
    }
}

impl Default for BreakTimeTable {
    fn default() -> Self {
        Self::default_table()
    }
}
