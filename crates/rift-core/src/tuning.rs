//! Gameplay tuning knobs
//!
//! Every balance constant lives here so deployments can override them from
//! configuration without touching the engine.

use serde::{Deserialize, Serialize};

/// Tunable gameplay constants
///
/// The defaults match the live deployment values. A zero
/// `floors_per_level_divisor` disables level-based floor growth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tuning {
    // Dungeon shape
    pub base_floors: u32,
    pub floors_per_level_divisor: u32,
    pub monster_chance: f64,
    pub treasure_gold_min: i64,
    pub treasure_gold_max: i64,

    // Combat termination
    pub pvp_turn_limit: u32,
    pub boss_turn_limit: u32,

    // World boss scaling
    pub scaling_sample: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            base_floors: 3,
            floors_per_level_divisor: 2,
            monster_chance: 0.7,
            treasure_gold_min: 50,
            treasure_gold_max: 150,

            pvp_turn_limit: 30,
            boss_turn_limit: 50,

            scaling_sample: 3,
        }
    }
}

impl Tuning {
    /// Total floor count for a dungeon entered at `party_level`
    ///
    /// Always at least 1 so the final boss floor exists.
    pub fn floor_count(&self, party_level: u32) -> u32 {
        let growth = if self.floors_per_level_divisor == 0 {
            0
        } else {
            party_level / self.floors_per_level_divisor
        };
        (self.base_floors + growth).max(1)
    }
}
