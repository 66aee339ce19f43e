//! Combatant model
//!
//! A `Combatant` is the normalized view the resolver works on, whatever the
//! participant actually is on the chat side: a player record, a generated
//! monster or a shared world boss.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use strum::Display;

/// What kind of entity a combatant is
///
/// The kind decides the hit point floor in combat: players are knocked down
/// to 1 hp and survive, monsters and bosses drop to 0 and are gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum CombatantKind {
    Player,
    Monster,
    Boss,
}

/// Combat-relevant attributes
///
/// `hp` never exceeds `hp_max`; both are fixed to the same truncated value
/// at generation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantStats {
    pub hp: i64,
    pub hp_max: i64,
    pub attack: i64,
    pub defense: i64,
}

impl CombatantStats {
    /// Stats for a freshly created combatant at full hit points
    pub const fn new(hp: i64, attack: i64, defense: i64) -> Self {
        Self {
            hp,
            hp_max: hp,
            attack,
            defense,
        }
    }
}

/// Rewards fixed at generation time: currency, experience, rolled item drops
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardBundle {
    pub gold: i64,
    pub experience: i64,
    #[serde(default)]
    pub items: HashMap<String, u32>,
}

impl RewardBundle {
    /// Merge another bundle into this one, accumulating item quantities
    pub fn absorb(&mut self, other: &RewardBundle) {
        self.gold += other.gold;
        self.experience += other.experience;
        for (item_id, amount) in &other.items {
            *self.items.entry(item_id.clone()).or_insert(0) += amount;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.gold == 0 && self.experience == 0 && self.items.is_empty()
    }
}

/// Normalized combat snapshot of one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    pub name: String,
    pub kind: CombatantKind,
    pub stats: CombatantStats,
    pub rewards: RewardBundle,
}

impl Combatant {
    pub fn new(
        name: impl Into<String>,
        kind: CombatantKind,
        stats: CombatantStats,
        rewards: RewardBundle,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            stats,
            rewards,
        }
    }

    /// A player-side combatant. Players carry no reward bundle.
    pub fn player(name: impl Into<String>, hp: i64, attack: i64, defense: i64) -> Self {
        Self {
            name: name.into(),
            kind: CombatantKind::Player,
            stats: CombatantStats::new(hp, attack, defense),
            rewards: RewardBundle::default(),
        }
    }
}
