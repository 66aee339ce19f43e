//! Dungeon generation and traversal
//!
//! A dungeon is generated in full at entry time: every floor's content is
//! fixed then and never re-rolled. The instance belongs to the party that
//! entered it and is discarded when the run ends, whichever way it ends.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::catalog::TemplateCatalog;
use crate::combat::{CombatMode, CombatOutcome, Verdict, resolve};
use crate::combatant::{Combatant, RewardBundle};
use crate::errors::DungeonError;
use crate::generate::{create_boss, create_monster};
use crate::rng::GameRng;
use crate::tuning::Tuning;

/// Opaque dungeon instance identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DungeonId(pub u64);

impl fmt::Display for DungeonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Content of one floor, fixed at generation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FloorEvent {
    Monster { template_id: String },
    Boss { template_id: String },
    Treasure { gold: i64 },
    Empty,
}

/// A generated dungeon: an ordered floor sequence owned by one party
///
/// `floors.len()` always equals `total_floors`; the sequence is never
/// regenerated mid-traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DungeonInstance {
    pub id: DungeonId,
    pub party_level: u32,
    pub total_floors: u32,
    pub floors: Vec<FloorEvent>,
}

/// Generate a dungeon for a party entering at `party_level`
///
/// Each floor before the last rolls monster-or-treasure against the
/// configured monster chance; treasure gold is uniform in the configured
/// range scaled by `1 + party_level`. The last floor is always a boss drawn
/// uniformly from the boss pool.
pub fn generate(
    catalog: &TemplateCatalog,
    party_level: u32,
    tuning: &Tuning,
    rng: &mut GameRng,
) -> Result<DungeonInstance, DungeonError> {
    if !catalog.has_monsters() {
        return Err(DungeonError::EmptyMonsterPool);
    }
    if !catalog.has_bosses() {
        return Err(DungeonError::EmptyBossPool);
    }
    let monster_pool = catalog.monster_ids();
    let boss_pool = catalog.boss_ids();

    let id = DungeonId(rng.raw());
    let total_floors = tuning.floor_count(party_level);

    let mut floors = Vec::with_capacity(total_floors as usize);
    for _ in 1..total_floors {
        if rng.chance(tuning.monster_chance) {
            let template_id = monster_pool[rng.index(monster_pool.len())].clone();
            floors.push(FloorEvent::Monster { template_id });
        } else {
            let gold = rng.range_i64(tuning.treasure_gold_min, tuning.treasure_gold_max)
                * (1 + party_level as i64);
            floors.push(FloorEvent::Treasure { gold });
        }
    }
    let template_id = boss_pool[rng.index(boss_pool.len())].clone();
    floors.push(FloorEvent::Boss { template_id });

    tracing::debug!(id = %id, floors = total_floors, party_level, "generated dungeon");

    Ok(DungeonInstance {
        id,
        party_level,
        total_floors,
        floors,
    })
}

/// Where a run stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum ExpeditionState {
    Exploring,
    Completed,
    Defeated,
}

/// What happened on one resolved floor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorReport {
    pub floor: u32,
    pub total_floors: u32,
    pub state: ExpeditionState,
    pub combat: Option<CombatOutcome>,
    pub log: Vec<String>,
}

/// A party's walk through one dungeon instance
///
/// Floors resolve strictly in order. Rewards are banked floor by floor, so
/// a later defeat keeps what earlier floors already paid out; the fatal
/// floor itself pays nothing.
#[derive(Debug, Clone)]
pub struct Expedition {
    instance: DungeonInstance,
    next_floor: usize,
    gained: RewardBundle,
    state: ExpeditionState,
}

impl Expedition {
    pub fn new(instance: DungeonInstance) -> Self {
        let state = if instance.floors.is_empty() {
            ExpeditionState::Completed
        } else {
            ExpeditionState::Exploring
        };
        Self {
            instance,
            next_floor: 0,
            gained: RewardBundle::default(),
            state,
        }
    }

    pub fn instance(&self) -> &DungeonInstance {
        &self.instance
    }

    pub fn state(&self) -> ExpeditionState {
        self.state
    }

    pub fn floors_cleared(&self) -> u32 {
        self.next_floor as u32
    }

    /// Rewards banked so far
    pub fn gained(&self) -> &RewardBundle {
        &self.gained
    }

    /// Consume the run and keep the banked rewards
    pub fn into_gained(self) -> RewardBundle {
        self.gained
    }

    fn battle(
        &mut self,
        party: &mut Combatant,
        enemy: Combatant,
        floor: u32,
        tuning: &Tuning,
        log: &mut Vec<String>,
    ) -> CombatOutcome {
        let outcome = resolve(party.clone(), enemy, CombatMode::Pve, tuning);
        party.stats = outcome.attacker.stats;

        if outcome.verdict == Verdict::Victory {
            log.push(format!(
                "The party claims {} gold and {} experience.",
                outcome.defender.rewards.gold, outcome.defender.rewards.experience
            ));
            self.gained.absorb(&outcome.defender.rewards);
        } else {
            self.state = ExpeditionState::Defeated;
            log.push(format!("The expedition ends on floor {floor}."));
        }
        outcome
    }

    /// Resolve the next floor
    ///
    /// Monster and boss floors generate their occupant at the instance's
    /// party level and run a full player-versus-monster combat with `party`
    /// attacking. Returns `ExpeditionOver` once the run has completed or
    /// the party has fallen.
    pub fn advance(
        &mut self,
        party: &mut Combatant,
        catalog: &TemplateCatalog,
        tuning: &Tuning,
        rng: &mut GameRng,
    ) -> Result<FloorReport, DungeonError> {
        if self.state != ExpeditionState::Exploring {
            return Err(DungeonError::ExpeditionOver);
        }

        // state Exploring keeps the index in range; zero-floor instances
        // are completed by new()
        let index = self.next_floor;
        let floor = index as u32 + 1;
        let event = self.instance.floors[index].clone();
        let level = self.instance.party_level;

        let mut log = Vec::new();
        let mut combat = None;

        match event {
            FloorEvent::Monster { template_id } => {
                let enemy = create_monster(catalog, &template_id, level, rng)?;
                log.push(format!("Floor {floor}: a {} blocks the way.", enemy.name));
                combat = Some(self.battle(party, enemy, floor, tuning, &mut log));
            }
            FloorEvent::Boss { template_id } => {
                let enemy = create_boss(catalog, &template_id, level, rng)?;
                log.push(format!("Floor {floor}: {} guards the final hall.", enemy.name));
                combat = Some(self.battle(party, enemy, floor, tuning, &mut log));
            }
            FloorEvent::Treasure { gold } => {
                log.push(format!("Floor {floor}: a treasure cache yields {gold} gold."));
                self.gained.gold += gold;
            }
            FloorEvent::Empty => {
                log.push(format!("Floor {floor}: nothing but dust."));
            }
        }

        if self.state == ExpeditionState::Exploring {
            self.next_floor += 1;
            if self.next_floor == self.instance.floors.len() {
                self.state = ExpeditionState::Completed;
                log.push("The dungeon is cleared!".to_string());
            }
        }

        Ok(FloorReport {
            floor,
            total_floors: self.instance.total_floors,
            state: self.state,
            combat,
            log,
        })
    }
}
