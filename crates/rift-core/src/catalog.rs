//! Template catalog
//!
//! Read-only store of monster, boss and tag templates. Templates are
//! immutable data, typically deserialized from JSON at startup; the engine
//! only ever looks them up by id.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Quantity rolled for a loot entry. A bare integer means a fixed quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Fixed(u32),
    Range(u32, u32),
}

impl Quantity {
    /// Inclusive `(min, max)` bounds of the quantity roll
    pub fn bounds(self) -> (u32, u32) {
        match self {
            Quantity::Fixed(n) => (n, n),
            Quantity::Range(lo, hi) => (lo, hi),
        }
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Quantity::Fixed(1)
    }
}

/// One entry of a loot table: item id, drop chance in [0,1], quantity roll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootEntry {
    pub item_id: String,
    pub chance: f64,
    #[serde(default)]
    pub quantity: Quantity,
}

/// A named multiplier bundle applied to a base template
///
/// Multipliers default to 1.0 when absent in template data. `add_to_loot`
/// entries are appended to the encounter's merged loot table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagModifier {
    #[serde(default)]
    pub name_prefix: Option<String>,
    #[serde(default = "multiplier_one")]
    pub hp_multiplier: f64,
    #[serde(default = "multiplier_one")]
    pub attack_multiplier: f64,
    #[serde(default = "multiplier_one")]
    pub defense_multiplier: f64,
    #[serde(default = "multiplier_one")]
    pub gold_multiplier: f64,
    #[serde(default = "multiplier_one")]
    pub exp_multiplier: f64,
    #[serde(default)]
    pub add_to_loot: Vec<LootEntry>,
}

fn multiplier_one() -> f64 {
    1.0
}

impl Default for TagModifier {
    fn default() -> Self {
        Self {
            name_prefix: None,
            hp_multiplier: 1.0,
            attack_multiplier: 1.0,
            defense_multiplier: 1.0,
            gold_multiplier: 1.0,
            exp_multiplier: 1.0,
            add_to_loot: Vec::new(),
        }
    }
}

/// Monster template: display name, tag ids in application order, base loot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterTemplate {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub loot: Vec<LootEntry>,
}

/// Boss template: like a monster template plus a respawn cooldown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossTemplate {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub loot: Vec<LootEntry>,
    pub cooldown_secs: u64,
}

/// The full template catalog consumed by the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateCatalog {
    #[serde(default)]
    monsters: HashMap<String, MonsterTemplate>,
    #[serde(default)]
    bosses: HashMap<String, BossTemplate>,
    #[serde(default)]
    tags: HashMap<String, TagModifier>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_monster(&mut self, id: impl Into<String>, template: MonsterTemplate) {
        self.monsters.insert(id.into(), template);
    }

    pub fn add_boss(&mut self, id: impl Into<String>, template: BossTemplate) {
        self.bosses.insert(id.into(), template);
    }

    pub fn add_tag(&mut self, id: impl Into<String>, tag: TagModifier) {
        self.tags.insert(id.into(), tag);
    }

    pub fn monster(&self, id: &str) -> Option<&MonsterTemplate> {
        self.monsters.get(id)
    }

    pub fn boss(&self, id: &str) -> Option<&BossTemplate> {
        self.bosses.get(id)
    }

    pub fn tag(&self, id: &str) -> Option<&TagModifier> {
        self.tags.get(id)
    }

    /// All monster template ids, in stable (sorted) order
    pub fn monster_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.monsters.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// All boss template ids, in stable (sorted) order
    pub fn boss_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.bosses.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn has_monsters(&self) -> bool {
        !self.monsters.is_empty()
    }

    pub fn has_bosses(&self) -> bool {
        !self.bosses.is_empty()
    }
}
