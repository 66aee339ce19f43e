//! Encounter generation
//!
//! Turns a template id plus a scaling level into a concrete combatant:
//! base stats grow linearly with the level, then each tag referenced by the
//! template multiplies them in declaration order. The final hit point value
//! is truncated to an integer and used for both current and max hp. Loot is
//! resolved once, here; combat never re-rolls it.

use hashbrown::HashMap;

use crate::catalog::{LootEntry, TemplateCatalog};
use crate::combatant::{Combatant, CombatantKind, CombatantStats, RewardBundle};
use crate::errors::GenerateError;
use crate::rng::GameRng;

/// Running stat accumulators, kept fractional until the final truncation
#[derive(Debug, Clone, Copy)]
struct ScaledStats {
    hp: f64,
    attack: f64,
    defense: f64,
    gold: f64,
    exp: f64,
}

fn monster_base(level: u32) -> ScaledStats {
    let l = level as f64;
    ScaledStats {
        hp: 15.0 * l + 60.0,
        attack: 2.0 * l + 8.0,
        defense: l + 4.0,
        gold: 3.0 * l + 10.0,
        exp: 5.0 * l + 20.0,
    }
}

// Bosses are multi-attacker content and scale far above same-level monsters.
fn boss_base(level: u32) -> ScaledStats {
    let l = level as f64;
    ScaledStats {
        hp: 100.0 * l + 500.0,
        attack: 10.0 * l + 40.0,
        defense: 5.0 * l + 20.0,
        gold: 50.0 * l + 1000.0,
        exp: 100.0 * l + 2000.0,
    }
}

/// Apply the template's tags in declared order
///
/// Each tag multiplies the running stats, prepends its name prefix (so the
/// last declared tag reads outermost) and appends its extra loot entries.
/// A tag id with no catalog entry is a template data bug; it is skipped.
fn apply_tags(
    catalog: &TemplateCatalog,
    tag_ids: &[String],
    name: &mut String,
    stats: &mut ScaledStats,
    loot: &mut Vec<LootEntry>,
) {
    for tag_id in tag_ids {
        let Some(tag) = catalog.tag(tag_id) else {
            tracing::warn!(tag = %tag_id, "template references an unknown tag, skipping");
            continue;
        };

        if let Some(prefix) = &tag.name_prefix {
            *name = format!("【{prefix}】{name}");
        }

        stats.hp *= tag.hp_multiplier;
        stats.attack *= tag.attack_multiplier;
        stats.defense *= tag.defense_multiplier;
        stats.gold *= tag.gold_multiplier;
        stats.exp *= tag.exp_multiplier;

        loot.extend(tag.add_to_loot.iter().cloned());
    }
}

/// Resolve a merged loot table into concrete item drops
///
/// Each entry rolls independently; quantities for the same item accumulate.
pub fn roll_loot(loot: &[LootEntry], rng: &mut GameRng) -> HashMap<String, u32> {
    let mut items = HashMap::new();
    for entry in loot {
        if !rng.chance(entry.chance) {
            continue;
        }
        let (lo, hi) = entry.quantity.bounds();
        let amount = rng.range_u32(lo, hi);
        *items.entry(entry.item_id.clone()).or_insert(0) += amount;
    }
    items
}

fn build(
    catalog: &TemplateCatalog,
    kind: CombatantKind,
    base_name: &str,
    tag_ids: &[String],
    base_loot: &[LootEntry],
    base: ScaledStats,
    rng: &mut GameRng,
) -> Combatant {
    let mut name = base_name.to_string();
    let mut stats = base;
    let mut loot = base_loot.to_vec();
    apply_tags(catalog, tag_ids, &mut name, &mut stats, &mut loot);

    let hp = stats.hp as i64;
    Combatant {
        name,
        kind,
        stats: CombatantStats {
            hp,
            hp_max: hp,
            attack: stats.attack as i64,
            defense: stats.defense as i64,
        },
        rewards: RewardBundle {
            gold: stats.gold as i64,
            experience: stats.exp as i64,
            items: roll_loot(&loot, rng),
        },
    }
}

/// Create a monster combatant from a template, scaled to `level`
pub fn create_monster(
    catalog: &TemplateCatalog,
    template_id: &str,
    level: u32,
    rng: &mut GameRng,
) -> Result<Combatant, GenerateError> {
    let template = catalog
        .monster(template_id)
        .ok_or_else(|| GenerateError::TemplateNotFound {
            template_id: template_id.to_string(),
        })?;

    Ok(build(
        catalog,
        CombatantKind::Monster,
        &template.name,
        &template.tags,
        &template.loot,
        monster_base(level),
        rng,
    ))
}

/// Create a boss combatant from a template, scaled to `level`
pub fn create_boss(
    catalog: &TemplateCatalog,
    template_id: &str,
    level: u32,
    rng: &mut GameRng,
) -> Result<Combatant, GenerateError> {
    let template = catalog
        .boss(template_id)
        .ok_or_else(|| GenerateError::TemplateNotFound {
            template_id: template_id.to_string(),
        })?;

    Ok(build(
        catalog,
        CombatantKind::Boss,
        &template.name,
        &template.tags,
        &template.loot,
        boss_base(level),
        rng,
    ))
}

/// The merged loot table of a boss template (base entries plus tag additions
/// in application order), used for per-attacker drop rolls at settlement
pub fn boss_loot_table(
    catalog: &TemplateCatalog,
    template_id: &str,
) -> Result<Vec<LootEntry>, GenerateError> {
    let template = catalog
        .boss(template_id)
        .ok_or_else(|| GenerateError::TemplateNotFound {
            template_id: template_id.to_string(),
        })?;

    let mut loot = template.loot.clone();
    for tag_id in &template.tags {
        if let Some(tag) = catalog.tag(tag_id) {
            loot.extend(tag.add_to_loot.iter().cloned());
        }
    }
    Ok(loot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BossTemplate, MonsterTemplate, Quantity, TagModifier};

    fn test_catalog() -> TemplateCatalog {
        let mut catalog = TemplateCatalog::new();
        catalog.add_tag(
            "ancient",
            TagModifier {
                name_prefix: Some("Ancient".to_string()),
                hp_multiplier: 2.0,
                ..TagModifier::default()
            },
        );
        catalog.add_tag(
            "corrupted",
            TagModifier {
                name_prefix: Some("Corrupted".to_string()),
                hp_multiplier: 1.5,
                attack_multiplier: 1.2,
                add_to_loot: vec![LootEntry {
                    item_id: "tainted_shard".to_string(),
                    chance: 1.0,
                    quantity: Quantity::Fixed(2),
                }],
                ..TagModifier::default()
            },
        );
        catalog.add_monster(
            "wolf",
            MonsterTemplate {
                name: "Wolf".to_string(),
                tags: vec!["ancient".to_string(), "corrupted".to_string()],
                loot: vec![],
            },
        );
        catalog.add_monster(
            "bat",
            MonsterTemplate {
                name: "Bat".to_string(),
                tags: vec![],
                loot: vec![],
            },
        );
        catalog.add_boss(
            "ashen_tyrant",
            BossTemplate {
                name: "Ashen Tyrant".to_string(),
                tags: vec!["corrupted".to_string()],
                loot: vec![LootEntry {
                    item_id: "ember_core".to_string(),
                    chance: 1.0,
                    quantity: Quantity::Fixed(1),
                }],
                cooldown_secs: 3600,
            },
        );
        catalog
    }

    #[test]
    fn test_monster_base_formula() {
        let catalog = test_catalog();
        let mut rng = GameRng::new(1);
        let bat = create_monster(&catalog, "bat", 4, &mut rng).unwrap();

        assert_eq!(bat.kind, CombatantKind::Monster);
        assert_eq!(bat.stats.hp, 15 * 4 + 60);
        assert_eq!(bat.stats.hp_max, bat.stats.hp);
        assert_eq!(bat.stats.attack, 2 * 4 + 8);
        assert_eq!(bat.stats.defense, 4 + 4);
        assert_eq!(bat.rewards.gold, 3 * 4 + 10);
        assert_eq!(bat.rewards.experience, 5 * 4 + 20);
    }

    #[test]
    fn test_boss_base_formula() {
        let catalog = test_catalog();
        let mut rng = GameRng::new(1);
        let boss = create_boss(&catalog, "ashen_tyrant", 10, &mut rng).unwrap();

        assert_eq!(boss.kind, CombatantKind::Boss);
        // hp 100*10+500 = 1500, corrupted tag then multiplies by 1.5
        assert_eq!(boss.stats.hp, 2250);
        // attack (10*10+40) * 1.2 = 168
        assert_eq!(boss.stats.attack, 168);
        assert_eq!(boss.stats.defense, 5 * 10 + 20);
    }

    #[test]
    fn test_tags_multiply_and_decorate_in_order() {
        let catalog = test_catalog();
        let mut rng = GameRng::new(1);
        let wolf = create_monster(&catalog, "wolf", 0, &mut rng).unwrap();

        // base 60 hp, * 2.0 * 1.5
        assert_eq!(wolf.stats.hp, 180);
        // each tag prepends, so the last declared one reads outermost
        assert_eq!(wolf.name, "【Corrupted】【Ancient】Wolf");
        // corrupted's loot entry always drops: 2 tainted shards
        assert_eq!(wolf.rewards.items.get("tainted_shard"), Some(&2));
    }

    #[test]
    fn test_stats_deterministic_across_rng_streams() {
        let catalog = test_catalog();
        let mut rng_a = GameRng::new(7);
        let mut rng_b = GameRng::new(99);

        let a = create_monster(&catalog, "wolf", 12, &mut rng_a).unwrap();
        let b = create_monster(&catalog, "wolf", 12, &mut rng_b).unwrap();

        assert_eq!(a.stats, b.stats);
        assert_eq!(a.name, b.name);
        assert_eq!(a.rewards.gold, b.rewards.gold);
        assert_eq!(a.rewards.experience, b.rewards.experience);
    }

    #[test]
    fn test_unknown_template_rejected() {
        let catalog = test_catalog();
        let mut rng = GameRng::new(1);
        let err = create_monster(&catalog, "ghoul", 1, &mut rng).unwrap_err();
        assert_eq!(
            err,
            GenerateError::TemplateNotFound {
                template_id: "ghoul".to_string()
            }
        );
        assert!(create_boss(&catalog, "wolf", 1, &mut rng).is_err());
    }

    #[test]
    fn test_unknown_tag_skipped() {
        let mut catalog = test_catalog();
        catalog.add_monster(
            "rat",
            MonsterTemplate {
                name: "Rat".to_string(),
                tags: vec!["missing_tag".to_string()],
                loot: vec![],
            },
        );
        let mut rng = GameRng::new(1);
        let rat = create_monster(&catalog, "rat", 0, &mut rng).unwrap();
        assert_eq!(rat.name, "Rat");
        assert_eq!(rat.stats.hp, 60);
    }

    #[test]
    fn test_roll_loot_accumulates_same_item() {
        let loot = vec![
            LootEntry {
                item_id: "herb".to_string(),
                chance: 1.0,
                quantity: Quantity::Fixed(1),
            },
            LootEntry {
                item_id: "herb".to_string(),
                chance: 1.0,
                quantity: Quantity::Range(2, 2),
            },
            LootEntry {
                item_id: "relic".to_string(),
                chance: 0.0,
                quantity: Quantity::Fixed(5),
            },
        ];
        let mut rng = GameRng::new(3);
        let items = roll_loot(&loot, &mut rng);
        assert_eq!(items.get("herb"), Some(&3));
        assert!(!items.contains_key("relic"));
    }

    #[test]
    fn test_boss_loot_table_merges_tag_entries() {
        let catalog = test_catalog();
        let table = boss_loot_table(&catalog, "ashen_tyrant").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].item_id, "ember_core");
        assert_eq!(table[1].item_id, "tainted_shard");
    }
}
