//! Combat resolution
//!
//! One alternating-turn resolver serves every encounter kind; only the
//! termination policy differs by mode. Each turn the attacker strikes, then
//! the defender retaliates if still standing. Damage is `max(1, attack -
//! defense)`, capped so no side drops below its hit point floor.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::combatant::{Combatant, CombatantKind};
use crate::tuning::Tuning;

/// Hit point floor for defeated players. Players are incapacitated at 1 hp
/// and can re-engage after healing; monsters and bosses drop to 0.
pub const PLAYER_HP_FLOOR: i64 = 1;

/// Encounter mode, deciding when the exchange loop stops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum CombatMode {
    /// Player versus monster: no turn ceiling, fight ends when a side drops
    #[strum(serialize = "PvE")]
    Pve,
    /// Player versus player: capped exchange, a full cap is a draw
    #[strum(serialize = "PvP")]
    Pvp,
    /// Player versus a shared world boss: capped exchange
    #[strum(serialize = "PvBoss")]
    PvBoss,
}

/// Terminal result of a combat call, from the attacker's side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Verdict {
    Victory,
    Defeat,
    Draw,
}

/// Complete result of one resolution pass
///
/// Carries the post-combat state of both sides for the caller to persist and
/// a turn-by-turn narration produced exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatOutcome {
    pub verdict: Verdict,
    pub turns: u32,
    pub attacker: Combatant,
    pub defender: Combatant,
    pub attacker_damage_dealt: i64,
    pub defender_damage_dealt: i64,
    pub log: Vec<String>,
}

/// Damage of a single strike: `max(1, attack - defense)`
///
/// Even a hopelessly outclassed attacker chips off a point.
pub fn strike_damage(attack: i64, defense: i64) -> i64 {
    (attack - defense).max(1)
}

fn hp_floor(kind: CombatantKind) -> i64 {
    match kind {
        CombatantKind::Player => PLAYER_HP_FLOOR,
        CombatantKind::Monster | CombatantKind::Boss => 0,
    }
}

fn turn_limit(mode: CombatMode, tuning: &Tuning) -> Option<u32> {
    match mode {
        CombatMode::Pve => None,
        CombatMode::Pvp => Some(tuning.pvp_turn_limit),
        CombatMode::PvBoss => Some(tuning.boss_turn_limit),
    }
}

/// Run one combat to its terminal outcome
///
/// Consumes both combatant views; the returned outcome owns their final
/// state. The resolver itself never fails.
pub fn resolve(
    mut attacker: Combatant,
    mut defender: Combatant,
    mode: CombatMode,
    tuning: &Tuning,
) -> CombatOutcome {
    let att_floor = hp_floor(attacker.kind);
    let def_floor = hp_floor(defender.kind);
    let limit = turn_limit(mode, tuning);

    let mut log = vec![format!("{} challenges {}!", attacker.name, defender.name)];
    let mut turns = 0u32;
    let mut attacker_damage_dealt = 0i64;
    let mut defender_damage_dealt = 0i64;

    while attacker.stats.hp > att_floor
        && defender.stats.hp > def_floor
        && limit.is_none_or(|l| turns < l)
    {
        turns += 1;

        let damage = strike_damage(attacker.stats.attack, defender.stats.defense)
            .min(defender.stats.hp - def_floor);
        defender.stats.hp -= damage;
        attacker_damage_dealt += damage;
        log.push(format!(
            "Turn {}: {} hits {} for {} damage ({} hp left).",
            turns, attacker.name, defender.name, damage, defender.stats.hp
        ));
        if defender.stats.hp <= def_floor {
            break;
        }

        let damage = strike_damage(defender.stats.attack, attacker.stats.defense)
            .min(attacker.stats.hp - att_floor);
        attacker.stats.hp -= damage;
        defender_damage_dealt += damage;
        log.push(format!(
            "Turn {}: {} retaliates against {} for {} damage ({} hp left).",
            turns, defender.name, attacker.name, damage, attacker.stats.hp
        ));
    }

    let verdict = if defender.stats.hp <= def_floor {
        Verdict::Victory
    } else if attacker.stats.hp <= att_floor {
        Verdict::Defeat
    } else {
        Verdict::Draw
    };

    match verdict {
        Verdict::Victory => log.push(format!("{} has bested {}!", attacker.name, defender.name)),
        Verdict::Defeat => log.push(format!(
            "{} collapses, defeated by {}.",
            attacker.name, defender.name
        )),
        Verdict::Draw => log.push(format!(
            "After {} turns neither side yields. A draw.",
            turns
        )),
    }

    CombatOutcome {
        verdict,
        turns,
        attacker,
        defender,
        attacker_damage_dealt,
        defender_damage_dealt,
        log,
    }
}
