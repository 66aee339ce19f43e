//! World boss coordination
//!
//! A boss template cycles Dormant -> Active -> Resolving -> Cooldown ->
//! Dormant. While Active, one `BossSession` is the only piece of state in
//! the engine mutated by more than one caller, so every read-modify-write
//! of it happens under the session's own lock.
//!
//! The persisted conditional decrement is the authoritative defense against
//! racing processes; the in-process lock serializes callers here and keeps
//! reward settlement from racing ahead of the final blow.
//!
//! Lock order: the registry guard is never held while waiting on a session
//! lock (lookups clone the session handle and drop the registry first).
//! Settlement acquires the registry while holding its session, which is
//! safe under that discipline.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::catalog::TemplateCatalog;
use crate::combat::{CombatMode, CombatOutcome, resolve};
use crate::combatant::Combatant;
use crate::errors::BossError;
use crate::generate::{boss_loot_table, create_boss, roll_loot};
use crate::rng::GameRng;
use crate::storage::{PlayerDirectory, Storage};
use crate::tuning::Tuning;

/// Seconds since the Unix epoch
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// What a spawn request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    /// A fresh session was created at this scaling level
    Spawned { level: u32 },
    /// A session already exists; spawning is idempotent
    AlreadyActive,
    /// The template is cooling down until this epoch second
    OnCooldown { until: u64 },
}

/// Result of one accepted attack bout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackReport {
    /// Full narrated combat of this bout
    pub outcome: CombatOutcome,
    /// Damage actually applied to the session, never more than the hit
    /// points the bout started with
    pub damage: i64,
    pub remaining_hp: i64,
    /// True only for the bout that drove the hit points to zero
    pub defeated: bool,
}

/// One attacker's cut of a settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardShare {
    pub attacker_id: String,
    pub damage: i64,
    pub gold: i64,
    pub experience: i64,
    pub items: HashMap<String, u32>,
}

/// The complete reward distribution of one defeated boss
///
/// Shares are ordered by damage dealt, heaviest hitter first. Applied to
/// player records as one batch by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardLedger {
    pub template_id: String,
    pub boss_name: String,
    pub total_damage: i64,
    pub gold_pool: i64,
    pub experience_pool: i64,
    pub shares: Vec<RewardShare>,
}

/// Snapshot of one live session for roster displays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossStatus {
    pub template_id: String,
    pub name: String,
    pub level: u32,
    pub hp: i64,
    pub hp_max: i64,
    pub attackers: usize,
    pub spawned_at: u64,
}

#[derive(Debug)]
struct SessionState {
    boss: Combatant,
    level: u32,
    spawned_at: u64,
    contributions: HashMap<String, i64>,
    settled: bool,
}

/// The shared mutable record of one active world boss
#[derive(Debug)]
struct BossSession {
    state: Mutex<SessionState>,
}

impl BossSession {
    fn lock(&self) -> Result<MutexGuard<'_, SessionState>, BossError> {
        self.state.lock().map_err(|_| BossError::StatePoisoned)
    }
}

#[derive(Debug, Default)]
struct Registry {
    sessions: HashMap<String, Arc<BossSession>>,
    /// Template id -> epoch second the cooldown expires
    cooldowns: HashMap<String, u64>,
}

/// Serialized entry point for everything world-boss
///
/// Owns the live sessions and cooldown book; storage and the player
/// directory are injected collaborators.
pub struct WorldBossCoordinator<S: Storage, D: PlayerDirectory> {
    catalog: Arc<TemplateCatalog>,
    storage: S,
    directory: D,
    tuning: Tuning,
    registry: Mutex<Registry>,
    rng: Mutex<GameRng>,
}

impl<S: Storage, D: PlayerDirectory> WorldBossCoordinator<S, D> {
    pub fn new(
        catalog: Arc<TemplateCatalog>,
        storage: S,
        directory: D,
        tuning: Tuning,
        rng: GameRng,
    ) -> Self {
        Self {
            catalog,
            storage,
            directory,
            tuning,
            registry: Mutex::new(Registry::default()),
            rng: Mutex::new(rng),
        }
    }

    fn lock_registry(&self) -> Result<MutexGuard<'_, Registry>, BossError> {
        self.registry.lock().map_err(|_| BossError::StatePoisoned)
    }

    fn lock_rng(&self) -> Result<MutexGuard<'_, GameRng>, BossError> {
        self.rng.lock().map_err(|_| BossError::StatePoisoned)
    }

    fn session(&self, template_id: &str) -> Result<Arc<BossSession>, BossError> {
        let registry = self.lock_registry()?;
        registry
            .sessions
            .get(template_id)
            .cloned()
            .ok_or_else(|| BossError::NoSuchSession {
                template_id: template_id.to_string(),
            })
    }

    /// Boss scaling level: the mean level of the current top players,
    /// 1 while the roster is still empty
    pub fn scaling_level(&self) -> Result<u32, BossError> {
        let levels = self.directory.top_levels(self.tuning.scaling_sample)?;
        if levels.is_empty() {
            return Ok(1);
        }
        let sum: u64 = levels.iter().map(|&l| u64::from(l)).sum();
        Ok((sum / levels.len() as u64) as u32)
    }

    /// Spawn a session for this template unless one is live or cooling down
    pub fn ensure_spawned(&self, template_id: &str) -> Result<SpawnOutcome, BossError> {
        self.ensure_spawned_at(template_id, unix_now())
    }

    /// Clock-injected spawn, `now` in epoch seconds
    pub fn ensure_spawned_at(
        &self,
        template_id: &str,
        now: u64,
    ) -> Result<SpawnOutcome, BossError> {
        let mut registry = self.lock_registry()?;

        if registry.sessions.contains_key(template_id) {
            return Ok(SpawnOutcome::AlreadyActive);
        }
        if let Some(&until) = registry.cooldowns.get(template_id) {
            if now < until {
                return Ok(SpawnOutcome::OnCooldown { until });
            }
            registry.cooldowns.remove(template_id);
        }

        let level = self.scaling_level()?;
        let boss = {
            let mut rng = self.lock_rng()?;
            create_boss(&self.catalog, template_id, level, &mut rng)?
        };
        self.storage.insert_boss(template_id, boss.stats.hp)?;
        tracing::info!(template_id, level, hp = boss.stats.hp, "world boss spawned");

        let session = Arc::new(BossSession {
            state: Mutex::new(SessionState {
                boss,
                level,
                spawned_at: now,
                contributions: HashMap::new(),
                settled: false,
            }),
        });
        registry.sessions.insert(template_id.to_string(), session);
        Ok(SpawnOutcome::Spawned { level })
    }

    /// Spawn every configured boss template that is free to spawn
    ///
    /// Per-template failures are logged and skipped so one broken template
    /// cannot keep the rest of the world unpopulated.
    pub fn ensure_all_spawned(&self) -> Vec<(String, SpawnOutcome)> {
        self.ensure_all_spawned_at(unix_now())
    }

    pub fn ensure_all_spawned_at(&self, now: u64) -> Vec<(String, SpawnOutcome)> {
        let mut results = Vec::new();
        for template_id in self.catalog.boss_ids() {
            match self.ensure_spawned_at(&template_id, now) {
                Ok(outcome) => results.push((template_id, outcome)),
                Err(err) => {
                    tracing::error!(template_id, error = %err, "failed to spawn world boss");
                }
            }
        }
        results
    }

    /// Run one attack bout against a live session
    ///
    /// The whole bout resolves under the session lock against the boss's
    /// current hit points, so accepted attacks are totally ordered and the
    /// applied damage of each is capped to what was actually left. A bout
    /// that deals no damage records no contribution.
    pub fn attack(
        &self,
        template_id: &str,
        attacker_id: &str,
        attacker: &Combatant,
    ) -> Result<AttackReport, BossError> {
        let session = self.session(template_id)?;
        let mut state = session.lock()?;

        if state.boss.stats.hp <= 0 {
            return Err(BossError::AlreadyDefeated);
        }

        let outcome = resolve(
            attacker.clone(),
            state.boss.clone(),
            CombatMode::PvBoss,
            &self.tuning,
        );
        let damage = outcome.attacker_damage_dealt;

        if damage == 0 {
            let remaining_hp = state.boss.stats.hp;
            return Ok(AttackReport {
                outcome,
                damage,
                remaining_hp,
                defeated: false,
            });
        }

        // Authoritative write. A refusal means another process already
        // finished this boss.
        let Some(remaining) = self.storage.decrement_boss_hp(template_id, damage)? else {
            state.boss.stats.hp = 0;
            return Err(BossError::AlreadyDefeated);
        };
        state.boss.stats.hp = remaining;
        self.storage
            .record_contribution(template_id, attacker_id, damage)?;
        *state
            .contributions
            .entry(attacker_id.to_string())
            .or_insert(0) += damage;

        let defeated = remaining == 0;
        if defeated {
            tracing::info!(template_id, attacker_id, "world boss defeated");
        }

        Ok(AttackReport {
            outcome,
            damage,
            remaining_hp: remaining,
            defeated,
        })
    }

    /// Settle a defeated session: split its reward pools over recorded
    /// contributions, apply them as one batch, clear the session and start
    /// the template's cooldown
    ///
    /// Meant to be called by whichever `attack` observed `defeated`. Runs
    /// at most once per session; a repeat call reports the session gone.
    pub fn settle(&self, template_id: &str) -> Result<RewardLedger, BossError> {
        self.settle_at(template_id, unix_now())
    }

    pub fn settle_at(&self, template_id: &str, now: u64) -> Result<RewardLedger, BossError> {
        let session = self.session(template_id)?;
        let mut state = session.lock()?;

        if state.settled {
            return Err(BossError::NoSuchSession {
                template_id: template_id.to_string(),
            });
        }
        if state.boss.stats.hp > 0 {
            return Err(BossError::NotDefeated);
        }

        // Guarded against an empty contribution map; it cannot arise from
        // accepted attacks but must not divide by zero.
        let total: i64 = state.contributions.values().sum();
        let total = total.max(1);
        let gold_pool = state.boss.rewards.gold;
        let experience_pool = state.boss.rewards.experience;
        let loot_table = boss_loot_table(&self.catalog, template_id)?;

        let mut entries: Vec<(String, i64)> = state
            .contributions
            .iter()
            .map(|(id, damage)| (id.clone(), *damage))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut shares = Vec::with_capacity(entries.len());
        {
            let mut rng = self.lock_rng()?;
            for (attacker_id, damage) in entries {
                shares.push(RewardShare {
                    gold: gold_pool * damage / total,
                    experience: experience_pool * damage / total,
                    items: roll_loot(&loot_table, &mut rng),
                    attacker_id,
                    damage,
                });
            }
        }

        let ledger = RewardLedger {
            template_id: template_id.to_string(),
            boss_name: state.boss.name.clone(),
            total_damage: total,
            gold_pool,
            experience_pool,
            shares,
        };

        // The reward batch is the commit point. If it fails, `settled` stays
        // false and a retry can pay out; once it lands the session is done.
        self.storage.apply_rewards(&ledger)?;
        state.settled = true;

        // Cleanup only. A stale defeated row is overwritten by the next spawn.
        if let Err(err) = self.storage.clear_boss(template_id) {
            tracing::warn!(template_id, error = %err, "failed to clear settled boss row");
        }

        let cooldown = self
            .catalog
            .boss(template_id)
            .map(|t| t.cooldown_secs)
            .unwrap_or(0);
        {
            let mut registry = self.lock_registry()?;
            registry.sessions.remove(template_id);
            registry
                .cooldowns
                .insert(template_id.to_string(), now + cooldown);
        }

        tracing::info!(
            template_id,
            total_damage = ledger.total_damage,
            attackers = ledger.shares.len(),
            "world boss settled"
        );
        Ok(ledger)
    }

    /// Snapshot every live session, ordered by template id
    ///
    /// Read-only roster view; sessions mid-settlement or with a poisoned
    /// lock are skipped rather than blocking the display.
    pub fn active_sessions(&self) -> Vec<BossStatus> {
        let handles: Vec<(String, Arc<BossSession>)> = match self.registry.lock() {
            Ok(registry) => registry
                .sessions
                .iter()
                .map(|(id, session)| (id.clone(), Arc::clone(session)))
                .collect(),
            Err(_) => return Vec::new(),
        };

        let mut statuses = Vec::new();
        for (template_id, session) in handles {
            if let Ok(state) = session.state.lock() {
                if state.settled {
                    continue;
                }
                statuses.push(BossStatus {
                    template_id,
                    name: state.boss.name.clone(),
                    level: state.level,
                    hp: state.boss.stats.hp,
                    hp_max: state.boss.stats.hp_max,
                    attackers: state.contributions.len(),
                    spawned_at: state.spawned_at,
                });
            }
        }
        statuses.sort_by(|a, b| a.template_id.cmp(&b.template_id));
        statuses
    }
}
