//! Persistence boundary
//!
//! The engine never talks to a database directly; it goes through these
//! traits. The conditional hit point decrement is the authoritative defense
//! against lost updates when more than one process shares the store; the
//! coordinator's in-process lock only serializes callers within one process.
//!
//! `MemoryStore` is the bundled single-process implementation, used by the
//! demo binary and the test suite.

use std::sync::{Mutex, MutexGuard};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::worldboss::RewardLedger;

/// Persistence failures, retryable by the calling layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage read failed: {reason}")]
    ReadFailed { reason: String },

    #[error("storage write failed: {reason}")]
    WriteFailed { reason: String },
}

/// World boss persistence operations
pub trait Storage: Send + Sync {
    /// Create the persisted row for a freshly spawned boss
    fn insert_boss(&self, template_id: &str, hp: i64) -> Result<(), StorageError>;

    /// Conditionally subtract damage from a boss row
    ///
    /// Applies the decrement only while the boss is still above zero and
    /// returns the remaining hit points. `None` means the row is missing or
    /// the boss was already finished; nothing is applied in that case.
    fn decrement_boss_hp(&self, template_id: &str, amount: i64)
    -> Result<Option<i64>, StorageError>;

    /// Accumulate damage attributed to one attacker (append-only)
    fn record_contribution(
        &self,
        template_id: &str,
        attacker_id: &str,
        amount: i64,
    ) -> Result<(), StorageError>;

    /// Apply a settlement ledger to player records as one batch
    ///
    /// Update-only: a share naming an id with no player record is skipped.
    /// Settlement never creates roster rows.
    fn apply_rewards(&self, ledger: &RewardLedger) -> Result<(), StorageError>;

    /// Drop the boss row and its recorded contributions
    fn clear_boss(&self, template_id: &str) -> Result<(), StorageError>;
}

/// Read access to the player roster, for boss scaling
pub trait PlayerDirectory: Send + Sync {
    /// Levels of the top `count` players, strongest first
    fn top_levels(&self, count: usize) -> Result<Vec<u32>, StorageError>;
}

impl<S: Storage + ?Sized> Storage for std::sync::Arc<S> {
    fn insert_boss(&self, template_id: &str, hp: i64) -> Result<(), StorageError> {
        (**self).insert_boss(template_id, hp)
    }

    fn decrement_boss_hp(
        &self,
        template_id: &str,
        amount: i64,
    ) -> Result<Option<i64>, StorageError> {
        (**self).decrement_boss_hp(template_id, amount)
    }

    fn record_contribution(
        &self,
        template_id: &str,
        attacker_id: &str,
        amount: i64,
    ) -> Result<(), StorageError> {
        (**self).record_contribution(template_id, attacker_id, amount)
    }

    fn apply_rewards(&self, ledger: &RewardLedger) -> Result<(), StorageError> {
        (**self).apply_rewards(ledger)
    }

    fn clear_boss(&self, template_id: &str) -> Result<(), StorageError> {
        (**self).clear_boss(template_id)
    }
}

impl<D: PlayerDirectory + ?Sized> PlayerDirectory for std::sync::Arc<D> {
    fn top_levels(&self, count: usize) -> Result<Vec<u32>, StorageError> {
        (**self).top_levels(count)
    }
}

/// One persisted player record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub level: u32,
    pub gold: i64,
    pub experience: i64,
    #[serde(default)]
    pub items: HashMap<String, u32>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    boss_hp: HashMap<String, i64>,
    contributions: HashMap<(String, String), i64>,
    players: HashMap<String, PlayerRecord>,
}

/// In-memory store backing tests and the demo binary
///
/// All state sits behind one lock, which doubles as the transaction
/// boundary: a reward batch is applied while no other caller can observe it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, StorageError> {
        self.inner.lock().map_err(|_| StorageError::WriteFailed {
            reason: "store lock poisoned".to_string(),
        })
    }

    /// Create a player record if missing and set its level
    pub fn upsert_player(&self, player_id: &str, level: u32) -> Result<(), StorageError> {
        let mut inner = self.lock()?;
        let record = inner.players.entry(player_id.to_string()).or_default();
        record.level = level;
        Ok(())
    }

    /// Snapshot of one player record
    pub fn player(&self, player_id: &str) -> Result<Option<PlayerRecord>, StorageError> {
        Ok(self.lock()?.players.get(player_id).cloned())
    }

    /// Accumulated damage one attacker has dealt to one boss
    pub fn contribution(&self, template_id: &str, attacker_id: &str) -> Result<i64, StorageError> {
        let key = (template_id.to_string(), attacker_id.to_string());
        Ok(self.lock()?.contributions.get(&key).copied().unwrap_or(0))
    }

    /// Persisted hit points of a boss row, if it exists
    pub fn boss_hp(&self, template_id: &str) -> Result<Option<i64>, StorageError> {
        Ok(self.lock()?.boss_hp.get(template_id).copied())
    }
}

impl Storage for MemoryStore {
    fn insert_boss(&self, template_id: &str, hp: i64) -> Result<(), StorageError> {
        self.lock()?.boss_hp.insert(template_id.to_string(), hp);
        Ok(())
    }

    fn decrement_boss_hp(
        &self,
        template_id: &str,
        amount: i64,
    ) -> Result<Option<i64>, StorageError> {
        let mut inner = self.lock()?;
        match inner.boss_hp.get_mut(template_id) {
            Some(hp) if *hp > 0 => {
                *hp = (*hp - amount).max(0);
                Ok(Some(*hp))
            }
            _ => Ok(None),
        }
    }

    fn record_contribution(
        &self,
        template_id: &str,
        attacker_id: &str,
        amount: i64,
    ) -> Result<(), StorageError> {
        let key = (template_id.to_string(), attacker_id.to_string());
        *self.lock()?.contributions.entry(key).or_insert(0) += amount;
        Ok(())
    }

    fn apply_rewards(&self, ledger: &RewardLedger) -> Result<(), StorageError> {
        let mut inner = self.lock()?;
        for share in &ledger.shares {
            // settlement must not invent roster rows, scaling averages every level
            let Some(record) = inner.players.get_mut(&share.attacker_id) else {
                continue;
            };
            record.gold += share.gold;
            record.experience += share.experience;
            for (item_id, amount) in &share.items {
                *record.items.entry(item_id.clone()).or_insert(0) += amount;
            }
        }
        Ok(())
    }

    fn clear_boss(&self, template_id: &str) -> Result<(), StorageError> {
        let mut inner = self.lock()?;
        inner.boss_hp.remove(template_id);
        inner.contributions.retain(|(boss, _), _| boss != template_id);
        Ok(())
    }
}

impl PlayerDirectory for MemoryStore {
    fn top_levels(&self, count: usize) -> Result<Vec<u32>, StorageError> {
        let inner = self.lock()?;
        let mut levels: Vec<u32> = inner.players.values().map(|p| p.level).collect();
        levels.sort_unstable_by(|a, b| b.cmp(a));
        levels.truncate(count);
        Ok(levels)
    }
}
