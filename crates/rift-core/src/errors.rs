//! Engine error types
//!
//! Every failure here is an expected business outcome surfaced to the chat
//! layer as a one-line message; none of them abort the process.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors from encounter generation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    #[error("no such template '{template_id}'")]
    TemplateNotFound { template_id: String },
}

/// Errors from dungeon generation and traversal
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DungeonError {
    #[error("no monster templates are configured")]
    EmptyMonsterPool,

    #[error("no boss templates are configured")]
    EmptyBossPool,

    #[error("the expedition is already over")]
    ExpeditionOver,

    #[error(transparent)]
    Generate(#[from] GenerateError),
}

/// Errors from the world boss coordinator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BossError {
    #[error("no active encounter for '{template_id}'")]
    NoSuchSession { template_id: String },

    #[error("the boss has already been defeated")]
    AlreadyDefeated,

    #[error("the boss still stands, there is nothing to settle")]
    NotDefeated,

    #[error("encounter state lock poisoned")]
    StatePoisoned,

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = GenerateError::TemplateNotFound {
            template_id: "ghoul".to_string(),
        };
        assert_eq!(err.to_string(), "no such template 'ghoul'");

        let err = BossError::NoSuchSession {
            template_id: "ashen_tyrant".to_string(),
        };
        assert_eq!(err.to_string(), "no active encounter for 'ashen_tyrant'");
    }

    #[test]
    fn test_generate_error_converts() {
        let missing = GenerateError::TemplateNotFound {
            template_id: "x".to_string(),
        };
        let boss: BossError = missing.clone().into();
        assert_eq!(boss, BossError::Generate(missing.clone()));
        let dungeon: DungeonError = missing.clone().into();
        assert_eq!(dungeon, DungeonError::Generate(missing));
    }
}
