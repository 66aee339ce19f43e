//! rift-core: Encounter and combat engine for a chat-driven RPG
//!
//! This crate contains the complete game logic with no I/O dependencies:
//! tag-based encounter generation, procedural dungeons, the shared combat
//! resolver and the concurrent world boss coordinator. Persistence and the
//! chat surface are injected collaborators, which keeps everything here
//! deterministic and testable.

pub mod catalog;
pub mod combat;
pub mod combatant;
pub mod dungeon;
pub mod errors;
pub mod generate;
pub mod storage;
pub mod worldboss;

mod rng;
mod tuning;

pub use rng::GameRng;
pub use tuning::Tuning;
