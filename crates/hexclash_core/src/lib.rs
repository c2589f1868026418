//! # Hexclash Core
//!
//! Deterministic combat core for a hex-grid auto-battler.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No network transport
//! - No system randomness (each battle owns a seeded RNG)
//! - No floating-point math (uses fixed-point)
//!
//! The only IO is saving and loading replay files.
//!
//! This separation enables:
//! - Spectators verifying a battle from its seed and inputs
//! - Headless batch simulation
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`hex`] - Hex distance, neighbours and pathfinding
//! - [`data`] - Unit templates, abilities, items, crests, rosters
//! - [`unit`] - Mutable per-unit combat state
//! - [`combat`] - Damage and mitigation formulas
//! - [`abilities`] - Ability target selection and casting
//! - [`battle`] - Single-match tick engine
//! - [`orchestrator`] - Many matches per round, health pools
//! - [`replay`] - Replay records and verification
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod abilities;
pub mod battle;
pub mod combat;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod hex;
pub mod math;
pub mod orchestrator;
pub mod replay;
pub mod unit;

pub use error::{BattleError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::battle::{Battle, BattlePhase, CombatResult, EndReason, Outcome};
    pub use crate::combat::DamageCategory;
    pub use crate::config::BattleConfig;
    pub use crate::data::{
        Ability, AbilityEffect, Crest, ItemModifier, Roster, RosterSlot, RosterUnit, StatDelta,
        TargetRule, UnitTemplate,
    };
    pub use crate::error::{BattleError, Result};
    pub use crate::events::{BattleEvent, EventSink, MatchId};
    pub use crate::hex::HexCoord;
    pub use crate::math::Fixed;
    pub use crate::orchestrator::{MatchOrchestrator, OrchestratorEvent, SideId};
    pub use crate::replay::BattleReplay;
    pub use crate::unit::{CombatUnit, Team, UnitId};
}
