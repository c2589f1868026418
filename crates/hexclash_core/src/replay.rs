//! Replay records for independent verification.
//!
//! A battle has no commands once it starts, so a replay is just the
//! inputs (config, seed, rosters, crests), the clock step the recorder
//! advanced by, and the final tick and state hash. A second observer can
//! re-run those inputs and check it reaches the same hash.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::battle::{Battle, BattlePhase, CombatResult};
use crate::config::BattleConfig;
use crate::data::{Crest, Roster};
use crate::error::{BattleError, Result};
use crate::events::BattleEvent;
use crate::math::{fixed_serde, Fixed};

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// Upper bound on `advance` calls when driving a battle to completion.
///
/// Covers `max_ticks` plus the startup delay for any sane step.
const MAX_DRIVE_CALLS: u32 = 1_000_000;

/// Everything needed to re-run a battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleReplay {
    /// Replay format version.
    pub version: u32,
    /// Free-form label, such as a scenario name.
    pub label: String,
    /// Tunables.
    pub config: BattleConfig,
    /// RNG seed.
    pub seed: u64,
    /// Home roster.
    pub home: Roster,
    /// Away roster.
    pub away: Roster,
    /// Home crests.
    pub home_crests: Vec<Crest>,
    /// Away crests.
    pub away_crests: Vec<Crest>,
    /// Seconds passed to each `advance` call.
    #[serde(with = "fixed_serde")]
    pub step: Fixed,
    /// Tick at which the battle ended.
    pub final_tick: u32,
    /// State hash at the end.
    pub final_hash: u64,
    /// Recorded result.
    pub result: Option<CombatResult>,
}

impl BattleReplay {
    /// Create an unfinished replay for the given inputs.
    ///
    /// Uses one tick per `advance` call.
    #[must_use]
    pub fn new(
        label: impl Into<String>,
        config: BattleConfig,
        seed: u64,
        home: Roster,
        away: Roster,
    ) -> Self {
        let step = config.tick_length();
        Self {
            version: REPLAY_VERSION,
            label: label.into(),
            config,
            seed,
            home,
            away,
            home_crests: Vec::new(),
            away_crests: Vec::new(),
            step,
            final_tick: 0,
            final_hash: 0,
            result: None,
        }
    }

    /// Set team-wide crests.
    #[must_use]
    pub fn with_crests(mut self, home_crests: Vec<Crest>, away_crests: Vec<Crest>) -> Self {
        self.home_crests = home_crests;
        self.away_crests = away_crests;
        self
    }

    /// Set the clock step.
    #[must_use]
    pub fn with_step(mut self, step: Fixed) -> Self {
        self.step = step;
        self
    }

    /// Build a started battle from the recorded inputs.
    ///
    /// # Errors
    ///
    /// Propagates [`Battle::start_combat`] errors.
    pub fn restore_initial_state(&self) -> Result<(Battle, Vec<BattleEvent>)> {
        let mut battle = Battle::new(self.config.clone(), self.seed);
        let events =
            battle.start_combat(&self.home, &self.away, &self.home_crests, &self.away_crests)?;
        Ok((battle, events))
    }

    /// Run the battle to its end, fill in the final tick, hash and
    /// result, and return every event emitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the battle cannot be started or does not end.
    pub fn record(&mut self) -> Result<Vec<BattleEvent>> {
        let (mut battle, mut events) = self.restore_initial_state()?;
        drive_to_end(&mut battle, self.step, &mut events)?;
        self.final_tick = battle.tick();
        self.final_hash = battle.state_hash();
        self.result = battle.result().cloned();
        Ok(events)
    }

    /// Re-run the inputs and compare against the recorded tick and hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the battle cannot be started or does not end.
    pub fn verify(&self) -> Result<bool> {
        let (mut battle, mut events) = self.restore_initial_state()?;
        drive_to_end(&mut battle, self.step, &mut events)?;
        Ok(battle.tick() == self.final_tick && battle.state_hash() == self.final_hash)
    }

    /// Save the replay to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file IO fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| BattleError::Serialization(format!("Failed to serialize replay: {e}")))?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Load a replay from a file.
    ///
    /// # Errors
    /// Returns an error if file IO or deserialization fails, or the
    /// version does not match.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let replay: Self = bincode::deserialize(&bytes)
            .map_err(|e| BattleError::Serialization(format!("Failed to deserialize replay: {e}")))?;
        if replay.version != REPLAY_VERSION {
            return Err(BattleError::ReplayVersion {
                expected: REPLAY_VERSION,
                found: replay.version,
            });
        }
        Ok(replay)
    }
}

/// Advance `battle` by `step` until it ends.
///
/// # Errors
///
/// Returns [`BattleError::InvalidPhase`] if `step` is not positive or the
/// battle is still running after [`MAX_DRIVE_CALLS`] calls.
pub fn drive_to_end(battle: &mut Battle, step: Fixed, events: &mut Vec<BattleEvent>) -> Result<()> {
    if step > Fixed::ZERO {
        for _ in 0..MAX_DRIVE_CALLS {
            if battle.phase() == BattlePhase::Ended {
                return Ok(());
            }
            events.extend(battle.advance(step));
        }
    }
    if battle.phase() == BattlePhase::Ended {
        Ok(())
    } else {
        Err(BattleError::InvalidPhase {
            operation: "drive_to_end",
            phase: battle.phase(),
        })
    }
}
