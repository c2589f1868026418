//! Headless battle and round runners.
//!
//! Both runners stream [`EventRecord`] JSON lines to any `Write`, so the
//! binary points them at stdout and tests at a `Vec<u8>`.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use hexclash_core::battle::{Battle, BattlePhase, CombatResult};
use hexclash_core::events::{BattleEvent, MatchId};
use hexclash_core::math::Fixed;
use hexclash_core::orchestrator::{MatchOrchestrator, OrchestratorEvent, SideId};
use hexclash_core::replay::BattleReplay;
use hexclash_core::BattleError;
use thiserror::Error;
use tracing::{debug, info};

use crate::protocol::{EventRecord, PoolRecord};
use crate::scenario::{Scenario, ScenarioError};

/// Error type for headless runs.
#[derive(Error, Debug)]
pub enum RunError {
    /// Scenario could not be loaded or resolved.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// Core engine rejected an operation.
    #[error(transparent)]
    Battle(#[from] BattleError),
    /// Writing output failed.
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
    /// The clock step must move time forward.
    #[error("Step must be positive, got {0}")]
    InvalidStep(Fixed),
}

/// Headless runner configuration.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Seconds passed to each `advance` call.
    pub step: Option<Fixed>,
    /// Emit a state hash line after every `advance` call.
    pub emit_hashes: bool,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            step: None,
            emit_hashes: false,
        }
    }
}

impl HeadlessConfig {
    fn step_for(&self, scenario: &Scenario) -> Result<Fixed, RunError> {
        let step = self.step.unwrap_or_else(|| scenario.config.tick_length());
        if step <= Fixed::ZERO {
            return Err(RunError::InvalidStep(step));
        }
        Ok(step)
    }
}

/// Result of one streamed battle.
#[derive(Debug, Clone)]
pub struct BattleRun {
    /// Final result.
    pub result: CombatResult,
    /// State hash at the end.
    pub final_hash: u64,
    /// Number of events streamed.
    pub events: usize,
}

/// Result of a multi-round run.
#[derive(Debug, Clone)]
pub struct RoundsRun {
    /// Rounds played.
    pub rounds: u32,
    /// Sides with health left, in id order.
    pub survivors: Vec<SideId>,
    /// Final pools, in side order.
    pub pools: Vec<PoolRecord>,
}

/// Streams scenarios as JSON lines.
#[derive(Debug, Default)]
pub struct HeadlessRunner {
    config: HeadlessConfig,
}

impl HeadlessRunner {
    /// Create a new headless runner with default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runner with custom configuration.
    pub fn with_config(config: HeadlessConfig) -> Self {
        Self { config }
    }

    /// Run the first two sides of `scenario` against each other.
    pub fn run_battle<W: Write>(
        &self,
        scenario: &Scenario,
        seed: u64,
        out: &mut W,
    ) -> Result<BattleRun, RunError> {
        let step = self.config.step_for(scenario)?;
        let inputs = scenario.duel_inputs()?;
        let match_id = MatchId(0);

        out.write_all(EventRecord::ready(&scenario.name, seed).to_json_line().as_bytes())?;

        let mut battle = Battle::new(scenario.config.clone(), seed);
        let started = battle.start_combat(
            &inputs.home,
            &inputs.away,
            &inputs.home_crests,
            &inputs.away_crests,
        )?;
        let mut count = write_events(out, match_id, &started)?;

        while battle.phase() != BattlePhase::Ended {
            let events = battle.advance(step);
            count += write_events(out, match_id, &events)?;
            if self.config.emit_hashes {
                let record = EventRecord::StateHash {
                    match_id: match_id.0,
                    tick: battle.tick(),
                    hash: battle.state_hash(),
                };
                out.write_all(record.to_json_line().as_bytes())?;
            }
        }
        out.flush()?;

        let result = battle
            .result()
            .cloned()
            .ok_or(BattleError::InvalidPhase {
                operation: "run_battle",
                phase: battle.phase(),
            })?;
        info!(
            scenario = %scenario.name,
            seed,
            outcome = ?result.outcome,
            ticks = result.ticks,
            events = count,
            "Battle finished"
        );
        Ok(BattleRun {
            result,
            final_hash: battle.state_hash(),
            events: count,
        })
    }

    /// Record a replay of the scenario's first two sides.
    pub fn record_replay(&self, scenario: &Scenario, seed: u64) -> Result<BattleReplay, RunError> {
        let step = self.config.step_for(scenario)?;
        let inputs = scenario.duel_inputs()?;
        let mut replay = BattleReplay::new(
            scenario.name.clone(),
            scenario.config.clone(),
            seed,
            inputs.home,
            inputs.away,
        )
        .with_crests(inputs.home_crests, inputs.away_crests)
        .with_step(step);
        replay.record()?;
        Ok(replay)
    }

    /// Play rounds between every side until one is left or `max_rounds`
    /// is reached.
    ///
    /// Each round pairs the surviving sides in rotating order; with an odd
    /// count the last side sits the round out.
    pub fn run_rounds<W: Write>(
        &self,
        scenario: &Scenario,
        seed: u64,
        max_rounds: u32,
        out: &mut W,
    ) -> Result<RoundsRun, RunError> {
        let step = self.config.step_for(scenario)?;
        scenario.validate()?;

        let mut orchestrator = MatchOrchestrator::new(scenario.config.clone(), seed);
        let log: Rc<RefCell<Vec<(MatchId, BattleEvent)>>> = Rc::default();
        for (index, side) in scenario.sides.iter().enumerate() {
            let id = index as SideId;
            orchestrator.register_side(id, side.health)?;
            orchestrator.set_roster(id, scenario.roster(side)?, side.crests.clone())?;
            orchestrator.register_sink(id, Box::new(Rc::clone(&log)))?;
        }

        out.write_all(EventRecord::ready(&scenario.name, seed).to_json_line().as_bytes())?;

        while orchestrator.round() < max_rounds {
            let alive = orchestrator.alive_sides();
            if alive.len() < 2 {
                break;
            }
            let pairings = rotating_pairings(&alive, orchestrator.round());
            orchestrator.begin_round(&pairings, 0)?;
            drain_log(out, &log)?;

            loop {
                let settled = orchestrator.advance(step);
                drain_log(out, &log)?;
                if settled
                    .iter()
                    .any(|e| matches!(e, OrchestratorEvent::AllMatchesSettled { .. }))
                {
                    break;
                }
            }

            let results = orchestrator.end_round();
            debug!(round = orchestrator.round(), matches = results.len(), "Round ended");
            let record = EventRecord::RoundSettled {
                round: orchestrator.round(),
                pools: pools(scenario, &orchestrator),
            };
            out.write_all(record.to_json_line().as_bytes())?;
        }
        out.flush()?;

        let survivors = orchestrator.alive_sides();
        info!(
            scenario = %scenario.name,
            rounds = orchestrator.round(),
            survivors = survivors.len(),
            "Rounds finished"
        );
        Ok(RoundsRun {
            rounds: orchestrator.round(),
            survivors,
            pools: pools(scenario, &orchestrator),
        })
    }
}

/// Pair `alive` after rotating it by `round` places.
fn rotating_pairings(alive: &[SideId], round: u32) -> Vec<(SideId, SideId)> {
    let mut order = alive.to_vec();
    if !order.is_empty() {
        let shift = round as usize % order.len();
        order.rotate_left(shift);
    }
    order
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .collect()
}

fn pools(scenario: &Scenario, orchestrator: &MatchOrchestrator) -> Vec<PoolRecord> {
    scenario
        .sides
        .iter()
        .enumerate()
        .map(|(index, side)| PoolRecord {
            side: index as u32,
            name: side.name.clone(),
            health: orchestrator.pool(index as SideId).unwrap_or(0),
        })
        .collect()
}

fn write_events<W: Write>(
    out: &mut W,
    match_id: MatchId,
    events: &[BattleEvent],
) -> std::io::Result<usize> {
    for event in events {
        out.write_all(EventRecord::from_event(match_id, event).to_json_line().as_bytes())?;
    }
    Ok(events.len())
}

fn drain_log<W: Write>(
    out: &mut W,
    log: &Rc<RefCell<Vec<(MatchId, BattleEvent)>>>,
) -> std::io::Result<()> {
    let drained: Vec<(MatchId, BattleEvent)> = log.borrow_mut().drain(..).collect();
    for (match_id, event) in &drained {
        out.write_all(EventRecord::from_event(*match_id, event).to_json_line().as_bytes())?;
    }
    Ok(())
}
