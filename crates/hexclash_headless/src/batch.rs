//! Batch battle runner for balance testing.
//!
//! Runs many seeded battles of one scenario in parallel using rayon and
//! aggregates outcome statistics.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use hexclash_core::battle::{Battle, EndReason};
use hexclash_core::replay::drive_to_end;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::protocol::{end_reason_name, OutcomeRecord, ResultRecord};
use crate::scenario::{DuelInputs, Scenario, ScenarioError};

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Scenario name, for the report
    pub scenario: String,
    /// Number of battles to run
    pub battle_count: u32,
    /// Maximum parallel battles (0 = use rayon default)
    pub parallel_battles: u32,
    /// Output directory for results
    pub output_dir: PathBuf,
    /// Starting seed for deterministic runs
    pub seed_start: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: "duel".to_string(),
            battle_count: 100,
            parallel_battles: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario
    pub fn new(scenario: &str, battle_count: u32) -> Self {
        Self {
            scenario: scenario.to_string(),
            battle_count,
            ..Default::default()
        }
    }

    /// Set output directory
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set seed start
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }
}

/// Outcome of one battle in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleSummary {
    /// Battle index within the batch
    pub index: u32,
    /// Seed used
    pub seed: u64,
    /// Final result
    pub result: ResultRecord,
    /// State hash at the end
    pub final_hash: u64,
}

/// Aggregate statistics over a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Battles that finished
    pub total: u32,
    /// Home victories
    pub home_wins: u32,
    /// Away victories
    pub away_wins: u32,
    /// Draws
    pub draws: u32,
    /// Battles that hit the tick limit
    pub timeouts: u32,
    /// Mean battle length in ticks
    pub average_ticks: f64,
    /// Mean survivors on the winning side, over decisive battles
    pub average_winner_survivors: f64,
}

impl BatchStats {
    /// Aggregate a set of battle summaries
    pub fn from_battles(battles: &[BattleSummary]) -> Self {
        let mut stats = Self {
            total: battles.len() as u32,
            ..Self::default()
        };
        if battles.is_empty() {
            return stats;
        }

        let mut ticks = 0u64;
        let mut winner_survivors = 0u64;
        for battle in battles {
            let result = &battle.result;
            ticks += u64::from(result.ticks);
            match result.outcome {
                OutcomeRecord::Victory => {
                    stats.home_wins += 1;
                    winner_survivors += u64::from(result.home_survivors);
                }
                OutcomeRecord::Defeat => {
                    stats.away_wins += 1;
                    winner_survivors += u64::from(result.away_survivors);
                }
                OutcomeRecord::Draw => stats.draws += 1,
            }
            if result.end_reason == end_reason_name(EndReason::Timeout) {
                stats.timeouts += 1;
            }
        }

        stats.average_ticks = ticks as f64 / battles.len() as f64;
        let decisive = stats.home_wins + stats.away_wins;
        if decisive > 0 {
            stats.average_winner_survivors = winner_survivors as f64 / f64::from(decisive);
        }
        stats
    }

    /// Home win rate over all battles
    pub fn home_win_rate(&self) -> f64 {
        f64::from(self.home_wins) / f64::from(self.total.max(1))
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual battle summaries, in index order
    pub battles: Vec<BattleSummary>,
    /// Aggregate statistics
    pub stats: BatchStats,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &std::path::Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Error during batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Battle index
    pub battle_index: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Run a single battle to completion.
fn run_single_battle(
    scenario: &Scenario,
    inputs: &DuelInputs,
    index: u32,
    seed: u64,
) -> Result<BattleSummary, String> {
    let mut battle = Battle::new(scenario.config.clone(), seed);
    let mut events = battle
        .start_combat(
            &inputs.home,
            &inputs.away,
            &inputs.home_crests,
            &inputs.away_crests,
        )
        .map_err(|e| e.to_string())?;
    let step = scenario.config.tick_length();
    drive_to_end(&mut battle, step, &mut events).map_err(|e| e.to_string())?;

    let result = battle
        .result()
        .ok_or_else(|| "battle ended without a result".to_string())?;
    Ok(BattleSummary {
        index,
        seed,
        result: result.into(),
        final_hash: battle.state_hash(),
    })
}

/// Run a batch of battles
pub fn run_batch(scenario: &Scenario, config: BatchConfig) -> Result<BatchResults, ScenarioError> {
    let inputs = scenario.duel_inputs()?;
    let start = Instant::now();
    let completed = AtomicU32::new(0);

    info!(
        "Starting batch run: {} battles of '{}'",
        config.battle_count, config.scenario
    );

    // Configure thread pool if specified
    if config.parallel_battles > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_battles as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let results: Vec<Result<BattleSummary, BatchError>> = (0..config.battle_count)
        .into_par_iter()
        .map(|i| {
            let seed = config.seed_start.wrapping_add(u64::from(i));
            match run_single_battle(scenario, &inputs, i, seed) {
                Ok(summary) => {
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % 100 == 0 {
                        debug!("Progress: {}/{}", done, config.battle_count);
                    }
                    Ok(summary)
                }
                Err(message) => {
                    warn!("Battle {} failed: {}", i, message);
                    Err(BatchError {
                        battle_index: i,
                        seed,
                        message,
                    })
                }
            }
        })
        .collect();

    let (battles, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let battles: Vec<BattleSummary> = battles.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let stats = BatchStats::from_battles(&battles);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} battles in {:.2}s ({:.1}% home wins)",
        battles.len(),
        duration_seconds,
        stats.home_win_rate() * 100.0
    );

    Ok(BatchResults {
        config,
        battles,
        stats,
        duration_seconds,
        errors,
    })
}

/// Verify determinism by running the same seed multiple times
pub fn verify_determinism(scenario: &Scenario, seed: u64, runs: u32) -> Result<bool, ScenarioError> {
    let inputs = scenario.duel_inputs()?;
    let summaries: Vec<Result<BattleSummary, String>> = (0..runs)
        .map(|_| run_single_battle(scenario, &inputs, 0, seed))
        .collect();

    let Some(Ok(first)) = summaries.first() else {
        return Ok(runs == 0);
    };
    Ok(summaries.iter().all(|s| s.as_ref().is_ok_and(|s| s == first)))
}
