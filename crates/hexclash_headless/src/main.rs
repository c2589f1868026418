//! Headless hexclash battle runner.
//!
//! This binary runs battles without graphics, streaming JSON lines on stdout.
//! Designed for balance testing, CI runs and replay verification.
//!
//! # Usage
//!
//! ```bash
//! # Stream the built-in duel
//! cargo run -p hexclash_headless
//!
//! # Stream a scenario and record a replay
//! cargo run -p hexclash_headless -- run --scenario scenarios/duel.ron --record duel.replay
//!
//! # Run batch balance test
//! cargo run -p hexclash_headless -- batch --scenario scenarios/duel.ron --count 1000 --output results/
//!
//! # Play rounds between every side of a scenario
//! cargo run -p hexclash_headless -- round --scenario scenarios/gauntlet.ron --max-rounds 20
//! ```
//!
//! Logs go to stderr. Set `RUST_LOG` to override the level.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use hexclash_core::math::Fixed;
use hexclash_core::replay::BattleReplay;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hexclash_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    runner::{HeadlessConfig, HeadlessRunner},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "hexclash_headless")]
#[command(about = "Headless auto-battler runner for balance testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream one battle as JSON lines
    Run {
        /// Scenario file to load (built-in duel if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Battle seed (scenario seed if omitted)
        #[arg(long)]
        seed: Option<u64>,

        /// Seconds per advance call (one tick if omitted)
        #[arg(long)]
        step: Option<f64>,

        /// Output a state hash after every advance call
        #[arg(long)]
        hashes: bool,

        /// Also record a replay file
        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// Run a batch of seeded battles for balance testing
    Batch {
        /// Scenario file to load (built-in duel if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of battles to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel battles (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting seed
        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Play rounds between every side of a scenario
    Round {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,

        /// Root seed (scenario seed if omitted)
        #[arg(long)]
        seed: Option<u64>,

        /// Stop after this many rounds
        #[arg(long, default_value = "30")]
        max_rounds: u32,
    },

    /// Verify determinism by running the same seed multiple times
    Verify {
        /// Scenario file to load (built-in duel if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Verify a recorded replay
    Replay {
        /// Replay file path
        #[arg(short, long)]
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            seed,
            step,
            hashes,
            record,
        }) => cmd_run(scenario.as_deref(), seed, step, hashes, record.as_deref()),
        Some(Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
        }) => cmd_batch(scenario.as_deref(), count, parallel, &output, seed),
        Some(Commands::Round {
            scenario,
            seed,
            max_rounds,
        }) => cmd_round(&scenario, seed, max_rounds),
        Some(Commands::Verify {
            scenario,
            seed,
            runs,
        }) => cmd_verify(scenario.as_deref(), seed, runs),
        Some(Commands::Replay { file }) => cmd_replay(&file),
        None => cmd_run(None, None, None, false, None),
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    tracing::error!("{message}");
    eprintln!("FATAL: {message}");
    std::process::exit(1);
}

fn load_scenario(path: Option<&Path>) -> Scenario {
    match path {
        Some(path) => {
            tracing::info!("Using scenario: {}", path.display());
            Scenario::load(path).unwrap_or_else(|e| fail(e))
        }
        None => Scenario::duel(),
    }
}

/// Stream a single battle
fn cmd_run(
    scenario: Option<&Path>,
    seed: Option<u64>,
    step: Option<f64>,
    hashes: bool,
    record: Option<&Path>,
) {
    let scenario = load_scenario(scenario);
    let seed = seed.unwrap_or(scenario.seed);
    let step = step.map(|s| {
        Fixed::checked_from_num(s).unwrap_or_else(|| fail(format!("Step {s} is out of range")))
    });

    let runner = HeadlessRunner::with_config(HeadlessConfig {
        step,
        emit_hashes: hashes,
    });

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let run = runner
        .run_battle(&scenario, seed, &mut out)
        .unwrap_or_else(|e| fail(e));
    eprintln!(
        "Outcome: {:?} after {} ticks ({} home / {} away survivors), hash {:016x}",
        run.result.outcome,
        run.result.ticks,
        run.result.home_survivors,
        run.result.away_survivors,
        run.final_hash
    );

    if let Some(path) = record {
        let replay = runner
            .record_replay(&scenario, seed)
            .unwrap_or_else(|e| fail(e));
        replay.save(path).unwrap_or_else(|e| fail(e));
        eprintln!("Replay saved to: {}", path.display());
    }
}

/// Run batch of battles for balance testing
fn cmd_batch(scenario: Option<&Path>, count: u32, parallel: u32, output: &Path, seed: u64) {
    let batch_start = Instant::now();
    let scenario = load_scenario(scenario);

    let num_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);

    tracing::info!(
        scenario = %scenario.name,
        count = count,
        parallel = parallel,
        seed = seed,
        output = %output.display(),
        cpus_available = num_cpus,
        "Batch configuration"
    );

    if let Err(e) = std::fs::create_dir_all(output) {
        fail(format!("Cannot create output directory '{}': {e}", output.display()));
    }

    let config = BatchConfig {
        scenario: scenario.name.clone(),
        battle_count: count,
        parallel_battles: parallel,
        output_dir: output.to_path_buf(),
        seed_start: seed,
    };
    let results = run_batch(&scenario, config).unwrap_or_else(|e| fail(e));

    let results_path = output.join("batch_results.json");
    if let Err(e) = results.save(&results_path) {
        fail(format!("Failed to save results: {e}"));
    }

    let stats = &results.stats;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Battles: {}", stats.total);
    if !results.errors.is_empty() {
        eprintln!("Battles FAILED: {}", results.errors.len());
        for error in results.errors.iter().take(10) {
            eprintln!(
                "  Battle {} (seed {}): {}",
                error.battle_index, error.seed, error.message
            );
        }
    }
    eprintln!("Duration: {:.2}s", batch_start.elapsed().as_secs_f64());
    eprintln!(
        "Home / away / draw: {} / {} / {} ({:.1}% home)",
        stats.home_wins,
        stats.away_wins,
        stats.draws,
        stats.home_win_rate() * 100.0
    );
    eprintln!("Timeouts: {}", stats.timeouts);
    eprintln!("Average ticks: {:.1}", stats.average_ticks);
    eprintln!(
        "Average winner survivors: {:.2}",
        stats.average_winner_survivors
    );
    eprintln!("\nResults saved to: {}", results_path.display());
}

/// Play rounds through the orchestrator
fn cmd_round(scenario: &Path, seed: Option<u64>, max_rounds: u32) {
    let scenario = load_scenario(Some(scenario));
    let seed = seed.unwrap_or(scenario.seed);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let run = HeadlessRunner::new()
        .run_rounds(&scenario, seed, max_rounds, &mut out)
        .unwrap_or_else(|e| fail(e));

    eprintln!("Rounds played: {}", run.rounds);
    for pool in &run.pools {
        eprintln!("  {:<16} {:>4}", pool.name, pool.health);
    }
}

/// Verify determinism
fn cmd_verify(scenario: Option<&Path>, seed: u64, runs: u32) {
    let scenario = load_scenario(scenario);
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario.name,
        seed,
        runs
    );

    match verify_determinism(&scenario, seed, runs) {
        Ok(true) => eprintln!("PASS: All {runs} runs produced identical results"),
        Ok(false) => fail("Non-determinism detected!"),
        Err(e) => fail(e),
    }
}

/// Verify a recorded replay
fn cmd_replay(file: &Path) {
    tracing::info!("Verifying replay: {}", file.display());

    let replay = BattleReplay::load(file).unwrap_or_else(|e| fail(format!("Failed to load replay: {e}")));

    eprintln!("Loaded replay:");
    eprintln!("  Label: {}", replay.label);
    eprintln!("  Seed: {}", replay.seed);
    eprintln!("  Final tick: {}", replay.final_tick);

    match replay.verify() {
        Ok(true) => {
            eprintln!("PASS: Replay verification successful");
            eprintln!("  Hash: {:016x}", replay.final_hash);
        }
        Ok(false) => fail("Replay produced a different hash!"),
        Err(e) => fail(format!("Error during verification: {e}")),
    }
}
