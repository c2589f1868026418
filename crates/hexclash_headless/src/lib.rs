//! Headless battle runner for balance testing and CI verification.
//!
//! This crate drives the deterministic combat core without graphics:
//!
//! - **Scenario playback**: Stream one battle as JSON lines
//! - **Batch runs**: Many seeded battles in parallel, with win-rate stats
//! - **Round play**: Several sides fighting rounds through the orchestrator
//! - **Replay verification**: Check that a replay produces an identical hash
//!
//! # Protocol
//!
//! Output uses JSON lines (one JSON object per line):
//!
//! - **stdout**: Battle events and results (JSON)
//! - **stderr**: Debug logs (human-readable)
//!
//! See [`protocol`] module for the record format.
//!
//! # Example
//!
//! ```bash
//! # Stream a scenario
//! cargo run -p hexclash_headless -- run --scenario scenarios/duel.ron
//!
//! # Balance batch
//! cargo run -p hexclash_headless -- batch --scenario scenarios/duel.ron --count 1000
//!
//! # Verify a replay
//! cargo run -p hexclash_headless -- replay --file duel.replay
//! ```

pub mod batch;
pub mod protocol;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, BatchConfig, BatchResults, BatchStats};
pub use protocol::EventRecord;
pub use runner::{HeadlessConfig, HeadlessRunner, RunError};
pub use scenario::{Scenario, ScenarioError};
