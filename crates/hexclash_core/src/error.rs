//! Error types for the combat core.
//!
//! Nothing inside a tick ever fails: combat always terminates with a
//! result. These errors cover the API edges (misuse of the engine
//! lifecycle, data parsing, snapshots and replay files).

use thiserror::Error;

use crate::battle::BattlePhase;

/// Result type alias using [`BattleError`].
pub type Result<T> = std::result::Result<T, BattleError>;

/// Top-level error type for the combat core.
#[derive(Debug, Error)]
pub enum BattleError {
    /// An engine operation was requested in the wrong lifecycle phase.
    #[error("Operation '{operation}' is not valid while the battle is {phase:?}")]
    InvalidPhase {
        /// Name of the rejected operation.
        operation: &'static str,
        /// Phase the engine was in.
        phase: BattlePhase,
    },

    /// Unknown side identifier passed to the orchestrator.
    #[error("Unknown side: {0}")]
    UnknownSide(u32),

    /// A side was registered twice.
    #[error("Side {0} is already registered")]
    DuplicateSide(u32),

    /// A round was started while another one is still in progress.
    #[error("A round is already in progress")]
    RoundInProgress,

    /// An external match result arrived that the round was not waiting for.
    #[error("No external match is pending for {home} vs {away}")]
    NoExternalPending {
        /// Home side of the reported match.
        home: u32,
        /// Away side of the reported match.
        away: u32,
    },

    /// Data file parsing error.
    #[error("Failed to parse data '{source_name}': {message}")]
    DataParseError {
        /// Name of the data source that failed to parse.
        source_name: String,
        /// Error message.
        message: String,
    },

    /// Snapshot or replay (de)serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Replay file IO failed.
    #[error("Replay IO failed: {0}")]
    Io(#[from] std::io::Error),

    /// Replay format version does not match this build.
    #[error("Replay version mismatch: expected {expected}, got {found}")]
    ReplayVersion {
        /// Version this build writes.
        expected: u32,
        /// Version found in the file.
        found: u32,
    },
}
