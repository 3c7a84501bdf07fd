//! Crate-wide error types. We split by how the caller is meant to react,
//! following the taxonomy in the toolkit's error-handling design: usage
//! errors are the CLI's fault and exit with status 1, memo errors are
//! non-fatal and degrade to on-the-fly sampling, and propagation errors are
//! invariant violations that should never be reachable from valid input and
//! abort the process.

use std::io;

/// A bad CLI flag or out-of-range configuration value. The caller should
/// print this alongside usage text and exit with status 1.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("threshold probability must be negative, got {0}")]
    PositiveThreshold(f64),
    #[error("round count must be between 1 and 16, got {0}")]
    RoundsOutOfRange(usize),
    #[error("pool size must be at least 16, got {0}")]
    PoolTooSmall(usize),
    #[error("immigration rate must be between 0.0 and 0.5, got {0}")]
    ImmigrationRateOutOfRange(f64),
    #[error("worker count must be at least 1, got {0}")]
    NoWorkers(usize),
}

/// A memo file could not be loaded. Non-fatal: callers log a warning and
/// fall back to on-the-fly sampling for the affected primitive.
#[derive(Debug, thiserror::Error)]
pub enum MemoError {
    #[error("could not open memo file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("could not write memo file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// A propagator invariant was violated. These indicate a bug in the caller
/// (the search driver and workers never construct invalid requests), not a
/// condition the user can fix by adjusting flags.
#[derive(Debug, thiserror::Error)]
pub enum PropagationError {
    #[error("round count {0} exceeds the maximum of 16 rounds")]
    TooManyRounds(usize),
    #[error("round count must be at least 1, got 0")]
    NoRounds,
}
