//! Parsed, validated configuration for the `maw32-trail` binary.
//!
//! `clap` produces the raw [`Args`]; [`Config::try_from_args`] applies the
//! range checks `main.cpp`'s `ASSERT` macro performs inline during flag
//! parsing (round count 1..16, negative threshold, pool size >= 16,
//! immigration rate in [0, 0.5], at least one worker thread), surfacing
//! violations as [`ConfigError`] so the binary can print them alongside
//! `--help` and exit 1.

use clap::Parser;

use crate::error::ConfigError;

/// Differential trail search driver for MAW32.
#[derive(Debug, Parser)]
#[command(name = "maw32-trail", version, about)]
pub struct Args {
    /// Dry run: load memo tables and print configuration, then exit.
    #[arg(short = 'd', long = "dry-run")]
    pub dry_run: bool,

    /// Random only: stream raw viable genes, skipping the genetic loop.
    #[arg(short = 'i', long = "random-only")]
    pub random_only: bool,

    /// Number of worker threads. Defaults to half the available CPUs.
    #[arg(short = 'n', long = "threads")]
    pub threads: Option<usize>,

    /// Log2 threshold probability (must be negative).
    #[arg(short = 'p', long = "threshold", default_value_t = -3.0)]
    pub threshold: f64,

    /// Number of rounds to propagate, 1..=16.
    #[arg(short = 'r', long = "rounds", default_value_t = 8)]
    pub rounds: usize,

    /// Gene pool size, >= 16.
    #[arg(short = 's', long = "pool-size", default_value_t = 32)]
    pub pool_size: usize,

    /// Immigration rate, in [0.0, 0.5].
    #[arg(short = 'm', long = "immigration-rate", default_value_t = 0.05)]
    pub immigration_rate: f64,

    /// Directory to load `key-file-*`/`add-file-*`/`maj-file-*` memo files from.
    #[arg(short = 'o', long = "memo-dir", default_value = ".")]
    pub memo_dir: String,
}

/// Validated configuration the rest of the crate operates on.
#[derive(Debug, Clone)]
pub struct Config {
    pub dry_run: bool,
    pub random_only: bool,
    pub threads: usize,
    pub threshold: f64,
    pub rounds: usize,
    pub pool_size: usize,
    pub immigration_rate: f64,
    pub memo_dir: String,
}

/// Half the available CPUs, rounded up, matching `main.cpp`'s
/// `ceil(sysconf(_SC_NPROCESSORS_CONF) / 2.0f)` default worker count.
fn default_thread_count() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    cpus.div_ceil(2)
}

impl Config {
    pub fn try_from_args(args: Args) -> Result<Self, ConfigError> {
        let threads = args.threads.unwrap_or_else(default_thread_count);
        if threads == 0 {
            return Err(ConfigError::NoWorkers(threads));
        }
        if args.threshold >= 0.0 {
            return Err(ConfigError::PositiveThreshold(args.threshold));
        }
        if !(1..=16).contains(&args.rounds) {
            return Err(ConfigError::RoundsOutOfRange(args.rounds));
        }
        if args.pool_size < 16 {
            return Err(ConfigError::PoolTooSmall(args.pool_size));
        }
        if !(0.0..=0.5).contains(&args.immigration_rate) {
            return Err(ConfigError::ImmigrationRateOutOfRange(
                args.immigration_rate,
            ));
        }

        Ok(Self {
            dry_run: args.dry_run,
            random_only: args.random_only,
            threads,
            threshold: args.threshold,
            rounds: args.rounds,
            pool_size: args.pool_size,
            immigration_rate: args.immigration_rate,
            memo_dir: args.memo_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            dry_run: false,
            random_only: false,
            threads: Some(4),
            threshold: -3.0,
            rounds: 8,
            pool_size: 32,
            immigration_rate: 0.05,
            memo_dir: ".".to_string(),
        }
    }

    #[test]
    fn accepts_defaults() {
        assert!(Config::try_from_args(base_args()).is_ok());
    }

    #[test]
    fn rejects_positive_threshold() {
        let mut args = base_args();
        args.threshold = 1.0;
        assert!(matches!(
            Config::try_from_args(args),
            Err(ConfigError::PositiveThreshold(_))
        ));
    }

    #[test]
    fn rejects_rounds_out_of_range() {
        let mut args = base_args();
        args.rounds = 17;
        assert!(matches!(
            Config::try_from_args(args),
            Err(ConfigError::RoundsOutOfRange(17))
        ));
    }

    #[test]
    fn rejects_small_pool() {
        let mut args = base_args();
        args.pool_size = 8;
        assert!(matches!(
            Config::try_from_args(args),
            Err(ConfigError::PoolTooSmall(8))
        ));
    }

    #[test]
    fn rejects_immigration_rate_out_of_range() {
        let mut args = base_args();
        args.immigration_rate = 0.9;
        assert!(matches!(
            Config::try_from_args(args),
            Err(ConfigError::ImmigrationRateOutOfRange(_))
        ));
    }
}
