//! `maw32-gen`: builds the three memo files `maw32-trail` consumes, sampling
//! every non-linear primitive's difference distribution at a given log2
//! threshold and writing `key-file-<p>.bin`/`add-file-<p>.bin`/
//! `maj-file-<p>.bin`.
//!
//! Entry point counterpart of
//! `examples/original_source/src/trail_gen/maw32_trail_gen.cpp`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use maw32_trail::memo::{self, MemoStore};

/// Generate MAW32 differential-propagation memo files at a log2 threshold.
#[derive(Debug, Parser)]
#[command(name = "maw32-gen", version, about)]
struct Args {
    /// Log2 threshold probability (must be negative).
    #[arg(value_name = "THRESHOLD")]
    threshold: f64,

    /// Directory to write the three memo files to.
    #[arg(short = 'o', long = "out-dir", default_value = ".")]
    out_dir: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let args = Args::parse();
    if args.threshold >= 0.0 {
        eprintln!(
            "Error: threshold probability must be negative, got {}",
            args.threshold
        );
        return ExitCode::FAILURE;
    }

    tracing::info!(threshold = args.threshold, "Generating memo tables");

    let mut rng = StdRng::from_rng(rand::thread_rng()).expect("OS entropy source unavailable");
    let store = MemoStore::generate(args.threshold, &mut rng);

    let key_path = args.out_dir.join(memo::key_filename(args.threshold));
    let add_path = args.out_dir.join(memo::add_filename(args.threshold));
    let maj_path = args.out_dir.join(memo::maj_filename(args.threshold));

    if let Err(err) = store.write_key_file(&key_path) {
        eprintln!("Error: {err}");
        return ExitCode::FAILURE;
    }
    tracing::info!(path = %key_path.display(), entries = store.key_len(), "Wrote keymix memo");

    if let Err(err) = store.write_add_file(&add_path) {
        eprintln!("Error: {err}");
        return ExitCode::FAILURE;
    }
    tracing::info!(path = %add_path.display(), entries = store.add_len(), "Wrote add memo");

    if let Err(err) = store.write_maj_file(&maj_path) {
        eprintln!("Error: {err}");
        return ExitCode::FAILURE;
    }
    tracing::info!(path = %maj_path.display(), entries = store.maj_len(), "Wrote maj memo");

    tracing::info!("Done!");
    ExitCode::SUCCESS
}
