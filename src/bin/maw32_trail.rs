//! `maw32-trail`: the differential trail search driver. Loads memo tables,
//! spawns a worker pool that generates viable candidate differences, and
//! either streams them raw (`-i`) or evolves them through a genetic pool.
//!
//! Entry point counterpart of `examples/original_source/src/trail/main.cpp`.

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use maw32_trail::config::{Args, Config};
use maw32_trail::driver::Pool;
use maw32_trail::memo::MemoStore;
use maw32_trail::worker;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let args = Args::parse();
    let config = match Config::try_from_args(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };

    run(config)
}

fn run(config: Config) -> ExitCode {
    tracing::info!("Initializing...");
    tracing::info!(threads = config.threads, "Threads");
    tracing::info!(rounds = config.rounds, "Rounds/16");
    tracing::info!(threshold = config.threshold, "Threshold probability (log2)");
    tracing::info!(random_only = config.random_only, "Random only");
    tracing::info!(pool_size = config.pool_size, "Pool size");
    tracing::info!(
        immigration_rate = config.immigration_rate,
        "Immigration rate"
    );

    let (memo, warnings) = MemoStore::load(&config.memo_dir, config.threshold);
    for warning in &warnings {
        tracing::warn!(%warning, "failed to load memo file, falling back to on-the-fly sampling");
    }
    tracing::info!(
        key_entries = memo.key_len(),
        add_entries = memo.add_len(),
        maj_entries = memo.maj_len(),
        "Memo tables loaded"
    );

    if config.dry_run {
        return ExitCode::SUCCESS;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        if let Err(err) = ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst)) {
            tracing::warn!(%err, "could not install Ctrl-C handler; use SIGKILL to stop");
        }
    }

    let memo = Arc::new(memo);
    let (queue, _handles) = worker::spawn(
        config.threads,
        config.rounds,
        config.threshold,
        Arc::clone(&memo),
        Arc::clone(&shutdown),
    );

    if config.random_only {
        while !shutdown.load(Ordering::Relaxed) {
            match queue.recv() {
                Ok(gene) => tracing::info!(
                    diff = %gene.diff.iter().map(|b| format!("{b:02x}")).collect::<String>(),
                    fitness = gene.fitness(),
                    "Immigration"
                ),
                Err(_) => break,
            }
        }
        return ExitCode::SUCCESS;
    }

    tracing::info!("Beginning optimization");
    let mut pool = Pool::new(config.pool_size, config.immigration_rate);
    pool.fill_initial(&queue);

    let mut driver_rng =
        StdRng::from_rng(rand::thread_rng()).expect("OS entropy source unavailable");
    let mut generation: u64 = 1;
    while !shutdown.load(Ordering::Relaxed) {
        pool.breed_generation(
            &mut driver_rng,
            &queue,
            config.rounds,
            config.threshold,
            &memo,
        );
        tracing::info!(generation, "Population bred.");
        generation += 1;
    }

    ExitCode::SUCCESS
}
