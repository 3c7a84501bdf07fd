//! The worker pool: background threads that repeatedly draw a viable input
//! difference and propagate it, feeding live genes into an unbounded
//! channel for the genetic driver to consume.
//!
//! Grounded in `slave_make_trails`/`put_next_gene`/`get_next_gene` in
//! `examples/original_source/src/trail/main.cpp`, which uses a
//! `pthread_mutex`-guarded `std::queue` plus a counting semaphore; we use
//! `crossbeam_channel`'s unbounded MPMC channel instead; see DESIGN.md.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::gene::{make_input_diff, Gene};
use crate::memo::MemoStore;
use crate::propagate::{propagate, LocalCache};

/// Spawn `worker_count` threads, each independently drawing viable
/// differences and propagating them at `rounds`/`threshold` against the
/// shared `memo`, sending every *live* result (`total_trails > 0`) to the
/// returned receiver. Workers check `shutdown` between iterations so the
/// caller can stop them without leaking threads.
///
/// Each worker seeds its own `StdRng` from OS entropy (`rand::thread_rng`),
/// never from wall-clock time or a shared seed — per `main.cpp`'s
/// `devrand()`-seeded `mt19937` per worker, but drawing from the OS CSPRNG
/// source `rand` already wires in rather than reimplementing `/dev/random`
/// access.
pub fn spawn(
    worker_count: usize,
    rounds: usize,
    threshold: f64,
    memo: Arc<MemoStore>,
    shutdown: Arc<AtomicBool>,
) -> (Receiver<Gene>, Vec<thread::JoinHandle<()>>) {
    let (tx, rx): (Sender<Gene>, Receiver<Gene>) = crossbeam_channel::unbounded();

    let handles = (0..worker_count)
        .map(|id| {
            let tx = tx.clone();
            let memo = Arc::clone(&memo);
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name(format!("maw32-worker-{id}"))
                .spawn(move || worker_loop(rounds, threshold, &memo, &shutdown, tx))
                .expect("failed to spawn worker thread")
        })
        .collect();

    (rx, handles)
}

fn worker_loop(
    rounds: usize,
    threshold: f64,
    memo: &MemoStore,
    shutdown: &AtomicBool,
    tx: Sender<Gene>,
) {
    let mut rng = StdRng::from_rng(rand::thread_rng()).expect("OS entropy source unavailable");
    // Reused across iterations: the viability filter's on-the-fly DDT
    // samples stay valid for the lifetime of the worker, not just one call.
    let mut viability_cache = LocalCache::default();
    while !shutdown.load(Ordering::Relaxed) {
        let diff = make_input_diff(&mut rng, memo, &mut viability_cache, rounds, threshold);
        let stats = match propagate(diff, rounds, threshold, memo, &mut rng) {
            Ok(stats) => stats,
            Err(err) => {
                tracing::error!(%err, "propagation invariant violated, skipping candidate");
                continue;
            }
        };
        if stats.zero_trails == 0 {
            continue;
        }
        let gene = Gene { diff, stats };
        if tx.send(gene).is_err() {
            // Receiver dropped: the driver has shut down, nothing left to do.
            break;
        }
    }
}
