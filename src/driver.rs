//! The genetic driver: owns the gene pool and drives it through generations
//! of fitness-weighted survivor selection, immigration, and breeding.
//!
//! Transliterated from the pool-management half of `main`'s breeding loop in
//! `examples/original_source/src/trail/main.cpp` (the half that isn't
//! `slave_make_trails`/`is_viable`/`cross`/`dice`, which already live in
//! [`crate::worker`] and [`crate::gene`]). The pool is owned exclusively by
//! the driver thread, matching the concurrency model in spec §5 — no
//! synchronization is needed here beyond the gene queue receiver.

use crossbeam_channel::Receiver;
use rand::Rng;

use crate::gene::{cross, dice, mutate, Gene};
use crate::memo::MemoStore;
use crate::propagate::propagate;

/// A fixed-size ordered array of genes, bred generation over generation.
/// Grounded in `gene_t *pool` in `main.cpp`.
pub struct Pool {
    genes: Vec<Gene>,
    immigration_rate: f64,
}

impl Pool {
    /// Build an empty pool of `size` dead genes. Callers fill it via
    /// [`Pool::fill_initial`] before breeding.
    pub fn new(size: usize, immigration_rate: f64) -> Self {
        Self {
            genes: vec![Gene::default(); size],
            immigration_rate,
        }
    }

    pub fn genes(&self) -> &[Gene] {
        &self.genes
    }

    fn half(&self) -> usize {
        self.genes.len() / 2
    }

    /// Block on the gene queue until every slot holds a live gene, logging an
    /// Immigration event for each one — the initial fill before the first
    /// generation in `main`.
    pub fn fill_initial(&mut self, queue: &Receiver<Gene>) {
        for slot in self.genes.iter_mut() {
            let gene = queue
                .recv()
                .expect("worker pool shut down before filling initial genes");
            log_gene(&gene, "Immigration");
            *slot = gene;
        }
    }

    /// Run one generation: survivor selection, immigration, breeding. Returns
    /// the best gene of the new population.
    pub fn breed_generation(
        &mut self,
        rng: &mut impl Rng,
        queue: &Receiver<Gene>,
        rounds: usize,
        threshold: f64,
        memo: &MemoStore,
    ) -> Gene {
        let half = self.half();
        let mut next = vec![Gene::default(); self.genes.len()];

        // Survivor selection: fitness-weighted sampling without replacement.
        // `dice` is re-rolled against the shrinking current pool so a
        // survivor already chosen can't be picked twice.
        let mut idx = 0;
        while idx < half {
            let survivor_idx = dice(rng, &self.genes).expect(
                "pool ran dry of living genes during survivor selection; widen the gene queue",
            );
            let survivor = self.genes[survivor_idx];
            log_gene(&survivor, "Survivor");
            next[idx] = survivor;
            self.genes[survivor_idx].kill();
            idx += 1;
        }

        // Immigration: refill up to ceil(half * (1 + immigration_rate))
        // straight from the worker queue.
        let immigration_end = ((half as f64) * (1.0 + self.immigration_rate)).ceil() as usize;
        let immigration_end = immigration_end.min(self.genes.len());
        while idx < immigration_end {
            let gene = queue
                .recv()
                .expect("worker pool shut down during immigration");
            log_gene(&gene, "Immigration");
            next[idx] = gene;
            idx += 1;
        }

        // Breeding: fill the remainder by mutation (1/4) or crossover (3/4)
        // of the survivors, retrying until the result yields a live gene.
        let survivors = next[..half].to_vec();
        let survivors = survivors.as_slice();
        while idx < next.len() {
            let mutate_this_slot = rng.gen_range(0..4) == 0;
            loop {
                let diff = if mutate_this_slot {
                    let parent = dice(rng, survivors).expect("no living survivors to mutate from");
                    mutate(rng, survivors[parent].diff)
                } else {
                    let parent1 = dice(rng, survivors).expect("no living survivors to cross");
                    let parent2 = loop {
                        let candidate = dice(rng, survivors).expect("no living survivors to cross");
                        if candidate != parent1 {
                            break candidate;
                        }
                    };
                    let mid = 32 + rng.gen_range(0..32);
                    cross(survivors[parent1].diff, survivors[parent2].diff, mid)
                };

                match propagate(diff, rounds, threshold, memo, rng) {
                    Ok(stats) if stats.zero_trails > 0 => {
                        let gene = Gene { diff, stats };
                        log_gene(&gene, "Generated");
                        next[idx] = gene;
                        break;
                    }
                    Ok(_) => continue,
                    Err(err) => {
                        tracing::error!(%err, "propagation invariant violated while breeding, retrying");
                        continue;
                    }
                }
            }
            idx += 1;
        }

        self.genes = next;
        let best = *self
            .genes
            .iter()
            .max_by(|a, b| a.fitness().partial_cmp(&b.fitness()).unwrap())
            .expect("pool is never empty");
        log_gene(&best, "Best");
        best
    }
}

fn log_gene(gene: &Gene, kind: &str) {
    let diff = gene.diff;
    tracing::info!(
        diff = %format_diff(&diff),
        fitness = gene.fitness(),
        kind,
        "{kind}"
    );
}

fn format_diff(diff: &[u8; 8]) -> String {
    diff.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagate::PropagationStats;

    fn alive_gene(diff: [u8; 8], zero: u64, total: u64) -> Gene {
        Gene {
            diff,
            stats: PropagationStats {
                zero_trails: zero,
                total_trails: total,
            },
        }
    }

    #[test]
    fn fill_initial_consumes_exactly_size_genes() {
        let (tx, rx) = crossbeam_channel::unbounded();
        for i in 0..16u8 {
            tx.send(alive_gene([0, 0, 0, 0, i, i, i, i], 1, 2)).unwrap();
        }
        let mut pool = Pool::new(16, 0.05);
        pool.fill_initial(&rx);
        assert_eq!(pool.genes().len(), 16);
        assert!(pool.genes().iter().all(Gene::is_alive));
    }

    #[test]
    fn breed_generation_never_shrinks_pool_size() {
        let (tx, rx) = crossbeam_channel::unbounded();
        for i in 0..32u8 {
            tx.send(alive_gene([0, 0, 0, 0, i, i, i, i.wrapping_add(1)], 1, 4))
                .unwrap();
        }
        let mut pool = Pool::new(16, 0.05);
        pool.fill_initial(&rx);
        // Keep the immigration half of the queue fed so the generation
        // doesn't block forever waiting on it.
        for i in 0..16u8 {
            tx.send(alive_gene([0, 0, 0, 0, i, i, i, i], 1, 4)).unwrap();
        }
        let memo = MemoStore::empty();
        let mut rng = rand::thread_rng();
        pool.breed_generation(&mut rng, &rx, 1, -1.0, &memo);
        assert_eq!(pool.genes().len(), 16);
    }
}
