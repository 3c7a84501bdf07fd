//! The genetic driver: genes (candidate input differences annotated with
//! propagation results), fitness-weighted selection, crossover, and
//! mutation.
//!
//! Transliterated from the `gene_t`/`is_alive`/`kill_gene`/`get_fitness`/
//! `dice`/`cross`/`make_input_diff` family in
//! `examples/original_source/src/trail/main.cpp`, generalized from its
//! fixed globals into parameters threaded through a pool owned by the
//! caller.

use rand::Rng;

use crate::memo::MemoStore;
use crate::propagate::{LocalCache, PropagationStats};
use crate::viability::is_viable_diff;

/// The dense region of the 8-byte diff: only these bits ever mutate or
/// cross over. `main.cpp` zeroes the first four words of `gene_t.diff` in
/// `make_input_diff` and restricts `bit_idx`/`mid` to `32 + (gen() % 32)`,
/// i.e. bits 32..64.
const DENSE_BIT_LO: usize = 32;
const DENSE_BIT_HI: usize = 64;

/// A candidate 8-byte input difference together with the outcome of
/// propagating it. A gene with `total_trails == 0` is "dead" — either never
/// propagated or propagated to a dead end — and contributes nothing to
/// breeding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Gene {
    pub diff: [u8; 8],
    pub stats: PropagationStats,
}

impl Gene {
    pub fn is_alive(&self) -> bool {
        self.stats.total_trails > 0
    }

    pub fn kill(&mut self) {
        *self = Gene::default();
    }

    /// Zero for a dead gene, otherwise the fraction of trails that reached
    /// an all-zero output difference. Matches `get_fitness` exactly.
    pub fn fitness(&self) -> f64 {
        if self.is_alive() {
            self.stats.fitness()
        } else {
            0.0
        }
    }
}

/// Pick a pool index weighted by fitness: roll a uniform value in `[0,
/// total_fitness)` and walk the pool subtracting each living gene's fitness
/// until the running total goes non-positive. Ported from `dice`.
///
/// Returns `None` if every gene in `pool` is dead (total fitness is zero).
pub fn dice(rng: &mut impl Rng, pool: &[Gene]) -> Option<usize> {
    let total_weight: f64 = pool.iter().map(Gene::fitness).sum();
    if total_weight <= 0.0 {
        return None;
    }
    let mut result = rng.gen::<f64>() * total_weight;
    for (idx, gene) in pool.iter().enumerate() {
        if gene.is_alive() {
            result -= gene.fitness();
            if result <= 0.0 {
                return Some(idx);
            }
        }
    }
    pool.iter().rposition(Gene::is_alive)
}

/// Midpoint crossover of two 8-byte diffs at bit offset `mid` (expected to
/// fall within the dense region). Bytes before the midpoint byte come from
/// `left`, bytes after from `right`, and the midpoint byte itself is split
/// bitwise. Ported from `cross`.
pub fn cross(left: [u8; 8], right: [u8; 8], mid: usize) -> [u8; 8] {
    const MASKS: [u8; 9] = [0x00, 0x80, 0xc0, 0xe0, 0xf0, 0xf8, 0xfc, 0xfe, 0xff];

    let byte_mid = mid / 8;
    let bit_split = mid % 8;
    let mut dest = [0u8; 8];

    dest[..byte_mid].copy_from_slice(&left[..byte_mid]);
    if bit_split != 0 {
        dest[byte_mid] =
            (left[byte_mid] & MASKS[bit_split]) | (right[byte_mid] & !MASKS[bit_split]);
        dest[byte_mid + 1..].copy_from_slice(&right[byte_mid + 1..]);
    } else {
        dest[byte_mid..].copy_from_slice(&right[byte_mid..]);
    }
    dest
}

/// Flip one random bit within the dense region of `diff`. The original's
/// formula `1 << (8 - (bit_idx % 8))` overflows a byte when `bit_idx % 8 ==
/// 0` (shifting by 8); per the corrected formula we use `1 << (7 - (bit_idx
/// % 8))`, which always shifts by 0..=7.
pub fn mutate(rng: &mut impl Rng, diff: [u8; 8]) -> [u8; 8] {
    let mut out = diff;
    let bit_idx = DENSE_BIT_LO + rng.gen_range(0..(DENSE_BIT_HI - DENSE_BIT_LO));
    out[bit_idx / 8] ^= 1 << (7 - (bit_idx % 8));
    out
}

/// Randomly draw dense-region bytes until the result passes the viability
/// filter. Ported from `make_input_diff`. `memo`/`cache` are threaded
/// through to [`is_viable_diff`] so the memo tables loaded by the caller
/// actually get used on this hot, tight-loop path, and so repeated
/// rejection-sampling attempts share cached on-the-fly DDT samples instead
/// of resampling from scratch every time.
pub(crate) fn make_input_diff(
    rng: &mut impl Rng,
    memo: &MemoStore,
    cache: &mut LocalCache,
    rounds: usize,
    threshold: f64,
) -> [u8; 8] {
    loop {
        let mut diff = [0u8; 8];
        rng.fill(&mut diff[4..]);
        if is_viable_diff(diff, memo, cache, rounds, threshold) {
            return diff;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dice_returns_none_when_pool_is_all_dead() {
        let pool = [Gene::default(); 4];
        let mut rng = rand::thread_rng();
        assert_eq!(dice(&mut rng, &pool), None);
    }

    #[test]
    fn dice_always_picks_the_sole_living_gene() {
        let mut pool = [Gene::default(); 4];
        pool[2].stats = PropagationStats {
            zero_trails: 1,
            total_trails: 2,
        };
        let mut rng = rand::thread_rng();
        assert_eq!(dice(&mut rng, &pool), Some(2));
    }

    #[test]
    fn cross_at_byte_boundary_splits_cleanly() {
        let left = [1, 2, 3, 4, 5, 6, 7, 8];
        let right = [10, 20, 30, 40, 50, 60, 70, 80];
        let result = cross(left, right, 32);
        assert_eq!(result, [1, 2, 3, 4, 50, 60, 70, 80]);
    }

    #[test]
    fn mutate_only_touches_the_dense_region() {
        let mut rng = rand::thread_rng();
        let base = [0u8; 8];
        for _ in 0..100 {
            let mutated = mutate(&mut rng, base);
            assert_eq!(&mutated[..4], &[0, 0, 0, 0]);
        }
    }
}
