//! The backtracking differential propagator: drives a single input message
//! difference through `n` rounds of the MAW32 step function, using the memo
//! tables as transition relations between rounds.
//!
//! The round is decomposed into 11 steps (0..10) matching the intermediate
//! value introductions in the compression function, exactly as
//! `examples/original_source/src/trail/maw32_trail.cpp` does it with its
//! `PROP_START`/`PROP_INTROS`/`PROP_END` macros over an explicit
//! `stack<pair<prop_state, vector<uint8_t>>>`. We translate that macro
//! machinery into an explicit frame stack and a small step-dispatch loop;
//! Rust has no `goto`, so the bailout/completion paths become an enum
//! returned out of the inner loop instead of two labels.

use std::collections::HashMap;

use rand::RngCore;

use crate::error::PropagationError;
use crate::memo::MemoStore;
use crate::primitives::{sigma0_diff, sigma1_diff};

const MAX_ROUNDS: usize = 16;
const STEPS_PER_ROUND: usize = 11;

/// A snapshot of a partial trail: which round/step we're at, the message
/// schedule differences accumulated so far, the register differences, the
/// scratch values, and the recorded per-round register-difference trail.
/// Frame identity for backtracking purposes is `(round, step)` only — see
/// [`same_frame`].
#[derive(Debug, Clone, Copy)]
struct PropState {
    round: usize,
    step: usize,
    w: [u8; MAX_ROUNDS],
    a: u8,
    b: u8,
    c: u8,
    d: u8,
    t1: u8,
    t2: u8,
    maj: u8,
    /// `trail[t]` is the `(a, b, c, d)` register difference as it stood at
    /// the end of round `t`, recorded exactly where the original sets
    /// `state.trail32[t] = state.diff` (`maw32_trail.cpp:339`).
    trail: [[u8; 4]; MAX_ROUNDS],
}

impl PropState {
    fn new(msg_diff: [u8; 8]) -> Self {
        let mut w = [0u8; MAX_ROUNDS];
        w[..8].copy_from_slice(&msg_diff);
        Self {
            round: 0,
            step: 0,
            w,
            a: 0,
            b: 0,
            c: 0,
            d: 0,
            t1: 0,
            t2: 0,
            maj: 0,
            trail: [[0u8; 4]; MAX_ROUNDS],
        }
    }

    fn registers_are_zero(&self) -> bool {
        self.a == 0 && self.b == 0 && self.c == 0 && self.d == 0
    }
}

/// Two states belong to the same backtracking frame iff their `(round,
/// step)` coordinates match. This is coarser than structural equality and is
/// how the propagator tells "freshly entering a non-linear step" (need to
/// open a new frame) apart from "continuing after a pop" (consume the next
/// alternative in the existing frame).
fn same_frame(a: &PropState, b: &PropState) -> bool {
    a.round == b.round && a.step == b.step
}

struct Frame {
    state: PropState,
    alternatives: Vec<u8>,
}

/// `(zero_trails, total_trails)` from a single propagation run. Per the
/// original's counting convention (confirmed in `maw32_trail.cpp`, lines
/// around its `BAILOUT` label), `total_trails` counts both full completions
/// at round `n` *and* bailouts from the round-`n-1` heuristic prune — an
/// "explored leaf" and a "pruned leaf" are not distinguished. See
/// DESIGN.md for why we keep this single combined counter rather than
/// splitting it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationStats {
    pub zero_trails: u64,
    pub total_trails: u64,
}

impl PropagationStats {
    pub fn fitness(&self) -> f64 {
        if self.total_trails == 0 {
            0.0
        } else {
            self.zero_trails as f64 / self.total_trails as f64
        }
    }
}

enum StepResult {
    Continue,
    Bail,
}

/// On-the-fly samples are expensive (a full 65536-sample draw per lookup);
/// a single propagation can revisit the same `(dx, dy[, dz])` key many
/// times as the backtracking stack explores sibling branches, so we cache
/// samples for the lifetime of one [`propagate`] call. Only populated when
/// the corresponding memo table is empty — a warm memo is already O(1).
/// `pub(crate)` so [`crate::viability`]'s `is_viable` recursion, which also
/// hammers `resolve_add` on the same `(dx, dy)` pairs, can reuse it instead
/// of resampling from scratch at every node.
#[derive(Default)]
pub(crate) struct LocalCache {
    add: HashMap<(u8, u8), Vec<u8>>,
    key: HashMap<(u8, u8), Vec<u8>>,
    maj: HashMap<(u8, u8, u8), Vec<u8>>,
}

/// Look up alternatives in the memo, falling back to on-the-fly sampling
/// (cached per-call in `cache`) when the table has no entry for this key (a
/// missing or truncated memo file, per the error-handling design — never
/// fatal).
pub(crate) fn resolve_add(
    memo: &MemoStore,
    cache: &mut LocalCache,
    dx: u8,
    dy: u8,
    threshold: f64,
) -> Vec<u8> {
    let memoized: Vec<u8> = memo.add_alternatives(dx, dy).collect();
    if !memoized.is_empty() || memo.add_len() != 0 {
        return memoized;
    }
    cache
        .add
        .entry((dx, dy))
        .or_insert_with(|| {
            crate::ddt::propagate_add(dx, dy, threshold)
                .into_iter()
                .map(|e| e.out)
                .collect()
        })
        .clone()
}

fn resolve_keymix(
    memo: &MemoStore,
    cache: &mut LocalCache,
    dx: u8,
    round: u8,
    threshold: f64,
) -> Vec<u8> {
    let memoized: Vec<u8> = memo.key_alternatives(dx, round).collect();
    if !memoized.is_empty() || memo.key_len() != 0 {
        return memoized;
    }
    cache
        .key
        .entry((dx, round))
        .or_insert_with(|| {
            crate::ddt::propagate_keymix(dx, round as usize, threshold)
                .into_iter()
                .map(|e| e.out)
                .collect()
        })
        .clone()
}

fn resolve_maj(
    memo: &MemoStore,
    cache: &mut LocalCache,
    dx: u8,
    dy: u8,
    dz: u8,
    threshold: f64,
    rng: &mut impl RngCore,
) -> Vec<u8> {
    let memoized: Vec<u8> = memo.maj_alternatives(dx, dy, dz).collect();
    if !memoized.is_empty() || memo.maj_len() != 0 {
        return memoized;
    }
    cache
        .maj
        .entry((dx, dy, dz))
        .or_insert_with(|| {
            crate::ddt::propagate_maj(dx, dy, dz, threshold, rng)
                .into_iter()
                .map(|e| e.out)
                .collect()
        })
        .clone()
}

/// Run the step at `state.step`, opening or consuming frames on `stack` as
/// needed. Linear steps (0 and 6) never touch the stack.
fn run_step(
    state: &mut PropState,
    stack: &mut Vec<Frame>,
    memo: &MemoStore,
    cache: &mut LocalCache,
    threshold: f64,
    rng: &mut impl RngCore,
) -> StepResult {
    let t = state.round;

    // For a non-linear step, either open a fresh frame (if we're not
    // resuming one already sitting on top of the stack for this exact
    // (round, step)) or consume the next alternative from the frame that is
    // already there.
    macro_rules! nonlinear {
        ($alternatives:expr) => {{
            if !same_frame(
                state,
                &stack.last().expect("sentinel frame always present").state,
            ) {
                let alts = $alternatives;
                if alts.is_empty() {
                    return StepResult::Bail;
                }
                stack.push(Frame {
                    state: *state,
                    alternatives: alts,
                });
            }
            let frame = stack.last_mut().expect("just pushed or already present");
            let diff = frame
                .alternatives
                .pop()
                .expect("frame only stays on stack while it has alternatives");
            let exhausted = frame.alternatives.is_empty();
            if exhausted {
                stack.pop();
            }
            diff
        }};
    }

    match state.step {
        0 => {
            state.t1 = sigma1_diff(state.b);
            state.step += 1;
        }
        1 => {
            state.t1 = nonlinear!(resolve_add(memo, cache, state.t1, state.d, threshold));
            state.step += 1;
        }
        2 => {
            state.t1 = nonlinear!(resolve_keymix(memo, cache, state.t1, t as u8, threshold));
            state.step += if t < 8 { 3 } else { 1 };
        }
        3 => {
            let w0 = sigma0_diff(state.w[t - 3]);
            let w1 = state.w[t - 4];
            state.w[t] = nonlinear!(resolve_add(memo, cache, w0, w1, threshold));
            state.step += 1;
        }
        4 => {
            let w0 = sigma1_diff(state.w[t - 8]);
            let w1 = state.w[t];
            state.w[t] = nonlinear!(resolve_add(memo, cache, w0, w1, threshold));
            state.step += 1;
        }
        5 => {
            state.t1 = nonlinear!(resolve_add(memo, cache, state.t1, state.w[t], threshold));
            state.step += 1;
        }
        6 => {
            state.t2 = sigma0_diff(state.a);
            state.step += 1;
        }
        7 => {
            state.maj = nonlinear!(resolve_maj(
                memo, cache, state.a, state.b, state.c, threshold, rng
            ));
            state.step += 1;
        }
        8 => {
            state.t2 = nonlinear!(resolve_add(memo, cache, state.t2, state.maj, threshold));
            state.step += 1;
        }
        9 => {
            let c_new = nonlinear!(resolve_add(memo, cache, state.b, state.t1, threshold));
            state.d = state.c;
            state.c = c_new;
            state.step += 1;
        }
        10 => {
            let a_new = nonlinear!(resolve_add(memo, cache, state.t1, state.t2, threshold));
            state.b = state.a;
            state.a = a_new;
            state.trail[t] = [state.a, state.b, state.c, state.d];
            state.round += 1;
            state.step = 0;
        }
        _ => unreachable!("step must stay within 0..{STEPS_PER_ROUND}"),
    }
    StepResult::Continue
}

/// Drive `msg_diff` through `rounds` rounds of MAW32, returning the count of
/// trails that end in an all-zero register difference versus the total
/// number of trails explored (including pruned ones — see
/// [`PropagationStats`]).
pub fn propagate(
    msg_diff: [u8; 8],
    rounds: usize,
    threshold: f64,
    memo: &MemoStore,
    rng: &mut impl RngCore,
) -> Result<PropagationStats, PropagationError> {
    if rounds == 0 {
        return Err(PropagationError::NoRounds);
    }
    if rounds > MAX_ROUNDS {
        return Err(PropagationError::TooManyRounds(rounds));
    }

    let start = PropState::new(msg_diff);
    let mut stack = vec![Frame {
        state: start,
        alternatives: Vec::new(),
    }];
    let mut stats = PropagationStats::default();
    let mut visited_start = false;
    let mut cache = LocalCache::default();

    loop {
        let top = stack.last().expect("sentinel frame never removed").state;
        if visited_start && same_frame(&top, &start) {
            break;
        }
        visited_start = true;

        let mut state = top;
        let outcome = loop {
            if state.round == rounds - 1 && (state.a != 0 || state.c != 0) {
                break StepResult::Bail;
            }
            if state.round >= rounds {
                break StepResult::Continue;
            }
            match run_step(&mut state, &mut stack, memo, &mut cache, threshold, rng) {
                StepResult::Continue => {
                    if state.round >= rounds {
                        break StepResult::Continue;
                    }
                }
                StepResult::Bail => break StepResult::Bail,
            }
        };

        match outcome {
            StepResult::Continue => {
                stats.total_trails += 1;
                if state.registers_are_zero() {
                    stats.zero_trails += 1;
                    tracing::debug!(
                        trail = ?&state.trail[..rounds],
                        "zero trail recorded",
                    );
                }
            }
            StepResult::Bail => {
                stats.total_trails += 1;
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Scenario 4: the all-zero input difference propagates to the all-zero
    /// output difference with probability 1 — the trivial trail.
    #[test]
    fn all_zero_difference_is_the_trivial_trail() {
        let memo = MemoStore::empty();
        let mut rng = StdRng::seed_from_u64(1);
        let stats = propagate([0; 8], 16, -3.0, &memo, &mut rng).unwrap();
        assert_eq!(stats.zero_trails, 1);
        assert_eq!(stats.total_trails, 1);
    }

    /// Invariant 4: determinism given identical memo tables. An empty memo
    /// is itself a fixed table (every lookup falls back to the same
    /// deterministic-given-its-rng sampling path, cached per call), so this
    /// exercises the same invariant `MemoStore::generate` would without its
    /// infeasible exhaustive majority-table cost.
    #[test]
    fn propagate_is_deterministic_given_a_fixed_memo() {
        let memo = MemoStore::empty();

        let mut rng_a = StdRng::seed_from_u64(99);
        let mut rng_b = StdRng::seed_from_u64(99);
        let diff = [0, 0, 0, 0, 0x11, 0x22, 0x33, 0x44];
        let a = propagate(diff, 4, -2.0, &memo, &mut rng_a).unwrap();
        let b = propagate(diff, 4, -2.0, &memo, &mut rng_b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_rounds_outside_valid_range() {
        let memo = MemoStore::empty();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            propagate([0; 8], 0, -3.0, &memo, &mut rng),
            Err(PropagationError::NoRounds)
        ));
        assert!(matches!(
            propagate([0; 8], 17, -3.0, &memo, &mut rng),
            Err(PropagationError::TooManyRounds(17))
        ));
    }

    #[test]
    fn every_trail_explores_at_least_the_trivial_path() {
        let memo = MemoStore::empty();
        let mut rng = StdRng::seed_from_u64(3);
        // A non-zero but small-Hamming-weight difference should still
        // terminate (no infinite loop) and report a sane total.
        let stats = propagate([0, 0, 0, 0, 0, 0, 0, 1], 2, -3.0, &memo, &mut rng).unwrap();
        assert!(stats.total_trails >= 1);
        assert!(stats.zero_trails <= stats.total_trails);
    }
}
