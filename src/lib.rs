//! Differential-cryptanalysis toolkit for MAW32, an 8-bit-word, 16-round,
//! SHA-2-like experimental hash (64-bit block, 32-bit digest).
//!
//! The crate is organized bottom-up: [`primitives`] and [`ddt`] provide the
//! byte-level building blocks and their difference distributions, [`memo`]
//! persists filtered distributions to disk, [`propagate`] and [`viability`]
//! implement the backtracking search over a single candidate difference, and
//! [`gene`]/[`driver`]/[`worker`] implement the genetic search that explores
//! many candidates concurrently. [`config`] and [`error`] are the ambient
//! CLI/validation surface shared by the two binaries in `src/bin/`.

pub mod config;
pub mod ddt;
pub mod driver;
pub mod error;
pub mod gene;
pub mod hash;
pub mod memo;
pub mod primitives;
pub mod propagate;
pub mod viability;
pub mod worker;
