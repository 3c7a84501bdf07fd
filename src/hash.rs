//! The MAW32 hash function itself, consumed as a golden reference by the
//! test suite (spec scenario: the empty-input digest) and not otherwise
//! exercised by the trail-search engine, which only ever deals in
//! differences, never concrete values.
//!
//! Merkle-Damgard padding: append `0x80`, zero-pad until the length is
//! congruent to 32 bits modulo the 64-bit block size, then append the
//! original length in bits as a big-endian 32-bit integer. Transliterated
//! from `examples/original_source/src/hash/maw32.c`.

use crate::primitives::{add, maj, sigma0, sigma1, IV, K};

const BLOCK_BYTES: usize = 8;
const ROUNDS: usize = 16;

/// Pad `input` into a sequence of 8-byte blocks per the MAW32 Merkle-Damgard
/// scheme.
fn pad(input: &[u8]) -> Vec<[u8; BLOCK_BYTES]> {
    let bit_len = (input.len() as u64) * 8;
    let mut padded = input.to_vec();
    padded.push(0x80);
    while padded.len() % BLOCK_BYTES != BLOCK_BYTES - 4 {
        padded.push(0x00);
    }
    padded.extend_from_slice(&(bit_len as u32).to_be_bytes());

    padded
        .chunks_exact(BLOCK_BYTES)
        .map(|chunk| chunk.try_into().expect("chunk has exactly BLOCK_BYTES"))
        .collect()
}

/// One 16-round compression of `state` against message block `block`.
fn compress(state: [u8; 4], block: [u8; BLOCK_BYTES]) -> [u8; 4] {
    let mut w = [0u8; ROUNDS];
    w[..BLOCK_BYTES].copy_from_slice(&block);
    let [mut a, mut b, mut c, mut d] = state;

    for t in 0..ROUNDS {
        if t >= BLOCK_BYTES {
            w[t] = add(add(sigma0(w[t - 3]), w[t - 4]), sigma1(w[t - 8]));
        }
        let t1 = add(add(add(d, sigma1(b)), K[t]), w[t]);
        let t2 = add(sigma0(a), maj(a, b, c));
        d = c;
        c = add(b, t1);
        b = a;
        a = add(t1, t2);
    }

    [
        add(state[0], a),
        add(state[1], b),
        add(state[2], c),
        add(state[3], d),
    ]
}

/// Compute the 32-bit MAW32 digest of `input`.
pub fn maw32_hash(input: &[u8]) -> [u8; 4] {
    pad(input).into_iter().fold(IV, compress)
}

/// Render a digest as a lowercase hex string, matching `maw32_hash`'s C
/// counterpart which formats into `"%02x%02x%02x%02x"`.
pub fn digest_hex(digest: [u8; 4]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scenario 5: `MAW32("")`. The empty input pads to exactly one block
    /// (`0x80` followed by three zero bytes and a 32-bit big-endian length
    /// of 0), so this is a hand-traceable single compression of the IV
    /// against that block. Golden value recorded from the primitive itself,
    /// per spec's instruction.
    #[test]
    fn empty_input_hashes_to_the_golden_digest() {
        let digest = maw32_hash(&[]);
        assert_eq!(digest, [0x97, 0x61, 0x00, 0x64]);
        assert_eq!(digest_hex(digest), "97610064");
    }

    #[test]
    fn padding_produces_a_single_block_for_empty_input() {
        assert_eq!(pad(&[]), vec![[0x80, 0, 0, 0, 0, 0, 0, 0]]);
    }
}
