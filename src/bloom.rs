//-
// Copyright 2024 The autoshrink developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A minimal Bloom filter over argument-hash tuples, used by the trial
//! driver to skip inputs it has already tried.
//!
//! This is intentionally the simplest implementation that satisfies the
//! contract in the spec ("any standard counting/bitset filter suffices"):
//! a fixed-size bit-vector addressed by two independent hash functions
//! (double hashing), with zero false negatives and a small, tunable false
//! positive rate.

use bit_vec::BitVec;

/// Number of independent hash probes per `insert`/`contains` call. Eight is
/// the conventional sweet spot for Bloom filters sized a few bits per
/// element.
const NUM_HASHES: u32 = 8;

/// Probabilistic "have I seen this tuple before" set over byte strings.
pub struct BloomFilter {
    bits: BitVec,
    mask: u64,
}

impl BloomFilter {
    /// Construct a filter with `bits` slots, rounded up to the next power
    /// of two. A `bits` of zero disables the filter: [`contains`] always
    /// reports `false` and [`insert`] is a no-op, matching `bloom_bits = 0`
    /// in the run configuration.
    pub fn new(bits: usize) -> Self {
        if bits == 0 {
            return BloomFilter {
                bits: BitVec::new(),
                mask: 0,
            };
        }
        let size = bits.next_power_of_two();
        BloomFilter {
            bits: BitVec::from_elem(size, false),
            mask: (size - 1) as u64,
        }
    }

    fn is_disabled(&self) -> bool {
        self.bits.is_empty()
    }

    fn probe_indices(&self, data: &[u8]) -> [usize; NUM_HASHES as usize] {
        let h1 = fnv1a(data, 0xcbf29ce484222325);
        let h2 = fnv1a(data, 0x84222325cbf29ce4) | 1;
        let mut out = [0usize; NUM_HASHES as usize];
        for i in 0..NUM_HASHES {
            let combined = h1.wrapping_add((i as u64).wrapping_mul(h2));
            out[i as usize] = (combined & self.mask) as usize;
        }
        out
    }

    /// Record `data` as having been seen.
    pub fn insert(&mut self, data: &[u8]) {
        if self.is_disabled() {
            return;
        }
        for idx in self.probe_indices(data) {
            self.bits.set(idx, true);
        }
    }

    /// Check whether `data` has (probably) been seen before.
    pub fn contains(&self, data: &[u8]) -> bool {
        if self.is_disabled() {
            return false;
        }
        self.probe_indices(data).iter().all(|&idx| self.bits[idx])
    }
}

fn fnv1a(data: &[u8], seed: u64) -> u64 {
    let mut hash = seed;
    for &b in data {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_filter_never_reports_seen() {
        let mut f = BloomFilter::new(0);
        f.insert(b"hello");
        assert!(!f.contains(b"hello"));
    }

    #[test]
    fn inserted_values_are_reported_contained() {
        let mut f = BloomFilter::new(1 << 14);
        f.insert(b"one");
        f.insert(b"two");
        assert!(f.contains(b"one"));
        assert!(f.contains(b"two"));
    }

    #[test]
    fn never_a_false_negative_across_many_values() {
        let mut f = BloomFilter::new(1 << 16);
        let values: Vec<String> = (0..2000).map(|i| format!("value-{i}")).collect();
        for v in &values {
            f.insert(v.as_bytes());
        }
        for v in &values {
            assert!(f.contains(v.as_bytes()));
        }
    }

    #[test]
    fn rounds_size_up_to_power_of_two() {
        let f = BloomFilter::new(100);
        assert_eq!(f.mask, 127);
    }
}
