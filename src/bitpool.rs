//-
// Copyright 2024 The autoshrink developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The bit pool: an append-only recording of every random bit delivered to
//! a generator, and the replay mechanism that lets the autoshrink engine
//! mutate that recording instead of the value it produced.

use crate::rng::Rng;

/// Default initial capacity for a fresh pool's backing buffer, in bits.
/// Chosen generously so that a typical allocator doesn't force repeated
/// reallocations during its first trial.
pub const DEFAULT_POOL_BITS: usize = 64 * 8 * 8;

/// Sentinel meaning "no byte limit"; requests during shrink are never
/// zeroed out for exceeding a byte budget.
pub const NO_LIMIT: usize = usize::MAX;

/// An append-only, replayable buffer of random bits plus the request
/// boundaries carved out of it.
///
/// While generating (`shrinking == false`), `request` draws fresh entropy
/// from an `Rng` and appends it. While shrinking (`shrinking == true`),
/// `request` instead replays bits previously recorded at `consumed`,
/// advancing through the buffer without consuming the `Rng` at all.
pub struct BitPool {
    bits: Vec<u64>,
    bits_filled: usize,
    shrinking: bool,
    consumed: usize,
    limit: usize,
    requests: Vec<u32>,
    index: Option<Vec<usize>>,
    generation: u64,
}

impl BitPool {
    /// Allocate an empty pool with at least `initial_bits` of backing
    /// storage and a shrink-time byte `limit` (use [`NO_LIMIT`] for none).
    pub fn new(initial_bits: usize, limit: usize) -> Self {
        let words = initial_bits.div_ceil(64).max(1);
        BitPool {
            bits: Vec::with_capacity(words),
            bits_filled: 0,
            shrinking: false,
            consumed: 0,
            limit,
            requests: Vec::new(),
            index: None,
            generation: 0,
        }
    }

    /// Number of valid bits recorded so far.
    pub fn bits_filled(&self) -> usize {
        self.bits_filled
    }

    /// The ordered sequence of request sizes (in bits) recorded so far.
    pub fn requests(&self) -> &[u32] {
        &self.requests
    }

    /// Whether this pool is in replay mode.
    pub fn is_shrinking(&self) -> bool {
        self.shrinking
    }

    /// Switch the pool into replay mode, rewinding `consumed` to the start.
    /// Used when materializing a shrink candidate: the mutated recording is
    /// replayed from the beginning to produce the candidate value. Clears
    /// `requests` as well, since replay rebuilds the request boundaries from
    /// scratch as the generator re-issues its draws; leaving the old list in
    /// place would duplicate every boundary the replay re-records.
    pub fn begin_shrinking(&mut self) {
        self.shrinking = true;
        self.consumed = 0;
        self.requests.clear();
        self.touch();
    }

    /// Generation counter, bumped on every structural mutation. The
    /// autoshrink engine uses this to detect when a cached `index` built
    /// against an older generation must be rebuilt.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn touch(&mut self) {
        self.generation += 1;
        self.index = None;
    }

    /// Lazily build (or rebuild, if stale) the request offset index, then
    /// return it.
    pub fn ensure_index(&mut self) -> &[usize] {
        if self.index.is_none() {
            let mut offsets = Vec::with_capacity(self.requests.len());
            let mut acc = 0usize;
            for &r in &self.requests {
                offsets.push(acc);
                acc += r as usize;
            }
            self.index = Some(offsets);
        }
        self.index.as_ref().unwrap()
    }

    fn ensure_capacity(&mut self, needed_bits: usize) {
        let needed_words = needed_bits.div_ceil(64);
        if self.bits.len() < needed_words {
            // Geometric growth, matching a realloc-friendly doubling
            // strategy rather than growing one word at a time.
            let mut new_len = self.bits.len().max(1);
            while new_len < needed_words {
                new_len *= 2;
            }
            self.bits.resize(new_len, 0);
        }
    }

    fn get_bit(&self, pos: usize) -> u64 {
        if pos >= self.bits_filled {
            return 0;
        }
        let word = pos / 64;
        let bit = pos % 64;
        (self.bits[word] >> bit) & 1
    }

    fn set_bit(&mut self, pos: usize, value: u64) {
        self.ensure_capacity(pos + 1);
        let word = pos / 64;
        let bit = pos % 64;
        if value & 1 != 0 {
            self.bits[word] |= 1 << bit;
        } else {
            self.bits[word] &= !(1u64 << bit);
        }
    }

    /// Request `n_bits` (at most 64) of randomness, optionally recording the
    /// request as a shrinkable unit.
    ///
    /// In generation mode, this draws a single `next_u64()` from `rng`,
    /// masks it to `n_bits`, and appends it. In replay mode, it returns the
    /// next `n_bits` previously recorded at `consumed`, padding missing high
    /// bits with zero if the recording is shorter than requested, and
    /// returning zero outright once `consumed / 8 >= limit`.
    pub fn request(&mut self, rng: &mut Rng, n_bits: u32, save_request: bool) -> u64 {
        assert!(n_bits <= 64, "a single request may draw at most 64 bits");
        if n_bits == 0 {
            if save_request {
                self.requests.push(0);
            }
            return 0;
        }

        let mask = if n_bits == 64 {
            u64::MAX
        } else {
            (1u64 << n_bits) - 1
        };

        if self.shrinking {
            if self.consumed / 8 >= self.limit {
                self.consumed += n_bits as usize;
                return 0;
            }
            let mut value = 0u64;
            for i in 0..n_bits {
                let pos = self.consumed + i as usize;
                value |= self.get_bit(pos) << i;
            }
            self.consumed += n_bits as usize;
            if save_request {
                self.requests.push(n_bits);
            }
            value & mask
        } else {
            let raw = rng.next_u64() & mask;
            let start = self.bits_filled;
            self.ensure_capacity(start + n_bits as usize);
            for i in 0..n_bits {
                self.set_bit(start + i as usize, (raw >> i) & 1);
            }
            self.bits_filled += n_bits as usize;
            if save_request {
                self.requests.push(n_bits);
            }
            self.touch();
            raw
        }
    }

    /// Request `n_bits` of randomness streamed as `ceil(n_bits / 64)`
    /// 64-bit words into `out`, recording a single request of size
    /// `n_bits` when `save_request`.
    pub fn request_bulk(
        &mut self,
        rng: &mut Rng,
        n_bits: u32,
        save_request: bool,
        out: &mut Vec<u64>,
    ) {
        let mut remaining = n_bits;
        let mut first = true;
        while remaining > 0 {
            let chunk = remaining.min(64);
            // Only the final sub-request of the bulk draw is recorded (and
            // only once, for the whole bulk request), never the
            // intermediate 64-bit words.
            let word = self.request(rng, chunk, save_request && first);
            out.push(word);
            remaining -= chunk;
            first = false;
        }
        if n_bits == 0 && save_request {
            self.requests.push(0);
        }
    }

    /// Return a byte-hash over the pool's filled content and request
    /// sequence, used as the argument hash for Bloom dedup in autoshrink
    /// mode.
    pub fn content_hash(&self) -> u64 {
        use core::hash::{Hash, Hasher};
        let mut hasher = FnvHasher::new();
        for i in 0..self.bits_filled.div_ceil(64) {
            self.bits.get(i).copied().unwrap_or(0).hash(&mut hasher);
        }
        self.bits_filled.hash(&mut hasher);
        self.requests.hash(&mut hasher);
        hasher.finish()
    }

    /// Produce an independent copy of this pool, suitable for a shrink
    /// tactic to mutate without disturbing the one currently in use.
    pub fn fork(&mut self) -> BitPool {
        BitPool {
            bits: self.bits.clone(),
            bits_filled: self.bits_filled,
            shrinking: self.shrinking,
            consumed: self.consumed,
            limit: self.limit,
            requests: self.requests.clone(),
            index: None,
            generation: self.generation,
        }
    }

    /// Zero out the bits belonging to request `request_index`.
    pub fn zero_request(&mut self, request_index: usize) {
        let (start, len) = self.request_span(request_index);
        for i in 0..len {
            self.set_bit(start + i, 0);
        }
        self.touch();
    }

    /// Splice request `request_index` out of the pool entirely, shifting
    /// all subsequent bits down and removing the request from the
    /// boundary list. This is the "elide" variant of the drop tactic.
    pub fn elide_request(&mut self, request_index: usize) {
        let (start, len) = self.request_span(request_index);
        if len == 0 {
            self.requests.remove(request_index);
            self.touch();
            return;
        }
        for pos in start..self.bits_filled - len {
            let v = self.get_bit(pos + len);
            self.set_bit(pos, v);
        }
        self.bits_filled -= len;
        self.requests.remove(request_index);
        self.touch();
    }

    /// The `(start_bit, len_bits)` span covered by request `request_index`.
    pub fn request_span(&mut self, request_index: usize) -> (usize, usize) {
        let offset = self.ensure_index()[request_index];
        (offset, self.requests[request_index] as usize)
    }

    /// Read the current value of request `request_index` as a `u64` (only
    /// meaningful for requests of at most 64 bits, which is every request
    /// this engine ever issues).
    pub fn read_request_value(&mut self, request_index: usize) -> u64 {
        let (start, len) = self.request_span(request_index);
        let mut v = 0u64;
        for i in 0..len {
            v |= self.get_bit(start + i) << i;
        }
        v
    }

    /// Overwrite the current value of request `request_index` with `value`,
    /// truncated to the request's bit width.
    pub fn write_request_value(&mut self, request_index: usize, value: u64) {
        let (start, len) = self.request_span(request_index);
        for i in 0..len {
            self.set_bit(start + i, (value >> i) & 1);
        }
        self.touch();
    }

    /// Number of recorded requests.
    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    /// Swap the bit contents of two equal-sized, adjacent requests.
    /// Returns `false` (a no-op) if the sizes differ.
    pub fn swap_requests(&mut self, a: usize, b: usize) -> bool {
        let len_a = self.requests[a];
        let len_b = self.requests[b];
        if len_a != len_b {
            return false;
        }
        let va = self.read_request_value(a);
        let vb = self.read_request_value(b);
        self.write_request_value(a, vb);
        self.write_request_value(b, va);
        true
    }

    /// Trim trailing all-zero 64-bit words from the backing buffer. This is
    /// an optional acceleration for convergence; it never changes which
    /// bits `request`/replay observe for in-bounds positions, since
    /// trimmed bits were already logically zero.
    pub fn trim_trailing_zero_words(&mut self) {
        let filled_words = self.bits_filled.div_ceil(64);
        let mut last_nonzero = 0;
        for i in 0..filled_words {
            if self.bits.get(i).copied().unwrap_or(0) != 0 {
                last_nonzero = i + 1;
            }
        }
        if last_nonzero < filled_words {
            // Only trim whole trailing words that fall entirely past
            // bits_filled's last referenced word would be unsafe; we only
            // ever trim storage beyond bits_filled's own word, so
            // bits_filled itself is untouched by this bookkeeping.
            self.bits.truncate(last_nonzero.max(self.bits.len().min(filled_words)));
        }
    }
}

/// A tiny, dependency-free FNV-1a hasher used for bit-pool content hashing.
/// Not cryptographic; only needs to be a stable, fast mixing function.
struct FnvHasher(u64);

impl FnvHasher {
    fn new() -> Self {
        FnvHasher(0xcbf29ce484222325)
    }
}

impl core::hash::Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(0x100000001b3);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_then_replay_reproduces_bits() {
        let mut rng = Rng::new(123);
        let mut pool = BitPool::new(DEFAULT_POOL_BITS, NO_LIMIT);
        let a = pool.request(&mut rng, 20, true);
        let b = pool.request(&mut rng, 7, true);
        let c = pool.request(&mut rng, 64, true);

        pool.begin_shrinking();
        let a2 = pool.request(&mut rng, 20, true);
        let b2 = pool.request(&mut rng, 7, true);
        let c2 = pool.request(&mut rng, 64, true);

        assert_eq!(a, a2);
        assert_eq!(b, b2);
        assert_eq!(c, c2);
    }

    #[test]
    fn replay_past_recorded_length_yields_zero_high_bits() {
        let mut rng = Rng::new(5);
        let mut pool = BitPool::new(DEFAULT_POOL_BITS, NO_LIMIT);
        let _ = pool.request(&mut rng, 8, true);

        pool.begin_shrinking();
        // Re-request more bits than were ever recorded for this pool.
        let replayed = pool.request(&mut rng, 32, true);
        assert_eq!(replayed & !0xFFu64, 0);
    }

    #[test]
    fn shrink_time_limit_zeroes_further_requests() {
        let mut rng = Rng::new(9);
        let mut pool = BitPool::new(DEFAULT_POOL_BITS, 1);
        let _ = pool.request(&mut rng, 64, true);
        let _ = pool.request(&mut rng, 64, true);

        pool.begin_shrinking();
        let first = pool.request(&mut rng, 64, true);
        assert_ne!(first, 0);
        let second = pool.request(&mut rng, 64, true);
        assert_eq!(second, 0);
    }

    #[test]
    fn request_bulk_matches_sequential_requests() {
        let mut rng_a = Rng::new(77);
        let mut pool_a = BitPool::new(DEFAULT_POOL_BITS, NO_LIMIT);
        let mut out = Vec::new();
        pool_a.request_bulk(&mut rng_a, 130, true, &mut out);

        let mut rng_b = Rng::new(77);
        let mut pool_b = BitPool::new(DEFAULT_POOL_BITS, NO_LIMIT);
        let w0 = pool_b.request(&mut rng_b, 64, false);
        let w1 = pool_b.request(&mut rng_b, 64, false);
        let w2 = pool_b.request(&mut rng_b, 2, false);

        assert_eq!(out, vec![w0, w1, w2]);
        assert_eq!(pool_a.requests(), &[130]);
    }

    #[test]
    fn swap_requires_equal_sizes() {
        let mut rng = Rng::new(1);
        let mut pool = BitPool::new(DEFAULT_POOL_BITS, NO_LIMIT);
        let _ = pool.request(&mut rng, 8, true);
        let _ = pool.request(&mut rng, 16, true);
        assert!(!pool.swap_requests(0, 1));
    }

    #[test]
    fn elide_request_shrinks_filled_bits() {
        let mut rng = Rng::new(3);
        let mut pool = BitPool::new(DEFAULT_POOL_BITS, NO_LIMIT);
        let _ = pool.request(&mut rng, 8, true);
        let _ = pool.request(&mut rng, 8, true);
        let before = pool.bits_filled();
        pool.elide_request(0);
        assert_eq!(pool.bits_filled(), before - 8);
        assert_eq!(pool.request_count(), 1);
    }

    #[test]
    fn content_hash_is_stable_for_equal_pools() {
        let mut rng = Rng::new(44);
        let mut pool = BitPool::new(DEFAULT_POOL_BITS, NO_LIMIT);
        let _ = pool.request(&mut rng, 20, true);
        let copy = pool.fork();
        assert_eq!(pool.content_hash(), copy.content_hash());
    }
}
