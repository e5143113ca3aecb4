//-
// Copyright 2024 The autoshrink developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Autoshrinking: simplifying a value by mutating the recorded bit pool
//! that produced it, rather than touching the value's in-memory
//! representation.
//!
//! The five tactics here (drop, shift, mask, swap, sub) operate purely on
//! [`BitPool`] request boundaries. Materializing a candidate value from a
//! mutated pool is done by replaying the descriptor's `alloc` against the
//! pool in shrink mode.

pub mod model;

use crate::bitpool::{BitPool, DEFAULT_POOL_BITS};
use crate::descriptor::{AutoshrinkPrintMode, RandomSource, TypeInfo};
use crate::errors::ShrinkOutcome;
use crate::rng::Rng;
use model::{Action, Choice, Model};

/// Magic request index that disables the drop tactic entirely, useful for
/// deterministic tests that don't want a structural drop to occur.
pub const DO_NOT_DROP: usize = usize::MAX;

/// Default: declare a local minimum reached after this many unsuccessful
/// shrinks in a row for one argument.
pub const DEFAULT_MAX_FAILED_SHRINKS: usize = 100;

/// Default odds of dropping a chosen request: `(1 + DROP_THRESHOLD)` in
/// `2^DROP_BITS`. With the defaults below (threshold 0), a freshly chosen
/// request is compared against a byte draw and only dropped if that byte
/// is strictly less than 0, i.e., never, on its own. This looks like an
/// off-by-one bug but is the literal, specified default: the drop tactic
/// still fires because `choose` occasionally (via `TWO_EVENLY`) forces
/// `Action::DROP` regardless of the threshold check below. Reproduce this
/// literally; do not "fix" it by making threshold 0 mean "always drop".
pub const DEFAULT_DROP_THRESHOLD: u8 = 0;
/// Number of bits the drop-threshold comparison is made against.
pub const DEFAULT_DROP_BITS: u8 = 5;

/// Per-argument autoshrinking context: the bit pool behind the argument's
/// current value, the adaptive model biasing tactic choice, and the knobs
/// controlling drop probability and shrink budget.
pub struct AutoshrinkEnv {
    arg_index: u8,
    pool: BitPool,
    model: Model,
    print_mode: AutoshrinkPrintMode,
    drop_threshold: u8,
    drop_bits: u8,
    max_failed_shrinks: usize,
    leave_trailing_zeroes: bool,
    drop_request_override: Option<usize>,
    /// A private PRNG used only by the shrinker itself to pick which
    /// request to mutate and by how much. Kept separate from the parent
    /// pool's PRNG so tactic choice never perturbs argument generation.
    shrink_rng: Rng,
}

impl AutoshrinkEnv {
    /// Build a fresh env for argument `arg_index`, wrapping `pool` (the
    /// pool that was used to allocate the argument's current value).
    pub fn new(
        arg_index: u8,
        pool: BitPool,
        print_mode: AutoshrinkPrintMode,
        shrink_seed: u64,
    ) -> Self {
        AutoshrinkEnv {
            arg_index,
            pool,
            model: Model::default(),
            print_mode,
            drop_threshold: DEFAULT_DROP_THRESHOLD,
            drop_bits: DEFAULT_DROP_BITS,
            max_failed_shrinks: DEFAULT_MAX_FAILED_SHRINKS,
            leave_trailing_zeroes: false,
            drop_request_override: None,
            shrink_rng: Rng::new(shrink_seed),
        }
    }

    /// The argument index this env belongs to.
    pub fn arg_index(&self) -> u8 {
        self.arg_index
    }

    /// The print mode configured for this argument.
    pub fn print_mode(&self) -> AutoshrinkPrintMode {
        self.print_mode
    }

    /// Force the model's next tactic choice (test hook).
    pub fn force_next_action(&mut self, action: Action) {
        self.model.set_next(action);
    }

    /// Disable dropping entirely (test hook): set to [`DO_NOT_DROP`].
    pub fn set_drop_request_override(&mut self, request: Option<usize>) {
        self.drop_request_override = request;
    }

    /// Override the consecutive-failed-shrinks budget, normally
    /// [`DEFAULT_MAX_FAILED_SHRINKS`]. The driver calls this with the
    /// run's configured `max_failed_shrinks` right after allocation.
    pub fn set_max_failed_shrinks(&mut self, max_failed_shrinks: usize) {
        self.max_failed_shrinks = max_failed_shrinks;
    }

    /// Swap in a replacement bit pool (used after a shrink candidate is
    /// accepted), returning the previous one so the caller can free it.
    pub fn replace_pool(&mut self, pool: BitPool) -> BitPool {
        std::mem::replace(&mut self.pool, pool)
    }

    /// Borrow the current bit pool.
    pub fn pool(&self) -> &BitPool {
        &self.pool
    }

    /// Borrow the current bit pool mutably.
    pub fn pool_mut(&mut self) -> &mut BitPool {
        &mut self.pool
    }

    fn pick_request(&mut self, requests: usize) -> Option<usize> {
        if requests == 0 {
            return None;
        }
        Some((self.shrink_rng.next_u64() % requests as u64) as usize)
    }
}

/// A [`RandomSource`] backed by a [`BitPool`] and an `Rng`, handed to a
/// descriptor's `alloc` during both generation and shrink replay.
pub struct PoolSource<'a> {
    pool: &'a mut BitPool,
    rng: &'a mut Rng,
}

impl<'a> PoolSource<'a> {
    /// Wrap `pool` and `rng` for one `alloc` call.
    pub fn new(pool: &'a mut BitPool, rng: &'a mut Rng) -> Self {
        PoolSource { pool, rng }
    }
}

impl<'a> RandomSource for PoolSource<'a> {
    fn random_bits(&mut self, n_bits: u32) -> u64 {
        self.pool.request(self.rng, n_bits, true)
    }

    fn random_bits_bulk(&mut self, n_bits: u32, out: &mut Vec<u64>) {
        self.pool.request_bulk(self.rng, n_bits, true, out)
    }
}

/// Allocate a fresh value for `descriptor`, recording every bit drawn into
/// a brand-new pool. Returns the value together with the env that owns its
/// recording, or `None` on allocator failure.
pub fn alloc_with_fresh_pool<T: TypeInfo>(
    descriptor: &T,
    arg_index: u8,
    rng: &mut Rng,
    shrink_seed: u64,
) -> Option<(T::Value, AutoshrinkEnv)> {
    let mut pool = BitPool::new(DEFAULT_POOL_BITS, crate::bitpool::NO_LIMIT);
    let value = {
        let mut src = PoolSource::new(&mut pool, rng);
        descriptor.alloc(&mut src)
    }?;
    let print_mode = descriptor.autoshrink_config().print_mode;
    Some((value, AutoshrinkEnv::new(arg_index, pool, print_mode, shrink_seed)))
}

/// Replay `pool` (already mutated by a tactic) against `descriptor` to
/// materialize a candidate value. `pool` is switched into shrink mode by
/// this call.
fn materialize<T: TypeInfo>(
    descriptor: &T,
    pool: &mut BitPool,
    rng: &mut Rng,
) -> Option<T::Value> {
    pool.begin_shrinking();
    let mut src = PoolSource::new(pool, rng);
    descriptor.alloc(&mut src)
}

/// Apply one mutation tactic to a forked copy of `env`'s pool. Returns
/// `None` if the tactic was a no-op on this pool's current shape (a dead
/// end), the action actually taken otherwise.
fn apply_tactic(env: &mut AutoshrinkEnv, action: Action, pool: &mut BitPool) -> bool {
    let requests = pool.request_count();
    match action {
        Action::DROP => {
            let chosen = match env.drop_request_override {
                Some(DO_NOT_DROP) => return false,
                Some(r) => r,
                None => match env.pick_request(requests) {
                    Some(r) => r,
                    None => return false,
                },
            };
            if chosen >= requests {
                return false;
            }
            let threshold = env.drop_threshold;
            let bits = env.drop_bits;
            let draw = (env.shrink_rng.next_u64() & ((1u64 << bits) - 1)) as u8;
            if draw >= threshold {
                return false;
            }
            pool.elide_request(chosen);
            true
        }
        Action::SHIFT => {
            let chosen = match env.pick_request(requests) {
                Some(r) => r,
                None => return false,
            };
            let amount = 1 + (env.shrink_rng.next_u64() % 3);
            let current = pool.read_request_value(chosen);
            let shifted = current >> amount;
            if shifted == current {
                return false;
            }
            pool.write_request_value(chosen, shifted);
            true
        }
        Action::MASK => {
            let chosen = match env.pick_request(requests) {
                Some(r) => r,
                None => return false,
            };
            let (_, len) = pool.request_span(chosen);
            if len == 0 {
                return false;
            }
            // Bias the mask toward clearing bits: each bit of the mask is
            // independently ~75% likely to be zero.
            let mut mask = 0u64;
            for i in 0..len {
                let keep = (env.shrink_rng.next_u64() % 4) == 0;
                if keep {
                    mask |= 1 << i;
                }
            }
            let current = pool.read_request_value(chosen);
            let masked = current & mask;
            if masked == current {
                return false;
            }
            pool.write_request_value(chosen, masked);
            true
        }
        Action::SWAP => {
            if requests < 2 {
                return false;
            }
            let try_pair = |pool: &mut BitPool, a: usize| -> bool {
                let b = a + 1;
                let va = pool.read_request_value(a);
                let vb = pool.read_request_value(b);
                va != vb && pool.swap_requests(a, b)
            };
            let first = env.pick_request(requests - 1).unwrap_or(0);
            if try_pair(pool, first) {
                true
            } else if requests > 2 {
                // Retry once at a different adjacent pair, per spec.
                let second = (first + 1) % (requests - 1);
                try_pair(pool, second)
            } else {
                false
            }
        }
        Action::SUB => {
            let chosen = match env.pick_request(requests) {
                Some(r) => r,
                None => return false,
            };
            let current = pool.read_request_value(chosen);
            if current == 0 {
                return false;
            }
            let delta = 1 + (env.shrink_rng.next_u64() % current);
            let new_value = current.saturating_sub(delta);
            if new_value == current {
                return false;
            }
            pool.write_request_value(chosen, new_value);
            true
        }
        _ => false,
    }
}

/// Attempt shrink tactic number `tactic_index` for `env` against
/// `descriptor`, producing a candidate value and the pool that produced
/// it, together with the tactic actually chosen (needed by the caller to
/// later feed [`note_trial_result`] once it learns whether the property
/// still failed on the candidate).
pub fn shrink<T: TypeInfo>(
    descriptor: &T,
    env: &mut AutoshrinkEnv,
    tactic_index: u32,
    rng: &mut Rng,
) -> (ShrinkOutcome, Option<(T::Value, BitPool)>, Option<Action>) {
    if tactic_index == 0 {
        env.model.begin_step();
    }
    if tactic_index as usize >= env.max_failed_shrinks {
        return (ShrinkOutcome::NoMoreTactics, None, None);
    }

    let action = match env.model.choose(&mut env.shrink_rng) {
        Choice::Tactic(a) => a,
        Choice::Done => return (ShrinkOutcome::NoMoreTactics, None, None),
    };
    env.model.mark_tried(action);

    let mut candidate_pool = env.pool.fork();
    let changed = apply_tactic(env, action, &mut candidate_pool);
    if !changed {
        env.model.update(action, false, 3);
        return (ShrinkOutcome::DeadEnd, None, Some(action));
    }

    if !env.leave_trailing_zeroes {
        candidate_pool.trim_trailing_zero_words();
    }

    match materialize(descriptor, &mut candidate_pool, rng) {
        Some(value) => (ShrinkOutcome::Ok, Some((value, candidate_pool)), Some(action)),
        None => (ShrinkOutcome::DeadEnd, None, Some(action)),
    }
}

/// Record the result of having actually *called the property* with a
/// shrink candidate produced by tactic `action` (the caller tracks which
/// action that was, from the most recent `shrink` call).
pub fn note_trial_result(env: &mut AutoshrinkEnv, action: Action, property_failed: bool) {
    env.model.update(action, property_failed, if property_failed { 8 } else { 3 });
}

/// Hash the contents of `pool` for Bloom dedup purposes, per the spec's
/// "hash over the bit pool's contents" rule for autoshrink-mode arguments.
pub fn hash_pool(pool: &BitPool) -> u64 {
    pool.content_hash()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::AutoshrinkConfig;

    /// A tiny descriptor producing a `u32` from a 20-bit draw, used to
    /// exercise the tactic machinery end-to-end.
    struct SmallInt;

    impl TypeInfo for SmallInt {
        type Value = u32;

        fn alloc(&self, src: &mut dyn RandomSource) -> Option<u32> {
            Some(src.random_bits(20) as u32)
        }

        fn autoshrink_config(&self) -> AutoshrinkConfig {
            AutoshrinkConfig {
                enable: true,
                print_mode: AutoshrinkPrintMode::Never,
            }
        }
    }

    #[test]
    fn alloc_with_fresh_pool_round_trips_through_replay() {
        let mut rng = Rng::new(11);
        let (value, mut env) = alloc_with_fresh_pool(&SmallInt, 0, &mut rng, 99).unwrap();
        // Replaying the exact same pool (no mutation) must reproduce the
        // same value.
        let mut replay_pool = env.pool_mut().fork();
        let mut replay_rng = Rng::new(0); // unused once shrinking
        let replayed = materialize(&SmallInt, &mut replay_pool, &mut replay_rng).unwrap();
        assert_eq!(value, replayed);
    }

    #[test]
    fn sub_tactic_only_ever_reduces_or_dead_ends() {
        let mut rng = Rng::new(22);
        let (value, mut env) = alloc_with_fresh_pool(&SmallInt, 0, &mut rng, 5).unwrap();
        env.force_next_action(Action::SUB);
        let (outcome, candidate, _action) = shrink(&SmallInt, &mut env, 0, &mut rng);
        match outcome {
            ShrinkOutcome::Ok => {
                let (new_value, _pool) = candidate.unwrap();
                assert!(new_value <= value);
            }
            ShrinkOutcome::DeadEnd => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn do_not_drop_override_prevents_drop_tactic_from_changing_anything() {
        let mut rng = Rng::new(33);
        let (_value, mut env) = alloc_with_fresh_pool(&SmallInt, 0, &mut rng, 7).unwrap();
        env.set_drop_request_override(Some(DO_NOT_DROP));
        env.force_next_action(Action::DROP);
        let (outcome, _candidate, _action) = shrink(&SmallInt, &mut env, 0, &mut rng);
        assert_eq!(outcome, ShrinkOutcome::DeadEnd);
    }

    #[test]
    fn max_failed_shrinks_caps_further_tactics() {
        let mut rng = Rng::new(44);
        let (_value, mut env) = alloc_with_fresh_pool(&SmallInt, 0, &mut rng, 1).unwrap();
        env.max_failed_shrinks = 1;
        let (outcome, _, _action) = shrink(&SmallInt, &mut env, 1, &mut rng);
        assert_eq!(outcome, ShrinkOutcome::NoMoreTactics);
    }

    #[test]
    fn accepted_shrink_never_increases_pool_bits_filled() {
        let mut rng = Rng::new(55);
        let (_value, mut env) = alloc_with_fresh_pool(&SmallInt, 0, &mut rng, 8).unwrap();
        let before = env.pool().bits_filled();
        for tactic in 0..64 {
            let (outcome, candidate, _action) = shrink(&SmallInt, &mut env, tactic, &mut rng);
            if let ShrinkOutcome::Ok = outcome {
                let (_v, pool) = candidate.unwrap();
                assert!(pool.bits_filled() <= before);
            }
        }
    }
}
