//-
// Copyright 2024 The autoshrink developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! End-to-end exercises of the trial driver against small hand-written
//! descriptors, covering the scenarios the spec calls out explicitly: a
//! scalar counter-example search, a two-argument search, large-scale Bloom
//! deduplication, a linked structure whose shape itself shrinks, and an
//! array whose non-zero prefix shrinks toward a boundary condition.

use autoshrink::descriptor::{AutoshrinkConfig, AutoshrinkPrintMode, RandomSource, TypeInfo};
use autoshrink::{run1, run2, CallResult, Hooks, RunConfig, RunOutcome, Seed};

/// An `i8` produced from an 8-bit draw, autoshrinking enabled.
struct I8;

impl TypeInfo for I8 {
    type Value = i8;

    fn alloc(&self, src: &mut dyn RandomSource) -> Option<i8> {
        Some(src.random_bits(8) as u8 as i8)
    }

    fn hash(&self, value: &i8) -> Option<u64> {
        Some(*value as u8 as u64)
    }

    fn autoshrink_config(&self) -> AutoshrinkConfig {
        AutoshrinkConfig {
            enable: true,
            print_mode: AutoshrinkPrintMode::Never,
        }
    }
}

/// A `u16` produced from a 16-bit draw, autoshrinking enabled.
struct U16;

impl TypeInfo for U16 {
    type Value = u16;

    fn alloc(&self, src: &mut dyn RandomSource) -> Option<u16> {
        Some(src.random_bits(16) as u16)
    }

    fn hash(&self, value: &u16) -> Option<u64> {
        Some(*value as u64)
    }

    fn autoshrink_config(&self) -> AutoshrinkConfig {
        AutoshrinkConfig {
            enable: true,
            print_mode: AutoshrinkPrintMode::Never,
        }
    }
}

/// A `u64` produced from a full 64-bit draw, no autoshrinking (its
/// property always passes, so it should never need to shrink).
struct U64Full;

impl TypeInfo for U64Full {
    type Value = u64;

    fn alloc(&self, src: &mut dyn RandomSource) -> Option<u64> {
        Some(src.random_bits(64))
    }

    fn hash(&self, value: &u64) -> Option<u64> {
        Some(*value)
    }
}

#[test]
fn s1_square_bound_shrinks_to_the_boundary_value() {
    let descriptor = I8;
    let mut config = RunConfig::default();
    config.trials = 500;
    config.seed = Seed::Fixed(0xC0FFEE);
    let outcome = run1(
        "s1_square_bound",
        (&descriptor,),
        |a: &i8| {
            let a = *a as i32;
            if a * a <= 12345 {
                CallResult::Ok
            } else {
                CallResult::Fail
            }
        },
        config,
        Hooks::default(),
    )
    .unwrap();

    match outcome {
        RunOutcome::Fail(_, (a,)) => {
            let a32 = a as i32;
            assert!(a32 * a32 > 12345, "counter-example must actually fail");
            // 111^2 = 12321 <= 12345 < 112^2 = 12544, so no magnitude below
            // 112 can fail; the shrinker should get close to that boundary
            // rather than leave the original trial's large magnitude.
            assert!(
                a.unsigned_abs() >= 112 && a.unsigned_abs() <= 127,
                "expected a near-minimal magnitude, got {a}"
            );
        }
        other => panic!("expected the property to fail, got {other:?}"),
    }
}

#[test]
fn s2_two_argument_inequality_shrinks_to_minimal_pair() {
    let d1 = I8;
    let d2 = U16;
    let mut config = RunConfig::default();
    config.trials = 500;
    config.seed = Seed::Fixed(0xDECAF);
    let outcome = run2(
        "s2_square_vs_bound",
        (&d1, &d2),
        |a: &i8, b: &u16| {
            let a = *a as i32;
            let b = *b as i32;
            if a * a <= b {
                CallResult::Ok
            } else {
                CallResult::Fail
            }
        },
        config,
        Hooks::default(),
    )
    .unwrap();

    match outcome {
        RunOutcome::Fail(_, (a, b)) => {
            assert!((a as i32) * (a as i32) > b as i32);
            // The shrinker should drive `a` down to its minimal nonzero
            // magnitude and `b` down to its minimal value still failing;
            // for this property that's a small magnitude well short of the
            // original trial's values.
            assert!(a.unsigned_abs() <= 4, "expected a small |a|, got {a}");
            assert!(b <= 16, "expected a small b, got {b}");
        }
        other => panic!("expected the property to fail, got {other:?}"),
    }
}

#[test]
fn s3_always_passing_property_never_fails_and_dedups_heavily() {
    let descriptor = U64Full;
    let mut config = RunConfig::default();
    config.trials = 20_000;
    config.bloom_bits = 1 << 12;
    config.seed = Seed::Fixed(7);

    let max_dup_seen = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let max_dup_in_hook = max_dup_seen.clone();
    let mut hooks = Hooks::default();
    hooks.trial_post = Some(Box::new(move |info| {
        max_dup_in_hook.fetch_max(info.dup, std::sync::atomic::Ordering::Relaxed);
        autoshrink::HookRun::Continue
    }));

    let outcome = run1(
        "s3_always_true",
        (&descriptor,),
        |_v: &u64| CallResult::Ok,
        config,
        hooks,
    )
    .unwrap();

    assert_eq!(outcome, RunOutcome::Ok);
    // With a small Bloom table and 20,000 trials, repeats are a near
    // certainty well before the run completes.
    assert!(max_dup_seen.load(std::sync::atomic::Ordering::Relaxed) > 0);
}

/// A small linked list, each link gated by a single `random_bits(3) != 0`
/// draw (so roughly 7/8 of draws continue the list), up to a hard cap so
/// generation always terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LinkedList(Vec<u8>);

struct LinkedListDescriptor {
    max_len: usize,
}

impl TypeInfo for LinkedListDescriptor {
    type Value = LinkedList;

    fn alloc(&self, src: &mut dyn RandomSource) -> Option<LinkedList> {
        let mut items = Vec::new();
        while items.len() < self.max_len {
            if src.random_bits(3) == 0 {
                break;
            }
            items.push(src.random_bits(8) as u8);
        }
        Some(LinkedList(items))
    }

    fn autoshrink_config(&self) -> AutoshrinkConfig {
        AutoshrinkConfig {
            enable: true,
            print_mode: AutoshrinkPrintMode::Never,
        }
    }
}

#[test]
fn s4_always_passing_list_property_never_shrinks() {
    let descriptor = LinkedListDescriptor { max_len: 32 };
    let mut config = RunConfig::default();
    config.trials = 64;
    config.seed = Seed::Fixed(123);
    let outcome = run1(
        "s4_list_always_passes",
        (&descriptor,),
        |_l: &LinkedList| CallResult::Ok,
        config,
        Hooks::default(),
    )
    .unwrap();
    assert_eq!(outcome, RunOutcome::Ok);
}

#[test]
fn s4_length_bound_shrinks_list_toward_three() {
    let descriptor = LinkedListDescriptor { max_len: 32 };
    let mut config = RunConfig::default();
    config.trials = 256;
    config.seed = Seed::Fixed(321);
    let outcome = run1(
        "s4_list_length_bound",
        (&descriptor,),
        |l: &LinkedList| {
            if l.0.len() < 3 {
                CallResult::Ok
            } else {
                CallResult::Fail
            }
        },
        config,
        Hooks::default(),
    )
    .unwrap();

    match outcome {
        RunOutcome::Fail(_, (l,)) => {
            assert!(l.0.len() >= 3);
            assert!(l.0.len() <= 6, "expected a near-minimal length, got {}", l.0.len());
        }
        RunOutcome::Ok => {
            // With this generator and seed it's possible no trial ever
            // reaches length >= 3; that's a valid (if unlucky) outcome
            // rather than a bug, so only assert the shrink guarantee when a
            // failure was actually found.
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

/// An array of up to 256 bytes, autoshrinking enabled; length itself is
/// drawn (and thus shrinkable the same way a linked list's length is).
#[derive(Debug, Clone, PartialEq, Eq)]
struct ByteArray(Vec<u8>);

struct ByteArrayDescriptor;

impl TypeInfo for ByteArrayDescriptor {
    type Value = ByteArray;

    fn alloc(&self, src: &mut dyn RandomSource) -> Option<ByteArray> {
        let len = (src.random_bits(8) as usize) % 257;
        let mut bytes = Vec::with_capacity(len);
        for _ in 0..len {
            bytes.push(src.random_bits(8) as u8);
        }
        Some(ByteArray(bytes))
    }

    fn autoshrink_config(&self) -> AutoshrinkConfig {
        AutoshrinkConfig {
            enable: true,
            print_mode: AutoshrinkPrintMode::Never,
        }
    }
}

#[test]
fn s5_sum_bound_shrinks_array_to_just_over_the_bound() {
    let descriptor = ByteArrayDescriptor;
    let mut config = RunConfig::default();
    config.trials = 500;
    config.seed = Seed::Fixed(55);
    let outcome = run1(
        "s5_array_sum_bound",
        (&descriptor,),
        |arr: &ByteArray| {
            let sum: u32 = arr.0.iter().map(|&b| b as u32).sum();
            if sum < 1000 {
                CallResult::Ok
            } else {
                CallResult::Fail
            }
        },
        config,
        Hooks::default(),
    )
    .unwrap();

    match outcome {
        RunOutcome::Fail(_, (arr,)) => {
            let sum: u32 = arr.0.iter().map(|&b| b as u32).sum();
            assert!(sum >= 1000);
            // The shrinker should have driven the prefix down close to the
            // boundary rather than leaving it at whatever huge sum the
            // original trial happened to draw.
            assert!(sum < 2000, "expected a near-minimal sum, got {sum}");
        }
        other => panic!("expected the property to fail, got {other:?}"),
    }
}

/// `alloc` draws a length, then a bulk request of that many bits; used to
/// confirm bulk requests replay bit-for-bit through the bit pool.
struct BulkDescriptor;

impl TypeInfo for BulkDescriptor {
    type Value = Vec<u64>;

    fn alloc(&self, src: &mut dyn RandomSource) -> Option<Vec<u64>> {
        let n = (src.random_bits(20) % 256) as u32;
        let mut buf = Vec::new();
        src.random_bits_bulk(n, &mut buf);
        Some(buf)
    }

    fn autoshrink_config(&self) -> AutoshrinkConfig {
        AutoshrinkConfig {
            enable: true,
            print_mode: AutoshrinkPrintMode::Never,
        }
    }
}

#[test]
fn s6_bulk_request_replays_bit_for_bit() {
    use autoshrink::autoshrink::alloc_with_fresh_pool;
    use autoshrink::rng::Rng;

    let descriptor = BulkDescriptor;
    let mut rng = Rng::new(91);
    let (value, mut env) = alloc_with_fresh_pool(&descriptor, 0, &mut rng, 17).unwrap();

    let mut replay_pool = env.pool_mut().fork();
    replay_pool.begin_shrinking();
    let mut replay_rng = Rng::new(0);
    let mut src = autoshrink::autoshrink::PoolSource::new(&mut replay_pool, &mut replay_rng);
    let replayed = descriptor.alloc(&mut src).unwrap();

    assert_eq!(value, replayed);
}
