//-
// Copyright 2024 The autoshrink developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The trial driver: seeds each trial, allocates arguments, deduplicates
//! against the Bloom filter, calls the property, and on failure runs the
//! shrink loop to find a minimal counter-example.
//!
//! Property names are required to be `&'static str` (in practice always a
//! string literal at the call site) because every hook info struct is
//! stored in [`Hooks`] at a `'static` lifetime.

use crate::autoshrink::{self, AutoshrinkEnv};
use crate::bitpool::BitPool;
use crate::bloom::BloomFilter;
use crate::call;
use crate::config::{RunConfig, Seed};
use crate::descriptor::{RandomSource, TypeInfo};
use crate::errors::{CallResult, FuzzError, HookRun, RunOutcome, ShrinkOutcome};
use crate::hooks::{
    CounterexampleInfo, Hooks, RunInfo, ShrinkPostInfo, ShrinkPostState, ShrinkPreInfo,
    ShrinkTrialPostInfo, TrialPostInfo, TrialPreInfo,
};
use crate::reason::Reason;
use crate::rng::{self, Rng};

#[cfg(all(unix, feature = "fork"))]
use crate::call::worker;
#[cfg(all(unix, feature = "fork"))]
use crate::hooks::ForkPostInfo;

/// A `RandomSource` drawing directly from an `Rng`, with no bit-pool
/// recording. Used for arguments whose descriptor is not in autoshrink
/// mode, where there is nothing for a mutation tactic to replay against.
struct PlainSource<'a> {
    rng: &'a mut Rng,
}

impl<'a> RandomSource for PlainSource<'a> {
    fn random_bits(&mut self, n_bits: u32) -> u64 {
        assert!(n_bits <= 64);
        let mask = if n_bits == 64 {
            u64::MAX
        } else {
            (1u64 << n_bits) - 1
        };
        self.rng.next_u64() & mask
    }

    fn random_bits_bulk(&mut self, n_bits: u32, out: &mut Vec<u64>) {
        let mut remaining = n_bits;
        while remaining > 0 {
            let chunk = remaining.min(64);
            out.push(self.random_bits(chunk));
            remaining -= chunk;
        }
    }
}

/// Runtime state for one argument: its current value, and, if its
/// descriptor is in autoshrink mode, the bit-pool env driving that.
struct ArgSlot<'d, T: TypeInfo> {
    descriptor: &'d T,
    value: T::Value,
    autoshrink_env: Option<AutoshrinkEnv>,
    pending: Option<(T::Value, Option<BitPool>)>,
    last_action: Option<crate::autoshrink::model::Action>,
}

impl<'d, T: TypeInfo> ArgSlot<'d, T> {
    fn alloc(
        descriptor: &'d T,
        arg_index: u8,
        rng: &mut Rng,
        shrink_seed: u64,
        max_failed_shrinks: usize,
    ) -> Option<Self> {
        if descriptor.uses_autoshrink() {
            let (value, mut env) =
                autoshrink::alloc_with_fresh_pool(descriptor, arg_index, rng, shrink_seed)?;
            env.set_max_failed_shrinks(max_failed_shrinks);
            Some(ArgSlot {
                descriptor,
                value,
                autoshrink_env: Some(env),
                pending: None,
                last_action: None,
            })
        } else {
            let mut src = PlainSource { rng };
            let value = descriptor.alloc(&mut src)?;
            Some(ArgSlot {
                descriptor,
                value,
                autoshrink_env: None,
                pending: None,
                last_action: None,
            })
        }
    }

    fn hash(&self) -> Option<u64> {
        match &self.autoshrink_env {
            Some(env) => Some(autoshrink::hash_pool(env.pool())),
            None => self.descriptor.hash(&self.value),
        }
    }

    fn is_shrinkable(&self) -> bool {
        self.descriptor.is_shrinkable()
    }

    /// Attempt shrink tactic `tactic`, stashing the candidate (and, in
    /// autoshrink mode, its candidate pool) in `self.pending` on success.
    fn try_shrink(&mut self, tactic: u32, rng: &mut Rng) -> ShrinkOutcome {
        if let Some(env) = self.autoshrink_env.as_mut() {
            let (outcome, candidate, action) =
                autoshrink::shrink(self.descriptor, env, tactic, rng);
            self.last_action = action;
            if let Some((value, pool)) = candidate {
                self.pending = Some((value, Some(pool)));
            }
            outcome
        } else {
            let (outcome, candidate) = self.descriptor.shrink(&self.value, tactic);
            if let Some(value) = candidate {
                self.pending = Some((value, None));
            }
            outcome
        }
    }

    fn pending_value(&self) -> &T::Value {
        &self
            .pending
            .as_ref()
            .expect("pending candidate must be set")
            .0
    }

    fn pending_hash(&self) -> Option<u64> {
        let (value, pool) = self
            .pending
            .as_ref()
            .expect("pending candidate must be set");
        match pool {
            Some(p) => Some(autoshrink::hash_pool(p)),
            None => self.descriptor.hash(value),
        }
    }

    fn discard_pending(&mut self) {
        self.pending = None;
    }

    fn commit_pending(&mut self) {
        let (value, pool) = self
            .pending
            .take()
            .expect("pending candidate must be set");
        self.value = value;
        if let Some(pool) = pool {
            let env = self
                .autoshrink_env
                .as_mut()
                .expect("a pool-bearing candidate implies an autoshrink env");
            env.replace_pool(pool);
        }
    }

    /// Report the outcome of actually calling the property with the
    /// pending candidate, feeding the autoshrink model if this argument is
    /// in autoshrink mode.
    fn note_trial_result(&mut self, property_failed: bool) {
        if let (Some(env), Some(action)) = (self.autoshrink_env.as_mut(), self.last_action) {
            autoshrink::note_trial_result(env, action, property_failed);
        }
    }
}

/// Turn a vector of per-argument hashes into a single hash buffer, or
/// `None` if any argument's hash is unavailable, disabling dedup for the
/// whole property (matching the rule that Bloom dedup only applies when
/// every argument supplies a hash).
fn complete_hashes(hashes: &[Option<u64>]) -> Option<Vec<u64>> {
    hashes.iter().copied().collect()
}

/// Check the Bloom filter for `hashes`, returning `true` (a duplicate) and
/// leaving the filter untouched, or `false` and marking the tuple as seen.
/// A no-op (always reports "not seen") whenever `bloom` is `None` or any
/// argument's hash is unavailable.
fn check_and_mark(bloom: Option<&mut BloomFilter>, hashes: &[Option<u64>]) -> bool {
    let bloom = match bloom {
        Some(b) => b,
        None => return false,
    };
    let full = match complete_hashes(hashes) {
        Some(f) => f,
        None => return false,
    };
    let bytes = call::hash_bytes(&full);
    if bloom.contains(&bytes) {
        true
    } else {
        bloom.insert(&bytes);
        false
    }
}

/// Running tallies for one trial's shrink loop.
#[derive(Default)]
struct ShrinkCounters {
    shrink_count: u32,
    successful_shrinks: u32,
    failed_shrinks: u32,
}

/// Context threaded through every hook call for one trial's shrink loop.
struct TrialCtx {
    prop_name: &'static str,
    trial_id: u32,
    trial_seed: u64,
}

/// What happened while trying to shrink one argument by one full pass over
/// its tactics.
enum ArgShrinkResult {
    Progress,
    DeadEnd,
    Halt,
}

/// Attempt to simplify one argument as much as possible, trying each
/// tactic in turn. `call_with_candidate` calls the property with every
/// other argument held at its current value and this one substituted with
/// the candidate. `hashes_with_candidate` builds the full per-argument
/// hash tuple given this argument's candidate hash.
#[allow(clippy::too_many_arguments)]
fn attempt_to_shrink_arg<T: TypeInfo>(
    slot: &mut ArgSlot<T>,
    arg_index: u8,
    mut call_with_candidate: impl FnMut(&T::Value) -> CallResult,
    mut hashes_with_candidate: impl FnMut(Option<u64>) -> Vec<Option<u64>>,
    counters: &mut ShrinkCounters,
    hooks: &Hooks,
    ctx: &TrialCtx,
    max_tactics: u32,
    bloom: &mut Option<BloomFilter>,
    rng: &mut Rng,
    verbose: u8,
) -> Result<ArgShrinkResult, FuzzError> {
    if !slot.is_shrinkable() {
        return Ok(ArgShrinkResult::DeadEnd);
    }

    for tactic in 0..max_tactics {
        let pre_info = ShrinkPreInfo {
            prop_name: ctx.prop_name,
            trial_id: ctx.trial_id,
            arg_index,
            tactic,
            shrink_count: counters.shrink_count,
        };
        match Hooks::run(&hooks.shrink_pre, &pre_info) {
            HookRun::Halt => return Ok(ArgShrinkResult::Halt),
            HookRun::Error => {
                return Err(FuzzError::Misuse(Reason::new("shrink_pre hook errored")))
            }
            HookRun::Continue | HookRun::Repeat | HookRun::RepeatOnce => {}
        }

        let outcome = slot.try_shrink(tactic, rng);
        counters.shrink_count += 1;

        let post_state = match outcome {
            ShrinkOutcome::Ok => ShrinkPostState::Shrunk,
            ShrinkOutcome::NoMoreTactics => ShrinkPostState::DoneShrinking,
            ShrinkOutcome::DeadEnd | ShrinkOutcome::Error => ShrinkPostState::ShrinkFailed,
        };
        let post_info = ShrinkPostInfo {
            prop_name: ctx.prop_name,
            trial_id: ctx.trial_id,
            arg_index,
            tactic,
            state: post_state,
        };
        match Hooks::run(&hooks.shrink_post, &post_info) {
            HookRun::Halt => {
                slot.discard_pending();
                return Ok(ArgShrinkResult::Halt);
            }
            HookRun::Error => {
                slot.discard_pending();
                return Err(FuzzError::Misuse(Reason::new("shrink_post hook errored")));
            }
            HookRun::Continue | HookRun::Repeat | HookRun::RepeatOnce => {}
        }

        match outcome {
            ShrinkOutcome::NoMoreTactics => return Ok(ArgShrinkResult::DeadEnd),
            ShrinkOutcome::DeadEnd | ShrinkOutcome::Error => continue,
            ShrinkOutcome::Ok => {}
        }

        let candidate_hash = slot.pending_hash();
        let hashes = hashes_with_candidate(candidate_hash);
        if check_and_mark(bloom.as_mut(), &hashes) {
            slot.discard_pending();
            continue;
        }

        let mut repeated = false;
        let result = loop {
            let res = call_with_candidate(slot.pending_value());
            let trial_post_info = ShrinkTrialPostInfo {
                prop_name: ctx.prop_name,
                trial_id: ctx.trial_id,
                arg_index,
                tactic,
                result: res,
                successful_shrinks: counters.successful_shrinks,
                failed_shrinks: counters.failed_shrinks,
            };
            match Hooks::run(&hooks.shrink_trial_post, &trial_post_info) {
                HookRun::Repeat => {
                    repeated = true;
                    continue;
                }
                HookRun::RepeatOnce if !repeated => {
                    repeated = true;
                    continue;
                }
                HookRun::Halt => {
                    slot.discard_pending();
                    return Ok(ArgShrinkResult::Halt);
                }
                HookRun::Error => {
                    slot.discard_pending();
                    return Err(FuzzError::Misuse(Reason::new(
                        "shrink_trial_post hook errored",
                    )));
                }
                HookRun::Continue | HookRun::RepeatOnce => break res,
            }
        };

        let property_failed = matches!(result, CallResult::Fail);
        if property_failed {
            counters.successful_shrinks += 1;
        } else {
            counters.failed_shrinks += 1;
        }
        slot.note_trial_result(property_failed);

        match result {
            CallResult::Ok | CallResult::Skip => {
                slot.discard_pending();
                continue;
            }
            CallResult::Fail => {
                slot.commit_pending();
                if verbose >= 2 {
                    eprintln!(
                        "autoshrink: {} trial {} arg {} shrunk via tactic {}",
                        ctx.prop_name, ctx.trial_id, arg_index, tactic
                    );
                }
                return Ok(ArgShrinkResult::Progress);
            }
            CallResult::Error => {
                slot.discard_pending();
                return Err(FuzzError::PropertyError(Reason::new(
                    "property returned an error while shrinking",
                )));
            }
        }
    }
    Ok(ArgShrinkResult::DeadEnd)
}

/// Outer "while progress" shrink loop over every argument, greedily
/// simplifying each one as far as it will go before moving to the next,
/// restarting from the first argument whenever any argument made progress.
/// Each list entry is `(slot, arg_index, call_with_candidate,
/// hashes_with_candidate)`, written out explicitly per arity by the
/// `run1`..`run7` functions below (each slot's candidate closures close
/// directly over the sibling arguments' plain local variable names, so no
/// macro expansion is needed to "see" the whole argument list at once).
macro_rules! run_shrink_loop {
    ($hooks:expr, $ctx:expr, $max_tactics:expr, $bloom:expr, $rng:expr, $verbose:expr,
     [ $( ($slot:expr, $idx:expr, $call:expr, $hashfn:expr) ),+ $(,)? ]) => {{
        let mut counters = ShrinkCounters::default();
        let mut halted = false;
        let mut err = None;
        'outer: loop {
            let mut progress = false;
            $(
                loop {
                    match attempt_to_shrink_arg(
                        $slot, $idx, $call, $hashfn,
                        &mut counters, $hooks, $ctx, $max_tactics, $bloom, $rng, $verbose,
                    ) {
                        Ok(ArgShrinkResult::Progress) => {
                            progress = true;
                            continue;
                        }
                        Ok(ArgShrinkResult::DeadEnd) => break,
                        Ok(ArgShrinkResult::Halt) => {
                            halted = true;
                            break 'outer;
                        }
                        Err(e) => {
                            err = Some(e);
                            break 'outer;
                        }
                    }
                }
            )+
            if !progress {
                break;
            }
        }
        (halted, err)
    }};
}

/// The run-level hook info for `run_pre`/`run_post`.
fn run_info(name: &'static str, config: &RunConfig, run_seed: u64) -> RunInfo<'static> {
    RunInfo {
        prop_name: name,
        total_trials: config.trials,
        run_seed,
    }
}

fn derive_run_seed(config: &RunConfig) -> u64 {
    match config.seed {
        Seed::Fixed(s) => s,
        Seed::Random => {
            // No OS entropy source is wired in; a time-varying seed still
            // needs *some* unpredictable input, so this falls back to a
            // fixed constant scrambled by the process's address space
            // layout, which varies run to run under ASLR.
            let addr = &config as *const _ as u64;
            let mut rng = Rng::new(addr ^ 0x2545F4914F6CDD1D);
            rng.next_u64()
        }
    }
}

/// `true` if a hook result should halt the run/shrink loop; errors are
/// turned into `Err` directly.
fn gate(what: &'static str, result: HookRun) -> Result<bool, FuzzError> {
    match result {
        HookRun::Halt => Ok(true),
        HookRun::Error => Err(FuzzError::Misuse(Reason::new(what))),
        HookRun::Continue | HookRun::Repeat | HookRun::RepeatOnce => Ok(false),
    }
}

/// What to do after a trial's property call and `trial_post` hook.
enum AfterTrial {
    Continue,
    Halt,
    Shrink,
}

#[allow(clippy::too_many_arguments)]
fn after_trial(
    hooks: &Hooks,
    name: &'static str,
    trial_id: u32,
    trial_seed: u64,
    result: CallResult,
    pass: &mut u32,
    fail: &mut u32,
    skip: &mut u32,
    dup: u32,
    verbose: u8,
) -> Result<AfterTrial, FuzzError> {
    match result {
        CallResult::Ok => *pass += 1,
        CallResult::Skip => *skip += 1,
        CallResult::Fail => *fail += 1,
        CallResult::Error => {}
    }
    if verbose >= 1 {
        eprintln!("autoshrink: {name} trial {trial_id} (seed {trial_seed}) -> {result:?}");
    }
    let trial_post_info = TrialPostInfo {
        prop_name: name,
        trial_id,
        trial_seed,
        result,
        pass: *pass,
        fail: *fail,
        skip: *skip,
        dup,
    };
    if gate(
        "trial_post hook errored",
        Hooks::run(&hooks.trial_post, &trial_post_info),
    )? {
        return Ok(AfterTrial::Halt);
    }
    match result {
        CallResult::Error => Err(FuzzError::PropertyError(Reason::new(
            "property returned an error",
        ))),
        CallResult::Fail => Ok(AfterTrial::Shrink),
        CallResult::Ok | CallResult::Skip => Ok(AfterTrial::Continue),
    }
}

/// Call `prop` directly, or (when the `fork` feature is enabled and the
/// configuration asks for it) isolate the call in a worker process.
#[cfg(all(unix, feature = "fork"))]
fn call_property<F>(
    prop: F,
    config: &RunConfig,
    hooks: &Hooks,
    fork_info: &ForkPostInfo<'static>,
) -> Result<CallResult, FuzzError>
where
    F: FnOnce() -> CallResult,
{
    if config.fork.active() {
        let post_fork = || Hooks::run(&hooks.fork_post, fork_info);
        worker::call_in_worker(prop, &config.fork, Some(&post_fork))
    } else {
        Ok(prop())
    }
}

#[cfg(not(all(unix, feature = "fork")))]
fn call_property<F>(prop: F, _config: &RunConfig, _hooks: &Hooks) -> Result<CallResult, FuzzError>
where
    F: FnOnce() -> CallResult,
{
    Ok(prop())
}

/// Invoke the `counterexample` hook once a minimal failing input has been
/// found.
fn report_counterexample(
    hooks: &Hooks,
    name: &'static str,
    trial_id: u32,
    trial_seed: u64,
) -> Result<(), FuzzError> {
    let info = CounterexampleInfo {
        prop_name: name,
        trial_id,
        trial_seed,
    };
    match Hooks::run(&hooks.counterexample, &info) {
        HookRun::Error => Err(FuzzError::Misuse(Reason::new(
            "counterexample hook errored",
        ))),
        _ => Ok(()),
    }
}

/// Run a property taking one argument for up to `config.trials` trials,
/// shrinking the argument on the first failure.
pub fn run1<D1, F>(
    name: &'static str,
    descriptors: (&D1,),
    prop: F,
    config: RunConfig,
    hooks: Hooks,
) -> Result<RunOutcome<(D1::Value,)>, FuzzError>
where
    D1: TypeInfo,
    F: Fn(&D1::Value) -> CallResult,
{
    let (d1,) = descriptors;
    let run_seed = derive_run_seed(&config);

    if gate(
        "run_pre hook errored",
        Hooks::run(&hooks.run_pre, &run_info(name, &config, run_seed)),
    )? {
        return Ok(RunOutcome::Halted);
    }

    let mut bloom = if config.bloom_bits == 0 {
        None
    } else {
        Some(BloomFilter::new(config.bloom_bits))
    };
    let mut pass = 0u32;
    let mut fail = 0u32;
    let mut skip = 0u32;
    let mut dup = 0u32;
    let mut outcome = RunOutcome::Ok;

    'trials: for trial_id in 0..config.trials {
        let trial_seed = rng::trial_seed(run_seed, trial_id);
        let mut gen_rng = Rng::new(trial_seed);

        let trial_pre_info = TrialPreInfo {
            prop_name: name,
            trial_id,
            trial_seed,
        };
        if gate(
            "gen_args_pre hook errored",
            Hooks::run(&hooks.gen_args_pre, &trial_pre_info),
        )? {
            outcome = RunOutcome::Halted;
            break 'trials;
        }

        let mut d1 = match ArgSlot::alloc(d1, 0, &mut gen_rng, trial_seed, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };

        if check_and_mark(bloom.as_mut(), &[d1.hash()]) {
            dup += 1;
            continue 'trials;
        }

        if gate(
            "trial_pre hook errored",
            Hooks::run(&hooks.trial_pre, &trial_pre_info),
        )? {
            outcome = RunOutcome::Halted;
            break 'trials;
        }

        #[cfg(all(unix, feature = "fork"))]
        let result = {
            let fork_info = ForkPostInfo {
                prop_name: name,
                total_trials: config.trials,
                failures: fail,
                run_seed,
                arity: 1,
            };
            call_property(|| prop(&d1.value), &config, &hooks, &fork_info)?
        };
        #[cfg(not(all(unix, feature = "fork")))]
        let result = call_property(|| prop(&d1.value), &config, &hooks)?;

        match after_trial(&hooks, name, trial_id, trial_seed, result, &mut pass, &mut fail, &mut skip, dup, config.verbose)? {
            AfterTrial::Continue => continue 'trials,
            AfterTrial::Halt => {
                outcome = RunOutcome::Halted;
                break 'trials;
            }
            AfterTrial::Shrink => {}
        }

        let ctx = TrialCtx {
            prop_name: name,
            trial_id,
            trial_seed,
        };
        let max_tactics = config.max_tactics;
        let (_halted, err) = run_shrink_loop!(
            &hooks, &ctx, max_tactics, &mut bloom, &mut gen_rng, config.verbose,
            [ (
                &mut d1,
                0u8,
                |candidate: &D1::Value| prop(candidate),
                |h: Option<u64>| vec![h]
            ) ]
        );
        if let Some(e) = err {
            return Err(e);
        }

        report_counterexample(&hooks, name, trial_id, trial_seed)?;
        outcome = RunOutcome::Fail(Reason::new("property failed"), (d1.value,));
        break 'trials;
    }

    let _ = Hooks::run(&hooks.run_post, &run_info(name, &config, run_seed));
    Ok(outcome)
}

/// Run a property taking two arguments for up to `config.trials` trials,
/// shrinking each argument (breadth-first, greedily) on the first failure.
pub fn run2<D1, D2, F>(
    name: &'static str,
    descriptors: (&D1, &D2),
    prop: F,
    config: RunConfig,
    hooks: Hooks,
) -> Result<RunOutcome<(D1::Value, D2::Value)>, FuzzError>
where
    D1: TypeInfo,
    D2: TypeInfo,
    F: Fn(&D1::Value, &D2::Value) -> CallResult,
{
    let (d1, d2) = descriptors;
    let run_seed = derive_run_seed(&config);

    if gate(
        "run_pre hook errored",
        Hooks::run(&hooks.run_pre, &run_info(name, &config, run_seed)),
    )? {
        return Ok(RunOutcome::Halted);
    }

    let mut bloom = if config.bloom_bits == 0 {
        None
    } else {
        Some(BloomFilter::new(config.bloom_bits))
    };
    let mut pass = 0u32;
    let mut fail = 0u32;
    let mut skip = 0u32;
    let mut dup = 0u32;
    let mut outcome = RunOutcome::Ok;

    'trials: for trial_id in 0..config.trials {
        let trial_seed = rng::trial_seed(run_seed, trial_id);
        let mut gen_rng = Rng::new(trial_seed);

        let trial_pre_info = TrialPreInfo {
            prop_name: name,
            trial_id,
            trial_seed,
        };
        if gate(
            "gen_args_pre hook errored",
            Hooks::run(&hooks.gen_args_pre, &trial_pre_info),
        )? {
            outcome = RunOutcome::Halted;
            break 'trials;
        }

        let mut d1 = match ArgSlot::alloc(d1, 0, &mut gen_rng, trial_seed ^ 1, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d2 = match ArgSlot::alloc(d2, 1, &mut gen_rng, trial_seed ^ 2, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };

        if check_and_mark(bloom.as_mut(), &[d1.hash(), d2.hash()]) {
            dup += 1;
            continue 'trials;
        }

        if gate(
            "trial_pre hook errored",
            Hooks::run(&hooks.trial_pre, &trial_pre_info),
        )? {
            outcome = RunOutcome::Halted;
            break 'trials;
        }

        #[cfg(all(unix, feature = "fork"))]
        let result = {
            let fork_info = ForkPostInfo {
                prop_name: name,
                total_trials: config.trials,
                failures: fail,
                run_seed,
                arity: 2,
            };
            call_property(|| prop(&d1.value, &d2.value), &config, &hooks, &fork_info)?
        };
        #[cfg(not(all(unix, feature = "fork")))]
        let result = call_property(|| prop(&d1.value, &d2.value), &config, &hooks)?;

        match after_trial(&hooks, name, trial_id, trial_seed, result, &mut pass, &mut fail, &mut skip, dup, config.verbose)? {
            AfterTrial::Continue => continue 'trials,
            AfterTrial::Halt => {
                outcome = RunOutcome::Halted;
                break 'trials;
            }
            AfterTrial::Shrink => {}
        }

        let ctx = TrialCtx {
            prop_name: name,
            trial_id,
            trial_seed,
        };
        let max_tactics = config.max_tactics;
        let (_halted, err) = run_shrink_loop!(
            &hooks, &ctx, max_tactics, &mut bloom, &mut gen_rng, config.verbose,
            [
                (
                    &mut d1,
                    0u8,
                    |candidate: &D1::Value| prop(candidate, &d2.value),
                    |h: Option<u64>| vec![h, d2.hash()]
                ),
                (
                    &mut d2,
                    1u8,
                    |candidate: &D2::Value| prop(&d1.value, candidate),
                    |h: Option<u64>| vec![d1.hash(), h]
                )
            ]
        );
        if let Some(e) = err {
            return Err(e);
        }

        report_counterexample(&hooks, name, trial_id, trial_seed)?;
        outcome = RunOutcome::Fail(Reason::new("property failed"), (d1.value, d2.value));
        break 'trials;
    }

    let _ = Hooks::run(&hooks.run_post, &run_info(name, &config, run_seed));
    Ok(outcome)
}

/// Run a property taking three arguments for up to `config.trials` trials,
/// shrinking each argument (breadth-first, greedily) on the first failure.
pub fn run3<D1, D2, D3, F>(
    name: &'static str,
    descriptors: (&D1, &D2, &D3),
    prop: F,
    config: RunConfig,
    hooks: Hooks,
) -> Result<RunOutcome<(D1::Value, D2::Value, D3::Value)>, FuzzError>
where
    D1: TypeInfo,
    D2: TypeInfo,
    D3: TypeInfo,
    F: Fn(&D1::Value, &D2::Value, &D3::Value) -> CallResult,
{
    let (d1, d2, d3) = descriptors;
    let run_seed = derive_run_seed(&config);

    if gate(
        "run_pre hook errored",
        Hooks::run(&hooks.run_pre, &run_info(name, &config, run_seed)),
    )? {
        return Ok(RunOutcome::Halted);
    }

    let mut bloom = if config.bloom_bits == 0 {
        None
    } else {
        Some(BloomFilter::new(config.bloom_bits))
    };
    let mut pass = 0u32;
    let mut fail = 0u32;
    let mut skip = 0u32;
    let mut dup = 0u32;
    let mut outcome = RunOutcome::Ok;

    'trials: for trial_id in 0..config.trials {
        let trial_seed = rng::trial_seed(run_seed, trial_id);
        let mut gen_rng = Rng::new(trial_seed);

        let trial_pre_info = TrialPreInfo {
            prop_name: name,
            trial_id,
            trial_seed,
        };
        if gate(
            "gen_args_pre hook errored",
            Hooks::run(&hooks.gen_args_pre, &trial_pre_info),
        )? {
            outcome = RunOutcome::Halted;
            break 'trials;
        }

        let mut d1 = match ArgSlot::alloc(d1, 0, &mut gen_rng, trial_seed ^ 1, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d2 = match ArgSlot::alloc(d2, 1, &mut gen_rng, trial_seed ^ 2, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d3 = match ArgSlot::alloc(d3, 2, &mut gen_rng, trial_seed ^ 3, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };

        if check_and_mark(bloom.as_mut(), &[d1.hash(), d2.hash(), d3.hash()]) {
            dup += 1;
            continue 'trials;
        }

        if gate(
            "trial_pre hook errored",
            Hooks::run(&hooks.trial_pre, &trial_pre_info),
        )? {
            outcome = RunOutcome::Halted;
            break 'trials;
        }

        #[cfg(all(unix, feature = "fork"))]
        let result = {
            let fork_info = ForkPostInfo {
                prop_name: name,
                total_trials: config.trials,
                failures: fail,
                run_seed,
                arity: 3,
            };
            call_property(
                || prop(&d1.value, &d2.value, &d3.value),
                &config,
                &hooks,
                &fork_info,
            )?
        };
        #[cfg(not(all(unix, feature = "fork")))]
        let result = call_property(|| prop(&d1.value, &d2.value, &d3.value), &config, &hooks)?;

        match after_trial(&hooks, name, trial_id, trial_seed, result, &mut pass, &mut fail, &mut skip, dup, config.verbose)? {
            AfterTrial::Continue => continue 'trials,
            AfterTrial::Halt => {
                outcome = RunOutcome::Halted;
                break 'trials;
            }
            AfterTrial::Shrink => {}
        }

        let ctx = TrialCtx {
            prop_name: name,
            trial_id,
            trial_seed,
        };
        let max_tactics = config.max_tactics;
        let (_halted, err) = run_shrink_loop!(
            &hooks, &ctx, max_tactics, &mut bloom, &mut gen_rng, config.verbose,
            [
                (
                    &mut d1,
                    0u8,
                    |candidate: &D1::Value| prop(candidate, &d2.value, &d3.value),
                    |h: Option<u64>| vec![h, d2.hash(), d3.hash()]
                ),
                (
                    &mut d2,
                    1u8,
                    |candidate: &D2::Value| prop(&d1.value, candidate, &d3.value),
                    |h: Option<u64>| vec![d1.hash(), h, d3.hash()]
                ),
                (
                    &mut d3,
                    2u8,
                    |candidate: &D3::Value| prop(&d1.value, &d2.value, candidate),
                    |h: Option<u64>| vec![d1.hash(), d2.hash(), h]
                )
            ]
        );
        if let Some(e) = err {
            return Err(e);
        }

        report_counterexample(&hooks, name, trial_id, trial_seed)?;
        outcome = RunOutcome::Fail(Reason::new("property failed"), (d1.value, d2.value, d3.value));
        break 'trials;
    }

    let _ = Hooks::run(&hooks.run_post, &run_info(name, &config, run_seed));
    Ok(outcome)
}

/// Run a property taking four arguments for up to `config.trials` trials,
/// shrinking each argument (breadth-first, greedily) on the first failure.
pub fn run4<D1, D2, D3, D4, F>(
    name: &'static str,
    descriptors: (&D1, &D2, &D3, &D4),
    prop: F,
    config: RunConfig,
    hooks: Hooks,
) -> Result<RunOutcome<(D1::Value, D2::Value, D3::Value, D4::Value)>, FuzzError>
where
    D1: TypeInfo,
    D2: TypeInfo,
    D3: TypeInfo,
    D4: TypeInfo,
    F: Fn(&D1::Value, &D2::Value, &D3::Value, &D4::Value) -> CallResult,
{
    let (d1, d2, d3, d4) = descriptors;
    let run_seed = derive_run_seed(&config);

    if gate(
        "run_pre hook errored",
        Hooks::run(&hooks.run_pre, &run_info(name, &config, run_seed)),
    )? {
        return Ok(RunOutcome::Halted);
    }

    let mut bloom = if config.bloom_bits == 0 {
        None
    } else {
        Some(BloomFilter::new(config.bloom_bits))
    };
    let mut pass = 0u32;
    let mut fail = 0u32;
    let mut skip = 0u32;
    let mut dup = 0u32;
    let mut outcome = RunOutcome::Ok;

    'trials: for trial_id in 0..config.trials {
        let trial_seed = rng::trial_seed(run_seed, trial_id);
        let mut gen_rng = Rng::new(trial_seed);

        let trial_pre_info = TrialPreInfo {
            prop_name: name,
            trial_id,
            trial_seed,
        };
        if gate(
            "gen_args_pre hook errored",
            Hooks::run(&hooks.gen_args_pre, &trial_pre_info),
        )? {
            outcome = RunOutcome::Halted;
            break 'trials;
        }

        let mut d1 = match ArgSlot::alloc(d1, 0, &mut gen_rng, trial_seed ^ 1, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d2 = match ArgSlot::alloc(d2, 1, &mut gen_rng, trial_seed ^ 2, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d3 = match ArgSlot::alloc(d3, 2, &mut gen_rng, trial_seed ^ 3, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d4 = match ArgSlot::alloc(d4, 3, &mut gen_rng, trial_seed ^ 4, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };

        if check_and_mark(bloom.as_mut(), &[d1.hash(), d2.hash(), d3.hash(), d4.hash()]) {
            dup += 1;
            continue 'trials;
        }

        if gate(
            "trial_pre hook errored",
            Hooks::run(&hooks.trial_pre, &trial_pre_info),
        )? {
            outcome = RunOutcome::Halted;
            break 'trials;
        }

        #[cfg(all(unix, feature = "fork"))]
        let result = {
            let fork_info = ForkPostInfo {
                prop_name: name,
                total_trials: config.trials,
                failures: fail,
                run_seed,
                arity: 4,
            };
            call_property(
                || prop(&d1.value, &d2.value, &d3.value, &d4.value),
                &config,
                &hooks,
                &fork_info,
            )?
        };
        #[cfg(not(all(unix, feature = "fork")))]
        let result = call_property(
            || prop(&d1.value, &d2.value, &d3.value, &d4.value),
            &config,
            &hooks,
        )?;

        match after_trial(&hooks, name, trial_id, trial_seed, result, &mut pass, &mut fail, &mut skip, dup, config.verbose)? {
            AfterTrial::Continue => continue 'trials,
            AfterTrial::Halt => {
                outcome = RunOutcome::Halted;
                break 'trials;
            }
            AfterTrial::Shrink => {}
        }

        let ctx = TrialCtx {
            prop_name: name,
            trial_id,
            trial_seed,
        };
        let max_tactics = config.max_tactics;
        let (_halted, err) = run_shrink_loop!(
            &hooks, &ctx, max_tactics, &mut bloom, &mut gen_rng, config.verbose,
            [
                (
                    &mut d1,
                    0u8,
                    |candidate: &D1::Value| prop(candidate, &d2.value, &d3.value, &d4.value),
                    |h: Option<u64>| vec![h, d2.hash(), d3.hash(), d4.hash()]
                ),
                (
                    &mut d2,
                    1u8,
                    |candidate: &D2::Value| prop(&d1.value, candidate, &d3.value, &d4.value),
                    |h: Option<u64>| vec![d1.hash(), h, d3.hash(), d4.hash()]
                ),
                (
                    &mut d3,
                    2u8,
                    |candidate: &D3::Value| prop(&d1.value, &d2.value, candidate, &d4.value),
                    |h: Option<u64>| vec![d1.hash(), d2.hash(), h, d4.hash()]
                ),
                (
                    &mut d4,
                    3u8,
                    |candidate: &D4::Value| prop(&d1.value, &d2.value, &d3.value, candidate),
                    |h: Option<u64>| vec![d1.hash(), d2.hash(), d3.hash(), h]
                )
            ]
        );
        if let Some(e) = err {
            return Err(e);
        }

        report_counterexample(&hooks, name, trial_id, trial_seed)?;
        outcome = RunOutcome::Fail(
            Reason::new("property failed"),
            (d1.value, d2.value, d3.value, d4.value),
        );
        break 'trials;
    }

    let _ = Hooks::run(&hooks.run_post, &run_info(name, &config, run_seed));
    Ok(outcome)
}

/// Run a property taking five arguments for up to `config.trials` trials,
/// shrinking each argument (breadth-first, greedily) on the first failure.
#[allow(clippy::too_many_arguments)]
pub fn run5<D1, D2, D3, D4, D5, F>(
    name: &'static str,
    descriptors: (&D1, &D2, &D3, &D4, &D5),
    prop: F,
    config: RunConfig,
    hooks: Hooks,
) -> Result<RunOutcome<(D1::Value, D2::Value, D3::Value, D4::Value, D5::Value)>, FuzzError>
where
    D1: TypeInfo,
    D2: TypeInfo,
    D3: TypeInfo,
    D4: TypeInfo,
    D5: TypeInfo,
    F: Fn(&D1::Value, &D2::Value, &D3::Value, &D4::Value, &D5::Value) -> CallResult,
{
    let (d1, d2, d3, d4, d5) = descriptors;
    let run_seed = derive_run_seed(&config);

    if gate(
        "run_pre hook errored",
        Hooks::run(&hooks.run_pre, &run_info(name, &config, run_seed)),
    )? {
        return Ok(RunOutcome::Halted);
    }

    let mut bloom = if config.bloom_bits == 0 {
        None
    } else {
        Some(BloomFilter::new(config.bloom_bits))
    };
    let mut pass = 0u32;
    let mut fail = 0u32;
    let mut skip = 0u32;
    let mut dup = 0u32;
    let mut outcome = RunOutcome::Ok;

    'trials: for trial_id in 0..config.trials {
        let trial_seed = rng::trial_seed(run_seed, trial_id);
        let mut gen_rng = Rng::new(trial_seed);

        let trial_pre_info = TrialPreInfo {
            prop_name: name,
            trial_id,
            trial_seed,
        };
        if gate(
            "gen_args_pre hook errored",
            Hooks::run(&hooks.gen_args_pre, &trial_pre_info),
        )? {
            outcome = RunOutcome::Halted;
            break 'trials;
        }

        let mut d1 = match ArgSlot::alloc(d1, 0, &mut gen_rng, trial_seed ^ 1, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d2 = match ArgSlot::alloc(d2, 1, &mut gen_rng, trial_seed ^ 2, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d3 = match ArgSlot::alloc(d3, 2, &mut gen_rng, trial_seed ^ 3, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d4 = match ArgSlot::alloc(d4, 3, &mut gen_rng, trial_seed ^ 4, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d5 = match ArgSlot::alloc(d5, 4, &mut gen_rng, trial_seed ^ 5, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };

        if check_and_mark(
            bloom.as_mut(),
            &[d1.hash(), d2.hash(), d3.hash(), d4.hash(), d5.hash()],
        ) {
            dup += 1;
            continue 'trials;
        }

        if gate(
            "trial_pre hook errored",
            Hooks::run(&hooks.trial_pre, &trial_pre_info),
        )? {
            outcome = RunOutcome::Halted;
            break 'trials;
        }

        #[cfg(all(unix, feature = "fork"))]
        let result = {
            let fork_info = ForkPostInfo {
                prop_name: name,
                total_trials: config.trials,
                failures: fail,
                run_seed,
                arity: 5,
            };
            call_property(
                || prop(&d1.value, &d2.value, &d3.value, &d4.value, &d5.value),
                &config,
                &hooks,
                &fork_info,
            )?
        };
        #[cfg(not(all(unix, feature = "fork")))]
        let result = call_property(
            || prop(&d1.value, &d2.value, &d3.value, &d4.value, &d5.value),
            &config,
            &hooks,
        )?;

        match after_trial(&hooks, name, trial_id, trial_seed, result, &mut pass, &mut fail, &mut skip, dup, config.verbose)? {
            AfterTrial::Continue => continue 'trials,
            AfterTrial::Halt => {
                outcome = RunOutcome::Halted;
                break 'trials;
            }
            AfterTrial::Shrink => {}
        }

        let ctx = TrialCtx {
            prop_name: name,
            trial_id,
            trial_seed,
        };
        let max_tactics = config.max_tactics;
        let (_halted, err) = run_shrink_loop!(
            &hooks, &ctx, max_tactics, &mut bloom, &mut gen_rng, config.verbose,
            [
                (
                    &mut d1,
                    0u8,
                    |candidate: &D1::Value| prop(candidate, &d2.value, &d3.value, &d4.value, &d5.value),
                    |h: Option<u64>| vec![h, d2.hash(), d3.hash(), d4.hash(), d5.hash()]
                ),
                (
                    &mut d2,
                    1u8,
                    |candidate: &D2::Value| prop(&d1.value, candidate, &d3.value, &d4.value, &d5.value),
                    |h: Option<u64>| vec![d1.hash(), h, d3.hash(), d4.hash(), d5.hash()]
                ),
                (
                    &mut d3,
                    2u8,
                    |candidate: &D3::Value| prop(&d1.value, &d2.value, candidate, &d4.value, &d5.value),
                    |h: Option<u64>| vec![d1.hash(), d2.hash(), h, d4.hash(), d5.hash()]
                ),
                (
                    &mut d4,
                    3u8,
                    |candidate: &D4::Value| prop(&d1.value, &d2.value, &d3.value, candidate, &d5.value),
                    |h: Option<u64>| vec![d1.hash(), d2.hash(), d3.hash(), h, d5.hash()]
                ),
                (
                    &mut d5,
                    4u8,
                    |candidate: &D5::Value| prop(&d1.value, &d2.value, &d3.value, &d4.value, candidate),
                    |h: Option<u64>| vec![d1.hash(), d2.hash(), d3.hash(), d4.hash(), h]
                )
            ]
        );
        if let Some(e) = err {
            return Err(e);
        }

        report_counterexample(&hooks, name, trial_id, trial_seed)?;
        outcome = RunOutcome::Fail(
            Reason::new("property failed"),
            (d1.value, d2.value, d3.value, d4.value, d5.value),
        );
        break 'trials;
    }

    let _ = Hooks::run(&hooks.run_post, &run_info(name, &config, run_seed));
    Ok(outcome)
}

/// Run a property taking six arguments for up to `config.trials` trials,
/// shrinking each argument (breadth-first, greedily) on the first failure.
#[allow(clippy::too_many_arguments)]
pub fn run6<D1, D2, D3, D4, D5, D6, F>(
    name: &'static str,
    descriptors: (&D1, &D2, &D3, &D4, &D5, &D6),
    prop: F,
    config: RunConfig,
    hooks: Hooks,
) -> Result<
    RunOutcome<(D1::Value, D2::Value, D3::Value, D4::Value, D5::Value, D6::Value)>,
    FuzzError,
>
where
    D1: TypeInfo,
    D2: TypeInfo,
    D3: TypeInfo,
    D4: TypeInfo,
    D5: TypeInfo,
    D6: TypeInfo,
    F: Fn(&D1::Value, &D2::Value, &D3::Value, &D4::Value, &D5::Value, &D6::Value) -> CallResult,
{
    let (d1, d2, d3, d4, d5, d6) = descriptors;
    let run_seed = derive_run_seed(&config);

    if gate(
        "run_pre hook errored",
        Hooks::run(&hooks.run_pre, &run_info(name, &config, run_seed)),
    )? {
        return Ok(RunOutcome::Halted);
    }

    let mut bloom = if config.bloom_bits == 0 {
        None
    } else {
        Some(BloomFilter::new(config.bloom_bits))
    };
    let mut pass = 0u32;
    let mut fail = 0u32;
    let mut skip = 0u32;
    let mut dup = 0u32;
    let mut outcome = RunOutcome::Ok;

    'trials: for trial_id in 0..config.trials {
        let trial_seed = rng::trial_seed(run_seed, trial_id);
        let mut gen_rng = Rng::new(trial_seed);

        let trial_pre_info = TrialPreInfo {
            prop_name: name,
            trial_id,
            trial_seed,
        };
        if gate(
            "gen_args_pre hook errored",
            Hooks::run(&hooks.gen_args_pre, &trial_pre_info),
        )? {
            outcome = RunOutcome::Halted;
            break 'trials;
        }

        let mut d1 = match ArgSlot::alloc(d1, 0, &mut gen_rng, trial_seed ^ 1, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d2 = match ArgSlot::alloc(d2, 1, &mut gen_rng, trial_seed ^ 2, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d3 = match ArgSlot::alloc(d3, 2, &mut gen_rng, trial_seed ^ 3, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d4 = match ArgSlot::alloc(d4, 3, &mut gen_rng, trial_seed ^ 4, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d5 = match ArgSlot::alloc(d5, 4, &mut gen_rng, trial_seed ^ 5, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d6 = match ArgSlot::alloc(d6, 5, &mut gen_rng, trial_seed ^ 6, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };

        if check_and_mark(
            bloom.as_mut(),
            &[d1.hash(), d2.hash(), d3.hash(), d4.hash(), d5.hash(), d6.hash()],
        ) {
            dup += 1;
            continue 'trials;
        }

        if gate(
            "trial_pre hook errored",
            Hooks::run(&hooks.trial_pre, &trial_pre_info),
        )? {
            outcome = RunOutcome::Halted;
            break 'trials;
        }

        #[cfg(all(unix, feature = "fork"))]
        let result = {
            let fork_info = ForkPostInfo {
                prop_name: name,
                total_trials: config.trials,
                failures: fail,
                run_seed,
                arity: 6,
            };
            call_property(
                || prop(&d1.value, &d2.value, &d3.value, &d4.value, &d5.value, &d6.value),
                &config,
                &hooks,
                &fork_info,
            )?
        };
        #[cfg(not(all(unix, feature = "fork")))]
        let result = call_property(
            || prop(&d1.value, &d2.value, &d3.value, &d4.value, &d5.value, &d6.value),
            &config,
            &hooks,
        )?;

        match after_trial(&hooks, name, trial_id, trial_seed, result, &mut pass, &mut fail, &mut skip, dup, config.verbose)? {
            AfterTrial::Continue => continue 'trials,
            AfterTrial::Halt => {
                outcome = RunOutcome::Halted;
                break 'trials;
            }
            AfterTrial::Shrink => {}
        }

        let ctx = TrialCtx {
            prop_name: name,
            trial_id,
            trial_seed,
        };
        let max_tactics = config.max_tactics;
        let (_halted, err) = run_shrink_loop!(
            &hooks, &ctx, max_tactics, &mut bloom, &mut gen_rng, config.verbose,
            [
                (
                    &mut d1,
                    0u8,
                    |candidate: &D1::Value| prop(candidate, &d2.value, &d3.value, &d4.value, &d5.value, &d6.value),
                    |h: Option<u64>| vec![h, d2.hash(), d3.hash(), d4.hash(), d5.hash(), d6.hash()]
                ),
                (
                    &mut d2,
                    1u8,
                    |candidate: &D2::Value| prop(&d1.value, candidate, &d3.value, &d4.value, &d5.value, &d6.value),
                    |h: Option<u64>| vec![d1.hash(), h, d3.hash(), d4.hash(), d5.hash(), d6.hash()]
                ),
                (
                    &mut d3,
                    2u8,
                    |candidate: &D3::Value| prop(&d1.value, &d2.value, candidate, &d4.value, &d5.value, &d6.value),
                    |h: Option<u64>| vec![d1.hash(), d2.hash(), h, d4.hash(), d5.hash(), d6.hash()]
                ),
                (
                    &mut d4,
                    3u8,
                    |candidate: &D4::Value| prop(&d1.value, &d2.value, &d3.value, candidate, &d5.value, &d6.value),
                    |h: Option<u64>| vec![d1.hash(), d2.hash(), d3.hash(), h, d5.hash(), d6.hash()]
                ),
                (
                    &mut d5,
                    4u8,
                    |candidate: &D5::Value| prop(&d1.value, &d2.value, &d3.value, &d4.value, candidate, &d6.value),
                    |h: Option<u64>| vec![d1.hash(), d2.hash(), d3.hash(), d4.hash(), h, d6.hash()]
                ),
                (
                    &mut d6,
                    5u8,
                    |candidate: &D6::Value| prop(&d1.value, &d2.value, &d3.value, &d4.value, &d5.value, candidate),
                    |h: Option<u64>| vec![d1.hash(), d2.hash(), d3.hash(), d4.hash(), d5.hash(), h]
                )
            ]
        );
        if let Some(e) = err {
            return Err(e);
        }

        report_counterexample(&hooks, name, trial_id, trial_seed)?;
        outcome = RunOutcome::Fail(
            Reason::new("property failed"),
            (d1.value, d2.value, d3.value, d4.value, d5.value, d6.value),
        );
        break 'trials;
    }

    let _ = Hooks::run(&hooks.run_post, &run_info(name, &config, run_seed));
    Ok(outcome)
}

/// Run a property taking seven arguments for up to `config.trials`
/// trials, shrinking each argument (breadth-first, greedily) on the first
/// failure.
#[allow(clippy::too_many_arguments)]
pub fn run7<D1, D2, D3, D4, D5, D6, D7, F>(
    name: &'static str,
    descriptors: (&D1, &D2, &D3, &D4, &D5, &D6, &D7),
    prop: F,
    config: RunConfig,
    hooks: Hooks,
) -> Result<
    RunOutcome<(
        D1::Value,
        D2::Value,
        D3::Value,
        D4::Value,
        D5::Value,
        D6::Value,
        D7::Value,
    )>,
    FuzzError,
>
where
    D1: TypeInfo,
    D2: TypeInfo,
    D3: TypeInfo,
    D4: TypeInfo,
    D5: TypeInfo,
    D6: TypeInfo,
    D7: TypeInfo,
    F: Fn(
        &D1::Value,
        &D2::Value,
        &D3::Value,
        &D4::Value,
        &D5::Value,
        &D6::Value,
        &D7::Value,
    ) -> CallResult,
{
    let (d1, d2, d3, d4, d5, d6, d7) = descriptors;
    let run_seed = derive_run_seed(&config);

    if gate(
        "run_pre hook errored",
        Hooks::run(&hooks.run_pre, &run_info(name, &config, run_seed)),
    )? {
        return Ok(RunOutcome::Halted);
    }

    let mut bloom = if config.bloom_bits == 0 {
        None
    } else {
        Some(BloomFilter::new(config.bloom_bits))
    };
    let mut pass = 0u32;
    let mut fail = 0u32;
    let mut skip = 0u32;
    let mut dup = 0u32;
    let mut outcome = RunOutcome::Ok;

    'trials: for trial_id in 0..config.trials {
        let trial_seed = rng::trial_seed(run_seed, trial_id);
        let mut gen_rng = Rng::new(trial_seed);

        let trial_pre_info = TrialPreInfo {
            prop_name: name,
            trial_id,
            trial_seed,
        };
        if gate(
            "gen_args_pre hook errored",
            Hooks::run(&hooks.gen_args_pre, &trial_pre_info),
        )? {
            outcome = RunOutcome::Halted;
            break 'trials;
        }

        let mut d1 = match ArgSlot::alloc(d1, 0, &mut gen_rng, trial_seed ^ 1, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d2 = match ArgSlot::alloc(d2, 1, &mut gen_rng, trial_seed ^ 2, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d3 = match ArgSlot::alloc(d3, 2, &mut gen_rng, trial_seed ^ 3, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d4 = match ArgSlot::alloc(d4, 3, &mut gen_rng, trial_seed ^ 4, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d5 = match ArgSlot::alloc(d5, 4, &mut gen_rng, trial_seed ^ 5, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d6 = match ArgSlot::alloc(d6, 5, &mut gen_rng, trial_seed ^ 6, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };
        let mut d7 = match ArgSlot::alloc(d7, 6, &mut gen_rng, trial_seed ^ 7, config.max_failed_shrinks) {
            Some(s) => s,
            None => return Err(FuzzError::Resource(Reason::new("argument allocation failed"))),
        };

        if check_and_mark(
            bloom.as_mut(),
            &[
                d1.hash(),
                d2.hash(),
                d3.hash(),
                d4.hash(),
                d5.hash(),
                d6.hash(),
                d7.hash(),
            ],
        ) {
            dup += 1;
            continue 'trials;
        }

        if gate(
            "trial_pre hook errored",
            Hooks::run(&hooks.trial_pre, &trial_pre_info),
        )? {
            outcome = RunOutcome::Halted;
            break 'trials;
        }

        #[cfg(all(unix, feature = "fork"))]
        let result = {
            let fork_info = ForkPostInfo {
                prop_name: name,
                total_trials: config.trials,
                failures: fail,
                run_seed,
                arity: 7,
            };
            call_property(
                || {
                    prop(
                        &d1.value, &d2.value, &d3.value, &d4.value, &d5.value, &d6.value,
                        &d7.value,
                    )
                },
                &config,
                &hooks,
                &fork_info,
            )?
        };
        #[cfg(not(all(unix, feature = "fork")))]
        let result = call_property(
            || {
                prop(
                    &d1.value, &d2.value, &d3.value, &d4.value, &d5.value, &d6.value, &d7.value,
                )
            },
            &config,
            &hooks,
        )?;

        match after_trial(&hooks, name, trial_id, trial_seed, result, &mut pass, &mut fail, &mut skip, dup, config.verbose)? {
            AfterTrial::Continue => continue 'trials,
            AfterTrial::Halt => {
                outcome = RunOutcome::Halted;
                break 'trials;
            }
            AfterTrial::Shrink => {}
        }

        let ctx = TrialCtx {
            prop_name: name,
            trial_id,
            trial_seed,
        };
        let max_tactics = config.max_tactics;
        let (_halted, err) = run_shrink_loop!(
            &hooks, &ctx, max_tactics, &mut bloom, &mut gen_rng, config.verbose,
            [
                (
                    &mut d1,
                    0u8,
                    |candidate: &D1::Value| prop(candidate, &d2.value, &d3.value, &d4.value, &d5.value, &d6.value, &d7.value),
                    |h: Option<u64>| vec![h, d2.hash(), d3.hash(), d4.hash(), d5.hash(), d6.hash(), d7.hash()]
                ),
                (
                    &mut d2,
                    1u8,
                    |candidate: &D2::Value| prop(&d1.value, candidate, &d3.value, &d4.value, &d5.value, &d6.value, &d7.value),
                    |h: Option<u64>| vec![d1.hash(), h, d3.hash(), d4.hash(), d5.hash(), d6.hash(), d7.hash()]
                ),
                (
                    &mut d3,
                    2u8,
                    |candidate: &D3::Value| prop(&d1.value, &d2.value, candidate, &d4.value, &d5.value, &d6.value, &d7.value),
                    |h: Option<u64>| vec![d1.hash(), d2.hash(), h, d4.hash(), d5.hash(), d6.hash(), d7.hash()]
                ),
                (
                    &mut d4,
                    3u8,
                    |candidate: &D4::Value| prop(&d1.value, &d2.value, &d3.value, candidate, &d5.value, &d6.value, &d7.value),
                    |h: Option<u64>| vec![d1.hash(), d2.hash(), d3.hash(), h, d5.hash(), d6.hash(), d7.hash()]
                ),
                (
                    &mut d5,
                    4u8,
                    |candidate: &D5::Value| prop(&d1.value, &d2.value, &d3.value, &d4.value, candidate, &d6.value, &d7.value),
                    |h: Option<u64>| vec![d1.hash(), d2.hash(), d3.hash(), d4.hash(), h, d6.hash(), d7.hash()]
                ),
                (
                    &mut d6,
                    5u8,
                    |candidate: &D6::Value| prop(&d1.value, &d2.value, &d3.value, &d4.value, &d5.value, candidate, &d7.value),
                    |h: Option<u64>| vec![d1.hash(), d2.hash(), d3.hash(), d4.hash(), d5.hash(), h, d7.hash()]
                ),
                (
                    &mut d7,
                    6u8,
                    |candidate: &D7::Value| prop(&d1.value, &d2.value, &d3.value, &d4.value, &d5.value, &d6.value, candidate),
                    |h: Option<u64>| vec![d1.hash(), d2.hash(), d3.hash(), d4.hash(), d5.hash(), d6.hash(), h]
                )
            ]
        );
        if let Some(e) = err {
            return Err(e);
        }

        report_counterexample(&hooks, name, trial_id, trial_seed)?;
        outcome = RunOutcome::Fail(
            Reason::new("property failed"),
            (
                d1.value, d2.value, d3.value, d4.value, d5.value, d6.value, d7.value,
            ),
        );
        break 'trials;
    }

    let _ = Hooks::run(&hooks.run_post, &run_info(name, &config, run_seed));
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::AutoshrinkConfig;

    struct SmallInt;

    impl TypeInfo for SmallInt {
        type Value = u32;

        fn alloc(&self, src: &mut dyn RandomSource) -> Option<u32> {
            Some(src.random_bits(16) as u32)
        }

        fn hash(&self, value: &u32) -> Option<u64> {
            Some(*value as u64)
        }

        fn autoshrink_config(&self) -> AutoshrinkConfig {
            AutoshrinkConfig {
                enable: true,
                print_mode: crate::descriptor::AutoshrinkPrintMode::Never,
            }
        }
    }

    #[test]
    fn always_passing_property_reports_ok() {
        let descriptor = SmallInt;
        let mut config = RunConfig::default();
        config.trials = 16;
        config.seed = Seed::Fixed(7);
        let outcome = run1(
            "always_true",
            (&descriptor,),
            |_v: &u32| CallResult::Ok,
            config,
            Hooks::default(),
        )
        .unwrap();
        assert_eq!(outcome, RunOutcome::Ok);
    }

    #[test]
    fn failing_property_shrinks_toward_a_small_value() {
        let descriptor = SmallInt;
        let mut config = RunConfig::default();
        config.trials = 32;
        config.seed = Seed::Fixed(99);
        let outcome = run1(
            "always_fails_above_zero",
            (&descriptor,),
            |v: &u32| {
                if *v > 0 {
                    CallResult::Fail
                } else {
                    CallResult::Ok
                }
            },
            config,
            Hooks::default(),
        )
        .unwrap();
        match outcome {
            RunOutcome::Fail(_, (value,)) => assert!(value > 0),
            other => panic!("expected a failing outcome, got {other:?}"),
        }
    }

    #[test]
    fn two_argument_property_shrinks_both() {
        let d1 = SmallInt;
        let d2 = SmallInt;
        let mut config = RunConfig::default();
        config.trials = 32;
        config.seed = Seed::Fixed(5);
        let outcome = run2(
            "sum_is_bounded",
            (&d1, &d2),
            |a: &u32, b: &u32| {
                if a + b > 3 {
                    CallResult::Fail
                } else {
                    CallResult::Ok
                }
            },
            config,
            Hooks::default(),
        )
        .unwrap();
        match outcome {
            RunOutcome::Fail(_, (a, b)) => assert!(a + b > 3),
            other => panic!("expected a failing outcome, got {other:?}"),
        }
    }

    #[test]
    fn bloom_dedup_skips_repeated_argument_tuples() {
        let descriptor = SmallInt;
        let mut config = RunConfig::default();
        config.trials = 8;
        config.seed = Seed::Fixed(1);
        config.bloom_bits = 1 << 10;
        let outcome = run1(
            "always_passes",
            (&descriptor,),
            |_v: &u32| CallResult::Ok,
            config,
            Hooks::default(),
        )
        .unwrap();
        assert_eq!(outcome, RunOutcome::Ok);
    }
}
