//-
// Copyright 2024 The autoshrink developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Observation and override points around each phase of a run: generation,
//! each trial, each shrink attempt, and the overall run boundary.
//!
//! Each hook point is an `Option<Box<dyn Fn(...) -> HookRun>>` field on
//! [`Hooks`]; a caller who doesn't care about a given point simply leaves
//! it `None`, in which case the driver treats it as `HookRun::Continue`.

use crate::errors::{CallResult, HookRun};

/// Information available to the `run_pre`/`run_post` hooks.
#[derive(Debug, Clone)]
pub struct RunInfo<'a> {
    /// The property's name, for diagnostics.
    pub prop_name: &'a str,
    /// Total trials configured for this run.
    pub total_trials: u32,
    /// The run seed in use.
    pub run_seed: u64,
}

/// Information available to the `gen_args_pre`/`trial_pre` hooks, before
/// the property has been called for this trial.
#[derive(Debug, Clone)]
pub struct TrialPreInfo<'a> {
    /// The property's name, for diagnostics.
    pub prop_name: &'a str,
    /// Index of this trial, `0..total_trials`.
    pub trial_id: u32,
    /// This trial's derived seed.
    pub trial_seed: u64,
}

/// Information available to the `trial_post` hook, after the property has
/// been called for this trial.
#[derive(Debug, Clone)]
pub struct TrialPostInfo<'a> {
    /// The property's name, for diagnostics.
    pub prop_name: &'a str,
    /// Index of this trial.
    pub trial_id: u32,
    /// This trial's derived seed.
    pub trial_seed: u64,
    /// The property's result for this trial.
    pub result: CallResult,
    /// Running pass count, including this trial.
    pub pass: u32,
    /// Running fail count, including this trial.
    pub fail: u32,
    /// Running skip count, including this trial.
    pub skip: u32,
    /// Running dup count, including this trial.
    pub dup: u32,
}

/// Information available to the `fork_post` hook, which runs inside the
/// child process immediately after forking and before the property call.
#[derive(Debug, Clone)]
pub struct ForkPostInfo<'a> {
    /// The property's name, for diagnostics.
    pub prop_name: &'a str,
    /// Total trials configured for this run.
    pub total_trials: u32,
    /// Failures observed by the parent so far (as of the fork).
    pub failures: u32,
    /// The run seed in use.
    pub run_seed: u64,
    /// The property's arity.
    pub arity: u8,
}

/// Which shrink-post state a `shrink_post` hook call corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShrinkPostState {
    /// The candidate simplified the value further.
    Shrunk,
    /// This argument is done shrinking.
    DoneShrinking,
    /// This attempt was a dead end; more tactics remain.
    ShrinkFailed,
}

/// Information available to the `shrink_pre` hook, before a shrink tactic
/// is attempted.
#[derive(Debug, Clone)]
pub struct ShrinkPreInfo<'a> {
    /// The property's name, for diagnostics.
    pub prop_name: &'a str,
    /// Index of the trial being shrunk.
    pub trial_id: u32,
    /// Index of the argument currently being shrunk.
    pub arg_index: u8,
    /// Which tactic number is about to be attempted.
    pub tactic: u32,
    /// Total shrink attempts made so far in this trial, across arguments.
    pub shrink_count: u32,
}

/// Information available to the `shrink_post` hook, after a shrink tactic
/// has been attempted (but before the candidate, if any, has been tried
/// against the property).
#[derive(Debug, Clone)]
pub struct ShrinkPostInfo<'a> {
    /// The property's name, for diagnostics.
    pub prop_name: &'a str,
    /// Index of the trial being shrunk.
    pub trial_id: u32,
    /// Index of the argument currently being shrunk.
    pub arg_index: u8,
    /// Which tactic number was attempted.
    pub tactic: u32,
    /// The resulting state.
    pub state: ShrinkPostState,
}

/// Information available to the `shrink_trial_post` hook, after a shrink
/// candidate has actually been run through the property.
#[derive(Debug, Clone)]
pub struct ShrinkTrialPostInfo<'a> {
    /// The property's name, for diagnostics.
    pub prop_name: &'a str,
    /// Index of the trial being shrunk.
    pub trial_id: u32,
    /// Index of the argument currently being shrunk.
    pub arg_index: u8,
    /// The tactic that produced the just-tried candidate.
    pub tactic: u32,
    /// The property's result against the candidate.
    pub result: CallResult,
    /// Successful shrinks so far in this trial.
    pub successful_shrinks: u32,
    /// Failed shrinks so far in this trial.
    pub failed_shrinks: u32,
}

/// Information passed to the `counterexample` hook once a run concludes
/// with a minimal failing input.
#[derive(Debug, Clone)]
pub struct CounterexampleInfo<'a> {
    /// The property's name, for diagnostics.
    pub prop_name: &'a str,
    /// Index of the trial that produced this counter-example.
    pub trial_id: u32,
    /// That trial's seed (sufficient, with the run seed, to reproduce it).
    pub trial_seed: u64,
}

type Hook<I> = Box<dyn Fn(&I) -> HookRun + Send + Sync>;

/// The full table of optional hooks a caller may install.
///
/// Every field defaults to `None`, which the driver treats as
/// `HookRun::Continue`.
#[derive(Default)]
pub struct Hooks {
    /// Runs once before the first trial.
    pub run_pre: Option<Hook<RunInfo<'static>>>,
    /// Runs once after the last trial.
    pub run_post: Option<Hook<RunInfo<'static>>>,
    /// Runs before argument generation for each trial.
    pub gen_args_pre: Option<Hook<TrialPreInfo<'static>>>,
    /// Runs before the property is called for each trial.
    pub trial_pre: Option<Hook<TrialPreInfo<'static>>>,
    /// Runs after the property is called for each trial.
    pub trial_post: Option<Hook<TrialPostInfo<'static>>>,
    /// Runs in the child, immediately after forking, before the property
    /// call.
    pub fork_post: Option<Hook<ForkPostInfo<'static>>>,
    /// Runs before each shrink-tactic attempt.
    pub shrink_pre: Option<Hook<ShrinkPreInfo<'static>>>,
    /// Runs after each shrink-tactic attempt, before the candidate (if
    /// any) is tried against the property.
    pub shrink_post: Option<Hook<ShrinkPostInfo<'static>>>,
    /// Runs after a shrink candidate has been tried against the property.
    pub shrink_trial_post: Option<Hook<ShrinkTrialPostInfo<'static>>>,
    /// Runs once a minimal failing input has been found.
    pub counterexample: Option<Hook<CounterexampleInfo<'static>>>,
}

impl Hooks {
    /// Call `hook` with `info` if installed, else report `Continue`.
    pub fn run<I>(hook: &Option<Hook<I>>, info: &I) -> HookRun {
        match hook {
            Some(f) => f(info),
            None => HookRun::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_hook_continues() {
        let hooks = Hooks::default();
        let info = RunInfo {
            prop_name: "p",
            total_trials: 10,
            run_seed: 1,
        };
        assert_eq!(Hooks::run(&hooks.run_pre, &info), HookRun::Continue);
    }

    #[test]
    fn installed_hook_is_invoked() {
        let mut hooks = Hooks::default();
        hooks.run_pre = Some(Box::new(|_info: &RunInfo| HookRun::Halt));
        let info = RunInfo {
            prop_name: "p",
            total_trials: 10,
            run_seed: 1,
        };
        assert_eq!(Hooks::run(&hooks.run_pre, &info), HookRun::Halt);
    }
}
