//-
// Copyright 2024 The autoshrink developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error and result-code sum types shared across the engine. Every variant
//! here corresponds 1:1 to a named result code in the external interface;
//! callers match exhaustively rather than comparing against sentinel
//! integers.

use crate::reason::Reason;
use std::fmt;

/// The outcome of one property call.
///
/// Explicit discriminants: a forked worker encodes its result as this exact
/// byte value when writing it back to the parent over a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CallResult {
    /// The property held for this input.
    Ok = 0,
    /// The property failed for this input.
    Fail = 1,
    /// The input was not applicable; neither a pass nor a failure.
    Skip = 2,
    /// The property itself could not be evaluated (a hard error).
    Error = 3,
}

impl CallResult {
    /// Decode a byte written by a worker process back into a `CallResult`.
    /// Any value outside the known discriminants is treated as `Error`.
    pub fn from_byte(byte: u8) -> CallResult {
        match byte {
            0 => CallResult::Ok,
            1 => CallResult::Fail,
            2 => CallResult::Skip,
            _ => CallResult::Error,
        }
    }
}

/// The outcome of one shrink-tactic attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShrinkOutcome {
    /// The candidate simplified the value and still fails; it has
    /// replaced the current value.
    Ok,
    /// This tactic produced no usable candidate; try the next tactic.
    DeadEnd,
    /// This argument has exhausted its tactics; move to the next argument.
    NoMoreTactics,
    /// A hard error occurred while shrinking.
    Error,
}

/// What a hook requests the driver do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookRun {
    /// Proceed normally.
    Continue,
    /// Stop the run (or shrink loop) early; report partial results.
    Halt,
    /// A hard error occurred inside the hook.
    Error,
    /// Re-run the step that produced this hook call, indefinitely.
    Repeat,
    /// Re-run the step that produced this hook call, exactly once.
    RepeatOnce,
}

/// Errors surfaced from misuse, resource exhaustion, or a property's own
/// `Error` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FuzzError {
    /// The run was configured incorrectly: bad arity, a missing property,
    /// or a descriptor that can neither autoshrink nor manually shrink an
    /// argument whose property can fail.
    Misuse(Reason),
    /// A resource (memory, a pipe, a forked process) could not be
    /// acquired, even after retrying.
    Resource(Reason),
    /// The property under test returned `Error` directly.
    PropertyError(Reason),
}

impl fmt::Display for FuzzError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FuzzError::Misuse(r) => write!(f, "misuse: {r}"),
            FuzzError::Resource(r) => write!(f, "resource exhausted: {r}"),
            FuzzError::PropertyError(r) => write!(f, "property error: {r}"),
        }
    }
}

impl std::error::Error for FuzzError {}

/// The final disposition of an entire run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome<T> {
    /// Every trial passed (or was skipped/deduplicated).
    Ok,
    /// A minimal failing input was found.
    Fail(Reason, T),
    /// A hook requested an early halt; counters are partial.
    Halted,
}

impl<T: fmt::Debug> fmt::Display for RunOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RunOutcome::Ok => write!(f, "all trials passed"),
            RunOutcome::Fail(why, what) => {
                writeln!(f, "run failed: {why}")?;
                write!(f, "minimal failing input: {what:#?}")
            }
            RunOutcome::Halted => write!(f, "run halted by hook"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzz_error_displays_its_kind() {
        let e = FuzzError::Misuse(Reason::new("arity 9 out of range"));
        assert!(e.to_string().starts_with("misuse: "));
    }

    #[test]
    fn run_outcome_fail_displays_minimal_input() {
        let outcome: RunOutcome<i32> =
            RunOutcome::Fail(Reason::new("a*a <= 12345"), 112);
        let text = outcome.to_string();
        assert!(text.contains("112"));
    }

    #[test]
    fn call_result_byte_round_trips() {
        for r in [CallResult::Ok, CallResult::Fail, CallResult::Skip, CallResult::Error] {
            assert_eq!(CallResult::from_byte(r as u8), r);
        }
        assert_eq!(CallResult::from_byte(0xFF), CallResult::Error);
    }
}
