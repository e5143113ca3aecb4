//-
// Copyright 2024 The autoshrink developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Run configuration, with environment-variable overrides mirroring the
//! teacher's `contextualize_config` parse-or-warn-and-keep-default policy.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// The run seed: either chosen at random when a run starts, or fixed for
/// reproducing a previous run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seed {
    /// Derive a fresh seed each run.
    Random,
    /// Always use this exact seed.
    Fixed(u64),
}

impl FromStr for Seed {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("random") {
            Ok(Seed::Random)
        } else {
            s.parse::<u64>().map(Seed::Fixed)
        }
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Seed::Random => write!(f, "random"),
            Seed::Fixed(n) => write!(f, "{}", n),
        }
    }
}

/// Knobs for running each trial's property call in an isolated, timed-out
/// worker process.
#[cfg(feature = "fork")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkConfig {
    /// Whether isolation is enabled at all.
    pub enable: bool,
    /// Non-zero implicitly enables isolation, even if `enable` is false.
    pub timeout_ms: u32,
    /// Signal sent to a worker that exceeds its timeout.
    pub signal: i32,
    /// Grace period after `signal` before escalating to `SIGKILL`.
    pub exit_timeout_ms: u32,
}

#[cfg(feature = "fork")]
impl Default for ForkConfig {
    fn default() -> Self {
        ForkConfig {
            enable: false,
            timeout_ms: 0,
            signal: libc::SIGTERM,
            exit_timeout_ms: 10,
        }
    }
}

#[cfg(feature = "fork")]
impl ForkConfig {
    /// Whether this configuration implies running trials in a worker.
    pub fn active(&self) -> bool {
        self.enable || self.timeout_ms > 0
    }
}

/// Run-wide configuration: trial count, dedup table size, shrink caps,
/// diagnostics level and, when isolation is compiled in, worker knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Number of passing trials required for the run to succeed.
    pub trials: u32,
    /// Size in bits of the duplicate-argument-tuple filter; a power of two,
    /// or `0` to disable deduplication entirely.
    pub bloom_bits: usize,
    /// Ceiling on shrink tactic attempts per argument, across the whole
    /// shrink loop for that argument.
    pub max_tactics: u32,
    /// Consecutive failed shrink attempts tolerated before an argument's
    /// autoshrink env gives up.
    pub max_failed_shrinks: usize,
    /// Diagnostic verbosity: 0 is silent, higher values emit progressively
    /// more `eprintln!` trace lines from the driver.
    pub verbose: u8,
    /// The run seed.
    pub seed: Seed,
    /// Worker isolation knobs.
    #[cfg(feature = "fork")]
    pub fork: ForkConfig,
}

fn default_default_config() -> RunConfig {
    RunConfig {
        trials: 256,
        bloom_bits: 1 << 16,
        max_tactics: 1024,
        max_failed_shrinks: 100,
        verbose: 0,
        seed: Seed::Random,
        #[cfg(feature = "fork")]
        fork: ForkConfig::default(),
    }
}

static DEFAULT_CONFIG: OnceLock<RunConfig> = OnceLock::new();

impl Default for RunConfig {
    fn default() -> Self {
        DEFAULT_CONFIG
            .get_or_init(|| contextualize_config(default_default_config()))
            .clone()
    }
}

impl RunConfig {
    /// Build a config by layering `PROPFUZZ_*` environment overrides onto
    /// [`default_default_config`]. Unlike [`RunConfig::default`], this
    /// re-reads the environment on every call rather than caching the
    /// result once.
    pub fn from_env() -> Self {
        contextualize_config(default_default_config())
    }
}

fn parse_or_warn<T: FromStr + fmt::Display>(
    src: &str,
    dst: &mut T,
    typ: &str,
    var: &str,
) {
    match src.parse() {
        Ok(value) => *dst = value,
        Err(_) => {
            eprintln!(
                "autoshrink: the env-var {}={} can't be parsed as {}, using default of {}.",
                var, src, typ, *dst
            );
        }
    }
}

const CASES: &str = "PROPFUZZ_CASES";
const BLOOM_BITS: &str = "PROPFUZZ_BLOOM_BITS";
const MAX_TACTICS: &str = "PROPFUZZ_MAX_TACTICS";
const MAX_FAILED_SHRINKS: &str = "PROPFUZZ_MAX_FAILED_SHRINKS";
const VERBOSE: &str = "PROPFUZZ_VERBOSE";
const SEED: &str = "PROPFUZZ_SEED";
#[cfg(feature = "fork")]
const FORK: &str = "PROPFUZZ_FORK";
#[cfg(feature = "fork")]
const TIMEOUT: &str = "PROPFUZZ_TIMEOUT";

fn contextualize_config(mut result: RunConfig) -> RunConfig {
    for (var, value) in std::env::vars() {
        let var = var.as_str();

        #[cfg(feature = "fork")]
        if var == FORK {
            parse_or_warn(&value, &mut result.fork.enable, "bool", FORK);
            continue;
        }
        #[cfg(feature = "fork")]
        if var == TIMEOUT {
            parse_or_warn(
                &value,
                &mut result.fork.timeout_ms,
                "u32",
                TIMEOUT,
            );
            continue;
        }

        if var == CASES {
            parse_or_warn(&value, &mut result.trials, "u32", CASES);
        } else if var == BLOOM_BITS {
            parse_or_warn(&value, &mut result.bloom_bits, "usize", BLOOM_BITS);
        } else if var == MAX_TACTICS {
            parse_or_warn(&value, &mut result.max_tactics, "u32", MAX_TACTICS);
        } else if var == MAX_FAILED_SHRINKS {
            parse_or_warn(
                &value,
                &mut result.max_failed_shrinks,
                "usize",
                MAX_FAILED_SHRINKS,
            );
        } else if var == VERBOSE {
            parse_or_warn(&value, &mut result.verbose, "u8", VERBOSE);
        } else if var == SEED {
            parse_or_warn(&value, &mut result.seed, "Seed", SEED);
        } else if var.starts_with("PROPFUZZ_") {
            eprintln!("autoshrink: ignoring unknown env-var {}.", var);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_spec_defaults() {
        let c = default_default_config();
        assert_eq!(c.trials, 256);
        assert_eq!(c.max_tactics, 1024);
        assert_eq!(c.max_failed_shrinks, 100);
        assert_eq!(c.verbose, 0);
        assert_eq!(c.seed, Seed::Random);
    }

    #[test]
    fn seed_parses_random_and_fixed() {
        assert_eq!("random".parse::<Seed>().unwrap(), Seed::Random);
        assert_eq!("RANDOM".parse::<Seed>().unwrap(), Seed::Random);
        assert_eq!("42".parse::<Seed>().unwrap(), Seed::Fixed(42));
        assert!("not-a-seed".parse::<Seed>().is_err());
    }

    #[test]
    fn malformed_env_override_keeps_default() {
        let mut cfg = default_default_config();
        parse_or_warn(&"not-a-number".to_string(), &mut cfg.trials, "u32", CASES);
        assert_eq!(cfg.trials, 256);
    }

    #[test]
    fn well_formed_env_override_applies() {
        let mut cfg = default_default_config();
        parse_or_warn(&"42".to_string(), &mut cfg.trials, "u32", CASES);
        assert_eq!(cfg.trials, 42);
    }

    #[cfg(feature = "fork")]
    #[test]
    fn fork_config_active_when_timeout_set_even_if_disabled() {
        let mut fc = ForkConfig::default();
        assert!(!fc.active());
        fc.timeout_ms = 100;
        assert!(fc.active());
    }
}
