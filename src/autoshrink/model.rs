//-
// Copyright 2024 The autoshrink developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The adaptive model: a weight per shrink tactic, biasing which tactic is
//! tried next by its recent success rate.

use crate::rng::Rng;
use bitflags::bitflags;

bitflags! {
    /// Which tactics have been tried (or succeeded) during the current
    /// shrink step.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Action: u8 {
        /// Replace a request's bits with zero, or elide it entirely.
        const DROP  = 0x01;
        /// Shift a request's bits right by a small amount.
        const SHIFT = 0x02;
        /// AND a request's bits with a mask biased toward clearing bits.
        const MASK  = 0x04;
        /// Swap two adjacent, equal-sized requests.
        const SWAP  = 0x08;
        /// Subtract a random value from a request's numeric content.
        const SUB   = 0x10;
    }
}

/// Index into [`Model::weights`] for each tactic, in declaration order.
const TACTICS: [Action; 5] = [
    Action::DROP,
    Action::SHIFT,
    Action::MASK,
    Action::SWAP,
    Action::SUB,
];

/// Lower bound on any tactic's weight.
pub const MODEL_MIN: u8 = 0x08;
/// Upper bound on any tactic's weight.
pub const MODEL_MAX: u8 = 0x80;
/// Lower bound specifically for the drop tactic's weight.
pub const DROPS_MIN: u8 = 0x10;
/// Upper bound specifically for the drop tactic's weight.
pub const DROPS_MAX: u8 = 0xA0;

/// The one-in-256 chance of ignoring the weights entirely and picking a
/// tactic uniformly at random from all four "bit position" tactics
/// (drop/shift/mask/swap map onto 2-bit codes 0..3; see `choose`).
const FOUR_EVENLY: u8 = 0x40;
/// The one-in-256 chance of picking drop or shift uniformly at random,
/// independent of the weights.
const TWO_EVENLY: u8 = 0x80;

/// The result of asking the model to pick a tactic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Try this tactic next.
    Tactic(Action),
    /// Every tactic has already been tried this step; no more tactics.
    Done,
}

/// Five tactic weights plus the bookkeeping needed to bias tactic
/// selection toward whatever has recently worked.
#[derive(Debug, Clone)]
pub struct Model {
    weights: [u8; 5],
    cur_tried: Action,
    cur_set: Action,
    next_action: Option<Action>,
}

impl Default for Model {
    fn default() -> Self {
        Model {
            weights: [MODEL_MIN; 5],
            cur_tried: Action::empty(),
            cur_set: Action::empty(),
            next_action: None,
        }
    }
}

impl Model {
    /// Reset the per-step bookkeeping (`cur_tried`/`cur_set`) ahead of a
    /// new shrink step. Weights persist across steps; only the "tried this
    /// step" bitsets are cleared.
    pub fn begin_step(&mut self) {
        self.cur_tried = Action::empty();
        self.cur_set = Action::empty();
    }

    /// Force the next `choose` call to return `action` (a test hook).
    pub fn set_next(&mut self, action: Action) {
        self.next_action = Some(action);
    }

    fn weight_index(action: Action) -> usize {
        TACTICS.iter().position(|&t| t == action).expect(
            "Action passed to the model must be exactly one of the five tactics",
        )
    }

    /// Choose the next tactic to try, consuming randomness from `rng`.
    pub fn choose(&mut self, rng: &mut Rng) -> Choice {
        if let Some(action) = self.next_action.take() {
            return Choice::Tactic(action);
        }

        let byte = (rng.next_u64() & 0xFF) as u8;
        if byte == FOUR_EVENLY {
            let bits = (rng.next_u64() & 0b11) as u8;
            return Choice::Tactic(TACTICS[bits as usize]);
        }
        if byte == TWO_EVENLY {
            let bit = rng.next_u64() & 1;
            let action = if bit == 0 { Action::DROP } else { Action::SHIFT };
            return Choice::Tactic(action);
        }

        let remaining: Vec<(Action, u8)> = TACTICS
            .iter()
            .copied()
            .zip(self.weights)
            .filter(|(a, _)| !self.cur_tried.contains(*a))
            .collect();
        if remaining.is_empty() {
            return Choice::Done;
        }

        let total: u32 = remaining.iter().map(|&(_, w)| w as u32).sum();
        let mut pick = (rng.next_u64() % total as u64) as u32;
        for (action, weight) in remaining {
            if pick < weight as u32 {
                return Choice::Tactic(action);
            }
            pick -= weight as u32;
        }
        unreachable!("weighted pick must land on some tactic")
    }

    /// Mark `action` as attempted this step (so `choose` won't offer it
    /// again until `begin_step` is called).
    pub fn mark_tried(&mut self, action: Action) {
        self.cur_tried |= action;
    }

    /// Update the weight for `action` based on whether its most recent
    /// attempt strictly reduced the value (`success`) or not.
    ///
    /// `adjustment` is the magnitude of the nudge; the shrink loop passes a
    /// larger adjustment for "this shrink stuck" than for "this
    /// intermediate step toward a candidate failed".
    pub fn update(&mut self, action: Action, success: bool, adjustment: u8) {
        if success {
            self.cur_set |= action;
        }
        let idx = Self::weight_index(action);
        let (lo, hi) = if action == Action::DROP {
            (DROPS_MIN, DROPS_MAX)
        } else {
            (MODEL_MIN, MODEL_MAX)
        };
        let w = self.weights[idx];
        let new_w = if success {
            w.saturating_add(adjustment)
        } else {
            w.saturating_sub(adjustment)
        };
        self.weights[idx] = new_w.clamp(lo, hi);
    }

    /// The tactics that have ever succeeded for this argument, across
    /// steps (cleared only when the caller explicitly discards the
    /// model).
    pub fn successful_tactics(&self) -> Action {
        self.cur_set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_model_starts_at_minimum_weights() {
        let m = Model::default();
        assert_eq!(m.weights, [MODEL_MIN; 5]);
    }

    #[test]
    fn next_action_override_is_honored_once() {
        let mut m = Model::default();
        let mut rng = Rng::new(1);
        m.set_next(Action::SWAP);
        assert_eq!(m.choose(&mut rng), Choice::Tactic(Action::SWAP));
        // Second call falls through to normal sampling, not SWAP forever.
        let second = m.choose(&mut rng);
        assert!(matches!(second, Choice::Tactic(_) | Choice::Done));
    }

    #[test]
    fn done_once_all_tactics_tried_this_step() {
        let mut m = Model::default();
        m.begin_step();
        for t in TACTICS {
            m.mark_tried(t);
        }
        let mut rng = Rng::new(2);
        // next_action is unset, and all tactics are in cur_tried, so every
        // outcome other than the TWO_EVENLY/FOUR_EVENLY escape hatches
        // must be Done. Run many draws to make flaking on those rare paths
        // implausible while still tolerating them.
        let mut saw_done = false;
        for _ in 0..10_000 {
            if let Choice::Done = m.choose(&mut rng) {
                saw_done = true;
                break;
            }
        }
        assert!(saw_done);
    }

    #[test]
    fn update_saturates_within_bounds() {
        let mut m = Model::default();
        for _ in 0..100 {
            m.update(Action::MASK, true, 200);
        }
        let idx = Model::weight_index(Action::MASK);
        assert_eq!(m.weights[idx], MODEL_MAX);

        for _ in 0..100 {
            m.update(Action::MASK, false, 200);
        }
        assert_eq!(m.weights[idx], MODEL_MIN);
    }

    #[test]
    fn drop_weight_has_its_own_bounds() {
        let mut m = Model::default();
        for _ in 0..100 {
            m.update(Action::DROP, true, 200);
        }
        let idx = Model::weight_index(Action::DROP);
        assert_eq!(m.weights[idx], DROPS_MAX);
    }

    #[test]
    fn begin_step_clears_tried_but_not_weights() {
        let mut m = Model::default();
        m.update(Action::SUB, true, 10);
        m.mark_tried(Action::SUB);
        let before = m.weights;
        m.begin_step();
        assert_eq!(m.weights, before);
        assert_eq!(m.cur_tried, Action::empty());
    }
}
