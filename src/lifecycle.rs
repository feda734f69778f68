//! Strictly-forward state machines and invariant violations.
//!
//! Both the differentiator and the analyzer walk a fixed sequence of
//! states. Every transition goes through [`StateCell::transition`], which
//! checks it against the machine's [`Lifecycle::permits`] table. A rejected
//! transition is a programming error: callers abort the run with it and
//! never retry.

use crate::analysis::TimelineEvent;
use crate::extraction::FrameIndex;
use std::fmt::Debug;
use thiserror::Error;

/// Broken internal invariants. Always fatal for the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("{machine}: illegal transition {from} -> {to}")]
    IllegalTransition {
        machine: &'static str,
        from: String,
        to: String,
    },
    #[error("result slot {0} was already resolved")]
    SlotAlreadyResolved(FrameIndex),
    #[error("change for frame {0} was reported twice")]
    DuplicateChange(FrameIndex),
    #[error("timeline event {0} was already recorded")]
    EventAlreadyRecorded(TimelineEvent),
    #[error("timeline event {0} reported after analysis finished")]
    EventAfterDone(TimelineEvent),
}

/// A state enum with a fixed forward transition table.
pub trait Lifecycle: Copy + Eq + Debug {
    /// Machine name used in logs and errors.
    const MACHINE: &'static str;

    /// Returns true if moving from `self` to `next` is allowed.
    fn permits(self, next: Self) -> bool;
}

/// Holds the current state of a [`Lifecycle`] and validates every move.
#[derive(Debug, Clone)]
pub struct StateCell<S: Lifecycle> {
    current: S,
}

impl<S: Lifecycle> StateCell<S> {
    pub fn new(initial: S) -> Self {
        Self { current: initial }
    }

    #[inline]
    pub fn current(&self) -> S {
        self.current
    }

    #[inline]
    pub fn is(&self, state: S) -> bool {
        self.current == state
    }

    /// Moves to `next`, returning the previous state.
    pub fn transition(&mut self, next: S) -> Result<S, InvariantViolation> {
        let from = self.current;
        if !from.permits(next) {
            tracing::error!(
                machine = S::MACHINE,
                from = ?from,
                to = ?next,
                "Illegal state transition"
            );
            return Err(InvariantViolation::IllegalTransition {
                machine: S::MACHINE,
                from: format!("{:?}", from),
                to: format!("{:?}", next),
            });
        }
        tracing::debug!(machine = S::MACHINE, from = ?from, to = ?next, "State transition");
        self.current = next;
        Ok(from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Light {
        Off,
        On,
        Broken,
    }

    impl Lifecycle for Light {
        const MACHINE: &'static str = "light";

        fn permits(self, next: Self) -> bool {
            matches!(
                (self, next),
                (Light::Off, Light::On) | (Light::On, Light::Broken)
            )
        }
    }

    #[test]
    fn test_forward_transitions() {
        let mut cell = StateCell::new(Light::Off);
        assert_eq!(cell.transition(Light::On).unwrap(), Light::Off);
        assert_eq!(cell.transition(Light::Broken).unwrap(), Light::On);
        assert!(cell.is(Light::Broken));
    }

    #[test]
    fn test_backward_transition_rejected() {
        let mut cell = StateCell::new(Light::Off);
        cell.transition(Light::On).unwrap();

        let err = cell.transition(Light::Off).unwrap_err();
        assert_eq!(
            err,
            InvariantViolation::IllegalTransition {
                machine: "light",
                from: "On".to_string(),
                to: "Off".to_string(),
            }
        );
        assert!(cell.is(Light::On));
    }
}
