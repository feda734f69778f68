//! Differentiator lifecycle.

use crate::lifecycle::Lifecycle;

/// `Idle → Ready → FindingDifferences → Done`, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifferentiatorState {
    /// Pool units are still loading their engines.
    Idle,
    /// Every unit reported ready.
    Ready,
    /// Walking the frame source.
    FindingDifferences,
    /// Terminal. The pool is shut down or terminated.
    Done,
}

impl Lifecycle for DifferentiatorState {
    const MACHINE: &'static str = "differentiator";

    fn permits(self, next: Self) -> bool {
        use DifferentiatorState::*;
        matches!(
            (self, next),
            (Idle, Ready) | (Ready, FindingDifferences) | (FindingDifferences, Done)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::DifferentiatorState::*;
    use super::*;

    #[test]
    fn test_only_forward_steps_permitted() {
        let all = [Idle, Ready, FindingDifferences, Done];
        for from in all {
            for to in all {
                let expected = matches!(
                    (from, to),
                    (Idle, Ready) | (Ready, FindingDifferences) | (FindingDifferences, Done)
                );
                assert_eq!(from.permits(to), expected, "{from:?} -> {to:?}");
            }
        }
    }
}
