//! Messages exchanged between the differentiator and pool units.

use crate::capture::Frame;
use crate::extraction::{FrameIndex, Rect};

/// Two consecutive frames to compare. Owned: dispatch moves both buffers.
#[derive(Debug)]
pub struct FramePair {
    pub frame_index: FrameIndex,
    pub previous: Frame,
    pub current: Frame,
}

/// Coordinator to unit.
#[derive(Debug)]
pub enum Request {
    /// Compare a frame pair.
    Compare(FramePair),
    /// Drain: acknowledge with [`Report::Finished`] after all earlier requests.
    Finish,
}

/// Unit to coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// The unit loaded its engine and accepts work.
    Ready { unit: usize },
    /// A pair produced at least one rect. Always followed by `Processed`.
    Changed {
        unit: usize,
        frame_index: FrameIndex,
        rects: Vec<Rect>,
    },
    /// A pair is resolved, with or without a preceding `Changed`.
    Processed { unit: usize, frame_index: FrameIndex },
    /// Terminal acknowledgment of `Finish`.
    Finished { unit: usize },
    /// The engine failed; the unit has stopped.
    Failed {
        unit: usize,
        frame_index: Option<FrameIndex>,
        message: String,
    },
}

impl Report {
    /// The unit that sent this report.
    pub fn unit(&self) -> usize {
        match self {
            Report::Ready { unit }
            | Report::Changed { unit, .. }
            | Report::Processed { unit, .. }
            | Report::Finished { unit }
            | Report::Failed { unit, .. } => *unit,
        }
    }
}
