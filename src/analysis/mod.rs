//! Timeline analysis.
//!
//! The [`Analyzer`] drives a [`Differentiator`] with a [`TimelineDetector`]
//! as its consumer and turns the ordered difference stream into a
//! [`Timeline`] of three events: launch, first blank paint, and settle.

mod detector;
mod geometry;
mod timeline;

pub use detector::{AnalyzerState, ScanMode, TimelineDetector};
pub use geometry::{FirstBlankThreshold, LaunchIndicator};
pub use timeline::{Timeline, TimelineEvent, CROP_LEAD_FRAMES};

use crate::capture::{DetectionConfig, FrameSource};
use crate::differentiator::{Differentiator, DifferentiatorError};
use crate::lifecycle::InvariantViolation;
use crate::progress::ProgressListener;
use serde::Serialize;
use thiserror::Error;

/// Errors that abort an analysis. No partial timeline is produced.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error(transparent)]
    Differentiator(#[from] DifferentiatorError),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Result of analyzing one recording.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub filename: String,
    /// Frame pairs compared before the run ended.
    pub frames_processed: u64,
    /// True if the run ended through a stop rather than exhaustion.
    pub stopped_early: bool,
    pub timeline: Timeline,
}

/// Analyzes one recording.
#[derive(Debug, Clone)]
pub struct Analyzer {
    filename: String,
    mode: ScanMode,
    detection: DetectionConfig,
}

impl Analyzer {
    pub fn new(filename: impl Into<String>, mode: ScanMode, detection: DetectionConfig) -> Self {
        Self {
            filename: filename.into(),
            mode,
            detection,
        }
    }

    #[inline]
    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    /// Runs the differentiator over `source` and returns the timeline.
    ///
    /// The detector stops the differentiator once it is done, so a
    /// launch-only scan does not read the rest of the recording. Every
    /// successful run ends with the detector done: the differentiator
    /// always signals completion, even after a stop.
    pub fn run(
        &self,
        differentiator: &mut Differentiator,
        source: &mut dyn FrameSource,
        progress: &dyn ProgressListener,
    ) -> Result<AnalysisReport, AnalyzerError> {
        tracing::info!(filename = %self.filename, mode = ?self.mode, "Analyzing");

        let mut detector = TimelineDetector::new(
            self.filename.clone(),
            self.mode,
            &self.detection,
            differentiator.stop_handle(),
            progress,
        );
        let result = differentiator.run(source, &mut detector, progress)?;
        debug_assert!(detector.is_done());

        Ok(AnalysisReport {
            filename: self.filename.clone(),
            timeline: detector.into_timeline(),
            frames_processed: result.frames_processed,
            stopped_early: result.stopped_early,
        })
    }
}
