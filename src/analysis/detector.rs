//! Timeline detection state machine.
//!
//! Rects are evaluated one at a time in arrival order:
//!
//! ```text
//! FindingLaunch ──launch rect──▶ FindingFirstBlank ──blank rect──▶ FindingSettled
//!       │  (launch-only mode)            │                               │
//!       └───────────────▶ Done ◀─────────┴───────── on_done ─────────────┘
//! ```
//!
//! `FindingSettled` never advances by itself. It remembers the last frame
//! with a difference and records it as `Settled` when the differentiator
//! finishes.

use super::geometry::{FirstBlankThreshold, LaunchIndicator};
use super::timeline::{Timeline, TimelineEvent};
use crate::capture::DetectionConfig;
use crate::differentiator::{DifferenceConsumer, StopHandle};
use crate::extraction::{Difference, FrameIndex, Rect};
use crate::lifecycle::{InvariantViolation, Lifecycle, StateCell};
use crate::progress::ProgressListener;
use serde::{Deserialize, Serialize};

/// Which events to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Stop as soon as `Launch` is found.
    LaunchOnly,
    /// Find `Launch`, `FirstBlank` and `Settled`.
    #[default]
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerState {
    FindingLaunch,
    FindingFirstBlank,
    FindingSettled,
    Done,
}

impl Lifecycle for AnalyzerState {
    const MACHINE: &'static str = "analyzer";

    fn permits(self, next: Self) -> bool {
        use AnalyzerState::*;
        matches!(
            (self, next),
            (FindingLaunch, FindingFirstBlank)
                | (FindingFirstBlank, FindingSettled)
                | (FindingLaunch | FindingFirstBlank | FindingSettled, Done)
        )
    }
}

/// Consumes the ordered difference stream and builds a [`Timeline`].
pub struct TimelineDetector<'a> {
    filename: String,
    mode: ScanMode,
    launch: LaunchIndicator,
    first_blank: FirstBlankThreshold,
    state: StateCell<AnalyzerState>,
    timeline: Timeline,
    /// Frame 0 is the pre-resolved sentinel.
    last_difference: FrameIndex,
    stop: StopHandle,
    progress: &'a dyn ProgressListener,
}

impl<'a> TimelineDetector<'a> {
    /// `stop` is fired once the detector reaches `Done`.
    pub fn new(
        filename: impl Into<String>,
        mode: ScanMode,
        detection: &DetectionConfig,
        stop: StopHandle,
        progress: &'a dyn ProgressListener,
    ) -> Self {
        Self {
            filename: filename.into(),
            mode,
            launch: detection.launch,
            first_blank: detection.first_blank,
            state: StateCell::new(AnalyzerState::FindingLaunch),
            timeline: Timeline::new(),
            last_difference: 0,
            stop,
            progress,
        }
    }

    #[inline]
    pub fn state(&self) -> AnalyzerState {
        self.state.current()
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.state.is(AnalyzerState::Done)
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn into_timeline(self) -> Timeline {
        self.timeline
    }

    fn evaluate(&mut self, frame_index: FrameIndex, rect: &Rect) -> Result<(), InvariantViolation> {
        match self.state.current() {
            AnalyzerState::FindingLaunch => {
                if self.launch.matches(rect) {
                    tracing::info!(filename = %self.filename, frame_index, "Found launch frame");
                    self.update_timeline(TimelineEvent::Launch, frame_index)?;
                    match self.mode {
                        ScanMode::LaunchOnly => self.enter_done()?,
                        ScanMode::Full => {
                            self.state.transition(AnalyzerState::FindingFirstBlank)?;
                        }
                    }
                }
            }
            AnalyzerState::FindingFirstBlank => {
                if self.first_blank.matches(rect) {
                    tracing::info!(filename = %self.filename, frame_index, "Found first blank frame");
                    self.update_timeline(TimelineEvent::FirstBlank, frame_index)?;
                    self.state.transition(AnalyzerState::FindingSettled)?;
                }
            }
            AnalyzerState::FindingSettled => {
                self.last_difference = frame_index;
            }
            AnalyzerState::Done => {}
        }
        Ok(())
    }

    fn update_timeline(
        &mut self,
        event: TimelineEvent,
        frame: FrameIndex,
    ) -> Result<(), InvariantViolation> {
        if self.is_done() {
            return Err(InvariantViolation::EventAfterDone(event));
        }
        self.timeline.record(event, frame)?;
        self.progress.on_timeline_event(event, frame);
        Ok(())
    }

    fn enter_done(&mut self) -> Result<(), InvariantViolation> {
        self.state.transition(AnalyzerState::Done)?;
        tracing::info!(
            filename = %self.filename,
            timeline = ?self.timeline,
            "Timeline complete"
        );
        self.stop.stop();
        Ok(())
    }
}

impl DifferenceConsumer for TimelineDetector<'_> {
    fn on_difference(&mut self, difference: &Difference) -> Result<(), InvariantViolation> {
        tracing::trace!(
            filename = %self.filename,
            frame_index = difference.frame_index,
            rects = difference.rects.len(),
            "Difference"
        );
        for rect in &difference.rects {
            self.evaluate(difference.frame_index, rect)?;
            if self.is_done() {
                break;
            }
        }
        Ok(())
    }

    fn on_done(&mut self) -> Result<(), InvariantViolation> {
        if self.is_done() {
            return Ok(());
        }
        tracing::info!(
            filename = %self.filename,
            last_difference = self.last_difference,
            "Found last difference frame"
        );
        self.update_timeline(TimelineEvent::Settled, self.last_difference)?;
        self.enter_done()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::testing::RecordingProgress;
    use crate::progress::SilentProgress;

    const LAUNCH: Rect = Rect::new(1883, 1038, 23, 23);
    const BLANK: Rect = Rect::new(322, 201, 1276, 678);
    const SMALL: Rect = Rect::new(40, 40, 100, 20);

    fn detector<'a>(mode: ScanMode, progress: &'a dyn ProgressListener) -> TimelineDetector<'a> {
        TimelineDetector::new(
            "a.mp4",
            mode,
            &DetectionConfig::default(),
            StopHandle::new(),
            progress,
        )
    }

    fn diff(frame_index: FrameIndex, rects: &[Rect]) -> Difference {
        Difference {
            frame_index,
            rects: rects.to_vec(),
        }
    }

    #[test]
    fn test_transition_table() {
        use AnalyzerState::*;
        let all = [FindingLaunch, FindingFirstBlank, FindingSettled, Done];
        for from in all {
            assert!(!from.permits(FindingLaunch), "{from:?} -> FindingLaunch");
        }
        assert!(FindingLaunch.permits(Done));
        assert!(FindingFirstBlank.permits(Done));
        assert!(!FindingLaunch.permits(FindingSettled));
        assert!(!Done.permits(Done));
    }

    #[test]
    fn test_launch_detected_at_frame() {
        let progress = RecordingProgress::default();
        let mut d = detector(ScanMode::Full, &progress);

        d.on_difference(&diff(7, &[SMALL])).unwrap();
        d.on_difference(&diff(42, &[SMALL, LAUNCH])).unwrap();

        assert_eq!(d.timeline().get(TimelineEvent::Launch), Some(42));
        assert_eq!(d.state(), AnalyzerState::FindingFirstBlank);
        assert_eq!(
            *progress.events.lock().unwrap(),
            vec![(TimelineEvent::Launch, 42)]
        );
    }

    #[test]
    fn test_launch_off_by_four_ignored() {
        let mut d = detector(ScanMode::Full, &SilentProgress);
        d.on_difference(&diff(3, &[Rect::new(1887, 1038, 23, 23)]))
            .unwrap();
        assert_eq!(d.state(), AnalyzerState::FindingLaunch);

        d.on_difference(&diff(4, &[Rect::new(1886, 1038, 23, 23)]))
            .unwrap();
        assert_eq!(d.timeline().get(TimelineEvent::Launch), Some(4));
    }

    #[test]
    fn test_first_blank_after_launch() {
        let mut d = detector(ScanMode::Full, &SilentProgress);
        // A blank-sized rect before launch is not a first blank.
        d.on_difference(&diff(1, &[BLANK])).unwrap();
        d.on_difference(&diff(2, &[LAUNCH])).unwrap();
        d.on_difference(&diff(5, &[Rect::new(0, 0, 1275, 678)]))
            .unwrap();
        assert_eq!(d.state(), AnalyzerState::FindingFirstBlank);

        d.on_difference(&diff(9, &[BLANK])).unwrap();
        assert_eq!(d.timeline().get(TimelineEvent::FirstBlank), Some(9));
        assert_eq!(d.state(), AnalyzerState::FindingSettled);
    }

    #[test]
    fn test_settled_is_last_difference_not_last_frame() {
        let stop = StopHandle::new();
        let mut d = TimelineDetector::new(
            "a.mp4",
            ScanMode::Full,
            &DetectionConfig::default(),
            stop.clone(),
            &SilentProgress,
        );
        d.on_difference(&diff(2, &[LAUNCH])).unwrap();
        d.on_difference(&diff(9, &[BLANK])).unwrap();
        d.on_difference(&diff(15, &[SMALL])).unwrap();
        d.on_difference(&diff(31, &[SMALL, SMALL])).unwrap();
        assert_eq!(d.state(), AnalyzerState::FindingSettled);
        assert!(!stop.is_stopped());

        d.on_done().unwrap();

        assert_eq!(d.timeline().get(TimelineEvent::Settled), Some(31));
        assert!(d.is_done());
        assert!(stop.is_stopped());
    }

    #[test]
    fn test_launch_only_stops_mid_difference() {
        let stop = StopHandle::new();
        let progress = RecordingProgress::default();
        let mut d = TimelineDetector::new(
            "a.mp4",
            ScanMode::LaunchOnly,
            &DetectionConfig::default(),
            stop.clone(),
            &progress,
        );

        d.on_difference(&diff(12, &[LAUNCH, BLANK, LAUNCH])).unwrap();

        assert!(d.is_done());
        assert!(stop.is_stopped());
        assert_eq!(d.timeline().len(), 1);
        assert_eq!(progress.events.lock().unwrap().len(), 1);

        // Completion after Done is ignored.
        d.on_done().unwrap();
        assert_eq!(d.timeline().get(TimelineEvent::Settled), None);
    }

    #[test]
    fn test_no_differences_settles_on_sentinel() {
        let mut d = detector(ScanMode::Full, &SilentProgress);
        d.on_done().unwrap();

        assert_eq!(d.timeline().get(TimelineEvent::Settled), Some(0));
        assert!(!d.timeline().contains(TimelineEvent::Launch));
        assert!(!d.timeline().contains(TimelineEvent::FirstBlank));
    }

    #[test]
    fn test_event_after_done_rejected() {
        let mut d = detector(ScanMode::LaunchOnly, &SilentProgress);
        d.on_difference(&diff(1, &[LAUNCH])).unwrap();
        assert_eq!(
            d.update_timeline(TimelineEvent::Settled, 5),
            Err(InvariantViolation::EventAfterDone(TimelineEvent::Settled))
        );
    }
}
