//! Progress reporting sinks.
//!
//! Progress is advisory: the totals are estimates derived from the
//! recording duration, and nothing a listener does can influence detection.

use crate::analysis::TimelineEvent;
use crate::extraction::FrameIndex;

/// Receives decode/process counters and timeline events for one run.
pub trait ProgressListener {
    /// A frame pair was read from the source and dispatched.
    fn on_frames_decoded(&self, _current: u64, _estimated_total: u64) {}

    /// A worker finished comparing a frame pair.
    fn on_frames_processed(&self, _current: u64, _estimated_total: u64) {}

    /// The analyzer located a timeline event.
    fn on_timeline_event(&self, _event: TimelineEvent, _frame: FrameIndex) {}
}

/// Discards all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressListener for SilentProgress {}

/// Logs progress through `tracing`.
///
/// Counters are logged every `every` frames to keep long recordings quiet;
/// timeline events are always logged.
#[derive(Debug, Clone)]
pub struct TracingProgress {
    filename: String,
    every: u64,
}

impl TracingProgress {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            every: 60,
        }
    }

    /// Logs counters every `every` frames (at least 1).
    pub fn with_interval(mut self, every: u64) -> Self {
        self.every = every.max(1);
        self
    }

    fn should_log(&self, current: u64, estimated_total: u64) -> bool {
        current % self.every == 0 || current >= estimated_total
    }
}

impl ProgressListener for TracingProgress {
    fn on_frames_decoded(&self, current: u64, estimated_total: u64) {
        if self.should_log(current, estimated_total) {
            tracing::debug!(
                filename = %self.filename,
                current,
                estimated_total,
                "Frames decoded"
            );
        }
    }

    fn on_frames_processed(&self, current: u64, estimated_total: u64) {
        if self.should_log(current, estimated_total) {
            tracing::info!(
                filename = %self.filename,
                current,
                estimated_total,
                "Frames processed"
            );
        }
    }

    fn on_timeline_event(&self, event: TimelineEvent, frame: FrameIndex) {
        tracing::info!(filename = %self.filename, %event, frame, "Timeline event");
    }
}

/// Forwards every callback to each listener in order.
pub struct FanOut<'a> {
    listeners: Vec<&'a dyn ProgressListener>,
}

impl<'a> FanOut<'a> {
    pub fn new(listeners: Vec<&'a dyn ProgressListener>) -> Self {
        Self { listeners }
    }
}

impl ProgressListener for FanOut<'_> {
    fn on_frames_decoded(&self, current: u64, estimated_total: u64) {
        for listener in &self.listeners {
            listener.on_frames_decoded(current, estimated_total);
        }
    }

    fn on_frames_processed(&self, current: u64, estimated_total: u64) {
        for listener in &self.listeners {
            listener.on_frames_processed(current, estimated_total);
        }
    }

    fn on_timeline_event(&self, event: TimelineEvent, frame: FrameIndex) {
        for listener in &self.listeners {
            listener.on_timeline_event(event, frame);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every callback for assertions.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingProgress {
        pub(crate) decoded: Mutex<Vec<(u64, u64)>>,
        pub(crate) processed: Mutex<Vec<(u64, u64)>>,
        pub(crate) events: Mutex<Vec<(TimelineEvent, FrameIndex)>>,
    }

    impl ProgressListener for RecordingProgress {
        fn on_frames_decoded(&self, current: u64, estimated_total: u64) {
            self.decoded.lock().unwrap().push((current, estimated_total));
        }

        fn on_frames_processed(&self, current: u64, estimated_total: u64) {
            self.processed.lock().unwrap().push((current, estimated_total));
        }

        fn on_timeline_event(&self, event: TimelineEvent, frame: FrameIndex) {
            self.events.lock().unwrap().push((event, frame));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingProgress;
    use super::*;

    #[test]
    fn test_fan_out_reaches_every_listener() {
        let a = RecordingProgress::default();
        let b = RecordingProgress::default();
        let fan = FanOut::new(vec![&a, &b, &SilentProgress]);

        fan.on_frames_decoded(1, 10);
        fan.on_timeline_event(TimelineEvent::Launch, 4);

        for recorder in [&a, &b] {
            assert_eq!(*recorder.decoded.lock().unwrap(), vec![(1, 10)]);
            assert_eq!(
                *recorder.events.lock().unwrap(),
                vec![(TimelineEvent::Launch, 4)]
            );
        }
    }

    #[test]
    fn test_tracing_interval() {
        let progress = TracingProgress::new("a.mp4").with_interval(10);
        assert!(progress.should_log(10, 100));
        assert!(!progress.should_log(11, 100));
        assert!(progress.should_log(100, 100));
    }
}
