//! Progress metrics collection and registry.

use crate::analysis::TimelineEvent;
use crate::extraction::FrameIndex;
use crate::progress::ProgressListener;
use prometheus::{Encoder, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Prometheus registry fed by a run's progress callbacks.
pub struct ProgressMetrics {
    registry: Registry,

    // Counters
    frames_decoded: IntGauge,
    frames_processed: IntGauge,
    frames_estimated_total: IntGauge,

    // Timeline
    event_frame: IntGaugeVec,
}

impl ProgressMetrics {
    /// Creates a registry with every progress metric registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_decoded = IntGauge::new(
            "paint_timeline_frames_decoded",
            "Frame pairs read from the source and dispatched",
        )?;
        let frames_processed = IntGauge::new(
            "paint_timeline_frames_processed",
            "Frame pairs compared by the worker pool",
        )?;
        let frames_estimated_total = IntGauge::new(
            "paint_timeline_frames_estimated_total",
            "Estimated frame count from duration and nominal rate",
        )?;
        let event_frame = IntGaugeVec::new(
            Opts::new(
                "paint_timeline_event_frame",
                "Frame index at which a timeline event was found",
            ),
            &["event"],
        )?;

        registry.register(Box::new(frames_decoded.clone()))?;
        registry.register(Box::new(frames_processed.clone()))?;
        registry.register(Box::new(frames_estimated_total.clone()))?;
        registry.register(Box::new(event_frame.clone()))?;

        Ok(Self {
            registry,
            frames_decoded,
            frames_processed,
            frames_estimated_total,
            event_frame,
        })
    }

    /// Clears per-run values before the next recording.
    pub fn reset(&self) {
        self.frames_decoded.set(0);
        self.frames_processed.set(0);
        self.frames_estimated_total.set(0);
        self.event_frame.reset();
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn gauge_value(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl ProgressListener for ProgressMetrics {
    fn on_frames_decoded(&self, current: u64, estimated_total: u64) {
        self.frames_decoded.set(gauge_value(current));
        self.frames_estimated_total.set(gauge_value(estimated_total));
    }

    fn on_frames_processed(&self, current: u64, estimated_total: u64) {
        self.frames_processed.set(gauge_value(current));
        self.frames_estimated_total.set(gauge_value(estimated_total));
    }

    fn on_timeline_event(&self, event: TimelineEvent, frame: FrameIndex) {
        self.event_frame
            .with_label_values(&[event.as_str()])
            .set(gauge_value(frame));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let metrics = ProgressMetrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_progress_updates_gauges() {
        let metrics = ProgressMetrics::new().unwrap();

        metrics.on_frames_decoded(12, 120);
        metrics.on_frames_processed(10, 120);
        metrics.on_timeline_event(TimelineEvent::Launch, 42);

        let output = metrics.encode().unwrap();
        assert!(output.contains("paint_timeline_frames_decoded 12"));
        assert!(output.contains("paint_timeline_frames_processed 10"));
        assert!(output.contains("paint_timeline_frames_estimated_total 120"));
        assert!(output.contains("paint_timeline_event_frame{event=\"launch\"} 42"));
    }

    #[test]
    fn test_reset_clears_events() {
        let metrics = ProgressMetrics::new().unwrap();
        metrics.on_timeline_event(TimelineEvent::Settled, 7);
        metrics.on_frames_processed(5, 5);
        metrics.reset();

        let output = metrics.encode().unwrap();
        assert!(!output.contains("event=\"settled\""));
        assert!(output.contains("paint_timeline_frames_processed 0"));
    }
}
