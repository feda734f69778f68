//! Prometheus metrics for analysis progress.
//!
//! [`ProgressMetrics`] is a [`ProgressListener`](crate::progress::ProgressListener)
//! that mirrors a run's counters and timeline into a Prometheus registry,
//! exportable in text format.
//!
//! # Metrics Exposed
//!
//! - `paint_timeline_frames_decoded` - Frame pairs dispatched so far
//! - `paint_timeline_frames_processed` - Frame pairs compared so far
//! - `paint_timeline_frames_estimated_total` - Estimated frame count
//! - `paint_timeline_event_frame{event}` - Frame of each located event
//!
//! # Example
//!
//! ```no_run
//! use paint_timeline::metrics::ProgressMetrics;
//! use paint_timeline::progress::ProgressListener;
//!
//! let metrics = ProgressMetrics::new().expect("Failed to create registry");
//! metrics.on_frames_processed(30, 120);
//! println!("{}", metrics.encode().expect("Failed to encode"));
//! ```

mod collector;

pub use collector::{MetricsError, ProgressMetrics};
