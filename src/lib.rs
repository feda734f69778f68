//! Paint Timeline Library
//!
//! Measures application startup and paint timing from a screen recording.
//! Consecutive frames are compared in parallel, the changed regions are
//! replayed in frame order, and a small state machine picks out three
//! events: process launch, first blank paint, and UI settle.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! capture → pool (extraction per unit) → differentiator → analysis
//!                                              ↓
//!                                   progress / metrics
//! ```
//!
//! # Design Principles
//!
//! - **Ordered delivery**: results arrive out of order but are consumed in
//!   strictly increasing frame order
//! - **Owned buffers**: each frame pair moves to exactly one worker
//! - **Forward-only state**: every transition is checked centrally; an
//!   illegal one aborts the run
//! - **No partial results**: a failed run yields an error, never a partial
//!   timeline
//!
//! # Example
//!
//! ```no_run
//! use paint_timeline::{
//!     analysis::{Analyzer, ScanMode},
//!     capture::{FileConfig, ImageSequenceSource},
//!     differentiator::Differentiator,
//!     progress::TracingProgress,
//! };
//!
//! let config = FileConfig::default();
//! let mut source = ImageSequenceSource::open("recording/", config.playback.nominal_fps).unwrap();
//! let mut differentiator = Differentiator::with_threshold_engine("recording", &config).unwrap();
//!
//! let analyzer = Analyzer::new("recording", ScanMode::Full, config.detection.clone());
//! let report = analyzer
//!     .run(&mut differentiator, &mut source, &TracingProgress::new("recording"))
//!     .unwrap();
//!
//! for (event, frame) in report.timeline.iter() {
//!     println!("{event}: frame {frame}");
//! }
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod capture;
pub mod differentiator;
pub mod extraction;
pub mod lifecycle;
pub mod metrics;
pub mod pool;
pub mod progress;

// Re-export commonly used types at crate root
pub use analysis::{AnalysisReport, Analyzer, AnalyzerError, ScanMode, Timeline, TimelineEvent};
pub use capture::{FileConfig, Frame, FrameSource, ImageSequenceSource, ScriptedSource};
pub use differentiator::{Differentiator, DifferentiatorError, StopHandle};
pub use extraction::{Difference, FrameDiffer, Rect, ThresholdDiffer};
pub use progress::{ProgressListener, SilentProgress, TracingProgress};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
