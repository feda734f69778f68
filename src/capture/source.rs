//! Frame source abstraction.
//!
//! Decoding a recording is outside this crate; anything that can yield
//! equal-sized frames in order at a fixed sampling rate can drive an
//! analysis. Tests use [`ScriptedSource`].

use super::Frame;
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while reading frames.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read frame source: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode frame {index}: {message}")]
    Decode { index: u64, message: String },
    #[error("frame {index} is {width}x{height}, expected {expected_width}x{expected_height}")]
    DimensionMismatch {
        index: u64,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
    #[error("no frames found in {0}")]
    Empty(String),
}

/// A finite, lazy sequence of equal-dimension frames.
pub trait FrameSource {
    /// Human-readable name used in logs and reports.
    fn name(&self) -> &str;

    /// Total duration of the recording, known up front.
    fn duration(&self) -> Duration;

    /// Returns true once every frame has been read.
    ///
    /// The differentiator checks this before each read; a source that
    /// reports ended is not read again.
    fn has_ended(&self) -> bool;

    /// Blocks until the next frame is available.
    ///
    /// Returns `Ok(None)` once the source is exhausted.
    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

/// In-memory source replaying a fixed list of frames.
#[derive(Debug)]
pub struct ScriptedSource {
    name: String,
    frames: VecDeque<Frame>,
    duration: Duration,
}

impl ScriptedSource {
    /// Creates a source whose duration is derived from the frame count at `fps`.
    pub fn new(name: impl Into<String>, frames: Vec<Frame>, fps: u32) -> Self {
        let fps = fps.max(1);
        let duration = Duration::from_nanos(frames.len() as u64 * 1_000_000_000 / fps as u64);
        Self {
            name: name.into(),
            frames: frames.into(),
            duration,
        }
    }

    /// Overrides the advertised duration (container metadata is often imprecise).
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Number of frames not yet read.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn has_ended(&self) -> bool {
        self.frames.is_empty()
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        Ok(self.frames.pop_front())
    }
}
