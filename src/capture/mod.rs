//! Frame intake and configuration.
//!
//! This module provides the raster frame type, the frame source
//! abstraction the differentiator pulls from, and the configuration
//! shared by every pipeline stage.

mod config;
mod frame;
mod sequence;
mod source;

pub use config::{
    ConfigError, DetectionConfig, DiffConfig, FileConfig, PlaybackConfig, PoolConfig, NOMINAL_FPS,
};
pub use frame::{Frame, PixelFormat};
pub use sequence::ImageSequenceSource;
pub use source::{FrameSource, ScriptedSource, SourceError};
