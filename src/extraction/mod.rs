//! Frame comparison.
//!
//! This module turns a pair of consecutive frames into the set of
//! rectangles bounding the regions that changed between them. The engine
//! behind [`FrameDiffer`] is swappable; workers own one instance each and
//! filter its output with a [`RectFilter`] before reporting.

mod differ;
mod filter;
mod rect;

pub use differ::{DiffError, FrameDiffer, ThresholdDiffer};
pub use filter::RectFilter;
pub use rect::{almost_equal, Difference, FrameIndex, Rect};
