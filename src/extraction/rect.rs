//! Changed-region geometry.

use serde::{Deserialize, Serialize};

/// Index of a compared frame pair.
///
/// Pair `k` compares source frame `k` with frame `k - 1`, so the first real
/// pair is 1. Index 0 is the "no prior difference" sentinel.
pub type FrameIndex = u64;

/// Axis-aligned bounding box of a changed region, in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Changed regions found for one frame pair.
///
/// Only emitted for pairs with at least one rect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Difference {
    pub frame_index: FrameIndex,
    pub rects: Vec<Rect>,
}

/// Returns true if `left` and `right` differ by at most `epsilon`.
#[inline]
pub fn almost_equal(left: u32, right: u32, epsilon: u32) -> bool {
    left.abs_diff(right) <= epsilon
}
