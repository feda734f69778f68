//! Caller-side rect filtering.
//!
//! The difference engine reports every changed region. A blinking text
//! cursor produces a ~10x31 rect on almost every frame, which would keep
//! the timeline from ever settling, so workers drop those before reporting.

use super::rect::{almost_equal, Rect};
use serde::{Deserialize, Serialize};

/// Drops rects matching a fixed artifact size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectFilter {
    /// Artifact width in pixels.
    pub width: u32,
    /// Artifact height in pixels.
    pub height: u32,
    /// Inclusive tolerance applied to both dimensions.
    pub tolerance: u32,
}

impl Default for RectFilter {
    fn default() -> Self {
        Self {
            width: 10,
            height: 31,
            tolerance: 3,
        }
    }
}

impl RectFilter {
    /// Returns true if the rect should be reported.
    pub fn qualifies(&self, rect: &Rect) -> bool {
        !(almost_equal(rect.width, self.width, self.tolerance)
            && almost_equal(rect.height, self.height, self.tolerance))
    }

    /// Removes artifact rects in place, preserving order.
    pub fn retain(&self, rects: &mut Vec<Rect>) {
        rects.retain(|rect| self.qualifies(rect));
    }
}
