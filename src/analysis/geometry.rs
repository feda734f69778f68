//! Rect matchers for timeline events.

use crate::extraction::{almost_equal, Rect};
use serde::{Deserialize, Serialize};

/// Expected geometry of the launch indicator square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchIndicator {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Inclusive tolerance on every coordinate.
    pub tolerance: u32,
}

impl Default for LaunchIndicator {
    fn default() -> Self {
        Self {
            x: 1883,
            y: 1038,
            width: 23,
            height: 23,
            tolerance: 3,
        }
    }
}

impl LaunchIndicator {
    /// Returns true if `rect` is probably the launch indicator.
    pub fn matches(&self, rect: &Rect) -> bool {
        almost_equal(rect.width, self.width, self.tolerance)
            && almost_equal(rect.height, self.height, self.tolerance)
            && almost_equal(rect.x, self.x, self.tolerance)
            && almost_equal(rect.y, self.y, self.tolerance)
    }
}

/// Minimum size of the first full-content paint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirstBlankThreshold {
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for FirstBlankThreshold {
    fn default() -> Self {
        Self {
            min_width: 1276,
            min_height: 678,
        }
    }
}

impl FirstBlankThreshold {
    pub fn matches(&self, rect: &Rect) -> bool {
        rect.width >= self.min_width && rect.height >= self.min_height
    }
}
