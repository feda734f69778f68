//! Frame difference engine.
//!
//! Compares two equally-sized frames and returns one bounding rect per
//! connected region of changed pixels. The engine is pure: no state carries
//! over between calls.

use super::rect::Rect;
use crate::capture::Frame;
use thiserror::Error;

/// Errors raised by a difference engine.
#[derive(Debug, Clone, Error)]
pub enum DiffError {
    #[error("frame shapes differ: {previous} vs {current}")]
    ShapeMismatch { previous: String, current: String },
    #[error("frame {0} buffer does not match its dimensions")]
    InvalidBuffer(u64),
    #[error("engine failed to initialize: {0}")]
    Init(String),
}

/// A pixel-level comparison engine.
///
/// Each worker unit owns its own engine instance, so implementations
/// need `Send` but not `Sync`.
pub trait FrameDiffer: Send {
    /// Returns the bounding rects of regions that changed between frames.
    fn compare(&mut self, previous: &Frame, current: &Frame) -> Result<Vec<Rect>, DiffError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Fixed-threshold luma differencing with 8-connected region grouping.
#[derive(Debug, Clone)]
pub struct ThresholdDiffer {
    /// Minimum absolute luma change for a pixel to count as changed.
    threshold: u8,
    /// Scratch mask reused across calls.
    mask: Vec<bool>,
    /// Scratch flood-fill stack reused across calls.
    stack: Vec<usize>,
}

impl ThresholdDiffer {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold: threshold.max(1),
            mask: Vec::new(),
            stack: Vec::new(),
        }
    }

    #[inline]
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    fn check_inputs(previous: &Frame, current: &Frame) -> Result<(), DiffError> {
        if !previous.is_valid() {
            return Err(DiffError::InvalidBuffer(previous.sequence()));
        }
        if !current.is_valid() {
            return Err(DiffError::InvalidBuffer(current.sequence()));
        }
        if !previous.same_shape(current) {
            return Err(DiffError::ShapeMismatch {
                previous: format!("{:?}", previous),
                current: format!("{:?}", current),
            });
        }
        Ok(())
    }

    /// Fills the change mask; returns the number of changed pixels.
    fn build_mask(&mut self, previous: &Frame, current: &Frame) -> usize {
        let count = current.pixel_count();
        self.mask.clear();
        self.mask.resize(count, false);

        let mut changed = 0;
        for (i, slot) in self.mask.iter_mut().enumerate() {
            if previous.luma_at(i).abs_diff(current.luma_at(i)) >= self.threshold {
                *slot = true;
                changed += 1;
            }
        }
        changed
    }

    /// Flood-fills the region containing `seed`, clearing it from the mask.
    fn take_region(&mut self, seed: usize, width: usize, height: usize) -> Rect {
        let (mut min_x, mut min_y) = (seed % width, seed / width);
        let (mut max_x, mut max_y) = (min_x, min_y);

        self.mask[seed] = false;
        self.stack.clear();
        self.stack.push(seed);

        while let Some(index) = self.stack.pop() {
            let (x, y) = (index % width, index / width);
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);

            let x_lo = x.saturating_sub(1);
            let x_hi = (x + 1).min(width - 1);
            let y_lo = y.saturating_sub(1);
            let y_hi = (y + 1).min(height - 1);

            for ny in y_lo..=y_hi {
                for nx in x_lo..=x_hi {
                    let neighbor = ny * width + nx;
                    if self.mask[neighbor] {
                        self.mask[neighbor] = false;
                        self.stack.push(neighbor);
                    }
                }
            }
        }

        Rect::new(
            min_x as u32,
            min_y as u32,
            (max_x - min_x + 1) as u32,
            (max_y - min_y + 1) as u32,
        )
    }
}

impl Default for ThresholdDiffer {
    fn default() -> Self {
        Self::new(24)
    }
}

impl FrameDiffer for ThresholdDiffer {
    fn compare(&mut self, previous: &Frame, current: &Frame) -> Result<Vec<Rect>, DiffError> {
        Self::check_inputs(previous, current)?;

        if self.build_mask(previous, current) == 0 {
            return Ok(Vec::new());
        }

        let width = current.width() as usize;
        let height = current.height() as usize;
        let mut rects = Vec::new();
        for seed in 0..self.mask.len() {
            if self.mask[seed] {
                rects.push(self.take_region(seed, width, height));
            }
        }

        tracing::trace!(
            frame = current.sequence(),
            regions = rects.len(),
            "Compared frame pair"
        );

        Ok(rects)
    }

    fn name(&self) -> &str {
        "threshold"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::PixelFormat;

    fn paint(frame: &mut Frame, rect: Rect, value: u8) {
        let width = frame.width() as usize;
        let pixels = frame.pixels_mut();
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                pixels[y as usize * width + x as usize] = value;
            }
        }
    }

    #[test]
    fn test_identical_frames_no_rects() {
        let mut differ = ThresholdDiffer::default();
        let a = Frame::filled(16, 16, 100, 0);
        let b = Frame::filled(16, 16, 100, 1);

        assert!(differ.compare(&a, &b).unwrap().is_empty());
    }

    #[test]
    fn test_small_change_below_threshold_ignored() {
        let mut differ = ThresholdDiffer::new(24);
        let a = Frame::filled(16, 16, 100, 0);
        let b = Frame::filled(16, 16, 110, 1);

        assert!(differ.compare(&a, &b).unwrap().is_empty());
    }

    #[test]
    fn test_single_region_bounding_box() {
        let mut differ = ThresholdDiffer::default();
        let a = Frame::filled(32, 32, 0, 0);
        let mut b = Frame::filled(32, 32, 0, 1);
        paint(&mut b, Rect::new(5, 7, 4, 3), 255);

        assert_eq!(differ.compare(&a, &b).unwrap(), vec![Rect::new(5, 7, 4, 3)]);
    }

    #[test]
    fn test_separate_regions_reported_separately() {
        let mut differ = ThresholdDiffer::default();
        let a = Frame::filled(32, 32, 0, 0);
        let mut b = Frame::filled(32, 32, 0, 1);
        paint(&mut b, Rect::new(1, 1, 2, 2), 255);
        paint(&mut b, Rect::new(20, 20, 5, 5), 255);

        let rects = differ.compare(&a, &b).unwrap();
        assert_eq!(rects, vec![Rect::new(1, 1, 2, 2), Rect::new(20, 20, 5, 5)]);
    }

    #[test]
    fn test_diagonal_pixels_are_connected() {
        let mut differ = ThresholdDiffer::default();
        let a = Frame::filled(8, 8, 0, 0);
        let mut b = Frame::filled(8, 8, 0, 1);
        paint(&mut b, Rect::new(2, 2, 1, 1), 255);
        paint(&mut b, Rect::new(3, 3, 1, 1), 255);

        assert_eq!(differ.compare(&a, &b).unwrap(), vec![Rect::new(2, 2, 2, 2)]);
    }

    #[test]
    fn test_region_touching_edges() {
        let mut differ = ThresholdDiffer::default();
        let a = Frame::filled(8, 4, 0, 0);
        let b = Frame::filled(8, 4, 255, 1);

        assert_eq!(differ.compare(&a, &b).unwrap(), vec![Rect::new(0, 0, 8, 4)]);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut differ = ThresholdDiffer::default();
        let a = Frame::filled(8, 8, 0, 0);
        let b = Frame::with_format(vec![0; 8 * 8 * 4], 8, 8, PixelFormat::Rgba8, 1);

        assert!(matches!(
            differ.compare(&a, &b),
            Err(DiffError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_buffer_rejected() {
        let mut differ = ThresholdDiffer::default();
        let a = Frame::new(vec![0; 10], 8, 8, 3);
        let b = Frame::filled(8, 8, 0, 4);

        assert!(matches!(differ.compare(&a, &b), Err(DiffError::InvalidBuffer(3))));
    }
}
