//! Raster frame type sampled from a screen recording.

/// Pixel layout of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// One luma byte per pixel.
    Gray8,
    /// Four bytes per pixel, red/green/blue/alpha.
    Rgba8,
}

impl PixelFormat {
    /// Bytes occupied by one pixel.
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// A single decoded frame of a recording.
///
/// Frames own their pixel buffer outright. A frame handed to the worker
/// pool is moved, never shared, so no unit ever sees another unit's buffer.
#[derive(Clone)]
pub struct Frame {
    /// Raw pixel data laid out row-major according to `format`.
    pixels: Vec<u8>,
    /// Frame width in pixels.
    width: u32,
    /// Frame height in pixels.
    height: u32,
    /// Pixel layout of `pixels`.
    format: PixelFormat,
    /// Position of this frame in its source, starting at 0.
    sequence: u64,
}

impl Frame {
    /// Creates a grayscale frame.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self::with_format(pixels, width, height, PixelFormat::Gray8, sequence)
    }

    /// Creates a frame with an explicit pixel format.
    pub fn with_format(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        sequence: u64,
    ) -> Self {
        Self {
            pixels,
            width,
            height,
            format,
            sequence,
        }
    }

    /// Creates a grayscale frame filled with a single value.
    pub fn filled(width: u32, height: u32, value: u8, sequence: u64) -> Self {
        let len = (width as usize) * (height as usize);
        Self::new(vec![value; len], width, height, sequence)
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Validates that the pixel buffer size matches dimensions and format.
    pub fn is_valid(&self) -> bool {
        self.pixels.len() == self.pixel_count() * self.format.bytes_per_pixel()
    }

    /// Returns true if both frames can be compared pixel for pixel.
    pub fn same_shape(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height && self.format == other.format
    }

    /// Luma of the pixel at `index` (row-major pixel offset, not byte offset).
    ///
    /// Uses the Rec. 601 weights in fixed point.
    #[inline]
    pub fn luma_at(&self, index: usize) -> u8 {
        match self.format {
            PixelFormat::Gray8 => self.pixels[index],
            PixelFormat::Rgba8 => {
                let base = index * 4;
                let r = self.pixels[base] as u32;
                let g = self.pixels[base + 1] as u32;
                let b = self.pixels[base + 2] as u32;
                ((r * 299 + g * 587 + b * 114 + 500) / 1000) as u8
            }
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}
