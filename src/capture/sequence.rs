//! Frame source backed by a directory of still images.
//!
//! A recording exported as numbered stills (`frame_0001.png`, ...) is read
//! lazily in file-name order. Each file counts as one sample at the
//! nominal frame rate.

use super::source::{FrameSource, SourceError};
use super::{Frame, PixelFormat};
use std::path::{Path, PathBuf};
use std::time::Duration;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

/// Lazily decodes a sorted directory of images as frames.
pub struct ImageSequenceSource {
    name: String,
    paths: Vec<PathBuf>,
    next: usize,
    fps: u32,
    dimensions: Option<(u32, u32)>,
}

impl ImageSequenceSource {
    /// Opens a directory and indexes its image files.
    pub fn open(dir: impl AsRef<Path>, fps: u32) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(SourceError::Empty(dir.display().to_string()));
        }
        paths.sort_by_cached_key(|path| (natural_key(path), path.clone()));

        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());

        tracing::debug!(source = %name, frames = paths.len(), fps, "Indexed image sequence");

        Ok(Self {
            name,
            paths,
            next: 0,
            fps: fps.max(1),
            dimensions: None,
        })
    }

    /// Number of frames in the sequence.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns true if the sequence holds no frames.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// One run of a file name: digits compare by value, text byte-wise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum NameChunk {
    /// Leading zeros stripped; shorter digit runs are smaller numbers.
    Number { len: usize, digits: String },
    Text(String),
}

/// Sort key that puts `frame_2` before `frame_10`.
fn natural_key(path: &Path) -> Vec<NameChunk> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut chunks = Vec::new();
    let mut rest = name.as_str();
    while let Some(first) = rest.chars().next() {
        let is_digit = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != is_digit)
            .unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        chunks.push(if is_digit {
            let digits = run.trim_start_matches('0').to_string();
            NameChunk::Number {
                len: digits.len(),
                digits,
            }
        } else {
            NameChunk::Text(run.to_string())
        });
        rest = tail;
    }
    chunks
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn duration(&self) -> Duration {
        Duration::from_nanos(self.paths.len() as u64 * 1_000_000_000 / self.fps as u64)
    }

    fn has_ended(&self) -> bool {
        self.next >= self.paths.len()
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        let index = self.next as u64;

        let image = image::open(path)
            .map_err(|e| SourceError::Decode {
                index,
                message: format!("{}: {}", path.display(), e),
            })?
            .to_rgba8();
        let (width, height) = image.dimensions();

        match self.dimensions {
            None => self.dimensions = Some((width, height)),
            Some((expected_width, expected_height))
                if (expected_width, expected_height) != (width, height) =>
            {
                return Err(SourceError::DimensionMismatch {
                    index,
                    width,
                    height,
                    expected_width,
                    expected_height,
                });
            }
            Some(_) => {}
        }

        self.next += 1;
        Ok(Some(Frame::with_format(
            image.into_raw(),
            width,
            height,
            PixelFormat::Rgba8,
            index,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "paint-timeline-{}-{}",
            label,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(dir: &Path, name: &str, width: u32, height: u32, value: u8) {
        let image = image::GrayImage::from_pixel(width, height, image::Luma([value]));
        image.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_reads_frames_in_name_order() {
        let dir = temp_dir("order");
        write_png(&dir, "frame_002.png", 4, 3, 200);
        write_png(&dir, "frame_001.png", 4, 3, 10);
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let mut source = ImageSequenceSource::open(&dir, 60).unwrap();
        assert_eq!(source.len(), 2);

        let first = source.read_frame().unwrap().unwrap();
        assert_eq!(first.format(), PixelFormat::Rgba8);
        assert_eq!((first.width(), first.height()), (4, 3));
        assert!(first.is_valid());
        assert_eq!(first.luma_at(0), 10);

        let second = source.read_frame().unwrap().unwrap();
        assert_eq!(second.luma_at(0), 200);
        assert!(source.has_ended());
        assert!(source.read_frame().unwrap().is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unpadded_frame_numbers_read_in_numeric_order() {
        let dir = temp_dir("unpadded");
        for i in 1..=11u8 {
            write_png(&dir, &format!("frame_{i}.png"), 2, 2, i);
        }

        let mut source = ImageSequenceSource::open(&dir, 60).unwrap();
        let mut order = Vec::new();
        while let Some(frame) = source.read_frame().unwrap() {
            order.push(frame.luma_at(0));
        }
        assert_eq!(order, (1..=11).collect::<Vec<u8>>());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_natural_key_ordering() {
        let mut names = vec!["f_10.png", "f_2.png", "f_1.png", "f_003.png", "g_0.png"];
        names.sort_by_cached_key(|n| natural_key(Path::new(n)));
        assert_eq!(names, vec!["f_1.png", "f_2.png", "f_003.png", "f_10.png", "g_0.png"]);
    }

    #[test]
    fn test_dimension_change_rejected() {
        let dir = temp_dir("dims");
        write_png(&dir, "a.png", 4, 4, 0);
        write_png(&dir, "b.png", 5, 4, 0);

        let mut source = ImageSequenceSource::open(&dir, 60).unwrap();
        assert!(source.read_frame().is_ok());
        assert!(matches!(
            source.read_frame(),
            Err(SourceError::DimensionMismatch { index: 1, .. })
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_empty_directory_rejected() {
        let dir = temp_dir("empty");
        assert!(matches!(
            ImageSequenceSource::open(&dir, 60),
            Err(SourceError::Empty(_))
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
