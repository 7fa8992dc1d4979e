use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use vigil_core::{Frame, FrameSource, FrameSourceError};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Still frames read from a directory, in file-name order.
///
/// Frames are stamped at a fixed interval from `base` so a recorded capture
/// replays with the timing it was taken at.
pub struct ImageDirSource {
    paths: Vec<PathBuf>,
    next: usize,
    base: Instant,
    interval: Duration,
    mirror: bool,
}

impl ImageDirSource {
    pub fn open(dir: &Path, fps: f64, base: Instant) -> Result<Self, FrameSourceError> {
        let io_err = |source| FrameSourceError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if is_image(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let interval = match Duration::try_from_secs_f64(1.0 / fps) {
            Ok(interval) if fps.is_finite() && fps > 0.0 => interval,
            _ => return Err(FrameSourceError::InvalidFrameRate { fps }),
        };

        tracing::info!(
            dir = %dir.display(),
            frames = paths.len(),
            fps,
            "image frame source opened"
        );

        Ok(Self {
            paths,
            next: 0,
            base,
            interval,
            mirror: false,
        })
    }

    /// Flip every frame horizontally, as a webcam preview does.
    pub fn mirrored(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };

        let img = image::open(path)
            .map_err(|e| FrameSourceError::Decode {
                path: path.clone(),
                message: e.to_string(),
            })?
            .to_rgb8();
        let img = if self.mirror {
            image::imageops::flip_horizontal(&img)
        } else {
            img
        };

        let sequence = self.next as u64;
        let captured_at = u32::try_from(sequence)
            .ok()
            .and_then(|n| self.interval.checked_mul(n))
            .and_then(|offset| self.base.checked_add(offset))
            .ok_or(FrameSourceError::Timestamp { sequence })?;
        self.next += 1;

        Ok(Some(Frame {
            sequence,
            width: img.width(),
            height: img.height(),
            data: img.into_raw(),
            captured_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "vigil-hw-test-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(path: &Path, width: u32, height: u32, left: [u8; 3]) {
        let img = image::RgbImage::from_fn(width, height, |x, _| {
            if x == 0 {
                image::Rgb(left)
            } else {
                image::Rgb([0, 0, 0])
            }
        });
        img.save(path).unwrap();
    }

    #[test]
    fn test_reads_images_in_name_order() {
        let dir = temp_dir("order");
        write_png(&dir.join("002.png"), 4, 2, [2, 2, 2]);
        write_png(&dir.join("001.png"), 4, 2, [1, 1, 1]);
        fs::write(dir.join("notes.txt"), b"not a frame").unwrap();

        let base = Instant::now();
        let mut source = ImageDirSource::open(&dir, 10.0, base).unwrap();
        assert_eq!(source.len(), 2);

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.sequence, 0);
        assert_eq!((first.width, first.height), (4, 2));
        assert_eq!(first.data.len(), 4 * 2 * 3);
        assert_eq!(&first.data[..3], &[1, 1, 1]);
        assert_eq!(first.captured_at, base);

        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(&second.data[..3], &[2, 2, 2]);
        assert_eq!(second.captured_at, base + Duration::from_millis(100));

        assert!(source.next_frame().unwrap().is_none());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_mirror_flips_horizontally() {
        let dir = temp_dir("mirror");
        write_png(&dir.join("frame.png"), 3, 1, [9, 9, 9]);

        let mut source = ImageDirSource::open(&dir, 30.0, Instant::now())
            .unwrap()
            .mirrored(true);
        let frame = source.next_frame().unwrap().unwrap();
        // left-most pixel moved to the right edge
        assert_eq!(&frame.data[..3], &[0, 0, 0]);
        assert_eq!(&frame.data[6..9], &[9, 9, 9]);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let dir = std::env::temp_dir().join("vigil-hw-test-does-not-exist");
        let err = ImageDirSource::open(&dir, 30.0, Instant::now()).err().unwrap();
        assert!(matches!(err, FrameSourceError::Io { .. }));
    }

    #[test]
    fn test_rejects_unusable_frame_rate() {
        let dir = temp_dir("fps");
        for fps in [0.0, -30.0, f64::NAN, f64::INFINITY, 1e-310] {
            let err = ImageDirSource::open(&dir, fps, Instant::now()).err().unwrap();
            assert!(matches!(err, FrameSourceError::InvalidFrameRate { .. }));
        }
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_stamp_past_clock_range_is_error() {
        let dir = temp_dir("stamp");
        write_png(&dir.join("001.png"), 2, 2, [1, 1, 1]);
        write_png(&dir.join("002.png"), 2, 2, [2, 2, 2]);
        // one frame every ~3e11 years
        let mut source = ImageDirSource::open(&dir, 1e-19, Instant::now()).unwrap();
        assert!(source.next_frame().unwrap().is_some());
        let err = source.next_frame().unwrap_err();
        assert!(matches!(err, FrameSourceError::Timestamp { sequence: 1 }));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_corrupt_image_is_decode_error() {
        let dir = temp_dir("corrupt");
        fs::write(dir.join("bad.png"), b"definitely not png").unwrap();
        let mut source = ImageDirSource::open(&dir, 30.0, Instant::now()).unwrap();
        let err = source.next_frame().unwrap_err();
        assert!(matches!(err, FrameSourceError::Decode { .. }));
        let _ = fs::remove_dir_all(&dir);
    }
}
