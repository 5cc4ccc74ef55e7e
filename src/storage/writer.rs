//! Persistence writer: frame images plus their log records

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::debug;

use crate::capture::{ImageBuffer, PixelFormat};
use crate::error::StorageError;
use crate::storage::{bitmap, depth_png, log};
use crate::sync::Timestamp;

/// On-disk layout of a capture session, all paths relative to `root`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    pub root: PathBuf,
    pub color_dir: String,
    pub depth_dir: String,
    /// Color directory named in association records. The bitmaps
    /// themselves live under `color_dir`.
    pub association_color_dir: String,
    pub associations: String,
    pub depth_log: String,
    pub rgb_timestamps: String,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            color_dir: "CapturedRGB".into(),
            depth_dir: "depth".into(),
            association_color_dir: "rgb".into(),
            associations: "associations.txt".into(),
            depth_log: "depth.txt".into(),
            rgb_timestamps: "rgb_timestamps.txt".into(),
        }
    }

    /// Color file path on disk, as named in `rgb_timestamps.txt`
    pub fn color_relative(&self, timestamp: Timestamp) -> String {
        format!("{}/rgb_{timestamp}.bmp", self.color_dir)
    }

    /// Color file path as it appears in association records
    pub fn association_color_relative(&self, timestamp: Timestamp) -> String {
        format!("{}/rgb_{timestamp}.bmp", self.association_color_dir)
    }

    /// Depth file path as it appears in log records
    pub fn depth_relative(&self, timestamp: Timestamp) -> String {
        format!("{}/depth_{timestamp}.png", self.depth_dir)
    }

    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Resolve a color path from any log, mapping the association prefix
    /// onto the directory the bitmaps are actually written to.
    pub fn resolve_color(&self, relative: &str) -> PathBuf {
        match relative
            .strip_prefix(self.association_color_dir.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
        {
            Some(file) => self.root.join(&self.color_dir).join(file),
            None => self.resolve(relative),
        }
    }

    pub fn associations_path(&self) -> PathBuf {
        self.root.join(&self.associations)
    }

    pub fn depth_log_path(&self) -> PathBuf {
        self.root.join(&self.depth_log)
    }

    pub fn rgb_timestamps_path(&self) -> PathBuf {
        self.root.join(&self.rgb_timestamps)
    }
}

/// Writes color and depth frames of one capture session.
///
/// Single writer per log file; no cross-process locking.
pub struct DatasetWriter {
    layout: DatasetLayout,
    started: Instant,
}

impl DatasetWriter {
    pub fn new(layout: DatasetLayout) -> Self {
        Self {
            layout,
            started: Instant::now(),
        }
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    fn ensure_dir(path: &Path) -> Result<(), StorageError> {
        fs::create_dir_all(path).map_err(|e| StorageError::io(path, e))
    }

    /// Milliseconds since the writer was created
    fn tick_count(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    /// Save a color frame and link it to the depth file that will carry the
    /// same timestamp. The depth file need not exist yet.
    ///
    /// Nothing is logged unless the bitmap was written.
    pub fn save_color_frame(
        &self,
        timestamp: Timestamp,
        buffer: &ImageBuffer,
    ) -> Result<PathBuf, StorageError> {
        let pixels = buffer.bgra().ok_or(StorageError::FormatMismatch {
            expected: PixelFormat::Bgra32,
            actual: buffer.format(),
        })?;

        Self::ensure_dir(&self.layout.root.join(&self.layout.color_dir))?;
        let color = self.layout.color_relative(timestamp);
        let associated = self.layout.association_color_relative(timestamp);
        let depth = self.layout.depth_relative(timestamp);
        let path = self.layout.resolve(&color);

        bitmap::save_color_image(pixels, buffer.width(), buffer.height(), &path)?;

        let tick = self.tick_count().to_string();
        log::append_log_record(
            &self.layout.rgb_timestamps_path(),
            &[color.as_str(), tick.as_str()],
        )?;

        let ts = timestamp.to_string();
        log::append_log_record(
            &self.layout.associations_path(),
            &[ts.as_str(), associated.as_str(), depth.as_str()],
        )?;

        debug!("Saved color frame {}", color);
        Ok(path)
    }

    /// Save a depth frame and append its depth-log record
    pub fn save_depth_frame(
        &self,
        timestamp: Timestamp,
        buffer: &ImageBuffer,
    ) -> Result<PathBuf, StorageError> {
        let pixels = buffer.depth().ok_or(StorageError::FormatMismatch {
            expected: PixelFormat::Depth16,
            actual: buffer.format(),
        })?;

        Self::ensure_dir(&self.layout.root.join(&self.layout.depth_dir))?;
        let depth = self.layout.depth_relative(timestamp);
        let path = self.layout.resolve(&depth);

        depth_png::save_depth_image(pixels, buffer.width(), buffer.height(), &path)?;

        let ts = timestamp.to_string();
        log::append_log_record(
            &self.layout.depth_log_path(),
            &[ts.as_str(), depth.as_str()],
        )?;

        debug!("Saved depth frame {}", depth);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{PixelData, Resolution};

    const TS: Timestamp = Timestamp::from_micros(1_713_087_123_004_512);

    fn color_buffer() -> ImageBuffer {
        ImageBuffer::from_pixels(2, 2, PixelData::Bgra32((0..16).collect()))
            .expect("valid buffer")
    }

    #[test]
    fn test_relative_paths_share_timestamp_text() {
        let layout = DatasetLayout::new("/tmp/x");
        assert_eq!(layout.color_relative(TS), "CapturedRGB/rgb_1713087123.004512.bmp");
        assert_eq!(layout.depth_relative(TS), "depth/depth_1713087123.004512.png");
        assert_eq!(
            layout.association_color_relative(TS),
            "rgb/rgb_1713087123.004512.bmp"
        );
    }

    #[test]
    fn test_resolve_color_maps_association_prefix() {
        let layout = DatasetLayout::new("/data");
        let expected = PathBuf::from("/data/CapturedRGB/rgb_1.000000.bmp");
        assert_eq!(layout.resolve_color("rgb/rgb_1.000000.bmp"), expected);
        assert_eq!(layout.resolve_color("CapturedRGB/rgb_1.000000.bmp"), expected);
        assert_eq!(
            layout.resolve_color("rgbx/rgb_1.000000.bmp"),
            PathBuf::from("/data/rgbx/rgb_1.000000.bmp")
        );
    }

    #[test]
    fn test_color_save_writes_bitmap_and_logs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = DatasetWriter::new(DatasetLayout::new(dir.path()));

        let path = writer
            .save_color_frame(TS, &color_buffer())
            .expect("save should succeed");
        assert!(path.exists());

        let associations =
            fs::read_to_string(dir.path().join("associations.txt")).expect("associations");
        assert_eq!(
            associations,
            "1713087123.004512\trgb/rgb_1713087123.004512.bmp depth/depth_1713087123.004512.png\n"
        );
        assert!(path.ends_with("CapturedRGB/rgb_1713087123.004512.bmp"));

        let ticks = fs::read_to_string(dir.path().join("rgb_timestamps.txt")).expect("ticks");
        let (name, tick) = ticks.trim_end().split_once('\t').expect("tab separated");
        assert_eq!(name, "CapturedRGB/rgb_1713087123.004512.bmp");
        assert!(tick.parse::<u128>().is_ok());
    }

    #[test]
    fn test_color_save_into_blocked_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        // A plain file where the directory should go
        fs::write(dir.path().join("CapturedRGB"), b"").expect("blocker");
        let writer = DatasetWriter::new(DatasetLayout::new(dir.path()));

        let result = writer.save_color_frame(TS, &color_buffer());
        assert!(matches!(result, Err(StorageError::Io { .. })));
        assert!(!dir.path().join("associations.txt").exists());
        assert!(!dir.path().join("rgb_timestamps.txt").exists());
    }

    #[test]
    fn test_depth_save_writes_png_and_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = DatasetWriter::new(DatasetLayout::new(dir.path()));
        let buffer = ImageBuffer::new(PixelFormat::Depth16, Resolution::Res80x60);

        let path = writer.save_depth_frame(TS, &buffer).expect("save should succeed");
        assert!(path.ends_with("depth/depth_1713087123.004512.png"));

        let log = fs::read_to_string(dir.path().join("depth.txt")).expect("depth log");
        assert_eq!(log, "1713087123.004512\tdepth/depth_1713087123.004512.png\n");
    }

    #[test]
    fn test_format_mismatch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = DatasetWriter::new(DatasetLayout::new(dir.path()));
        let result = writer.save_depth_frame(TS, &color_buffer());
        assert!(matches!(result, Err(StorageError::FormatMismatch { .. })));
    }
}
