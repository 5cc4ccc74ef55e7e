//! Viewer boundary. Processors push images; viewers never call back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use bytes::Bytes;

use crate::capture::{ImageBuffer, ImageType, PixelData, PixelFormat};

/// Write-only sink for the most recently decoded image of a stream
pub trait StreamViewer: Send {
    fn set_image(&mut self, image: &ImageBuffer);

    fn set_image_type(&mut self, image_type: ImageType);
}

/// Immutable copy of a stream image, shareable across threads
#[derive(Debug, Clone)]
pub struct ImageSnapshot {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub image_type: Option<ImageType>,
    pub data: Bytes,
}

/// Publishes every update lock-free so a render loop can pick up the latest
pub struct SnapshotViewer {
    latest: Arc<ArcSwapOption<ImageSnapshot>>,
    image_type: Option<ImageType>,
    sequence: Arc<AtomicU64>,
}

/// Read side of a [`SnapshotViewer`]
#[derive(Clone)]
pub struct SnapshotHandle {
    latest: Arc<ArcSwapOption<ImageSnapshot>>,
    sequence: Arc<AtomicU64>,
}

impl SnapshotViewer {
    pub fn new() -> (Self, SnapshotHandle) {
        let latest = Arc::new(ArcSwapOption::empty());
        let sequence = Arc::new(AtomicU64::new(0));
        let handle = SnapshotHandle {
            latest: Arc::clone(&latest),
            sequence: Arc::clone(&sequence),
        };
        (
            Self {
                latest,
                image_type: None,
                sequence,
            },
            handle,
        )
    }
}

impl StreamViewer for SnapshotViewer {
    fn set_image(&mut self, image: &ImageBuffer) {
        let data = match image.pixels() {
            PixelData::Bgra32(pixels) => Bytes::copy_from_slice(pixels),
            PixelData::Depth16(samples) => {
                Bytes::from(samples.iter().flat_map(|s| s.to_le_bytes()).collect::<Vec<_>>())
            }
        };
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.latest.store(Some(Arc::new(ImageSnapshot {
            sequence,
            width: image.width(),
            height: image.height(),
            format: image.format(),
            image_type: self.image_type,
            data,
        })));
    }

    fn set_image_type(&mut self, image_type: ImageType) {
        self.image_type = Some(image_type);
    }
}

impl SnapshotHandle {
    pub fn latest(&self) -> Option<Arc<ImageSnapshot>> {
        self.latest.load_full()
    }

    /// Number of images published so far
    pub fn updates(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Resolution;

    #[test]
    fn test_handle_sees_latest_image() {
        let (mut viewer, handle) = SnapshotViewer::new();
        assert!(handle.latest().is_none());

        viewer.set_image_type(ImageType::Depth);
        viewer.set_image(&ImageBuffer::new(PixelFormat::Depth16, Resolution::Res80x60));

        let snapshot = handle.latest().expect("snapshot published");
        assert_eq!(snapshot.sequence, 1);
        assert_eq!(snapshot.image_type, Some(ImageType::Depth));
        assert_eq!(snapshot.data.len(), 80 * 60 * 2);
        assert_eq!(handle.updates(), 1);
    }
}
