//! Lossless 16-bit single-channel PNG codec for depth frames

use std::path::Path;

use image::{ImageFormat, Luma};

use crate::capture::{ImageBuffer, PixelData};
use crate::error::StorageError;

type DepthRaster = image::ImageBuffer<Luma<u16>, Vec<u16>>;

pub fn save_depth_image(
    pixels: &[u16],
    width: u32,
    height: u32,
    path: &Path,
) -> Result<(), StorageError> {
    let raster = DepthRaster::from_raw(width, height, pixels.to_vec()).ok_or_else(|| {
        StorageError::InvalidRaster(format!(
            "{} depth samples do not fill {width}x{height}",
            pixels.len()
        ))
    })?;
    raster.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

pub fn load_depth_image(path: &Path) -> Result<ImageBuffer, StorageError> {
    let raster = image::open(path)?.into_luma16();
    let (width, height) = raster.dimensions();
    ImageBuffer::from_pixels(width, height, PixelData::Depth16(raster.into_raw()))
        .map_err(|e| StorageError::InvalidRaster(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_preserves_full_range() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("depth.png");
        let pixels: Vec<u16> = vec![0, 1, 255, 256, 4000, 8191, 40_000, u16::MAX];

        save_depth_image(&pixels, 4, 2, &path).expect("save should succeed");
        let loaded = load_depth_image(&path).expect("load should succeed");

        assert_eq!((loaded.width(), loaded.height()), (4, 2));
        assert_eq!(loaded.depth(), Some(pixels.as_slice()));
    }

    #[test]
    fn test_sample_count_mismatch_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("depth.png");
        let result = save_depth_image(&[1, 2, 3], 2, 2, &path);
        assert!(matches!(result, Err(StorageError::InvalidRaster(_))));
        assert!(!path.exists());
    }
}
