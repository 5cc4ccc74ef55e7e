//! Per-stream image buffer, mutated in place every processing cycle

use crate::capture::decoder::{self, DepthTreatment};
use crate::capture::frame::{PixelFormat, Resolution};
use crate::error::{CaptureError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelData {
    Bgra32(Vec<u8>),
    Depth16(Vec<u16>),
}

/// Most recently decoded frame plus its declared resolution.
///
/// The payload length always matches `width * height` for the pixel format;
/// it is only resized through [`ImageBuffer::set_image_size`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    pixels: PixelData,
}

impl ImageBuffer {
    pub fn new(format: PixelFormat, resolution: Resolution) -> Self {
        let mut buffer = Self {
            width: 0,
            height: 0,
            pixels: match format {
                PixelFormat::Bgra32 => PixelData::Bgra32(Vec::new()),
                PixelFormat::Depth16 => PixelData::Depth16(Vec::new()),
            },
        };
        buffer.set_image_size(resolution);
        buffer
    }

    /// Wrap already-decoded pixels, checking the length against the dimensions
    pub fn from_pixels(width: u32, height: u32, pixels: PixelData) -> Result<Self> {
        let count = width as usize * height as usize;
        let len = match &pixels {
            PixelData::Bgra32(data) => data.len() / 4,
            PixelData::Depth16(data) => data.len(),
        };
        let exact = match &pixels {
            PixelData::Bgra32(data) => data.len() % 4 == 0,
            PixelData::Depth16(_) => true,
        };
        if len != count || !exact {
            return Err(CaptureError::InvalidFrame(format!(
                "{len} pixels do not fill {width}x{height}"
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Resize the payload for a new stream resolution. Contents are zeroed.
    pub fn set_image_size(&mut self, resolution: Resolution) {
        let (width, height) = resolution.dimensions();
        let count = resolution.pixel_count();
        self.width = width;
        self.height = height;
        match &mut self.pixels {
            PixelData::Bgra32(data) => {
                data.clear();
                data.resize(count * 4, 0);
            }
            PixelData::Depth16(data) => {
                data.clear();
                data.resize(count, 0);
            }
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        match self.pixels {
            PixelData::Bgra32(_) => PixelFormat::Bgra32,
            PixelData::Depth16(_) => PixelFormat::Depth16,
        }
    }

    pub fn pixels(&self) -> &PixelData {
        &self.pixels
    }

    pub fn bgra(&self) -> Option<&[u8]> {
        match &self.pixels {
            PixelData::Bgra32(data) => Some(data.as_slice()),
            PixelData::Depth16(_) => None,
        }
    }

    pub fn depth(&self) -> Option<&[u16]> {
        match &self.pixels {
            PixelData::Depth16(data) => Some(data.as_slice()),
            PixelData::Bgra32(_) => None,
        }
    }

    fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn bgra_target(&mut self, src: &[u8], src_bpp: usize) -> Result<&mut [u8]> {
        let needed = self.pixel_count() * src_bpp;
        if src.len() < needed {
            return Err(CaptureError::InvalidFrame(format!(
                "payload of {} bytes, expected {needed}",
                src.len()
            )));
        }
        match &mut self.pixels {
            PixelData::Bgra32(data) => Ok(data.as_mut_slice()),
            PixelData::Depth16(_) => Err(CaptureError::InvalidFrame(
                "color payload written to a depth buffer".into(),
            )),
        }
    }

    /// Plain color (BGRX) payload
    pub fn copy_rgb(&mut self, src: &[u8]) -> Result<()> {
        let dst = self.bgra_target(src, 4)?;
        decoder::decode_bgrx(src, dst);
        Ok(())
    }

    /// 8-bit Bayer mosaic payload
    pub fn copy_bayer(&mut self, src: &[u8]) -> Result<()> {
        let (width, height) = (self.width as usize, self.height as usize);
        let dst = self.bgra_target(src, 1)?;
        decoder::decode_bayer(src, dst, width, height);
        Ok(())
    }

    /// 16-bit infrared payload
    pub fn copy_infrared(&mut self, src: &[u8]) -> Result<()> {
        let dst = self.bgra_target(src, 2)?;
        decoder::decode_infrared(src, dst);
        Ok(())
    }

    /// 16-bit range payload
    pub fn copy_depth(
        &mut self,
        src: &[u8],
        near_mode: bool,
        treatment: DepthTreatment,
    ) -> Result<()> {
        let needed = self.pixel_count() * 2;
        if src.len() < needed {
            return Err(CaptureError::InvalidFrame(format!(
                "depth payload of {} bytes, expected {needed}",
                src.len()
            )));
        }
        match &mut self.pixels {
            PixelData::Depth16(data) => {
                decoder::decode_depth(src, data, near_mode, treatment);
                Ok(())
            }
            PixelData::Bgra32(_) => Err(CaptureError::InvalidFrame(
                "depth payload written to a color buffer".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_sized_for_resolution() {
        let mut buffer = ImageBuffer::new(PixelFormat::Bgra32, Resolution::Res640x480);
        assert_eq!(buffer.bgra().map(<[u8]>::len), Some(640 * 480 * 4));

        buffer.set_image_size(Resolution::Res1280x960);
        assert_eq!(buffer.width(), 1280);
        assert_eq!(buffer.bgra().map(<[u8]>::len), Some(1280 * 960 * 4));

        let depth = ImageBuffer::new(PixelFormat::Depth16, Resolution::Res320x240);
        assert_eq!(depth.depth().map(<[u16]>::len), Some(320 * 240));
    }

    #[test]
    fn test_short_payload_leaves_buffer_untouched() {
        let mut buffer = ImageBuffer::new(PixelFormat::Bgra32, Resolution::Res80x60);
        let before = buffer.clone();
        let result = buffer.copy_rgb(&[0xAA; 16]);
        assert!(matches!(result, Err(CaptureError::InvalidFrame(_))));
        assert_eq!(buffer, before);
    }

    #[test]
    fn test_copy_depth_applies_treatment() {
        let mut buffer = ImageBuffer::new(PixelFormat::Depth16, Resolution::Res80x60);
        let src: Vec<u8> = std::iter::repeat(100u16.to_le_bytes())
            .take(80 * 60)
            .flatten()
            .collect();
        buffer
            .copy_depth(&src, false, DepthTreatment::ClampUnreliable)
            .expect("copy_depth should succeed");
        assert!(buffer
            .depth()
            .expect("depth buffer")
            .iter()
            .all(|&v| v == decoder::DEPTH_MIN_MM));
    }

    #[test]
    fn test_from_pixels_rejects_mismatch() {
        let result = ImageBuffer::from_pixels(2, 2, PixelData::Depth16(vec![0; 3]));
        assert!(result.is_err());
        let ok = ImageBuffer::from_pixels(2, 1, PixelData::Bgra32(vec![0; 8]));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_color_payload_into_depth_buffer_fails() {
        let mut buffer = ImageBuffer::new(PixelFormat::Depth16, Resolution::Res80x60);
        assert!(buffer.copy_rgb(&vec![0; 80 * 60 * 4]).is_err());
    }
}
