use std::borrow::Cow;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Handle to one hardware-delivered frame.
///
/// Only valid between `SensorStream::next_frame` and
/// `SensorStream::release_frame`; see [`super::FrameGuard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub sequence: u64,
    /// Driver-reported near-mode state for depth frames
    pub near_mode: bool,
}

/// Locked view of a frame's pixel rectangle
#[derive(Debug, Clone)]
pub struct LockedRect {
    /// Row pitch in bytes; zero means the driver handed us no usable data
    pub pitch: u32,
    pub bits: Bytes,
}

impl LockedRect {
    pub fn is_valid(&self) -> bool {
        self.pitch != 0
    }

    /// Pixel rows with any driver row padding stripped.
    ///
    /// Tightly packed payloads, and payloads too short for the padded
    /// layout, are returned as-is so the decoder reports their length.
    pub fn packed_rows(&self, row_bytes: usize, rows: usize) -> Cow<'_, [u8]> {
        let pitch = self.pitch as usize;
        let padded_len = pitch * rows.saturating_sub(1) + row_bytes;
        if pitch <= row_bytes || rows == 0 || self.bits.len() < padded_len {
            return Cow::Borrowed(self.bits.as_ref());
        }
        let mut packed = Vec::with_capacity(row_bytes * rows);
        for row in self.bits.chunks(pitch).take(rows) {
            packed.extend_from_slice(&row[..row_bytes]);
        }
        Cow::Owned(packed)
    }
}

/// Stream resolutions exposed by the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "80x60")]
    Res80x60,
    #[serde(rename = "320x240")]
    Res320x240,
    #[serde(rename = "640x480")]
    Res640x480,
    #[serde(rename = "1280x960")]
    Res1280x960,
}

impl Resolution {
    pub const fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Res80x60 => (80, 60),
            Self::Res320x240 => (320, 240),
            Self::Res640x480 => (640, 480),
            Self::Res1280x960 => (1280, 960),
        }
    }

    pub const fn pixel_count(self) -> usize {
        let (w, h) = self.dimensions();
        (w * h) as usize
    }
}

/// Image types a stream can be opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageType {
    Color,
    ColorYuv,
    Infrared,
    RawBayer,
    Depth,
}

impl ImageType {
    pub const fn is_color(self) -> bool {
        !matches!(self, Self::Depth)
    }
}

/// Canonical in-memory pixel layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit B, G, R, A
    Bgra32,
    /// 16-bit range value in millimetres, native endian
    Depth16,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgra32 => 4,
            Self::Depth16 => 2,
        }
    }
}

/// What to ask the driver for when opening a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub image_type: ImageType,
    pub resolution: Resolution,
    pub near_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_dimensions() {
        assert_eq!(Resolution::Res1280x960.dimensions(), (1280, 960));
        assert_eq!(Resolution::Res640x480.pixel_count(), 640 * 480);
    }

    #[test]
    fn test_zero_pitch_is_invalid() {
        let rect = LockedRect {
            pitch: 0,
            bits: Bytes::from_static(&[1, 2, 3, 4]),
        };
        assert!(!rect.is_valid());
    }

    #[test]
    fn test_padded_rows_are_packed() {
        // Two rows of 3 bytes, each padded to a pitch of 4
        let rect = LockedRect {
            pitch: 4,
            bits: Bytes::from_static(&[1, 2, 3, 0xEE, 4, 5, 6, 0xEE]),
        };
        assert_eq!(rect.packed_rows(3, 2).as_ref(), &[1, 2, 3, 4, 5, 6]);

        let packed = LockedRect {
            pitch: 3,
            bits: Bytes::from_static(&[1, 2, 3, 4, 5, 6]),
        };
        assert!(matches!(packed.packed_rows(3, 2), Cow::Borrowed(_)));
    }
}
