//! Raw sensor payload to canonical pixel conversions

use serde::{Deserialize, Serialize};

/// Reliable depth range in millimetres, default mode
pub const DEPTH_MIN_MM: u16 = 800;
pub const DEPTH_MAX_MM: u16 = 4000;

/// Reliable depth range in millimetres, near mode
pub const NEAR_DEPTH_MIN_MM: u16 = 400;
pub const NEAR_DEPTH_MAX_MM: u16 = 3000;

/// Invalid depth marker
pub const DEPTH_INVALID_MM: u16 = 0;

/// How range values outside the reliable window are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DepthTreatment {
    /// Pull unreliable values onto the nearest reliable bound
    #[default]
    ClampUnreliable,
    /// Shift unreliable values to the invalid marker
    ZeroUnreliable,
    /// Keep every value as delivered
    RawAll,
}

pub const fn depth_range(near_mode: bool) -> (u16, u16) {
    if near_mode {
        (NEAR_DEPTH_MIN_MM, NEAR_DEPTH_MAX_MM)
    } else {
        (DEPTH_MIN_MM, DEPTH_MAX_MM)
    }
}

pub fn treat_depth(value: u16, near_mode: bool, treatment: DepthTreatment) -> u16 {
    if value == DEPTH_INVALID_MM {
        return value;
    }
    let (min, max) = depth_range(near_mode);
    match treatment {
        DepthTreatment::ClampUnreliable => value.clamp(min, max),
        DepthTreatment::ZeroUnreliable if value < min || value > max => DEPTH_INVALID_MM,
        DepthTreatment::ZeroUnreliable | DepthTreatment::RawAll => value,
    }
}

/// Decode little-endian 16-bit depth samples with the given treatment
pub fn decode_depth(src: &[u8], dst: &mut [u16], near_mode: bool, treatment: DepthTreatment) {
    for (out, sample) in dst.iter_mut().zip(src.chunks_exact(2)) {
        let raw = u16::from_le_bytes([sample[0], sample[1]]);
        *out = treat_depth(raw, near_mode, treatment);
    }
}

/// Copy BGRX pixels, forcing the padding byte to opaque
pub fn decode_bgrx(src: &[u8], dst: &mut [u8]) {
    for (out, px) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        out[..3].copy_from_slice(&px[..3]);
        out[3] = 0xFF;
    }
}

/// 16-bit infrared to grey; the high byte carries the intensity
pub fn decode_infrared(src: &[u8], dst: &mut [u8]) {
    for (out, sample) in dst.chunks_exact_mut(4).zip(src.chunks_exact(2)) {
        let grey = sample[1];
        out.copy_from_slice(&[grey, grey, grey, 0xFF]);
    }
}

/// Demosaic an 8-bit GRBG Bayer mosaic into BGRA, one 2x2 block at a time.
///
/// `width` and `height` must be even.
pub fn decode_bayer(src: &[u8], dst: &mut [u8], width: usize, height: usize) {
    for by in (0..height).step_by(2) {
        for bx in (0..width).step_by(2) {
            let top = by * width + bx;
            let bottom = top + width;
            // G R
            // B G
            let g = ((u16::from(src[top]) + u16::from(src[bottom + 1])) / 2) as u8;
            let r = src[top + 1];
            let b = src[bottom];

            for (dy, dx) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                let o = ((by + dy) * width + bx + dx) * 4;
                dst[o..o + 4].copy_from_slice(&[b, g, r, 0xFF]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_pulls_unreliable_onto_bounds() {
        assert_eq!(treat_depth(100, false, DepthTreatment::ClampUnreliable), DEPTH_MIN_MM);
        assert_eq!(treat_depth(9000, false, DepthTreatment::ClampUnreliable), DEPTH_MAX_MM);
        assert_eq!(treat_depth(1500, false, DepthTreatment::ClampUnreliable), 1500);
    }

    #[test]
    fn test_zero_treatment_marks_unreliable_invalid() {
        assert_eq!(treat_depth(500, false, DepthTreatment::ZeroUnreliable), 0);
        // 500 mm is reliable in near mode
        assert_eq!(treat_depth(500, true, DepthTreatment::ZeroUnreliable), 500);
        assert_eq!(treat_depth(3500, true, DepthTreatment::ZeroUnreliable), 0);
    }

    #[test]
    fn test_invalid_marker_survives_clamp() {
        assert_eq!(treat_depth(0, false, DepthTreatment::ClampUnreliable), 0);
        assert_eq!(treat_depth(0, true, DepthTreatment::RawAll), 0);
    }

    #[test]
    fn test_decode_depth_little_endian() {
        let src = [0xE8, 0x03, 0x10, 0x27];
        let mut dst = [0u16; 2];
        decode_depth(&src, &mut dst, false, DepthTreatment::RawAll);
        assert_eq!(dst, [1000, 10000]);
    }

    #[test]
    fn test_bayer_block_colors() {
        // G R / B G
        let src = [10, 200, 40, 50];
        let mut dst = [0u8; 16];
        decode_bayer(&src, &mut dst, 2, 2);
        assert_eq!(&dst[..4], &[40, 30, 200, 0xFF]);
        assert_eq!(&dst[12..], &[40, 30, 200, 0xFF]);
    }

    #[test]
    fn test_infrared_uses_high_byte() {
        let src = [0x34, 0x80];
        let mut dst = [0u8; 4];
        decode_infrared(&src, &mut dst);
        assert_eq!(dst, [0x80, 0x80, 0x80, 0xFF]);
    }
}
