//! 32-bit uncompressed bitmap codec for color frames.
//!
//! Files are written top-down (negative height) with a
//! BITMAPINFOHEADER. The reader also accepts bottom-up 32-bit files.

use std::fs;
use std::path::Path;

use crate::capture::{ImageBuffer, PixelData};
use crate::error::StorageError;

const FILE_HEADER_LEN: usize = 14;
const INFO_HEADER_LEN: usize = 40;
const PIXEL_OFFSET: usize = FILE_HEADER_LEN + INFO_HEADER_LEN;
const BYTES_PER_PIXEL: usize = 4;
const BI_RGB: u32 = 0;

/// Encode BGRA pixels as a complete bitmap file image
pub fn encode_bitmap(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, StorageError> {
    let stride = width as usize * BYTES_PER_PIXEL;
    let image_len = stride * height as usize;
    if pixels.len() != image_len {
        return Err(StorageError::UnsupportedBitmap(format!(
            "{} bytes do not fill {width}x{height} at 32 bpp",
            pixels.len()
        )));
    }
    let file_len = u32::try_from(PIXEL_OFFSET + image_len)
        .map_err(|_| StorageError::UnsupportedBitmap("image too large".into()))?;
    let signed_width = i32::try_from(width)
        .map_err(|_| StorageError::UnsupportedBitmap("width too large".into()))?;
    let signed_height = i32::try_from(height)
        .map_err(|_| StorageError::UnsupportedBitmap("height too large".into()))?;

    let mut out = Vec::with_capacity(PIXEL_OFFSET + image_len);
    // BITMAPFILEHEADER
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&file_len.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // reserved
    out.extend_from_slice(&(PIXEL_OFFSET as u32).to_le_bytes());
    // BITMAPINFOHEADER
    out.extend_from_slice(&(INFO_HEADER_LEN as u32).to_le_bytes());
    out.extend_from_slice(&signed_width.to_le_bytes());
    out.extend_from_slice(&(-signed_height).to_le_bytes()); // top-down
    out.extend_from_slice(&1u16.to_le_bytes()); // planes
    out.extend_from_slice(&32u16.to_le_bytes()); // bits per pixel
    out.extend_from_slice(&BI_RGB.to_le_bytes());
    out.extend_from_slice(&(image_len as u32).to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes()); // x pixels per metre
    out.extend_from_slice(&0i32.to_le_bytes()); // y pixels per metre
    out.extend_from_slice(&0u32.to_le_bytes()); // colors used
    out.extend_from_slice(&0u32.to_le_bytes()); // important colors
    out.extend_from_slice(pixels);
    Ok(out)
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Decode a 32-bit uncompressed bitmap into top-down BGRA rows
pub fn decode_bitmap(bytes: &[u8]) -> Result<(u32, u32, Vec<u8>), StorageError> {
    let unsupported = |msg: &str| StorageError::UnsupportedBitmap(msg.to_owned());

    if bytes.len() < PIXEL_OFFSET || &bytes[..2] != b"BM" {
        return Err(unsupported("missing BM header"));
    }
    let offset = read_u32(bytes, 10) as usize;
    let info_len = read_u32(bytes, 14) as usize;
    if info_len < INFO_HEADER_LEN {
        return Err(unsupported("info header too short"));
    }
    let width = read_u32(bytes, 18) as i32;
    let height = read_u32(bytes, 22) as i32;
    if read_u16(bytes, 28) != 32 {
        return Err(unsupported("only 32 bits per pixel is supported"));
    }
    if read_u32(bytes, 30) != BI_RGB {
        return Err(unsupported("compressed bitmaps are not supported"));
    }
    if width <= 0 || height == 0 {
        return Err(unsupported("empty image"));
    }

    let (width, rows) = (width.unsigned_abs(), height.unsigned_abs());
    let stride = width as usize * BYTES_PER_PIXEL;
    let image_len = stride * rows as usize;
    let data = bytes
        .get(offset..offset + image_len)
        .ok_or_else(|| unsupported("truncated pixel data"))?;

    let pixels = if height < 0 {
        data.to_vec()
    } else {
        data.chunks_exact(stride).rev().flatten().copied().collect()
    };
    Ok((width, rows, pixels))
}

/// Write BGRA pixels to `path` as a top-down 32-bit bitmap
pub fn save_color_image(
    pixels: &[u8],
    width: u32,
    height: u32,
    path: &Path,
) -> Result<(), StorageError> {
    let encoded = encode_bitmap(pixels, width, height)?;
    fs::write(path, encoded).map_err(|e| StorageError::io(path, e))
}

pub fn load_color_image(path: &Path) -> Result<ImageBuffer, StorageError> {
    let bytes = fs::read(path).map_err(|e| StorageError::io(path, e))?;
    let (width, height, pixels) = decode_bitmap(&bytes)?;
    ImageBuffer::from_pixels(width, height, PixelData::Bgra32(pixels))
        .map_err(|e| StorageError::UnsupportedBitmap(e.to_string()))
}
