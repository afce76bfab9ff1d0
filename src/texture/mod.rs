//! Texture decoding
//!
//! This module turns the pixel payload of a texture entry into a flat RGBA8
//! buffer (row-major, top-left origin) ready for upload. Decoding never touches
//! the source bytes and needs no key tables.
//!
//! | Format | Source layout |
//! |--------|---------------|
//! | [`TextureFormat::Dxt1`] | 8-byte 4x4 blocks, two RGB565 colors + big-endian index word |
//! | [`TextureFormat::Dxt3`] | 16-byte 4x4 blocks, explicit 4-bit alpha + DXT1-style colors |
//! | [`TextureFormat::Bgra32`] | 4 bytes per pixel, B G R A, bottom row first |
//! | [`TextureFormat::Indexed8`] | 256-entry BGRA palette, then one index per pixel, bottom row first |

mod dxt;
mod raw;

pub use dxt::{decode_dxt1, decode_dxt3};
pub use raw::{decode_bgra32, decode_indexed8};

use crate::{DatError, Result, TextureFormat};

/// A decoded RGBA8 image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTexture {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// `width * height * 4` bytes, R G B A per pixel
    pub rgba: Vec<u8>,
}

impl DecodedTexture {
    /// A texture with no pixels, for zero width or height
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rgba: Vec::new(),
        }
    }

    /// RGBA value at `(x, y)`, or `None` outside the image
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        self.rgba
            .get(offset..offset + 4)
            .and_then(|px| px.try_into().ok())
    }

    /// The pixel bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.rgba
    }

    /// Take the pixel bytes
    pub fn into_rgba(self) -> Vec<u8> {
        self.rgba
    }
}

/// Decode `data` as a `width` x `height` texture in the given format
pub fn decode_texture(
    format: TextureFormat,
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<DecodedTexture> {
    match format {
        TextureFormat::Dxt1 => decode_dxt1(data, width, height),
        TextureFormat::Dxt3 => decode_dxt3(data, width, height),
        TextureFormat::Bgra32 => decode_bgra32(data, width, height),
        TextureFormat::Indexed8 => decode_indexed8(data, width, height),
    }
}

/// Allocate a zeroed RGBA buffer, rejecting sizes that overflow
pub(crate) fn rgba_buffer(width: u32, height: u32) -> Result<Vec<u8>> {
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or(DatError::InvalidDimensions { width, height })?;
    Ok(vec![0u8; len])
}
