//! Uncompressed texture decoding
//!
//! Raw textures store pixels as B G R A with the bottom row first. Both
//! decoders swap the red and blue channels and flip the image vertically so the
//! result has a top-left origin.

use super::{rgba_buffer, DecodedTexture};
use crate::{ByteCursor, Result, PALETTE_SIZE};

/// Decode 32-bit BGRA pixels into RGBA8
///
/// A missing alpha byte at the very end of the data reads as 255.
pub fn decode_bgra32(data: &[u8], width: u32, height: u32) -> Result<DecodedTexture> {
    let mut rgba = rgba_buffer(width, height)?;
    if rgba.is_empty() {
        return Ok(DecodedTexture::empty(width, height));
    }
    let mut cursor = ByteCursor::new(data);

    for src_row in 0..height as usize {
        for x in 0..width as usize {
            let b = cursor.next_u8()?;
            let g = cursor.next_u8()?;
            let r = cursor.next_u8()?;
            let a = if cursor.has_more() {
                cursor.next_u8()?
            } else {
                255
            };
            store(&mut rgba, width, height, src_row, x, [r, g, b, a]);
        }
    }

    Ok(DecodedTexture {
        width,
        height,
        rgba,
    })
}

/// Decode 8-bit palette indexed pixels into RGBA8
///
/// The data starts with a complete 256-entry BGRA palette, so every 8-bit
/// index resolves to a full entry.
pub fn decode_indexed8(data: &[u8], width: u32, height: u32) -> Result<DecodedTexture> {
    let mut rgba = rgba_buffer(width, height)?;
    let mut cursor = ByteCursor::new(data);
    cursor.skip(PALETTE_SIZE)?;
    if rgba.is_empty() {
        return Ok(DecodedTexture::empty(width, height));
    }
    let palette = &data[..PALETTE_SIZE];

    for src_row in 0..height as usize {
        for x in 0..width as usize {
            let entry = cursor.next_u8()? as usize * 4;
            let bgra = &palette[entry..entry + 4];
            let px = [bgra[2], bgra[1], bgra[0], bgra[3]];
            store(&mut rgba, width, height, src_row, x, px);
        }
    }

    Ok(DecodedTexture {
        width,
        height,
        rgba,
    })
}

/// Write a pixel from source row `src_row` into its flipped destination row
#[inline]
fn store(rgba: &mut [u8], width: u32, height: u32, src_row: usize, x: usize, px: [u8; 4]) {
    let dst_row = height as usize - 1 - src_row;
    let offset = (dst_row * width as usize + x) * 4;
    rgba[offset..offset + 4].copy_from_slice(&px);
}
