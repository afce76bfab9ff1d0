//! DXT1 / DXT3 block decompression
//!
//! Blocks are stored row by row, each covering 4x4 pixels. Colors are RGB565
//! little-endian; the 2-bit index word and the DXT3 alpha words are read
//! big-endian, so the highest index bits address the rightmost pixel of the
//! block's top row. Pixels are resolved with a countdown from 15 to 0 while
//! rows run top to bottom and columns right to left.

use super::{rgba_buffer, DecodedTexture};
use crate::{ByteCursor, Result};

type Palette = [[u8; 4]; 4];

/// Decode DXT1 (BC1) data into RGBA8
///
/// Blocks with `c0 <= c1` use three colors plus a fully transparent
/// `(0, 0, 0, 0)` entry for index 3.
pub fn decode_dxt1(data: &[u8], width: u32, height: u32) -> Result<DecodedTexture> {
    let mut rgba = rgba_buffer(width, height)?;
    if rgba.is_empty() {
        return Ok(DecodedTexture::empty(width, height));
    }
    let mut cursor = ByteCursor::new(data);

    for y1 in (0..height).step_by(4) {
        for x1 in (0..width).step_by(4) {
            let c0 = cursor.next_u16()?;
            let c1 = cursor.next_u16()?;
            let palette = block_palette(c0, c1, true);
            let indices = cursor.next_u32_be()?;

            write_block(&mut rgba, width, height, x1, y1, |count| {
                palette[index_at(indices, count)]
            });
        }
    }

    Ok(DecodedTexture {
        width,
        height,
        rgba,
    })
}

/// Decode DXT3 (BC2) data into RGBA8
///
/// Colors always use four-color interpolation; alpha comes from the explicit
/// 4-bit values, scaled by `255 / 16` so `0xF` yields 239.
pub fn decode_dxt3(data: &[u8], width: u32, height: u32) -> Result<DecodedTexture> {
    let mut rgba = rgba_buffer(width, height)?;
    if rgba.is_empty() {
        return Ok(DecodedTexture::empty(width, height));
    }
    let mut cursor = ByteCursor::new(data);

    for y1 in (0..height).step_by(4) {
        for x1 in (0..width).step_by(4) {
            let high = cursor.next_u32_be()? as u64;
            let low = cursor.next_u32_be()? as u64;
            let alpha = (high << 32) | low;

            let c0 = cursor.next_u16()?;
            let c1 = cursor.next_u16()?;
            let palette = block_palette(c0, c1, false);
            let indices = cursor.next_u32_be()?;

            write_block(&mut rgba, width, height, x1, y1, |count| {
                let mut px = palette[index_at(indices, count)];
                px[3] = (((alpha >> (4 * count)) & 0xF) * 255 / 16) as u8;
                px
            });
        }
    }

    Ok(DecodedTexture {
        width,
        height,
        rgba,
    })
}

/// Expand an RGB565 color to 8 bits per channel
fn expand_565(color: u16) -> [u32; 3] {
    let color = color as u32;
    [
        ((color >> 11) & 0x1F) * 255 / 31,
        ((color >> 5) & 0x3F) * 255 / 63,
        (color & 0x1F) * 255 / 31,
    ]
}

/// Build the four-entry block palette
///
/// With `cutout` set, blocks where `c0 <= c1` switch to the three-color mode.
fn block_palette(c0: u16, c1: u16, cutout: bool) -> Palette {
    let a = expand_565(c0);
    let b = expand_565(c1);
    let mix = |f: fn(u32, u32) -> u32| -> [u8; 4] {
        [f(a[0], b[0]) as u8, f(a[1], b[1]) as u8, f(a[2], b[2]) as u8, 255]
    };

    let color0 = mix(|a, _| a);
    let color1 = mix(|_, b| b);

    if !cutout || c0 > c1 {
        [
            color0,
            color1,
            mix(|a, b| (2 * a + b) / 3),
            mix(|a, b| (a + 2 * b) / 3),
        ]
    } else {
        [color0, color1, mix(|a, b| (a + b) / 2), [0, 0, 0, 0]]
    }
}

#[inline]
fn index_at(indices: u32, count: u32) -> usize {
    ((indices >> (2 * count)) & 0x3) as usize
}

/// Walk one block's 16 positions and store the pixel `resolve(count)` yields
///
/// Positions outside the image still consume their countdown slot.
fn write_block<F>(rgba: &mut [u8], width: u32, height: u32, x1: u32, y1: u32, resolve: F)
where
    F: Fn(u32) -> [u8; 4],
{
    let mut count = 16u32;
    for y in y1..y1 + 4 {
        for x in (x1..x1 + 4).rev() {
            count -= 1;
            if x >= width || y >= height {
                continue;
            }
            let offset = (y as usize * width as usize + x as usize) * 4;
            rgba[offset..offset + 4].copy_from_slice(&resolve(count));
        }
    }
}
