//! Positioned reader and in-place mutator over a byte buffer
//!
//! [`ByteCursor`] is the single access path the decryptors and texture decoders
//! use to touch section data. Every access is bounds checked and fails with
//! [`DatError::BufferUnderrun`] instead of reading or writing out of range.
//! Multi-byte reads are little-endian unless the name says otherwise.

use std::ops::Range;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::{DatError, Result, SectionHeader, SECTION_HEADER_SIZE};

/// Cursor over an owned or borrowed byte buffer
///
/// Reading only needs `T: AsRef<[u8]>`, so a `&[u8]` works for non-destructive
/// decoding. The mutating operations ([`xor_next`](Self::xor_next),
/// [`swap_next8`](Self::swap_next8)) additionally need `T: AsMut<[u8]>` and
/// change the underlying buffer, never a copy.
#[derive(Debug, Clone)]
pub struct ByteCursor<T> {
    inner: T,
    pos: usize,
}

impl<T: AsRef<[u8]>> ByteCursor<T> {
    /// Create a cursor at offset 0
    pub fn new(inner: T) -> Self {
        Self { inner, pos: 0 }
    }

    /// Current offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move to an absolute offset; the end of the buffer is a valid position
    pub fn set_position(&mut self, pos: usize) -> Result<()> {
        let len = self.len();
        if pos > len {
            return Err(DatError::BufferUnderrun {
                offset: pos,
                requested: 0,
                available: len,
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Position at `header.base_offset + extra`
    pub fn offset_from(&mut self, header: &SectionHeader, extra: usize) -> Result<()> {
        let target = header
            .base_offset
            .checked_add(extra)
            .ok_or(DatError::BufferUnderrun {
                offset: header.base_offset,
                requested: extra,
                available: self.len(),
            })?;
        self.set_position(target)
    }

    /// Position at the section payload, `base_offset + 0x10`
    pub fn seek_payload(&mut self, header: &SectionHeader) -> Result<()> {
        let target = header
            .payload_offset()
            .ok_or(DatError::BufferUnderrun {
                offset: header.base_offset,
                requested: SECTION_HEADER_SIZE,
                available: self.len(),
            })?;
        self.set_position(target)
    }

    /// Total buffer length
    pub fn len(&self) -> usize {
        self.inner.as_ref().len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes left between the position and the end of the buffer
    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.pos)
    }

    /// Whether at least one more byte can be read
    pub fn has_more(&self) -> bool {
        self.pos < self.len()
    }

    /// Check that `n` bytes are available at the position without moving
    pub fn require(&self, n: usize) -> Result<()> {
        self.span_at(self.pos, n).map(|_| ())
    }

    /// Advance by `n` bytes
    pub fn skip(&mut self, n: usize) -> Result<()> {
        let span = self.span_at(self.pos, n)?;
        self.pos = span.end;
        Ok(())
    }

    /// Read the next `n` bytes
    pub fn next_bytes(&mut self, n: usize) -> Result<&[u8]> {
        let span = self.span_at(self.pos, n)?;
        self.pos = span.end;
        Ok(&self.inner.as_ref()[span])
    }

    /// Read a byte
    pub fn next_u8(&mut self) -> Result<u8> {
        Ok(self.next_bytes(1)?[0])
    }

    /// Read a little-endian `u16`
    pub fn next_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.next_bytes(2)?))
    }

    /// Read a little-endian `u32`
    pub fn next_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.next_bytes(4)?))
    }

    /// Read a little-endian `u64`
    pub fn next_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.next_bytes(8)?))
    }

    /// Read a big-endian `u32`
    pub fn next_u32_be(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.next_bytes(4)?))
    }

    /// Read a little-endian IEEE-754 `f32`
    pub fn next_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.next_bytes(4)?))
    }

    /// Read three consecutive `f32` values (x, y, z)
    pub fn next_vector3f(&mut self) -> Result<[f32; 3]> {
        let mut v = [0.0f32; 3];
        LittleEndian::read_f32_into(self.next_bytes(12)?, &mut v);
        Ok(v)
    }

    /// Read a fixed-width string field
    ///
    /// Trailing NUL padding is removed; invalid UTF-8 is replaced.
    pub fn next_string(&mut self, len: usize) -> Result<String> {
        let bytes = self.next_bytes(len)?;
        let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Borrow `size` bytes at the absolute `offset`, leaving the position alone
    pub fn sub_buffer(&self, offset: usize, size: usize) -> Result<&[u8]> {
        let span = self.span_at(offset, size)?;
        Ok(&self.inner.as_ref()[span])
    }

    /// Borrow the underlying storage
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Unwrap the underlying storage
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn span_at(&self, offset: usize, n: usize) -> Result<Range<usize>> {
        let available = self.len();
        match offset.checked_add(n) {
            Some(end) if end <= available => Ok(offset..end),
            _ => Err(DatError::BufferUnderrun {
                offset,
                requested: n,
                available,
            }),
        }
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> ByteCursor<T> {
    /// XOR the byte at the position with `mask` in place, then advance
    pub fn xor_next(&mut self, mask: u8) -> Result<()> {
        let span = self.span_at(self.pos, 1)?;
        self.inner.as_mut()[span.start] ^= mask;
        self.pos = span.end;
        Ok(())
    }

    /// Swap `length` bytes at the position with the `length` bytes found
    /// `distance` bytes further on, then advance by `length`
    pub fn swap_next8(&mut self, distance: usize, length: usize) -> Result<()> {
        let far = self
            .pos
            .checked_add(distance)
            .ok_or(DatError::BufferUnderrun {
                offset: self.pos,
                requested: distance,
                available: self.len(),
            })?;
        self.span_at(far, length)?;
        let near = self.span_at(self.pos, length)?;

        let data = self.inner.as_mut();
        for i in 0..length {
            data.swap(near.start + i, far + i);
        }
        self.pos = near.end;
        Ok(())
    }
}
