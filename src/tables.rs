//! Key substitution tables for zone section decryption
//!
//! The zone decryptors seed their key schedules from two fixed 256-entry
//! tables that live in the game's program image. The tables are loaded once
//! by the caller and handed to each decryptor; nothing here is global.

use crate::{DatError, Result, KEY_TABLE_SIZE};

/// The two 256-byte key tables used by the zone decryptors
///
/// Immutable after construction, so a single instance (or an `Arc` of one) can
/// be shared by any number of concurrent decodes.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyTables {
    primary: [u8; KEY_TABLE_SIZE],
    secondary: [u8; KEY_TABLE_SIZE],
}

impl KeyTables {
    /// Build from two complete tables
    pub fn new(primary: [u8; KEY_TABLE_SIZE], secondary: [u8; KEY_TABLE_SIZE]) -> Self {
        Self { primary, secondary }
    }

    /// Build from two slices of exactly 256 bytes each
    pub fn from_slices(primary: &[u8], secondary: &[u8]) -> Result<Self> {
        Ok(Self::new(to_table(primary)?, to_table(secondary)?))
    }

    /// Copy both tables out of a host program image
    ///
    /// # Arguments
    /// * `image` - The raw program image bytes
    /// * `primary_offset` - Offset of the primary (stream/mask) table
    /// * `secondary_offset` - Offset of the secondary (block swap) table
    pub fn from_image(image: &[u8], primary_offset: usize, secondary_offset: usize) -> Result<Self> {
        Self::from_slices(
            region(image, primary_offset)?,
            region(image, secondary_offset)?,
        )
    }

    /// Primary table entry, seeds the object inversion and mesh XOR schedules
    #[inline]
    pub fn primary(&self, index: u8) -> u8 {
        self.primary[index as usize]
    }

    /// Secondary table entry, seeds the mesh block swap schedule
    #[inline]
    pub fn secondary(&self, index: u8) -> u8 {
        self.secondary[index as usize]
    }
}

impl std::fmt::Debug for KeyTables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyTables")
            .field("primary", &format_args!("[{:02x} ..]", self.primary[0]))
            .field("secondary", &format_args!("[{:02x} ..]", self.secondary[0]))
            .finish()
    }
}

fn to_table(bytes: &[u8]) -> Result<[u8; KEY_TABLE_SIZE]> {
    bytes.try_into().map_err(|_| DatError::InvalidKeyTable {
        expected: KEY_TABLE_SIZE,
        actual: bytes.len(),
    })
}

fn region(image: &[u8], offset: usize) -> Result<&[u8]> {
    offset
        .checked_add(KEY_TABLE_SIZE)
        .and_then(|end| image.get(offset..end))
        .ok_or(DatError::BufferUnderrun {
            offset,
            requested: KEY_TABLE_SIZE,
            available: image.len(),
        })
}
