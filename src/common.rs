//! Common types and constants for DAT section and texture decoding
//!
//! This module defines the core types, constants, and structures shared by the
//! section decryptors and the texture decoders.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Size of the generic section header that precedes every section payload
pub const SECTION_HEADER_SIZE: usize = 0x10;

/// Highest zone object mode byte that still denotes a plaintext section
pub const ZONE_OBJECT_PLAINTEXT_MAX_MODE: u8 = 0x1A;

/// Offset of the object node table, relative to the section base
pub const ZONE_OBJECT_NODE_TABLE_OFFSET: usize = 0x30;

/// Size of one object node entry
pub const ZONE_OBJECT_NODE_STRIDE: usize = 0x64;

/// Number of leading name bytes masked in each object node entry
pub const ZONE_OBJECT_NAME_LEN: usize = 0x10;

/// Fixed XOR mask applied to object node names
pub const ZONE_OBJECT_NAME_MASK: u8 = 0x55;

/// Lowest zone mesh mode byte for which the XOR stream pass applies
pub const ZONE_MESH_XOR_MIN_MODE: u8 = 5;

/// Marker that enables the zone mesh block swap pass
pub const ZONE_MESH_SWAP_MARKER: u16 = 0xFFFF;

/// Number of entries in a key table
pub const KEY_TABLE_SIZE: usize = 0x100;

/// Size of the BGRA palette that prefixes 8-bit indexed textures
pub const PALETTE_SIZE: usize = 0x400;

/// Error type for DAT decoding operations
#[derive(Debug, Error)]
pub enum DatError {
    /// A read, mutation or seek reached outside the buffer
    #[error("Buffer underrun: {requested} bytes at offset {offset:#x}, buffer holds {available}")]
    BufferUnderrun {
        /// Offset at which the access started
        offset: usize,
        /// Number of bytes the access needed
        requested: usize,
        /// Total length of the buffer
        available: usize,
    },

    /// A key table region had the wrong length
    #[error("Invalid key table: expected {expected} bytes, got {actual}")]
    InvalidKeyTable {
        /// Required table length
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Texture dimensions too large to address
    #[error("Invalid texture dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Texture width in pixels
        width: u32,
        /// Texture height in pixels
        height: u32,
    },

    /// Unknown texture format tag
    #[error("Unsupported texture format: {0}")]
    UnsupportedFormat(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for DAT decoding operations
pub type Result<T> = std::result::Result<T, DatError>;

/// Location of a section within a container entry buffer
///
/// Supplied by the container parser; the decoders only read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionHeader {
    /// Section identifier (four-character name in the container)
    pub section_id: u32,
    /// Section type tag
    pub section_type: u8,
    /// Offset of the section header within the buffer
    pub base_offset: usize,
    /// Offset of the following section (end of this one)
    pub next_section_offset: usize,
}

impl SectionHeader {
    /// Create a header for the section spanning `base_offset..next_section_offset`
    pub fn new(
        section_id: u32,
        section_type: u8,
        base_offset: usize,
        next_section_offset: usize,
    ) -> Self {
        Self {
            section_id,
            section_type,
            base_offset,
            next_section_offset,
        }
    }

    /// Offset of the first payload byte (just past the section header), or
    /// `None` if it does not fit in a `usize`
    pub fn payload_offset(&self) -> Option<usize> {
        self.base_offset.checked_add(SECTION_HEADER_SIZE)
    }

    /// Section id rendered as its four-character name where printable
    pub fn name(&self) -> String {
        self.section_id
            .to_le_bytes()
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect()
    }
}

/// Pixel encodings understood by the texture decoders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    /// DXT1 / BC1, 8 bytes per 4x4 block, 1-bit cutout alpha
    Dxt1,
    /// DXT3 / BC2, 16 bytes per 4x4 block, explicit 4-bit alpha
    Dxt3,
    /// 32-bit BGRA, bottom row first
    Bgra32,
    /// 1024-byte BGRA palette followed by one index per pixel, bottom row first
    Indexed8,
}

impl TextureFormat {
    /// Resolve a block compression FourCC
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Result<Self> {
        match fourcc {
            b"DXT1" => Ok(TextureFormat::Dxt1),
            b"DXT3" => Ok(TextureFormat::Dxt3),
            _ => Err(DatError::UnsupportedFormat(
                String::from_utf8_lossy(fourcc).into_owned(),
            )),
        }
    }

    /// Number of source bytes a decoder consumes for the given dimensions
    pub fn encoded_len(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        let blocks = width.div_ceil(4) as usize * height.div_ceil(4) as usize;
        match self {
            TextureFormat::Dxt1 => blocks * 8,
            TextureFormat::Dxt3 => blocks * 16,
            TextureFormat::Bgra32 => pixels * 4,
            TextureFormat::Indexed8 => PALETTE_SIZE + pixels,
        }
    }
}

impl fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextureFormat::Dxt1 => "DXT1",
            TextureFormat::Dxt3 => "DXT3",
            TextureFormat::Bgra32 => "BGRA32",
            TextureFormat::Indexed8 => "Indexed8",
        };
        f.write_str(name)
    }
}

impl FromStr for TextureFormat {
    type Err = DatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dxt1" => Ok(TextureFormat::Dxt1),
            "dxt3" => Ok(TextureFormat::Dxt3),
            "bgra32" => Ok(TextureFormat::Bgra32),
            "indexed8" => Ok(TextureFormat::Indexed8),
            _ => Err(DatError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Statistics for a single section decryption
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecryptStats {
    /// Mode byte from the section metadata word
    pub mode: u8,
    /// Number of payload bytes covered by the key schedule
    pub decode_length: usize,
    /// Bytes cut from a declared length that overran the next section
    pub clamped_bytes: usize,
    /// Zone object runs that were bitwise inverted
    pub inverted_runs: usize,
    /// Zone object node names unmasked
    pub unmasked_nodes: usize,
    /// Whether the zone mesh XOR stream pass ran
    pub xor_pass: bool,
    /// Zone mesh 8-byte blocks that were swapped
    pub swapped_blocks: usize,
    /// Whether the zone mesh block swap pass ran
    pub swap_pass: bool,
}
