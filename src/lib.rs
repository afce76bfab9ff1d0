//! datcodec - decoding layer for DAT game asset containers
//!
//! This crate reconstructs usable data from the partially encrypted sections of
//! DAT asset containers. The algorithms are reverse engineered and bit exact: a
//! deviation does not raise an error, it silently corrupts the output.
//!
//! # Features
//!
//! - Zone object decryption: key-scheduled run inversion plus node name unmasking
//! - Zone mesh decryption and re-encryption: nibble-keyed XOR stream plus
//!   conditional 8-byte block swap
//! - DXT1 and DXT3 block decompression to RGBA8
//! - BGRA32 and 8-bit palette indexed decoding with vertical flip
//! - Bounds-checked cursor over section buffers; no silent zero fill
//!
//! Container directory walking and the structural parsing of the decrypted
//! sections are left to the caller.
//!
//! # Example - Section decryption
//!
//! ```no_run
//! use datcodec::{decrypt_zone_mesh, KeyTables, SectionHeader};
//!
//! // Both tables are copied out of the game's program image once
//! let image = std::fs::read("game.dll")?;
//! let tables = KeyTables::from_image(&image, 0x1000, 0x1100)?;
//!
//! let mut entry = std::fs::read("zone.dat")?;
//! let header = SectionHeader::new(u32::from_le_bytes(*b"mesh"), 0x2E, 0x30, 0x1230);
//! let stats = decrypt_zone_mesh(&mut entry, &header, &tables)?;
//! println!("{} blocks swapped", stats.swapped_blocks);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Example - Texture decoding
//!
//! ```no_run
//! use datcodec::{decode_texture, TextureFormat};
//!
//! let pixels = std::fs::read("texture.bin")?;
//! let texture = decode_texture(TextureFormat::Dxt3, &pixels, 256, 256)?;
//! assert_eq!(texture.rgba.len(), 256 * 256 * 4);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

// Public modules
pub mod common;
pub mod cursor;
pub mod decrypt;
pub mod error;
pub mod tables;
pub mod texture;

// Re-export commonly used types
pub use common::{
    DatError, DecryptStats, Result, SectionHeader, TextureFormat, KEY_TABLE_SIZE, PALETTE_SIZE,
    SECTION_HEADER_SIZE, ZONE_MESH_SWAP_MARKER, ZONE_MESH_XOR_MIN_MODE, ZONE_OBJECT_NAME_LEN,
    ZONE_OBJECT_NAME_MASK, ZONE_OBJECT_NODE_STRIDE, ZONE_OBJECT_NODE_TABLE_OFFSET,
    ZONE_OBJECT_PLAINTEXT_MAX_MODE,
};
pub use cursor::ByteCursor;
pub use decrypt::{
    decrypt_zone_mesh, decrypt_zone_object, encrypt_zone_mesh, ZoneMeshDecryptor,
    ZoneObjectDecryptor,
};
pub use tables::KeyTables;
pub use texture::{
    decode_bgra32, decode_dxt1, decode_dxt3, decode_indexed8, decode_texture, DecodedTexture,
};
