//! Zone section decryption
//!
//! This module reverses the obfuscation applied to zone object and zone mesh
//! sections. Both decryptors work in place on a caller-owned buffer through a
//! [`ByteCursor`](crate::ByteCursor): the ciphertext is overwritten with
//! plaintext and the cursor is left at the section payload start
//! (`base_offset + 0x10`), ready for the structural parser.
//!
//! Decryption is destructive. Running it twice on the same bytes does not
//! restore or preserve the plaintext; keep the original bytes if the section may
//! need decoding again. Each decryptor checks that every byte it will touch lies
//! inside the buffer before the first mutation, so a
//! [`DatError::BufferUnderrun`](crate::DatError::BufferUnderrun) leaves the
//! buffer as it was.
//!
//! Key schedule state lives in locals of each call; the only shared input is
//! the immutable [`KeyTables`](crate::KeyTables).

mod zone_mesh;
mod zone_object;

pub use zone_mesh::ZoneMeshDecryptor;
pub use zone_object::ZoneObjectDecryptor;

use crate::{ByteCursor, DecryptStats, KeyTables, Result, SectionHeader};

/// Decrypt a zone object section of `buffer` in place
pub fn decrypt_zone_object(
    buffer: &mut [u8],
    header: &SectionHeader,
    tables: &KeyTables,
) -> Result<DecryptStats> {
    let mut cursor = ByteCursor::new(buffer);
    ZoneObjectDecryptor::new(tables).decrypt(&mut cursor, header)
}

/// Decrypt a zone mesh section of `buffer` in place
pub fn decrypt_zone_mesh(
    buffer: &mut [u8],
    header: &SectionHeader,
    tables: &KeyTables,
) -> Result<DecryptStats> {
    let mut cursor = ByteCursor::new(buffer);
    ZoneMeshDecryptor::new(tables).decrypt(&mut cursor, header)
}

/// Re-encrypt a plaintext zone mesh section of `buffer` in place
pub fn encrypt_zone_mesh(
    buffer: &mut [u8],
    header: &SectionHeader,
    tables: &KeyTables,
) -> Result<DecryptStats> {
    let mut cursor = ByteCursor::new(buffer);
    ZoneMeshDecryptor::new(tables).encrypt(&mut cursor, header)
}
