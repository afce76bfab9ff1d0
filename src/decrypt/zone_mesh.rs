//! Zone mesh section decryption
//!
//! Mesh sections go through two independent passes:
//!
//! * **XOR stream** (mode 5 and above) - every payload byte is XORed with a
//!   mask drawn from a key schedule seeded by the primary key table.
//! * **Block swap** (when the header carries the `0xFFFF` marker) - the first
//!   half of the 16-byte aligned payload is walked in 8-byte blocks, and blocks
//!   whose key is odd trade places with the block half a region further on.
//!
//! Each pass is its own inverse and re-derives its schedule from the header,
//! which neither pass touches. Decryption runs XOR then swap; re-encryption
//! runs the same passes in the opposite order.
//!
//! Payload layout (relative to `base_offset + 0x10`):
//!
//! ```text
//! [0x00] total size (low 24 bits) | mode (high 8 bits)   u32 LE
//! [0x04] unused                                          u8
//! [0x05] key index                                       u8
//! [0x06] block swap marker (0xFFFF enables the swap)     u16 LE
//! [0x08] encrypted region, total size - 8 bytes
//! ```

use log::{debug, trace};

use crate::{
    ByteCursor, DecryptStats, KeyTables, Result, SectionHeader, ZONE_MESH_SWAP_MARKER,
    ZONE_MESH_XOR_MIN_MODE,
};

/// Size of the mesh metadata header that precedes the encrypted region
const MESH_HEADER_SIZE: usize = 8;

/// Size of a block moved by the swap pass
const SWAP_BLOCK_SIZE: usize = 8;

/// Metadata words at the start of a mesh payload
#[derive(Debug, Clone, Copy)]
struct MeshHeader {
    mode: u8,
    key_index: u8,
    marker: u16,
    decode_length: usize,
}

impl MeshHeader {
    /// Read the header, leaving the cursor at the start of the encrypted region
    fn read<T: AsRef<[u8]>>(cursor: &mut ByteCursor<T>, header: &SectionHeader) -> Result<Self> {
        cursor.seek_payload(header)?;
        let meta = cursor.next_u32()?;
        cursor.skip(1)?;
        let key_index = cursor.next_u8()?;
        let marker = cursor.next_u16()?;

        let total_size = (meta & 0x00FF_FFFF) as usize;
        Ok(Self {
            mode: (meta >> 24) as u8,
            key_index,
            marker,
            decode_length: total_size.saturating_sub(MESH_HEADER_SIZE),
        })
    }
}

/// Decryptor (and re-encryptor) for zone mesh sections
#[derive(Debug, Clone, Copy)]
pub struct ZoneMeshDecryptor<'a> {
    tables: &'a KeyTables,
}

impl<'a> ZoneMeshDecryptor<'a> {
    /// Create a decryptor drawing its key seeds from `tables`
    pub fn new(tables: &'a KeyTables) -> Self {
        Self { tables }
    }

    /// Decrypt the mesh section described by `header` in place
    pub fn decrypt<T>(
        &self,
        cursor: &mut ByteCursor<T>,
        header: &SectionHeader,
    ) -> Result<DecryptStats>
    where
        T: AsRef<[u8]> + AsMut<[u8]>,
    {
        self.process(cursor, header, false)
    }

    /// Re-encrypt a plaintext mesh section in place
    pub fn encrypt<T>(
        &self,
        cursor: &mut ByteCursor<T>,
        header: &SectionHeader,
    ) -> Result<DecryptStats>
    where
        T: AsRef<[u8]> + AsMut<[u8]>,
    {
        self.process(cursor, header, true)
    }

    /// Run both passes over the section
    ///
    /// With `reencrypt` false the XOR stream runs first and the block swap
    /// second; with `reencrypt` true the order flips, which undoes a previous
    /// decryption. The cursor is left at the payload start.
    pub fn process<T>(
        &self,
        cursor: &mut ByteCursor<T>,
        header: &SectionHeader,
        reencrypt: bool,
    ) -> Result<DecryptStats>
    where
        T: AsRef<[u8]> + AsMut<[u8]>,
    {
        let mesh = MeshHeader::read(cursor, header)?;
        cursor.require(mesh.decode_length)?;

        let mut stats = DecryptStats {
            mode: mesh.mode,
            decode_length: mesh.decode_length,
            ..Default::default()
        };

        if reencrypt {
            self.swap_pass(cursor, header, &mut stats)?;
            self.xor_pass(cursor, header, &mut stats)?;
        } else {
            self.xor_pass(cursor, header, &mut stats)?;
            self.swap_pass(cursor, header, &mut stats)?;
        }

        cursor.seek_payload(header)?;
        Ok(stats)
    }

    fn xor_pass<T>(
        &self,
        cursor: &mut ByteCursor<T>,
        header: &SectionHeader,
        stats: &mut DecryptStats,
    ) -> Result<()>
    where
        T: AsRef<[u8]> + AsMut<[u8]>,
    {
        let mesh = MeshHeader::read(cursor, header)?;
        if mesh.mode < ZONE_MESH_XOR_MIN_MODE {
            debug!(
                "Mesh section {}: mode {:#04x}, no XOR stream",
                header.name(),
                mesh.mode
            );
            return Ok(());
        }

        let mut key = self.tables.primary(mesh.key_index ^ 0xF0) as u32;
        let mut key_counter = 0u32;
        trace!("Mesh XOR key index {:#04x}, seed {:#04x}", mesh.key_index, key);

        for _ in 0..mesh.decode_length {
            let key_mod = ((key & 0xFF) << 8) | (key & 0xFF);
            key_counter = key_counter.wrapping_add(1);
            key = key.wrapping_add(key_counter);
            cursor.xor_next((key_mod >> (key & 7)) as u8)?;
            key_counter = key_counter.wrapping_add(1);
            key = key.wrapping_add(key_counter);
        }

        stats.xor_pass = true;
        Ok(())
    }

    fn swap_pass<T>(
        &self,
        cursor: &mut ByteCursor<T>,
        header: &SectionHeader,
        stats: &mut DecryptStats,
    ) -> Result<()>
    where
        T: AsRef<[u8]> + AsMut<[u8]>,
    {
        let mesh = MeshHeader::read(cursor, header)?;
        if mesh.marker != ZONE_MESH_SWAP_MARKER {
            debug!(
                "Mesh section {}: marker {:#06x}, no block swap",
                header.name(),
                mesh.marker
            );
            return Ok(());
        }

        let mut key1 = (mesh.key_index ^ 0xF0) as u32;
        let mut key2 = self.tables.secondary(key1 as u8) as u32;
        let decode_count = (mesh.decode_length & !0xF) / 2;
        trace!("Mesh swap key {:#04x}, seed {:#04x}", key1, key2);

        for _ in (0..decode_count).step_by(SWAP_BLOCK_SIZE) {
            if (key2 & 1) != 0 {
                cursor.swap_next8(decode_count, SWAP_BLOCK_SIZE)?;
                stats.swapped_blocks += 1;
            } else {
                cursor.skip(SWAP_BLOCK_SIZE)?;
            }
            key1 = key1.wrapping_add(9);
            key2 = key2.wrapping_add(key1);
        }

        stats.swap_pass = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DatError;

    fn identity_tables() -> KeyTables {
        let table: [u8; 256] = std::array::from_fn(|i| i as u8);
        KeyTables::new(table, table)
    }

    /// 0x40-byte mesh payload of incrementing bytes at base offset 0
    fn mesh_section(mode: u8, key_index: u8, marker: u16) -> Vec<u8> {
        let mut buf = vec![0u8; 0x58];
        buf[0x10..0x14].copy_from_slice(&(0x48 | (mode as u32) << 24).to_le_bytes());
        buf[0x15] = key_index;
        buf[0x16..0x18].copy_from_slice(&marker.to_le_bytes());
        for (i, b) in buf[0x18..].iter_mut().enumerate() {
            *b = i as u8;
        }
        buf
    }

    fn header() -> SectionHeader {
        SectionHeader::new(0, 0, 0, 0x58)
    }

    #[test]
    fn test_xor_stream_masks() {
        // Seed 1: keys run 1 -> 2 -> 4 -> 7, giving masks 0x0101 >> 2 and 0x0404 >> 7
        let tables = identity_tables();
        let mut buf = vec![0u8; 0x58];
        buf[0x10..0x14].copy_from_slice(&0x0500_0048u32.to_le_bytes());
        buf[0x15] = 0xF1;

        let mut cursor = ByteCursor::new(&mut buf[..]);
        let stats = ZoneMeshDecryptor::new(&tables)
            .decrypt(&mut cursor, &header())
            .unwrap();
        assert_eq!(cursor.position(), 0x10);

        assert!(stats.xor_pass);
        assert!(!stats.swap_pass);
        assert_eq!(stats.decode_length, 0x40);
        assert_eq!(&buf[0x18..0x1C], &[0x40, 0x08, 0x0B, 0xB0]);
        // Header words are never touched
        assert_eq!(&buf[0x10..0x18], &[0x48, 0, 0, 0x05, 0, 0xF1, 0, 0]);
    }

    #[test]
    fn test_low_mode_skips_xor_stream() {
        let tables = identity_tables();
        let mut buf = mesh_section(4, 0x12, 0);
        let original = buf.clone();

        let mut cursor = ByteCursor::new(&mut buf[..]);
        let stats = ZoneMeshDecryptor::new(&tables)
            .decrypt(&mut cursor, &header())
            .unwrap();

        assert!(!stats.xor_pass);
        assert!(!stats.swap_pass);
        assert_eq!(buf, original);
    }

    #[test]
    fn test_block_swap() {
        // Key index 0: key2 runs 0xF0, 0x1E9, 0x2EB, 0x3F6 -> blocks 1 and 2 swap
        let tables = identity_tables();
        let mut buf = mesh_section(0, 0x00, 0xFFFF);

        let mut cursor = ByteCursor::new(&mut buf[..]);
        let stats = ZoneMeshDecryptor::new(&tables)
            .decrypt(&mut cursor, &header())
            .unwrap();

        assert!(stats.swap_pass);
        assert_eq!(stats.swapped_blocks, 2);

        let payload = &buf[0x18..];
        assert_eq!(&payload[0x00..0x08], &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(payload[0x08], 0x28);
        assert_eq!(payload[0x10], 0x30);
        assert_eq!(payload[0x18], 0x18);
        assert_eq!(payload[0x28], 0x08);
        assert_eq!(payload[0x30], 0x10);
        assert_eq!(payload[0x38], 0x38);
    }

    #[test]
    fn test_round_trip_both_orders() {
        let tables = identity_tables();
        let decryptor = ZoneMeshDecryptor::new(&tables);
        let original = mesh_section(5, 0x37, 0xFFFF);

        let mut buf = original.clone();
        let mut cursor = ByteCursor::new(&mut buf);
        decryptor.encrypt(&mut cursor, &header()).unwrap();
        assert_ne!(cursor.get_ref()[0x18..], original[0x18..]);
        decryptor.decrypt(&mut cursor, &header()).unwrap();
        assert_eq!(buf, original);

        let mut buf = original.clone();
        let mut cursor = ByteCursor::new(&mut buf);
        decryptor.decrypt(&mut cursor, &header()).unwrap();
        decryptor.encrypt(&mut cursor, &header()).unwrap();
        assert_eq!(buf, original);
    }

    #[test]
    fn test_truncated_region_fails_without_mutation() {
        let tables = identity_tables();
        let mut buf = mesh_section(5, 0x37, 0xFFFF);
        buf.truncate(0x50);
        let original = buf.clone();

        let err = crate::decrypt_zone_mesh(&mut buf, &header(), &tables).unwrap_err();
        assert!(matches!(err, DatError::BufferUnderrun { .. }));
        assert_eq!(buf, original);
    }

    #[test]
    fn test_tiny_total_size_is_noop() {
        let tables = identity_tables();
        let mut buf = vec![0u8; 0x18];
        buf[0x10..0x14].copy_from_slice(&0x0500_0004u32.to_le_bytes());
        buf[0x16..0x18].copy_from_slice(&0xFFFFu16.to_le_bytes());
        let original = buf.clone();

        let stats = crate::decrypt_zone_mesh(&mut buf, &header(), &tables).unwrap();
        assert_eq!(stats.decode_length, 0);
        assert_eq!(stats.swapped_blocks, 0);
        assert_eq!(buf, original);
    }
}
