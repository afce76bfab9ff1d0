//! Zone object section decryption
//!
//! Object sections are protected by a variable-stride inversion: a key schedule
//! seeded from the primary key table walks the payload in runs of 16 to 23
//! bytes and bitwise inverts the runs whose key is odd. The node name fields of
//! the object table are additionally masked with a fixed byte.
//!
//! Payload layout (relative to `base_offset + 0x10`):
//!
//! ```text
//! [0x00] decode length (low 24 bits) | mode (high 8 bits)   u32 LE
//! [0x04] node count    (low 24 bits) | key index (high 8)   u32 LE
//! [0x08] inverted region, `decode length` bytes
//! [0x20] node table, 0x64 bytes per node, names in the first 0x10 bytes
//! ```

use log::{debug, trace, warn};

use crate::{
    ByteCursor, DecryptStats, KeyTables, Result, SectionHeader, ZONE_OBJECT_NAME_LEN,
    ZONE_OBJECT_NAME_MASK, ZONE_OBJECT_NODE_STRIDE, ZONE_OBJECT_NODE_TABLE_OFFSET,
    ZONE_OBJECT_PLAINTEXT_MAX_MODE,
};

/// Decryptor for zone object sections
#[derive(Debug, Clone, Copy)]
pub struct ZoneObjectDecryptor<'a> {
    tables: &'a KeyTables,
}

impl<'a> ZoneObjectDecryptor<'a> {
    /// Create a decryptor drawing its key seeds from `tables`
    pub fn new(tables: &'a KeyTables) -> Self {
        Self { tables }
    }

    /// Decrypt the object section described by `header` in place
    ///
    /// Sections whose mode byte is `0x1A` or lower are plaintext and are left
    /// untouched. A decode length that runs past `next_section_offset` is
    /// shortened by the overrun. On success the cursor sits at the payload
    /// start.
    pub fn decrypt<T>(
        &self,
        cursor: &mut ByteCursor<T>,
        header: &SectionHeader,
    ) -> Result<DecryptStats>
    where
        T: AsRef<[u8]> + AsMut<[u8]>,
    {
        cursor.seek_payload(header)?;
        let meta = cursor.next_u32()?;
        let nodes = cursor.next_u32()?;

        let mode = (meta >> 24) as u8;
        let declared_length = (meta & 0x00FF_FFFF) as usize;
        let node_count = (nodes & 0x00FF_FFFF) as usize;
        let key_index = (nodes >> 24) as u8;

        let mut stats = DecryptStats {
            mode,
            ..Default::default()
        };

        if mode <= ZONE_OBJECT_PLAINTEXT_MAX_MODE {
            debug!(
                "Object section {} is plaintext (mode {:#04x})",
                header.name(),
                mode
            );
            cursor.seek_payload(header)?;
            return Ok(stats);
        }

        let mut decode_length = declared_length;
        let end = cursor.position().saturating_add(decode_length);
        if end > header.next_section_offset {
            let overrun = end - header.next_section_offset;
            warn!(
                "Object section {} declares {:#x} bytes, {:#x} past the next section; clamping",
                header.name(),
                declared_length,
                overrun
            );
            stats.clamped_bytes = overrun.min(decode_length);
            decode_length -= stats.clamped_bytes;
        }
        stats.decode_length = decode_length;

        // Validate everything the two passes touch before mutating anything
        cursor.require(decode_length)?;
        let node_table = header.base_offset + ZONE_OBJECT_NODE_TABLE_OFFSET;
        if node_count > 0 {
            let span = (node_count - 1) * ZONE_OBJECT_NODE_STRIDE + ZONE_OBJECT_NAME_LEN;
            cursor.sub_buffer(node_table, span)?;
        }

        stats.inverted_runs = self.invert_runs(cursor, key_index, decode_length)?;
        stats.unmasked_nodes = unmask_node_names(cursor, header, node_count)?;

        cursor.seek_payload(header)?;
        Ok(stats)
    }

    fn invert_runs<T>(
        &self,
        cursor: &mut ByteCursor<T>,
        key_index: u8,
        decode_length: usize,
    ) -> Result<usize>
    where
        T: AsRef<[u8]> + AsMut<[u8]>,
    {
        let mut key = self.tables.primary(key_index ^ 0xFF) as u32;
        let mut key_counter = 0u32;
        let mut consumed = 0usize;
        let mut runs = 0usize;

        trace!("Object key index {:#04x}, seed {:#04x}", key_index, key);

        while consumed < decode_length {
            let xor_length = (((key >> 4) & 7) + 16) as usize;

            if (key & 1) != 0 && consumed + xor_length < decode_length {
                for _ in 0..xor_length {
                    cursor.xor_next(0xFF)?;
                }
                runs += 1;
            } else {
                // The final run may extend past the region; stop at its end
                cursor.skip(xor_length.min(decode_length - consumed))?;
            }

            key_counter = key_counter.wrapping_add(1);
            key = key.wrapping_add(key_counter);
            consumed += xor_length;
        }

        Ok(runs)
    }
}

fn unmask_node_names<T>(
    cursor: &mut ByteCursor<T>,
    header: &SectionHeader,
    node_count: usize,
) -> Result<usize>
where
    T: AsRef<[u8]> + AsMut<[u8]>,
{
    for node in 0..node_count {
        cursor.offset_from(
            header,
            ZONE_OBJECT_NODE_TABLE_OFFSET + node * ZONE_OBJECT_NODE_STRIDE,
        )?;
        for _ in 0..ZONE_OBJECT_NAME_LEN {
            cursor.xor_next(ZONE_OBJECT_NAME_MASK)?;
        }
    }
    Ok(node_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DatError;

    fn identity_tables() -> KeyTables {
        let table: [u8; 256] = std::array::from_fn(|i| i as u8);
        KeyTables::new(table, table)
    }

    fn object_section(
        len: usize,
        decode_length: u32,
        mode: u8,
        nodes: u32,
        key_index: u8,
    ) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        let meta = decode_length | (mode as u32) << 24;
        let node_word = nodes | (key_index as u32) << 24;
        buf[0x10..0x14].copy_from_slice(&meta.to_le_bytes());
        buf[0x14..0x18].copy_from_slice(&node_word.to_le_bytes());
        buf
    }

    #[test]
    fn test_plaintext_mode_is_untouched() {
        let tables = identity_tables();
        let mut buf = object_section(0x80, 0x60, 0x1A, 1, 0xFE);
        let original = buf.clone();

        let mut cursor = ByteCursor::new(&mut buf[..]);
        let stats = ZoneObjectDecryptor::new(&tables)
            .decrypt(&mut cursor, &SectionHeader::new(0, 0, 0, 0x80))
            .unwrap();

        assert_eq!(stats.mode, 0x1A);
        assert_eq!(stats.inverted_runs, 0);
        assert_eq!(cursor.position(), 0x10);
        assert_eq!(buf, original);
    }

    #[test]
    fn test_inverts_odd_key_runs_and_unmasks_names() {
        // Seed 1 with an identity table: keys 1, 2, 4, 7, 11, 16 give runs
        // invert, skip, skip, invert, invert, and a final short skip
        let tables = identity_tables();
        let mut buf = object_section(0x80, 0x60, 0x1B, 1, 0xFE);

        let mut cursor = ByteCursor::new(&mut buf[..]);
        let stats = ZoneObjectDecryptor::new(&tables)
            .decrypt(&mut cursor, &SectionHeader::new(0, 0, 0, 0x80))
            .unwrap();
        assert_eq!(cursor.position(), 0x10);

        assert_eq!(stats.decode_length, 0x60);
        assert_eq!(stats.clamped_bytes, 0);
        assert_eq!(stats.inverted_runs, 3);
        assert_eq!(stats.unmasked_nodes, 1);

        assert!(buf[0x18..0x28].iter().all(|&b| b == 0xFF));
        assert!(buf[0x28..0x30].iter().all(|&b| b == 0x00));
        assert!(buf[0x30..0x40].iter().all(|&b| b == 0x55));
        assert!(buf[0x40..0x48].iter().all(|&b| b == 0x00));
        assert!(buf[0x48..0x68].iter().all(|&b| b == 0xFF));
        assert!(buf[0x68..].iter().all(|&b| b == 0x00));
    }

    #[test]
    fn test_overrun_is_clamped() {
        // 0x80 bytes declared from 0x18 would end at 0x98, next section is at 0x78
        let tables = identity_tables();
        let mut buf = object_section(0x80, 0x80, 0x1B, 0, 0xFE);

        let header = SectionHeader::new(0, 0, 0, 0x78);
        let stats = crate::decrypt_zone_object(&mut buf, &header, &tables).unwrap();

        assert_eq!(stats.clamped_bytes, 0x20);
        assert_eq!(stats.decode_length, 0x60);
        assert_eq!(stats.inverted_runs, 3);
        assert!(buf[0x68..].iter().all(|&b| b == 0x00));
    }

    #[test]
    fn test_node_table_outside_buffer_fails_without_mutation() {
        let tables = identity_tables();
        let mut buf = object_section(0x80, 0x60, 0x1B, 2, 0xFE);
        let original = buf.clone();

        let header = SectionHeader::new(0, 0, 0, 0x80);
        let err = crate::decrypt_zone_object(&mut buf, &header, &tables).unwrap_err();

        assert!(matches!(err, DatError::BufferUnderrun { .. }));
        assert_eq!(buf, original);
    }

    #[test]
    fn test_zero_length_and_zero_nodes() {
        let tables = identity_tables();
        let mut buf = object_section(0x20, 0, 0x40, 0, 0x00);
        let original = buf.clone();

        let header = SectionHeader::new(0, 0, 0, 0x20);
        let stats = crate::decrypt_zone_object(&mut buf, &header, &tables).unwrap();

        assert_eq!(stats.decode_length, 0);
        assert_eq!(stats.unmasked_nodes, 0);
        assert_eq!(buf, original);
    }
}
