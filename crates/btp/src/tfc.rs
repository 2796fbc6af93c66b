//! Texture file cache (TFC) table.
//!
//! Texture entries never embed cache names. They store an index into a dense table of
//! `(name, guid)` pairs written after the mip data. Index 0 is reserved for the sentinel
//! entry (empty name, nil GUID) meaning "stored in this package, no external cache".

use binrw::{binrw, BinWrite};
use std::collections::HashMap;
use std::io::{Seek, Write};
use uuid::Uuid;

use crate::{
    error::{BtpError, Result},
    utils::{decode_utf16_fixed, encode_utf16_fixed, utf16_len, write_alignment},
};

/// Width of the name field in UTF-16 code units, terminator included.
pub const TFC_NAME_FIELD_UNITS: usize = 64;

/// Longest cache name that fits the name field.
pub const MAX_TFC_NAME_LEN: usize = TFC_NAME_FIELD_UNITS - 1;

/// Index of the sentinel entry.
pub const NO_TFC_INDEX: i32 = 0;

/// Alignment of the table's start offset.
pub const TFC_TABLE_ALIGNMENT: u64 = 16;

/// One row of the TFC table.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TfcEntry {
    #[br(map = |raw: [u16; TFC_NAME_FIELD_UNITS]| decode_utf16_fixed(&raw))]
    #[bw(map = |name: &String| encode_utf16_fixed::<TFC_NAME_FIELD_UNITS>(name))]
    pub name: String,

    #[br(map = |raw: [u8; 16]| Uuid::from_bytes(raw))]
    #[bw(map = |guid: &Uuid| *guid.as_bytes())]
    pub guid: Uuid,
}

impl TfcEntry {
    pub fn size_of() -> usize {
        (TFC_NAME_FIELD_UNITS * std::mem::size_of::<u16>()) + 16
    }

    pub fn sentinel() -> Self {
        Self {
            name: String::new(),
            guid: Uuid::nil(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.name.is_empty() && self.guid.is_nil()
    }
}

/// Builds the TFC table of one compile.
///
/// Indices are handed out in first-seen order. A name always resolves to the GUID it was
/// first registered with.
#[derive(Debug, Clone)]
pub struct TfcTable {
    entries: Vec<TfcEntry>,
    indices: HashMap<String, i32>,
    mismatch_count: usize,
}

impl Default for TfcTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TfcTable {
    pub fn new() -> Self {
        let mut indices = HashMap::new();
        indices.insert(String::new(), NO_TFC_INDEX);

        Self {
            entries: vec![TfcEntry::sentinel()],
            indices,
            mismatch_count: 0,
        }
    }

    /// Resolve `name` to its table index, registering it if it has not been seen yet.
    ///
    /// * `source_path` - The texture that referenced the cache, used in diagnostics.
    pub fn get_or_create_index(&mut self, name: &str, guid: Uuid, source_path: &str) -> Result<i32> {
        if let Some(&index) = self.indices.get(name) {
            let existing = &self.entries[index as usize];
            if existing.guid != guid {
                self.mismatch_count += 1;
                tracing::warn!(
                    "TFC '{}' was registered with GUID {} but texture '{}' references it with GUID {}; keeping the first",
                    name,
                    existing.guid,
                    source_path,
                    guid
                );
            }
            return Ok(index);
        }

        let len = utf16_len(name);
        if len > MAX_TFC_NAME_LEN {
            return Err(BtpError::NameTooLong {
                name: name.to_string(),
                len,
                max: MAX_TFC_NAME_LEN,
            });
        }

        if name.contains('\0') {
            return Err(BtpError::NulInName {
                name: name.to_string(),
            });
        }

        let index = self.entries.len() as i32;
        self.entries.push(TfcEntry {
            name: name.to_string(),
            guid,
        });
        self.indices.insert(name.to_string(), index);

        tracing::debug!("Registered TFC '{}' ({}) at index {}", name, guid, index);

        Ok(index)
    }

    /// Align the stream to [`TFC_TABLE_ALIGNMENT`], write every entry in index order and
    /// return the table's start offset.
    pub fn serialize<W: Write + Seek>(&self, writer: &mut W) -> Result<u64> {
        let offset = write_alignment(writer, TFC_TABLE_ALIGNMENT)?;
        for entry in &self.entries {
            entry.write(writer)?;
        }
        Ok(offset)
    }

    pub fn get(&self, index: i32) -> Option<&TfcEntry> {
        usize::try_from(index).ok().and_then(|i| self.entries.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TfcEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: the sentinel is present from construction.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of GUID mismatches observed so far.
    pub fn mismatch_count(&self) -> usize {
        self.mismatch_count
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use binrw::BinRead;

    use super::*;

    const DLC_GUID: Uuid = Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
    const OTHER_GUID: Uuid = Uuid::from_u128(0xfedc_ba98_7654_3210_fedc_ba98_7654_3210);

    #[test]
    fn test_size_of() {
        let mut writer = Cursor::new(Vec::new());
        TfcEntry::sentinel().write(&mut writer).unwrap();
        assert_eq!(writer.position() as usize, TfcEntry::size_of());
        assert_eq!(TfcEntry::size_of(), 144);
    }

    #[test]
    fn test_sentinel_is_present() {
        let table = TfcTable::new();
        assert_eq!(table.len(), 1);
        assert!(!table.is_empty());
        assert!(table.get(NO_TFC_INDEX).unwrap().is_sentinel());
    }

    #[test]
    fn test_indices_are_assigned_in_first_seen_order() {
        let mut table = TfcTable::new();
        assert_eq!(table.get_or_create_index("Textures_DLC", DLC_GUID, "A").unwrap(), 1);
        assert_eq!(table.get_or_create_index("Textures_Other", OTHER_GUID, "B").unwrap(), 2);
        assert_eq!(table.get_or_create_index("Textures_DLC", DLC_GUID, "C").unwrap(), 1);
        assert_eq!(table.len(), 3);
        assert_eq!(table.mismatch_count(), 0);
    }

    #[test]
    fn test_guid_mismatch_keeps_first_guid() {
        let mut table = TfcTable::new();
        table.get_or_create_index("Textures_DLC", DLC_GUID, "A").unwrap();
        let index = table
            .get_or_create_index("Textures_DLC", OTHER_GUID, "B")
            .unwrap();

        assert_eq!(index, 1);
        assert_eq!(table.get(1).unwrap().guid, DLC_GUID);
        assert_eq!(table.mismatch_count(), 1);
    }

    #[test]
    fn test_sentinel_name_with_guid_counts_as_mismatch() {
        let mut table = TfcTable::new();
        assert_eq!(table.get_or_create_index("", Uuid::nil(), "A").unwrap(), NO_TFC_INDEX);
        assert_eq!(table.mismatch_count(), 0);

        assert_eq!(table.get_or_create_index("", DLC_GUID, "B").unwrap(), NO_TFC_INDEX);
        assert_eq!(table.mismatch_count(), 1);
        assert!(table.get(0).unwrap().guid.is_nil());
    }

    #[test]
    fn test_name_with_nul_is_rejected() {
        let mut table = TfcTable::new();
        assert!(matches!(
            table.get_or_create_index("Textures\0DLC", DLC_GUID, "A"),
            Err(BtpError::NulInName { .. })
        ));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_name_too_long() {
        let mut table = TfcTable::new();
        let max = "n".repeat(MAX_TFC_NAME_LEN);
        assert_eq!(table.get_or_create_index(&max, DLC_GUID, "A").unwrap(), 1);

        let too_long = "n".repeat(MAX_TFC_NAME_LEN + 1);
        assert!(matches!(
            table.get_or_create_index(&too_long, DLC_GUID, "A"),
            Err(BtpError::NameTooLong { len: 64, max: 63, .. })
        ));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_serialize_aligns_and_writes_in_index_order() {
        let mut table = TfcTable::new();
        table.get_or_create_index("Textures_DLC", DLC_GUID, "A").unwrap();

        let mut cursor = Cursor::new(vec![0xFFu8; 3]);
        cursor.set_position(3);
        let offset = table.serialize(&mut cursor).unwrap();

        assert_eq!(offset, 16);
        let bytes = cursor.into_inner();
        assert_eq!(bytes.len(), 16 + 2 * 144);
        assert!(bytes[3..16].iter().all(|&b| b == 0));

        let mut reader = Cursor::new(&bytes[16..]);
        assert!(TfcEntry::read(&mut reader).unwrap().is_sentinel());
        let entry = TfcEntry::read(&mut reader).unwrap();
        assert_eq!(entry.name, "Textures_DLC");
        assert_eq!(entry.guid, DLC_GUID);
    }
}
