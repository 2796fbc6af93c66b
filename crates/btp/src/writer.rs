//! Two-phase package writer.
//!
//! The header and the whole entry table are reserved as zeroes before any mip data is
//! produced, so every entry's file offset is known up front and mip data can be streamed
//! forward. Each entry is patched in place as soon as its mips are written, and the header
//! is rewritten once the TFC table has been appended.
//!
//! ```text
//! Empty -> HeaderReserved -> EntriesReserved -> DataWritten -> TfcTableWritten -> Finalized
//! ```

use binrw::BinWrite;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Seek, SeekFrom, Write};

use crate::{
    codec::{Compression, MipCodec},
    dedup::{DedupStats, MipDedupStore, MipLocation},
    entry::{storage_flags, MipStorage, TextureEntry, TextureOverride},
    error::{BtpError, Result},
    header::BtpHeader,
    tfc::{TfcTable, NO_TFC_INDEX},
    utils::fingerprint_payload,
};

/// Produces the raw bytes of package-stored mips.
///
/// `Ok(None)` means the asset is missing and aborts the compile.
pub trait MipSource {
    fn load_mip(&mut self, texture: &TextureOverride, mip_index: usize) -> io::Result<Option<Vec<u8>>>;
}

impl<F> MipSource for F
where
    F: FnMut(&TextureOverride, usize) -> io::Result<Option<Vec<u8>>>,
{
    fn load_mip(&mut self, texture: &TextureOverride, mip_index: usize) -> io::Result<Option<Vec<u8>>> {
        self(texture, mip_index)
    }
}

/// In-memory source keyed by `(texture path, mip index)`.
#[derive(Debug, Clone, Default)]
pub struct MemoryMipSource {
    mips: HashMap<(String, usize), Vec<u8>>,
}

impl MemoryMipSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, mip_index: usize, data: Vec<u8>) {
        self.mips.insert((path.into(), mip_index), data);
    }

    pub fn with_mip(mut self, path: impl Into<String>, mip_index: usize, data: Vec<u8>) -> Self {
        self.insert(path, mip_index, data);
        self
    }
}

impl MipSource for MemoryMipSource {
    fn load_mip(&mut self, texture: &TextureOverride, mip_index: usize) -> io::Result<Option<Vec<u8>>> {
        Ok(self.mips.get(&(texture.path.clone(), mip_index)).cloned())
    }
}

/// Options of one compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Fingerprint of the logical owner the package applies to.
    pub target_hash: u32,
    pub compression: Compression,
}

/// Where the writer is in the compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Empty,
    HeaderReserved,
    EntriesReserved,
    DataWritten,
    TfcTableWritten,
    Finalized,
}

/// Summary of a finished compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileReport {
    pub texture_count: u32,
    pub mip_count: usize,
    pub package_mips: usize,
    pub external_mips: usize,
    pub tfc_table_count: u32,
    pub tfc_table_offset: u64,
    pub tfc_guid_mismatches: usize,
    pub file_size: u64,
    pub dedup: DedupStats,
}

pub struct BtpWriter<W: Write + Seek> {
    writer: W,
    state: WriterState,
    header: BtpHeader,
    codec: Box<dyn MipCodec>,
    tfc_table: TfcTable,
    dedup: MipDedupStore,

    entry_table_offset: u64,
    data_offset: u64,
    texture_count: u32,
    textures_written: u32,

    mip_count: usize,
    external_mips: usize,
}

impl<W: Write + Seek> BtpWriter<W> {
    /// Create a writer with fresh compile-scoped stores.
    pub fn new(writer: W, options: CompileOptions) -> Self {
        Self::with_stores(writer, options, TfcTable::new(), MipDedupStore::new())
    }

    /// Create a writer that uses the given TFC table and dedup store for this compile.
    pub fn with_stores(
        writer: W,
        options: CompileOptions,
        tfc_table: TfcTable,
        dedup: MipDedupStore,
    ) -> Self {
        Self {
            writer,
            state: WriterState::Empty,
            header: BtpHeader::new(options.target_hash),
            codec: Box::new(options.compression),
            tfc_table,
            dedup,
            entry_table_offset: 0,
            data_offset: 0,
            texture_count: 0,
            textures_written: 0,
            mip_count: 0,
            external_mips: 0,
        }
    }

    /// Replace the codec derived from the options.
    pub fn with_codec(mut self, codec: impl MipCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn tfc_table(&self) -> &TfcTable {
        &self.tfc_table
    }

    pub fn dedup_stats(&self) -> DedupStats {
        self.dedup.stats()
    }

    /// Offset of the first byte after the entry table.
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn expect_state(&self, expected: WriterState) -> Result<()> {
        if self.state != expected {
            return Err(BtpError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Reserve the header and `texture_count` zeroed entries at the start of the stream.
    pub fn reserve(&mut self, texture_count: u32) -> Result<()> {
        self.expect_state(WriterState::Empty)?;

        self.writer.seek(SeekFrom::Start(0))?;
        self.writer.write_all(&vec![0; BtpHeader::size_of()])?;
        self.state = WriterState::HeaderReserved;

        self.entry_table_offset = self.writer.stream_position()?;
        let entry_size = TextureEntry::size_of();
        let zeroed_entry = vec![0; entry_size];
        for _ in 0..texture_count {
            self.writer.write_all(&zeroed_entry)?;
        }
        self.texture_count = texture_count;
        self.data_offset = self.writer.stream_position()?;
        self.state = if texture_count == 0 {
            WriterState::DataWritten
        } else {
            WriterState::EntriesReserved
        };

        tracing::trace!(
            "Reserved header and {} entries, data starts at {}",
            texture_count,
            self.data_offset
        );

        Ok(())
    }

    /// Write the mips of the next reserved texture and patch its entry in place.
    pub fn write_texture<S: MipSource + ?Sized>(
        &mut self,
        texture: &TextureOverride,
        source: &mut S,
    ) -> Result<TextureEntry> {
        self.expect_state(WriterState::EntriesReserved)?;
        texture.validate()?;

        let tfc_index = match &texture.tfc {
            Some(tfc) => self
                .tfc_table
                .get_or_create_index(&tfc.name, tfc.guid, &texture.path)?,
            None => NO_TFC_INDEX,
        };

        let mut entry = TextureEntry::from_override(texture, tfc_index);
        for mip_index in texture.processing_order() {
            let mip = &texture.mips[mip_index];
            let (location, compressed) = match mip.storage {
                MipStorage::Package => self.write_package_mip(texture, mip_index, source)?,
                MipStorage::External {
                    offset,
                    compressed_size,
                    compressed,
                    ..
                } => {
                    self.external_mips += 1;
                    (
                        MipLocation {
                            offset,
                            compressed_size,
                        },
                        compressed,
                    )
                }
            };

            let slot = &mut entry.mips[mip_index];
            slot.data_offset = location.offset;
            slot.compressed_size = location.compressed_size;
            slot.flags = storage_flags(&mip.storage, compressed);
            self.mip_count += 1;
        }

        entry.validate_finalized()?;
        self.patch_entry(self.textures_written, &entry)?;

        self.textures_written += 1;
        if self.textures_written == self.texture_count {
            self.state = WriterState::DataWritten;
        }

        tracing::debug!(
            "Wrote texture '{}' ({} mips, tfc index {})",
            texture.path,
            texture.mips.len(),
            tfc_index
        );

        Ok(entry)
    }

    fn write_package_mip<S: MipSource + ?Sized>(
        &mut self,
        texture: &TextureOverride,
        mip_index: usize,
        source: &mut S,
    ) -> Result<(MipLocation, bool)> {
        let expected = texture.mips[mip_index].uncompressed_size;
        let data = source
            .load_mip(texture, mip_index)?
            .ok_or_else(|| BtpError::SourceAssetMissing {
                path: texture.path.clone(),
                mip_index,
            })?;
        if data.len() != expected as usize {
            return Err(BtpError::MipSizeMismatch {
                path: texture.path.clone(),
                mip_index,
                expected,
                actual: data.len(),
            });
        }

        let (payload, compressed) = match self.codec.compress(&data)? {
            Some(compressed) => (compressed, true),
            None => (data, false),
        };
        let location = self.write_payload(&payload)?;
        Ok((location, compressed))
    }

    /// Append `payload` to the data segment unless an identical payload is already there.
    fn write_payload(&mut self, payload: &[u8]) -> Result<MipLocation> {
        let compressed_size = payload_size(payload.len())?;

        let fingerprint = fingerprint_payload(payload);
        if let Some(location) = self.dedup.try_reuse(fingerprint, payload.len()) {
            self.dedup.record_reused(payload.len());
            tracing::debug!(
                "Reusing payload {:016x} at offset {} ({} bytes)",
                fingerprint,
                location.offset,
                location.compressed_size
            );
            return Ok(location);
        }

        let offset = self.writer.stream_position()?;
        self.writer.write_all(payload)?;

        let location = MipLocation {
            offset,
            compressed_size,
        };
        self.dedup.register(fingerprint, location);
        self.dedup.record_written(payload.len());
        Ok(location)
    }

    /// Seek back to the reserved slot of entry `index`, write it and return to the data cursor.
    fn patch_entry(&mut self, index: u32, entry: &TextureEntry) -> Result<()> {
        let resume = self.writer.stream_position()?;
        let slot = self.entry_table_offset + u64::from(index) * TextureEntry::size_of() as u64;

        self.writer.seek(SeekFrom::Start(slot))?;
        entry.write(&mut self.writer)?;
        self.writer.seek(SeekFrom::Start(resume))?;

        tracing::trace!("Patched entry {} at offset {}", index, slot);
        Ok(())
    }

    /// Append the TFC table after the mip data.
    pub fn write_tfc_table(&mut self) -> Result<u64> {
        self.expect_state(WriterState::DataWritten)?;

        let offset = self.tfc_table.serialize(&mut self.writer)?;
        self.header.tfc_table_offset = offset;
        self.header.tfc_table_count = self.tfc_table.len() as u32;
        self.state = WriterState::TfcTableWritten;
        Ok(offset)
    }

    /// Rewrite the header with the final counts and flush the stream.
    pub fn finalize(&mut self) -> Result<CompileReport> {
        self.expect_state(WriterState::TfcTableWritten)?;

        let file_size = self.writer.seek(SeekFrom::End(0))?;
        self.header.texture_count = self.textures_written;

        self.writer.seek(SeekFrom::Start(0))?;
        self.header.write(&mut self.writer)?;
        self.writer.seek(SeekFrom::Start(file_size))?;
        self.writer.flush()?;
        self.state = WriterState::Finalized;

        let report = CompileReport {
            texture_count: self.header.texture_count,
            mip_count: self.mip_count,
            package_mips: self.mip_count - self.external_mips,
            external_mips: self.external_mips,
            tfc_table_count: self.header.tfc_table_count,
            tfc_table_offset: self.header.tfc_table_offset,
            tfc_guid_mismatches: self.tfc_table.mismatch_count(),
            file_size,
            dedup: self.dedup.stats(),
        };

        tracing::info!(
            "Texture package complete textures={} mips={} external={} tfcs={} deduplicated={} saved_kb={} size={}",
            report.texture_count,
            report.mip_count,
            report.external_mips,
            report.tfc_table_count,
            report.dedup.deduplicated_mips,
            report.dedup.saved_bytes / 1024,
            report.file_size
        );

        Ok(report)
    }
}

/// Size of a payload as stored in the signed 32-bit compressed size field.
fn payload_size(len: usize) -> Result<u32> {
    i32::try_from(len)
        .map(|size| size as u32)
        .map_err(|_| BtpError::Compression(format!("payload of {len} bytes is too large")))
}
