use binrw::BinRead;
use byteorder::{ReadBytesExt, LE};
use std::collections::HashMap;
use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::{
    codec::{Compression, MipCodec},
    entry::{TextureEntry, TextureOverride, TfcReference, MAX_MIPS},
    error::{BtpError, Result},
    header::{BtpHeader, BTP_MAGIC, BTP_MIN_VERSION, BTP_VERSION},
    mip::MipEntry,
    tfc::{TfcEntry, NO_TFC_INDEX},
};

/// Options for opening a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadOptions {
    /// Load, decompress and verify every package-stored mip while opening.
    pub load_payloads: bool,
}

/// A texture package opened for reading.
pub struct BtpPackage<TSource: Read + Seek> {
    header: BtpHeader,
    tfc_table: Vec<TfcEntry>,
    entries: Vec<TextureEntry>,

    /// Eagerly loaded, decompressed payloads keyed by `(texture index, mip index)`.
    payloads: HashMap<(usize, usize), Box<[u8]>>,
    data_start: u64,
    codec: Box<dyn MipCodec>,

    /// The original byte source.
    source: TSource,
}

impl<TSource: Read + Seek> std::fmt::Debug for BtpPackage<TSource> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtpPackage")
            .field("header", &self.header)
            .field("tfc_table", &self.tfc_table)
            .field("entries", &self.entries.len())
            .field("payloads", &self.payloads.len())
            .finish()
    }
}

impl<TSource: Read + Seek> BtpPackage<TSource> {
    /// Open a package without loading any payloads.
    pub fn mount_from_reader(source: TSource) -> Result<Self> {
        Self::open(source, ReadOptions::default())
    }

    pub fn open(source: TSource, options: ReadOptions) -> Result<Self> {
        Self::open_with_codec(source, options, Compression::default())
    }

    /// Open a package, decompressing flagged payloads with `codec`.
    pub fn open_with_codec(
        mut source: TSource,
        options: ReadOptions,
        codec: impl MipCodec + 'static,
    ) -> Result<Self> {
        let (header, tfc_table, entries) = {
            let mut reader = BufReader::new(&mut source);
            let header = read_header(&mut reader)?;
            let header_size = BtpHeader::size_of_version(header.version) as u64;
            let data_start =
                header_size + u64::from(header.texture_count) * TextureEntry::size_of() as u64;
            if header.tfc_table_offset < data_start {
                return Err(BtpError::Malformed(format!(
                    "TFC table offset {} overlaps the entry table ending at {}",
                    header.tfc_table_offset, data_start
                )));
            }

            // Entries reference the TFC table by index, so it is read first.
            reader.seek(SeekFrom::Start(header.tfc_table_offset))?;
            let tfc_table = read_tfc_table(&mut reader, header.tfc_table_count)?;

            reader.seek(SeekFrom::Start(header_size))?;
            let entries = read_entries(&mut reader, header.texture_count, tfc_table.len())?;

            (header, tfc_table, entries)
        };

        let data_start = BtpHeader::size_of_version(header.version) as u64
            + entries.len() as u64 * TextureEntry::size_of() as u64;

        let mut package = Self {
            header,
            tfc_table,
            entries,
            payloads: HashMap::new(),
            data_start,
            codec: Box::new(codec),
            source,
        };

        if options.load_payloads {
            for (texture_index, mip_index) in package.package_mip_indices() {
                let data = package.read_mip(texture_index, mip_index)?;
                package.payloads.insert((texture_index, mip_index), data);
            }
            tracing::debug!("Loaded {} mip payloads", package.payloads.len());
        }

        Ok(package)
    }

    pub fn header(&self) -> &BtpHeader {
        &self.header
    }

    pub fn entries(&self) -> &[TextureEntry] {
        &self.entries
    }

    pub fn tfc_table(&self) -> &[TfcEntry] {
        &self.tfc_table
    }

    pub fn tfc_entry(&self, index: i32) -> Option<&TfcEntry> {
        usize::try_from(index).ok().and_then(|i| self.tfc_table.get(i))
    }

    /// Find a texture entry by path (case insensitive) and return its index.
    pub fn find_texture(&self, path: &str) -> Option<(usize, &TextureEntry)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.path.eq_ignore_ascii_case(path))
    }

    /// Project every entry back into its logical record.
    pub fn texture_overrides(&self) -> Vec<TextureOverride> {
        self.entries
            .iter()
            .map(|entry| {
                let tfc = match entry.tfc_index {
                    NO_TFC_INDEX => None,
                    index => self
                        .tfc_entry(index)
                        .map(|tfc| TfcReference::new(tfc.name.clone(), tfc.guid)),
                };
                entry.to_override(tfc)
            })
            .collect()
    }

    /// `(texture index, mip index)` of every mip stored in this file.
    fn package_mip_indices(&self) -> Vec<(usize, usize)> {
        self.entries
            .iter()
            .enumerate()
            .flat_map(|(texture_index, entry)| {
                entry
                    .populated_mips()
                    .iter()
                    .enumerate()
                    .filter(|(_, mip)| !mip.is_external())
                    .map(move |(mip_index, _)| (texture_index, mip_index))
            })
            .collect()
    }

    fn mip_entry(&self, texture_index: usize, mip_index: usize) -> Result<MipEntry> {
        let entry = self
            .entries
            .get(texture_index)
            .ok_or(BtpError::TextureIndexOutOfRange(texture_index))?;
        entry
            .populated_mips()
            .get(mip_index)
            .copied()
            .ok_or(BtpError::MipIndexOutOfRange {
                texture_index,
                mip_index,
            })
    }

    /// Load the stored bytes of a package-embedded mip, without decompressing.
    pub fn load_mip_raw(&mut self, texture_index: usize, mip_index: usize) -> Result<Box<[u8]>> {
        let mip = self.mip_entry(texture_index, mip_index)?;
        if mip.is_external() {
            return Err(BtpError::ExternalMip {
                texture_index,
                mip_index,
            });
        }

        let end = mip
            .data_offset
            .checked_add(u64::from(mip.compressed_size))
            .ok_or_else(|| {
                BtpError::Malformed(format!(
                    "texture {} mip {} payload at {} overflows the file",
                    texture_index, mip_index, mip.data_offset
                ))
            })?;
        if mip.data_offset < self.data_start || end > self.header.tfc_table_offset {
            return Err(BtpError::Malformed(format!(
                "texture {} mip {} payload {}..{} lies outside the data segment {}..{}",
                texture_index,
                mip_index,
                mip.data_offset,
                end,
                self.data_start,
                self.header.tfc_table_offset
            )));
        }

        let mut data = vec![0; mip.compressed_size as usize];
        self.source.seek(SeekFrom::Start(mip.data_offset))?;
        self.source.read_exact(&mut data)?;
        Ok(data.into_boxed_slice())
    }

    /// Load a package-embedded mip, decompressed and checked against its uncompressed size.
    pub fn load_mip(&mut self, texture_index: usize, mip_index: usize) -> Result<Box<[u8]>> {
        if let Some(data) = self.payloads.get(&(texture_index, mip_index)) {
            return Ok(data.clone());
        }
        self.read_mip(texture_index, mip_index)
    }

    fn read_mip(&mut self, texture_index: usize, mip_index: usize) -> Result<Box<[u8]>> {
        let mip = self.mip_entry(texture_index, mip_index)?;
        let raw = self.load_mip_raw(texture_index, mip_index)?;

        let data = if mip.is_compressed() {
            match self.codec.decompress(&raw, mip.uncompressed_size as usize) {
                Ok(data) => data.into_boxed_slice(),
                Err(BtpError::Compression(reason)) => {
                    tracing::debug!(
                        "Texture {} mip {} failed to decompress: {}",
                        texture_index,
                        mip_index,
                        reason
                    );
                    return Err(BtpError::CorruptPayload {
                        texture_index,
                        mip_index,
                        expected: mip.uncompressed_size,
                        actual: 0,
                    });
                }
                Err(e) => return Err(e),
            }
        } else {
            raw
        };

        if data.len() != mip.uncompressed_size as usize {
            return Err(BtpError::CorruptPayload {
                texture_index,
                mip_index,
                expected: mip.uncompressed_size,
                actual: data.len(),
            });
        }

        Ok(data)
    }

    /// Load every package-embedded mip and check its size. Returns the number of mips checked.
    pub fn verify(&mut self) -> Result<usize> {
        let indices = self.package_mip_indices();
        for &(texture_index, mip_index) in &indices {
            if !self.payloads.contains_key(&(texture_index, mip_index)) {
                self.read_mip(texture_index, mip_index)?;
            }
        }
        Ok(indices.len())
    }

    pub fn into_inner(self) -> TSource {
        self.source
    }
}

fn read_header<R: Read + Seek>(reader: &mut R) -> Result<BtpHeader> {
    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic)?;
    if magic != BTP_MAGIC {
        return Err(BtpError::InvalidMagic(magic));
    }

    let version = reader.read_u16::<LE>()?;
    if !(BTP_MIN_VERSION..=BTP_VERSION).contains(&version) {
        return Err(BtpError::UnsupportedVersion(version));
    }

    reader.seek(SeekFrom::Start(0))?;
    Ok(BtpHeader::read(reader)?)
}

fn read_tfc_table<R: Read + Seek>(reader: &mut R, count: u32) -> Result<Vec<TfcEntry>> {
    let mut tfc_table = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        tfc_table.push(TfcEntry::read(reader)?);
    }

    match tfc_table.first() {
        Some(sentinel) if sentinel.is_sentinel() => Ok(tfc_table),
        Some(entry) => Err(BtpError::Malformed(format!(
            "TFC table index 0 is '{}' instead of the sentinel",
            entry.name
        ))),
        None => Err(BtpError::Malformed("TFC table is empty".to_string())),
    }
}

fn read_entries<R: Read + Seek>(
    reader: &mut R,
    count: u32,
    tfc_count: usize,
) -> Result<Vec<TextureEntry>> {
    let mut entries = Vec::with_capacity(count.min(4096) as usize);
    for texture_index in 0..count as usize {
        let entry = TextureEntry::read(reader)?;

        let populated = usize::from(entry.populated_mip_count);
        if populated == 0 || populated > MAX_MIPS {
            return Err(BtpError::Malformed(format!(
                "texture {} ('{}') has {} populated mips",
                texture_index, entry.path, populated
            )));
        }

        if usize::try_from(entry.tfc_index).map_or(true, |index| index >= tfc_count) {
            return Err(BtpError::DanglingTfcReference {
                texture_index,
                index: entry.tfc_index,
                count: tfc_count,
            });
        }

        for (mip_index, mip) in entry.populated_mips().iter().enumerate() {
            if let Some(field) = mip.first_zero_field() {
                return Err(BtpError::Malformed(format!(
                    "texture {} ('{}') mip {} has a zero {}",
                    texture_index, entry.path, mip_index, field
                )));
            }
        }

        entries.push(entry);
    }
    Ok(entries)
}
