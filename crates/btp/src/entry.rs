use binrw::binrw;
use uuid::Uuid;

use crate::{
    error::{BtpError, Result},
    mip::{MipEntry, MipFlags},
    utils::{decode_utf16_fixed, encode_utf16_fixed, utf16_len},
    PixelFormat,
};

/// Number of mip slots in every texture entry.
pub const MAX_MIPS: usize = 13;

/// Width of the path field in UTF-16 code units, terminator included.
pub const PATH_FIELD_UNITS: usize = 256;

/// Longest path that fits the path field.
pub const MAX_PATH_LEN: usize = PATH_FIELD_UNITS - 1;

/// Largest width or height the signed 16-bit wire field holds.
pub const MAX_DIMENSION: u16 = i16::MAX as u16;

/// Largest mip size the signed 32-bit wire fields hold.
pub const MAX_MIP_SIZE: u32 = i32::MAX as u32;

/// Largest data offset the signed 64-bit wire field holds.
pub const MAX_DATA_OFFSET: u64 = i64::MAX as u64;

/// Reference from a texture to the texture file cache its external mips live in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TfcReference {
    pub name: String,
    pub guid: Uuid,
}

impl TfcReference {
    pub fn new(name: impl Into<String>, guid: Uuid) -> Self {
        Self {
            name: name.into(),
            guid,
        }
    }
}

/// Where the bytes of a mip live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MipStorage {
    /// Produced by the byte source and embedded in the package.
    #[default]
    Package,
    /// Already present in the texture file cache referenced by the texture.
    External {
        offset: u64,
        compressed_size: u32,
        compressed: bool,
        unmodified: bool,
    },
}

impl MipStorage {
    pub fn is_external(&self) -> bool {
        matches!(self, MipStorage::External { .. })
    }
}

/// Describes one mip of a texture override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MipDescriptor {
    pub width: u16,
    pub height: u16,
    pub uncompressed_size: u32,
    pub storage: MipStorage,
}

impl MipDescriptor {
    /// A mip whose bytes are embedded in the package.
    pub fn package(width: u16, height: u16, uncompressed_size: u32) -> Self {
        Self {
            width,
            height,
            uncompressed_size,
            storage: MipStorage::Package,
        }
    }

    /// A mip whose bytes stay in the texture file cache.
    pub fn external(
        width: u16,
        height: u16,
        uncompressed_size: u32,
        offset: u64,
        compressed_size: u32,
    ) -> Self {
        Self {
            width,
            height,
            uncompressed_size,
            storage: MipStorage::External {
                offset,
                compressed_size,
                compressed: compressed_size != uncompressed_size,
                unmodified: false,
            },
        }
    }

    fn pixel_area(&self) -> u32 {
        u32::from(self.width) * u32::from(self.height)
    }
}

/// A texture override record: the logical form of one entry in the package.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextureOverride {
    /// Full path of the texture being overridden.
    pub path: String,
    /// Texture file cache holding this texture's external mips, if any.
    pub tfc: Option<TfcReference>,
    pub format: PixelFormat,
    pub srgb: bool,
    pub lod_bias: u8,
    pub never_stream: bool,
    /// Mips in slot order, largest first by convention.
    pub mips: Vec<MipDescriptor>,
}

impl TextureOverride {
    pub fn new(path: impl Into<String>, format: PixelFormat) -> Self {
        Self {
            path: path.into(),
            format,
            ..Default::default()
        }
    }

    pub fn with_tfc(mut self, tfc: TfcReference) -> Self {
        self.tfc = Some(tfc);
        self
    }

    pub fn with_srgb(mut self, srgb: bool) -> Self {
        self.srgb = srgb;
        self
    }

    pub fn with_lod_bias(mut self, lod_bias: u8) -> Self {
        self.lod_bias = lod_bias;
        self
    }

    pub fn with_never_stream(mut self, never_stream: bool) -> Self {
        self.never_stream = never_stream;
        self
    }

    pub fn with_mip(mut self, mip: MipDescriptor) -> Self {
        self.mips.push(mip);
        self
    }

    /// Check that the record can be turned into an entry.
    pub fn validate(&self) -> Result<()> {
        let path_len = utf16_len(&self.path);
        if path_len > MAX_PATH_LEN {
            return Err(BtpError::PathTooLong {
                path: self.path.clone(),
                len: path_len,
                max: MAX_PATH_LEN,
            });
        }
        if path_len == 0 {
            return Err(BtpError::InvalidMip {
                path: self.path.clone(),
                mip_index: 0,
                reason: "texture path is empty",
            });
        }
        if self.path.contains('\0') {
            return Err(BtpError::NulInName {
                name: self.path.clone(),
            });
        }

        if self.mips.is_empty() || self.mips.len() > MAX_MIPS {
            return Err(BtpError::InvalidMipCount {
                path: self.path.clone(),
                count: self.mips.len(),
                max: MAX_MIPS,
            });
        }

        for (mip_index, mip) in self.mips.iter().enumerate() {
            let invalid = |reason| BtpError::InvalidMip {
                path: self.path.clone(),
                mip_index,
                reason,
            };

            if mip.width == 0 || mip.height == 0 {
                return Err(invalid("zero dimension"));
            }
            if mip.width > MAX_DIMENSION || mip.height > MAX_DIMENSION {
                return Err(invalid("dimension does not fit a signed 16-bit field"));
            }
            if mip.uncompressed_size == 0 {
                return Err(invalid("zero uncompressed size"));
            }
            if mip.uncompressed_size > MAX_MIP_SIZE {
                return Err(invalid("uncompressed size does not fit a signed 32-bit field"));
            }
            match mip.storage {
                MipStorage::Package => {}
                MipStorage::External { .. } if !self.has_external_cache() => {
                    return Err(BtpError::MissingTfcReference {
                        path: self.path.clone(),
                    });
                }
                MipStorage::External {
                    offset,
                    compressed_size,
                    compressed,
                    ..
                } => {
                    if compressed_size > MAX_MIP_SIZE {
                        return Err(invalid("compressed size does not fit a signed 32-bit field"));
                    }
                    if offset > MAX_DATA_OFFSET {
                        return Err(invalid("offset does not fit a signed 64-bit field"));
                    }
                    if !compressed && compressed_size != mip.uncompressed_size {
                        return Err(invalid("uncompressed external mip with mismatched sizes"));
                    }
                }
            }
        }

        Ok(())
    }

    /// Whether the texture names a real cache. An empty name is the sentinel, not a cache.
    fn has_external_cache(&self) -> bool {
        self.tfc.as_ref().is_some_and(|tfc| !tfc.name.is_empty())
    }

    /// Slot indices ordered largest mip first. Equal sizes keep slot order.
    pub fn processing_order(&self) -> Vec<usize> {
        let mut order = (0..self.mips.len()).collect::<Vec<_>>();
        order.sort_by_key(|&index| std::cmp::Reverse(self.mips[index].pixel_area()));
        order
    }

    pub fn has_external_mips(&self) -> bool {
        self.mips.iter().any(|mip| mip.storage.is_external())
    }
}

/// The fixed-size on-disk form of a texture override.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextureEntry {
    #[br(map = |raw: [u16; PATH_FIELD_UNITS]| decode_utf16_fixed(&raw))]
    #[bw(map = |path: &String| encode_utf16_fixed::<PATH_FIELD_UNITS>(path))]
    pub path: String,

    /// Index into the package's TFC table. 0 means no external cache.
    pub tfc_index: i32,
    pub format: PixelFormat,

    #[br(map = |raw: u8| raw != 0)]
    #[bw(map = |srgb: &bool| u8::from(*srgb))]
    pub srgb: bool,
    pub lod_bias: u8,
    #[br(map = |raw: u8| raw != 0)]
    #[bw(map = |never_stream: &bool| u8::from(*never_stream))]
    pub never_stream: bool,
    pub populated_mip_count: u8,

    pub mips: [MipEntry; MAX_MIPS],
}

impl TextureEntry {
    pub fn size_of() -> usize {
        (PATH_FIELD_UNITS * std::mem::size_of::<u16>())
            + (std::mem::size_of::<i32>() * 2)
            + 4
            + (MAX_MIPS * MipEntry::size_of())
    }

    /// Build the entry for `texture` with every populated slot carrying its dimensions and
    /// uncompressed size. Offsets, compressed sizes and flags are filled in by the writer.
    pub(crate) fn from_override(texture: &TextureOverride, tfc_index: i32) -> Self {
        let mut mips = [MipEntry::default(); MAX_MIPS];
        for (slot, mip) in mips.iter_mut().zip(&texture.mips) {
            slot.width = mip.width;
            slot.height = mip.height;
            slot.uncompressed_size = mip.uncompressed_size;
        }

        Self {
            path: texture.path.clone(),
            tfc_index,
            format: texture.format,
            srgb: texture.srgb,
            lod_bias: texture.lod_bias,
            never_stream: texture.never_stream,
            populated_mip_count: texture.mips.len() as u8,
            mips,
        }
    }

    /// The meaningful mip slots.
    pub fn populated_mips(&self) -> &[MipEntry] {
        let count = usize::from(self.populated_mip_count).min(MAX_MIPS);
        &self.mips[..count]
    }

    /// Check the invariants every finalized entry must satisfy.
    pub fn validate_finalized(&self) -> Result<()> {
        let count = usize::from(self.populated_mip_count);
        if count == 0 || count > MAX_MIPS {
            return Err(BtpError::InvalidMipCount {
                path: self.path.clone(),
                count,
                max: MAX_MIPS,
            });
        }

        for (mip_index, mip) in self.populated_mips().iter().enumerate() {
            if let Some(field) = mip.first_zero_field() {
                return Err(BtpError::InvariantViolation {
                    path: self.path.clone(),
                    mip_index,
                    field,
                });
            }
        }

        Ok(())
    }

    /// Project the entry back into its logical record.
    pub fn to_override(&self, tfc: Option<TfcReference>) -> TextureOverride {
        let mips = self
            .populated_mips()
            .iter()
            .map(|mip| MipDescriptor {
                width: mip.width,
                height: mip.height,
                uncompressed_size: mip.uncompressed_size,
                storage: if mip.is_external() {
                    MipStorage::External {
                        offset: mip.data_offset,
                        compressed_size: mip.compressed_size,
                        compressed: mip.is_compressed(),
                        unmodified: mip.is_unmodified(),
                    }
                } else {
                    MipStorage::Package
                },
            })
            .collect();

        TextureOverride {
            path: self.path.clone(),
            tfc,
            format: self.format,
            srgb: self.srgb,
            lod_bias: self.lod_bias,
            never_stream: self.never_stream,
            mips,
        }
    }
}

/// Flags the writer assigns to a mip given its storage and whether the payload was compressed.
pub(crate) fn storage_flags(storage: &MipStorage, compressed_payload: bool) -> MipFlags {
    match *storage {
        MipStorage::Package => {
            if compressed_payload {
                MipFlags::COMPRESSED
            } else {
                MipFlags::empty()
            }
        }
        MipStorage::External {
            compressed,
            unmodified,
            ..
        } => {
            let mut flags = MipFlags::EXTERNAL;
            flags.set(MipFlags::COMPRESSED, compressed);
            flags.set(MipFlags::UNMODIFIED, unmodified);
            flags
        }
    }
}
