use binrw::binrw;
use bitflags::bitflags;

bitflags! {
    /// Storage flags of a mip slot.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MipFlags: u32 {
        /// The mip is the game's original data, passed through unchanged.
        const UNMODIFIED = 0x1;
        /// The offset points into the texture file cache named by the entry.
        const EXTERNAL = 0x2;
        /// The payload is compressed and decompresses to `uncompressed_size` bytes.
        const COMPRESSED = 0x4;
    }
}

/// One mip slot of a [`TextureEntry`](crate::TextureEntry).
///
/// Slots past the entry's populated count are all zero.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MipEntry {
    pub uncompressed_size: u32,
    pub compressed_size: u32,
    pub data_offset: u64,
    pub width: u16,
    pub height: u16,
    #[br(map = |bits: u32| MipFlags::from_bits_retain(bits))]
    #[bw(map = |flags: &MipFlags| flags.bits())]
    pub flags: MipFlags,
}

impl MipEntry {
    pub fn size_of() -> usize {
        (std::mem::size_of::<u32>() * 2)
            + std::mem::size_of::<u64>()
            + (std::mem::size_of::<u16>() * 2)
            + std::mem::size_of::<u32>()
    }

    pub fn is_external(&self) -> bool {
        self.flags.contains(MipFlags::EXTERNAL)
    }

    pub fn is_compressed(&self) -> bool {
        self.flags.contains(MipFlags::COMPRESSED)
    }

    pub fn is_unmodified(&self) -> bool {
        self.flags.contains(MipFlags::UNMODIFIED)
    }

    /// Name of the first required field that is zero, if any.
    pub fn first_zero_field(&self) -> Option<&'static str> {
        if self.width == 0 {
            Some("width")
        } else if self.height == 0 {
            Some("height")
        } else if self.compressed_size == 0 {
            Some("compressed size")
        } else if self.data_offset == 0 {
            Some("data offset")
        } else {
            None
        }
    }
}
