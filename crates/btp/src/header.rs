use binrw::binrw;

/// Magic bytes every package starts with.
pub const BTP_MAGIC: [u8; 6] = *b"BTPTEX";

/// Format revision written by this crate.
pub const BTP_VERSION: u16 = 2;

/// Oldest format revision the reader accepts.
pub const BTP_MIN_VERSION: u16 = 1;

/// The package header.
///
/// The counts and the TFC table offset are not known until every texture has been
/// written; the writer reserves the header up front and rewrites it when finalizing.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BtpHeader {
    pub magic: [u8; 6],
    pub version: u16,
    /// Fingerprint of the logical owner (game + container) the package applies to.
    pub target_hash: u32,
    pub texture_count: u32,
    pub tfc_table_count: u32,
    pub tfc_table_offset: u64,
    /// Not present in version 1 headers.
    #[br(if(version >= 2))]
    pub reserved: u32,
}

impl Default for BtpHeader {
    fn default() -> Self {
        Self {
            magic: BTP_MAGIC,
            version: BTP_VERSION,
            target_hash: 0,
            texture_count: 0,
            tfc_table_count: 0,
            tfc_table_offset: 0,
            reserved: 0,
        }
    }
}

impl BtpHeader {
    pub fn new(target_hash: u32) -> Self {
        Self {
            target_hash,
            ..Default::default()
        }
    }

    /// Size of the current header revision.
    pub fn size_of() -> usize {
        Self::size_of_version(BTP_VERSION)
    }

    /// Size of the header as written by `version`. The entry table follows it directly.
    pub fn size_of_version(version: u16) -> usize {
        let size = 6
            + std::mem::size_of::<u16>()
            + (std::mem::size_of::<u32>() * 3)
            + std::mem::size_of::<u64>();
        if version >= 2 {
            size + std::mem::size_of::<u32>()
        } else {
            size
        }
    }
}
