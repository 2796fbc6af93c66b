//! Binary Texture Package (`.btp`) compiler and reader.
//!
//! A package carries texture overrides for one target: a fixed header, one fixed-size entry per
//! texture, the mip payloads that live inside the package and a table of the external texture
//! file caches (TFCs) the remaining mips are streamed from.
//!
//! ```text
//! +--------+------------------------+-----------+-----------+
//! | header | entry table (836 each) | mip data  | TFC table |
//! +--------+------------------------+-----------+-----------+
//! ```
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use btp::{BtpBuilder, BtpPackage, Compression, MemoryMipSource, MipDescriptor, PixelFormat, TextureOverride};
//!
//! let mut cursor = Cursor::new(Vec::new());
//! BtpBuilder::default()
//!     .with_target_name("BioGame/CookedPCConsole/Startup.pcc")
//!     .with_compression(Compression::None)
//!     .with_texture(
//!         TextureOverride::new("Tex.A", PixelFormat::DXT1).with_mip(MipDescriptor::package(4, 4, 8)),
//!     )
//!     .build_to_writer(&mut cursor, MemoryMipSource::new().with_mip("Tex.A", 0, vec![0; 8]))?;
//!
//! cursor.set_position(0);
//! let mut package = BtpPackage::mount_from_reader(cursor)?;
//! assert_eq!(package.load_mip(0, 0)?.len(), 8);
//! # Ok::<(), btp::BtpError>(())
//! ```

pub mod builder;
pub mod codec;
pub mod dedup;
pub mod entry;
mod error;
pub mod format;
pub mod header;
pub mod mip;
mod read;
pub mod tfc;
pub mod utils;
pub mod writer;

#[cfg(test)]
mod tests;

pub use builder::BtpBuilder;
pub use codec::{Compression, MipCodec};
pub use dedup::{DedupStats, MipDedupStore, MipLocation};
pub use entry::{
    MipDescriptor, MipStorage, TextureEntry, TextureOverride, TfcReference, MAX_DATA_OFFSET,
    MAX_DIMENSION, MAX_MIPS, MAX_MIP_SIZE,
};
pub use error::{BtpError, Result};
pub use format::PixelFormat;
pub use header::{BtpHeader, BTP_MAGIC, BTP_MIN_VERSION, BTP_VERSION};
pub use mip::{MipEntry, MipFlags};
pub use read::{BtpPackage, ReadOptions};
pub use tfc::{TfcEntry, TfcTable, NO_TFC_INDEX};
pub use utils::*;
pub use writer::{BtpWriter, CompileOptions, CompileReport, MemoryMipSource, MipSource, WriterState};

/// Conventional file extension of texture packages.
pub const BTP_EXTENSION: &str = "btp";
