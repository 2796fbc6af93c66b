//! Error types for compiling and reading texture packages.
//!
//! All fallible functions in this crate return [`Result<T>`], which uses [`BtpError`]
//! as the error type. `std::io::Error` and `binrw::Error` are converted via `From`.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BtpError>;

/// Errors that can occur while compiling or reading a texture package.
#[derive(Error, Debug)]
pub enum BtpError {
    /// Reading from or writing to the underlying stream failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A fixed-size structure could not be encoded or decoded.
    #[error("binrw error: {0}")]
    BinRw(#[from] binrw::Error),

    /// The byte source could not produce the bytes of a package-stored mip.
    #[error("source asset missing for '{path}' (mip {mip_index})")]
    SourceAssetMissing { path: String, mip_index: usize },

    /// A texture file cache name does not fit the 63 character name field.
    #[error("TFC name '{name}' is {len} UTF-16 units long (max {max})")]
    NameTooLong { name: String, len: usize, max: usize },

    /// A texture path does not fit the 255 character path field.
    #[error("texture path '{path}' is {len} UTF-16 units long (max {max})")]
    PathTooLong { path: String, len: usize, max: usize },

    /// A texture path or TFC name contains a NUL character, which terminates the wire field.
    #[error("'{name}' contains a NUL character")]
    NulInName { name: String },

    /// A texture has no mips, or more mips than an entry has slots.
    #[error("texture '{path}' has {count} mips (expected 1..={max})")]
    InvalidMipCount { path: String, count: usize, max: usize },

    /// A mip descriptor was rejected before anything was written for it.
    #[error("texture '{path}' mip {mip_index} is invalid: {reason}")]
    InvalidMip {
        path: String,
        mip_index: usize,
        reason: &'static str,
    },

    /// A texture stores mips externally but names no texture file cache.
    #[error("texture '{path}' has externally stored mips but no TFC reference")]
    MissingTfcReference { path: String },

    /// The byte source returned a different number of bytes than the mip declares.
    #[error("texture '{path}' mip {mip_index}: expected {expected} bytes, source produced {actual}")]
    MipSizeMismatch {
        path: String,
        mip_index: usize,
        expected: u32,
        actual: usize,
    },

    /// A populated mip slot reached finalization with a zero-valued required field.
    #[error("texture '{path}' mip {mip_index} has a zero {field} after finalization")]
    InvariantViolation {
        path: String,
        mip_index: usize,
        field: &'static str,
    },

    /// A writer operation was called out of order.
    #[error("writer is in state {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: crate::writer::WriterState,
        actual: crate::writer::WriterState,
    },

    /// The codec failed to compress or decompress a payload.
    #[error("compression error: {0}")]
    Compression(String),

    /// The file does not start with the package magic.
    #[error("invalid magic: {0:02x?}")]
    InvalidMagic([u8; 6]),

    /// The file was written by a newer (or nonsensical) format revision.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u16),

    /// The file is structurally inconsistent.
    #[error("malformed package: {0}")]
    Malformed(String),

    /// A payload did not decode to the size its mip entry declares. `actual` is 0 when the
    /// payload does not decode at all.
    #[error("corrupt payload for texture {texture_index} mip {mip_index}: expected {expected} bytes, got {actual}")]
    CorruptPayload {
        texture_index: usize,
        mip_index: usize,
        expected: u32,
        actual: usize,
    },

    /// A texture entry references a TFC table index that does not exist.
    #[error("texture {texture_index} references TFC index {index}, table has {count} entries")]
    DanglingTfcReference {
        texture_index: usize,
        index: i32,
        count: usize,
    },

    /// The payload of an externally stored mip is not part of this file.
    #[error("texture {texture_index} mip {mip_index} is stored in an external cache")]
    ExternalMip {
        texture_index: usize,
        mip_index: usize,
    },

    #[error("texture index {0} out of range")]
    TextureIndexOutOfRange(usize),

    #[error("mip index {mip_index} out of range for texture {texture_index}")]
    MipIndexOutOfRange {
        texture_index: usize,
        mip_index: usize,
    },
}
