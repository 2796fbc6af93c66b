use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::io::{Read, Write};

use crate::error::{BtpError, Result};

/// Compresses mip payloads before they are written and reverses it on read.
pub trait MipCodec: Send + Sync {
    /// Compress `data`. `Ok(None)` stores the payload as-is, without the compressed flag.
    fn compress(&self, data: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Decompress a payload that was stored with the compressed flag.
    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>>;
}

/// Built-in payload compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Compression {
    None,
    Zstd {
        #[serde(default = "Compression::default_zstd_level")]
        level: i32,
    },
}

impl Compression {
    pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

    fn default_zstd_level() -> i32 {
        Self::DEFAULT_ZSTD_LEVEL
    }
}

impl Default for Compression {
    fn default() -> Self {
        Compression::Zstd {
            level: Self::DEFAULT_ZSTD_LEVEL,
        }
    }
}

impl Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Zstd { level } => write!(f, "zstd (level {level})"),
        }
    }
}

impl MipCodec for Compression {
    fn compress(&self, data: &[u8]) -> Result<Option<Vec<u8>>> {
        match *self {
            Compression::None => Ok(None),
            Compression::Zstd { level } => compress_zstd(data, level).map(Some),
        }
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        match self {
            Compression::None => Err(BtpError::Compression(
                "payload is flagged as compressed but no codec is configured".to_string(),
            )),
            Compression::Zstd { .. } => decompress_zstd(data, expected_size),
        }
    }
}

/// Compress data using Zstd compression.
pub fn compress_zstd(data: &[u8], level: i32) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = zstd::Encoder::new(std::io::BufWriter::new(&mut out), level)?;
    encoder.write_all(data)?;
    encoder.finish()?.flush()?;
    Ok(out)
}

/// Decompress a Zstd frame.
///
/// At most `expected_size + 1` bytes are produced, so an oversized frame shows up as a length
/// mismatch without decoding the whole frame. Callers verify the length.
pub fn decompress_zstd(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let decoder = zstd::Decoder::new(data)
        .map_err(|e| BtpError::Compression(format!("zstd decoder init failed: {e}")))?;
    let mut out = Vec::with_capacity(expected_size);
    decoder
        .take(expected_size as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| BtpError::Compression(format!("zstd decompression failed: {e}")))?;
    Ok(out)
}
