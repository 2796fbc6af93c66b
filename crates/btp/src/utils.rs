use byteorder::WriteBytesExt;
use std::io::{self, Seek, Write};
use xxhash_rust::{xxh3, xxh32};

/// Hash a target name (e.g. game + container identity) using xxhash32.
pub fn hash_target_name(name: &str) -> u32 {
    xxh32::xxh32(name.to_lowercase().as_bytes(), 0)
}

/// Fingerprint of a mip payload, computed over the exact bytes written to disk.
pub fn fingerprint_payload(payload: &[u8]) -> u64 {
    xxh3::xxh3_64(payload)
}

/// Number of UTF-16 code units `s` occupies.
pub fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Encode `s` into a null-terminated, zero-padded UTF-16 field of `N` units.
///
/// Input longer than `N - 1` units is truncated; callers validate lengths first.
pub fn encode_utf16_fixed<const N: usize>(s: &str) -> [u16; N] {
    let mut field = [0u16; N];
    for (slot, unit) in field.iter_mut().take(N - 1).zip(s.encode_utf16()) {
        *slot = unit;
    }
    field
}

/// Decode a null-terminated UTF-16 field. Invalid surrogates are replaced.
pub fn decode_utf16_fixed(field: &[u16]) -> String {
    let end = field.iter().position(|&c| c == 0).unwrap_or(field.len());
    String::from_utf16_lossy(&field[..end])
}

/// Round `offset` up to the next multiple of `alignment`.
pub fn align_up(offset: u64, alignment: u64) -> u64 {
    offset.div_ceil(alignment) * alignment
}

/// Pad the stream with zeros up to the next multiple of `alignment` and return the new position.
pub fn write_alignment<W: Write + Seek>(writer: &mut W, alignment: u64) -> io::Result<u64> {
    let current_pos = writer.stream_position()?;
    let aligned = align_up(current_pos, alignment);
    for _ in current_pos..aligned {
        writer.write_u8(0)?;
    }
    Ok(aligned)
}
