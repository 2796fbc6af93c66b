use std::collections::HashMap;

/// Location of a payload already committed to the data segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MipLocation {
    pub offset: u64,
    pub compressed_size: u32,
}

/// Statistics collected by a [`MipDedupStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DedupStats {
    /// Payload bytes considered for writing.
    pub input_bytes: u64,
    /// Payload bytes actually written.
    pub output_bytes: u64,
    /// Payload bytes skipped because an identical payload was already written.
    pub saved_bytes: u64,
    /// Number of mips that reused an existing payload.
    pub deduplicated_mips: usize,
}

/// Maps payload fingerprints to the location they were first written at.
///
/// The fingerprint covers the exact bytes written (after compression), so two mips only
/// share storage when their on-disk payloads are identical. Lives for one compile.
#[derive(Debug, Clone, Default)]
pub struct MipDedupStore {
    locations: HashMap<u64, MipLocation>,
    stats: DedupStats,
}

impl MipDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a previously written payload. Hits with a different size are treated as misses.
    pub fn try_reuse(&self, fingerprint: u64, size: usize) -> Option<MipLocation> {
        self.locations
            .get(&fingerprint)
            .filter(|location| location.compressed_size as usize == size)
            .copied()
    }

    /// Remember where a payload was written. The first registration of a fingerprint wins.
    pub fn register(&mut self, fingerprint: u64, location: MipLocation) {
        self.locations.entry(fingerprint).or_insert(location);
    }

    pub(crate) fn record_written(&mut self, size: usize) {
        self.stats.input_bytes += size as u64;
        self.stats.output_bytes += size as u64;
    }

    pub(crate) fn record_reused(&mut self, size: usize) {
        self.stats.input_bytes += size as u64;
        self.stats.saved_bytes += size as u64;
        self.stats.deduplicated_mips += 1;
    }

    pub fn stats(&self) -> DedupStats {
        self.stats
    }

    /// Number of distinct payloads registered.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}
