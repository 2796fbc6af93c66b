use camino::Utf8Path;
use std::io::{self, BufWriter, Write};

use crate::{
    codec::Compression,
    entry::TextureOverride,
    error::{BtpError, Result},
    hash_target_name,
    writer::{BtpWriter, CompileOptions, CompileReport, MipSource},
};

/// Collects texture overrides and compiles them into a package in one call.
#[derive(Debug, Clone, Default)]
pub struct BtpBuilder {
    pub options: CompileOptions,
    pub textures: Vec<TextureOverride>,
}

impl BtpBuilder {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            textures: Vec::new(),
        }
    }

    pub fn with_target_hash(mut self, target_hash: u32) -> Self {
        self.options.target_hash = target_hash;
        self
    }

    /// Set the target hash from the owner's name, see [`hash_target_name`].
    pub fn with_target_name(self, name: &str) -> Self {
        self.with_target_hash(hash_target_name(name))
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.options.compression = compression;
        self
    }

    /// Add a texture. Entries are written in the order they were added.
    pub fn with_texture(mut self, texture: TextureOverride) -> Self {
        self.textures.push(texture);
        self
    }

    pub fn with_textures(mut self, textures: impl IntoIterator<Item = TextureOverride>) -> Self {
        self.textures.extend(textures);
        self
    }

    /// Build the package and write it to the given writer.
    ///
    /// * `writer` - The writer to write the package to.
    /// * `source` - Provides the raw bytes of every package-stored mip.
    pub fn build_to_writer<TWriter: io::Write + io::Seek, TSource: MipSource>(
        &self,
        writer: &mut TWriter,
        mut source: TSource,
    ) -> Result<CompileReport> {
        let texture_count = u32::try_from(self.textures.len())
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} textures do not fit a package", self.textures.len()),
                )
            })?;

        let mut writer = BtpWriter::new(BufWriter::new(writer), self.options);
        writer.reserve(texture_count)?;
        for texture in &self.textures {
            writer.write_texture(texture, &mut source)?;
        }
        writer.write_tfc_table()?;
        writer.finalize()
    }

    /// Build the package at `path`.
    ///
    /// The package is written to a temporary file next to `path` and only renamed into
    /// place once it is complete; on failure no file is left at `path`.
    pub fn build_to_path<TSource: MipSource>(
        &self,
        path: &Utf8Path,
        source: TSource,
    ) -> Result<CompileReport> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        let report = self.build_to_writer(file.as_file_mut(), source)?;
        file.as_file_mut().flush()?;
        file.persist(path).map_err(|e| BtpError::Io(e.error))?;

        tracing::info!("Wrote texture package to {}", path);
        Ok(report)
    }
}
