use std::{collections::HashMap, io};

use btp::{
    hash_target_name, CompileOptions, Compression, MipDescriptor, MipSource, MipStorage,
    PixelFormat, TextureOverride, TfcReference,
};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::CliError;

/// The `btp.toml` build manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BtpManifest {
    /// Owner name, hashed into the target hash.
    pub target: Option<String>,
    pub target_hash: Option<u32>,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default, rename = "texture")]
    pub textures: Vec<ManifestTexture>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestTexture {
    pub path: String,
    pub format: ManifestFormat,
    #[serde(default)]
    pub srgb: bool,
    #[serde(default)]
    pub lod_bias: u8,
    #[serde(default)]
    pub never_stream: bool,
    pub tfc: Option<ManifestTfc>,
    #[serde(default, rename = "mip")]
    pub mips: Vec<ManifestMip>,
}

/// A pixel format given by name or raw value.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ManifestFormat {
    Raw(i32),
    Name(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestTfc {
    pub name: String,
    pub guid: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestMip {
    pub width: u16,
    pub height: u16,
    /// Package-stored mip data, relative to the manifest.
    pub file: Option<Utf8PathBuf>,
    /// Defaults to the size of `file` for package-stored mips.
    pub uncompressed_size: Option<u32>,
    pub external: Option<ManifestExternal>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestExternal {
    pub offset: u64,
    pub size: u32,
    /// Defaults to `size != uncompressed_size`.
    pub compressed: Option<bool>,
    #[serde(default)]
    pub unmodified: bool,
}

/// A manifest resolved against the filesystem, ready to compile.
#[derive(Debug, Clone)]
pub struct ResolvedManifest {
    pub options: CompileOptions,
    pub textures: Vec<TextureOverride>,
    pub source: FileMipSource,
}

/// Reads package-stored mips from the files named in the manifest.
///
/// A file that disappeared after the manifest was resolved is reported as a missing asset.
#[derive(Debug, Clone, Default)]
pub struct FileMipSource {
    files: HashMap<(String, usize), Utf8PathBuf>,
}

impl MipSource for FileMipSource {
    fn load_mip(
        &mut self,
        texture: &TextureOverride,
        mip_index: usize,
    ) -> io::Result<Option<Vec<u8>>> {
        let Some(path) = self.files.get(&(texture.path.clone(), mip_index)) else {
            return Ok(None);
        };

        match std::fs::read(path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

pub fn load_manifest(path: &Utf8Path) -> Result<ResolvedManifest, CliError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(CliError::ManifestNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    let manifest: BtpManifest =
        toml::from_str(&contents).map_err(|source| CliError::ManifestParseError { source })?;

    let base_dir = path.parent().unwrap_or(Utf8Path::new(""));
    resolve_manifest(manifest, base_dir)
}

/// Turn the manifest into texture overrides, resolving mip files relative to `base_dir`.
pub fn resolve_manifest(
    manifest: BtpManifest,
    base_dir: &Utf8Path,
) -> Result<ResolvedManifest, CliError> {
    let target_hash = match (&manifest.target, manifest.target_hash) {
        (Some(_), Some(_)) => return Err(CliError::AmbiguousTarget),
        (Some(target), None) => hash_target_name(target),
        (None, Some(hash)) => hash,
        (None, None) => return Err(CliError::MissingTarget),
    };

    let mut source = FileMipSource::default();
    let mut textures = Vec::with_capacity(manifest.textures.len());
    for texture in manifest.textures {
        textures.push(resolve_texture(texture, base_dir, &mut source)?);
    }

    Ok(ResolvedManifest {
        options: CompileOptions {
            target_hash,
            compression: manifest.compression,
        },
        textures,
        source,
    })
}

fn resolve_texture(
    texture: ManifestTexture,
    base_dir: &Utf8Path,
    source: &mut FileMipSource,
) -> Result<TextureOverride, CliError> {
    let format = match texture.format {
        ManifestFormat::Raw(value) => PixelFormat::from(value),
        ManifestFormat::Name(name) => {
            PixelFormat::from_name(&name).ok_or(CliError::UnknownPixelFormat { name })?
        }
    };

    let mut resolved = TextureOverride::new(texture.path.clone(), format)
        .with_srgb(texture.srgb)
        .with_lod_bias(texture.lod_bias)
        .with_never_stream(texture.never_stream);
    if let Some(tfc) = texture.tfc {
        resolved = resolved.with_tfc(TfcReference::new(tfc.name, tfc.guid));
    }

    for (mip_index, mip) in texture.mips.into_iter().enumerate() {
        let invalid = |reason| CliError::invalid_manifest_mip(&texture.path, mip_index, reason);

        let descriptor = match (mip.file, mip.external) {
            (Some(_), Some(_)) => return Err(invalid("both `file` and `external` are set")),
            (None, None) => return Err(invalid("neither `file` nor `external` is set")),
            (Some(file), None) => {
                let file = base_dir.join(file);
                let metadata = match std::fs::metadata(&file) {
                    Ok(metadata) => metadata,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        return Err(CliError::MipFileMissing { path: file })
                    }
                    Err(e) => return Err(e.into()),
                };
                let uncompressed_size = match mip.uncompressed_size {
                    Some(size) => size,
                    None => u32::try_from(metadata.len())
                        .map_err(|_| invalid("mip file is larger than 4 GiB"))?,
                };

                source.files.insert((texture.path.clone(), mip_index), file);
                MipDescriptor::package(mip.width, mip.height, uncompressed_size)
            }
            (None, Some(external)) => {
                let uncompressed_size = mip
                    .uncompressed_size
                    .ok_or_else(|| invalid("external mips need `uncompressed_size`"))?;
                MipDescriptor {
                    width: mip.width,
                    height: mip.height,
                    uncompressed_size,
                    storage: MipStorage::External {
                        offset: external.offset,
                        compressed_size: external.size,
                        compressed: external
                            .compressed
                            .unwrap_or(external.size != uncompressed_size),
                        unmodified: external.unmodified,
                    },
                }
            }
        };
        resolved = resolved.with_mip(descriptor);
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Utf8Path, name: &str, contents: &[u8]) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    fn temp_dir() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    const MANIFEST: &str = r#"
target = "BioGame/CookedPCConsole/Startup.pcc"
compression = { type = "none" }

[[texture]]
path = "BioA_Nor.Tex.A"
format = "PF_DXT5"
srgb = true
tfc = { name = "Textures_DLC", guid = "6f1e0c2a-44d1-4b8e-9a55-0d3c71e2f001" }

[[texture.mip]]
width = 64
height = 64
uncompressed_size = 4096
external = { offset = 4096, size = 1500 }

[[texture.mip]]
width = 32
height = 32
file = "mips/tex_a_1.bin"

[[texture]]
path = "BioA_Nor.Tex.B"
format = 7

[[texture.mip]]
width = 8
height = 8
file = "mips/tex_b_0.bin"
"#;

    #[test]
    fn test_load_manifest() {
        let (_guard, dir) = temp_dir();
        std::fs::create_dir(dir.join("mips")).unwrap();
        write(&dir, "mips/tex_a_1.bin", &[1; 1024]);
        write(&dir, "mips/tex_b_0.bin", &[2; 64]);
        write(&dir, "btp.toml", MANIFEST.as_bytes());

        let mut resolved = load_manifest(&dir.join("btp.toml")).unwrap();
        assert_eq!(
            resolved.options.target_hash,
            hash_target_name("BioGame/CookedPCConsole/Startup.pcc")
        );
        assert_eq!(resolved.options.compression, Compression::None);
        assert_eq!(resolved.textures.len(), 2);

        let tex_a = &resolved.textures[0];
        assert_eq!(tex_a.format, PixelFormat::DXT5);
        assert!(tex_a.srgb);
        assert_eq!(tex_a.tfc.as_ref().map(|tfc| tfc.name.as_str()), Some("Textures_DLC"));
        assert_eq!(
            tex_a.mips[0].storage,
            MipStorage::External {
                offset: 4096,
                compressed_size: 1500,
                compressed: true,
                unmodified: false,
            }
        );
        assert_eq!(tex_a.mips[1], MipDescriptor::package(32, 32, 1024));

        let tex_b = resolved.textures[1].clone();
        assert_eq!(tex_b.format, PixelFormat::DXT5);
        assert_eq!(
            resolved.source.load_mip(&tex_b, 0).unwrap(),
            Some(vec![2; 64])
        );
    }

    #[test]
    fn test_missing_mip_file() {
        let (_guard, dir) = temp_dir();
        write(&dir, "btp.toml", MANIFEST.as_bytes());

        assert!(matches!(
            load_manifest(&dir.join("btp.toml")),
            Err(CliError::MipFileMissing { .. })
        ));
    }

    #[test]
    fn test_file_removed_after_resolve_is_missing_asset() {
        let (_guard, dir) = temp_dir();
        std::fs::create_dir(dir.join("mips")).unwrap();
        write(&dir, "mips/tex_a_1.bin", &[1; 1024]);
        write(&dir, "mips/tex_b_0.bin", &[2; 64]);
        write(&dir, "btp.toml", MANIFEST.as_bytes());

        let mut resolved = load_manifest(&dir.join("btp.toml")).unwrap();
        std::fs::remove_file(dir.join("mips/tex_b_0.bin")).unwrap();

        let tex_b = resolved.textures[1].clone();
        assert_eq!(resolved.source.load_mip(&tex_b, 0).unwrap(), None);
    }

    #[test]
    fn test_target_is_required() {
        let manifest: BtpManifest = toml::from_str("").unwrap();
        assert!(matches!(
            resolve_manifest(manifest, Utf8Path::new(".")),
            Err(CliError::MissingTarget)
        ));

        let manifest: BtpManifest =
            toml::from_str("target = \"a\"\ntarget_hash = 0x1234abcd").unwrap();
        assert!(matches!(
            resolve_manifest(manifest, Utf8Path::new(".")),
            Err(CliError::AmbiguousTarget)
        ));
    }

    #[test]
    fn test_unknown_format_and_bad_mips() {
        let manifest: BtpManifest = toml::from_str(
            r#"
target_hash = 0x1234abcd

[[texture]]
path = "Tex"
format = "PF_Nope"
"#,
        )
        .unwrap();
        assert_eq!(manifest.target_hash, Some(0x1234abcd));
        assert!(matches!(
            resolve_manifest(manifest, Utf8Path::new(".")),
            Err(CliError::UnknownPixelFormat { .. })
        ));

        let manifest: BtpManifest = toml::from_str(
            r#"
target_hash = 1

[[texture]]
path = "Tex"
format = "DXT1"

[[texture.mip]]
width = 4
height = 4
external = { offset = 16, size = 8 }
"#,
        )
        .unwrap();
        assert!(matches!(
            resolve_manifest(manifest, Utf8Path::new(".")),
            Err(CliError::InvalidManifestMip { mip_index: 0, .. })
        ));
    }
}
