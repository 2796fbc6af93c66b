use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Manifest not found: {path}")]
    #[diagnostic(
        code(manifest::not_found),
        help("Pass the path of a btp.toml manifest with --manifest")
    )]
    ManifestNotFound { path: Utf8PathBuf },

    #[error("Manifest file error")]
    #[diagnostic(
        code(manifest::parse_error),
        help("Check your btp.toml file for syntax errors")
    )]
    ManifestParseError {
        #[source]
        source: toml::de::Error,
    },

    #[error("Manifest has no target")]
    #[diagnostic(
        code(manifest::missing_target),
        help("Set either `target` (the owner name, hashed) or `target_hash` at the top of the manifest")
    )]
    MissingTarget,

    #[error("Manifest sets both `target` and `target_hash`")]
    #[diagnostic(
        code(manifest::ambiguous_target),
        help("Keep only one of `target` or `target_hash`")
    )]
    AmbiguousTarget,

    #[error("Unknown pixel format: {name}")]
    #[diagnostic(
        code(manifest::unknown_format),
        help("Use a format name such as PF_DXT1, PF_DXT5 or PF_A8R8G8B8, or the raw integer value")
    )]
    UnknownPixelFormat { name: String },

    #[error("Texture '{path}' mip {mip_index}: {reason}")]
    #[diagnostic(
        code(manifest::invalid_mip),
        help("Every mip needs either `file` (stored in the package) or `external` plus `uncompressed_size`")
    )]
    InvalidManifestMip {
        path: String,
        mip_index: usize,
        reason: &'static str,
    },

    #[error("Mip file not found: {path}")]
    #[diagnostic(
        code(file::not_found),
        help("Mip files are resolved relative to the manifest's directory")
    )]
    MipFileMissing { path: Utf8PathBuf },

    #[error("Texture package error")]
    #[diagnostic(code(btp::error))]
    Package {
        #[from]
        source: btp::BtpError,
    },

    #[error("IO operation failed")]
    #[diagnostic(code(io::operation_failed))]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl CliError {
    pub fn invalid_manifest_mip(path: &str, mip_index: usize, reason: &'static str) -> Self {
        Self::InvalidManifestMip {
            path: path.to_string(),
            mip_index,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_package_errors_keep_code_and_source() {
        let error = CliError::from(btp::BtpError::MissingTfcReference {
            path: "BioA_Nor.Tex.A".to_string(),
        });
        assert_eq!(error.code().unwrap().to_string(), "btp::error");
        assert!(error
            .source()
            .unwrap()
            .to_string()
            .contains("BioA_Nor.Tex.A"));
    }
}
