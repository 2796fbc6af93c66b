use std::fs::File;

use crate::errors::CliError;
use btp::{BtpPackage, ReadOptions};
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::{IntoDiagnostic, WrapErr};

pub struct VerifyTexturePackageArgs {
    pub file_path: Utf8PathBuf,
}

pub fn verify_texture_package(args: VerifyTexturePackageArgs) -> miette::Result<()> {
    let file = File::open(&args.file_path).into_diagnostic()?;
    let mut package = BtpPackage::open(
        file,
        ReadOptions {
            load_payloads: true,
        },
    )
    .map_err(CliError::from)
    .wrap_err(format!("{} failed verification", args.file_path))?;

    let verified = package.verify().map_err(CliError::from)?;

    println!(
        "{} {} {} {}",
        "✅ Verified".bright_green().bold(),
        verified.to_string().bright_white().bold(),
        "package mips in".bright_green().bold(),
        args.file_path.as_str().bright_cyan().bold()
    );

    Ok(())
}
