use btp::BtpBuilder;
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::{Result, WrapErr};

use crate::{
    errors::CliError,
    println_pad,
    utils::{format_size, manifest::load_manifest},
};

#[derive(Debug)]
pub struct CompileTexturePackageArgs {
    pub manifest: Utf8PathBuf,
    pub output: Utf8PathBuf,
}

pub fn compile_texture_package(args: CompileTexturePackageArgs) -> Result<()> {
    let resolved = load_manifest(&args.manifest)?;

    println!(
        "{} {} {}",
        "📦 Compiling".bright_blue().bold(),
        resolved.textures.len().to_string().bright_cyan().bold(),
        "textures".bright_blue().bold()
    );
    tracing::debug!(
        "Target hash {:08x}, compression {}",
        resolved.options.target_hash,
        resolved.options.compression
    );

    let report = BtpBuilder::new(resolved.options)
        .with_textures(resolved.textures)
        .build_to_path(&args.output, resolved.source)
        .map_err(CliError::from)
        .wrap_err(format!("Failed to compile {}", args.output))?;

    println_pad!(
        "{} {} ({} package, {} external)",
        "🖼️  Mips:".bright_green(),
        report.mip_count.to_string().bright_white().bold(),
        report.package_mips,
        report.external_mips
    );
    println_pad!(
        "{} {}",
        "🗄️  TFC entries:".bright_green(),
        report.tfc_table_count.to_string().bright_white().bold()
    );
    if report.dedup.deduplicated_mips > 0 {
        println_pad!(
            "{} {} mips, {} saved",
            "♻️  Deduplicated:".bright_green(),
            report.dedup.deduplicated_mips.to_string().bright_white().bold(),
            format_size(report.dedup.saved_bytes)
        );
    }
    if report.tfc_guid_mismatches > 0 {
        println_pad!(
            "{} {} TFC GUID mismatches, the first GUID of each name was kept",
            "⚠️".bright_yellow(),
            report.tfc_guid_mismatches.to_string().bright_yellow().bold()
        );
    }

    println!(
        "{} {} {}",
        "✅ Wrote".bright_green().bold(),
        args.output.as_str().bright_cyan().bold(),
        format!("({})", format_size(report.file_size)).dimmed()
    );

    Ok(())
}
