use std::fs::File;

use crate::{errors::CliError, println_pad, utils::format_size};
use btp::{BtpPackage, NO_TFC_INDEX};
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::IntoDiagnostic;

pub struct InfoTexturePackageArgs {
    pub file_path: Utf8PathBuf,
    pub entries: bool,
}

pub fn info_texture_package(args: InfoTexturePackageArgs) -> miette::Result<()> {
    let file = File::open(&args.file_path).into_diagnostic()?;
    let file_size = file.metadata().into_diagnostic()?.len();
    let package = BtpPackage::mount_from_reader(file).map_err(CliError::from)?;
    let header = package.header();

    println_pad!(
        "{} {}",
        "📦 Texture package:".bright_blue().bold(),
        args.file_path.as_str().bright_cyan().bold()
    );
    println_pad!(
        "{} {}",
        "🏷️ Version:".bright_green(),
        header.version.to_string().bright_white().bold()
    );
    println_pad!(
        "{} {}",
        "🎯 Target hash:".bright_green(),
        format!("{:08x}", header.target_hash).bright_white().bold()
    );
    println_pad!(
        "{} {}",
        "🖼️  Textures:".bright_green(),
        header.texture_count.to_string().bright_white().bold()
    );
    println_pad!(
        "{} {}",
        "💾 Size:".bright_green(),
        format_size(file_size).bright_white()
    );

    println_pad!("\n{}", "🗄️  Texture file caches:".bright_magenta().bold());
    for (index, tfc) in package.tfc_table().iter().enumerate() {
        if index as i32 == NO_TFC_INDEX {
            println_pad!(
                "   {} {} {}",
                "•".bright_cyan(),
                index,
                "(package)".dimmed()
            );
            continue;
        }
        println_pad!(
            "   {} {} {} {}",
            "•".bright_cyan(),
            index,
            tfc.name.bright_cyan().bold(),
            format!("({})", tfc.guid).dimmed()
        );
    }

    if args.entries {
        println_pad!("\n{}", "🖼️  Textures:".bright_magenta().bold());
        for entry in package.entries() {
            println_pad!(
                "   {} {} {}",
                "•".bright_cyan(),
                entry.path.bright_cyan().bold(),
                format!(
                    "({}, tfc {}, srgb {}, lod bias {}, never stream {})",
                    entry.format, entry.tfc_index, entry.srgb, entry.lod_bias, entry.never_stream
                )
                .dimmed()
            );
            for (mip_index, mip) in entry.populated_mips().iter().enumerate() {
                let location = if mip.is_external() { "external" } else { "package" };
                println_pad!(
                    "      {} {}x{} {} {} @ {} {}",
                    format!("[{mip_index}]").dimmed(),
                    mip.width,
                    mip.height,
                    location,
                    format_size(u64::from(mip.compressed_size)),
                    mip.data_offset,
                    format!("(flags {:?})", mip.flags).dimmed()
                );
            }
        }
    }

    Ok(())
}
