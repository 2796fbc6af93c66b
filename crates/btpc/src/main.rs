use camino::Utf8PathBuf;
use clap::builder::{styling::AnsiColor, Styles};
use clap::ColorChoice;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{
    compile_texture_package, info_texture_package, verify_texture_package,
    CompileTexturePackageArgs, InfoTexturePackageArgs, VerifyTexturePackageArgs,
};
use miette::{IntoDiagnostic, Result};

mod commands;
mod errors;
mod utils;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Log debug output of the compiler and reader
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a btp.toml manifest into a texture package
    Compile {
        /// The path to the manifest
        #[arg(short, long, default_value = "btp.toml")]
        manifest: Utf8PathBuf,

        /// The texture package to write
        #[arg(short, long)]
        output: Utf8PathBuf,
    },
    /// Show information about a texture package
    Info {
        /// The path to the texture package file
        #[arg(short, long)]
        file_path: Utf8PathBuf,

        /// List every texture and its mips
        #[arg(short, long)]
        entries: bool,
    },
    /// Load every mip stored in a texture package and check its size
    Verify {
        /// The path to the texture package file
        #[arg(short, long)]
        file_path: Utf8PathBuf,
    },
}

fn parse_args() -> Result<Args> {
    // Configure colored/styled help output
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Blue.on_default());

    let matches = Args::command()
        .styles(styles)
        .color(ColorChoice::Auto)
        .get_matches();

    Args::from_arg_matches(&matches).into_diagnostic()
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "btpc=debug,btp=debug"
    } else {
        "btpc=info,btp=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = parse_args()?;
    init_tracing(args.verbose);

    match args.command {
        Commands::Compile { manifest, output } => {
            compile_texture_package(CompileTexturePackageArgs { manifest, output })
        }
        Commands::Info { file_path, entries } => {
            info_texture_package(InfoTexturePackageArgs { file_path, entries })
        }
        Commands::Verify { file_path } => {
            verify_texture_package(VerifyTexturePackageArgs { file_path })
        }
    }
}
