//! stegofs - administer filesystems hidden in media files.

use clap::{Parser, Subcommand};
use stegofs::config::DIGEST_SIZE;
use stegofs::{LsbCodec, Result, StegoFs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stegofs")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Filesystems hidden in the low bits of BMP and WAV files",
    long_about = "Formats and inspects cluster filesystems stored in the least-significant bits of media carrier files."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a fresh filesystem inside a carrier file
    Format {
        /// BMP or WAV carrier file
        carrier: PathBuf,
    },

    /// Recursively list the hidden directory tree
    Ls {
        /// BMP or WAV carrier file
        carrier: PathBuf,
    },

    /// Show capacity and superblock information
    Info {
        /// BMP or WAV carrier file
        carrier: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Format { carrier } => cmd_format(&carrier),
        Commands::Ls { carrier } => cmd_ls(&carrier),
        Commands::Info { carrier } => cmd_info(&carrier),
    }
}

fn cmd_format(carrier: &PathBuf) -> Result<()> {
    let mut codec = LsbCodec::open(carrier)?;
    let capacity = codec.capacity();

    StegoFs::format(&mut codec)?;
    let fs = StegoFs::mount(codec)?;

    println!("Formatted {}", carrier.display());
    println!("  Hidden capacity: {} bytes", capacity);
    println!("  Clusters:        {}", fs.cluster_count());
    println!("  Free clusters:   {}", fs.free_cluster_count());

    Ok(())
}

fn cmd_ls(carrier: &PathBuf) -> Result<()> {
    let codec = LsbCodec::open(carrier)?;
    let mut fs = StegoFs::mount(codec)?;

    let tree = fs.tree()?;
    if tree.is_empty() {
        println!("(empty)");
    } else {
        print!("{}", tree);
    }

    Ok(())
}

fn cmd_info(carrier: &PathBuf) -> Result<()> {
    let mut codec = LsbCodec::open(carrier)?;
    let capacity = codec.capacity();

    let mut digest = [0u8; DIGEST_SIZE];
    codec.read_at(&mut digest, 0)?;

    let fs = StegoFs::mount(codec)?;
    let stats = fs.statvfs();

    println!("stegofs carrier information");
    println!("===========================");
    println!("Carrier:          {}", carrier.display());
    println!("Hidden capacity:  {} bytes", capacity);
    println!("Superblock MD5:   {}", hex::encode(digest));
    println!();
    println!("Clusters:");
    println!("  Size:           {} bytes", stats.block_size);
    println!("  Total:          {}", stats.blocks);
    println!("  Free:           {}", stats.blocks_free);

    Ok(())
}
