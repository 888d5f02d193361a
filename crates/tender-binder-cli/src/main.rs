//! Tender Binder CLI - assemble the merged tender binder offline.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use tender_binder_core::{AppConfig, ImageStore, TenderAssembler};

#[derive(Parser, Debug)]
#[command(name = "tender-bind")]
#[command(author, version, about = "Assemble a tender binder PDF", long_about = None)]
struct Args {
    /// Section tree directory (one numbered folder per section)
    #[arg(required = true)]
    sections_dir: PathBuf,

    /// SQLite database file for uploaded images
    #[arg(short, long, env = "TENDER_DATABASE", default_value = "tender_images.db")]
    database: PathBuf,

    /// Output PDF file (default: tender_combined.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Assemble at a fixed quality instead of negotiating under the cap
    #[arg(short, long)]
    quality: Option<u8>,

    /// Size cap in bytes for negotiation
    #[arg(long, default_value_t = 4 * 1024 * 1024)]
    max_bytes: usize,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    // Load or create config
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    // Override config with CLI arguments
    config.sections_dir = args.sections_dir.clone();
    config.database_path = args.database.clone();
    config.merged_cap_bytes = args.max_bytes;

    let store = ImageStore::open(&config.database_path)
        .context(format!("Failed to open image store: {}", args.database.display()))?;
    let assembler = TenderAssembler::new(config);

    let sections = assembler.sections().context("Failed to scan section tree")?;
    if sections.is_empty() {
        anyhow::bail!("No sections found under {}", args.sections_dir.display());
    }
    info!("Found {} sections", sections.len());

    let (bytes, within_cap) = match args.quality {
        Some(quality) => {
            info!("Assembling at fixed quality {}", quality);
            let bytes = assembler
                .assemble(&store, quality)
                .context("Failed to assemble binder")?;
            (bytes, true)
        }
        None => {
            let merged = assembler
                .assemble_within_cap(&store)
                .context("Failed to assemble binder")?;
            info!(
                "Negotiated quality {} ({} bytes)",
                merged.quality,
                merged.bytes.len()
            );
            (merged.bytes, merged.within_cap)
        }
    };

    let output_path = args
        .output
        .unwrap_or_else(|| PathBuf::from("tender_combined.pdf"));
    std::fs::write(&output_path, &bytes)
        .context(format!("Failed to write output: {}", output_path.display()))?;

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!(
            "Merged binder saved to: {} ({} bytes)",
            output_path.display(),
            bytes.len()
        );
        if !within_cap {
            println!("Warning: no quality level fit under the size cap; smallest candidate kept");
        }
    }

    Ok(())
}
