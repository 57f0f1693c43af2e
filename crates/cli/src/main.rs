//! facefind - cascade face detection for still images
//!
//! Command-line front end for the cascade face detector.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use rayon::ThreadPoolBuilder;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;

use commands::detect::DetectCommand;
use commands::inspect::InspectCommand;

#[derive(Parser)]
#[command(
    name = "facefind",
    version,
    about = "Find faces in still images with a pixel-intensity cascade",
    long_about = "Detect faces in JPEG and PNG images with a pre-trained cascade model.\n\
                  Each image yields its face rectangles and an annotated JPEG copy.",
    after_help = "EXAMPLES:\n  \
                  # Detect faces, print JSON results\n  \
                  facefind detect --model cascade/facefinder photo.jpg\n\n  \
                  # Write annotated copies with circle markers\n  \
                  facefind detect --model cascade/facefinder --circle \\\n      \
                  --annotated-dir out *.jpg\n\n  \
                  # Summarize a model file\n  \
                  facefind inspect --model cascade/facefinder"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect faces in one or more images
    Detect(DetectCommand),

    /// Print a summary of a cascade model file
    Inspect(InspectCommand),
}

fn main() -> Result<()> {
    // Size the global pool from the environment, mainly for tests
    if let Ok(threads_str) = std::env::var("FACEFIND_THREADS") {
        if let Ok(num_threads) = threads_str.parse::<usize>() {
            ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()
                .ok(); // Ignore error if already initialized
        }
    }

    let cli = Cli::parse();

    let log_level = match &cli.command {
        Commands::Inspect(_) if !cli.verbose => Level::WARN,
        _ => {
            if cli.verbose {
                Level::DEBUG
            } else {
                Level::INFO
            }
        }
    };

    // Logs go to stderr so JSON on stdout stays clean
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Detect(cmd) => cmd.execute(),
        Commands::Inspect(cmd) => cmd.execute(),
    }
}
