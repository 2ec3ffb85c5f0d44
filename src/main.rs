//! # Image Normalizer - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione (default, file JSON, flag)
//! - Avvio della modalità richiesta: watch, optimize o cleanup
//!
//! ## Modalità:
//! 1. `watch`: polling di una directory, conversione e archiviazione degli originali
//! 2. `optimize`: conversione ricorsiva di una o più root, con `--backup` opzionale
//! 3. `cleanup`: cancellazione degli originali già convertiti, previa conferma
//!
//! ## Esempio di utilizzo:
//! ```bash
//! image-normalizer watch Posters --interval 3 --quality 85
//! image-normalizer optimize img=800 atores=300 --quality 80 --backup
//! image-normalizer cleanup img atores
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

use image_normalizer::image_processor::WebpEncoder;
use image_normalizer::json_output::JsonMessage;
use image_normalizer::{
    prompt, Config, EncoderChoice, ImageNormalizer, NormalizeError, RootSpec, StopSignal, Watcher,
};

const CLEANUP_QUESTION: &str = "Are you sure you want to delete the original images (.jpg/.jpeg/.png)?";

#[derive(Parser)]
#[command(name = "image-normalizer")]
#[command(about = "Convert poster images to WebP, archive the originals and clean up")]
struct Cli {
    /// JSON configuration file (a missing file means defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// WebP encoder
    #[arg(long, value_enum, global = true)]
    encoder: Option<EncoderChoice>,

    /// Output progress and status as JSON lines on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

// Options shared by the converting modes
#[derive(clap::Args)]
struct ConvertArgs {
    /// WebP quality (1-100)
    #[arg(short, long)]
    quality: Option<u8>,

    /// Downscale images wider than this (keeps aspect ratio)
    #[arg(long)]
    max_width: Option<u32>,

    /// Backup directory for originals (relative to each root)
    #[arg(long)]
    backup_dir: Option<PathBuf>,

    /// Write converted files here instead of next to the originals
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll a directory, convert new images and archive the originals
    Watch {
        /// Directory to watch
        root: Option<PathBuf>,

        /// Seconds between scans
        #[arg(short, long)]
        interval: Option<u64>,

        #[command(flatten)]
        convert: ConvertArgs,
    },
    /// Convert every image under the given roots, recursively
    Optimize {
        /// Roots as DIR or DIR=MAX_WIDTH
        #[arg(default_values = ["img=800", "atores=300"])]
        roots: Vec<RootSpec>,

        /// Move originals into the backup directory after conversion
        #[arg(long)]
        backup: bool,

        #[command(flatten)]
        convert: ConvertArgs,
    },
    /// Delete originals that already have a converted file next to them
    Cleanup {
        /// Directories to clean, recursively
        #[arg(default_values = ["img", "atores"])]
        roots: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so --json output on stdout stays parseable
    let default_level = if cli.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let json = cli.json;
    if let Err(e) = run(cli).await {
        if json {
            JsonMessage::error(format!("{:#}", e)).emit();
        }
        return Err(e);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let has_config_file = cli.config.is_some();
    let mut config = match cli.config {
        Some(ref path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    if let Some(encoder) = cli.encoder {
        config.encoder = encoder;
    }
    config.json_output |= cli.json;

    let show_progress = std::io::stderr().is_terminal();

    match cli.command {
        Command::Watch { root, interval, convert } => {
            if let Some(root) = root {
                config.watch_root = root;
            }
            if let Some(interval) = interval {
                config.poll_interval_secs = interval;
            }
            apply_convert_args(&mut config, &convert);
            config.recursive = false;
            config.archive_originals = true;

            let normalizer = ImageNormalizer::new(config.clone())?;
            log_configuration(&normalizer, "watch");

            let report = Watcher::new(normalizer, &config.watch_root).run(stop_on_ctrl_c()).await?;
            info!(
                "Watched {} passes: {} converted, {} archived, {} errors",
                report.passes, report.converted, report.archived, report.errors
            );
        }
        Command::Optimize { roots, backup, convert } => {
            // Optimize mode has its own quality default unless a config file sets one
            if !has_config_file {
                config.quality = 80;
            }
            apply_convert_args(&mut config, &convert);
            config.recursive = true;
            config.archive_originals = backup;

            ensure_roots(roots.iter().map(|spec| &spec.path))?;

            let normalizer = ImageNormalizer::new(config)?.with_progress(show_progress);
            log_configuration(&normalizer, "optimize");

            let mut stop = StopSignal::new(stop_on_ctrl_c());
            let mut processed = 0;
            for spec in &roots {
                if stop.should_stop() {
                    break;
                }

                let max_width = spec.max_width.or(normalizer.config().max_width);
                info!(
                    "Optimizing images in: {} (max width: {})",
                    spec.path.display(),
                    max_width.map(|w| w.to_string()).unwrap_or_else(|| "none".to_string())
                );

                let summary = normalizer.with_max_width(max_width).convert_pass(&spec.path, &mut stop).await?;
                info!("{}: {}", spec.path.display(), summary.format_summary());
                processed += summary.converted;
            }

            info!("🎉 Total: {} images processed", processed);
        }
        Command::Cleanup { roots } => {
            ensure_roots(roots.iter())?;
            let normalizer = ImageNormalizer::new(config)?.with_progress(show_progress);

            let confirmed = tokio::task::spawn_blocking(|| {
                let stdin = std::io::stdin();
                prompt::confirm(&mut stdin.lock(), &mut std::io::stderr(), CLEANUP_QUESTION)
            })
            .await??;

            if !confirmed {
                info!("Operation cancelled.");
                return Ok(());
            }

            // Registered after the prompt so Ctrl-C still aborts it
            let mut stop = StopSignal::new(stop_on_ctrl_c());
            for root in &roots {
                if stop.should_stop() {
                    break;
                }

                let summary = normalizer.cleanup_pass(root, &mut stop).await?;
                info!("{}", summary.format_cleanup_summary());
            }
        }
    }

    Ok(())
}

/// Turn Ctrl-C into a stop signal observed between files
fn stop_on_ctrl_c() -> broadcast::Receiver<()> {
    let (stop_sender, stop_receiver) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stop requested, finishing the current file...");
            let _ = stop_sender.send(());
        }
    });
    stop_receiver
}

fn apply_convert_args(config: &mut Config, args: &ConvertArgs) {
    if let Some(quality) = args.quality {
        config.quality = quality;
    }
    if let Some(max_width) = args.max_width {
        config.max_width = Some(max_width);
    }
    if let Some(ref backup_dir) = args.backup_dir {
        config.backup_dir = backup_dir.clone();
    }
    if let Some(ref output) = args.output {
        config.output_dir = Some(output.clone());
    }
}

/// Abort before touching anything if a root is missing
fn ensure_roots<'a>(roots: impl Iterator<Item = &'a PathBuf>) -> Result<()> {
    for root in roots {
        if !root.is_dir() {
            return Err(NormalizeError::MissingRoot(root.clone()).into());
        }
    }
    Ok(())
}

fn log_configuration(normalizer: &ImageNormalizer, mode: &str) {
    let config = normalizer.config();
    if config.json_output {
        return;
    }

    info!("🔧 Mode: {}", mode);
    match normalizer.processor().encoder() {
        WebpEncoder::Cwebp(tool) => info!("Encoder: {} (quality: {})", tool.display(), config.quality),
        WebpEncoder::Builtin => info!("Encoder: built-in libwebp (quality: {})", config.quality),
    }
    match config.max_width {
        Some(width) => info!("Max width: {}px", width),
        None => info!("Max width: unlimited"),
    }
    match config.output_dir {
        Some(ref output) => info!("Output directory: {}", output.display()),
        None => info!("Output: next to the originals"),
    }
    if config.archive_originals {
        info!("Originals archived into: {}", config.backup_dir.display());
    }
}
