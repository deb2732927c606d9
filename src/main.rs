// Stockshelf CLI binary

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use stockshelf::catalog::labels::{self, LabelExport};
use stockshelf::constants::BULK_THUMB_WORKERS;
use stockshelf::ids::stable_id;
use stockshelf::monitor;
use stockshelf::ratelimit::RateLimiter;
use stockshelf::thumbs::pool::{run_batch, ThumbJob};
use stockshelf::thumbs::{ThumbStatus, ThumbnailGenerator, VideoSource};
use stockshelf::ShelfConfig;

#[derive(Parser)]
#[command(name = "stockshelf")]
#[command(about = "Stockshelf - a self-updating catalog for stock video downloads", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the root once and write the catalog document
    Scan {
        /// Root directory of downloaded footage
        root: PathBuf,
        /// Catalog output path (defaults to scraped-data.json next to root)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Thumbnails directory (defaults to thumbnails/ next to root)
        #[arg(short, long)]
        thumbs: Option<PathBuf>,
    },

    /// Watch the root and re-index on changes
    Watch {
        /// Root directory of downloaded footage
        root: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long)]
        thumbs: Option<PathBuf>,
    },

    /// Generate thumbnails for an explicit list of local files
    Thumbs {
        /// Video files to process
        paths: Vec<PathBuf>,
        /// Thumbnails directory
        #[arg(short, long, default_value = "thumbnails")]
        thumbs: PathBuf,
    },

    /// Append a label export document into its query folder
    ExportLabels {
        /// Query folder the export belongs to
        folder: PathBuf,
        /// JSON file containing the export document
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { root, output, thumbs } => {
            let config = build_config(root, output, thumbs);
            let generator = make_generator(&config);
            let count = monitor::run_cycle(&config, &generator)?;
            println!(
                "Indexed {} queries into {}",
                count,
                config.catalog_path.display()
            );
        }

        Commands::Watch { root, output, thumbs } => {
            let config = build_config(root, output, thumbs);
            let generator = make_generator(&config);

            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            ctrlc::set_handler(move || {
                eprintln!("Shutting down after the current cycle...");
                flag.store(true, Ordering::SeqCst);
            })
            .context("failed to install Ctrl-C handler")?;

            monitor::run_monitor(&config, &generator, shutdown)?;
        }

        Commands::Thumbs { paths, thumbs } => {
            let generator =
                ThumbnailGenerator::new(thumbs, Arc::new(RateLimiter::default()));
            let jobs: Vec<ThumbJob> = paths
                .iter()
                .map(|p| ThumbJob {
                    id: stable_id(&p.to_string_lossy()),
                    source: VideoSource::Local(p.clone()),
                })
                .collect();

            for outcome in run_batch(&generator, jobs, BULK_THUMB_WORKERS) {
                let status = match &outcome.status {
                    ThumbStatus::AlreadyExists => "exists".to_string(),
                    ThumbStatus::Extracted => "ok".to_string(),
                    ThumbStatus::Placeholder { reason } => format!("placeholder ({})", reason),
                };
                println!("{}  {}  {}", outcome.id, outcome.path.display(), status);
            }
        }

        Commands::ExportLabels { folder, input } => {
            let data = std::fs::read_to_string(&input)
                .with_context(|| format!("cannot read {}", input.display()))?;
            let export: LabelExport = serde_json::from_str(&data)
                .with_context(|| format!("cannot parse {}", input.display()))?;
            let total = labels::export_labels(&folder, export)?;
            println!("Export now holds {} videos", total);
        }
    }

    Ok(())
}

fn build_config(root: PathBuf, output: Option<PathBuf>, thumbs: Option<PathBuf>) -> ShelfConfig {
    let mut config = ShelfConfig::for_root(root);
    if let Some(output) = output {
        config = config.with_catalog_path(output);
    }
    if let Some(thumbs) = thumbs {
        config = config.with_thumbs_dir(thumbs);
    }
    config
}

fn make_generator(config: &ShelfConfig) -> ThumbnailGenerator {
    ThumbnailGenerator::new(config.thumbs_dir.clone(), Arc::new(RateLimiter::default()))
}
