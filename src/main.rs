//! # Asset Image Optimizer - Main Entry Point
//!
//! ## Execution flow:
//! 1. Parse CLI arguments (output directory, public directory, cache
//!    switches, selection overrides)
//! 2. Configure logging (INFO, or DEBUG with the verbose flag)
//! 3. Load the JSON config file if present and apply CLI overrides
//! 4. Run the bundle pass over the output directory and write back the
//!    assets that shrank
//! 5. Run the static pass for public assets mirrored into the output
//! 6. Emit the stats and error report
//!
//! Per-file failures are reported but never fail the run.
//!
//! ## Example usage:
//! ```bash
//! image-optimizer dist --public-dir public --cache --workers 8 --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use asset_image_optimizer::{
    AssetBundle, CacheKeyMode, ImageOptimizer, MatchSpec, OptimizerOptions,
};

#[derive(Parser)]
#[command(name = "image-optimizer")]
#[command(about = "Optimize the images a site build emits, never growing a file")]
struct Args {
    /// Build output directory to optimize in place
    out_dir: PathBuf,

    /// Static public directory mirrored into the output directory
    #[arg(short, long)]
    public_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long, default_value = "image-optimizer.json")]
    config: PathBuf,

    /// Cache optimized outputs between runs
    #[arg(long)]
    cache: bool,

    /// Cache directory (defaults to ~/.image-optimizer/cache)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Key cache entries by content hash instead of by path
    #[arg(long)]
    content_key: bool,

    /// Only process these file names (repeatable, supersedes the
    /// test pattern and any exclusions)
    #[arg(long)]
    include: Vec<String>,

    /// Skip these file names (repeatable)
    #[arg(long)]
    exclude: Vec<String>,

    /// Number of parallel workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Suppress the per-file stats report
    #[arg(long)]
    no_stats: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Validate arguments
    if !args.out_dir.is_dir() {
        return Err(anyhow::anyhow!(
            "Output directory does not exist: {}",
            args.out_dir.display()
        ));
    }

    let mut options = OptimizerOptions::from_file(&args.config).await?;

    // CLI switches override the config file
    if args.cache {
        options.cache = true;
    }
    if let Some(cache_dir) = args.cache_dir {
        options.cache_location = Some(cache_dir);
    }
    if args.content_key {
        options.cache_key = CacheKeyMode::Content;
    }
    if !args.include.is_empty() {
        options.include = Some(MatchSpec::Set(args.include.clone()));
    }
    if !args.exclude.is_empty() {
        options.exclude = Some(MatchSpec::Set(args.exclude.clone()));
    }
    if let Some(workers) = args.workers {
        options.workers = workers;
    }
    if args.no_stats {
        options.log_stats = false;
    }

    let optimizer = ImageOptimizer::new(options)?;

    let mut bundle = AssetBundle::load_from_dir(&args.out_dir).await?;
    info!(
        "loaded {} assets from {}",
        bundle.len(),
        args.out_dir.display()
    );
    optimizer.optimize_bundle(&mut bundle).await?;
    let written = bundle.write_modified(&args.out_dir).await?;
    info!("wrote {} optimized assets", written);

    if let Some(ref public_dir) = args.public_dir {
        if public_dir.is_dir() {
            optimizer
                .optimize_public_assets(public_dir, &args.out_dir)
                .await?;
        } else {
            info!("public directory {} not found, skipping", public_dir.display());
        }
    }

    optimizer
        .finish(&args.out_dir.to_string_lossy().replace('\\', "/"))
        .await;

    Ok(())
}
