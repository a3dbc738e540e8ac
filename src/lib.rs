//! # Asset Image Optimizer Library
//!
//! Build-stage image optimization: shrink the images a site build emits,
//! without ever producing a larger file than the input.
//!
//! ## Module architecture:
//! - `config`: Option structs, validation and JSON load/save
//! - `error`: Custom error types for the different failure domains
//! - `matcher`: The three matcher shapes (exact, set, pattern)
//! - `selector`: Test/include/exclude selection over enumerated files
//! - `engine`: Extension-routed codecs (SVG cleanup plus raster formats)
//! - `cache`: Persistent cache of optimized outputs between runs
//! - `pipeline`: Per-file flow (cache, codec, skip-write, record)
//! - `bundle`: In-memory emitted-asset set for the bundle pass
//! - `optimizer`: Orchestrator running the bundle and static passes
//! - `report`: End-of-run stats and error rendering
//! - `file_manager`: File discovery and size/time helpers
//! - `progress`: Progress bar over the processed files
//!
//! ## Usage:
//! ```rust,no_run
//! use asset_image_optimizer::{AssetBundle, ImageOptimizer, OptimizerOptions};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let optimizer = ImageOptimizer::new(OptimizerOptions::default())?;
//! let mut bundle = AssetBundle::load_from_dir("dist".as_ref()).await?;
//! optimizer.optimize_bundle(&mut bundle).await?;
//! bundle.write_modified("dist".as_ref()).await?;
//! optimizer.finish("dist").await;
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod file_manager;
pub mod matcher;
pub mod optimizer;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod selector;
pub mod svg;

pub use bundle::{AssetBundle, EmittedAsset};
pub use config::{CacheKeyMode, OptimizerOptions};
pub use error::OptimizeError;
pub use matcher::{MatchSpec, Matcher};
pub use optimizer::ImageOptimizer;
pub use pipeline::SizeStat;
