//! # Build Stage Orchestrator Module
//!
//! Runs the processing pipeline over two independent sources and emits
//! the final report.
//!
//! ## Passes:
//! - **Bundle pass**: operates on the in-memory emitted-asset set. The
//!   selected files fan out through the pipeline; results that shrank
//!   replace the in-memory content, disk is never touched directly.
//! - **Static pass**: operates on a recursively enumerated public
//!   directory mirrored into the output directory. A file is only
//!   touched when its output mirror exists and is newer than the last
//!   recorded processing time (the mtime guard, kept in process memory
//!   so repeated passes in watch mode stay cheap). Enumerated files that
//!   were not selected are synchronized verbatim to the output location.
//!
//! ## Concurrency:
//! Every selected file is spawned as its own task; a semaphore sized to
//! `options.workers` bounds how many run at once. A pass completes only
//! when every task has settled - per-file failures are recorded in the
//! ledger and never cancel siblings. The stats, error and guard maps are
//! mutex-guarded because tasks land on a multi-threaded runtime.

use crate::{
    bundle::AssetBundle,
    cache::CacheStore,
    config::OptimizerOptions,
    engine::OptimizationEngine,
    error::OptimizeError,
    file_manager::FileManager,
    pipeline::{ProcessingPipeline, RunLedger},
    progress::ProgressManager,
    report,
    selector::FileSelector,
};
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info};

/// Path -> last-processed timestamp (ms) for the static pass. Persists
/// for the process lifetime, across repeated builds in watch mode.
type MtimeGuard = Arc<Mutex<HashMap<PathBuf, u64>>>;

/// Orchestrates selection, processing and reporting for one build stage
pub struct ImageOptimizer {
    options: Arc<OptimizerOptions>,
    selector: FileSelector,
    pipeline: Arc<ProcessingPipeline>,
    ledger: Arc<RunLedger>,
    mtime_guard: MtimeGuard,
    semaphore: Arc<Semaphore>,
}

impl ImageOptimizer {
    /// Build the optimizer. Validates configuration and compiles the
    /// selectors, so malformed matchers fail here and never per file.
    pub fn new(options: OptimizerOptions) -> Result<Self, OptimizeError> {
        options.validate()?;
        let selector = FileSelector::from_options(&options)?;

        let cache = if options.cache {
            let root = options
                .cache_root()
                .map_err(|e| OptimizeError::Validation(e.to_string()))?;
            Some(CacheStore::new(root, options.cache_key))
        } else {
            None
        };

        let options = Arc::new(options);
        let ledger = Arc::new(RunLedger::default());
        let engine = OptimizationEngine::new(Arc::clone(&options));
        let pipeline = Arc::new(ProcessingPipeline::new(engine, cache, Arc::clone(&ledger)));
        let semaphore = Arc::new(Semaphore::new(options.workers));

        Ok(Self {
            options,
            selector,
            pipeline,
            ledger,
            mtime_guard: Arc::new(Mutex::new(HashMap::new())),
            semaphore,
        })
    }

    /// Run the bundle pass over the in-memory emitted-asset set.
    pub async fn optimize_bundle(&self, bundle: &mut AssetBundle) -> Result<()> {
        let all_paths = bundle.paths();
        let selected = self
            .selector
            .select(&all_paths, |p| p.clone(), |p| bundle.name_of(p));

        debug!(
            "bundle pass: {} of {} assets selected",
            selected.len(),
            all_paths.len()
        );
        if selected.is_empty() {
            return Ok(());
        }

        if let Some(cache) = self.pipeline.cache() {
            cache.ensure_root().await?;
        }

        let progress = ProgressManager::new(selected.len() as u64);
        let mut handles = Vec::with_capacity(selected.len());

        for path in selected {
            let source = match bundle.source(&path) {
                Some(bytes) => bytes.to_vec(),
                None => continue,
            };
            let permit = Arc::clone(&self.semaphore).acquire_owned().await?;
            let pipeline = Arc::clone(&self.pipeline);
            let progress = progress.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let outcome = pipeline.process(&path, &source).await;
                progress.update(&path);
                (path, outcome)
            }));
        }

        // Join barrier: the pass is complete only when every task settled
        for result in futures::future::join_all(handles).await {
            let (path, outcome) = result?;
            if let Some(content) = outcome.content {
                if !outcome.skip_write && !content.is_empty() {
                    bundle.replace_source(&path, content);
                }
            }
        }

        progress.finish("bundle pass complete");
        Ok(())
    }

    /// Run the static pass: optimize or synchronize public assets that
    /// already exist in the output directory.
    pub async fn optimize_public_assets(&self, public_dir: &Path, out_dir: &Path) -> Result<()> {
        if !self.options.include_public {
            return Ok(());
        }

        let all_files = FileManager::read_all_files(public_dir);
        if all_files.is_empty() {
            return Ok(());
        }

        let selected: HashSet<PathBuf> = self
            .selector
            .select(
                &all_files,
                |p| p.to_string_lossy().replace('\\', "/"),
                |p| FileManager::file_name(p),
            )
            .into_iter()
            .collect();

        debug!(
            "static pass: {} of {} public files selected",
            selected.len(),
            all_files.len()
        );

        if let Some(cache) = self.pipeline.cache() {
            cache.ensure_root().await?;
        }

        let progress = ProgressManager::new(all_files.len() as u64);
        let mut handles = Vec::with_capacity(all_files.len());

        for file in all_files {
            let rel = match file.strip_prefix(public_dir) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => continue,
            };
            let dest = out_dir.join(&rel);
            let is_selected = selected.contains(&file);

            let permit = Arc::clone(&self.semaphore).acquire_owned().await?;
            let pipeline = Arc::clone(&self.pipeline);
            let guard = Arc::clone(&self.mtime_guard);
            let progress = progress.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let rel_str = rel.to_string_lossy().replace('\\', "/");
                if let Err(e) =
                    Self::process_public_file(&pipeline, &guard, &rel, &rel_str, &dest, is_selected)
                        .await
                {
                    // IO failures on the static pass leave the file on
                    // disk untouched and are reported with the rest
                    pipeline.ledger().record_error(&rel_str, e.to_string()).await;
                }
                progress.update(&rel_str);
            }));
        }

        for result in futures::future::join_all(handles).await {
            result?;
        }

        progress.finish("static pass complete");
        Ok(())
    }

    /// One static asset: guard check, then optimize-in-place or verbatim
    /// synchronization.
    async fn process_public_file(
        pipeline: &ProcessingPipeline,
        guard: &MtimeGuard,
        rel: &Path,
        rel_str: &str,
        dest: &Path,
        is_selected: bool,
    ) -> Result<(), OptimizeError> {
        // Only files already present in the output mirror are touched
        let metadata = match tokio::fs::metadata(dest).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mtime = FileManager::mtime_millis(metadata.modified()?);
        let last_processed = guard.lock().await.get(rel).copied().unwrap_or(0);
        if mtime <= last_processed {
            debug!("static pass: {} unchanged since last run, skipping", rel_str);
            return Ok(());
        }

        let buffer = tokio::fs::read(dest).await?;

        if is_selected {
            let outcome = pipeline.process(rel_str, &buffer).await;
            if let Some(content) = outcome.content {
                if !outcome.skip_write && !content.is_empty() {
                    tokio::fs::write(dest, &content).await?;
                    guard
                        .lock()
                        .await
                        .insert(rel.to_path_buf(), FileManager::now_millis());
                }
            }
        } else {
            // Never-optimized assets still get synchronized to the output
            tokio::fs::write(dest, &buffer).await?;
        }

        Ok(())
    }

    /// Drain the ledger and emit the final report. Call once, after all
    /// passes have joined.
    pub async fn finish(&self, out_dir_label: &str) {
        let stats = self.ledger.drain_stats().await;
        if !stats.is_empty() && self.options.log_stats {
            report::log_optimization_stats(out_dir_label, &stats);
        }

        let errors = self.ledger.drain_errors().await;
        if !errors.is_empty() {
            report::log_errors(out_dir_label, &errors);
        } else {
            info!("optimization finished without errors");
        }
    }

    /// Ledger access for callers that want raw records instead of the
    /// rendered report.
    pub fn ledger(&self) -> &RunLedger {
        &self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchSpec;
    use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    /// An SVG that strictly shrinks under cleanup
    const WASTEFUL_SVG: &str = "<svg xmlns=\"http://www.w3.org/2000/svg\">\n  <!-- a long comment that the cleanup removes entirely -->\n  <rect width=\"10\" height=\"10\"/>\n</svg>\n";

    fn sample_png() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([1, 2, 3, 255])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    fn optimizer(options: OptimizerOptions) -> ImageOptimizer {
        ImageOptimizer::new(options).unwrap()
    }

    #[tokio::test]
    async fn test_bundle_pass_replaces_only_shrunk_selected_assets() {
        let mut bundle = AssetBundle::new();
        bundle.insert("img/icon.svg", WASTEFUL_SVG.as_bytes().to_vec());
        bundle.insert("app.js", b"console.log(1)".to_vec());

        let opt = optimizer(OptimizerOptions::default());
        opt.optimize_bundle(&mut bundle).await.unwrap();

        assert_eq!(bundle.modified_count(), 1);
        let optimized = bundle.source("img/icon.svg").unwrap();
        assert!(optimized.len() < WASTEFUL_SVG.len());
        // Non-matching assets stay untouched
        assert_eq!(bundle.source("app.js").unwrap(), b"console.log(1)");

        let stats = opt.ledger().drain_stats().await;
        assert_eq!(stats.len(), 1);
        assert!(!stats["img/icon.svg"].skip_write);
    }

    #[tokio::test]
    async fn test_bundle_pass_isolates_failures() {
        let mut bundle = AssetBundle::new();
        bundle.insert("a.svg", WASTEFUL_SVG.as_bytes().to_vec());
        bundle.insert("broken.png", b"not an image".to_vec());
        bundle.insert("b.svg", WASTEFUL_SVG.as_bytes().to_vec());

        let opt = optimizer(OptimizerOptions::default());
        opt.optimize_bundle(&mut bundle).await.unwrap();

        let stats = opt.ledger().drain_stats().await;
        let errors = opt.ledger().drain_errors().await;
        assert_eq!(stats.len(), 2);
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key("broken.png"));
        // The two healthy files were processed and written
        assert_eq!(bundle.modified_count(), 2);
        // The failed file keeps its original content
        assert_eq!(bundle.source("broken.png").unwrap(), b"not an image");
    }

    #[tokio::test]
    async fn test_bundle_pass_include_overrides_exclude() {
        let mut bundle = AssetBundle::new();
        bundle.insert("a.svg", WASTEFUL_SVG.as_bytes().to_vec());
        bundle.insert("b.svg", WASTEFUL_SVG.as_bytes().to_vec());

        let options = OptimizerOptions {
            include: Some(MatchSpec::Exact("a.svg".to_string())),
            exclude: Some(MatchSpec::Exact("a.svg".to_string())),
            ..Default::default()
        };
        let opt = optimizer(options);
        opt.optimize_bundle(&mut bundle).await.unwrap();

        let stats = opt.ledger().drain_stats().await;
        assert_eq!(stats.len(), 1);
        assert!(stats.contains_key("a.svg"));
    }

    #[tokio::test]
    async fn test_static_pass_optimizes_and_guard_prevents_rework() {
        let public = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        tokio::fs::write(public.path().join("icon.svg"), WASTEFUL_SVG)
            .await
            .unwrap();
        tokio::fs::write(out.path().join("icon.svg"), WASTEFUL_SVG)
            .await
            .unwrap();

        let opt = optimizer(OptimizerOptions::default());
        opt.optimize_public_assets(public.path(), out.path())
            .await
            .unwrap();

        let first = tokio::fs::read(out.path().join("icon.svg")).await.unwrap();
        assert!(first.len() < WASTEFUL_SVG.len());
        let mtime_after_first = tokio::fs::metadata(out.path().join("icon.svg"))
            .await
            .unwrap()
            .modified()
            .unwrap();

        // Second pass: the guard timestamp now exceeds the output mtime,
        // so the file is skipped entirely - zero writes.
        opt.optimize_public_assets(public.path(), out.path())
            .await
            .unwrap();
        let second = tokio::fs::read(out.path().join("icon.svg")).await.unwrap();
        let mtime_after_second = tokio::fs::metadata(out.path().join("icon.svg"))
            .await
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(mtime_after_first, mtime_after_second);
    }

    #[tokio::test]
    async fn test_static_pass_synchronizes_unselected_files() {
        let public = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        tokio::fs::write(public.path().join("robots.txt"), b"allow")
            .await
            .unwrap();
        tokio::fs::write(out.path().join("robots.txt"), b"allow")
            .await
            .unwrap();
        // No output mirror for this one: it must be left alone
        tokio::fs::write(public.path().join("missing.svg"), WASTEFUL_SVG)
            .await
            .unwrap();

        let opt = optimizer(OptimizerOptions::default());
        opt.optimize_public_assets(public.path(), out.path())
            .await
            .unwrap();

        let synced = tokio::fs::read(out.path().join("robots.txt")).await.unwrap();
        assert_eq!(synced, b"allow");
        assert!(!out.path().join("missing.svg").exists());

        // Nothing was optimized, nothing failed
        assert!(opt.ledger().drain_stats().await.is_empty());
        assert!(opt.ledger().drain_errors().await.is_empty());
    }

    #[tokio::test]
    async fn test_static_pass_disabled_by_include_public() {
        let public = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        tokio::fs::write(public.path().join("icon.svg"), WASTEFUL_SVG)
            .await
            .unwrap();
        tokio::fs::write(out.path().join("icon.svg"), WASTEFUL_SVG)
            .await
            .unwrap();

        let options = OptimizerOptions {
            include_public: false,
            ..Default::default()
        };
        let opt = optimizer(options);
        opt.optimize_public_assets(public.path(), out.path())
            .await
            .unwrap();

        let untouched = tokio::fs::read(out.path().join("icon.svg")).await.unwrap();
        assert_eq!(untouched, WASTEFUL_SVG.as_bytes());
    }

    #[tokio::test]
    async fn test_second_cached_run_produces_identical_bytes() {
        let cache_dir = TempDir::new().unwrap();
        let options = OptimizerOptions {
            cache: true,
            cache_location: Some(cache_dir.path().to_path_buf()),
            ..Default::default()
        };

        let mut first_bundle = AssetBundle::new();
        first_bundle.insert("logo.png", sample_png());
        let opt = optimizer(options.clone());
        opt.optimize_bundle(&mut first_bundle).await.unwrap();
        let first_stats = opt.ledger().drain_stats().await;
        assert!(!first_stats["logo.png"].is_cached);
        let first_output = first_bundle.source("logo.png").unwrap().to_vec();

        // Fresh optimizer, same cache root: the entry is reused
        let mut second_bundle = AssetBundle::new();
        second_bundle.insert("logo.png", sample_png());
        let opt2 = optimizer(options);
        opt2.optimize_bundle(&mut second_bundle).await.unwrap();
        let second_stats = opt2.ledger().drain_stats().await;
        assert!(second_stats["logo.png"].is_cached);
        assert_eq!(second_bundle.source("logo.png").unwrap(), &first_output[..]);
    }
}
