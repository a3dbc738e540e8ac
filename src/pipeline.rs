//! # Processing Pipeline Module
//!
//! Per-file core algorithm: consult the cache, else invoke the codec
//! engine, apply the skip-write policy, optionally persist to the cache,
//! record a result.
//!
//! ## Steps per file:
//! 1. Caching enabled and an entry exists at the derived key: read it,
//!    mark the result cached, skip the engine entirely
//! 2. Else invoke the engine (on the blocking pool - codecs are CPU work)
//! 3. Freshly computed results are persisted to the cache
//! 4. `skip_write = optimized >= original` - a result that did not shrink
//!    the artifact is never written back; the caller keeps the original
//! 5. Record a size stat (sizes, floored percent delta, skip/cached flags)
//! 6. Any failure along the way is recorded as an error keyed by path and
//!    converted into an empty outcome; sibling files are unaffected
//!
//! ## Aggregation:
//! `RunLedger` owns the stats and error maps. They are written from many
//! concurrently in-flight tasks behind mutexes and drained exactly once,
//! after the join barrier, to produce the final report.

use crate::cache::CacheStore;
use crate::engine::OptimizationEngine;
use crate::error::OptimizeError;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;

/// One record per processed file, consumed by the savings report
#[derive(Debug, Clone, PartialEq)]
pub struct SizeStat {
    pub original_size: u64,
    pub optimized_size: u64,
    /// Floored percentage delta; negative when the file shrank
    pub ratio: i64,
    pub skip_write: bool,
    pub is_cached: bool,
}

/// Floor of `100 * (new/old - 1)`: -20 for a 20% shrink, +20 for growth.
pub fn percent_delta(original_size: u64, optimized_size: u64) -> i64 {
    if original_size == 0 {
        return 0;
    }
    (100.0 * (optimized_size as f64 / original_size as f64 - 1.0)).floor() as i64
}

/// Outcome of one pipeline invocation
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// Optimized bytes; `None` when processing failed
    pub content: Option<Vec<u8>>,
    pub skip_write: bool,
}

impl ProcessOutcome {
    fn failed() -> Self {
        Self {
            content: None,
            skip_write: false,
        }
    }
}

/// Shared mutable aggregation for one run: stats and errors, written
/// concurrently, read once after all work completes.
#[derive(Debug, Default)]
pub struct RunLedger {
    stats: Mutex<BTreeMap<String, SizeStat>>,
    errors: Mutex<BTreeMap<String, String>>,
}

impl RunLedger {
    pub async fn record_stat(&self, path: &str, stat: SizeStat) {
        self.stats.lock().await.insert(path.to_string(), stat);
    }

    pub async fn record_error(&self, path: &str, message: String) {
        self.errors.lock().await.insert(path.to_string(), message);
    }

    /// Take the stats map, leaving the ledger empty
    pub async fn drain_stats(&self) -> BTreeMap<String, SizeStat> {
        std::mem::take(&mut *self.stats.lock().await)
    }

    /// Take the error map, leaving the ledger empty
    pub async fn drain_errors(&self) -> BTreeMap<String, String> {
        std::mem::take(&mut *self.errors.lock().await)
    }
}

/// Cache-aware per-file optimization pipeline
#[derive(Debug)]
pub struct ProcessingPipeline {
    engine: OptimizationEngine,
    cache: Option<CacheStore>,
    ledger: std::sync::Arc<RunLedger>,
}

impl ProcessingPipeline {
    pub fn new(
        engine: OptimizationEngine,
        cache: Option<CacheStore>,
        ledger: std::sync::Arc<RunLedger>,
    ) -> Self {
        Self {
            engine,
            cache,
            ledger,
        }
    }

    pub fn cache(&self) -> Option<&CacheStore> {
        self.cache.as_ref()
    }

    pub fn ledger(&self) -> &RunLedger {
        &self.ledger
    }

    /// Process one file. Failures are captured into the error ledger and
    /// surfaced as an empty outcome; this never returns an error so one
    /// bad file cannot abort its siblings.
    pub async fn process(&self, path: &str, buffer: &[u8]) -> ProcessOutcome {
        match self.try_process(path, buffer).await {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!("processing failed for {}: {}", path, e);
                self.ledger.record_error(path, e.to_string()).await;
                ProcessOutcome::failed()
            }
        }
    }

    async fn try_process(&self, path: &str, buffer: &[u8]) -> Result<ProcessOutcome, OptimizeError> {
        let mut is_cached = false;

        let optimized = match &self.cache {
            Some(cache) => {
                let key = cache.key_for(path, buffer);
                match cache.lookup(&key).await? {
                    Some(bytes) => {
                        is_cached = true;
                        bytes
                    }
                    None => {
                        let bytes = self.run_engine(path, buffer).await?;
                        cache.store(&key, &bytes).await?;
                        bytes
                    }
                }
            }
            None => self.run_engine(path, buffer).await?,
        };

        let original_size = buffer.len() as u64;
        let optimized_size = optimized.len() as u64;
        let skip_write = optimized_size >= original_size;

        self.ledger
            .record_stat(
                path,
                SizeStat {
                    original_size,
                    optimized_size,
                    ratio: percent_delta(original_size, optimized_size),
                    skip_write,
                    is_cached,
                },
            )
            .await;

        Ok(ProcessOutcome {
            content: Some(optimized),
            skip_write,
        })
    }

    /// Codec invocations are pure CPU; run them on the blocking pool so
    /// they do not stall the I/O driver.
    async fn run_engine(&self, path: &str, buffer: &[u8]) -> Result<Vec<u8>, OptimizeError> {
        let engine = self.engine.clone();
        let path = path.to_string();
        let buffer = buffer.to_vec();
        tokio::task::spawn_blocking(move || engine.optimize(&path, &buffer)).await?
    }
}
