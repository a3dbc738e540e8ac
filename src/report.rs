//! # Report Module
//!
//! Renders the end-of-run savings and error reports from the drained
//! ledger maps. Lines go through `tracing`; colored presentation is a
//! host concern and deliberately absent here.
//!
//! Per-file line: relative path, floored percent delta, sizes in kB and
//! a status (written, skipped or cached). One aggregate savings line is
//! appended when at least one file was actually written. Errors are
//! reported separately, after the stats.

use crate::pipeline::SizeStat;
use std::collections::BTreeMap;
use tracing::{error, info};

fn kb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0
}

/// Emit the per-file savings report plus the aggregate line.
pub fn log_optimization_stats(out_dir: &str, stats: &BTreeMap<String, SizeStat>) {
    info!("optimized images successfully:");

    let max_key_len = stats.keys().map(|k| k.len()).max().unwrap_or(0);
    let max_ratio_len = stats
        .values()
        .map(|s| s.ratio.to_string().len())
        .max()
        .unwrap_or(0);

    let mut total_original_size: u64 = 0;
    let mut total_saved_size: i64 = 0;

    for (name, stat) in stats {
        let percent = if stat.ratio > 0 {
            format!("+{}%", stat.ratio)
        } else {
            format!("{}%", stat.ratio)
        };
        let size_text = if stat.skip_write {
            format!(
                "skipped | original: {:.2} kB <= optimized: {:.2} kB",
                kb(stat.original_size),
                kb(stat.optimized_size)
            )
        } else if stat.is_cached {
            format!(
                "cached | original: {:.2} kB; cached: {:.2} kB",
                kb(stat.original_size),
                kb(stat.optimized_size)
            )
        } else {
            format!(
                "{:.2} kB -> {:.2} kB",
                kb(stat.original_size),
                kb(stat.optimized_size)
            )
        };

        info!(
            "{}/{}{} {}{} {}",
            out_dir,
            name,
            " ".repeat(2 + max_key_len - name.len()),
            percent,
            " ".repeat(max_ratio_len.saturating_sub(stat.ratio.to_string().len())),
            size_text
        );

        if !stat.skip_write {
            total_original_size += stat.original_size;
            total_saved_size += stat.original_size as i64 - stat.optimized_size as i64;
        }
    }

    if total_saved_size > 0 {
        let percent_saved = (total_saved_size as f64 / total_original_size as f64 * 100.0).round();
        info!(
            "total savings = {:.2} kB/{:.2} kB ~ {}%",
            total_saved_size as f64 / 1024.0,
            kb(total_original_size),
            percent_saved
        );
    }
}

/// Emit the per-file error report.
pub fn log_errors(out_dir: &str, errors: &BTreeMap<String, String>) {
    error!("errors during optimization:");

    let max_key_len = errors.keys().map(|k| k.len()).max().unwrap_or(0);
    for (name, message) in errors {
        error!(
            "{}/{}{} {}",
            out_dir,
            name,
            " ".repeat(2 + max_key_len - name.len()),
            message
        );
    }
}
