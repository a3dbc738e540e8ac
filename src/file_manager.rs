//! # File Management Module
//!
//! Directory enumeration and small file helpers shared by the passes.
//!
//! ## Responsibilities:
//! - Recursive discovery of static asset files
//! - Name projection for the matchers (basename with extension)
//! - Modification-time extraction for the static pass guard
//! - Human-readable size formatting for log output

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Recursively enumerate every file beneath a root. A missing root
    /// yields an empty list rather than an error.
    pub fn read_all_files(root: &Path) -> Vec<PathBuf> {
        if !root.exists() {
            return Vec::new();
        }

        WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_path_buf())
            .collect()
    }

    /// File name with extension, as the include/exclude matchers see it
    pub fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Milliseconds since the epoch for a modification time
    pub fn mtime_millis(modified: SystemTime) -> u64 {
        modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Current time in milliseconds since the epoch
    pub fn now_millis() -> u64 {
        Self::mtime_millis(SystemTime::now())
    }

    /// Format a byte count as a human-readable size
    pub fn format_size(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.2} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.2} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.2} KB", bytes as f64 / KB as f64)
        } else {
            format!("{} B", bytes)
        }
    }
}
