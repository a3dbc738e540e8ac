//! # Configuration Management Module
//!
//! Defines the `OptimizerOptions` struct with all optimization parameters.
//!
//! ## Responsibilities:
//! - One configuration block per supported image format, forwarded
//!   opaquely to the matching codec
//! - Global switches: selection (test pattern, include, exclude), cache
//!   (enabled, location, key mode), static public pass, stats report
//! - Robust validation of every parameter, performed once up front
//! - Load/save as JSON; every field carries a serde default so a partial
//!   user config deep-merges over the defaults key by key
//!
//! ## Format routing invariant:
//! A file is routed to exactly one format's codec, determined by its
//! extension; `.svg` bypasses the raster codecs entirely.
//!
//! ## Validation:
//! - jpeg/avif quality must be 1-100
//! - avif speed must be 1-10, gif speed 1-30
//! - workers must be > 0
//! - the test pattern and any include/exclude matcher must compile

use crate::error::OptimizeError;
use crate::matcher::MatchSpec;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default selection pattern: all extensions a codec exists for.
pub const DEFAULT_TEST_PATTERN: &str = r"(?i)\.(jpe?g|png|gif|tiff|webp|svg|avif)$";

/// How cache entries are keyed on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheKeyMode {
    /// Mirror the file's logical path beneath the cache root. Fast (no
    /// hashing), but stale when source content changes under a stable path.
    #[default]
    Path,
    /// Key by sha256 of the input bytes. Correct across source edits at
    /// the cost of hashing every buffer.
    Content,
}

/// PNG recompression level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    Fast,
    Default,
    #[default]
    Best,
}

/// PNG codec parameters (lossless recompression)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PngOptions {
    pub compression: PngCompression,
}

/// JPEG codec parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JpegOptions {
    /// Quality (1-100)
    pub quality: u8,
}

impl Default for JpegOptions {
    fn default() -> Self {
        Self { quality: 100 }
    }
}

/// GIF codec parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GifOptions {
    /// Encoder speed (1-30, higher = faster, larger output)
    pub speed: i32,
    /// Re-encode every frame of animated inputs instead of the first one
    pub animated: bool,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self {
            speed: 10,
            animated: true,
        }
    }
}

/// TIFF codec parameters. The in-process encoder takes none; the block
/// exists so every routed format has one.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TiffOptions {}

/// WebP codec parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebpOptions {
    /// The in-process encoder is lossless-only; `false` is rejected per
    /// file as an unsupported parameter rather than silently ignored.
    pub lossless: bool,
}

impl Default for WebpOptions {
    fn default() -> Self {
        Self { lossless: true }
    }
}

/// AVIF codec parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvifOptions {
    /// Quality (1-100)
    pub quality: u8,
    /// Encoder speed (1-10, higher = faster, larger output)
    pub speed: u8,
}

impl Default for AvifOptions {
    fn default() -> Self {
        Self {
            quality: 100,
            speed: 4,
        }
    }
}

/// SVG cleanup parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SvgOptions {
    /// Re-run the cleanup until the output stops shrinking
    pub multipass: bool,
    /// Sort element attributes by name
    pub sort_attributes: bool,
    /// Inject `xmlns="http://www.w3.org/2000/svg"` on the root when absent
    pub add_xmlns: bool,
    /// Drop `<metadata>` subtrees
    pub remove_metadata: bool,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            multipass: true,
            sort_attributes: true,
            add_xmlns: true,
            remove_metadata: true,
        }
    }
}

/// Configuration for the optimization stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerOptions {
    /// Regex tested against the full file path when no include is set
    pub test_pattern: String,
    /// When present, selection is exactly the names this matches;
    /// the test pattern and exclude are ignored entirely
    pub include: Option<MatchSpec>,
    /// Names excluded under the default test-pattern policy
    pub exclude: Option<MatchSpec>,
    /// Also process the static public directory after the bundle pass
    pub include_public: bool,
    /// Emit the per-file savings report after the run
    pub log_stats: bool,
    /// Reuse previously optimized bytes from the cache root
    pub cache: bool,
    /// Cache root; defaults to `~/.image-optimizer/cache` when unset
    pub cache_location: Option<PathBuf>,
    /// Path-keyed (default) or content-fingerprint cache keys
    pub cache_key: CacheKeyMode,
    /// Number of files optimized concurrently
    pub workers: usize,

    pub png: PngOptions,
    pub jpeg: JpegOptions,
    pub gif: GifOptions,
    pub tiff: TiffOptions,
    pub webp: WebpOptions,
    pub avif: AvifOptions,
    pub svg: SvgOptions,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            test_pattern: DEFAULT_TEST_PATTERN.to_string(),
            include: None,
            exclude: None,
            include_public: true,
            log_stats: true,
            cache: false,
            cache_location: None,
            cache_key: CacheKeyMode::Path,
            workers: 8,
            png: PngOptions::default(),
            jpeg: JpegOptions::default(),
            gif: GifOptions::default(),
            tiff: TiffOptions::default(),
            webp: WebpOptions::default(),
            avif: AvifOptions::default(),
            svg: SvgOptions::default(),
        }
    }
}

impl OptimizerOptions {
    /// Validate configuration parameters. Matcher and pattern compilation
    /// happens here so selection errors fail fast, not per file.
    pub fn validate(&self) -> Result<(), OptimizeError> {
        if self.jpeg.quality == 0 || self.jpeg.quality > 100 {
            return Err(OptimizeError::Validation(
                "JPEG quality must be between 1 and 100".to_string(),
            ));
        }

        if self.avif.quality == 0 || self.avif.quality > 100 {
            return Err(OptimizeError::Validation(
                "AVIF quality must be between 1 and 100".to_string(),
            ));
        }

        if self.avif.speed == 0 || self.avif.speed > 10 {
            return Err(OptimizeError::Validation(
                "AVIF speed must be between 1 and 10".to_string(),
            ));
        }

        if self.gif.speed < 1 || self.gif.speed > 30 {
            return Err(OptimizeError::Validation(
                "GIF speed must be between 1 and 30".to_string(),
            ));
        }

        if self.workers == 0 {
            return Err(OptimizeError::Validation(
                "Number of workers must be greater than 0".to_string(),
            ));
        }

        regex::Regex::new(&self.test_pattern)?;

        if let Some(ref include) = self.include {
            include.compile()?;
        }
        if let Some(ref exclude) = self.exclude {
            exclude.compile()?;
        }

        Ok(())
    }

    /// Resolve the effective cache root
    pub fn cache_root(&self) -> Result<PathBuf> {
        if let Some(ref location) = self.cache_location {
            return Ok(location.clone());
        }
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory for cache root"))?;
        Ok(home.join(".image-optimizer").join("cache"))
    }

    /// Load configuration from a JSON file. Absent fields fall back to
    /// their defaults, so a partial config merges over the full one.
    pub async fn from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let options: OptimizerOptions = serde_json::from_str(&content)?;
        options.validate()?;
        Ok(options)
    }

    /// Save configuration to a JSON file
    pub async fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_options() {
        let options = OptimizerOptions::default();
        assert_eq!(options.test_pattern, DEFAULT_TEST_PATTERN);
        assert!(options.include.is_none());
        assert!(options.exclude.is_none());
        assert!(options.include_public);
        assert!(options.log_stats);
        assert!(!options.cache);
        assert_eq!(options.cache_key, CacheKeyMode::Path);
        assert_eq!(options.jpeg.quality, 100);
        assert!(options.webp.lossless);
        assert!(options.svg.multipass);
    }

    #[test]
    fn test_validation() {
        let mut options = OptimizerOptions::default();
        assert!(options.validate().is_ok());

        options.jpeg.quality = 0;
        assert!(options.validate().is_err());

        options.jpeg.quality = 80;
        options.workers = 0;
        assert!(options.validate().is_err());

        options.workers = 4;
        options.test_pattern = "([unclosed".to_string();
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_malformed_include_fails_validation() {
        let options = OptimizerOptions {
            include: Some(MatchSpec::Pattern {
                pattern: "(bad".to_string(),
            }),
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_partial_config_merges_over_defaults() {
        let options: OptimizerOptions =
            serde_json::from_str(r#"{"cache": true, "jpeg": {"quality": 85}}"#).unwrap();
        assert!(options.cache);
        assert_eq!(options.jpeg.quality, 85);
        // Untouched keys keep their defaults
        assert_eq!(options.test_pattern, DEFAULT_TEST_PATTERN);
        assert!(options.webp.lossless);
        assert_eq!(options.workers, 8);
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original = OptimizerOptions {
            cache: true,
            cache_location: Some(temp_dir.path().join("cache")),
            workers: 2,
            include: Some(MatchSpec::Exact("logo.png".to_string())),
            ..Default::default()
        };

        original.save_to_file(&config_path).await.unwrap();
        let loaded = OptimizerOptions::from_file(&config_path).await.unwrap();

        assert!(loaded.cache);
        assert_eq!(loaded.workers, 2);
        assert_eq!(loaded.include, Some(MatchSpec::Exact("logo.png".to_string())));
    }
}
