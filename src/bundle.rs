//! # Asset Bundle Module
//!
//! In-memory emitted-asset set the bundle pass operates on, standing in
//! for the host build tool's bundle object. Each asset carries its
//! bundle-relative path, a logical name (the file name the matchers
//! see) and the raw bytes. Replacements happen in memory; only assets
//! that were actually replaced are flushed back to disk.

use anyhow::Result;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// One emitted build artifact held in memory
#[derive(Debug, Clone)]
pub struct EmittedAsset {
    /// Logical file name (basename) used for include/exclude matching
    pub name: String,
    /// Raw content
    pub source: Vec<u8>,
}

/// The in-memory emitted-asset set for one build
#[derive(Debug, Default)]
pub struct AssetBundle {
    assets: BTreeMap<String, EmittedAsset>,
    modified: HashSet<String>,
}

impl AssetBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, source: Vec<u8>) {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        self.assets.insert(path, EmittedAsset { name, source });
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// All bundle-relative asset paths
    pub fn paths(&self) -> Vec<String> {
        self.assets.keys().cloned().collect()
    }

    /// Logical name of an asset, or the path itself when unknown
    pub fn name_of(&self, path: &str) -> String {
        self.assets
            .get(path)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| path.to_string())
    }

    pub fn source(&self, path: &str) -> Option<&[u8]> {
        self.assets.get(path).map(|a| a.source.as_slice())
    }

    /// Replace an asset's in-memory content, marking it for write-back
    pub fn replace_source(&mut self, path: &str, content: Vec<u8>) {
        if let Some(asset) = self.assets.get_mut(path) {
            asset.source = content;
            self.modified.insert(path.to_string());
        }
    }

    pub fn modified_count(&self) -> usize {
        self.modified.len()
    }

    /// Load every file beneath a build output directory into memory,
    /// keyed by its forward-slash relative path.
    pub async fn load_from_dir(dir: &Path) -> Result<Self> {
        let mut bundle = Self::new();
        for entry in WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let rel = entry
                .path()
                .strip_prefix(dir)?
                .to_string_lossy()
                .replace('\\', "/");
            let source = tokio::fs::read(entry.path()).await?;
            bundle.insert(rel, source);
        }
        debug!("loaded {} assets from {}", bundle.len(), dir.display());
        Ok(bundle)
    }

    /// Flush replaced assets back to disk. Returns how many were written.
    pub async fn write_modified(&self, dir: &Path) -> Result<usize> {
        let mut written = 0;
        for path in &self.modified {
            if let Some(asset) = self.assets.get(path) {
                let dest = dir.join(path);
                if let Some(parent) = dest.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&dest, &asset.source).await?;
                written += 1;
            }
        }
        debug!("wrote {} modified assets back to {}", written, dir.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_name_is_basename() {
        let mut bundle = AssetBundle::new();
        bundle.insert("assets/img/logo.png", vec![1, 2, 3]);
        assert_eq!(bundle.name_of("assets/img/logo.png"), "logo.png");
    }

    #[test]
    fn test_replace_marks_modified() {
        let mut bundle = AssetBundle::new();
        bundle.insert("a.png", vec![1]);
        bundle.insert("b.png", vec![2]);
        assert_eq!(bundle.modified_count(), 0);

        bundle.replace_source("a.png", vec![9, 9]);
        assert_eq!(bundle.modified_count(), 1);
        assert_eq!(bundle.source("a.png"), Some(&[9u8, 9][..]));
        assert_eq!(bundle.source("b.png"), Some(&[2u8][..]));
    }

    #[tokio::test]
    async fn test_load_and_write_roundtrip() {
        let temp = TempDir::new().unwrap();
        tokio::fs::create_dir_all(temp.path().join("img")).await.unwrap();
        tokio::fs::write(temp.path().join("img/a.png"), b"original").await.unwrap();
        tokio::fs::write(temp.path().join("index.html"), b"<html>").await.unwrap();

        let mut bundle = AssetBundle::load_from_dir(temp.path()).await.unwrap();
        assert_eq!(bundle.len(), 2);

        bundle.replace_source("img/a.png", b"optimized".to_vec());
        let written = bundle.write_modified(temp.path()).await.unwrap();
        assert_eq!(written, 1);

        let on_disk = tokio::fs::read(temp.path().join("img/a.png")).await.unwrap();
        assert_eq!(on_disk, b"optimized");
        // Untouched assets are not rewritten
        let html = tokio::fs::read(temp.path().join("index.html")).await.unwrap();
        assert_eq!(html, b"<html>");
    }
}
