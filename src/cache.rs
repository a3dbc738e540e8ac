//! # Cache Store Module
//!
//! On-disk cache of previously optimized bytes between runs.
//!
//! ## Layout:
//! - `Path` key mode (default): the file's logical path is mirrored
//!   beneath the cache root, directories created lazily. No hashing
//!   cost; entries can go stale when source content changes under a
//!   stable path.
//! - `Content` key mode (opt-in): entries live at
//!   `<root>/<hh>/<sha256-hex>` where `hh` is the first hash byte.
//!   Correct across source edits, costs one hash per buffer.
//!
//! ## Lifecycle:
//! Written once per distinct key after a successful optimization; read
//! on every subsequent build; never invalidated automatically. Writes
//! overwrite unconditionally, last writer wins. Directory creation uses
//! `create_dir_all`, so concurrent creation of the same parent is safe.

use crate::config::CacheKeyMode;
use crate::error::OptimizeError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Path-keyed store of optimized buffers beneath a cache root
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    key_mode: CacheKeyMode,
}

impl CacheStore {
    pub fn new(root: PathBuf, key_mode: CacheKeyMode) -> Self {
        Self { root, key_mode }
    }

    /// Derive the on-disk location for a file's cache entry.
    pub fn key_for(&self, path: &str, buffer: &[u8]) -> PathBuf {
        match self.key_mode {
            CacheKeyMode::Path => self.root.join(path),
            CacheKeyMode::Content => {
                let mut hasher = Sha256::new();
                hasher.update(buffer);
                let digest = hex::encode(hasher.finalize());
                self.root.join(&digest[..2]).join(digest)
            }
        }
    }

    /// Idempotent creation of the cache root. Invoked once per pass,
    /// before any file is processed, when caching is enabled and the
    /// batch is non-empty.
    pub async fn ensure_root(&self) -> Result<(), OptimizeError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Return the previously stored bytes for a key, if present.
    pub async fn lookup(&self, key: &Path) -> Result<Option<Vec<u8>>, OptimizeError> {
        match fs::read(key).await {
            Ok(bytes) => {
                debug!("cache hit: {}", key.display());
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist optimized bytes under a key, creating parent directories
    /// as needed. Overwrites unconditionally.
    pub async fn store(&self, key: &Path, bytes: &[u8]) -> Result<(), OptimizeError> {
        if let Some(parent) = key.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(key, bytes).await?;
        debug!("cache store: {} ({} bytes)", key.display(), bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lookup_misses_then_hits_after_store() {
        let temp = TempDir::new().unwrap();
        let cache = CacheStore::new(temp.path().join("cache"), CacheKeyMode::Path);
        cache.ensure_root().await.unwrap();

        let key = cache.key_for("assets/nested/a.png", b"irrelevant");
        assert!(cache.lookup(&key).await.unwrap().is_none());

        cache.store(&key, b"optimized bytes").await.unwrap();
        let found = cache.lookup(&key).await.unwrap();
        assert_eq!(found.as_deref(), Some(&b"optimized bytes"[..]));
    }

    #[tokio::test]
    async fn test_path_keys_mirror_logical_path() {
        let temp = TempDir::new().unwrap();
        let cache = CacheStore::new(temp.path().to_path_buf(), CacheKeyMode::Path);
        let key = cache.key_for("img/logo.png", b"");
        assert_eq!(key, temp.path().join("img/logo.png"));
    }

    #[tokio::test]
    async fn test_content_keys_depend_on_bytes_not_path() {
        let temp = TempDir::new().unwrap();
        let cache = CacheStore::new(temp.path().to_path_buf(), CacheKeyMode::Content);
        let a = cache.key_for("a.png", b"same bytes");
        let b = cache.key_for("b.png", b"same bytes");
        let c = cache.key_for("a.png", b"other bytes");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_ensure_root_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let cache = CacheStore::new(temp.path().join("cache"), CacheKeyMode::Path);
        cache.ensure_root().await.unwrap();
        cache.ensure_root().await.unwrap();
        assert!(temp.path().join("cache").is_dir());
    }

    #[tokio::test]
    async fn test_store_overwrites_unconditionally() {
        let temp = TempDir::new().unwrap();
        let cache = CacheStore::new(temp.path().to_path_buf(), CacheKeyMode::Path);
        let key = cache.key_for("a.png", b"");
        cache.store(&key, b"first").await.unwrap();
        cache.store(&key, b"second").await.unwrap();
        assert_eq!(cache.lookup(&key).await.unwrap().as_deref(), Some(&b"second"[..]));
    }
}
