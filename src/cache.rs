/// Flat, content-addressed poster cache.
///
/// File names are a digest of the *source URL*, not of the image bytes, so a
/// path can be computed before anything is downloaded. There is no eviction;
/// the directory lives under a temp location and is cleaned up externally.
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{KinoError, Result};

/// Hex characters kept from the SHA-256 digest (128 bits).
const KEY_LEN: usize = 32;

/// Digest of an image URL, used as the on-disk file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_url(image_url: &str) -> Self {
        let digest = Sha256::digest(image_url.as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(KEY_LEN);
        CacheKey(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct AssetCache {
    root: PathBuf,
}

impl AssetCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Local path for `image_url`. Pure: no I/O, independent of call order.
    pub fn path_for(&self, image_url: &str) -> PathBuf {
        self.path_for_key(&CacheKey::for_url(image_url))
    }

    pub fn path_for_key(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// Create the cache root if needed. Idempotent.
    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| KinoError::CacheUnavailable {
                path: self.root.clone(),
                source,
            })
    }

    pub async fn has(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    /// Write `bytes` to `path`, replacing any previous file atomically.
    pub async fn store(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let part = part_path(path);
        if let Err(e) = tokio::fs::write(&part, bytes).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e.into());
        }
        self.commit(&part, path).await
    }

    async fn commit(&self, part: &Path, path: &Path) -> Result<()> {
        if let Err(e) = tokio::fs::rename(part, path).await {
            let _ = tokio::fs::remove_file(part).await;
            return Err(e.into());
        }
        debug!("Cached {}", path.display());
        Ok(())
    }
}

/// Sibling temp file written before the rename into place.
pub(crate) fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn path_for_is_deterministic() {
        let cache = AssetCache::new("/tmp/kinoImages");
        let a = cache.path_for("http://x/a.jpg");
        let b = cache.path_for("http://x/a.jpg");
        assert_eq!(a, b);
        assert!(a.starts_with("/tmp/kinoImages"));
    }

    #[test]
    fn different_urls_get_different_paths() {
        let cache = AssetCache::new("/tmp/kinoImages");
        let paths: std::collections::HashSet<_> = (0..500)
            .map(|i| cache.path_for(&format!("https://img.example/{i}/poster.jpg")))
            .collect();
        assert_eq!(paths.len(), 500);
    }

    #[test]
    fn key_is_hex_without_extension() {
        let key = CacheKey::for_url("https://img.example/poster.jpg");
        assert_eq!(key.as_str().len(), KEY_LEN);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn ensure_root_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("nested/images");
        let cache = AssetCache::new(&root);
        cache.ensure_root().await.unwrap();
        cache.ensure_root().await.unwrap();
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn ensure_root_fails_when_blocked_by_file() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let cache = AssetCache::new(blocker.join("images"));
        let err = cache.ensure_root().await.unwrap_err();
        assert!(matches!(err, KinoError::CacheUnavailable { .. }));
    }

    #[tokio::test]
    async fn store_then_has() {
        let tmp = TempDir::new().unwrap();
        let cache = AssetCache::new(tmp.path());
        let path = cache.path_for("http://x/a.jpg");
        assert!(!cache.has(&path).await);

        cache.store(&path, b"one").await.unwrap();
        assert!(cache.has(&path).await);
        cache.store(&path, b"two").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"two");
        assert!(!part_path(&path).exists());
    }
}
