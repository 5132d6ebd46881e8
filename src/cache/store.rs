//! Filesystem-backed page cache.
//!
//! Each entry is one file in the cache directory named by its [`CacheKey`].
//! Existence is validity: nothing is indexed in memory and reload wipes
//! every sentinel-prefixed file.

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::future::join_all;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use super::keys::CacheKey;

const TARGET: &str = "vellum::cache";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to prepare cache directory `{}`", path.display())]
    Prepare {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to list cache directory `{}`", path.display())]
    List {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read cache entry `{key}`")]
    Read {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write cache entry `{key}`")]
    Write {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove {failed} of {attempted} cache entries")]
    Clear {
        failed: usize,
        attempted: usize,
        #[source]
        source: io::Error,
    },
}

/// Rendered pages stored as files under a single directory.
#[derive(Debug, Clone)]
pub struct PageCache {
    root: PathBuf,
}

impl PageCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// Delete every cache-owned file, returning how many were removed.
    ///
    /// The directory is created when missing. Files without the sentinel
    /// prefix and subdirectories are left untouched. Every deletion is
    /// attempted even when some fail; failures are then reported together.
    pub async fn clear(&self) -> Result<usize, CacheError> {
        self.ensure_root().await?;

        let names = self.list_names().await?;
        let attempted = names.len();

        let removals = names.into_iter().map(|name| async move {
            let path = self.root.join(&name);
            debug!(target = TARGET, entry = %name, "clearing cache entry");
            match fs::remove_file(&path).await {
                Ok(()) => Ok(true),
                // Raced with another removal; the entry is gone either way.
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
                Err(err) => {
                    warn!(target = TARGET, entry = %name, error = %err, "failed to clear cache entry");
                    Err(err)
                }
            }
        });

        let mut removed = 0;
        let mut failed = 0;
        let mut first_error = None;
        for result in join_all(removals).await {
            match result {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(err) => {
                    failed += 1;
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Some(source) = first_error {
            return Err(CacheError::Clear {
                failed,
                attempted,
                source,
            });
        }

        info!(target = TARGET, removed, root = %self.root.display(), "cache cleared");
        Ok(removed)
    }

    /// Read the entry for a request path; a missing file is a miss.
    pub async fn read(&self, path: &str) -> Result<Option<Bytes>, CacheError> {
        self.read_key(&CacheKey::from_path(path)).await
    }

    pub async fn read_key(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheError> {
        match fs::read(self.file_path(key)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Read {
                key: key.to_string(),
                source,
            }),
        }
    }

    /// Write the entry for a request path, replacing any previous content.
    pub async fn write(&self, path: &str, body: &[u8]) -> Result<(), CacheError> {
        self.write_key(&CacheKey::from_path(path), body).await
    }

    pub async fn write_key(&self, key: &CacheKey, body: &[u8]) -> Result<(), CacheError> {
        let target = self.file_path(key);
        let result = match fs::write(&target, body).await {
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.ensure_root().await?;
                fs::write(&target, body).await
            }
            other => other,
        };

        result.map_err(|source| CacheError::Write {
            key: key.to_string(),
            source,
        })
    }

    /// Names of every cache-owned file, sorted.
    pub async fn entries(&self) -> Result<Vec<String>, CacheError> {
        match self.list_names().await {
            Err(CacheError::List { source, .. }) if source.kind() == ErrorKind::NotFound => {
                Ok(Vec::new())
            }
            other => other,
        }
    }

    async fn ensure_root(&self) -> Result<(), CacheError> {
        // create_dir_all treats an existing directory as success.
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| CacheError::Prepare {
                path: self.root.clone(),
                source,
            })
    }

    async fn list_names(&self) -> Result<Vec<String>, CacheError> {
        let list_error = |source| CacheError::List {
            path: self.root.clone(),
            source,
        };

        let mut dir = fs::read_dir(&self.root).await.map_err(list_error)?;
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(list_error)? {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if !CacheKey::is_cache_file(&name) {
                continue;
            }
            let file_type = entry.file_type().await.map_err(list_error)?;
            if file_type.is_dir() {
                warn!(target = TARGET, entry = %name, "skipping directory with cache prefix");
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_then_read_round_trips_exact_bytes() {
        let tmp = TempDir::new().unwrap();
        let cache = PageCache::new(tmp.path().join("render"));

        let body = b"<html>\x00\xff binary-safe</html>";
        cache.write("/posts/1700000000000", body).await.unwrap();

        let read = cache.read("/posts/1700000000000").await.unwrap();
        assert_eq!(read.as_deref(), Some(&body[..]));
        assert!(tmp.path().join("render/@.posts.1700000000000").is_file());
    }

    #[tokio::test]
    async fn missing_entry_is_a_miss() {
        let tmp = TempDir::new().unwrap();
        let cache = PageCache::new(tmp.path());
        assert_eq!(cache.read("/nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_directory_is_a_miss() {
        let tmp = TempDir::new().unwrap();
        let cache = PageCache::new(tmp.path().join("absent"));
        assert_eq!(cache.read("/").await.unwrap(), None);
        assert!(cache.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_overwrites_and_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let cache = PageCache::new(tmp.path().join("nested/render"));

        cache.write("/", b"first").await.unwrap();
        cache.write("/", b"second").await.unwrap();

        assert_eq!(
            cache.read("/").await.unwrap().as_deref(),
            Some(&b"second"[..])
        );
    }

    #[tokio::test]
    async fn trailing_slash_shares_an_entry() {
        let tmp = TempDir::new().unwrap();
        let cache = PageCache::new(tmp.path());

        cache.write("/rss/", b"<rss/>").await.unwrap();
        assert_eq!(
            cache.read("/rss").await.unwrap().as_deref(),
            Some(&b"<rss/>"[..])
        );
    }

    #[tokio::test]
    async fn clear_removes_only_sentinel_files() {
        let tmp = TempDir::new().unwrap();
        let cache = PageCache::new(tmp.path());

        for index in 0..25 {
            cache
                .write(&format!("/page/{index}"), b"cached")
                .await
                .unwrap();
        }
        cache
            .write_key(&CacheKey::not_found(), b"missing")
            .await
            .unwrap();
        std::fs::write(tmp.path().join("keep.txt"), b"not ours").unwrap();
        std::fs::create_dir(tmp.path().join("@dir")).unwrap();

        let removed = cache.clear().await.unwrap();
        assert_eq!(removed, 26);
        assert!(cache.entries().await.unwrap().is_empty());
        assert!(tmp.path().join("keep.txt").is_file());
        assert!(tmp.path().join("@dir").is_dir());
    }

    #[tokio::test]
    async fn clear_creates_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("render");
        let cache = PageCache::new(&root);

        assert_eq!(cache.clear().await.unwrap(), 0);
        assert!(root.is_dir());
        assert_eq!(cache.clear().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn entries_lists_sorted_cache_files() {
        let tmp = TempDir::new().unwrap();
        let cache = PageCache::new(tmp.path());
        cache.write("/tags/b", b"b").await.unwrap();
        cache.write("/tags/a", b"a").await.unwrap();
        std::fs::write(tmp.path().join("page.html"), b"template").unwrap();

        assert_eq!(
            cache.entries().await.unwrap(),
            vec!["@.tags.a".to_string(), "@.tags.b".to_string()]
        );
    }
}
