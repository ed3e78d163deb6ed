//! One-shot public key cache.
//!
//! The provider's RSA public key is looked up in three places, in order: the in-memory
//! slot, the persisted PEM file, and finally the issuance endpoint. A fetched key is
//! written to disk before it is cached, so later processes skip the network call.
//!
//! The slot lock is held for the whole lookup. Concurrent first-time callers therefore
//! wait for the first caller's fetch instead of issuing their own.

use std::{
    future::Future,
    io::{self, Write as _},
    path::{Path, PathBuf},
    sync::Arc,
};

use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::error::{Result, TransferError};

/// In-memory and on-disk cache of a single PEM public key.
#[derive(Debug)]
pub struct PublicKeyCache {
    path: PathBuf,
    slot: Mutex<Option<Arc<str>>>,
}

impl PublicKeyCache {
    /// Creates an empty cache persisting to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), slot: Mutex::new(None) }
    }

    /// Returns the file the key is persisted to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the cached key, loading or fetching it on first use.
    ///
    /// `fetch` runs only when neither the slot nor the file holds a key. Its result is
    /// persisted, then cached. If `fetch` fails nothing is written and the error is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the error of `fetch`, or [`TransferError::IoError`] if the file cannot be
    /// read or written.
    #[instrument(skip(self, fetch), fields(path = %self.path.display()))]
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<Arc<str>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let mut slot = self.slot.lock().await;

        if let Some(key) = slot.as_ref() {
            debug!("public key served from memory");
            return Ok(Arc::clone(key));
        }

        if let Some(pem) = self.read_persisted().await? {
            debug!("public key loaded from disk");
            let key: Arc<str> = pem.into();
            *slot = Some(Arc::clone(&key));
            return Ok(key);
        }

        let pem = fetch().await?;
        self.persist(&pem).await?;
        info!("public key persisted");

        let key: Arc<str> = pem.into();
        *slot = Some(Arc::clone(&key));
        Ok(key)
    }

    /// Drops the cached key and removes the persisted file.
    ///
    /// The next [`get_or_fetch`](Self::get_or_fetch) fetches a fresh key.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::IoError`] if the file exists but cannot be removed.
    pub async fn invalidate(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        *slot = None;

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "public key invalidated");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_persisted(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            // An empty file is what an interrupted writer without rename would leave.
            Ok(pem) if pem.is_empty() => Ok(None),
            Ok(pem) => Ok(Some(pem)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, pem: &str) -> Result<()> {
        let path = self.path.clone();
        let pem = pem.to_owned();
        tokio::task::spawn_blocking(move || write_atomic(&path, &pem))
            .await
            .map_err(|e| TransferError::IoError(io::Error::other(e)))?
    }
}

/// Writes `contents` to a temporary file next to `path`, then renames it over `path`.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| TransferError::IoError(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const PEM: &str = "-----BEGIN RSA PUBLIC KEY-----\nMIIBCgKCAQEA\n-----END RSA PUBLIC KEY-----\n";

    #[tokio::test]
    async fn test_fetches_once_then_serves_memory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PublicKeyCache::new(dir.path().join("key.pem"));
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        for _ in 0..3 {
            let key = cache
                .get_or_fetch(move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(PEM.to_owned())
                })
                .await
                .unwrap();
            assert_eq!(&*key, PEM);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read_to_string(cache.path()).unwrap(), PEM);
    }

    #[tokio::test]
    async fn test_persisted_file_skips_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.pem");
        std::fs::write(&path, "not even a key").unwrap();

        let cache = PublicKeyCache::new(&path);
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let key = cache
            .get_or_fetch(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(PEM.to_owned())
            })
            .await
            .unwrap();

        assert_eq!(&*key, "not even a key");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_file_triggers_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.pem");
        std::fs::write(&path, "").unwrap();

        let cache = PublicKeyCache::new(&path);
        let key = cache.get_or_fetch(|| async { Ok(PEM.to_owned()) }).await.unwrap();
        assert_eq!(&*key, PEM);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), PEM);
    }

    #[tokio::test]
    async fn test_fetch_error_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PublicKeyCache::new(dir.path().join("key.pem"));

        let err = cache
            .get_or_fetch(|| async {
                Err::<String, _>(TransferError::MerchantMismatch {
                    expected: "1900000109".into(),
                    actual: "1900000110".into(),
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::MerchantMismatch { .. }));
        assert!(!cache.path().exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0, "no temp file left");

        let key = cache.get_or_fetch(|| async { Ok(PEM.to_owned()) }).await.unwrap();
        assert_eq!(&*key, PEM);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PublicKeyCache::new(dir.path().join("key.pem"));
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let fetch = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(PEM.to_owned())
        };

        let (a, b, c) = tokio::join!(
            cache.get_or_fetch(fetch),
            cache.get_or_fetch(fetch),
            cache.get_or_fetch(fetch)
        );

        assert_eq!(&*a.unwrap(), PEM);
        assert_eq!(&*b.unwrap(), PEM);
        assert_eq!(&*c.unwrap(), PEM);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_persist_overwrites_and_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("key.pem");

        write_atomic(&path, "old").unwrap();
        write_atomic(&path, PEM).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), PEM);
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PublicKeyCache::new(dir.path().join("key.pem"));

        cache.get_or_fetch(|| async { Ok("first".to_owned()) }).await.unwrap();
        cache.invalidate().await.unwrap();
        assert!(!cache.path().exists());

        let key = cache.get_or_fetch(|| async { Ok("second".to_owned()) }).await.unwrap();
        assert_eq!(&*key, "second");

        // Invalidating twice is fine.
        cache.invalidate().await.unwrap();
        cache.invalidate().await.unwrap();
    }
}
