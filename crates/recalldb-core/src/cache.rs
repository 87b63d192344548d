//! Content-addressed memoization for expensive calls.
//!
//! Keys are a BLAKE3 digest of `(operation, serialized arguments)`. Values are
//! the JSON form of the computed result. A hit must never change behavior,
//! only latency: failures are not cached, and a failed write degrades to
//! "no cache for this call" instead of failing the caller.
//!
//! There is no lock around `compute`: two concurrent callers with the same key
//! may both compute and both write the same value.

use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Error;

/// Hex BLAKE3 digest of a text; keys long inputs without storing them.
pub fn content_hash(s: &str) -> String {
    blake3::hash(s.as_bytes()).to_hex().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: String,
    digest: String,
}

impl CacheKey {
    /// Derive a key from an operation name and every argument that affects
    /// the result (text, model id, prompt parameters).
    pub fn derive<A: Serialize + ?Sized>(operation: &str, args: &A) -> Result<Self> {
        let encoded = serde_json::to_vec(args).context("cache key arguments are not serializable")?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(operation.as_bytes());
        hasher.update(&[0]);
        hasher.update(&encoded);
        Ok(Self { operation: operation.to_string(), digest: hasher.finalize().to_hex().to_string() })
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.operation, self.digest)
    }
}

/// Raw key/value persistence behind [`DeterministicCache`].
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &CacheKey, value: &[u8]) -> Result<()>;
    /// Remove every entry; returns how many were removed.
    fn clear(&self) -> Result<usize>;
}

/// One JSON file per entry under `<root>/<operation>/<digest>.json`.
///
/// Entries are written to a temp file in the same directory and renamed into
/// place, so readers never observe a partial value.
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.operation()).join(format!("{}.json", key.digest()))
    }
}

impl CacheStore for DiskCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow!("failed to read {}: {}", path.display(), e)),
        }
    }

    fn put(&self, key: &CacheKey, value: &[u8]) -> Result<()> {
        let path = self.entry_path(key);
        let dir = path.parent().ok_or_else(|| anyhow!("cache entry has no parent dir"))?;
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(value)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| anyhow!("failed to persist {}: {}", path.display(), e.error))?;
        Ok(())
    }

    fn clear(&self) -> Result<usize> {
        if !self.root.exists() {
            return Ok(0);
        }
        let mut removed = 0usize;
        for op_dir in fs::read_dir(&self.root)? {
            let op_dir = op_dir?.path();
            if !op_dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&op_dir)? {
                let entry = entry?.path();
                if entry.extension().and_then(|s| s.to_str()) == Some("json") {
                    removed += 1;
                }
            }
            fs::remove_dir_all(&op_dir)?;
        }
        Ok(removed)
    }
}

/// Process-local store, used by tests and when caching is disabled on disk.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.lock().map_err(|_| anyhow!("memory cache poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &CacheKey, value: &[u8]) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("memory cache poisoned"))?;
        entries.insert(key.clone(), value.to_vec());
        Ok(())
    }

    fn clear(&self) -> Result<usize> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("memory cache poisoned"))?;
        let n = entries.len();
        entries.clear();
        Ok(n)
    }
}

/// Memoizing front of a [`CacheStore`]. Cheap to clone.
#[derive(Clone)]
pub struct DeterministicCache {
    store: Arc<dyn CacheStore>,
}

impl DeterministicCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn on_disk(root: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(DiskCache::new(root)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()))
    }

    pub fn clear(&self) -> Result<usize> {
        self.store.clear()
    }

    /// Return the cached value for `key`, or run `compute` and persist its
    /// result. Errors from `compute` propagate and nothing is stored. If the
    /// returned future is dropped before `compute` finishes, nothing is stored.
    pub async fn get_or_compute<T, E, F, Fut>(&self, key: &CacheKey, compute: F) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        match self.store.get(key) {
            Ok(Some(bytes)) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => {
                    debug!(%key, "cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(%key, error = %e, "undecodable cache entry; recomputing"),
            },
            Ok(None) => debug!(%key, "cache miss"),
            Err(e) => warn!(%key, error = %e, "cache read failed; recomputing"),
        }

        let value = compute().await?;

        if let Err(e) = self.write(key, &value) {
            warn!("{e}");
        }
        Ok(value)
    }

    fn write<T: Serialize>(&self, key: &CacheKey, value: &T) -> std::result::Result<(), Error> {
        let to_err = |message: String| Error::CacheWrite { key: key.to_string(), message };
        let bytes = serde_json::to_vec(value).map_err(|e| to_err(e.to_string()))?;
        self.store.put(key, &bytes).map_err(|e| to_err(format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn key_depends_on_operation_and_every_argument() {
        let a = CacheKey::derive("embed", &("model-a", "text")).unwrap();
        assert_eq!(a, CacheKey::derive("embed", &("model-a", "text")).unwrap());
        assert_ne!(a, CacheKey::derive("embed", &("model-b", "text")).unwrap());
        assert_ne!(a, CacheKey::derive("judge", &("model-a", "text")).unwrap());
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let cache = DeterministicCache::in_memory();
        let key = CacheKey::derive("op", &"x").unwrap();
        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            let v: u32 = cache
                .get_or_compute(&key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(7)
                })
                .await
                .unwrap();
            assert_eq!(v, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let store = Arc::new(MemoryCache::new());
        let cache = DeterministicCache::new(store.clone());
        let key = CacheKey::derive("op", &"x").unwrap();
        let res: std::result::Result<u32, anyhow::Error> =
            cache.get_or_compute(&key, || async { Err(anyhow!("boom")) }).await;
        assert!(res.is_err());
        assert!(store.is_empty());
    }

    struct ReadOnlyStore;
    impl CacheStore for ReadOnlyStore {
        fn get(&self, _key: &CacheKey) -> Result<Option<Vec<u8>>> { Ok(None) }
        fn put(&self, _key: &CacheKey, _value: &[u8]) -> Result<()> { Err(anyhow!("read-only")) }
        fn clear(&self) -> Result<usize> { Ok(0) }
    }

    #[tokio::test]
    async fn write_failure_does_not_fail_caller() {
        let cache = DeterministicCache::new(Arc::new(ReadOnlyStore));
        let key = CacheKey::derive("op", &"x").unwrap();
        let v: String = cache
            .get_or_compute(&key, || async { Ok::<_, anyhow::Error>("value".to_string()) })
            .await
            .unwrap();
        assert_eq!(v, "value");
    }
}
