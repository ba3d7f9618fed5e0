//! Content-addressed specification cache using moka
//!
//! Sessions that load byte-identical documents with the same normalizer
//! settings share one `Arc<Specification>`.

use moka::sync::Cache;
use specops_model::{DocumentHash, SpecResult, Specification};
use std::sync::Arc;
use std::time::Duration;

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
    /// Lookups answered from cache
    pub hits: u64,
    /// Lookups that had to build the model
    pub misses: u64,
}

/// Cache key: document bytes plus the settings that shape the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecCacheKey {
    hash: DocumentHash,
    cycle_expansion_depth: u32,
}

impl SpecCacheKey {
    /// Create key
    #[inline]
    #[must_use]
    pub fn new(hash: DocumentHash, cycle_expansion_depth: u32) -> Self {
        Self {
            hash,
            cycle_expansion_depth,
        }
    }

    /// Get document hash
    #[inline]
    #[must_use]
    pub fn hash(&self) -> &DocumentHash {
        &self.hash
    }
}

/// Bounded cache of loaded specifications
#[derive(Debug, Clone)]
pub struct SpecCache {
    inner: Cache<SpecCacheKey, Arc<Specification>>,
    hits: Arc<std::sync::atomic::AtomicU64>,
    misses: Arc<std::sync::atomic::AtomicU64>,
}

impl SpecCache {
    /// Create new cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self::from_cache(Cache::new(max_capacity))
    }

    /// Create cache with time-based expiration
    #[inline]
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self::from_cache(
            Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        )
    }

    fn from_cache(inner: Cache<SpecCacheKey, Arc<Specification>>) -> Self {
        Self {
            inner,
            hits: Arc::default(),
            misses: Arc::default(),
        }
    }

    /// Get cached specification
    #[inline]
    #[must_use]
    pub fn get(&self, key: &SpecCacheKey) -> Option<Arc<Specification>> {
        self.inner.get(key)
    }

    /// Insert specification
    #[inline]
    pub fn insert(&self, key: SpecCacheKey, spec: Arc<Specification>) {
        self.inner.insert(key, spec);
    }

    /// Get cached specification or build it
    ///
    /// # Errors
    /// Propagates the build error; failures are not cached.
    pub fn try_get_or_insert_with<F>(&self, key: SpecCacheKey, f: F) -> SpecResult<Arc<Specification>>
    where
        F: FnOnce() -> SpecResult<Specification>,
    {
        use std::sync::atomic::Ordering;

        if let Some(cached) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Specification cache hit for {}", key.hash().short());
            return Ok(cached);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let spec = Arc::new(f()?);
        self.insert(key, Arc::clone(&spec));
        Ok(spec)
    }

    /// Invalidate cache entry
    #[inline]
    pub fn invalidate(&self, key: &SpecCacheKey) {
        self.inner.invalidate(key);
    }

    /// Invalidate all entries
    #[inline]
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        use std::sync::atomic::Ordering;

        CacheStats {
            entry_count: self.inner.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for SpecCache {
    /// Create cache with default capacity (16 documents)
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FormatHint, SpecNormalizer};
    use specops_model::SpecError;

    const DOC: &str = r#"{"openapi": "3.0.3", "info": {"title": "t", "version": "1"}, "paths": {"/a": {"get": {"responses": {}}}}}"#;

    #[test]
    fn second_lookup_shares_model() {
        let cache = SpecCache::new(4);
        let normalizer = SpecNormalizer::default();
        let key = SpecCacheKey::new(DocumentHash::compute(DOC.as_bytes()), 1);

        let first = cache
            .try_get_or_insert_with(key, || normalizer.load(DOC.as_bytes(), FormatHint::Json))
            .unwrap();
        let second = cache
            .try_get_or_insert_with(key, || panic!("should be cached"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = SpecCache::default();
        let key = SpecCacheKey::new(DocumentHash::compute(b"bad"), 1);
        let result = cache.try_get_or_insert_with(key, || Err(SpecError::malformed("bad")));
        assert!(result.is_err());
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn depth_is_part_of_key() {
        let hash = DocumentHash::compute(DOC.as_bytes());
        assert_ne!(SpecCacheKey::new(hash, 1), SpecCacheKey::new(hash, 2));
    }
}
