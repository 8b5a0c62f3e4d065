//! # Content Cache
//!
//! An in-memory content store using Moka caching, suitable as the `store`
//! side of a proxy format.

use moka::future::Cache as MokaCache;
use tracing::{debug, warn};

use crate::content::Content;

/// Memory content store keyed by cooperation key, weighed by payload size.
#[derive(Clone)]
pub struct ContentCache {
    /// Moka cache for storing entries
    cache: MokaCache<String, Content>,
    /// Maximum size for this cache in bytes, zero for unbounded
    max_size: u64,
}

impl ContentCache {
    /// Create a new content cache with the specified size limit in bytes.
    /// A limit of zero disables size-based eviction.
    pub fn new(max_size_bytes: u64) -> Self {
        let cache = if max_size_bytes > 0 {
            MokaCache::<String, Content>::builder()
                .weigher(|_k, v: &Content| v.len().try_into().unwrap_or(u32::MAX))
                .max_capacity(max_size_bytes)
                .build()
        } else {
            MokaCache::<String, Content>::builder().build()
        };

        debug!(max_size = max_size_bytes, "Content cache created");

        Self {
            cache,
            max_size: max_size_bytes,
        }
    }

    pub async fn get(&self, key: &str) -> Option<Content> {
        self.cache.get(key).await
    }

    pub async fn put(&self, key: impl Into<String>, content: Content) {
        let key = key.into();
        let size = content.len() as u64;

        // A single entry shouldn't be larger than the total cache size
        if self.max_size > 0 && size > self.max_size {
            warn!(
                key = %key,
                size = size,
                max_size = self.max_size,
                "Entry too large for content cache, skipping"
            );
            return;
        }

        self.cache.insert(key, content).await;
    }

    pub async fn remove(&self, key: &str) {
        if self.cache.remove(key).await.is_some() {
            debug!(key = %key, "Removed entry from content cache");
        }
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
        debug!("Content cache cleared");
    }

    /// Number of entries, after flushing Moka's pending maintenance.
    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_remove() {
        let cache = ContentCache::new(1024);
        cache.put("maven:a.jar", Content::new("jar")).await;

        assert_eq!(cache.get("maven:a.jar").await, Some(Content::new("jar")));
        assert_eq!(cache.len().await, 1);

        cache.remove("maven:a.jar").await;
        assert_eq!(cache.get("maven:a.jar").await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn oversized_entries_are_skipped() {
        let cache = ContentCache::new(4);
        cache.put("maven:big.jar", Content::new("0123456789")).await;

        assert_eq!(cache.get("maven:big.jar").await, None);
    }

    #[tokio::test]
    async fn unbounded_cache_accepts_anything() {
        let cache = ContentCache::new(0);
        cache.put("npm:pkg", Content::new(vec![0u8; 64 * 1024])).await;
        cache.put("npm:other", Content::new("x")).await;

        assert_eq!(cache.len().await, 2);
        cache.clear();
        assert_eq!(cache.get("npm:pkg").await, None);
    }
}
