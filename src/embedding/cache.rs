//! Content-addressed cache for embedding vectors

use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Statistics about cache performance
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub size: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// Async cache mapping text to its embedding
///
/// Keys are derived from the text's SHA-256 digest, so identical input
/// always resolves to the same entry regardless of length.
pub struct EmbeddingCache {
    cache: Cache<String, Vec<f32>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        info!("Initializing embedding cache with max_size={}, ttl={:?}", max_size, ttl);

        let cache = Cache::builder()
            .max_capacity(max_size as u64)
            .time_to_live(ttl)
            .build();

        Self {
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache key for `text`: `emb_` followed by the hex SHA-256 digest
    pub fn key_for(text: &str) -> String {
        let digest = Sha256::digest(text.as_bytes());
        format!("emb_{}", hex::encode(digest))
    }

    pub async fn get(&self, text: &str) -> Option<Vec<f32>> {
        let key = Self::key_for(text);
        let result = self.cache.get(&key).await;

        if result.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit for key: {}", key);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("Cache miss for key: {}", key);
        }

        result
    }

    pub async fn put(&self, text: &str, embedding: Vec<f32>) {
        self.cache.insert(Self::key_for(text), embedding).await;
    }

    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        info!("Embedding cache cleared");
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks().await;

        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        CacheStats {
            size: self.cache.entry_count(),
            hits,
            misses,
            hit_rate: if lookups > 0 {
                hits as f64 / lookups as f64
            } else {
                0.0
            },
        }
    }
}
