//! Cross-request caching
//!
//! Provides:
//! - Redis-backed persistent cache (multiplexed connection)
//! - Bounded in-memory fallback cache with TTL
//! - A tiered wrapper trying an ordered list of stores
//! - Cache key builders
//!
//! Every operation is best-effort: a cache failure is logged and treated
//! as a miss, never propagated. Writes are last-write-wins; staleness is
//! bounded by the TTL.

use crate::config::CacheSettings;
use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// A single cache backend; raw string values, best-effort semantics
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_raw(&self, key: &str) -> Option<String>;

    async fn set_raw(&self, key: &str, value: String, ttl_secs: u64);
}

/// Redis cache backend
pub struct RedisCache {
    connection: RwLock<MultiplexedConnection>,
}

impl RedisCache {
    /// Connect to Redis; returns None (with a warning) when the server
    /// is unreachable so callers can fall back to memory only
    pub async fn connect(url: &str) -> Option<Self> {
        let client = match Client::open(url) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Invalid Redis URL, persistent cache disabled");
                return None;
            }
        };

        match client.get_multiplexed_async_connection().await {
            Ok(connection) => Some(Self {
                connection: RwLock::new(connection),
            }),
            Err(e) => {
                warn!(error = %e, "Redis unreachable, persistent cache disabled");
                None
            }
        }
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get_raw(&self, key: &str) -> Option<String> {
        let mut conn = self.connection.write().await;
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(e) => {
                debug!(key = %key, error = %e, "Redis get failed");
                None
            }
        }
    }

    async fn set_raw(&self, key: &str, value: String, ttl_secs: u64) {
        let mut conn = self.connection.write().await;
        if let Err(e) = conn.set_ex::<_, _, ()>(key, value, ttl_secs).await {
            debug!(key = %key, error = %e, "Redis set failed");
        }
    }
}

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

struct MemoryInner {
    map: HashMap<String, MemoryEntry>,
    order: VecDeque<String>,
}

/// Bounded in-memory cache with TTL, used when Redis is absent or down
pub struct MemoryCache {
    inner: Mutex<MemoryInner>,
    capacity: usize,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    fn evict(inner: &mut MemoryInner, capacity: usize) {
        // Drop expired entries first, then the oldest inserted
        let now = Instant::now();
        inner.map.retain(|_, entry| entry.expires_at > now);
        inner.order.retain(|key| inner.map.contains_key(key));

        while inner.map.len() >= capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.map.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_raw(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.lock().await;
        let expired = match inner.map.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.map.remove(key);
        }
        None
    }

    async fn set_raw(&self, key: &str, value: String, ttl_secs: u64) {
        let mut inner = self.inner.lock().await;
        if !inner.map.contains_key(key) {
            Self::evict(&mut inner, self.capacity);
            inner.order.push_back(key.to_string());
        }
        inner.map.insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: Instant::now() + Duration::from_secs(ttl_secs),
            },
        );
    }
}

/// Ordered chain of cache stores: reads try each store in turn, writes
/// go to all of them
#[derive(Clone)]
pub struct TieredCache {
    stores: Vec<Arc<dyn CacheStore>>,
    key_prefix: String,
    default_ttl_secs: u64,
}

impl TieredCache {
    /// Build from settings: Redis first when configured and reachable,
    /// always backed by the bounded in-memory cache
    pub async fn from_settings(settings: &CacheSettings) -> Self {
        let mut stores: Vec<Arc<dyn CacheStore>> = Vec::new();

        if let Some(url) = &settings.redis_url {
            if let Some(redis) = RedisCache::connect(url).await {
                stores.push(Arc::new(redis));
            }
        }
        stores.push(Arc::new(MemoryCache::new(settings.memory_capacity)));

        Self {
            stores,
            key_prefix: settings.key_prefix.clone(),
            default_ttl_secs: settings.default_ttl_secs,
        }
    }

    /// Memory-only cache, used in tests and when Redis is not configured
    pub fn memory_only(capacity: usize) -> Self {
        Self {
            stores: vec![Arc::new(MemoryCache::new(capacity))],
            key_prefix: "seekr".to_string(),
            default_ttl_secs: 600,
        }
    }

    /// Build a prefixed key
    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    /// Get a value, trying each store in order
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full_key = self.key(key);

        for store in &self.stores {
            if let Some(raw) = store.get_raw(&full_key).await {
                match serde_json::from_str(&raw) {
                    Ok(parsed) => {
                        debug!(key = %full_key, store = store.name(), "Cache hit");
                        crate::metrics::record_cache(true, store.name());
                        return Some(parsed);
                    }
                    Err(e) => {
                        debug!(key = %full_key, error = %e, "Failed to parse cached value");
                    }
                }
            }
        }

        crate::metrics::record_cache(false, "tiered");
        None
    }

    /// Set a value in every store with the default TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        self.set_with_ttl(key, value, self.default_ttl_secs).await;
    }

    /// Set a value in every store with a custom TTL
    pub async fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let full_key = self.key(key);
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %full_key, error = %e, "Failed to serialize cache value");
                return;
            }
        };

        for store in &self.stores {
            store.set_raw(&full_key, raw.clone(), ttl_secs).await;
        }
    }

    /// Get or compute with a loader function
    pub async fn get_or_load<T, F, Fut>(&self, key: &str, ttl_secs: u64, loader: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return cached;
        }

        let value = loader().await;
        self.set_with_ttl(key, &value, ttl_secs).await;
        value
    }
}

/// Cache key builder helpers
pub mod keys {
    use super::{Digest, Sha256};
    use crate::model::normalize_url;

    /// Short stable digest used to keep keys bounded
    fn digest(input: &str) -> String {
        let hash = Sha256::digest(input.as_bytes());
        hex::encode(&hash[..12])
    }

    /// Build a fetched-page cache key
    pub fn page(url: &str) -> String {
        format!("page:{}", digest(&normalize_url(url)))
    }

    /// Build a search-results cache key
    pub fn search(source: &str, query: &str) -> String {
        format!("search:{}:{}", source, digest(query))
    }

    /// Build an embedding cache key
    pub fn embedding(model: &str, text: &str) -> String {
        format!("embedding:{}:{}", model, digest(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_cache_roundtrip() {
        let cache = TieredCache::memory_only(16);
        cache.set("k", &42u32).await;
        assert_eq!(cache.get::<u32>("k").await, Some(42));
        assert_eq!(cache.get::<u32>("missing").await, None);
    }

    #[tokio::test]
    async fn test_memory_cache_capacity_bound() {
        let store = MemoryCache::new(2);
        store.set_raw("a", "1".into(), 60).await;
        store.set_raw("b", "2".into(), 60).await;
        store.set_raw("c", "3".into(), 60).await;

        // Oldest entry evicted
        assert_eq!(store.get_raw("a").await, None);
        assert_eq!(store.get_raw("c").await, Some("3".to_string()));
    }

    #[tokio::test]
    async fn test_memory_cache_ttl_expiry() {
        let store = MemoryCache::new(4);
        store.set_raw("k", "v".into(), 0).await;
        assert_eq!(store.get_raw("k").await, None);
    }

    #[tokio::test]
    async fn test_get_or_load() {
        let cache = TieredCache::memory_only(16);
        let loaded = cache
            .get_or_load("key", 60, || async { "computed".to_string() })
            .await;
        assert_eq!(loaded, "computed");

        // Second call is served from cache
        let cached = cache
            .get_or_load("key", 60, || async { "recomputed".to_string() })
            .await;
        assert_eq!(cached, "computed");
    }

    #[test]
    fn test_key_builders() {
        assert!(keys::page("https://example.com/a").starts_with("page:"));
        assert!(keys::search("web", "rust async").starts_with("search:web:"));
        assert!(keys::embedding("m", "text").starts_with("embedding:m:"));

        // Normalized URL variants share a page key
        assert_eq!(
            keys::page("https://example.com/a?x=1&y=2"),
            keys::page("https://EXAMPLE.com/a?y=2&x=1#frag")
        );
    }
}
