//! Response cache for recommendation lists.
//!
//! Values are JSON strings so any backend can hold them. The orchestrator
//! treats every cache error as a miss and recomputes.

use crate::error::CacheError;
use dashmap::DashMap;
use std::time::{Duration, Instant};

pub trait RecommendCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Drop every entry
    fn clear(&self) -> Result<(), CacheError>;
}

/// Process-local cache; expired entries are dropped on read
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: DashMap<String, (String, Instant)>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Entries currently held, expired or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RecommendCache for InMemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            let (value, expires_at) = entry.value();
            if now < *expires_at {
                return Ok(Some(value.clone()));
            }
        }
        // Expired or absent; the read guard is gone before we remove
        self.entries.remove_if(key, |_, (_, expires_at)| now >= *expires_at);
        Ok(None)
    }

    fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }
}

/// Always misses; used when caching is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl RecommendCache for NoopCache {
    fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let cache = InMemoryCache::new();
        cache.set("recommend:1", "[1,2]".to_string(), Duration::from_secs(60)).unwrap();
        assert_eq!(cache.get("recommend:1").unwrap().as_deref(), Some("[1,2]"));

        cache.remove("recommend:1").unwrap();
        assert_eq!(cache.get("recommend:1").unwrap(), None);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = InMemoryCache::new();
        cache.set("k", "v".to_string(), Duration::ZERO).unwrap();
        assert_eq!(cache.get("k").unwrap(), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let cache = InMemoryCache::new();
        for key in ["a", "b", "c"] {
            cache.set(key, key.to_string(), Duration::from_secs(60)).unwrap();
        }
        cache.clear().unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_noop_always_misses() {
        let cache = NoopCache;
        cache.set("k", "v".to_string(), Duration::from_secs(60)).unwrap();
        assert_eq!(cache.get("k").unwrap(), None);
    }
}
