use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};

/// Best-effort JSON cache. Every failure degrades to a cache miss.
#[derive(Clone)]
pub struct CacheService {
    redis: ConnectionManager,
}

impl CacheService {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.redis.clone();
        let raw: Option<String> = match conn.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!("cache get {} failed: {}", key, e);
                return None;
            }
        };
        raw.and_then(|s| serde_json::from_str(&s).ok())
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let mut conn = self.redis.clone();
        if let Ok(json) = serde_json::to_string(value) {
            if let Err(e) = conn.set_ex::<_, _, ()>(key, json, ttl_secs).await {
                tracing::debug!("cache set {} failed: {}", key, e);
            }
        }
    }

    pub async fn invalidate(&self, key: &str) {
        let mut conn = self.redis.clone();
        if let Err(e) = conn.del::<_, ()>(key).await {
            tracing::warn!("cache invalidate {} failed: {}", key, e);
        }
    }
}
