//! Redis-backed revocation deny-list and fixed-window counters.
//!
//! Both concerns ride the same connection manager. Keys expire on their own
//! so neither the deny-list nor the counters need a sweeper.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::error::ServiceError;

const DENY_PREFIX: &str = "deny:jti:";
const COUNTER_PREFIX: &str = "rl:";

/// Outcome of a counter check.
#[derive(Debug, Clone, Copy)]
pub struct CounterDecision {
    pub allowed: bool,
    /// Seconds until the window resets; only meaningful when denied.
    pub retry_after_seconds: u64,
}

/// Per-token revocation list consulted on every authenticated request.
#[async_trait]
pub trait TokenDenyList: Send + Sync {
    /// Deny a token id until its natural expiry.
    async fn deny(&self, jti: Uuid, ttl_seconds: i64) -> Result<(), ServiceError>;

    async fn is_denied(&self, jti: Uuid) -> Result<bool, ServiceError>;
}

/// Fixed-window counters backing the rate limiter.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter for `key`, creating it with the window TTL on
    /// first write. Denies once the count exceeds `limit`.
    async fn check_and_increment(
        &self,
        key: &str,
        limit: u32,
        window_seconds: u64,
    ) -> Result<CounterDecision, ServiceError>;
}

#[derive(Clone)]
pub struct RedisService {
    conn: ConnectionManager,
}

impl RedisService {
    pub async fn connect(url: &str) -> Result<Self, ServiceError> {
        let client =
            redis::Client::open(url).map_err(|e| ServiceError::Cache(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| ServiceError::Cache(e.to_string()))?;
        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<(), ServiceError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| ServiceError::Cache(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl TokenDenyList for RedisService {
    async fn deny(&self, jti: Uuid, ttl_seconds: i64) -> Result<(), ServiceError> {
        // Tokens already past expiry need no entry.
        if ttl_seconds <= 0 {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let key = format!("{}{}", DENY_PREFIX, jti);
        conn.set_ex::<_, _, ()>(key, 1u8, ttl_seconds as u64)
            .await
            .map_err(|e| ServiceError::Cache(e.to_string()))?;
        Ok(())
    }

    async fn is_denied(&self, jti: Uuid) -> Result<bool, ServiceError> {
        let mut conn = self.conn.clone();
        let key = format!("{}{}", DENY_PREFIX, jti);
        let exists: bool = conn
            .exists(key)
            .await
            .map_err(|e| ServiceError::Cache(e.to_string()))?;
        Ok(exists)
    }
}

#[async_trait]
impl CounterStore for RedisService {
    async fn check_and_increment(
        &self,
        key: &str,
        limit: u32,
        window_seconds: u64,
    ) -> Result<CounterDecision, ServiceError> {
        let mut conn = self.conn.clone();
        let key = format!("{}{}", COUNTER_PREFIX, key);

        let count: u32 = conn
            .incr(&key, 1u32)
            .await
            .map_err(|e| ServiceError::Cache(e.to_string()))?;

        // First write in the window owns setting the TTL.
        if count == 1 {
            conn.expire::<_, ()>(&key, window_seconds as i64)
                .await
                .map_err(|e| ServiceError::Cache(e.to_string()))?;
        }

        if count <= limit {
            return Ok(CounterDecision {
                allowed: true,
                retry_after_seconds: 0,
            });
        }

        let ttl: i64 = conn
            .ttl(&key)
            .await
            .map_err(|e| ServiceError::Cache(e.to_string()))?;

        Ok(CounterDecision {
            allowed: false,
            retry_after_seconds: ttl.max(1) as u64,
        })
    }
}

/// In-memory stand-in for tests. Honors TTLs against a monotonic clock.
#[derive(Default)]
pub struct MemoryCache {
    denied: Mutex<HashMap<Uuid, Instant>>,
    counters: Mutex<HashMap<String, (u32, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a counter as if its window had elapsed.
    pub fn expire_counter(&self, key: &str) {
        self.counters
            .lock()
            .unwrap()
            .remove(&format!("{}{}", COUNTER_PREFIX, key));
    }
}

#[async_trait]
impl TokenDenyList for MemoryCache {
    async fn deny(&self, jti: Uuid, ttl_seconds: i64) -> Result<(), ServiceError> {
        if ttl_seconds <= 0 {
            return Ok(());
        }
        let deadline = Instant::now() + Duration::from_secs(ttl_seconds as u64);
        self.denied.lock().unwrap().insert(jti, deadline);
        Ok(())
    }

    async fn is_denied(&self, jti: Uuid) -> Result<bool, ServiceError> {
        let mut denied = self.denied.lock().unwrap();
        match denied.get(&jti) {
            Some(deadline) if *deadline > Instant::now() => Ok(true),
            Some(_) => {
                denied.remove(&jti);
                Ok(false)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl CounterStore for MemoryCache {
    async fn check_and_increment(
        &self,
        key: &str,
        limit: u32,
        window_seconds: u64,
    ) -> Result<CounterDecision, ServiceError> {
        let key = format!("{}{}", COUNTER_PREFIX, key);
        let now = Instant::now();
        let mut counters = self.counters.lock().unwrap();

        let entry = counters
            .entry(key)
            .and_modify(|(count, deadline)| {
                if *deadline <= now {
                    *count = 0;
                    *deadline = now + Duration::from_secs(window_seconds);
                }
                *count += 1;
            })
            .or_insert((1, now + Duration::from_secs(window_seconds)));

        if entry.0 <= limit {
            Ok(CounterDecision {
                allowed: true,
                retry_after_seconds: 0,
            })
        } else {
            let remaining = entry.1.saturating_duration_since(now).as_secs();
            Ok(CounterDecision {
                allowed: false,
                retry_after_seconds: remaining.max(1),
            })
        }
    }
}
