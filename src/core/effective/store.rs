// ─── Capacity Store ───
// Shared in-flight counter for effective-POM computations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use tracing::debug;

use crate::core::error::{ResolverError, ResolverResult};

/// Increment only while below the ceiling, refreshing the key's TTL.
/// Returns the new count, or -1 when full.
const ACQUIRE_SCRIPT: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current < tonumber(ARGV[1]) then
  local next = redis.call('INCR', KEYS[1])
  redis.call('EXPIRE', KEYS[1], ARGV[2])
  return next
end
return -1
"#;

/// Decrement without going below zero.
const RELEASE_SCRIPT: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current > 0 then
  return redis.call('DECR', KEYS[1])
end
return 0
"#;

/// Atomic counter shared by every resolution that may run the external tool,
/// in this process or any other.
#[async_trait]
pub trait CapacityStore: Send + Sync {
    /// Take one slot under `key` if fewer than `ceiling` are held. The counter
    /// expires `ttl` after the last successful acquisition.
    async fn try_acquire(&self, key: &str, ceiling: u32, ttl: Duration) -> ResolverResult<bool>;

    /// Give one slot back.
    async fn release(&self, key: &str) -> ResolverResult<()>;
}

/// Cross-process store backed by Redis Lua scripts.
#[derive(Clone)]
pub struct RedisCapacityStore {
    connection: ConnectionManager,
    acquire: Arc<Script>,
    release: Arc<Script>,
}

impl RedisCapacityStore {
    pub async fn connect(url: &str) -> ResolverResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| ResolverError::CapacityStore(format!("invalid Redis URL: {e}")))?;
        let connection = client.get_tokio_connection_manager().await?;
        Ok(Self::new_with_connection(connection))
    }

    pub fn new_with_connection(connection: ConnectionManager) -> Self {
        Self {
            connection,
            acquire: Arc::new(Script::new(ACQUIRE_SCRIPT)),
            release: Arc::new(Script::new(RELEASE_SCRIPT)),
        }
    }
}

#[async_trait]
impl CapacityStore for RedisCapacityStore {
    async fn try_acquire(&self, key: &str, ceiling: u32, ttl: Duration) -> ResolverResult<bool> {
        let mut conn = self.connection.clone();
        let count: i64 = self
            .acquire
            .key(key)
            .arg(ceiling)
            .arg(ttl.as_secs().max(1))
            .invoke_async(&mut conn)
            .await?;
        debug!("capacity {} -> {}", key, count);
        Ok(count > 0)
    }

    async fn release(&self, key: &str) -> ResolverResult<()> {
        let mut conn = self.connection.clone();
        let count: i64 = self.release.key(key).invoke_async(&mut conn).await?;
        debug!("capacity {} released -> {}", key, count);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Slots {
    held: u32,
    expires_at: Option<Instant>,
}

/// Single-process store with the same semantics as the Redis one: one counter
/// per key, reset to zero once its TTL lapses. Tracks the highest count ever
/// held under any key.
#[derive(Debug, Default)]
pub struct MemoryCapacityStore {
    counters: Mutex<HashMap<String, Slots>>,
    peak: AtomicU32,
}

impl MemoryCapacityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots currently held under `key`.
    pub fn held(&self, key: &str) -> u32 {
        self.counters
            .lock()
            .map(|mut counters| {
                counters
                    .get_mut(key)
                    .map(|slots| {
                        expire(slots);
                        slots.held
                    })
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Slots held under every key.
    pub fn in_flight(&self) -> u32 {
        self.counters
            .lock()
            .map(|mut counters| {
                counters
                    .values_mut()
                    .map(|slots| {
                        expire(slots);
                        slots.held
                    })
                    .sum()
            })
            .unwrap_or(0)
    }

    pub fn peak(&self) -> u32 {
        self.peak.load(Ordering::SeqCst)
    }
}

fn expire(slots: &mut Slots) {
    if slots.expires_at.is_some_and(|at| Instant::now() >= at) {
        slots.held = 0;
        slots.expires_at = None;
    }
}

fn poisoned<T>(_: T) -> ResolverError {
    ResolverError::CapacityStore("capacity counter lock poisoned".into())
}

#[async_trait]
impl CapacityStore for MemoryCapacityStore {
    async fn try_acquire(&self, key: &str, ceiling: u32, ttl: Duration) -> ResolverResult<bool> {
        let mut counters = self.counters.lock().map_err(poisoned)?;
        let slots = counters.entry(key.to_string()).or_default();
        expire(slots);
        if slots.held >= ceiling {
            return Ok(false);
        }
        slots.held += 1;
        slots.expires_at = Some(Instant::now() + ttl);
        self.peak.fetch_max(slots.held, Ordering::SeqCst);
        Ok(true)
    }

    async fn release(&self, key: &str) -> ResolverResult<()> {
        let mut counters = self.counters.lock().map_err(poisoned)?;
        if let Some(slots) = counters.get_mut(key) {
            expire(slots);
            slots.held = slots.held.saturating_sub(1);
        }
        Ok(())
    }
}
