use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use common::error::{AppError, Res};
use dashmap::DashMap;
use redis::AsyncCommands;

/// Fixed-window counter keyed by an arbitrary string.
#[async_trait]
pub trait AttemptCounter: Send + Sync {
    /// Counts one attempt against `key` and returns the total inside the
    /// current window. The window starts at the first attempt.
    async fn register(&self, key: &str, window: Duration) -> Res<u64>;

    async fn reset(&self, key: &str) -> Res<()>;
}

/// Counters shared by every instance through Redis (`INCR` + `EXPIRE`).
pub struct RedisAttemptCounter {
    pool: deadpool_redis::Pool,
}

impl RedisAttemptCounter {
    pub fn new(pool: deadpool_redis::Pool) -> Self {
        RedisAttemptCounter { pool }
    }

    async fn connection(&self) -> Res<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get Redis connection: {}", e)))
    }
}

#[async_trait]
impl AttemptCounter for RedisAttemptCounter {
    async fn register(&self, key: &str, window: Duration) -> Res<u64> {
        let mut conn = self.connection().await?;

        let count: u64 = conn
            .incr(key, 1)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to increment {}: {}", key, e)))?;

        if count == 1 {
            let _: () = conn
                .expire(key, window.as_secs().max(1) as i64)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to set expiry on {}: {}", key, e)))?;
        }

        Ok(count)
    }

    async fn reset(&self, key: &str) -> Res<()> {
        let mut conn = self.connection().await?;
        let _: () = conn
            .del(key)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to reset {}: {}", key, e)))?;
        Ok(())
    }
}

/// Registrations between sweeps of expired windows.
const PRUNE_EVERY: u64 = 256;

struct Window {
    count: u64,
    started: Instant,
    length: Duration,
}

impl Window {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.started) >= self.length
    }
}

/// Per-process counters. Lost on restart and not shared between instances.
/// Expired windows are dropped every [`PRUNE_EVERY`] registrations.
#[derive(Default)]
pub struct MemoryAttemptCounter {
    windows: DashMap<String, Window>,
    registrations: AtomicU64,
}

impl MemoryAttemptCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently holding a window.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    fn prune(&self, now: Instant) {
        self.windows.retain(|_, window| !window.expired(now));
    }
}

#[async_trait]
impl AttemptCounter for MemoryAttemptCounter {
    async fn register(&self, key: &str, window: Duration) -> Res<u64> {
        let now = Instant::now();

        // no entry guard may be held while pruning
        if (self.registrations.fetch_add(1, Ordering::Relaxed) + 1) % PRUNE_EVERY == 0 {
            self.prune(now);
        }

        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            started: now,
            length: window,
        });
        let current = entry.value_mut();

        if current.expired(now) {
            current.count = 0;
            current.started = now;
        }
        current.length = window;
        current.count += 1;

        Ok(current.count)
    }

    async fn reset(&self, key: &str) -> Res<()> {
        self.windows.remove(key);
        Ok(())
    }
}

pub const LOGIN_SCOPE: &str = "login";
pub const FORGOT_PASSWORD_SCOPE: &str = "forgot_password";

/// Attempt budget for one flow, such as login.
#[derive(Debug, Clone)]
pub struct AttemptPolicy {
    pub scope: &'static str,
    pub max_attempts: u64,
    pub window: Duration,
}

impl AttemptPolicy {
    pub fn new(scope: &'static str, max_attempts: u64, window: Duration) -> Self {
        AttemptPolicy {
            scope,
            max_attempts,
            window,
        }
    }

    fn key(&self, identity: &str) -> String {
        format!("attempts:{}:{}", self.scope, identity.trim().to_lowercase())
    }

    /// Records an attempt for `identity`; fails once the budget is spent.
    pub async fn check(&self, counter: &dyn AttemptCounter, identity: &str) -> Res<()> {
        let count = counter.register(&self.key(identity), self.window).await?;

        if count > self.max_attempts {
            log::warn!("Attempt limit reached for scope {}", self.scope);
            return Err(AppError::TooManyRequests(
                "Too many attempts. Please try again later.".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn reset(&self, counter: &dyn AttemptCounter, identity: &str) -> Res<()> {
        counter.reset(&self.key(identity)).await
    }
}
