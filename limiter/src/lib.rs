use std::sync::Arc;

use attempts::{AttemptCounter, MemoryAttemptCounter, RedisAttemptCounter};
use middleware::global::GlobalLimiter;

pub mod attempts;

pub mod middleware {
    pub mod global;
}

pub fn global_middleware(permits_per_second: u32) -> GlobalLimiter {
    GlobalLimiter::new(permits_per_second)
}

/// Redis-backed counters when a pool is available, process memory otherwise.
pub fn attempt_counter(redis: Option<deadpool_redis::Pool>) -> Arc<dyn AttemptCounter> {
    match redis {
        Some(pool) => Arc::new(RedisAttemptCounter::new(pool)),
        None => {
            log::warn!("REDIS_URL not set, attempt counters are kept in process memory");
            Arc::new(MemoryAttemptCounter::new())
        }
    }
}
