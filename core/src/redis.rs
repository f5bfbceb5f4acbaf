use deadpool_redis::{CreatePoolError, Pool, Runtime};

/// Pool for the attempt counters. Connections are opened lazily.
pub fn setup_redis(url: &str) -> Result<Pool, CreatePoolError> {
    deadpool_redis::Config::from_url(url).create_pool(Some(Runtime::Tokio1))
}
