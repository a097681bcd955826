use std::time::Duration;

use crate::redis_client::RedisClient;

mod seats;

/// Read-through cache for seat maps. Display only: the committer never reads it.
///
/// Without a redis connection every call is a miss and writes are dropped.
#[derive(Clone)]
pub struct SeatMapCache {
    redis: Option<RedisClient>,
    ttl: Duration,
}

impl SeatMapCache {
    pub fn new(redis: RedisClient, ttl: Duration) -> Self {
        Self {
            redis: Some(redis),
            ttl,
        }
    }

    pub fn disabled() -> Self {
        Self {
            redis: None,
            ttl: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.redis.is_some() && !self.ttl.is_zero()
    }
}
