use redis::{AsyncCommands, Script};
use tracing::{debug, warn};

use super::SeatMapCache;
use crate::models::{Seat, ShowId};

// Writes the map only if no invalidation happened since the reader took its
// generation. KEYS: map, generation. ARGV: payload, expected generation, ttl.
const PUT_IF_CURRENT: &str = r#"
local current = redis.call('GET', KEYS[2]) or '0'
if current == ARGV[2] then
    redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[3])
    return 1
end
return 0
"#;

fn seats_key(show_id: ShowId) -> String {
    format!("seats:{}", show_id)
}

fn generation_key(show_id: ShowId) -> String {
    format!("seats:{}:gen", show_id)
}

impl SeatMapCache {
    pub async fn get_seats(&self, show_id: ShowId) -> Option<Vec<Seat>> {
        if !self.is_enabled() {
            return None;
        }
        let mut conn = self.redis.as_ref()?.connection();
        let data: Option<String> = match conn.get(seats_key(show_id)).await {
            Ok(data) => data,
            Err(e) => {
                warn!("seat map cache read failed for show {}: {:?}", show_id, e);
                return None;
            }
        };
        let seats = serde_json::from_str(&data?).ok();
        if seats.is_some() {
            debug!("seat map cache hit for show {}", show_id);
        }
        seats
    }

    /// Invalidation count for the show. Take it before reading the store and
    /// hand it to [`SeatMapCache::put_seats`]. `None` means do not cache.
    pub async fn generation(&self, show_id: ShowId) -> Option<u64> {
        if !self.is_enabled() {
            return None;
        }
        let mut conn = self.redis.as_ref()?.connection();
        let generation: Result<Option<u64>, _> = conn.get(generation_key(show_id)).await;
        match generation {
            Ok(generation) => Some(generation.unwrap_or(0)),
            Err(e) => {
                warn!("seat map generation read failed for show {}: {:?}", show_id, e);
                None
            }
        }
    }

    /// Stores `seats` unless the show was invalidated after `generation` was read.
    pub async fn put_seats(&self, show_id: ShowId, seats: &[Seat], generation: u64) {
        if !self.is_enabled() {
            return;
        }
        let Some(redis) = self.redis.as_ref() else { return };
        let Ok(data) = serde_json::to_string(seats) else { return };

        let script = Script::new(PUT_IF_CURRENT);
        let mut conn = redis.connection();
        let stored: Result<i32, _> = script
            .key(seats_key(show_id))
            .key(generation_key(show_id))
            .arg(data)
            .arg(generation)
            .arg(self.ttl.as_secs().max(1))
            .invoke_async(&mut conn)
            .await;
        match stored {
            Ok(1) => {}
            Ok(_) => debug!("seat map for show {} changed while reading, not cached", show_id),
            Err(e) => warn!("seat map cache write failed for show {}: {:?}", show_id, e),
        }
    }

    // Must run after every change to the show's seats
    pub async fn invalidate(&self, show_id: ShowId) {
        let Some(redis) = self.redis.as_ref() else { return };
        let mut conn = redis.connection();
        let bumped: Result<u64, _> = conn.incr(generation_key(show_id), 1).await;
        if let Err(e) = bumped {
            warn!("seat map generation bump failed for show {}: {:?}", show_id, e);
        }
        let result: Result<(), _> = conn.del(seats_key(show_id)).await;
        match result {
            Ok(()) => debug!("Invalidated seat map cache for show {}", show_id),
            Err(e) => warn!("seat map cache invalidation failed for show {}: {:?}", show_id, e),
        }
    }
}
