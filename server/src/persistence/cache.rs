//! Redis mirror of creature respawn deadlines.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use redis::{AsyncCommands, aio::ConnectionManager};
use serde::{Deserialize, Serialize};

/// Cache key prefix
const RESPAWN_PREFIX: &str = "respawn:";

/// Shortest TTL given to a cached deadline
const MIN_TTL_SECONDS: u64 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CachedRespawn {
    guid: u64,
    respawn_at: u64,
}

/// Redis cache wrapper
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
}

impl Cache {
    /// Connect to Redis
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Cache a deadline; the entry expires when the creature is due back
    pub async fn save_respawn_time(&self, guid: u64, respawn_at: u64) -> Result<(), redis::RedisError> {
        let key = format!("{}{}", RESPAWN_PREFIX, guid);
        let json = serde_json::to_string(&CachedRespawn { guid, respawn_at }).map_err(|e| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "respawn serialization failed", e.to_string()))
        })?;

        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(&key, json, ttl_until(respawn_at, unix_now())).await?;

        Ok(())
    }

    /// Load every cached deadline
    pub async fn load_respawn_times(&self) -> Result<HashMap<u64, u64>, redis::RedisError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.keys(format!("{}*", RESPAWN_PREFIX)).await?;

        let mut times = HashMap::new();
        for key in keys {
            let json: Option<String> = conn.get(&key).await?;
            if let Some(cached) = json.and_then(|j| serde_json::from_str::<CachedRespawn>(&j).ok()) {
                times.insert(cached.guid, cached.respawn_at);
            }
        }

        Ok(times)
    }

    /// Delete a cached deadline
    pub async fn delete_respawn_time(&self, guid: u64) -> Result<(), redis::RedisError> {
        let key = format!("{}{}", RESPAWN_PREFIX, guid);

        let mut conn = self.conn.clone();
        conn.del::<_, ()>(&key).await?;

        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Remaining lifetime of a deadline, never zero (Redis rejects a zero TTL)
fn ttl_until(respawn_at: u64, now: u64) -> u64 {
    respawn_at.saturating_sub(now).max(MIN_TTL_SECONDS)
}
