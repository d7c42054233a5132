use async_trait::async_trait;
use log::info;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{Client, RedisError, Script};
use std::time::Duration;

use super::EphemeralStore;
use crate::errors::StoreError;

const KEY_PREFIX: &str = "paste:";
const CONNECT_RETRIES: usize = 1;

/// GET and DEL in one server-side step, so two readers can never both see
/// the value.
const TAKE_SCRIPT: &str = r"
local value = redis.call('GET', KEYS[1])
if value then
    redis.call('DEL', KEYS[1])
end
return value
";

/// Redis (or any RESP compatible server) backed store.
///
/// The connection manager is a single multiplexed connection that is cheap
/// to clone and reconnects on its own.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    take: Script,
}

impl RedisStore {
    /// Connects once, bounded by `timeout`. The same timeout caps every
    /// later connect and response so a dead server fails fast.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(unavailable)?;
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(CONNECT_RETRIES)
            .set_connection_timeout(timeout)
            .set_response_timeout(timeout);

        let conn = tokio::time::timeout(timeout, ConnectionManager::new_with_config(client, config))
            .await
            .map_err(|_| {
                StoreError::BackendUnavailable(format!("connect timed out after {timeout:?}"))
            })?
            .map_err(unavailable)?;
        info!("Connected to redis store");

        Ok(Self {
            conn,
            take: Script::new(TAKE_SCRIPT),
        })
    }
}

fn storage_key(id: &str) -> String {
    format!("{KEY_PREFIX}{id}")
}

fn unavailable(e: RedisError) -> StoreError {
    StoreError::BackendUnavailable(e.to_string())
}

/// `SET PX` rejects zero, so sub-millisecond TTLs are rounded up.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl EphemeralStore for RedisStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn put_ex(&self, id: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(storage_key(id))
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(storage_key(id))
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        value.ok_or(StoreError::NotFound)
    }

    async fn del(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(storage_key(id))
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn take(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = self
            .take
            .key(storage_key(id))
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;
        value.ok_or(StoreError::NotFound)
    }
}
