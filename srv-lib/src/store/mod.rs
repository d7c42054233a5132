//! TTL-aware key/value backends that hold paste ciphertext.
//!
//! Only ciphertext is ever written through this interface. Keys stay with
//! the caller.

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;
use std::time::Duration;

use crate::errors::StoreError;

#[async_trait]
pub trait EphemeralStore: Send + Sync + 'static {
    /// Liveness probe against the backend.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Stores `value` under `id`. The backend drops it once `ttl` elapses.
    async fn put_ex(&self, id: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;

    /// Returns the live value for `id` without side effects.
    async fn get(&self, id: &str) -> Result<Vec<u8>, StoreError>;

    /// Removes `id`. Removing a missing entry is not an error.
    async fn del(&self, id: &str) -> Result<(), StoreError>;

    /// Atomically fetches and removes `id`.
    ///
    /// Of any number of concurrent callers for one entry, at most one gets
    /// the value and the rest see [`StoreError::NotFound`].
    async fn take(&self, id: &str) -> Result<Vec<u8>, StoreError>;
}
