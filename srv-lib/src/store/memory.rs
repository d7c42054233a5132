use async_trait::async_trait;
use log::{debug, error};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::EphemeralStore;
use crate::errors::StoreError;

/// Deadline used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

struct Entry {
    value: Vec<u8>,
    deadline: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.deadline
    }
}

/// Single process store. Entries disappear from reads the moment their
/// deadline passes; [`MemoryStore::spawn_sweeper`] reclaims their memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::BackendUnavailable("memory store lock poisoned".into()))
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn clear_expired(&self) -> Result<usize, StoreError> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        Ok(before - entries.len())
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> Result<usize, StoreError> {
        self.lock().map(|entries| entries.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        self.len().map(|n| n == 0)
    }

    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.clear_expired() {
                    Ok(0) => {}
                    Ok(n) => debug!("Swept {n} expired pastes"),
                    Err(e) => error!("Expired paste sweep failed: {e}"),
                }
            }
        })
    }
}

#[async_trait]
impl EphemeralStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }

    async fn put_ex(&self, id: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        let deadline = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .ok_or_else(|| StoreError::BackendUnavailable(format!("ttl {ttl:?} out of range")))?;
        self.lock()?
            .insert(id.to_string(), Entry { value, deadline });
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let now = Instant::now();
        self.lock()?
            .get(id)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn del(&self, id: &str) -> Result<(), StoreError> {
        self.lock()?.remove(id);
        Ok(())
    }

    async fn take(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let now = Instant::now();
        self.lock()?
            .remove(id)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value)
            .ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn get_has_no_side_effects() {
        let store = MemoryStore::new();
        store.put_ex("a", b"one".to_vec(), MINUTE).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), b"one");
        assert_eq!(store.get("a").await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn take_consumes_once() {
        let store = MemoryStore::new();
        store.put_ex("a", b"one".to_vec(), MINUTE).await.unwrap();
        assert_eq!(store.take("a").await.unwrap(), b"one");
        assert_eq!(store.take("a").await, Err(StoreError::NotFound));
        assert_eq!(store.get("a").await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn del_is_idempotent() {
        let store = MemoryStore::new();
        store.del("missing").await.unwrap();
        store.put_ex("a", b"one".to_vec(), MINUTE).await.unwrap();
        store.del("a").await.unwrap();
        store.del("a").await.unwrap();
        assert_eq!(store.get("a").await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn overwrite_replaces_value_and_deadline() {
        let store = MemoryStore::new();
        store.put_ex("a", b"one".to_vec(), Duration::ZERO).await.unwrap();
        store.put_ex("a", b"two".to_vec(), MINUTE).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), b"two");
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn huge_ttl_saturates_instead_of_overflowing() {
        let store = MemoryStore::new();
        store.put_ex("a", vec![1], Duration::MAX).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), vec![1]);
        assert_eq!(store.take("a").await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn poisoned_lock_is_reported_not_hidden() {
        let store = MemoryStore::new();
        store.put_ex("a", vec![1], MINUTE).await.unwrap();

        let entries = Arc::clone(&store.entries);
        let _ = std::thread::spawn(move || {
            let _guard = entries.lock().unwrap();
            panic!("poison the store");
        })
        .join();

        assert!(matches!(store.len(), Err(StoreError::BackendUnavailable(_))));
        assert!(store.is_empty().is_err());
        assert!(matches!(store.ping().await, Err(StoreError::BackendUnavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_without_being_read() {
        let store = MemoryStore::new();
        store
            .put_ex("a", b"one".to_vec(), Duration::from_millis(100))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(50)).await;
        assert!(store.get("a").await.is_ok());
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(store.get("a").await, Err(StoreError::NotFound));
        assert_eq!(store.take("a").await, Err(StoreError::NotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_reclaims_expired_entries() {
        let store = MemoryStore::new();
        store.put_ex("short", vec![1], Duration::from_secs(1)).await.unwrap();
        store.put_ex("long", vec![2], MINUTE).await.unwrap();

        let sweeper = store.spawn_sweeper(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(store.len().unwrap(), 1);
        assert!(store.get("long").await.is_ok());
        sweeper.abort();
    }
}
