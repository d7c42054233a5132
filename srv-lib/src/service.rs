use chrono::{DateTime, Utc};
use cinder_core::crypto::{decrypt, encrypt};
use cinder_core::id::{is_valid_paste_id, new_paste_id};
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::ServiceConfig;
use crate::errors::{ServerError, StoreError};
use crate::store::EphemeralStore;
use crate::ttl::parse_validity;

/// Everything the submitter needs to build the share URL.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: String,
    pub key: String,
    pub ttl: Duration,
    pub expires_at: DateTime<Utc>,
}

/// Encrypts pastes on the way in and consumes them on the way out.
///
/// Holds no state of its own besides the shared store handle, so one
/// instance serves every request.
#[derive(Clone)]
pub struct PasteService {
    store: Arc<dyn EphemeralStore>,
    config: ServiceConfig,
}

impl PasteService {
    pub fn new(store: Arc<dyn EphemeralStore>, config: ServiceConfig) -> Self {
        Self { store, config }
    }

    fn deadline(&self) -> Instant {
        let now = Instant::now();
        now.checked_add(self.config.store_timeout)
            .unwrap_or_else(|| now + Duration::from_secs(24 * 60 * 60))
    }

    /// Runs a backend call that must finish before `deadline`.
    async fn bounded<T>(
        &self,
        op: &str,
        deadline: Instant,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout_at(deadline, fut)
            .await
            .unwrap_or_else(|_| {
                Err(StoreError::BackendUnavailable(format!(
                    "{op} timed out after {:?}",
                    self.config.store_timeout
                )))
            })
    }

    pub async fn ping(&self) -> Result<(), ServerError> {
        self.bounded("ping", self.deadline(), self.store.ping()).await?;
        Ok(())
    }

    pub async fn submit(
        &self,
        plaintext: &str,
        validity: Option<&str>,
    ) -> Result<Submission, ServerError> {
        let ttl = parse_validity(validity, self.config.max_validity);
        let id = new_paste_id()?;
        let (ciphertext, key) = encrypt(plaintext.as_bytes())?;

        self.bounded("put", self.deadline(), self.store.put_ex(&id, ciphertext, ttl))
            .await
            .inspect_err(|e| warn!("Error storing paste {id}: {e}"))?;

        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        info!("Created paste {id}, valid for {ttl:?}");

        Ok(Submission {
            id,
            key,
            ttl,
            expires_at,
        })
    }

    /// Consumes the paste and decrypts it with `key`.
    ///
    /// The entry is removed whatever the outcome of the read, and a wrong
    /// key burns the paste just like the right one. The take and the
    /// follow-up delete share one deadline.
    pub async fn retrieve(&self, id: &str, key: &str) -> Result<String, ServerError> {
        if !is_valid_paste_id(id) {
            debug!("Rejecting malformed paste id");
            return Err(ServerError::NotFound);
        }

        let deadline = self.deadline();
        let fetched = self
            .bounded("take", deadline, self.store.take(id))
            .await
            .inspect_err(|e| warn!("Error retrieving paste {id}: {e}"));

        if let Err(e) = self.bounded("del", deadline, self.store.del(id)).await {
            warn!("Error deleting paste {id}: {e}");
        }

        let ciphertext = fetched?;
        let plaintext = decrypt(&ciphertext, key).inspect_err(|e| debug!("Paste {id}: {e}"))?;
        info!("Paste {id} was read and destroyed");

        String::from_utf8(plaintext).map_err(|_| ServerError::Authentication)
    }
}
