use cinder_core::crypto::CipherError;
use cinder_core::id::IdError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Entry not found")]
    NotFound,
    #[error("Storage backend unavailable: {0}")]
    BackendUnavailable(String),
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Paste not found")]
    NotFound,
    #[error("Paste could not be decrypted")]
    Authentication,
    #[error("Storage service is unavailable: {0}")]
    BackendUnavailable(String),
    #[error(transparent)]
    IdGeneration(#[from] IdError),
    #[error("Cipher fault: {0}")]
    Cipher(CipherError),
}

impl ServerError {
    /// Whether the caller should see the generic "paste unavailable" outcome.
    ///
    /// Wrong keys look exactly like missing pastes from the outside.
    pub fn is_unavailable_paste(&self) -> bool {
        matches!(self, Self::NotFound | Self::Authentication)
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Self::NotFound,
            StoreError::BackendUnavailable(e) => Self::BackendUnavailable(e),
        }
    }
}

impl From<CipherError> for ServerError {
    fn from(e: CipherError) -> Self {
        match e {
            CipherError::InvalidKey | CipherError::Authentication => Self::Authentication,
            CipherError::Primitive => Self::Cipher(e),
        }
    }
}
