use chacha20poly1305::XNonce;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{Key, XChaCha20Poly1305};
use thiserror::Error;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 24;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CipherError {
    #[error("Invalid key. Expected {KEY_LEN} bytes of hex")]
    InvalidKey,
    #[error("Decryption failed (Invalid key or corrupted data)")]
    Authentication,
    #[error("Cipher primitive failed")]
    Primitive,
}

/// Seals `plaintext` under a freshly generated key.
///
/// Returns `nonce || ciphertext` and the key as lowercase hex. The key is the
/// raw random bytes, it is not hashed or derived from anything.
pub fn encrypt(plaintext: &[u8]) -> Result<(Vec<u8>, String), CipherError> {
    let key = XChaCha20Poly1305::generate_key(&mut OsRng);
    let cipher = XChaCha20Poly1305::new(&key);

    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CipherError::Primitive)?;

    let mut storage = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    storage.extend_from_slice(&nonce);
    storage.extend_from_slice(&ciphertext);

    Ok((storage, hex::encode(key)))
}

/// Opens a blob produced by [`encrypt`] with the hex key it returned.
pub fn decrypt(encrypted_blob: &[u8], key: &str) -> Result<Vec<u8>, CipherError> {
    let key_bytes = decode_key(key)?;

    if encrypted_blob.len() < NONCE_LEN {
        return Err(CipherError::Authentication);
    }

    let (nonce_bytes, ciphertext) = encrypted_blob.split_at(NONCE_LEN);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key_bytes));
    let nonce = XNonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CipherError::Authentication)
}

fn decode_key(key: &str) -> Result<[u8; KEY_LEN], CipherError> {
    let decoded = hex::decode(key).map_err(|_| CipherError::InvalidKey)?;
    decoded
        .as_slice()
        .try_into()
        .map_err(|_| CipherError::InvalidKey)
}
