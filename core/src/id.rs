use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;

pub const ID_BYTES: usize = 16;

#[derive(Error, Debug)]
#[error("Failed to generate paste id: {0}")]
pub struct IdError(#[from] rand::Error);

/// 128 bits from the OS RNG, lowercase hex.
pub fn new_paste_id() -> Result<String, IdError> {
    let mut bytes = [0u8; ID_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(hex::encode(bytes))
}

pub fn is_valid_paste_id(id: &str) -> bool {
    id.len() == ID_BYTES * 2
        && id
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
