use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sent to the server when creating a new paste
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct SubmitPasteRequest {
    pub paste: String,
    /// Human readable duration such as `15m` or `1h30m`.
    ///
    /// Anything missing or unparseable falls back to the server default.
    #[serde(default)]
    pub validity: Option<String>,
}

/// Gets returned by the server when creating a new paste.
///
/// This is the only place the key ever leaves the server.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct PasteCreated {
    pub id: String,
    pub key: String,
    pub url: String,
    pub validity: String,
    pub ttl_secs: u64,
    pub expires_at: DateTime<Utc>,
}

/// Returned by the server on the first and only successful read
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct PasteContents {
    pub paste: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_is_optional_on_the_wire() {
        let req: SubmitPasteRequest = serde_json::from_str(r#"{"paste":"hi"}"#).unwrap();
        assert_eq!(req.paste, "hi");
        assert!(req.validity.is_none());
    }
}
