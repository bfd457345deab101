//! Object types

use serde::{Deserialize, Serialize};

/// Result of storing an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    /// MD5 hex digest of the body, unquoted
    pub etag: String,
}

impl ObjectInfo {
    /// Validate object key
    pub fn validate_key(key: &str) -> Result<(), crate::Error> {
        if key.is_empty() {
            return Err(crate::Error::InvalidArgument("Key cannot be empty".into()));
        }
        if key.len() > crate::MAX_KEY_LENGTH {
            return Err(crate::Error::InvalidArgument(format!(
                "Key too long (max {} bytes)",
                crate::MAX_KEY_LENGTH
            )));
        }
        Ok(())
    }
}
