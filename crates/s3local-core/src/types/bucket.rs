//! Bucket types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bucket known to the storage emulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Bucket {
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            created_at,
        }
    }

    /// Validate bucket name according to S3 rules
    pub fn validate_name(name: &str) -> Result<(), crate::Error> {
        if name.len() < crate::MIN_BUCKET_NAME_LENGTH {
            return Err(crate::Error::InvalidBucketName(
                "Bucket name too short (min 3 characters)".into(),
            ));
        }
        if name.len() > crate::MAX_BUCKET_NAME_LENGTH {
            return Err(crate::Error::InvalidBucketName(
                "Bucket name too long (max 63 characters)".into(),
            ));
        }

        let bytes = name.as_bytes();
        let edge_ok = |c: u8| c.is_ascii_lowercase() || c.is_ascii_digit();

        if !edge_ok(bytes[0]) {
            return Err(crate::Error::InvalidBucketName(
                "Must start with lowercase letter or number".into(),
            ));
        }
        if !edge_ok(bytes[bytes.len() - 1]) {
            return Err(crate::Error::InvalidBucketName(
                "Must end with lowercase letter or number".into(),
            ));
        }

        if let Some(c) = name
            .chars()
            .find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && *c != '-' && *c != '.')
        {
            return Err(crate::Error::InvalidBucketName(format!(
                "Invalid character: {}",
                c
            )));
        }

        if name.contains("..") {
            return Err(crate::Error::InvalidBucketName(
                "Cannot have consecutive periods".into(),
            ));
        }

        Ok(())
    }
}
