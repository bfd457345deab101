//! s3local Core Library
//!
//! Core types, errors and configuration shared by the s3local storage
//! emulator, the event dispatch engine and the CLI.

pub mod config;
pub mod error;
pub mod types;
pub mod utils;

pub use config::S3LocalConfig;
pub use error::{Error, Result};

/// s3local version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default S3 region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default listen address of the emulator
pub const DEFAULT_ADDRESS: &str = "localhost";

/// Default listen port of the emulator
pub const DEFAULT_PORT: u16 = 4569;

/// Default bucket storage directory
pub const DEFAULT_DIRECTORY: &str = "./buckets";

/// Principal reported in event records and bucket ownership
pub const DEFAULT_PRINCIPAL_ID: &str = "S3RVER";

/// Event type used when a declaration names a bucket but no event
pub const DEFAULT_EVENT: &str = "s3:ObjectCreated:*";

/// Maximum bucket name length
pub const MAX_BUCKET_NAME_LENGTH: usize = 63;

/// Minimum bucket name length
pub const MIN_BUCKET_NAME_LENGTH: usize = 3;

/// Maximum object key length
pub const MAX_KEY_LENGTH: usize = 1024;
