//! Storage emulator for s3local
//!
//! Stores buckets and objects on the local filesystem and reports every
//! object change as a [`RawNotification`](s3local_core::types::RawNotification).

pub mod buckets;
pub mod engine;

pub use buckets::{create_buckets, remove_bucket, remove_buckets};
pub use engine::{LocalStorage, StorageEngine};
