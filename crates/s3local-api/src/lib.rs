//! S3 API Server for s3local
//!
//! Just enough of the S3 REST API for SDK clients to create buckets and
//! put, copy, read and delete objects against the local storage emulator.

pub mod metrics;
pub mod routes;
pub mod server;
pub mod xml;

pub use metrics::MetricsRecorder;
pub use server::{AppState, S3Server};
