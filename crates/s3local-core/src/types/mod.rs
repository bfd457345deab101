//! Core types for s3local

mod bucket;
mod notification;
mod object;
mod service;

pub use bucket::*;
pub use notification::*;
pub use object::*;
pub use service::*;
