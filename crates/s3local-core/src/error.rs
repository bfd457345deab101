//! Error types for s3local

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Bucket Errors
    #[error("The specified bucket does not exist")]
    NoSuchBucket,

    #[error("The specified bucket does not exist: {0}")]
    NoSuchBucketNamed(String),

    #[error("The bucket you tried to delete is not empty")]
    BucketNotEmpty,

    #[error("failed to delete bucket {bucket}: {reason}")]
    BucketRemoval { bucket: String, reason: String },

    // Object Errors
    #[error("The specified key does not exist")]
    NoSuchKey,

    #[error("The specified key does not exist: {0}")]
    NoSuchKeyNamed(String),

    // Validation Errors
    #[error("Invalid bucket name: {0}")]
    InvalidBucketName(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::NoSuchBucket | Error::NoSuchBucketNamed(_) => "NoSuchBucket",
            Error::BucketNotEmpty => "BucketNotEmpty",
            Error::BucketRemoval { .. } => "InternalError",
            Error::NoSuchKey | Error::NoSuchKeyNamed(_) => "NoSuchKey",
            Error::InvalidBucketName(_) => "InvalidBucketName",
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::InvalidRequest(_) => "InvalidRequest",
            Error::Configuration(_) => "InternalError",
            Error::Io(_) => "InternalError",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidBucketName(_) | Error::InvalidArgument(_) | Error::InvalidRequest(_) => {
                400
            }

            Error::NoSuchBucket
            | Error::NoSuchBucketNamed(_)
            | Error::NoSuchKey
            | Error::NoSuchKeyNamed(_) => 404,

            Error::BucketNotEmpty => 409,

            _ => 500,
        }
    }

    /// Whether this error means the bucket is already gone
    pub fn is_no_such_bucket(&self) -> bool {
        matches!(self, Error::NoSuchBucket | Error::NoSuchBucketNamed(_))
    }
}

/// S3 Error Response
#[derive(Debug, Clone)]
pub struct S3Error {
    pub code: String,
    pub message: String,
    pub resource: Option<String>,
    pub request_id: String,
}

impl From<Error> for S3Error {
    fn from(err: Error) -> Self {
        S3Error {
            code: err.code().to_string(),
            message: err.to_string(),
            resource: None,
            request_id: String::new(),
        }
    }
}

impl S3Error {
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn to_xml(&self) -> String {
        let resource = self.resource.as_deref().unwrap_or("");
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
<Code>{}</Code>
<Message>{}</Message>
<Resource>{}</Resource>
<RequestId>{}</RequestId>
</Error>"#,
            crate::utils::xml_escape(&self.code),
            crate::utils::xml_escape(&self.message),
            crate::utils::xml_escape(resource),
            crate::utils::xml_escape(&self.request_id)
        )
    }
}
