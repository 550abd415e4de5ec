//! Error types for oss-publish-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for oss-publish-core
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for oss-publish-core
#[derive(Error, Debug)]
pub enum Error {
    /// Required fields are absent or empty
    #[error("Missing required OSS configuration: {}", .0.join(", "))]
    MissingConfig(Vec<&'static str>),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidConfig(String),

    /// A source directory could not be listed
    #[error("Failed to list {path}: {source}")]
    Listing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// OSS operation errors
    #[error("OSS operation failed: {0}")]
    OssOperation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

// Generic SdkError conversion for all S3 operations
impl<E> From<aws_sdk_s3::error::SdkError<E>> for Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: aws_sdk_s3::error::SdkError<E>) -> Self {
        // Display of SdkError alone is just "service error", so walk the source chain.
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = std::error::Error::source(inner);
        }
        Error::OssOperation(message)
    }
}

// ByteStreamError conversion
impl From<aws_sdk_s3::primitives::ByteStreamError> for Error {
    fn from(err: aws_sdk_s3::primitives::ByteStreamError) -> Self {
        Error::OssOperation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_lists_every_field() {
        let err = Error::MissingConfig(vec!["bucket", "region"]);
        assert_eq!(
            err.to_string(),
            "Missing required OSS configuration: bucket, region"
        );
    }

    #[test]
    fn test_listing_error_names_path() {
        let err = Error::Listing {
            path: PathBuf::from("/tmp/nope"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("/tmp/nope"));
    }
}
