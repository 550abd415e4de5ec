//! OSS client implementation using the AWS S3 SDK
//!
//! Aliyun OSS speaks the S3 protocol with virtual-hosted bucket addressing,
//! so the stock SDK client only needs the OSS endpoint and region.

use crate::config::StorageTarget;
use crate::error::Result;
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{
        BehaviorVersion, Credentials, Region, RequestChecksumCalculation,
        ResponseChecksumValidation,
    },
    primitives::ByteStream,
    Client,
};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where the bytes of an upload come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    /// Streamed from disk at send time
    File(PathBuf),
    /// Already read into memory (the local file may be gone)
    Buffered(Vec<u8>),
}

/// Successful put
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResult {
    pub key: String,
    pub etag: Option<String>,
}

/// Remote bucket the publisher writes to
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `source` under `key`. One attempt, no retry.
    async fn put_object(
        &self,
        key: &str,
        source: UploadSource,
        content_type: &str,
    ) -> Result<PutResult>;
}

/// OSS client bound to one bucket
pub struct OssClient {
    client: Client,
    bucket: String,
}

impl OssClient {
    /// Create a new OSS client from validated settings
    pub fn new(target: &StorageTarget) -> Self {
        let credentials = Credentials::new(
            &target.access_key_id,
            &target.access_key_secret,
            None,
            None,
            "oss-publish",
        );

        // OSS rejects the SDK's default CRC32 trailers, so only send checksums when required.
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(target.endpoint_url())
            .region(Region::new(target.region.clone()))
            .credentials_provider(credentials)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
            .build();

        let client = Client::from_conf(config);

        Self {
            client,
            bucket: target.bucket.clone(),
        }
    }

    /// Check that the bucket is reachable with the configured credentials
    pub async fn head_bucket(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await?;

        Ok(())
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for OssClient {
    async fn put_object(
        &self,
        key: &str,
        source: UploadSource,
        content_type: &str,
    ) -> Result<PutResult> {
        let body = match source {
            UploadSource::File(path) => ByteStream::from_path(&path).await?,
            UploadSource::Buffered(bytes) => ByteStream::from(bytes),
        };

        debug!(bucket = %self.bucket, key, content_type, "put object");

        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await?;

        Ok(PutResult {
            key: key.to_string(),
            etag: output.e_tag().map(|t| t.trim_matches('"').to_string()),
        })
    }
}

/// Content type guessed from the file extension
pub fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}
