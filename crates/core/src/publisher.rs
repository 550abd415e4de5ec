//! Asset publisher: scan, filter, upload, clean up

use crate::client::{content_type_for, ObjectStore, OssClient, UploadSource};
use crate::config::{validate_config, Config, DeleteTiming, StorageTarget};
use crate::error::Result;
use crate::scan::{scan_directories, CandidateFile, FileFilter, ScanResult, SkippedFile};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// A file that reached the bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub file_name: String,
    pub path: PathBuf,
    pub key: String,
    pub url: String,
    pub etag: Option<String>,
    /// The local file no longer exists
    pub removed_local: bool,
}

/// A file whose single upload attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUpload {
    pub file_name: String,
    pub path: PathBuf,
    pub key: String,
    pub error: String,
    /// Only possible with [`DeleteTiming::BeforeUpload`]
    pub removed_local: bool,
}

/// Result of one publish run
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub uploaded: Vec<UploadRecord>,
    pub failed: Vec<FailedUpload>,
    pub skipped: Vec<SkippedFile>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PublishReport {
    /// No upload failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Local paths removed during the run
    pub fn removed_paths(&self) -> Vec<&Path> {
        self.uploaded
            .iter()
            .filter(|u| u.removed_local)
            .map(|u| u.path.as_path())
            .chain(
                self.failed
                    .iter()
                    .filter(|f| f.removed_local)
                    .map(|f| f.path.as_path()),
            )
            .collect()
    }
}

enum UploadOutcome {
    Uploaded(UploadRecord),
    Failed(FailedUpload),
}

/// Publishes the assets of one project
pub struct Publisher {
    root: PathBuf,
    config: Config,
}

impl Publisher {
    /// `root` is the project directory source directories are relative to
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List and filter every source directory without touching anything
    pub fn scan(&self) -> Result<ScanResult> {
        let filter = FileFilter::from_config(&self.config);
        scan_directories(&self.root, &self.config.source_directories, &filter)
    }

    /// Validate, then upload to the configured OSS bucket
    pub async fn publish(&self) -> Result<PublishReport> {
        let target = validate_config(&self.config)?;
        let client = OssClient::new(&target);
        self.run(&target, &client).await
    }

    /// Validate, then upload through `store`
    pub async fn publish_with<S>(&self, store: &S) -> Result<PublishReport>
    where
        S: ObjectStore + ?Sized,
    {
        let target = validate_config(&self.config)?;
        self.run(&target, store).await
    }

    async fn run<S>(&self, target: &StorageTarget, store: &S) -> Result<PublishReport>
    where
        S: ObjectStore + ?Sized,
    {
        let started_at = Utc::now();

        // Every directory is listed before the first upload or deletion.
        let ScanResult { selected, skipped } = self.scan()?;

        info!(
            candidates = selected.len(),
            skipped = skipped.len(),
            bucket = %target.bucket,
            "publishing assets"
        );

        let outcomes: Vec<UploadOutcome> = stream::iter(selected)
            .map(|file| self.upload_one(target, store, file))
            .buffer_unordered(self.config.max_concurrent_uploads.max(1))
            .collect()
            .await;

        let mut uploaded = Vec::new();
        let mut failed = Vec::new();
        for outcome in outcomes {
            match outcome {
                UploadOutcome::Uploaded(record) => uploaded.push(record),
                UploadOutcome::Failed(failure) => failed.push(failure),
            }
        }

        info!(
            uploaded = uploaded.len(),
            failed = failed.len(),
            "publish finished"
        );

        Ok(PublishReport {
            uploaded,
            failed,
            skipped,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn upload_one<S>(
        &self,
        target: &StorageTarget,
        store: &S,
        file: CandidateFile,
    ) -> UploadOutcome
    where
        S: ObjectStore + ?Sized,
    {
        let key = target.object_key(&file.file_name);
        let content_type = content_type_for(&file.path);
        let remove_first = self.config.delete_timing == DeleteTiming::BeforeUpload;

        let source = if remove_first {
            match take_file(&file.path).await {
                Ok(bytes) => UploadSource::Buffered(bytes),
                Err(e) => {
                    error!("Failed to read {} for upload: {}", file.file_name, e);
                    return UploadOutcome::Failed(FailedUpload {
                        file_name: file.file_name,
                        path: file.path,
                        key,
                        error: e.to_string(),
                        removed_local: false,
                    });
                }
            }
        } else {
            UploadSource::File(file.path.clone())
        };

        match store.put_object(&key, source, &content_type).await {
            Ok(result) => {
                info!("Uploaded {} to OSS as {}", file.file_name, key);

                let removed_local = if remove_first {
                    true
                } else if self.config.delete_origin {
                    remove_local(&file.path).await
                } else {
                    false
                };

                UploadOutcome::Uploaded(UploadRecord {
                    url: target.object_url(&file.file_name),
                    file_name: file.file_name,
                    path: file.path,
                    key,
                    etag: result.etag,
                    removed_local,
                })
            }
            Err(e) => {
                error!("Failed to upload {} to OSS: {}", file.file_name, e);
                if remove_first {
                    warn!("Local copy of {} was removed before the upload", file.file_name);
                }

                UploadOutcome::Failed(FailedUpload {
                    file_name: file.file_name,
                    path: file.path,
                    key,
                    error: e.to_string(),
                    removed_local: remove_first,
                })
            }
        }
    }
}

/// Read a file into memory, then remove it from disk
async fn take_file(path: &Path) -> std::io::Result<Vec<u8>> {
    let bytes = tokio::fs::read(path).await?;
    tokio::fs::remove_file(path).await?;
    Ok(bytes)
}

async fn remove_local(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}
