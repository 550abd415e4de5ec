//! oss-publish-core - Core library for the oss-publish build companion
//!
//! After a frontend build finishes, this library scans the project's asset
//! directories, uploads qualifying files to an Aliyun OSS bucket and
//! optionally removes the local originals. It can also emit loader rules so
//! production builds reference the bucket instead of bundling images.

pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod plugin;
pub mod publisher;
pub mod scan;

// Re-export commonly used types
pub use client::{content_type_for, ObjectStore, OssClient, PutResult, UploadSource};
pub use config::{
    config_exists, get_credentials_path, get_project_config_path, load_config_file,
    load_global_credentials, merge, public_base_url, save_config, validate_config,
};
pub use config::{Config, DeleteTiming, ExtensionPolicy, PartialConfig, StorageTarget};
pub use error::{Error, Result};
pub use pipeline::{asset_rules, AssetRules, BuildMode, LoaderOptions, LoaderRule};
pub use plugin::{
    descriptor, BuildOutcome, OssPlugin, PluginDescriptor, PluginHooks, PLUGIN_KEY,
};
pub use publisher::{FailedUpload, PublishReport, Publisher, UploadRecord};
pub use scan::{CandidateFile, FileFilter, ScanResult, SkipReason, SkippedFile};
