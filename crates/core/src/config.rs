//! Configuration management for oss-publish
//!
//! Configuration is assembled from layers of [`PartialConfig`] overrides and
//! merged over [`Config::default`]. Nothing is validated until
//! [`validate_config`] turns the merged record into a [`StorageTarget`].

use crate::error::{Error, Result};
use dirs::home_dir;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration directory name
const CONFIG_DIR: &str = "oss-publish";

/// Credentials file name (kept outside the project tree)
const CREDENTIALS_FILE: &str = "credentials.toml";

/// Project configuration file name
pub const PROJECT_CONFIG_FILE: &str = "oss.toml";

/// Source directory scanned when none is configured
pub const DEFAULT_SOURCE_DIRECTORY: &str = "src/assets";

/// Extensions rejected by [`ExtensionPolicy::DenyList`]
pub const DENY_LIST_EXTENSIONS: &[&str] = &[".js", ".svg"];

/// Extensions accepted by [`ExtensionPolicy::AllowList`]
pub const ALLOW_LIST_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif"];

/// Unreserved URL characters stay literal in a path segment
const URL_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Which files are eligible for upload, by extension
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtensionPolicy {
    /// Upload everything except the listed extensions
    #[default]
    DenyList,
    /// Upload only the listed extensions
    AllowList,
}

impl ExtensionPolicy {
    pub fn default_extensions(&self) -> &'static [&'static str] {
        match self {
            ExtensionPolicy::DenyList => DENY_LIST_EXTENSIONS,
            ExtensionPolicy::AllowList => ALLOW_LIST_EXTENSIONS,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ExtensionPolicy::DenyList => "deny-list",
            ExtensionPolicy::AllowList => "allow-list",
        }
    }
}

/// When local originals are removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeleteTiming {
    /// Remove only after a confirmed upload, and only with `delete_origin`
    #[default]
    AfterSuccess,
    /// Remove as soon as the file is selected; the upload runs from memory
    BeforeUpload,
}

impl DeleteTiming {
    pub fn as_str(&self) -> &str {
        match self {
            DeleteTiming::AfterSuccess => "after-success",
            DeleteTiming::BeforeUpload => "before-upload",
        }
    }
}

/// User-supplied overrides. Every field is optional; `None` keeps the lower layer.
///
/// Field names accept both the host option spelling (`accessKeyId`) and
/// snake_case (`access_key_id`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialConfig {
    #[serde(alias = "accessKeyId", skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,

    #[serde(alias = "accessKeySecret", skip_serializing_if = "Option::is_none")]
    pub access_key_secret: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(alias = "targetDirectory", skip_serializing_if = "Option::is_none")]
    pub target_directory: Option<String>,

    #[serde(alias = "sourceDirectory", skip_serializing_if = "Option::is_none")]
    pub source_directory: Option<String>,

    #[serde(alias = "sourceDirectoryList", skip_serializing_if = "Option::is_none")]
    pub source_directory_list: Option<Vec<String>>,

    #[serde(alias = "minFileSize", skip_serializing_if = "Option::is_none")]
    pub min_file_size: Option<u64>,

    #[serde(alias = "deleteOrigin", skip_serializing_if = "Option::is_none")]
    pub delete_origin: Option<bool>,

    #[serde(alias = "extensionPolicy", skip_serializing_if = "Option::is_none")]
    pub extension_policy: Option<ExtensionPolicy>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,

    #[serde(alias = "deleteTiming", skip_serializing_if = "Option::is_none")]
    pub delete_timing: Option<DeleteTiming>,

    #[serde(alias = "maxConcurrentUploads", skip_serializing_if = "Option::is_none")]
    pub max_concurrent_uploads: Option<usize>,
}

impl PartialConfig {
    /// Layer `upper` over `self`; fields set in `upper` win.
    pub fn layer(self, upper: PartialConfig) -> PartialConfig {
        // A single directory in the upper layer replaces a list below it, and vice versa.
        let (source_directory, source_directory_list) =
            if upper.source_directory.is_some() || upper.source_directory_list.is_some() {
                (upper.source_directory, upper.source_directory_list)
            } else {
                (self.source_directory, self.source_directory_list)
            };

        PartialConfig {
            access_key_id: upper.access_key_id.or(self.access_key_id),
            access_key_secret: upper.access_key_secret.or(self.access_key_secret),
            region: upper.region.or(self.region),
            bucket: upper.bucket.or(self.bucket),
            endpoint: upper.endpoint.or(self.endpoint),
            target_directory: upper.target_directory.or(self.target_directory),
            source_directory,
            source_directory_list,
            min_file_size: upper.min_file_size.or(self.min_file_size),
            delete_origin: upper.delete_origin.or(self.delete_origin),
            extension_policy: upper.extension_policy.or(self.extension_policy),
            extensions: upper.extensions.or(self.extensions),
            delete_timing: upper.delete_timing.or(self.delete_timing),
            max_concurrent_uploads: upper.max_concurrent_uploads.or(self.max_concurrent_uploads),
        }
    }

    /// Parse host-style options (a JSON object) into overrides
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::InvalidConfig(
                "OSS options must be an object".to_string(),
            ));
        }
        Ok(serde_json::from_value(value.clone())?)
    }
}

/// Merged configuration: defaults with every override layer applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    pub region: Option<String>,
    pub bucket: Option<String>,
    pub endpoint: Option<String>,
    pub target_directory: Option<String>,
    pub source_directories: Vec<String>,
    pub min_file_size: u64,
    pub delete_origin: bool,
    pub extension_policy: ExtensionPolicy,
    pub extensions: Option<Vec<String>>,
    pub delete_timing: DeleteTiming,
    pub max_concurrent_uploads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            access_key_id: None,
            access_key_secret: None,
            region: None,
            bucket: None,
            endpoint: None,
            target_directory: None,
            source_directories: vec![DEFAULT_SOURCE_DIRECTORY.to_string()],
            min_file_size: 0,
            delete_origin: false,
            extension_policy: ExtensionPolicy::default(),
            extensions: None,
            delete_timing: DeleteTiming::default(),
            max_concurrent_uploads: default_max_concurrent(),
        }
    }
}

impl Config {
    /// Normalized extension set for the active policy: lowercase, leading dot
    pub fn extension_set(&self) -> Vec<String> {
        match &self.extensions {
            Some(custom) => custom.iter().map(|e| normalize_extension(e)).collect(),
            None => self
                .extension_policy
                .default_extensions()
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

fn default_max_concurrent() -> usize {
    5
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

/// Merge overrides into defaults, field by field; overrides win
pub fn merge(defaults: Config, overrides: PartialConfig) -> Config {
    let source_directories = match (overrides.source_directory_list, overrides.source_directory) {
        (Some(list), _) => list,
        (None, Some(single)) => vec![single],
        (None, None) => defaults.source_directories,
    };

    Config {
        access_key_id: overrides.access_key_id.or(defaults.access_key_id),
        access_key_secret: overrides.access_key_secret.or(defaults.access_key_secret),
        region: overrides.region.or(defaults.region),
        bucket: overrides.bucket.or(defaults.bucket),
        endpoint: overrides.endpoint.or(defaults.endpoint),
        target_directory: overrides.target_directory.or(defaults.target_directory),
        source_directories,
        min_file_size: overrides.min_file_size.unwrap_or(defaults.min_file_size),
        delete_origin: overrides.delete_origin.unwrap_or(defaults.delete_origin),
        extension_policy: overrides.extension_policy.unwrap_or(defaults.extension_policy),
        extensions: overrides.extensions.or(defaults.extensions),
        delete_timing: overrides.delete_timing.unwrap_or(defaults.delete_timing),
        max_concurrent_uploads: overrides
            .max_concurrent_uploads
            .unwrap_or(defaults.max_concurrent_uploads),
    }
}

/// Validated connection and placement settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageTarget {
    pub access_key_id: String,
    pub access_key_secret: String,
    pub region: String,
    pub bucket: String,
    pub endpoint: Option<String>,
    /// Key prefix without leading or trailing `/`
    pub target_directory: String,
}

impl StorageTarget {
    /// Remote key for a file: `{target_directory}/{file_name}`
    pub fn object_key(&self, file_name: &str) -> String {
        format!("{}/{}", self.target_directory, file_name)
    }

    /// Endpoint the client talks to
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.aliyuncs.com", self.region),
        }
    }

    /// Public base URL under which uploaded objects are served
    pub fn public_base_url(&self) -> String {
        public_base_url(&self.bucket, &self.region, &self.target_directory)
    }

    /// Public URL of one uploaded file, with the name percent-encoded
    pub fn object_url(&self, file_name: &str) -> String {
        format!(
            "{}{}",
            self.public_base_url(),
            utf8_percent_encode(file_name, URL_SEGMENT)
        )
    }
}

/// `https://{bucket}.{region}.aliyuncs.com/{target_directory}/`
pub fn public_base_url(bucket: &str, region: &str, target_directory: &str) -> String {
    format!(
        "https://{}.{}.aliyuncs.com/{}/",
        bucket,
        region,
        target_directory.trim_matches('/')
    )
}

/// Present and not blank; the stored value is kept as written
fn required(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

/// Validate configuration
///
/// Every missing field is reported in a single [`Error::MissingConfig`].
pub fn validate_config(config: &Config) -> Result<StorageTarget> {
    let access_key_id = required(&config.access_key_id);
    let access_key_secret = required(&config.access_key_secret);
    let region = required(&config.region);
    let bucket = required(&config.bucket);
    let target_directory = config
        .target_directory
        .as_deref()
        .map(|t| t.trim().trim_matches('/').to_string())
        .filter(|t| !t.is_empty());

    let mut missing = Vec::new();
    if access_key_id.is_none() {
        missing.push("accessKeyId");
    }
    if access_key_secret.is_none() {
        missing.push("accessKeySecret");
    }
    if region.is_none() {
        missing.push("region");
    }
    if bucket.is_none() {
        missing.push("bucket");
    }
    if target_directory.is_none() {
        missing.push("targetDirectory");
    }

    let (
        Some(access_key_id),
        Some(access_key_secret),
        Some(region),
        Some(bucket),
        Some(target_directory),
    ) = (access_key_id, access_key_secret, region, bucket, target_directory)
    else {
        return Err(Error::MissingConfig(missing));
    };

    let endpoint = required(&config.endpoint);
    if let Some(endpoint) = &endpoint {
        validate_endpoint(endpoint)?;
    }

    if config.max_concurrent_uploads == 0 {
        return Err(Error::InvalidInput(
            "maxConcurrentUploads must be at least 1".to_string(),
        ));
    }

    Ok(StorageTarget {
        access_key_id,
        access_key_secret,
        region,
        bucket,
        endpoint,
        target_directory,
    })
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    let uri: http::Uri = endpoint
        .parse()
        .map_err(|e| Error::InvalidConfig(format!("Invalid endpoint URL '{}': {}", endpoint, e)))?;

    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        _ => {
            return Err(Error::InvalidConfig(format!(
                "Endpoint must start with http:// or https:// (got '{}')",
                endpoint
            )))
        }
    }

    if uri.host().is_none() {
        return Err(Error::InvalidConfig(format!(
            "Endpoint has no host: '{}'",
            endpoint
        )));
    }

    Ok(())
}

/// Get the global configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let home =
        home_dir().ok_or_else(|| Error::Config("Cannot determine home directory".to_string()))?;
    Ok(home.join(".config").join(CONFIG_DIR))
}

/// Get the global credentials file path
pub fn get_credentials_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CREDENTIALS_FILE))
}

/// Get the project configuration file path
pub fn get_project_config_path(root: &Path) -> PathBuf {
    root.join(PROJECT_CONFIG_FILE)
}

/// Load overrides from a `.toml` or `.json` file
pub fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        return Err(Error::ConfigNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::InvalidConfig(format!("Failed to read config file: {}", e)))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let config = if is_json {
        serde_json::from_str(&content)
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse config file: {}", e)))?
    } else {
        toml::from_str(&content)
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse config file: {}", e)))?
    };

    Ok(config)
}

/// Load the global credentials file; a missing file yields empty overrides
pub fn load_global_credentials() -> Result<PartialConfig> {
    let path = get_credentials_path()?;
    if !path.exists() {
        return Ok(PartialConfig::default());
    }
    load_config_file(&path)
}

/// Save overrides to a TOML file readable only by its owner
pub fn save_config(path: &Path, config: &PartialConfig) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::InvalidConfig(format!("Failed to serialize config: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Config(format!("Failed to create config directory: {}", e))
            })?;
        }
    }

    fs::write(path, content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

    // Set secure permissions on config file (read/write for owner only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms)?;
    }

    Ok(())
}

/// Check if a configuration file exists
pub fn config_exists(path: &Path) -> bool {
    path.exists()
}
