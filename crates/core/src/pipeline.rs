//! Asset-loader rules for production builds
//!
//! In production the host stops bundling image files and instead emits
//! references under the bucket's public URL. The rules are plain data; the
//! host splices them into its own loader chain.

use crate::config::{public_base_url, Config, ExtensionPolicy, ALLOW_LIST_EXTENSIONS};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Host build mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl FromStr for BuildMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(BuildMode::Development),
            "production" | "prod" => Ok(BuildMode::Production),
            other => Err(Error::InvalidInput(format!(
                "Unknown build mode '{}' (expected development or production)",
                other
            ))),
        }
    }
}

/// Options of the URL-emitting loader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderOptions {
    /// Output name template
    pub name: String,
    /// Base URL prepended to every emitted reference
    pub public_path: String,
    /// Files are already in the bucket, so nothing is written to the output dir
    pub emit_file: bool,
}

/// A single loader rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderRule {
    pub name: String,
    pub test: String,
    pub loader: String,
    pub options: LoaderOptions,
}

/// Changes to apply to the host's loader chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRules {
    /// Extensions to drop from the host's inline/bundle rules
    pub exclude_from_bundling: Vec<String>,
    pub rule: LoaderRule,
}

/// `\.(png|jpg)$` for `[".png", ".jpg"]`
pub fn extension_pattern(extensions: &[String]) -> String {
    let alternatives: Vec<String> = extensions
        .iter()
        .map(|e| escape_regex(e.trim_start_matches('.')))
        .collect();
    format!(r"\.({})$", alternatives.join("|"))
}

fn escape_regex(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Image extensions that resolve remotely
fn remote_extensions(config: &Config) -> Vec<String> {
    match config.extension_policy {
        ExtensionPolicy::AllowList => config.extension_set(),
        // A deny-list has no finite set to route, so use the common image types.
        ExtensionPolicy::DenyList => ALLOW_LIST_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
    }
}

/// Loader rules for `mode`; `None` outside production
///
/// Needs `bucket`, `region` and `targetDirectory`; credentials are not used.
pub fn asset_rules(config: &Config, mode: BuildMode) -> Result<Option<AssetRules>> {
    if mode != BuildMode::Production {
        return Ok(None);
    }

    let present = |v: &Option<String>| {
        v.as_deref()
            .map(|s| s.trim().trim_matches('/').to_string())
            .filter(|s| !s.is_empty())
    };

    let mut missing = Vec::new();
    let bucket = present(&config.bucket);
    let region = present(&config.region);
    let target = present(&config.target_directory);
    if bucket.is_none() {
        missing.push("bucket");
    }
    if region.is_none() {
        missing.push("region");
    }
    if target.is_none() {
        missing.push("targetDirectory");
    }
    let (Some(bucket), Some(region), Some(target)) = (bucket, region, target) else {
        return Err(Error::MissingConfig(missing));
    };

    let extensions = remote_extensions(config);

    Ok(Some(AssetRules {
        rule: LoaderRule {
            name: "oss-images".to_string(),
            test: extension_pattern(&extensions),
            loader: "file-loader".to_string(),
            options: LoaderOptions {
                name: "[name].[ext]".to_string(),
                public_path: public_base_url(&bucket, &region, &target),
                emit_file: false,
            },
        },
        exclude_from_bundling: extensions,
    }))
}
