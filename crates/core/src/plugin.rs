//! Host build-tool integration
//!
//! A host registers the plugin through its [`PluginDescriptor`] and calls
//! the [`PluginHooks`] at the matching points of its build: once when the
//! loader chain is configured and once after the build completes.

use crate::client::ObjectStore;
use crate::config::{merge, Config, PartialConfig, DEFAULT_SOURCE_DIRECTORY};
use crate::error::Error;
use crate::pipeline::{asset_rules, AssetRules, BuildMode};
use crate::publisher::{PublishReport, Publisher};
use futures::future::{BoxFuture, FutureExt};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Key under which the host stores this plugin's options
pub const PLUGIN_KEY: &str = "oss";

/// How the host build ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Succeeded,
    Failed(String),
}

impl BuildOutcome {
    /// Map a process exit code; zero is success
    pub fn from_exit_code(code: i32) -> Self {
        if code == 0 {
            BuildOutcome::Succeeded
        } else {
            BuildOutcome::Failed(format!("build exited with status {}", code))
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            BuildOutcome::Succeeded => None,
            BuildOutcome::Failed(reason) => Some(reason),
        }
    }
}

/// What the host needs to register the plugin
#[derive(Clone)]
pub struct PluginDescriptor {
    pub key: &'static str,
    pub default_config: serde_json::Value,
    pub validate: fn(&serde_json::Value) -> bool,
}

pub type BuildCompleteHook =
    Box<dyn Fn(BuildOutcome) -> BoxFuture<'static, Option<PublishReport>> + Send + Sync>;

pub type ConfigurePipelineHook = Box<dyn Fn(BuildMode) -> Option<AssetRules> + Send + Sync>;

/// Callbacks a host may invoke; either may be absent
#[derive(Default)]
pub struct PluginHooks {
    pub on_build_complete: Option<BuildCompleteHook>,
    pub on_configure_pipeline: Option<ConfigurePipelineHook>,
}

/// Accepts any JSON object whose known fields have the right types
pub fn validate_options(value: &serde_json::Value) -> bool {
    PartialConfig::from_json(value).is_ok()
}

/// Descriptor with the built-in defaults, spelled the way hosts pass options
pub fn descriptor() -> PluginDescriptor {
    let defaults = Config::default();
    PluginDescriptor {
        key: PLUGIN_KEY,
        default_config: serde_json::json!({
            "deleteOrigin": defaults.delete_origin,
            "minFileSize": defaults.min_file_size,
            "sourceDirectoryList": [DEFAULT_SOURCE_DIRECTORY],
        }),
        validate: validate_options,
    }
}

/// The asset publisher bound to one project
pub struct OssPlugin {
    root: PathBuf,
    config: Config,
    store: Option<Arc<dyn ObjectStore>>,
}

impl OssPlugin {
    /// Merge the user's options over the defaults
    pub fn new(root: impl Into<PathBuf>, user_options: PartialConfig) -> Self {
        Self::with_config(root, merge(Config::default(), user_options))
    }

    pub fn with_config(root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            config,
            store: None,
        }
    }

    /// Upload through `store` instead of a client built from the configuration
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Publish assets unless the build failed
    ///
    /// Never fails: configuration and listing errors are logged and yield `None`.
    pub async fn on_build_complete(&self, outcome: BuildOutcome) -> Option<PublishReport> {
        if let Some(reason) = outcome.error() {
            info!("Skipping OSS upload: {}", reason);
            return None;
        }

        let publisher = Publisher::new(self.root.clone(), self.config.clone());
        let result = match &self.store {
            Some(store) => publisher.publish_with(store.as_ref()).await,
            None => publisher.publish().await,
        };

        match result {
            Ok(report) => Some(report),
            Err(Error::MissingConfig(fields)) => {
                warn!(
                    "Please configure valid OSS parameters (missing: {})",
                    fields.join(", ")
                );
                None
            }
            Err(e) => {
                error!("OSS upload aborted: {}", e);
                None
            }
        }
    }

    /// Loader rules for production builds
    pub fn on_configure_pipeline(&self, mode: BuildMode) -> Option<AssetRules> {
        match asset_rules(&self.config, mode) {
            Ok(rules) => rules,
            Err(e) => {
                warn!("Keeping local asset bundling: {}", e);
                None
            }
        }
    }

    /// Both hooks, sharing this plugin
    pub fn into_hooks(self) -> PluginHooks {
        let plugin = Arc::new(self);
        let on_complete = Arc::clone(&plugin);

        PluginHooks {
            on_build_complete: Some(Box::new(move |outcome| {
                let plugin = Arc::clone(&on_complete);
                async move { plugin.on_build_complete(outcome).await }.boxed()
            })),
            on_configure_pipeline: Some(Box::new(move |mode| plugin.on_configure_pipeline(mode))),
        }
    }
}
