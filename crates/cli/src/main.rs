use anyhow::Result;
use clap::{CommandFactory, Parser, ValueEnum};
use color_eyre::config::HookBuilder;
use oss_publish_core::{DeleteTiming, ExtensionPolicy, PartialConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod handlers;
mod wizard;

/// oss-publish - upload built frontend assets to Aliyun OSS
#[derive(Parser, Debug)]
#[command(name = "oss-publish")]
#[command(author = "Kev <kev@m7academy.com>")]
#[command(version)]
#[command(about = "Upload built frontend assets to Aliyun OSS after a build", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    /// Sub-command to run
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every sub-command
#[derive(clap::Args, Debug, Default)]
pub struct GlobalArgs {
    /// Project root; source directories are relative to it
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Configuration file (default: <root>/oss.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// OSS AccessKey ID
    #[arg(long, global = true, env = "OSS_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key_id: Option<String>,

    /// OSS AccessKey secret
    #[arg(long, global = true, env = "OSS_ACCESS_KEY_SECRET", hide_env_values = true)]
    pub access_key_secret: Option<String>,

    /// OSS region, e.g. oss-cn-hangzhou
    #[arg(long, global = true, env = "OSS_REGION")]
    pub region: Option<String>,

    /// Bucket name
    #[arg(long, global = true, env = "OSS_BUCKET")]
    pub bucket: Option<String>,

    /// Custom endpoint (default: https://<region>.aliyuncs.com)
    #[arg(long, global = true, env = "OSS_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Key prefix inside the bucket
    #[arg(long, global = true, env = "OSS_TARGET_DIRECTORY")]
    pub target_directory: Option<String>,

    /// Source directory to scan (repeatable)
    #[arg(long = "source-directory", global = true)]
    pub source_directories: Vec<String>,

    /// Skip files smaller than this many bytes
    #[arg(long, global = true)]
    pub min_file_size: Option<u64>,

    /// Remove local files once uploaded (`--delete-origin=false` keeps them)
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub delete_origin: Option<bool>,

    /// Which extensions are eligible
    #[arg(long, global = true, value_enum)]
    pub extension_policy: Option<PolicyArg>,

    /// When local files are removed
    #[arg(long, global = true, value_enum)]
    pub delete_timing: Option<TimingArg>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum PolicyArg {
    DenyList,
    AllowList,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum TimingArg {
    AfterSuccess,
    BeforeUpload,
}

impl GlobalArgs {
    /// Command-line and environment overrides, the top configuration layer
    pub fn overrides(&self) -> PartialConfig {
        let source_directory_list = if self.source_directories.is_empty() {
            None
        } else {
            Some(self.source_directories.clone())
        };

        PartialConfig {
            access_key_id: self.access_key_id.clone(),
            access_key_secret: self.access_key_secret.clone(),
            region: self.region.clone(),
            bucket: self.bucket.clone(),
            endpoint: self.endpoint.clone(),
            target_directory: self.target_directory.clone(),
            source_directory_list,
            min_file_size: self.min_file_size,
            delete_origin: self.delete_origin,
            extension_policy: self.extension_policy.map(|p| match p {
                PolicyArg::DenyList => ExtensionPolicy::DenyList,
                PolicyArg::AllowList => ExtensionPolicy::AllowList,
            }),
            delete_timing: self.delete_timing.map(|t| match t {
                TimingArg::AfterSuccess => DeleteTiming::AfterSuccess,
                TimingArg::BeforeUpload => DeleteTiming::BeforeUpload,
            }),
            ..Default::default()
        }
    }
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Interactive setup (writes oss.toml)
    Init,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// List the files a publish would upload, without uploading
    Scan,

    /// Upload assets now
    Publish {
        /// Exit non-zero when configuration is missing or an upload fails
        #[arg(long)]
        strict: bool,
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Build-completion trigger: publish only when the build succeeded
    Hook {
        /// Exit status of the build command
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        exit_code: i32,
        /// Exit non-zero when configuration is missing or an upload fails
        #[arg(long)]
        strict: bool,
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Print the public base URL of uploaded assets
    Url,

    /// Print asset-loader rules as JSON
    Rules {
        /// Build mode (development, production)
        #[arg(short, long, default_value = "production")]
        mode: String,
    },

    /// Shell completion
    Completion {
        /// Shell type (bash, zsh, fish, elvish, powershell)
        shell: String,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the merged configuration
    Show,
    /// Check required fields
    Validate {
        /// Also check that the bucket is reachable
        #[arg(long)]
        remote: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup error handling
    if let Err(e) = HookBuilder::default().install() {
        eprintln!("Warning: Failed to install error handler: {}", e);
    }

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.global.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Execute command
    match cli.command {
        Commands::Init => handlers::handle_init(&cli.global).await,
        Commands::Config { action } => handlers::handle_config(&cli.global, &action).await,
        Commands::Scan => handlers::handle_scan(&cli.global).await,
        Commands::Publish { strict, output } => {
            handlers::handle_publish(&cli.global, strict, &output).await
        }
        Commands::Hook {
            exit_code,
            strict,
            output,
        } => handlers::handle_hook(&cli.global, exit_code, strict, &output).await,
        Commands::Url => handlers::handle_url(&cli.global).await,
        Commands::Rules { mode } => handlers::handle_rules(&cli.global, &mode).await,
        Commands::Completion { shell } => {
            handlers::handle_completion(&shell, &mut Cli::command()).await
        }
    }
}
