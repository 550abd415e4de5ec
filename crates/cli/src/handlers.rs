//! Command handlers for oss-publish CLI

use crate::wizard::run_init_wizard;
use crate::{ConfigAction, GlobalArgs};
use anyhow::Result;
use clap::Command;
use clap_complete::{generate, Shell as ClapShell};
use oss_publish_core::{
    asset_rules, get_project_config_path, load_config_file, load_global_credentials, merge,
    validate_config, BuildMode, BuildOutcome, Config, Error, OssClient,
    PublishReport, Publisher,
};
use std::path::PathBuf;
use tabled::{Table, Tabled};
use tracing::debug;

/// Merge defaults, global credentials, the project file and command-line overrides
pub fn resolve_config(global: &GlobalArgs) -> Result<(PathBuf, Config)> {
    let root = global.root.clone();

    let mut layered = load_global_credentials()?;

    let project_file = match &global.config {
        Some(path) => Some(path.clone()),
        None => {
            let default_path = get_project_config_path(&root);
            default_path.exists().then_some(default_path)
        }
    };
    if let Some(path) = project_file {
        debug!("loading configuration from {}", path.display());
        layered = layered.layer(load_config_file(&path)?);
    }

    layered = layered.layer(global.overrides());

    Ok((root, merge(Config::default(), layered)))
}

/// Handle init command
pub async fn handle_init(global: &GlobalArgs) -> Result<()> {
    run_init_wizard(&global.root).await
}

/// Handle config commands
pub async fn handle_config(global: &GlobalArgs, action: &ConfigAction) -> Result<()> {
    let (root, config) = resolve_config(global)?;

    match action {
        ConfigAction::Show => {
            println!("Current configuration:");
            println!();
            println!("OSS:");
            println!("  AccessKey ID: {}", mask(config.access_key_id.as_deref()));
            println!("  AccessKey secret: {}", mask(config.access_key_secret.as_deref()));
            println!("  Region: {}", config.region.as_deref().unwrap_or("(not set)"));
            println!("  Bucket: {}", config.bucket.as_deref().unwrap_or("(not set)"));
            println!(
                "  Endpoint: {}",
                config.endpoint.as_deref().unwrap_or("(region default)")
            );
            println!(
                "  Target directory: {}",
                config.target_directory.as_deref().unwrap_or("(not set)")
            );
            println!();
            println!("Assets:");
            println!("  Root: {}", root.display());
            println!("  Source directories: {}", config.source_directories.join(", "));
            println!("  Minimum size: {}", format_bytes(config.min_file_size));
            println!(
                "  Extension policy: {} ({})",
                config.extension_policy.as_str(),
                config.extension_set().join(" ")
            );
            println!("  Delete origin: {}", config.delete_origin);
            println!("  Delete timing: {}", config.delete_timing.as_str());
            println!("  Concurrent uploads: {}", config.max_concurrent_uploads);

            Ok(())
        }
        ConfigAction::Validate { remote } => {
            println!("Validating configuration...");

            let target = validate_config(&config)?;
            println!("  ✅ Required fields present");
            println!("  Endpoint: {}", target.endpoint_url());

            if *remote {
                println!("  Testing OSS connection...");
                let client = OssClient::new(&target);
                client.head_bucket().await?;
                println!("  ✅ Bucket '{}' reachable", client.bucket());
            }

            Ok(())
        }
    }
}

/// Handle scan command
pub async fn handle_scan(global: &GlobalArgs) -> Result<()> {
    let (root, config) = resolve_config(global)?;
    let target_directory = config.target_directory.clone();
    let publisher = Publisher::new(root, config);

    println!(
        "Scanning {}...",
        publisher.config().source_directories.join(", ")
    );

    let scan = publisher.scan()?;

    if scan.selected.is_empty() {
        println!("  No files to upload");
    } else {
        #[derive(Tabled)]
        struct CandidateRow {
            file: String,
            size: String,
            key: String,
        }

        let prefix = target_directory
            .as_deref()
            .map(|t| t.trim_matches('/').to_string())
            .unwrap_or_else(|| "<targetDirectory>".to_string());

        let rows: Vec<CandidateRow> = scan
            .selected
            .iter()
            .map(|c| CandidateRow {
                file: c.path.display().to_string(),
                size: format_bytes(c.size),
                key: format!("{}/{}", prefix, c.file_name),
            })
            .collect();

        println!();
        println!("{}", Table::new(rows));
    }

    if !scan.skipped.is_empty() {
        #[derive(Tabled)]
        struct SkippedRow {
            file: String,
            reason: String,
        }

        let rows: Vec<SkippedRow> = scan
            .skipped
            .iter()
            .map(|s| SkippedRow {
                file: s.path.display().to_string(),
                reason: s.reason.to_string(),
            })
            .collect();

        println!();
        println!("Skipped:");
        println!("{}", Table::new(rows));
    }

    Ok(())
}

/// Handle publish command
pub async fn handle_publish(global: &GlobalArgs, strict: bool, output: &str) -> Result<()> {
    let (root, config) = match resolve_config(global) {
        Ok(resolved) => resolved,
        Err(e) => {
            println!("❌ OSS upload aborted: {:#}", e);
            if strict {
                return Err(e);
            }
            return Ok(());
        }
    };
    let publisher = Publisher::new(root, config);

    match publisher.publish().await {
        Ok(report) => {
            print_report(&report, output)?;
            if strict && !report.is_success() {
                return Err(anyhow::anyhow!(
                    "{} upload(s) failed",
                    report.failed.len()
                ));
            }
            Ok(())
        }
        Err(Error::MissingConfig(fields)) => {
            println!(
                "⚠️  Please configure valid OSS parameters (missing: {})",
                fields.join(", ")
            );
            if strict {
                return Err(Error::MissingConfig(fields).into());
            }
            Ok(())
        }
        Err(e) => {
            println!("❌ OSS upload aborted: {}", e);
            if strict {
                return Err(e.into());
            }
            Ok(())
        }
    }
}

/// Handle hook command
pub async fn handle_hook(
    global: &GlobalArgs,
    exit_code: i32,
    strict: bool,
    output: &str,
) -> Result<()> {
    let outcome = BuildOutcome::from_exit_code(exit_code);
    if let Some(reason) = outcome.error() {
        println!("Skipping OSS upload: {}", reason);
        return Ok(());
    }

    handle_publish(global, strict, output).await
}

fn print_report(report: &PublishReport, output: &str) -> Result<()> {
    match output {
        "json" => {
            let json = serde_json::json!({
                "uploaded": report.uploaded.iter().map(|u| serde_json::json!({
                    "file": u.path,
                    "key": u.key,
                    "url": u.url,
                    "etag": u.etag,
                    "removedLocal": u.removed_local,
                })).collect::<Vec<_>>(),
                "failed": report.failed.iter().map(|f| serde_json::json!({
                    "file": f.path,
                    "key": f.key,
                    "error": f.error,
                    "removedLocal": f.removed_local,
                })).collect::<Vec<_>>(),
                "skipped": report.skipped.len(),
                "startedAt": report.started_at,
                "finishedAt": report.finished_at,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            if !report.uploaded.is_empty() {
                #[derive(Tabled)]
                struct UploadRow {
                    file: String,
                    key: String,
                    removed: String,
                }

                let rows: Vec<UploadRow> = report
                    .uploaded
                    .iter()
                    .map(|u| UploadRow {
                        file: u.file_name.clone(),
                        key: u.key.clone(),
                        removed: if u.removed_local { "yes" } else { "no" }.to_string(),
                    })
                    .collect();

                println!("{}", Table::new(rows));
            }

            if !report.failed.is_empty() {
                #[derive(Tabled)]
                struct FailedRow {
                    file: String,
                    error: String,
                }

                let rows: Vec<FailedRow> = report
                    .failed
                    .iter()
                    .map(|f| FailedRow {
                        file: f.file_name.clone(),
                        error: f.error.clone(),
                    })
                    .collect();

                println!("{}", Table::new(rows));
            }

            let elapsed = report.finished_at - report.started_at;
            println!(
                "  {} {} uploaded, {} failed, {} skipped ({} ms, finished {})",
                if report.is_success() { "✅" } else { "⚠️ " },
                report.uploaded.len(),
                report.failed.len(),
                report.skipped.len(),
                elapsed.num_milliseconds(),
                report
                    .finished_at
                    .with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M:%S"),
            );
        }
    }

    Ok(())
}

/// Handle url command
pub async fn handle_url(global: &GlobalArgs) -> Result<()> {
    let (_, config) = resolve_config(global)?;

    // Production rules carry the same presence checks and the base URL.
    let rules = asset_rules(&config, BuildMode::Production)?
        .ok_or_else(|| anyhow::anyhow!("No public URL for this configuration"))?;
    println!("{}", rules.rule.options.public_path);

    Ok(())
}

/// Handle rules command
pub async fn handle_rules(global: &GlobalArgs, mode: &str) -> Result<()> {
    let (_, config) = resolve_config(global)?;
    let mode: BuildMode = mode.parse()?;

    let rules = asset_rules(&config, mode)?;
    println!("{}", serde_json::to_string_pretty(&rules)?);

    Ok(())
}

/// Mask a secret, keeping the first four characters
fn mask(value: Option<&str>) -> String {
    match value {
        None => "(not set)".to_string(),
        Some(v) if v.chars().count() <= 4 => "****".to_string(),
        Some(v) => format!("{}****", v.chars().take(4).collect::<String>()),
    }
}

/// Format bytes to human-readable size
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Handle shell completion generation
pub async fn handle_completion(shell: &str, cmd: &mut Command) -> Result<()> {
    use std::io;

    let clap_shell = match shell {
        "bash" => ClapShell::Bash,
        "zsh" => ClapShell::Zsh,
        "fish" => ClapShell::Fish,
        "elvish" => ClapShell::Elvish,
        "powershell" | "pwsh" => ClapShell::PowerShell,
        _ => {
            return Err(anyhow::anyhow!(
                "Unsupported shell: {}\nSupported shells: bash, zsh, fish, elvish, powershell",
                shell
            ));
        }
    };

    // Only the script goes to stdout so it can be sourced directly.
    generate(clap_shell, cmd, "oss-publish", &mut io::stdout());

    Ok(())
}
