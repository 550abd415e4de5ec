//! Interactive setup wizard for oss-publish configuration

use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use oss_publish_core::{
    get_credentials_path, get_project_config_path, public_base_url, save_config, PartialConfig,
};
use std::path::Path;

/// Common OSS regions offered by the wizard
const REGIONS: &[&str] = &[
    "oss-cn-hangzhou",
    "oss-cn-shanghai",
    "oss-cn-beijing",
    "oss-cn-shenzhen",
    "oss-cn-hongkong",
    "oss-ap-southeast-1",
    "oss-us-west-1",
    "oss-eu-central-1",
];

/// Run the interactive setup wizard
pub async fn run_init_wizard(root: &Path) -> Result<()> {
    println!("🚀 Welcome to oss-publish setup!\n");

    println!("This wizard will guide you through the configuration process.");
    println!("You will need:");
    println!("  1. An OSS AccessKey ID + AccessKey secret");
    println!("  2. The region and name of your bucket");
    println!("  3. The directory your built assets land in\n");

    let theme = ColorfulTheme::default();

    // Step 1: Credentials
    let (access_key_id, access_key_secret) = prompt_credentials()?;

    // Step 2: Region and bucket
    let region = prompt_region()?;
    let bucket = prompt_bucket_name()?;

    // Step 3: Placement
    let target_directory: String = Input::with_theme(&theme)
        .with_prompt("Target directory inside the bucket")
        .default("static".to_string())
        .interact()?;

    let source_directory: String = Input::with_theme(&theme)
        .with_prompt("Source directory (relative to the project root)")
        .default("src/assets".to_string())
        .interact()?;

    let min_file_size: u64 = Input::with_theme(&theme)
        .with_prompt("Minimum file size in bytes")
        .default(0)
        .interact()?;

    let delete_origin = Confirm::with_theme(&theme)
        .with_prompt("Delete local files after a successful upload?")
        .default(false)
        .interact()?;

    let global_credentials = Confirm::with_theme(&theme)
        .with_prompt("Store credentials in ~/.config/oss-publish instead of the project?")
        .default(true)
        .interact()?;

    let project_path = get_project_config_path(root);
    let credentials_path = get_credentials_path()?;

    // Summary
    println!("\n📋 Configuration summary:");
    println!("  Region: {}", region);
    println!("  Bucket: {}", bucket);
    println!("  Source: {}", source_directory);
    println!("  Public URL: {}", public_base_url(&bucket, &region, &target_directory));
    println!(
        "  Credentials: {}",
        if global_credentials {
            credentials_path.display().to_string()
        } else {
            project_path.display().to_string()
        }
    );

    // Confirmation
    let confirm = Confirm::with_theme(&theme)
        .with_prompt("Save this configuration?")
        .default(false)
        .interact()?;

    if !confirm {
        println!("❌ Configuration cancelled");
        return Ok(());
    }

    let credentials = PartialConfig {
        access_key_id: Some(access_key_id),
        access_key_secret: Some(access_key_secret),
        ..Default::default()
    };

    let project = PartialConfig {
        region: Some(region),
        bucket: Some(bucket),
        target_directory: Some(target_directory),
        source_directory: Some(source_directory),
        min_file_size: Some(min_file_size),
        delete_origin: Some(delete_origin),
        ..Default::default()
    };

    // Save config
    let pb = ProgressBar::new(2);
    pb.set_style(
        ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.set_message("Saving configuration...");

    if global_credentials {
        save_config(&credentials_path, &credentials)?;
        pb.inc(1);
        save_config(&project_path, &project)?;
    } else {
        pb.inc(1);
        save_config(&project_path, &credentials.layer(project))?;
    }

    pb.inc(1);
    pb.finish_with_message("✅ Configuration saved!");

    println!("\n🎉 Setup complete!");
    println!("\nConfiguration saved to: {}", project_path.display());
    println!("\nYou can now use oss-publish:");
    println!("  $ oss-publish scan");
    println!("  $ npm run build; oss-publish hook --exit-code $?");
    println!("  $ oss-publish config show");

    Ok(())
}

/// Prompt for the AccessKey pair
fn prompt_credentials() -> Result<(String, String)> {
    let access_key_id = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("AccessKey ID")
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("AccessKey ID cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to get AccessKey ID: {}", e))?;

    let access_key_secret = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("AccessKey secret")
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("AccessKey secret cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to get AccessKey secret: {}", e))?;

    Ok((access_key_id, access_key_secret))
}

/// Prompt for the OSS region
fn prompt_region() -> Result<String> {
    let mut items: Vec<&str> = REGIONS.to_vec();
    items.push("Other");

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Region")
        .items(&items)
        .default(0)
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to select region: {}", e))?;

    if selection < REGIONS.len() {
        return Ok(REGIONS[selection].to_string());
    }

    Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Region id (e.g. oss-cn-qingdao)")
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Region cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to get region: {}", e))
}

/// Prompt for the bucket name
fn prompt_bucket_name() -> Result<String> {
    Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Bucket name")
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.len() < 3 {
                Err("Bucket name must be at least 3 characters")
            } else if input.len() > 63 {
                Err("Bucket name must be less than 64 characters")
            } else if !input
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            {
                Err("Bucket name can only contain lowercase letters, digits and hyphens")
            } else if input.starts_with('-') || input.ends_with('-') {
                Err("Bucket name cannot start or end with a hyphen")
            } else {
                Ok(())
            }
        })
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to get bucket name: {}", e))
}
