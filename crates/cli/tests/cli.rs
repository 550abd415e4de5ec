//! Command-line behaviour that needs no network access

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const OSS_ENV: &[&str] = &[
    "OSS_ACCESS_KEY_ID",
    "OSS_ACCESS_KEY_SECRET",
    "OSS_REGION",
    "OSS_BUCKET",
    "OSS_ENDPOINT",
    "OSS_TARGET_DIRECTORY",
];

/// The binary, isolated from the caller's environment and home directory
fn oss_publish(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("oss-publish").unwrap();
    for var in OSS_ENV {
        cmd.env_remove(var);
    }
    cmd.env("HOME", home).env_remove("RUST_LOG");
    cmd
}

fn setup_project() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    let assets = root.path().join("src").join("assets");
    fs::create_dir_all(&assets).unwrap();
    fs::write(assets.join("a.png"), vec![0u8; 50]).unwrap();
    fs::write(assets.join("b.jpg"), vec![0u8; 200]).unwrap();
    fs::write(assets.join("c.js"), vec![0u8; 500]).unwrap();
    root
}

#[test]
fn test_url_prints_public_base() {
    let root = setup_project();
    oss_publish(root.path())
        .args(["--root"])
        .arg(root.path())
        .args(["url", "--bucket", "b", "--region", "oss-cn-hangzhou", "--target-directory", "t"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://b.oss-cn-hangzhou.aliyuncs.com/t/"));
}

#[test]
fn test_url_without_bucket_fails() {
    let root = setup_project();
    oss_publish(root.path())
        .arg("--root")
        .arg(root.path())
        .args(["url", "--region", "r", "--target-directory", "t"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bucket"));
}

#[test]
fn test_publish_missing_config_is_not_fatal() {
    let root = setup_project();
    oss_publish(root.path())
        .arg("--root")
        .arg(root.path())
        .args(["publish", "--region", "r", "--target-directory", "t"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Please configure valid OSS parameters"));

    // nothing was removed
    assert!(root.path().join("src/assets/b.jpg").exists());
}

#[test]
fn test_publish_missing_config_strict_fails() {
    let root = setup_project();
    oss_publish(root.path())
        .arg("--root")
        .arg(root.path())
        .args(["publish", "--strict"])
        .assert()
        .failure();
}

#[test]
fn test_hook_skips_failed_build() {
    let root = setup_project();
    oss_publish(root.path())
        .arg("--root")
        .arg(root.path())
        .args(["hook", "--exit-code", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipping OSS upload"));
}

#[test]
fn test_scan_lists_candidates_and_reasons() {
    let root = setup_project();
    oss_publish(root.path())
        .arg("--root")
        .arg(root.path())
        .args(["scan", "--min-file-size", "100", "--target-directory", "t"])
        .assert()
        .success()
        .stdout(predicate::str::contains("t/b.jpg"))
        .stdout(predicate::str::contains("extension .js excluded"))
        .stdout(predicate::str::contains("smaller than minimum"));

    // a scan never touches files
    assert!(root.path().join("src/assets/b.jpg").exists());
}

#[test]
fn test_scan_missing_directory_fails() {
    let root = tempfile::tempdir().unwrap();
    oss_publish(root.path())
        .arg("--root")
        .arg(root.path())
        .arg("scan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to list"));
}

#[test]
fn test_rules_production_json() {
    let root = setup_project();
    fs::write(
        root.path().join("oss.toml"),
        "bucket = \"b\"\nregion = \"r\"\ntargetDirectory = \"static\"\n",
    )
    .unwrap();

    oss_publish(root.path())
        .arg("--root")
        .arg(root.path())
        .args(["rules", "--mode", "production"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"publicPath\": \"https://b.r.aliyuncs.com/static/\""))
        .stdout(predicate::str::contains("excludeFromBundling"));
}

#[test]
fn test_rules_development_is_null() {
    let root = setup_project();
    oss_publish(root.path())
        .arg("--root")
        .arg(root.path())
        .args(["rules", "--mode", "development"])
        .assert()
        .success()
        .stdout(predicate::str::diff("null\n"));
}

#[test]
fn test_config_show_masks_secret() {
    let root = setup_project();
    oss_publish(root.path())
        .arg("--root")
        .arg(root.path())
        .env("OSS_ACCESS_KEY_SECRET", "supersecretvalue")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("supe****"))
        .stdout(predicate::str::contains("supersecretvalue").not());
}

#[test]
fn test_config_file_layers_under_flags() {
    let root = setup_project();
    fs::write(
        root.path().join("custom.json"),
        r#"{ "bucket": "from-file", "region": "r", "targetDirectory": "t" }"#,
    )
    .unwrap();

    oss_publish(root.path())
        .arg("--root")
        .arg(root.path())
        .arg("--config")
        .arg(root.path().join("custom.json"))
        .args(["url", "--bucket", "from-flag"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://from-flag.r.aliyuncs.com/t/"));
}

#[test]
fn test_config_validate_reports_missing_fields() {
    let root = setup_project();
    oss_publish(root.path())
        .arg("--root")
        .arg(root.path())
        .args(["config", "validate", "--bucket", "b"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("accessKeyId"));
}

#[test]
fn test_hook_with_malformed_config_is_not_fatal() {
    let root = setup_project();
    fs::write(root.path().join("oss.toml"), "minFileSize = \"big\"\n").unwrap();

    oss_publish(root.path())
        .arg("--root")
        .arg(root.path())
        .args(["hook", "--exit-code", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OSS upload aborted"));

    oss_publish(root.path())
        .arg("--root")
        .arg(root.path())
        .args(["hook", "--exit-code", "0", "--strict"])
        .assert()
        .failure();
}

#[test]
fn test_publish_with_missing_config_file_is_not_fatal() {
    let root = setup_project();
    oss_publish(root.path())
        .arg("--root")
        .arg(root.path())
        .arg("--config")
        .arg(root.path().join("nope.toml"))
        .arg("publish")
        .assert()
        .success()
        .stdout(predicate::str::contains("OSS upload aborted"));
}

#[test]
fn test_delete_origin_flag_overrides_config_file() {
    let root = setup_project();
    fs::write(root.path().join("oss.toml"), "deleteOrigin = true\n").unwrap();

    oss_publish(root.path())
        .arg("--root")
        .arg(root.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Delete origin: true"));

    oss_publish(root.path())
        .arg("--root")
        .arg(root.path())
        .args(["--delete-origin=false", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Delete origin: false"));
}
