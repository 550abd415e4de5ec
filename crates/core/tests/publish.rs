//! End-to-end publish runs against an in-memory bucket
//!
//! These tests drive the publisher and plugin hooks over real temporary
//! directories, with uploads recorded (or failed) by a test store.

use async_trait::async_trait;
use oss_publish_core::{
    BuildOutcome, Config, DeleteTiming, Error, ExtensionPolicy, ObjectStore, OssPlugin,
    PartialConfig, Publisher, PutResult, Result, UploadSource,
};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Records every put; fails keys listed in `fail_keys`
#[derive(Default)]
struct MemoryStore {
    puts: Mutex<Vec<(String, String)>>,
    fail_keys: HashSet<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryStore {
    fn failing(keys: &[&str]) -> Self {
        Self {
            fail_keys: keys.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        }
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.puts.lock().unwrap().iter().map(|(k, _)| k.clone()).collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_object(
        &self,
        key: &str,
        source: UploadSource,
        content_type: &str,
    ) -> Result<PutResult> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        // The bytes must be readable at send time, like a real upload.
        match &source {
            UploadSource::File(path) => {
                tokio::fs::read(path).await?;
            }
            UploadSource::Buffered(_) => {}
        }

        self.puts
            .lock()
            .unwrap()
            .push((key.to_string(), content_type.to_string()));

        if self.fail_keys.contains(key) {
            return Err(Error::OssOperation(format!("simulated failure for {}", key)));
        }

        Ok(PutResult {
            key: key.to_string(),
            etag: Some("etag".to_string()),
        })
    }
}

/// Shared buffer the test subscriber writes formatted events into
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn write_file(dir: &Path, name: &str, size: usize) {
    fs::write(dir.join(name), vec![1u8; size]).unwrap();
}

/// Project root with `src/assets` holding the three reference files
fn setup_project() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    let assets = root.path().join("src").join("assets");
    fs::create_dir_all(&assets).unwrap();
    write_file(&assets, "a.png", 50);
    write_file(&assets, "b.jpg", 200);
    write_file(&assets, "c.js", 500);
    root
}

fn reference_options() -> PartialConfig {
    PartialConfig {
        access_key_id: Some("k".to_string()),
        access_key_secret: Some("s".to_string()),
        region: Some("r".to_string()),
        bucket: Some("b".to_string()),
        target_directory: Some("t".to_string()),
        min_file_size: Some(100),
        ..Default::default()
    }
}

fn assets(root: &TempDir) -> std::path::PathBuf {
    root.path().join("src").join("assets")
}

#[tokio::test]
async fn test_reference_scenario_uploads_only_qualifying_file() {
    let root = setup_project();
    let store = MemoryStore::default();
    let config = oss_publish_core::merge(Config::default(), reference_options());

    let report = Publisher::new(root.path(), config)
        .publish_with(&store)
        .await
        .unwrap();

    assert_eq!(store.keys(), vec!["t/b.jpg"]);
    assert_eq!(report.uploaded.len(), 1);
    assert_eq!(report.uploaded[0].key, "t/b.jpg");
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(store.puts.lock().unwrap()[0].1, "image/jpeg");

    // deleteOrigin defaults to false
    assert!(assets(&root).join("a.png").exists());
    assert!(assets(&root).join("b.jpg").exists());
    assert!(assets(&root).join("c.js").exists());
}

#[tokio::test]
async fn test_delete_origin_removes_only_uploaded_file() {
    let root = setup_project();
    let store = MemoryStore::default();
    let mut options = reference_options();
    options.delete_origin = Some(true);

    let report = Publisher::new(root.path(), oss_publish_core::merge(Config::default(), options))
        .publish_with(&store)
        .await
        .unwrap();

    assert!(!assets(&root).join("b.jpg").exists());
    assert!(assets(&root).join("a.png").exists());
    assert!(assets(&root).join("c.js").exists());
    assert_eq!(report.removed_paths(), vec![assets(&root).join("b.jpg").as_path()]);
}

#[tokio::test]
async fn test_missing_bucket_makes_no_calls() {
    let root = tempfile::tempdir().unwrap();
    let dir = assets(&root);
    fs::create_dir_all(&dir).unwrap();
    for name in ["one.png", "two.jpg", "three.gif"] {
        write_file(&dir, name, 10);
    }

    let store = Arc::new(MemoryStore::default());
    let mut options = reference_options();
    options.bucket = None;
    options.min_file_size = None;
    options.delete_origin = Some(true);

    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let report = OssPlugin::new(root.path(), options)
        .with_store(store.clone())
        .on_build_complete(BuildOutcome::Succeeded)
        .await;

    assert!(report.is_none());
    assert!(store.keys().is_empty());
    for name in ["one.png", "two.jpg", "three.gif"] {
        assert!(dir.join(name).exists());
    }

    let output = logs.contents();
    assert_eq!(
        output.matches("Please configure valid OSS parameters").count(),
        1,
        "{}",
        output
    );
    assert!(output.contains("missing: bucket"));
}

#[tokio::test]
async fn test_failure_is_isolated_and_file_kept() {
    let root = tempfile::tempdir().unwrap();
    let dir = assets(&root);
    fs::create_dir_all(&dir).unwrap();
    write_file(&dir, "bad.png", 10);
    write_file(&dir, "good.png", 10);

    let store = MemoryStore::failing(&["t/bad.png"]);
    let mut options = reference_options();
    options.min_file_size = None;
    options.delete_origin = Some(true);

    let report = Publisher::new(root.path(), oss_publish_core::merge(Config::default(), options))
        .publish_with(&store)
        .await
        .unwrap();

    assert_eq!(store.keys(), vec!["t/bad.png", "t/good.png"]);
    assert_eq!(report.uploaded.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert!(!report.is_success());
    assert!(report.failed[0].error.contains("simulated failure"));

    // delete after success only
    assert!(dir.join("bad.png").exists());
    assert!(!dir.join("good.png").exists());
}

#[tokio::test]
async fn test_before_upload_removes_even_on_failure() {
    let root = tempfile::tempdir().unwrap();
    let dir = assets(&root);
    fs::create_dir_all(&dir).unwrap();
    write_file(&dir, "bad.png", 10);
    write_file(&dir, "good.png", 10);
    write_file(&dir, "small.png", 1);

    let store = MemoryStore::failing(&["t/bad.png"]);
    let mut options = reference_options();
    options.min_file_size = Some(5);
    options.delete_timing = Some(DeleteTiming::BeforeUpload);

    let report = Publisher::new(root.path(), oss_publish_core::merge(Config::default(), options))
        .publish_with(&store)
        .await
        .unwrap();

    assert_eq!(report.uploaded.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].removed_local);
    assert!(!dir.join("bad.png").exists());
    assert!(!dir.join("good.png").exists());
    // filtered files are never touched
    assert!(dir.join("small.png").exists());
}

#[tokio::test]
async fn test_allow_list_policy() {
    let root = tempfile::tempdir().unwrap();
    let dir = assets(&root);
    fs::create_dir_all(&dir).unwrap();
    write_file(&dir, "photo.jpeg", 10);
    write_file(&dir, "anim.gif", 10);
    write_file(&dir, "font.woff2", 10);
    write_file(&dir, "icon.svg", 10);

    let store = MemoryStore::default();
    let mut options = reference_options();
    options.min_file_size = None;
    options.extension_policy = Some(ExtensionPolicy::AllowList);

    Publisher::new(root.path(), oss_publish_core::merge(Config::default(), options))
        .publish_with(&store)
        .await
        .unwrap();

    assert_eq!(store.keys(), vec!["t/anim.gif", "t/photo.jpeg"]);
}

#[tokio::test]
async fn test_uploads_run_concurrently_within_cap() {
    let root = tempfile::tempdir().unwrap();
    let dir = assets(&root);
    fs::create_dir_all(&dir).unwrap();
    for i in 0..12 {
        write_file(&dir, &format!("img{:02}.png", i), 10);
    }

    let store = MemoryStore {
        delay: Some(Duration::from_millis(20)),
        ..Default::default()
    };
    let mut options = reference_options();
    options.min_file_size = None;
    options.max_concurrent_uploads = Some(4);

    let report = Publisher::new(root.path(), oss_publish_core::merge(Config::default(), options))
        .publish_with(&store)
        .await
        .unwrap();

    assert_eq!(report.uploaded.len(), 12);
    assert_eq!(store.keys().len(), 12);
    assert_eq!(store.in_flight.load(Ordering::SeqCst), 0);

    let peak = store.peak_in_flight.load(Ordering::SeqCst);
    assert!(peak > 1 && peak <= 4, "peak in-flight uploads was {}", peak);
}

#[tokio::test]
async fn test_upload_url_encodes_file_name() {
    let root = tempfile::tempdir().unwrap();
    let dir = assets(&root);
    fs::create_dir_all(&dir).unwrap();
    write_file(&dir, "hero banner.png", 10);

    let store = MemoryStore::default();
    let mut options = reference_options();
    options.min_file_size = None;

    let report = Publisher::new(root.path(), oss_publish_core::merge(Config::default(), options))
        .publish_with(&store)
        .await
        .unwrap();

    assert_eq!(store.keys(), vec!["t/hero banner.png"]);
    assert_eq!(report.uploaded[0].url, "https://b.r.aliyuncs.com/t/hero%20banner.png");
}

#[tokio::test]
async fn test_multiple_source_directories_flatten_keys() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir_all(root.path().join("img")).unwrap();
    fs::create_dir_all(root.path().join("public")).unwrap();
    write_file(&root.path().join("img"), "x.png", 10);
    write_file(&root.path().join("public"), "y.png", 10);

    let store = MemoryStore::default();
    let mut options = reference_options();
    options.min_file_size = None;
    options.source_directory_list = Some(vec!["img".to_string(), "public".to_string()]);

    Publisher::new(root.path(), oss_publish_core::merge(Config::default(), options))
        .publish_with(&store)
        .await
        .unwrap();

    assert_eq!(store.keys(), vec!["t/x.png", "t/y.png"]);
}

#[tokio::test]
async fn test_hooks_publish_after_successful_build() {
    let root = setup_project();
    let store = Arc::new(MemoryStore::default());

    let hooks = OssPlugin::new(root.path(), reference_options())
        .with_store(store.clone())
        .into_hooks();
    let on_complete = hooks.on_build_complete.as_ref().unwrap();

    assert!(on_complete(BuildOutcome::Failed("tsc failed".to_string()))
        .await
        .is_none());
    assert!(store.keys().is_empty());

    let report = on_complete(BuildOutcome::Succeeded).await.unwrap();
    assert_eq!(report.uploaded.len(), 1);
    assert_eq!(store.keys(), vec!["t/b.jpg"]);
}
