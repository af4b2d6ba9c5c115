//! Directory watcher against a real temp directory.

use std::fs;
use std::path::Path;
use std::time::Duration;

use clausewatch::config::Config;
use clausewatch::pipeline::Pipeline;
use clausewatch::watcher::DirectoryWatcher;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const SLA: &str = "SERVICE LEVEL AGREEMENT. Provider guarantees 99.9% uptime. \
    Customer may terminate if uptime falls below target for three consecutive months.";

async fn wait_for(path: &Path) -> bool {
    for _ in 0..150 {
        if path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

fn config_in(tmp: &TempDir) -> Config {
    let mut config = Config::test_default(tmp.path());
    config.watcher.settle_ms = 100;
    config
}

#[tokio::test]
async fn test_new_upload_is_analysed() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(&tmp);
    let pipeline = Pipeline::from_config(&config).unwrap();
    let watcher = DirectoryWatcher::new(pipeline, &config.watcher);

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(watcher.run(shutdown.clone()));
    // Let the watch register before writing.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let uploads = &config.watcher.uploads_dir;
    // Write under a hidden name, then rename into place like a browser upload.
    fs::write(uploads.join(".sla.txt.part"), SLA).unwrap();
    fs::write(uploads.join("ignored.xlsx"), "x").unwrap();
    fs::rename(uploads.join(".sla.txt.part"), uploads.join("sla.txt")).unwrap();

    let output = config.analysis.output_dir.join("sla.txt.json");
    assert!(wait_for(&output).await, "analysis was not written");
    // The record is renamed into place just before the watcher books it.
    tokio::time::sleep(Duration::from_millis(500)).await;

    shutdown.cancel();
    let stats = handle.await.unwrap().unwrap();
    assert_eq!(stats.analyzed, 1);
    assert_eq!(stats.failed, 0);
    assert!(!config.analysis.output_dir.join("ignored.xlsx.json").exists());
    assert!(!config.analysis.output_dir.join(".sla.txt.part.json").exists());
}

#[tokio::test]
async fn test_bad_upload_does_not_stop_watcher() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(&tmp);
    let pipeline = Pipeline::from_config(&config).unwrap();
    let watcher = DirectoryWatcher::new(pipeline, &config.watcher);

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(watcher.run(shutdown.clone()));
    tokio::time::sleep(Duration::from_millis(300)).await;

    let uploads = &config.watcher.uploads_dir;
    fs::write(uploads.join(".empty.part"), "   ").unwrap();
    fs::rename(uploads.join(".empty.part"), uploads.join("empty.txt")).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    fs::write(uploads.join(".sla.part"), SLA).unwrap();
    fs::rename(uploads.join(".sla.part"), uploads.join("sla.txt")).unwrap();

    assert!(wait_for(&config.analysis.output_dir.join("sla.txt.json")).await);
    shutdown.cancel();
    let stats = handle.await.unwrap().unwrap();
    assert!(stats.failed >= 1);
    assert!(!config.analysis.output_dir.join("empty.txt.json").exists());
}

#[tokio::test]
async fn test_scan_existing_queues_present_files() {
    let tmp = TempDir::new().unwrap();
    let mut config = config_in(&tmp);
    config.watcher.scan_existing = true;
    fs::create_dir_all(&config.watcher.uploads_dir).unwrap();
    fs::write(config.watcher.uploads_dir.join("old.txt"), SLA).unwrap();

    let pipeline = Pipeline::from_config(&config).unwrap();
    let watcher = DirectoryWatcher::new(pipeline, &config.watcher);
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(watcher.run(shutdown.clone()));

    assert!(wait_for(&config.analysis.output_dir.join("old.txt.json")).await);
    tokio::time::sleep(Duration::from_millis(500)).await;
    shutdown.cancel();
    assert_eq!(handle.await.unwrap().unwrap().analyzed, 1);
}

#[tokio::test]
async fn test_cancel_stops_idle_watcher() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(&tmp);
    let pipeline = Pipeline::from_config(&config).unwrap();
    let watcher = DirectoryWatcher::new(pipeline, &config.watcher);

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(watcher.run(shutdown.clone()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.cancel();

    let stats = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("watcher did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(stats.analyzed + stats.unchanged + stats.failed, 0);
    assert!(config.watcher.uploads_dir.is_dir());
}
