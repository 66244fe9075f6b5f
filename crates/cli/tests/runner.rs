//! Watch mode through the library API

use image::{ImageFormat, Rgb, RgbImage};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use thumbgen_cli::Runner;
use thumbgen_core::Config;
use tokio::sync::oneshot;

async fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {}", what);
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watch_reconciles_derives_and_shuts_down() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.root = temp_dir.path().to_path_buf();
    config.watch.debounce_ms = 100;

    let runner = Runner::open(config).unwrap();
    let root = runner.engine().store().root().to_path_buf();

    // Left over from a previous run
    fs::write(root.join("320x200/ghost.jpg"), b"orphan").unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(runner.watch(async move {
        let _ = stop_rx.await;
    }));

    wait_for("startup reconciliation", || !root.join("320x200/ghost.jpg").exists()).await;

    RgbImage::from_pixel(1600, 1200, Rgb([0, 0, 0]))
        .save_with_format(root.join("scan.png"), ImageFormat::Png)
        .unwrap();

    let artifact = root.join("800x600/scan.jpg");
    wait_for("derivation", || artifact.exists()).await;
    assert_eq!(image::image_dimensions(&artifact).unwrap(), (800, 600));

    fs::remove_file(root.join("scan.png")).unwrap();
    wait_for("eviction", || !artifact.exists() && !root.join("320x200/scan.jpg").exists()).await;

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("runner did not shut down")
        .unwrap()
        .unwrap();
}
