//! End-to-end exercise of the render pipeline without a real browser or
//! `ffmpeg`: a [`reelcore::testing::FakePage`] stands in for the Scene
//! Page, and a tiny stub script stands in for the encoder subprocess.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use reelcore::config::{CaptureMethod, ImageFormat, RunConfig};
use reelcore::hash_map::FrameHashMap;
use reelcore::part::{self, Part};
use reelcore::progress::ProgressAggregator;
use reelcore::testing::FakePage;
use reelcore::worker::PartWorker;

/// Writes an executable shell script that drains stdin and exits 0,
/// standing in for a real encoder binary. Mirrors what `cfg.encoder_path`
/// would point at in a real run.
fn stub_encoder(dir: &std::path::Path) -> PathBuf {
    let path = dir.join("stub-encoder.sh");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh").unwrap();
    writeln!(file, "cat > /dev/null").unwrap();
    writeln!(file, "exit 0").unwrap();
    drop(file);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn test_cfg(temp_dir: PathBuf, encoder: PathBuf) -> RunConfig {
    RunConfig {
        start_frame: 0,
        duration_frames: 6,
        fps: 30,
        width: 320,
        height: 240,
        concurrency: 2,
        capture_method: CaptureMethod::Screenshot,
        image_format: ImageFormat::Png,
        jpeg_quality: 80,
        frame_render_timeout: Duration::from_secs(5),
        settle_delay: Duration::from_millis(1),
        raw_output: false,
        fail_on_page_errors: true,
        enable_frame_count_check: true,
        enable_hash_check: true,
        user_data: serde_json::Value::Null,
        scene_entry_path: PathBuf::from("/tmp/scene/index.html"),
        temp_dir,
        output_path: None,
        encoder_path: encoder,
        probe_path: PathBuf::from("true"),
        headless: true,
        extension_dir: None,
    }
}

#[tokio::test]
async fn single_part_covers_whole_range() {
    let tmp = tempfile::tempdir().unwrap();
    let encoder = stub_encoder(tmp.path());
    let cfg = Arc::new(test_cfg(tmp.path().to_path_buf(), encoder));

    let parts = part::partition(cfg.start_frame, cfg.duration_frames, cfg.effective_concurrency());
    assert_eq!(parts.len(), 2);

    let hash_map = Arc::new(FrameHashMap::new());
    let part_lengths: Vec<u64> = parts.iter().map(Part::len).collect();
    let progress = Arc::new(ProgressAggregator::new(&part_lengths, cfg.fps));
    let cancel = CancellationToken::new();

    let mut handles = Vec::new();
    for part in &parts {
        let page = FakePage::new();
        let worker = PartWorker::new(
            *part,
            page,
            cfg.clone(),
            hash_map.clone(),
            progress.clone(),
            cancel.clone(),
        );
        handles.push(tokio::spawn(worker.run(part.start, "test-secret".to_string(), 0)));
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.is_ok(), "worker failed: {:?}", result.err());
    }

    let snap = progress.snapshot();
    let total: u64 = snap.iter().map(|p| p.frames_done).sum();
    assert_eq!(total, cfg.duration_frames);
    assert!(hash_map.first_duplicate_pair().is_none());
}

#[tokio::test]
async fn duplicate_frames_are_recorded_in_hash_map() {
    let tmp = tempfile::tempdir().unwrap();
    let encoder = stub_encoder(tmp.path());
    let cfg = Arc::new(test_cfg(tmp.path().to_path_buf(), encoder));

    let parts = part::partition(0, cfg.duration_frames, 1);
    let hash_map = Arc::new(FrameHashMap::new());
    let progress = Arc::new(ProgressAggregator::new(&[cfg.duration_frames], cfg.fps));
    let cancel = CancellationToken::new();

    let page = FakePage::new().duplicate_frames(2, 3);
    let worker = PartWorker::new(parts[0], page, cfg.clone(), hash_map.clone(), progress, cancel);
    let result = worker.run(0, "test-secret".to_string(), 0).await;
    assert!(result.is_ok());

    assert_eq!(hash_map.first_duplicate_pair(), Some((2, 3)));
}

#[tokio::test]
async fn page_error_aborts_the_part() {
    let tmp = tempfile::tempdir().unwrap();
    let encoder = stub_encoder(tmp.path());
    let cfg = Arc::new(test_cfg(tmp.path().to_path_buf(), encoder));

    let parts = part::partition(0, cfg.duration_frames, 1);
    let hash_map = Arc::new(FrameHashMap::new());
    let progress = Arc::new(ProgressAggregator::new(&[cfg.duration_frames], cfg.fps));
    let cancel = CancellationToken::new();

    let page = FakePage::new().fail_on_frame(2);
    let worker = PartWorker::new(parts[0], page, cfg.clone(), hash_map.clone(), progress, cancel);
    let result = worker.run(0, "test-secret".to_string(), 0).await;
    assert!(result.is_err());
}

/// Scenario 5 from the rendering engine's seed tests: a fast-failing part
/// must trip every sibling's cancellation promptly, not merely after those
/// siblings have already run to completion on their own. Part 0 fails on
/// its second frame almost immediately; part 1 is artificially slow (each
/// frame sleeps) and has far more frames than could plausibly finish before
/// the test's deadline, so the assertion only holds if cancellation is
/// actually observed between part 1's frames rather than ignored.
#[tokio::test]
async fn fail_fast_abort_cancels_slow_sibling_promptly() {
    let started = std::time::Instant::now();
    let tmp = tempfile::tempdir().unwrap();
    let encoder = stub_encoder(tmp.path());

    let mut cfg = test_cfg(tmp.path().to_path_buf(), encoder);
    cfg.duration_frames = 1000;
    cfg.concurrency = 2;
    let cfg = Arc::new(cfg);

    let parts = part::partition(0, cfg.duration_frames, cfg.effective_concurrency());
    assert_eq!(parts.len(), 2);

    let hash_map = Arc::new(FrameHashMap::new());
    let part_lengths: Vec<u64> = parts.iter().map(Part::len).collect();
    let progress = Arc::new(ProgressAggregator::new(&part_lengths, cfg.fps));
    let cancel = CancellationToken::new();

    // Part 0: fails quickly on frame index 1.
    let fast_failing_page = FakePage::new().fail_on_frame(parts[0].start + 1);
    let worker0 = PartWorker::new(
        parts[0],
        fast_failing_page,
        cfg.clone(),
        hash_map.clone(),
        progress.clone(),
        cancel.clone(),
    );

    // Part 1: hundreds of frames, each taking 20ms — minutes of total work
    // if it were allowed to run to completion uncancelled.
    let slow_page = FakePage::new().slow(Duration::from_millis(20));
    let worker1 = PartWorker::new(
        parts[1],
        slow_page,
        cfg.clone(),
        hash_map.clone(),
        progress.clone(),
        cancel.clone(),
    );

    let handle0 = tokio::spawn(worker0.run(parts[0].start, "test-secret".to_string(), 0));
    let handle1 = tokio::spawn(worker1.run(parts[1].start, "test-secret".to_string(), 0));

    // Mirrors the Orchestrator's drain-as-they-settle loop: the first
    // failure observed must cancel the shared token immediately.
    use futures::stream::FuturesUnordered;
    use futures::StreamExt;
    let mut in_flight: FuturesUnordered<_> = vec![handle0, handle1].into_iter().collect();
    let mut first_error = None;
    while let Some(result) = in_flight.next().await {
        if let Ok(Err(err)) = result {
            if first_error.is_none() {
                first_error = Some(err);
                cancel.cancel();
            }
        }
    }

    assert!(first_error.is_some(), "part 0 should have failed");

    let elapsed = started.elapsed();
    assert!(
        elapsed < Duration::from_secs(5),
        "slow sibling should have been cancelled long before finishing all 1000 frames \
         (20ms/frame would take ~20s uncancelled); took {elapsed:?}"
    );
}
