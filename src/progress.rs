//! Progress Record & aggregation.
//!
//! Not persisted; purely for reporting. A small stats struct behind a mutex,
//! refreshed on demand rather than streamed.

use std::time::Instant;

use parking_lot::Mutex;
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct PartProgress {
    pub part_num: u32,
    pub frames_done: u64,
    pub part_length: u64,
}

impl PartProgress {
    pub fn percent(&self) -> f64 {
        if self.part_length == 0 {
            100.0
        } else {
            (self.frames_done as f64 / self.part_length as f64) * 100.0
        }
    }
}

/// Aggregates per-part progress and reports instantaneous FPS, emitting a
/// report every `report_every` frames of total progress (N = ceil(fps)).
pub struct ProgressAggregator {
    started_at: Instant,
    parts: Mutex<Vec<PartProgress>>,
    report_every: u64,
    total_frames_reported: Mutex<u64>,
}

impl ProgressAggregator {
    pub fn new(part_lengths: &[u64], fps: u32) -> Self {
        let parts = part_lengths
            .iter()
            .enumerate()
            .map(|(i, &len)| PartProgress {
                part_num: i as u32,
                frames_done: 0,
                part_length: len,
            })
            .collect();

        Self {
            started_at: Instant::now(),
            parts: Mutex::new(parts),
            report_every: (fps as u64).max(1),
            total_frames_reported: Mutex::new(0),
        }
    }

    /// Record that `part_num` completed one more frame; logs an aggregated
    /// report whenever total progress crosses a `report_every` boundary.
    pub fn record_frame(&self, part_num: u32) {
        let mut total = self.total_frames_reported.lock();
        {
            let mut parts = self.parts.lock();
            if let Some(p) = parts.iter_mut().find(|p| p.part_num == part_num) {
                p.frames_done += 1;
            }
        }
        *total += 1;

        if *total % self.report_every == 0 {
            self.log_report(*total);
        }
    }

    fn log_report(&self, total_frames: u64) {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        let fps = if elapsed > 0.0 {
            total_frames as f64 / elapsed
        } else {
            0.0
        };
        let parts = self.parts.lock();
        let per_part: Vec<String> = parts
            .iter()
            .map(|p| format!("part {}={:.0}%", p.part_num, p.percent()))
            .collect();
        info!(
            total_frames,
            fps = format!("{fps:.2}"),
            "render progress: {}",
            per_part.join(", ")
        );
    }

    pub fn snapshot(&self) -> Vec<PartProgress> {
        self.parts.lock().clone()
    }
}
