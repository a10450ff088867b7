//! Partitioner.
//!
//! Splits a frame range into `concurrency` contiguous, non-overlapping parts
//! with the remainder absorbed by the last part.

use std::path::{Path, PathBuf};

/// A half-open frame interval `[start, end)` assigned to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Part {
    pub part_num: u32,
    pub start: u64,
    pub end: u64,
}

impl Part {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Deterministic per-part artifact filename. Always named `.mkv`
    /// regardless of `imageFormat` — the per-part container is independent
    /// of the per-frame image codec.
    pub fn artifact_path(&self, temp_dir: &Path) -> PathBuf {
        temp_dir.join(format!(
            "part {}-{}-{}.mkv",
            self.part_num, self.start, self.end
        ))
    }
}

/// `partition(startFrame, durationFrames, concurrency) -> ordered parts`.
///
/// `concurrency` must already be clamped to `durationFrames` by the caller
/// (see `RunConfig::effective_concurrency`); this function panics if handed
/// `concurrency` > `duration_frames` since that violates its documented
/// precondition: exactly `concurrency` parts, unless `concurrency >
/// duration_frames`, in which case the caller clamps beforehand.
pub fn partition(start_frame: u64, duration_frames: u64, concurrency: u32) -> Vec<Part> {
    assert!(concurrency >= 1, "concurrency must be >= 1");
    assert!(duration_frames >= 1, "duration_frames must be >= 1");
    assert!(
        concurrency as u64 <= duration_frames,
        "concurrency must be clamped to duration_frames by the caller"
    );

    let concurrency = concurrency as u64;
    let base = duration_frames / concurrency;
    let remainder = duration_frames % concurrency;

    let mut parts = Vec::with_capacity(concurrency as usize);
    let mut cursor = 0u64;
    for part_num in 0..concurrency {
        let mut len = base;
        if part_num == concurrency - 1 {
            len += remainder;
        }
        let start = start_frame + cursor;
        let end = start + len;
        parts.push(Part {
            part_num: part_num as u32,
            start,
            end,
        });
        cursor += len;
    }
    parts
}
