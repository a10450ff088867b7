//! Run Configuration — immutable for the duration of a run.
//!
//! Field names and defaults follow a kebab-case serde convention with a
//! `default = "..."` helper for every optional knob, even though nothing in
//! this crate loads it from a file — the shape is what the CLI
//! (`src/main.rs`) and any future embedding application populate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which Frame Capturer strategy drives a run. Fixed for the whole run —
/// a tagged variant selected once, not a trait object dispatched per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMethod {
    Screencast,
    Extension,
    Screenshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunConfig {
    pub start_frame: u64,
    pub duration_frames: u64,
    pub fps: u32,

    pub width: u32,
    pub height: u32,

    pub concurrency: u32,

    pub capture_method: CaptureMethod,

    pub image_format: ImageFormat,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    #[serde(default = "default_frame_render_timeout")]
    pub frame_render_timeout: Duration,

    #[serde(default = "default_settle_delay")]
    pub settle_delay: Duration,

    #[serde(default)]
    pub raw_output: bool,

    #[serde(default = "default_true")]
    pub fail_on_page_errors: bool,
    #[serde(default = "default_true")]
    pub enable_frame_count_check: bool,
    #[serde(default)]
    pub enable_hash_check: bool,

    #[serde(default)]
    pub user_data: serde_json::Value,

    pub scene_entry_path: PathBuf,

    pub temp_dir: PathBuf,
    pub output_path: Option<PathBuf>,

    #[serde(default = "default_encoder_path")]
    pub encoder_path: PathBuf,
    #[serde(default = "default_probe_path")]
    pub probe_path: PathBuf,

    /// Whether the browser (and `extension` capture) must run headless.
    /// `extension` + headless is rejected at validation time.
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Directory of the pre-packed extension loaded at browser startup when
    /// `capture_method = extension`. Unused by the other two capture
    /// strategies.
    #[serde(default)]
    pub extension_dir: Option<PathBuf>,
}

fn default_jpeg_quality() -> u8 {
    80
}
fn default_frame_render_timeout() -> Duration {
    Duration::from_secs(30)
}
fn default_settle_delay() -> Duration {
    Duration::from_millis(250)
}
fn default_true() -> bool {
    true
}
fn default_encoder_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}
fn default_probe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

impl RunConfig {
    /// Validate invariants that must be caught *before* any external
    /// resource (browser, temp dir, subprocess) is allocated.
    pub fn validate(&self) -> anyhow::Result<()> {
        use anyhow::ensure;

        ensure!(self.duration_frames >= 1, "duration_frames must be >= 1");
        ensure!(self.fps >= 1, "fps must be >= 1");
        ensure!(self.width > 0 && self.height > 0, "width/height must be positive");
        ensure!(self.concurrency >= 1, "concurrency must be >= 1");
        if self.image_format == ImageFormat::Jpeg {
            ensure!(
                (1..=100).contains(&self.jpeg_quality),
                "jpeg_quality must be in [1,100]"
            );
        }
        ensure!(
            !(self.capture_method == CaptureMethod::Extension && self.headless),
            "capture_method=extension is incompatible with headless mode"
        );
        if self.capture_method == CaptureMethod::Extension {
            ensure!(
                self.extension_dir.is_some(),
                "capture_method=extension requires extension_dir to be set"
            );
        }
        Ok(())
    }

    /// Concurrency clamped to `durationFrames`.
    pub fn effective_concurrency(&self) -> u32 {
        self.concurrency.min(self.duration_frames.max(1) as u32)
    }

    /// Default output path/extension when none is supplied.
    pub fn default_output_path(&self) -> PathBuf {
        let single_frame = self.duration_frames == 1;
        let ext = if single_frame {
            self.image_format.extension()
        } else if self.raw_output {
            match self.image_format {
                ImageFormat::Jpeg => "mov",
                ImageFormat::Png => "mkv",
            }
        } else {
            "mp4"
        };
        self.temp_dir.join(format!("output.{ext}"))
    }

    pub fn resolved_output_path(&self) -> PathBuf {
        self.output_path
            .clone()
            .unwrap_or_else(|| self.default_output_path())
    }

    /// Directory the Media Service serves statically — the bundled scene's
    /// containing directory.
    pub fn scene_dir(&self) -> PathBuf {
        self.scene_entry_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> RunConfig {
        RunConfig {
            start_frame: 0,
            duration_frames: 10,
            fps: 30,
            width: 1920,
            height: 1080,
            concurrency: 4,
            capture_method: CaptureMethod::Screenshot,
            image_format: ImageFormat::Png,
            jpeg_quality: 80,
            frame_render_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_millis(250),
            raw_output: false,
            fail_on_page_errors: true,
            enable_frame_count_check: true,
            enable_hash_check: false,
            user_data: serde_json::Value::Null,
            scene_entry_path: PathBuf::from("/tmp/dist/index.html"),
            temp_dir: PathBuf::from("/tmp/reelcore-test"),
            output_path: None,
            encoder_path: PathBuf::from("ffmpeg"),
            probe_path: PathBuf::from("ffprobe"),
            headless: true,
            extension_dir: None,
        }
    }

    #[test]
    fn rejects_extension_plus_headless() {
        let mut cfg = base_config();
        cfg.capture_method = CaptureMethod::Extension;
        cfg.headless = true;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_extension_without_extension_dir() {
        let mut cfg = base_config();
        cfg.capture_method = CaptureMethod::Extension;
        cfg.headless = false;
        cfg.extension_dir = None;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn accepts_extension_with_extension_dir_and_non_headless() {
        let mut cfg = base_config();
        cfg.capture_method = CaptureMethod::Extension;
        cfg.headless = false;
        cfg.extension_dir = Some(PathBuf::from("/tmp/ext"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_bad_jpeg_quality() {
        let mut cfg = base_config();
        cfg.image_format = ImageFormat::Jpeg;
        cfg.jpeg_quality = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn clamps_concurrency_to_duration() {
        let mut cfg = base_config();
        cfg.duration_frames = 2;
        cfg.concurrency = 8;
        assert_eq!(cfg.effective_concurrency(), 2);
    }

    #[test]
    fn default_output_extension_for_single_frame() {
        let mut cfg = base_config();
        cfg.duration_frames = 1;
        cfg.image_format = ImageFormat::Jpeg;
        assert_eq!(cfg.default_output_path().extension().unwrap(), "jpg");
    }

    #[test]
    fn default_output_extension_for_raw_multiframe() {
        let mut cfg = base_config();
        cfg.raw_output = true;
        cfg.image_format = ImageFormat::Png;
        assert_eq!(cfg.default_output_path().extension().unwrap(), "mkv");
    }

    #[test]
    fn default_output_extension_for_transcoded_multiframe() {
        let cfg = base_config();
        assert_eq!(cfg.default_output_path().extension().unwrap(), "mp4");
    }
}
