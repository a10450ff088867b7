//! CLI argument surface — ambient entry point, not part of the render
//! engine itself. Built with `clap`'s derive macro.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{CaptureMethod, ImageFormat, RunConfig};

#[derive(Parser, Debug)]
#[command(name = "reelcore-render", about = "Render a scene to video via a headless browser")]
pub struct Cli {
    /// Path to the bundled scene's entry HTML file.
    #[arg(long)]
    pub scene_entry: PathBuf,

    /// Directory for per-part artifacts and the final output.
    #[arg(long)]
    pub temp_dir: PathBuf,

    /// Where to write the final output; a sensible default is derived when omitted.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = 0)]
    pub start_frame: u64,

    #[arg(long)]
    pub duration_frames: u64,

    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    #[arg(long, default_value_t = 1920)]
    pub width: u32,
    #[arg(long, default_value_t = 1080)]
    pub height: u32,

    #[arg(long, default_value_t = 1)]
    pub concurrency: u32,

    #[arg(long, value_enum, default_value = "screenshot")]
    pub capture_method: CaptureMethod,

    #[arg(long, value_enum, default_value = "png")]
    pub image_format: ImageFormat,

    #[arg(long, default_value_t = 80)]
    pub jpeg_quality: u8,

    #[arg(long)]
    pub raw_output: bool,

    #[arg(long)]
    pub disable_frame_count_check: bool,

    #[arg(long)]
    pub enable_hash_check: bool,

    #[arg(long)]
    pub headless_off: bool,

    /// Directory of the pre-packed extension, required when
    /// `capture_method = extension`.
    #[arg(long)]
    pub extension_dir: Option<PathBuf>,

    #[arg(long, default_value = "ffmpeg")]
    pub encoder_path: PathBuf,
    #[arg(long, default_value = "ffprobe")]
    pub probe_path: PathBuf,

    /// Arbitrary JSON handed to the scene as `userData`.
    #[arg(long)]
    pub user_data: Option<String>,
}

impl Cli {
    pub fn into_run_config(self) -> anyhow::Result<RunConfig> {
        let user_data = match self.user_data {
            Some(raw) => serde_json::from_str(&raw)?,
            None => serde_json::Value::Null,
        };

        Ok(RunConfig {
            start_frame: self.start_frame,
            duration_frames: self.duration_frames,
            fps: self.fps,
            width: self.width,
            height: self.height,
            concurrency: self.concurrency,
            capture_method: self.capture_method,
            image_format: self.image_format,
            jpeg_quality: self.jpeg_quality,
            frame_render_timeout: std::time::Duration::from_secs(30),
            settle_delay: std::time::Duration::from_millis(250),
            raw_output: self.raw_output,
            fail_on_page_errors: true,
            enable_frame_count_check: !self.disable_frame_count_check,
            enable_hash_check: self.enable_hash_check,
            user_data,
            scene_entry_path: self.scene_entry,
            temp_dir: self.temp_dir,
            output_path: self.output,
            encoder_path: self.encoder_path,
            probe_path: self.probe_path,
            headless: !self.headless_off,
            extension_dir: self.extension_dir,
        })
    }
}
