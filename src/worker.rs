//! Part Worker.
//!
//! Owns one page, one encoder subprocess, and one part's frame range.
//! `run` drives them to completion or to the first fatal error, killing its
//! own encoder on the way out either way so a failed worker never leaves an
//! orphaned subprocess for the Orchestrator to clean up later.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::RunConfig;
use crate::encoder_sink::EncoderSink;
use crate::hash_map::FrameHashMap;
use crate::page_driver::PageDriver;
use crate::part::Part;
use crate::progress::ProgressAggregator;
use crate::scene::{PageInit, ScenePage};

pub struct PartWorker<P: ScenePage> {
    part: Part,
    driver: PageDriver<P>,
    cfg: Arc<RunConfig>,
    cancel: CancellationToken,
}

impl<P: ScenePage> PartWorker<P> {
    pub fn new(
        part: Part,
        page: P,
        cfg: Arc<RunConfig>,
        hash_map: Arc<FrameHashMap>,
        progress: Arc<ProgressAggregator>,
        cancel: CancellationToken,
    ) -> Self {
        let driver = PageDriver::new(page, cfg.clone(), hash_map, progress, cancel.clone());
        Self {
            part,
            driver,
            cfg,
            cancel,
        }
    }

    /// Runs this worker's full lifecycle: init the page, spawn the encoder,
    /// render every frame in range, and finish the encoder — or kill it and
    /// propagate the first error encountered.
    pub async fn run(self, render_id: u64, secret: String, server_port: u16) -> anyhow::Result<std::path::PathBuf> {
        let part_num = self.part.part_num;
        let artifact_path = self.part.artifact_path(&self.cfg.temp_dir);

        let init = PageInit {
            width: self.cfg.width,
            height: self.cfg.height,
            fps: self.cfg.fps,
            server_port,
            duration_frames: self.cfg.duration_frames,
            render_id,
            user_data: self.cfg.user_data.clone(),
            video_component_type: "default".to_string(),
            image_format: self.cfg.image_format,
            jpeg_quality: self.cfg.jpeg_quality,
            secret,
            dev_mode: false,
        };

        self.driver.initialize(&init).await?;

        let image_format_flag = match self.cfg.image_format {
            crate::config::ImageFormat::Jpeg => "image2pipe",
            crate::config::ImageFormat::Png => "image2pipe",
        };

        let encoder = EncoderSink::open(
            part_num,
            &self.cfg.encoder_path,
            self.cfg.fps,
            self.cfg.width,
            self.cfg.height,
            image_format_flag,
            &artifact_path,
        )
        .await?;

        let render_result = self
            .driver
            .run_part(part_num, self.part.start, self.part.end, &encoder)
            .await;

        match render_result {
            Ok(()) => match encoder.finish().await {
                Ok(()) => {
                    info!(part_num, frames = self.part.len(), "part completed");
                    Ok(artifact_path)
                }
                Err(err) => {
                    error!(part_num, error = %err, "encoder failed to finish cleanly");
                    Err(err)
                }
            },
            Err(err) => {
                error!(part_num, error = %err, "part failed, killing encoder");
                encoder.kill();
                self.cancel.cancel();
                Err(err)
            }
        }
    }
}
