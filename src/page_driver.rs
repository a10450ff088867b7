//! Page Driver.
//!
//! Drives one [`ScenePage`] through the full per-frame readiness ladder:
//! render(N) -> fonts ready -> frame marker present -> settled -> network
//! idle -> capture -> hash -> encode -> progress event. Each frame is
//! wrapped in `frameRenderTimeout`; cancellation is checked between frames
//! so a fail-fast abort from the Orchestrator takes effect promptly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RunConfig;
use crate::encoder_sink::EncoderSink;
use crate::error::RenderError;
use crate::hash_map::FrameHashMap;
use crate::progress::ProgressAggregator;
use crate::scene::{PageInit, ScenePage};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct PageDriver<P: ScenePage> {
    page: P,
    cfg: Arc<RunConfig>,
    hash_map: Arc<FrameHashMap>,
    progress: Arc<ProgressAggregator>,
    cancel: CancellationToken,
}

impl<P: ScenePage> PageDriver<P> {
    pub fn new(
        page: P,
        cfg: Arc<RunConfig>,
        hash_map: Arc<FrameHashMap>,
        progress: Arc<ProgressAggregator>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            page,
            cfg,
            hash_map,
            progress,
            cancel,
        }
    }

    pub async fn initialize(&self, init: &PageInit) -> anyhow::Result<()> {
        self.page.initialize(init).await
    }

    /// Renders, captures, and writes every frame in `[start, end)` to
    /// `encoder`, reporting to `progress` under `part_num`. Returns as soon
    /// as a fatal error occurs or cancellation is observed between frames.
    pub async fn run_part(
        &self,
        part_num: u32,
        start: u64,
        end: u64,
        encoder: &EncoderSink,
    ) -> anyhow::Result<()> {
        for frame_index in start..end {
            if self.cancel.is_cancelled() {
                debug!(part_num, frame_index, "part driver observed cancellation");
                anyhow::bail!("part {part_num} cancelled before frame {frame_index}");
            }

            // The whole per-frame sequence — render, readiness ladder,
            // capture, and the encoder write — sits inside one timeout
            // envelope, so a wedged encoder-stdin write fails the frame
            // exactly like a wedged page would.
            let frame_result = timeout(
                self.cfg.frame_render_timeout,
                self.render_and_encode_one_frame(part_num, frame_index, encoder),
            )
            .await;

            match frame_result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    return Err(RenderError::FrameTimeout {
                        part_num,
                        frame_index,
                        elapsed_ms: self.cfg.frame_render_timeout.as_millis(),
                    }
                    .into())
                }
            }

            self.progress.record_frame(part_num);
        }
        Ok(())
    }

    /// Renders, captures, hashes (if enabled), and writes one frame to
    /// `encoder`. This is the full body of one iteration of `run_part`'s
    /// loop, factored out so it can sit inside a single timeout alongside
    /// `render_one_frame` rather than leaving the encoder write unguarded.
    async fn render_and_encode_one_frame(
        &self,
        part_num: u32,
        frame_index: u64,
        encoder: &EncoderSink,
    ) -> anyhow::Result<()> {
        let bytes = self.render_one_frame(part_num, frame_index).await?;

        if self.cfg.enable_hash_check {
            self.hash_map.insert(frame_index, &bytes);
        }

        encoder.write_frame(&bytes).await
    }

    async fn render_one_frame(&self, part_num: u32, frame_index: u64) -> anyhow::Result<Vec<u8>> {
        let errors = self.page.render_frame(frame_index).await.map_err(|source| {
            RenderError::SceneRender {
                part_num,
                frame_index,
                count: 0,
                messages: source.to_string(),
            }
        })?;

        if !errors.is_empty() && self.cfg.fail_on_page_errors {
            let messages = errors
                .iter()
                .map(|e| e.message.clone())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RenderError::SceneRender {
                part_num,
                frame_index,
                count: errors.len(),
                messages,
            }
            .into());
        } else if !errors.is_empty() {
            warn!(part_num, frame_index, count = errors.len(), "scene reported non-fatal errors");
        }

        self.await_ready(part_num, frame_index).await?;

        self.page
            .wait_network_idle(self.cfg.settle_delay)
            .await?;

        self.page.capture_frame(frame_index).await
    }

    /// Polls fonts-ready, frame-marker, and settled in sequence, per spec
    /// §4.4's ladder, before the capture stage.
    async fn await_ready(&self, part_num: u32, frame_index: u64) -> anyhow::Result<()> {
        loop {
            if self.cancel.is_cancelled() {
                anyhow::bail!("part {part_num} cancelled while waiting for frame {frame_index} readiness");
            }
            let fonts = self.page.fonts_ready().await?;
            let marker = self.page.frame_marker_present(frame_index).await?;
            let settled = self.page.render_settled().await?;
            if fonts && marker && settled {
                return Ok(());
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

/// Tracks wall-clock spent per part, for diagnostics only; not part of the
/// progress protocol itself.
pub struct PartTimer {
    started: Instant,
}

impl PartTimer {
    pub fn start() -> Self {
        Self { started: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
