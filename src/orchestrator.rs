//! Orchestrator.
//!
//! Drives a run through `Bundling -> ServiceStarting -> BrowserLaunching ->
//! Rendering -> Concatenating -> Verifying -> Done`, with `Cleanup` as the
//! terminal transition reached from any state. Fan-out/fail-fast/await:
//! spawn every task up front, then await each handle, propagating the first
//! error while letting the rest settle — not racing them and abandoning the
//! losers.

use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;

use crate::browser::{self, BrowserHandle};
use crate::concat;
use crate::config::RunConfig;
use crate::error::RenderError;
use crate::hash_map::FrameHashMap;
use crate::media_service::{self, AppState};
use crate::part::{self, Part};
use crate::progress::ProgressAggregator;
use crate::scene::chromium::ChromiumPage;
use crate::worker::PartWorker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Bundling,
    ServiceStarting,
    BrowserLaunching,
    Rendering,
    Concatenating,
    Verifying,
    Done,
    Cleanup,
}

pub struct Orchestrator {
    cfg: Arc<RunConfig>,
}

impl Orchestrator {
    pub fn new(cfg: RunConfig) -> Self {
        Self { cfg: Arc::new(cfg) }
    }

    pub async fn run(self) -> anyhow::Result<std::path::PathBuf> {
        self.cfg
            .validate()
            .map_err(|e| RenderError::Configuration(e.to_string()))?;

        let mut state = RunState::Bundling;
        info!(?state, "run starting");
        tokio::fs::create_dir_all(&self.cfg.temp_dir)
            .await
            .map_err(|e| RenderError::Configuration(format!("creating temp dir: {e}")))?;

        let parts = part::partition(
            self.cfg.start_frame,
            self.cfg.duration_frames,
            self.cfg.effective_concurrency(),
        );

        let secret = Uuid::new_v4().to_string();
        let hash_map = Arc::new(FrameHashMap::new());
        let part_lengths: Vec<u64> = parts.iter().map(Part::len).collect();
        let progress = Arc::new(ProgressAggregator::new(&part_lengths, self.cfg.fps));

        state = RunState::ServiceStarting;
        info!(?state, "starting media service");
        let app_state = AppState {
            secret: Arc::from(secret.as_str()),
            cfg: self.cfg.clone(),
        };
        let (port, service_handle) =
            media_service::serve(app_state, &self.cfg.scene_dir()).await?;

        state = RunState::BrowserLaunching;
        info!(?state, "launching browser");
        let browser_handle = browser::launch_browser(&self.cfg).await;
        let browser_handle = match browser_handle {
            Ok(h) => h,
            Err(err) => {
                service_handle.abort();
                return Err(err);
            }
        };

        state = RunState::Rendering;
        info!(?state, parts = parts.len(), "rendering parts");
        let render_result = self
            .render_all_parts(&parts, &browser_handle, &secret, port, &hash_map, &progress)
            .await;

        if let Err(err) = render_result {
            state = RunState::Cleanup;
            warn!(?state, error = %err, "rendering failed, cleaning up");
            self.cleanup(browser_handle, service_handle).await;
            return Err(err);
        }

        state = RunState::Concatenating;
        info!(?state, "concatenating parts");
        let output = match concat::concatenate(&self.cfg, &parts).await {
            Ok(path) => path,
            Err(err) => {
                state = RunState::Cleanup;
                warn!(?state, error = %err, "concatenation failed, cleaning up");
                self.cleanup(browser_handle, service_handle).await;
                return Err(err);
            }
        };

        state = RunState::Verifying;
        info!(?state, "verifying output");
        if let Err(err) = concat::verify(&self.cfg, &output, &hash_map).await {
            state = RunState::Cleanup;
            warn!(?state, error = %err, "verification failed, cleaning up");
            self.cleanup(browser_handle, service_handle).await;
            return Err(err);
        }

        state = RunState::Done;
        info!(?state, output = %output.display(), "run complete");
        self.cleanup(browser_handle, service_handle).await;
        Ok(output)
    }

    async fn render_all_parts(
        &self,
        parts: &[Part],
        browser_handle: &BrowserHandle,
        secret: &str,
        port: u16,
        hash_map: &Arc<FrameHashMap>,
        progress: &Arc<ProgressAggregator>,
    ) -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        let mut handles: Vec<JoinHandle<anyhow::Result<std::path::PathBuf>>> = Vec::new();

        // Page setup (new page, viewport, navigation) happens *inside* each
        // spawned task rather than before it, so a setup failure for one
        // part is just another `Err` flowing through the same
        // `cancel`+`FuturesUnordered` fail-fast path below — it can never
        // abandon an already-spawned sibling by propagating out of this
        // loop with `?` before every part has been spawned.
        let scene_url = format!("file://{}", self.cfg.scene_entry_path.display());

        for part in parts {
            let browser = browser_handle.browser.clone();
            let cfg = self.cfg.clone();
            let hash_map = hash_map.clone();
            let progress = progress.clone();
            let cancel = cancel.clone();
            let scene_url = scene_url.clone();
            let secret = secret.to_string();
            let part = *part;

            handles.push(tokio::spawn(async move {
                let page = browser
                    .new_page("about:blank")
                    .await
                    .map_err(|e| RenderError::PageLoad {
                        part_num: part.part_num,
                        source: anyhow::anyhow!(e),
                    })?;

                // Scale factor forced to 1 so HiDPI hosts don't double the
                // captured resolution.
                page.execute(SetDeviceMetricsOverrideParams::new(
                    cfg.width as i64,
                    cfg.height as i64,
                    1.0,
                    false,
                ))
                .await
                .map_err(|e| RenderError::PageLoad {
                    part_num: part.part_num,
                    source: anyhow::anyhow!(e),
                })?;

                // Navigated via a `file://` URL per the scene page contract
                // (spec §4.4/§6); the Media Service is a separate HTTP
                // surface the page talks to afterward for probes/frames,
                // not the page's own origin.
                page.goto(scene_url).await.map_err(|e| RenderError::PageLoad {
                    part_num: part.part_num,
                    source: anyhow::anyhow!(e),
                })?;

                let capture_cfg = crate::capture::CaptureConfig {
                    method: cfg.capture_method,
                    image_format: cfg.image_format,
                    jpeg_quality: cfg.jpeg_quality,
                };
                let scene_page = ChromiumPage::new(page, capture_cfg);

                let render_id = part.start;
                let worker = PartWorker::new(part, scene_page, cfg, hash_map, progress, cancel);
                worker.run(render_id, secret, port).await
            }));
        }

        // Poll handles as they settle rather than in submission order. A
        // worker that hits a fatal error already trips `cancel` itself
        // before returning (see `PartWorker::run`); polling here too covers
        // the case a worker's task panics before reaching that point, so a
        // panicking part still fans cancellation out to its peers.
        let mut in_flight: FuturesUnordered<_> = handles.into_iter().collect();
        let mut first_error: Option<anyhow::Error> = None;

        while let Some(result) = in_flight.next().await {
            match result {
                Ok(Ok(_artifact)) => {}
                Ok(Err(err)) => {
                    error!(error = %err, "part worker failed");
                    if first_error.is_none() {
                        first_error = Some(err);
                        cancel.cancel();
                    }
                }
                Err(join_err) => {
                    error!(error = %join_err, "part worker task panicked");
                    if first_error.is_none() {
                        first_error = Some(anyhow::anyhow!(join_err));
                        cancel.cancel();
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Cleanup ordering: encoders are already killed by failed workers
    /// themselves; here we close pages/browser, then stop the media service.
    async fn cleanup(&self, browser_handle: BrowserHandle, service_handle: JoinHandle<()>) {
        if let Err(err) = browser_handle.close().await {
            warn!(error = %err, "error closing browser during cleanup");
        }
        service_handle.abort();
    }
}
