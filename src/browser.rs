//! Browser lifecycle — launches the headless Chromium instance shared by
//! all Part Workers for a run.

use anyhow::Context;
use chromiumoxide::browser::{Browser, BrowserConfig};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::{CaptureMethod, RunConfig};

/// A launched browser plus the background task draining its CDP event
/// handler stream. Dropping this without awaiting `handler` first simply
/// aborts the handler task; callers should call [`BrowserHandle::close`]
/// during orderly shutdown.
pub struct BrowserHandle {
    pub browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserHandle {
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.browser.close().await.context("closing browser")?;
        self.handler.abort();
        Ok(())
    }
}

pub async fn launch_browser(cfg: &RunConfig) -> anyhow::Result<BrowserHandle> {
    let mut builder = BrowserConfig::builder()
        .window_size(cfg.width, cfg.height)
        .arg("--hide-scrollbars")
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage");

    if !cfg.headless {
        builder = builder.with_head();
    }

    if cfg.capture_method == CaptureMethod::Extension {
        let extension_dir = cfg
            .extension_dir
            .as_deref()
            .context("capture_method=extension requires extension_dir (should have been caught by RunConfig::validate)")?;
        builder = builder.extension(
            extension_dir
                .to_str()
                .context("extension_dir must be valid UTF-8")?,
        );
    }

    let browser_config = builder
        .build()
        .map_err(|e| anyhow::anyhow!("invalid browser config: {e}"))?;

    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .context("launching headless Chromium")?;

    let handler_task = tokio::spawn(async move {
        use futures::StreamExt;
        while let Some(event) = handler.next().await {
            if let Err(err) = event {
                warn!(error = %err, "chromium event handler error");
            }
        }
        debug!("chromium event handler stream ended");
    });

    Ok(BrowserHandle {
        browser,
        handler: handler_task,
    })
}
