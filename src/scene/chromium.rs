//! chromiumoxide-backed [`ScenePage`] — the real implementation used outside
//! tests, driving the page through `evaluate` calls and capturing frames via
//! [`crate::capture`] or, for the `screencast` strategy, the CDP
//! `Page.startScreencast`/`screencastFrameAck` stream held open here.

use std::pin::Pin;
use std::time::Duration;

use anyhow::Context;
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::network::EventLoadingFinished;
use chromiumoxide::cdp::browser_protocol::page::{
    EventScreencastFrame, ScreencastFormat, ScreencastFrameAckParams, StartScreencastParams,
};
use chromiumoxide::Page;
use futures::{Stream, StreamExt};
use tokio::sync::Mutex;
use tokio::time::sleep;

use super::protocol;
use super::{PageErrorDescriptor, PageInit, ScenePage};
use crate::capture::{self, CaptureConfig};
use crate::config::{CaptureMethod, ImageFormat};

/// Held open for the lifetime of a `screencast`-strategy page: one
/// `Page.startScreencast` subscription that every `capture_frame` call pulls
/// its next frame from, acking each before asking for another so Chromium
/// keeps sending new ones instead of stalling the stream.
struct ScreencastSession {
    events: Pin<Box<dyn Stream<Item = std::sync::Arc<EventScreencastFrame>> + Send>>,
}

pub struct ChromiumPage {
    page: Page,
    capture: CaptureConfig,
    screencast_session: Mutex<Option<ScreencastSession>>,
}

impl ChromiumPage {
    pub fn new(page: Page, capture: CaptureConfig) -> Self {
        Self {
            page,
            capture,
            screencast_session: Mutex::new(None),
        }
    }

    /// Pulls the next frame off the open screencast stream, starting the
    /// subscription on first use. Held behind a mutex rather than `&mut
    /// self` since `ScenePage` methods all take `&self`.
    async fn screencast_frame(&self) -> anyhow::Result<Vec<u8>> {
        let mut guard = self.screencast_session.lock().await;
        if guard.is_none() {
            *guard = Some(self.start_screencast_session().await?);
        }
        let session = guard.as_mut().expect("just populated above");

        let event = session
            .events
            .next()
            .await
            .context("Page.screencastFrame stream ended unexpectedly")?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&event.data)
            .context("decoding screencast frame payload")?;

        self.page
            .execute(ScreencastFrameAckParams::new(event.session_id.clone()))
            .await
            .context("Page.screencastFrameAck failed")?;

        Ok(bytes)
    }

    async fn start_screencast_session(&self) -> anyhow::Result<ScreencastSession> {
        let format = match self.capture.image_format {
            ImageFormat::Jpeg => ScreencastFormat::Jpeg,
            ImageFormat::Png => ScreencastFormat::Png,
        };
        let mut builder = StartScreencastParams::builder()
            .format(format)
            .every_nth_frame(1);
        if self.capture.image_format == ImageFormat::Jpeg {
            builder = builder.quality(self.capture.jpeg_quality as i64);
        }

        // Subscribe before issuing startScreencast so no frame can arrive
        // and be dropped between the two calls.
        let events = self
            .page
            .event_listener::<EventScreencastFrame>()
            .await
            .context("subscribing to Page.screencastFrame")?;
        self.page
            .execute(builder.build())
            .await
            .context("Page.startScreencast failed")?;

        Ok(ScreencastSession {
            events: Box::pin(events),
        })
    }
}

impl ScenePage for ChromiumPage {
    async fn initialize(&self, init: &PageInit) -> anyhow::Result<()> {
        let init_json = serde_json::to_string(init).context("serializing page init record")?;
        self.page
            .evaluate(protocol::init_call(&init_json))
            .await
            .context("window.reelcore.initialize failed")?;
        Ok(())
    }

    async fn render_frame(&self, frame_index: u64) -> anyhow::Result<Vec<PageErrorDescriptor>> {
        let result = self
            .page
            .evaluate(protocol::render_call(frame_index))
            .await
            .context("window.reelcore.render failed")?;
        let errors: Vec<String> = result.into_value().unwrap_or_default();
        Ok(errors
            .into_iter()
            .map(|message| PageErrorDescriptor { message })
            .collect())
    }

    async fn fonts_ready(&self) -> anyhow::Result<bool> {
        let ready = self
            .page
            .evaluate(protocol::FONTS_READY)
            .await
            .context("checking document.fonts.status")?
            .into_value()
            .unwrap_or(false);
        Ok(ready)
    }

    async fn frame_marker_present(&self, frame_index: u64) -> anyhow::Result<bool> {
        let present = self
            .page
            .evaluate(protocol::frame_marker_present(frame_index))
            .await
            .context("checking frame marker")?
            .into_value()
            .unwrap_or(false);
        Ok(present)
    }

    async fn render_settled(&self) -> anyhow::Result<bool> {
        let settled = self
            .page
            .evaluate(protocol::RENDER_SETTLED)
            .await
            .context("checking window.reelcore.settled")?
            .into_value()
            .unwrap_or(false);
        Ok(settled)
    }

    /// Waits for `quiet` with no `Network.loadingFinished` events. There is
    /// no native "network idle" CDP signal, so this listens on the event
    /// stream and resets a deadline on every event.
    async fn wait_network_idle(&self, quiet: Duration) -> anyhow::Result<()> {
        let mut events = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await
            .context("subscribing to Network.loadingFinished")?;

        loop {
            match tokio::time::timeout(quiet, events.next()).await {
                Ok(Some(_)) => continue,
                Ok(None) => return Ok(()),
                Err(_) => return Ok(()),
            }
        }
    }

    async fn capture_frame(&self, frame_index: u64) -> anyhow::Result<Vec<u8>> {
        match self.capture.method {
            CaptureMethod::Screenshot => capture::screenshot(&self.page, &self.capture).await,
            CaptureMethod::Extension => {
                capture::extension_frame(&self.page, &self.capture, frame_index).await
            }
            CaptureMethod::Screencast => self.screencast_frame().await,
        }
    }
}

/// Convenience used by the real Page Driver to give the page a moment to
/// settle layout before the first readiness check (`settleDelay`).
pub async fn settle(delay: Duration) {
    sleep(delay).await;
}
