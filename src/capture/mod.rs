//! Frame Capturer.
//!
//! Three strategies for getting pixels out of the page, selected once at run
//! start and fixed for the run's lifetime — tagged variants, not polymorphic
//! objects dispatched on every frame.
//!
//! `screenshot` and `extension_frame` are stateless and take a bare `&Page`;
//! `screencast` needs a long-lived CDP event subscription held across calls,
//! so that strategy is implemented as methods on
//! [`crate::scene::chromium::ChromiumPage`] instead of a free function here
//! (see that module for the `Page.startScreencast`/`screencastFrameAck`
//! flow).

use anyhow::Context;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;

use crate::config::ImageFormat;

#[derive(Debug, Clone, Copy)]
pub struct CaptureConfig {
    pub method: crate::config::CaptureMethod,
    pub image_format: ImageFormat,
    pub jpeg_quality: u8,
}

pub(crate) async fn screenshot(page: &Page, cfg: &CaptureConfig) -> anyhow::Result<Vec<u8>> {
    let format = match cfg.image_format {
        ImageFormat::Jpeg => CaptureScreenshotFormat::Jpeg,
        ImageFormat::Png => CaptureScreenshotFormat::Png,
    };
    let mut builder = ScreenshotParams::builder().format(format).full_page(false);
    if cfg.image_format == ImageFormat::Jpeg {
        builder = builder.quality(cfg.jpeg_quality as i64);
    }
    page.screenshot(builder.build())
        .await
        .context("Page.captureScreenshot failed")
}

/// The `extension` strategy drives a background-page extension that owns
/// its own capture pipeline (e.g. `chrome.tabCapture`); reelcore only needs
/// to ask it for the current frame over the same `evaluate` channel used
/// for the readiness ladder.
pub(crate) async fn extension_frame(
    page: &Page,
    _cfg: &CaptureConfig,
    frame_index: u64,
) -> anyhow::Result<Vec<u8>> {
    let result = page
        .evaluate(format!("window.reelcoreExtension.captureFrame({frame_index})"))
        .await
        .context("extension captureFrame failed")?;
    let base64: String = result
        .into_value()
        .context("extension captureFrame did not return base64 image data")?;
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(base64)
        .context("decoding extension frame payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_config_is_copy() {
        let cfg = CaptureConfig {
            method: crate::config::CaptureMethod::Screenshot,
            image_format: ImageFormat::Png,
            jpeg_quality: 80,
        };
        let copy = cfg;
        assert_eq!(copy.jpeg_quality, cfg.jpeg_quality);
    }
}
