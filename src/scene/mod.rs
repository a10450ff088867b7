//! Scene Page contract.
//!
//! The loaded page is a small state machine: `init -> (render(N) ->
//! ready(N))*`. Modeled as a trait rather than an ad hoc sequence of waits
//! so `PageDriver` can be exercised against a fake implementation in tests
//! without a real browser.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;

pub mod chromium;
pub mod protocol;

/// Initialization record handed to the page's init entry point.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInit {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub server_port: u16,
    pub duration_frames: u64,
    /// The worker's `partStart` — a per-worker identifier (spec Glossary: Render Id).
    pub render_id: u64,
    pub user_data: serde_json::Value,
    pub video_component_type: String,
    pub image_format: crate::config::ImageFormat,
    pub jpeg_quality: u8,
    pub secret: String,
    pub dev_mode: bool,
}

/// One error descriptor reported by a `render(frameIndex)` call.
#[derive(Debug, Clone)]
pub struct PageErrorDescriptor {
    pub message: String,
}

/// The narrow protocol a Scene Page must expose, after navigation.
///
/// Implemented once against a real `chromiumoxide::Page`
/// ([`chromium::ChromiumPage`]) and once against an in-memory double
/// ([`crate::testing::FakePage`]) so the readiness ladder and timeout/cancel
/// logic in [`crate::page_driver::PageDriver`] can be unit-tested.
pub trait ScenePage: Send + Sync {
    fn initialize(&self, init: &PageInit) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Renders the given frame; returns any error descriptors the scene
    /// runtime collected while rendering it.
    fn render_frame(
        &self,
        frame_index: u64,
    ) -> impl Future<Output = anyhow::Result<Vec<PageErrorDescriptor>>> + Send;

    fn fonts_ready(&self) -> impl Future<Output = anyhow::Result<bool>> + Send;

    /// Whether the DOM marker encoding `frame_index` currently exists.
    fn frame_marker_present(
        &self,
        frame_index: u64,
    ) -> impl Future<Output = anyhow::Result<bool>> + Send;

    fn render_settled(&self) -> impl Future<Output = anyhow::Result<bool>> + Send;

    fn wait_network_idle(&self, quiet: Duration) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Captures the currently-rendered frame as encoded image bytes, using
    /// whichever strategy (screencast/extension/screenshot) this page was
    /// configured with.
    fn capture_frame(&self, frame_index: u64) -> impl Future<Output = anyhow::Result<Vec<u8>>> + Send;
}
