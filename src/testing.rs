//! In-memory test doubles for exercising the render pipeline without a real
//! browser or encoder subprocess.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::scene::{PageErrorDescriptor, PageInit, ScenePage};

/// A [`ScenePage`] double that renders deterministic pixel data and can be
/// told to misbehave: report errors, refuse to settle, or emit duplicate
/// frames for a chosen index, so the readiness ladder and hash-check logic
/// can be unit-tested end to end.
pub struct FakePage {
    inner: Mutex<FakePageState>,
    render_calls: AtomicU64,
}

struct FakePageState {
    init: Option<PageInit>,
    error_frames: Vec<u64>,
    never_settles: bool,
    duplicate_of: Option<(u64, u64)>,
    last_rendered: Option<u64>,
    frame_delay: Duration,
}

impl FakePage {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FakePageState {
                init: None,
                error_frames: Vec::new(),
                never_settles: false,
                duplicate_of: None,
                last_rendered: None,
                frame_delay: Duration::ZERO,
            }),
            render_calls: AtomicU64::new(0),
        }
    }

    /// `render_frame(frame)` will return a synthetic error descriptor.
    pub fn fail_on_frame(self, frame: u64) -> Self {
        self.inner.lock().error_frames.push(frame);
        self
    }

    /// `render_settled` never returns true, to exercise the render timeout.
    pub fn never_settles(self) -> Self {
        self.inner.lock().never_settles = true;
        self
    }

    /// Makes `captured_bytes(second)` equal `captured_bytes(first)`, to
    /// exercise the Frame Hash Map duplicate check.
    pub fn duplicate_frames(self, first: u64, second: u64) -> Self {
        self.inner.lock().duplicate_of = Some((first, second));
        self
    }

    /// Sleeps for `delay` on every `render_frame` call, to simulate a
    /// long-running part so a sibling's fail-fast abort can be observed
    /// taking effect before this page would otherwise have finished on its
    /// own.
    pub fn slow(self, delay: Duration) -> Self {
        self.inner.lock().frame_delay = delay;
        self
    }

    pub fn render_call_count(&self) -> u64 {
        self.render_calls.load(Ordering::SeqCst)
    }

    /// Deterministic pixel bytes for a frame index, honoring
    /// `duplicate_frames` so two indices can be made to collide.
    pub fn captured_bytes(&self, frame_index: u64) -> Vec<u8> {
        let state = self.inner.lock();
        let effective = match state.duplicate_of {
            Some((first, second)) if frame_index == second => first,
            _ => frame_index,
        };
        format!("frame-pixels-{effective}").into_bytes()
    }
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenePage for FakePage {
    async fn initialize(&self, init: &PageInit) -> anyhow::Result<()> {
        self.inner.lock().init = Some(init.clone());
        Ok(())
    }

    async fn render_frame(&self, frame_index: u64) -> anyhow::Result<Vec<PageErrorDescriptor>> {
        self.render_calls.fetch_add(1, Ordering::SeqCst);
        let delay = {
            let mut state = self.inner.lock();
            state.last_rendered = Some(frame_index);
            state.frame_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let state = self.inner.lock();
        if state.error_frames.contains(&frame_index) {
            Ok(vec![PageErrorDescriptor {
                message: format!("synthetic error on frame {frame_index}"),
            }])
        } else {
            Ok(Vec::new())
        }
    }

    async fn fonts_ready(&self) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn frame_marker_present(&self, frame_index: u64) -> anyhow::Result<bool> {
        Ok(self.inner.lock().last_rendered == Some(frame_index))
    }

    async fn render_settled(&self) -> anyhow::Result<bool> {
        Ok(!self.inner.lock().never_settles)
    }

    async fn wait_network_idle(&self, _quiet: Duration) -> anyhow::Result<()> {
        Ok(())
    }

    async fn capture_frame(&self, frame_index: u64) -> anyhow::Result<Vec<u8>> {
        Ok(self.captured_bytes(frame_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_configured_errors() {
        let page = FakePage::new().fail_on_frame(3);
        let errors = page.render_frame(3).await.unwrap();
        assert_eq!(errors.len(), 1);
        let errors = page.render_frame(4).await.unwrap();
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn never_settles_stays_unsettled() {
        let page = FakePage::new().never_settles();
        assert!(!page.render_settled().await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_frames_share_captured_bytes() {
        let page = FakePage::new().duplicate_frames(5, 6);
        assert_eq!(page.captured_bytes(5), page.captured_bytes(6));
        assert_ne!(page.captured_bytes(4), page.captured_bytes(5));
    }
}
