//! JS snippets evaluated in-page to drive the readiness ladder.
//!
//! These assume the scene bundle exposes a `window.reelcore` object with a
//! fixed initialize/render/settled contract. Kept as plain format strings
//! rather than a templating crate since each one is a single expression
//! evaluated via `Page::evaluate`.

/// `window.reelcore.initialize(init)` — init is JSON-encoded by the caller.
pub fn init_call(init_json: &str) -> String {
    format!("window.reelcore.initialize({init_json})")
}

/// `window.reelcore.render(frameIndex)` resolves to an array of error
/// descriptors collected while rendering that frame.
pub fn render_call(frame_index: u64) -> String {
    format!("window.reelcore.render({frame_index})")
}

pub const FONTS_READY: &str = "document.fonts.status === 'loaded'";

pub fn frame_marker_present(frame_index: u64) -> String {
    format!(
        "document.body.dataset.reelcoreFrame === String({frame_index})"
    )
}

pub const RENDER_SETTLED: &str = "window.reelcore.settled === true";
