//! Error taxonomy for the rendering engine.
//!
//! Each error kind maps to one variant so callers (chiefly the Orchestrator)
//! can match on *kind* rather than parse messages.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("part {part_num}: scene page failed to load: {source}")]
    PageLoad {
        part_num: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("part {part_num} frame {frame_index}: scene reported {count} render error(s): {messages}")]
    SceneRender {
        part_num: u32,
        frame_index: u64,
        count: usize,
        messages: String,
    },

    #[error("part {part_num} frame {frame_index}: frame render timed out after {elapsed_ms}ms")]
    FrameTimeout {
        part_num: u32,
        frame_index: u64,
        elapsed_ms: u128,
    },

    #[error("part {part_num}: encoder error: {source}")]
    Encoder {
        part_num: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("cleanup step failed (non-fatal): {0}")]
    Cleanup(String),
}

impl RenderError {
    /// Whether this error kind is fatal for the whole run (kinds 1-6) versus
    /// merely logged (kind 7, Cleanup).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RenderError::Cleanup(_))
    }
}

pub type Result<T> = std::result::Result<T, anyhow::Error>;
