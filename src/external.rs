//! Shared wrapper around one-shot external tool invocations (the
//! concatenation encoder call and the verification probe call). The
//! streaming, per-frame encoder subprocess in [`crate::encoder_sink`] is
//! intentionally separate since it needs piped stdin held open across many
//! writes rather than a single run-to-completion call.

use std::path::Path;
use std::process::Stdio;

use anyhow::Context;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs `tool args...` to completion, returning its stdout on success.
/// Non-zero exit is reported with stderr attached for diagnosis.
pub async fn run_to_completion(tool: &Path, args: &[&std::ffi::OsStr]) -> anyhow::Result<Vec<u8>> {
    let output = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("spawning {}", tool.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(tool = %tool.display(), status = %output.status, "external tool failed: {stderr}");
        anyhow::bail!(
            "{} exited with {}: {}",
            tool.display(),
            output.status,
            stderr
        );
    }

    debug!(tool = %tool.display(), "external tool completed successfully");
    Ok(output.stdout)
}
