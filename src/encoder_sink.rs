//! Encoder Sink.
//!
//! Wraps one encoder subprocess per Part Worker. Frames are written to the
//! subprocess's stdin and each write is awaited before the next is issued —
//! backpressure comes from the write itself blocking when the pipe is full,
//! not from any OS-level drain event (drain-based pacing has been observed
//! to hang on some platforms, so it is deliberately not used here). Drop/kill
//! ordering follows an idempotent-stop pattern: killing twice, or killing
//! after a clean `finish()`, is always safe.

use std::path::Path;
use std::process::Stdio;

use anyhow::Context;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, error, warn};

pub struct EncoderSink {
    part_num: u32,
    child: Mutex<Option<Child>>,
}

impl EncoderSink {
    /// Spawns the encoder, pre-configured to read raw frames from stdin and
    /// mux them into `artifact_path` (always a `.mkv` container, regardless
    /// of the final output format).
    pub async fn open(
        part_num: u32,
        encoder_path: &Path,
        fps: u32,
        width: u32,
        height: u32,
        image_format_flag: &str,
        artifact_path: &Path,
    ) -> anyhow::Result<Self> {
        let mut command = Command::new(encoder_path);
        command
            .arg("-y")
            .arg("-f")
            .arg(image_format_flag)
            .arg("-framerate")
            .arg(fps.to_string())
            .arg("-s")
            .arg(format!("{width}x{height}"))
            .arg("-i")
            .arg("pipe:0")
            .arg("-c:v")
            .arg("copy")
            .arg(artifact_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let child = command
            .spawn()
            .with_context(|| format!("part {part_num}: failed to spawn encoder"))?;

        debug!(part_num, "encoder subprocess spawned");

        Ok(Self {
            part_num,
            child: Mutex::new(Some(child)),
        })
    }

    /// Writes one encoded frame and awaits completion of the write before
    /// returning, so a slow encoder naturally paces the Page Driver.
    pub async fn write_frame(&self, bytes: &[u8]) -> anyhow::Result<()> {
        let stdin = {
            let mut guard = self.child.lock();
            let child = guard
                .as_mut()
                .context("encoder already closed")?;
            child.stdin.take()
        };
        let Some(mut stdin) = stdin else {
            anyhow::bail!("part {}: encoder stdin already taken", self.part_num);
        };

        let result = stdin.write_all(bytes).await;
        self.child.lock().as_mut().unwrap().stdin = Some(stdin);
        result.with_context(|| format!("part {}: writing frame to encoder", self.part_num))
    }

    /// Closes stdin and awaits the subprocess exiting cleanly. Consumes
    /// `self` so a closed sink cannot be written to again.
    pub async fn finish(self) -> anyhow::Result<()> {
        let child = self.child.lock().take();
        let Some(mut child) = child else {
            return Ok(());
        };
        drop(child.stdin.take());

        let status = child
            .wait()
            .await
            .with_context(|| format!("part {}: waiting for encoder exit", self.part_num))?;

        if !status.success() {
            anyhow::bail!(
                "part {}: encoder exited with status {status}",
                self.part_num
            );
        }
        Ok(())
    }

    /// Forcefully kills the subprocess. Idempotent: safe to call multiple
    /// times, and safe to call after [`Self::finish`] already consumed the
    /// child.
    pub fn kill(&self) {
        let mut guard = self.child.lock();
        if let Some(child) = guard.as_mut() {
            match child.start_kill() {
                Ok(()) => debug!(part_num = self.part_num, "encoder killed"),
                Err(err) => warn!(part_num = self.part_num, error = %err, "failed to kill encoder"),
            }
        }
        *guard = None;
    }
}

impl Drop for EncoderSink {
    fn drop(&mut self) {
        if self.child.lock().is_some() {
            error!(
                part_num = self.part_num,
                "encoder sink dropped without finish()/kill() — killing now"
            );
            self.kill();
        }
    }
}
