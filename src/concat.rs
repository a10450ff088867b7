//! Concatenator & Verifier.
//!
//! Joins each part's artifact into the final output via the external
//! encoder's concat demuxer, then optionally verifies the result: a frame
//! count probe and a frame-hash duplicate scan.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::fs;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::error::RenderError;
use crate::external;
use crate::hash_map::FrameHashMap;
use crate::part::Part;

/// Writes the `concat.txt` descriptor the encoder's concat demuxer expects:
/// one `file '<path>'` line per part artifact, in part order.
async fn write_concat_descriptor(parts: &[Part], temp_dir: &Path) -> anyhow::Result<PathBuf> {
    let descriptor_path = temp_dir.join("concat.txt");
    let mut contents = String::new();
    for part in parts {
        let artifact = part.artifact_path(temp_dir);
        contents.push_str(&format!("file '{}'\n", artifact.display()));
    }
    fs::write(&descriptor_path, contents)
        .await
        .context("writing concat descriptor")?;
    Ok(descriptor_path)
}

/// Concatenates every part's artifact into `cfg.resolved_output_path()`.
/// Remuxes (stream copy) when `raw_output` is set; otherwise transcodes to
/// the final delivery format.
pub async fn concatenate(cfg: &RunConfig, parts: &[Part]) -> anyhow::Result<PathBuf> {
    let descriptor = write_concat_descriptor(parts, &cfg.temp_dir).await?;
    let output = cfg.resolved_output_path();

    let mut args: Vec<&OsStr> = vec![
        OsStr::new("-y"),
        OsStr::new("-f"),
        OsStr::new("concat"),
        OsStr::new("-safe"),
        OsStr::new("0"),
        OsStr::new("-i"),
        descriptor.as_os_str(),
    ];
    if cfg.raw_output {
        args.push(OsStr::new("-c"));
        args.push(OsStr::new("copy"));
    }
    args.push(output.as_os_str());

    external::run_to_completion(&cfg.encoder_path, &args)
        .await
        .map_err(|source| RenderError::Encoder {
            part_num: u32::MAX,
            source,
        })?;

    info!(output = %output.display(), "concatenation complete");
    Ok(output)
}

/// Verifies the concatenated output: optionally checks the
/// probed frame count against the expected total, and optionally scans the
/// Frame Hash Map for adjacent duplicate frames.
pub async fn verify(
    cfg: &RunConfig,
    output_path: &Path,
    hash_map: &FrameHashMap,
) -> anyhow::Result<()> {
    if cfg.enable_frame_count_check {
        let actual = probe_frame_count(cfg, output_path).await?;
        if actual != cfg.duration_frames {
            return Err(RenderError::Verification(format!(
                "expected {} frames, probe reported {actual}",
                cfg.duration_frames
            ))
            .into());
        }
        info!(frames = actual, "frame count check passed");
    }

    if cfg.enable_hash_check {
        if let Some((first, second)) = hash_map.first_duplicate_pair() {
            return Err(RenderError::Verification(format!(
                "frames {first} and {second} are pixel-identical"
            ))
            .into());
        }
        info!(frames_checked = hash_map.len(), "hash duplicate check passed");
    }

    Ok(())
}

async fn probe_frame_count(cfg: &RunConfig, output_path: &Path) -> anyhow::Result<u64> {
    let args: Vec<&OsStr> = vec![
        OsStr::new("-v"),
        OsStr::new("error"),
        OsStr::new("-count_frames"),
        OsStr::new("-select_streams"),
        OsStr::new("v:0"),
        OsStr::new("-show_entries"),
        OsStr::new("stream=nb_read_frames"),
        OsStr::new("-of"),
        OsStr::new("csv=p=0"),
        output_path.as_os_str(),
    ];

    let stdout = external::run_to_completion(&cfg.probe_path, &args)
        .await
        .map_err(|source| RenderError::Verification(source.to_string()))?;

    let text = String::from_utf8_lossy(&stdout);
    text.trim()
        .parse::<u64>()
        .with_context(|| format!("probe returned non-numeric frame count: {text:?}"))
        .map_err(|e| {
            warn!(error = %e, "failed to parse probe output");
            e
        })
}
