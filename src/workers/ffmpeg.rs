use std::path::Path;

use anyhow::{anyhow, Result};
use tokio::process::Command;
use tracing::{debug, info};

use crate::infrastructure::storage::media::MANIFEST_NAME;
use crate::modules::content::model::Resolution;

/// Arguments for one HLS rendition: H.264/AAC, 10 second VOD segments
/// named `<resolution>_NNN.ts` next to `index.m3u8`.
pub fn hls_args(source: &Path, out_dir: &Path, resolution: Resolution) -> Vec<String> {
    let segment_pattern = out_dir.join(format!("{}_%03d.ts", resolution.as_str()));
    let manifest = out_dir.join(MANIFEST_NAME);

    vec![
        "-y".into(),
        "-i".into(),
        source.to_string_lossy().into_owned(),
        "-vf".into(),
        format!("scale=-2:{}", resolution.height()),
        "-c:v".into(),
        "libx264".into(),
        "-crf".into(),
        "23".into(),
        "-preset".into(),
        "veryfast".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "128k".into(),
        "-hls_time".into(),
        "10".into(),
        "-hls_playlist_type".into(),
        "vod".into(),
        "-hls_segment_filename".into(),
        segment_pattern.to_string_lossy().into_owned(),
        manifest.to_string_lossy().into_owned(),
    ]
}

/// Transcodes `source` into `out_dir`, replacing whatever was there.
pub async fn transcode_rendition(
    ffmpeg_bin: &str,
    source: &Path,
    out_dir: &Path,
    resolution: Resolution,
) -> Result<()> {
    if out_dir.exists() {
        tokio::fs::remove_dir_all(out_dir).await?;
    }
    tokio::fs::create_dir_all(out_dir).await?;

    let args = hls_args(source, out_dir, resolution);
    debug!("{} {}", ffmpeg_bin, args.join(" "));

    let output = Command::new(ffmpeg_bin)
        .args(&args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| anyhow!("Could not start {}: {}", ffmpeg_bin, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        return Err(anyhow!(
            "ffmpeg exited with {} for {}: {}",
            output.status,
            resolution,
            tail.join(" | ")
        ));
    }

    info!("Rendition {} written to {}", resolution, out_dir.display());
    Ok(())
}
