use std::path::Path;

use anyhow::{anyhow, Result};
use axum::extract::multipart::Field;
use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{error, info};

/// Streams a multipart file field to `dest` chunk by chunk.
/// A partially written file is removed when the stream or the disk fails.
pub async fn stream_to_disk(mut field: Field<'_>, dest: &Path) -> Result<u64> {
    let content_type = field
        .content_type()
        .map(str::to_string)
        .or_else(|| {
            field
                .file_name()
                .and_then(|name| mime_guess::from_path(name).first())
                .map(|m| m.essence_str().to_string())
        })
        .unwrap_or_else(|| "application/octet-stream".to_string());

    if !content_type.starts_with("video/") {
        return Err(anyhow!("Invalid content type: only video/* allowed"));
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let file = File::create(dest).await?;
    let mut writer = BufWriter::new(file);
    let mut written: u64 = 0;

    while let Some(chunk) = field.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                error!("Stream error: {}", e);
                discard(dest).await;
                return Err(anyhow!("Stream interrupted"));
            }
        };

        if let Err(e) = writer.write_all(&chunk).await {
            error!("Write error: {}", e);
            discard(dest).await;
            return Err(e.into());
        }
        written += chunk.len() as u64;
    }

    writer.flush().await?;

    if written == 0 {
        discard(dest).await;
        return Err(anyhow!("Uploaded file is empty"));
    }

    info!("Stored {} bytes at {}", written, dest.display());
    Ok(written)
}

async fn discard(path: &Path) {
    let _ = tokio::fs::remove_file(path).await;
}

/// Reduces an uploaded file name to `[A-Za-z0-9._-]`, keeping the extension.
pub fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "video.mp4".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_file_names() {
        assert_eq!(sanitize_file_name("My Movie (2024).mp4"), "My_Movie__2024_.mp4");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("..hidden.mkv"), "hidden.mkv");
        assert_eq!(sanitize_file_name(""), "video.mp4");
    }
}
