use std::io;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::modules::content::model::Resolution;

const VIDEOS_DIR: &str = "videos";
const HLS_DIR: &str = "hls";
pub const MANIFEST_NAME: &str = "index.m3u8";

/// Layout of the media volume:
///
/// ```text
/// <root>/videos/<uuid>_<name>              uploaded sources
/// <root>/hls/<video_id>/<resolution>/      index.m3u8 + <resolution>_NNN.ts
/// ```
#[derive(Clone, Debug)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn ensure_dirs(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(self.root.join(VIDEOS_DIR)).await?;
        tokio::fs::create_dir_all(self.root.join(HLS_DIR)).await?;
        info!("Media root ready at {}", self.root.display());
        Ok(())
    }

    /// Relative path stored in `videos.video_file`.
    pub fn source_relative(file_name: &str) -> String {
        format!("{}/{}", VIDEOS_DIR, file_name)
    }

    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn hls_dir(&self, video_id: i64) -> PathBuf {
        self.root.join(HLS_DIR).join(video_id.to_string())
    }

    pub fn rendition_dir(&self, video_id: i64, resolution: Resolution) -> PathBuf {
        self.hls_dir(video_id).join(resolution.as_str())
    }

    pub fn manifest_path(&self, video_id: i64, resolution: Resolution) -> PathBuf {
        self.rendition_dir(video_id, resolution).join(MANIFEST_NAME)
    }

    /// `None` when the name could escape the rendition directory or is not a segment.
    pub fn segment_path(&self, video_id: i64, resolution: Resolution, segment: &str) -> Option<PathBuf> {
        is_valid_segment_name(segment).then(|| self.rendition_dir(video_id, resolution).join(segment))
    }

    /// Removes an uploaded source file; a missing file is not an error.
    pub async fn remove_source(&self, source_relative: &str) {
        let source = self.absolute(source_relative);
        match tokio::fs::remove_file(&source).await {
            Ok(()) => info!("Deleted source file {}", source.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not delete {}: {}", source.display(), e),
        }
    }

    /// Removes the uploaded source and every rendition of a video.
    pub async fn remove_video_assets(&self, video_id: i64, source_relative: &str) {
        self.remove_source(source_relative).await;

        let hls = self.hls_dir(video_id);
        match tokio::fs::remove_dir_all(&hls).await {
            Ok(()) => info!("Deleted HLS output {}", hls.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not delete {}: {}", hls.display(), e),
        }
    }
}

pub fn is_valid_segment_name(name: &str) -> bool {
    name.len() > 3
        && name.ends_with(".ts")
        && !name.starts_with('.')
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_names() {
        assert!(is_valid_segment_name("480p_000.ts"));
        assert!(is_valid_segment_name("segment-12.ts"));
        assert!(!is_valid_segment_name("../../etc/passwd"));
        assert!(!is_valid_segment_name("..ts"));
        assert!(!is_valid_segment_name(".ts"));
        assert!(!is_valid_segment_name("index.m3u8"));
        assert!(!is_valid_segment_name("a/b.ts"));
        assert!(!is_valid_segment_name("a\\b.ts"));
    }

    #[test]
    fn layout() {
        let storage = MediaStorage::new("/data/media");
        assert_eq!(
            storage.manifest_path(7, Resolution::P720),
            PathBuf::from("/data/media/hls/7/720p/index.m3u8")
        );
        assert_eq!(
            storage.segment_path(7, Resolution::P480, "480p_001.ts"),
            Some(PathBuf::from("/data/media/hls/7/480p/480p_001.ts"))
        );
        assert_eq!(storage.segment_path(7, Resolution::P480, "../x.ts"), None);
        assert_eq!(MediaStorage::source_relative("abc_movie.mp4"), "videos/abc_movie.mp4");
    }

    #[tokio::test]
    async fn removes_source_and_renditions() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path());
        storage.ensure_dirs().await.unwrap();

        let relative = MediaStorage::source_relative("clip.mp4");
        tokio::fs::write(storage.absolute(&relative), b"data").await.unwrap();
        tokio::fs::create_dir_all(storage.rendition_dir(3, Resolution::P480)).await.unwrap();
        tokio::fs::write(storage.manifest_path(3, Resolution::P480), b"#EXTM3U").await.unwrap();

        storage.remove_video_assets(3, &relative).await;

        assert!(!storage.absolute(&relative).exists());
        assert!(!storage.hls_dir(3).exists());

        // Second call is a no-op.
        storage.remove_video_assets(3, &relative).await;
    }
}
