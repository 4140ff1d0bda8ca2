use super::dto::{CreateVideoForm, VideoResponse};
use super::events::TranscodeJob;
use super::model::{Resolution, Video, VideoStatus};
use super::repository::ContentRepository;
use crate::common::error::AppError;
use crate::state::AppState;
use anyhow::Result;
use redis::AsyncCommands;
use std::path::PathBuf;
use tracing::{error, info, warn};

const VIDEO_LIST_CACHE_KEY: &str = "videoflix:videos:list";

pub struct ContentService;

impl ContentService {
    // --- CACHE ---

    async fn cached_list(state: &AppState) -> Result<Option<Vec<VideoResponse>>> {
        let mut conn = state.cache.get_conn().await?;
        let raw: Option<String> = conn.get(VIDEO_LIST_CACHE_KEY).await?;
        Ok(match raw {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        })
    }

    async fn store_list(state: &AppState, videos: &[VideoResponse]) -> Result<()> {
        let mut conn = state.cache.get_conn().await?;
        let json = serde_json::to_string(videos)?;
        let _: () = conn
            .set_ex(VIDEO_LIST_CACHE_KEY, json, state.config.video_cache_ttl_secs.max(1))
            .await?;
        Ok(())
    }

    pub async fn invalidate_list(state: &AppState) {
        let result: Result<()> = async {
            let mut conn = state.cache.get_conn().await?;
            let _: i64 = conn.del(VIDEO_LIST_CACHE_KEY).await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            warn!("Could not invalidate video list cache: {}", e);
        }
    }

    // --- VIDEOS ---

    /// Newest first. Served from the cache when possible; cache errors fall back to the database.
    pub async fn list_videos(state: &AppState) -> Result<Vec<VideoResponse>> {
        match Self::cached_list(state).await {
            Ok(Some(videos)) => return Ok(videos),
            Ok(None) => {}
            Err(e) => warn!("Video cache unavailable: {}", e),
        }

        let videos: Vec<VideoResponse> = ContentRepository::list_videos(&state.db)
            .await?
            .into_iter()
            .map(VideoResponse::from)
            .collect();

        if let Err(e) = Self::store_list(state, &videos).await {
            warn!("Could not cache video list: {}", e);
        }
        Ok(videos)
    }

    pub async fn list_videos_admin(state: &AppState) -> Result<Vec<Video>> {
        ContentRepository::list_videos(&state.db).await
    }

    /// Persists an uploaded video and schedules its transcode. The stored
    /// source is removed again when no row could be created for it.
    pub async fn create_video(state: &AppState, form: CreateVideoForm, video_file: &str) -> Result<Video, AppError> {
        let created = ContentRepository::create_video(
            &state.db,
            &form.title,
            &form.description,
            form.thumbnail_url.as_deref(),
            &form.category,
            video_file,
        )
        .await;
        let video = match created {
            Ok(video) => video,
            Err(e) => {
                state.media.remove_source(video_file).await;
                return Err(e.into());
            }
        };
        info!("Video {} saved ({})", video.id, video.video_file);

        Self::invalidate_list(state).await;

        let job = TranscodeJob::new(video.id, &video.video_file);
        if let Err(e) = state.queue.enqueue(&job).await {
            error!("Could not enqueue transcode for video {}: {}", video.id, e);
            ContentRepository::update_status(&state.db, video.id, VideoStatus::Failed).await?;
            return Err(AppError::ServiceUnavailable(
                "Video saved but transcoding could not be scheduled.".to_string(),
            ));
        }
        info!("Queued transcode job {} for video {}", job.id, video.id);

        Ok(video)
    }

    /// Deletes the row, then the source file and every rendition.
    pub async fn delete_video(state: &AppState, id: i64) -> Result<(), AppError> {
        let video = ContentRepository::delete_video(&state.db, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Video not found.".to_string()))?;

        state.media.remove_video_assets(video.id, &video.video_file).await;
        Self::invalidate_list(state).await;
        info!("Video {} deleted", video.id);
        Ok(())
    }

    // --- HLS ---

    fn not_found() -> AppError {
        AppError::NotFound("Video or manifest not found.".to_string())
    }

    async fn rendition(state: &AppState, video_id: i64, resolution: &str) -> Result<Resolution, AppError> {
        let resolution: Resolution = resolution.parse().map_err(|_| Self::not_found())?;
        if !state.config.hls_resolutions.contains(&resolution) {
            return Err(Self::not_found());
        }
        if ContentRepository::get_video_by_id(&state.db, video_id).await?.is_none() {
            return Err(Self::not_found());
        }
        Ok(resolution)
    }

    pub async fn manifest_path(state: &AppState, video_id: i64, resolution: &str) -> Result<PathBuf, AppError> {
        let resolution = Self::rendition(state, video_id, resolution).await?;
        Ok(state.media.manifest_path(video_id, resolution))
    }

    pub async fn segment_path(
        state: &AppState,
        video_id: i64,
        resolution: &str,
        segment: &str,
    ) -> Result<PathBuf, AppError> {
        if !crate::infrastructure::storage::media::is_valid_segment_name(segment) {
            return Err(AppError::BadRequest("Invalid segment name.".to_string()));
        }
        let resolution = Self::rendition(state, video_id, resolution).await?;
        state
            .media
            .segment_path(video_id, resolution, segment)
            .ok_or_else(|| AppError::BadRequest("Invalid segment name.".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::AppConfig;
    use crate::infrastructure::db::pool::DbPool;

    fn state_in(media: &std::path::Path, db: DbPool) -> AppState {
        let mut config = AppConfig::for_tests();
        config.media_root = media.to_path_buf();
        AppState::for_tests_with_pool(config, db)
    }

    fn form(title: &str) -> CreateVideoForm {
        CreateVideoForm {
            title: title.to_string(),
            category: "Nature".to_string(),
            ..Default::default()
        }
    }

    // Redis is unreachable in these tests, so the cache is always bypassed.

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs PostgreSQL via DATABASE_URL"]
    async fn list_is_served_from_database_without_cache(db: DbPool) {
        let media = tempfile::tempdir().unwrap();
        let state = state_in(media.path(), db.clone());
        ContentRepository::create_video(&db, "Old", "", None, "Nature", "videos/old.mp4").await.unwrap();
        ContentRepository::create_video(&db, "New", "", None, "Nature", "videos/new.mp4").await.unwrap();

        let videos = ContentService::list_videos(&state).await.unwrap();

        let titles: Vec<&str> = videos.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, vec!["New", "Old"]);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs PostgreSQL via DATABASE_URL"]
    async fn unschedulable_video_is_marked_failed(db: DbPool) {
        let media = tempfile::tempdir().unwrap();
        let state = state_in(media.path(), db.clone());

        let result = ContentService::create_video(&state, form("Ocean"), "videos/ocean.mp4").await;
        assert!(matches!(result, Err(AppError::ServiceUnavailable(_))));

        let videos = ContentRepository::list_videos(&db).await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].status, VideoStatus::Failed);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs PostgreSQL via DATABASE_URL"]
    async fn delete_removes_row_and_files(db: DbPool) {
        let media = tempfile::tempdir().unwrap();
        let state = state_in(media.path(), db.clone());
        let video = ContentRepository::create_video(&db, "Clip", "", None, "Nature", "videos/clip.mp4")
            .await
            .unwrap();

        let source = state.media.absolute(&video.video_file);
        let rendition = state.media.rendition_dir(video.id, Resolution::P480);
        tokio::fs::create_dir_all(source.parent().unwrap()).await.unwrap();
        tokio::fs::create_dir_all(&rendition).await.unwrap();
        tokio::fs::write(&source, b"mp4").await.unwrap();
        tokio::fs::write(rendition.join("index.m3u8"), b"#EXTM3U").await.unwrap();

        ContentService::delete_video(&state, video.id).await.unwrap();

        assert!(ContentRepository::get_video_by_id(&db, video.id).await.unwrap().is_none());
        assert!(!source.exists());
        assert!(!state.media.hls_dir(video.id).exists());
        assert!(matches!(
            ContentService::delete_video(&state, video.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs PostgreSQL via DATABASE_URL"]
    async fn manifest_of_unknown_video_is_not_found(db: DbPool) {
        let media = tempfile::tempdir().unwrap();
        let state = state_in(media.path(), db);

        let result = ContentService::manifest_path(&state, 777, "480p").await;
        assert!(matches!(result, Err(AppError::NotFound(m)) if m == "Video or manifest not found."));
    }
}
