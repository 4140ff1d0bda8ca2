use sqlx::PgPool;
use super::model::{Video, VideoStatus};
use anyhow::Result;

const VIDEO_COLUMNS: &str = "id, title, description, thumbnail_url, category, video_file, status, created_at";

pub struct ContentRepository;

impl ContentRepository {
    pub async fn create_video(
        pool: &PgPool,
        title: &str,
        description: &str,
        thumbnail_url: Option<&str>,
        category: &str,
        video_file: &str,
    ) -> Result<Video> {
        let video = sqlx::query_as::<_, Video>(&format!(
            r#"
            INSERT INTO videos (title, description, thumbnail_url, category, video_file)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {VIDEO_COLUMNS}
            "#
        ))
        .bind(title)
        .bind(description)
        .bind(thumbnail_url)
        .bind(category)
        .bind(video_file)
        .fetch_one(pool)
        .await?;

        Ok(video)
    }

    pub async fn get_video_by_id(pool: &PgPool, id: i64) -> Result<Option<Video>> {
        let video = sqlx::query_as::<_, Video>(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(video)
    }

    pub async fn list_videos(pool: &PgPool) -> Result<Vec<Video>> {
        let videos = sqlx::query_as::<_, Video>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(pool)
        .await?;
        Ok(videos)
    }

    /// Returns `false` when the video no longer exists.
    pub async fn update_status(pool: &PgPool, id: i64, status: VideoStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE videos SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_video(pool: &PgPool, id: i64) -> Result<Option<Video>> {
        let video = sqlx::query_as::<_, Video>(&format!(
            "DELETE FROM videos WHERE id = $1 RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(video)
    }
}
