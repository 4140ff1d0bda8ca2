use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use crate::common::error::AppError;
use crate::modules::content::handler::parse_video_id;
use crate::modules::content::service::ContentService;
use crate::state::AppState;
use std::io;
use std::path::Path as FsPath;
use tokio_util::io::ReaderStream;

const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const SEGMENT_CONTENT_TYPE: &str = "video/MP2T";
const MANIFEST_NOT_FOUND: &str = "Video or manifest not found.";

/// Streams a file from the media volume without buffering it in memory.
async fn stream_file(path: &FsPath, content_type: &'static str, missing: &str) -> Result<Response, AppError> {
    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(missing.to_string()));
        }
        Err(e) => return Err(anyhow::Error::from(e).into()),
    };
    let len = file.metadata().await.map_err(anyhow::Error::from)?.len();

    let body = Body::from_stream(ReaderStream::new(file));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, len)
        .body(body)
        .map_err(|e| anyhow::Error::from(e).into())
}

/// HLS playlist of one rendition
#[utoipa::path(
    get,
    path = "/api/video/{movie_id}/{resolution}/index.m3u8",
    params(
        ("movie_id" = i64, Path, description = "Video ID"),
        ("resolution" = String, Path, description = "480p, 720p or 1080p")
    ),
    responses(
        (status = 200, description = "HLS manifest"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Video or manifest not found")
    ),
    tag = "Content",
    security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn serve_manifest(
    State(state): State<AppState>,
    Path((movie_id, resolution)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let movie_id = parse_video_id(&movie_id, MANIFEST_NOT_FOUND)?;
    let path = ContentService::manifest_path(&state, movie_id, &resolution).await?;
    stream_file(&path, MANIFEST_CONTENT_TYPE, MANIFEST_NOT_FOUND).await
}

/// One MPEG-TS segment referenced by the manifest
#[utoipa::path(
    get,
    path = "/api/video/{movie_id}/{resolution}/{segment}/",
    params(
        ("movie_id" = i64, Path, description = "Video ID"),
        ("resolution" = String, Path, description = "480p, 720p or 1080p"),
        ("segment" = String, Path, description = "Segment file name, e.g. 720p_000.ts")
    ),
    responses(
        (status = 200, description = "Segment bytes"),
        (status = 400, description = "Invalid segment name"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Segment not found")
    ),
    tag = "Content",
    security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn serve_segment(
    State(state): State<AppState>,
    Path((movie_id, resolution, segment)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let movie_id = parse_video_id(&movie_id, "Segment not found.")?;
    let path = ContentService::segment_path(&state, movie_id, &resolution, &segment).await?;
    stream_file(&path, SEGMENT_CONTENT_TYPE, "Segment not found.").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::AppConfig;
    use crate::modules::content::model::Resolution;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn app(config: AppConfig) -> Router {
        Router::new()
            .route("/video/{movie_id}/{resolution}/index.m3u8", get(serve_manifest))
            .route("/video/{movie_id}/{resolution}/{segment}", get(serve_segment))
            .with_state(AppState::for_tests(config))
    }

    async fn status_of(config: AppConfig, uri: &str) -> StatusCode {
        app(config)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn invalid_segment_name_is_a_bad_request() {
        let status = status_of(AppConfig::for_tests(), "/video/1/720p/evil.txt").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unconfigured_resolution_is_not_found() {
        let mut config = AppConfig::for_tests();
        config.hls_resolutions = vec![Resolution::P480];

        assert_eq!(status_of(config.clone(), "/video/1/1080p/index.m3u8").await, StatusCode::NOT_FOUND);
        assert_eq!(status_of(config, "/video/1/1080p/1080p_000.ts").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn non_numeric_movie_id_is_not_found() {
        let status = status_of(AppConfig::for_tests(), "/video/abc/720p/index.m3u8").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
