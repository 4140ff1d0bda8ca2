use crate::common::error::{field_error, AppError};
use crate::common::response::{ApiSuccess, DetailResponse};
use crate::common::upload::{sanitize_file_name, stream_to_disk};
use crate::infrastructure::storage::media::MediaStorage;
use crate::modules::content::dto::*;
use crate::modules::content::model::Video;
use crate::modules::content::service::ContentService;
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

/// Path ids that are not integers address nothing.
pub fn parse_video_id(raw: &str, not_found: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::NotFound(not_found.to_string()))
}

/// List every video, newest first
#[utoipa::path(
    get,
    path = "/api/video/",
    responses(
        (status = 200, description = "List Videos", body = Vec<VideoResponse>),
        (status = 401, description = "Not authenticated", body = DetailResponse)
    ),
    tag = "Content",
    security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn list_videos(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let videos = ContentService::list_videos(&state).await?;
    Ok(ApiSuccess(videos, StatusCode::OK))
}

// --- ADMIN ---

#[utoipa::path(
    get,
    path = "/admin/videos",
    responses(
        (status = 200, description = "All videos with processing status", body = Vec<Video>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Staff only")
    ),
    tag = "Admin",
    security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn admin_list_videos(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let videos = ContentService::list_videos_admin(&state).await?;
    Ok(ApiSuccess(videos, StatusCode::OK))
}

/// Upload a source video; transcoding starts in the background
#[utoipa::path(
    post,
    path = "/admin/videos",
    request_body(content = UploadVideoForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Video stored and queued for transcoding", body = Video),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Staff only"),
        (status = 503, description = "Transcode could not be scheduled")
    ),
    tag = "Admin",
    security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form = CreateVideoForm::default();
    let mut stored: Option<String> = None;

    let parsed: Result<(), AppError> = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();

            if name == "video_file" {
                if stored.is_some() {
                    return Err(AppError::Validation(field_error(
                        "video_file",
                        "Only one file may be submitted.",
                    )));
                }
                let original = field.file_name().unwrap_or("upload").to_string();
                let file_name = format!("{}_{}", Uuid::new_v4(), sanitize_file_name(&original));
                let relative = MediaStorage::source_relative(&file_name);
                let dest = state.media.absolute(&relative);

                if let Err(e) = stream_to_disk(field, &dest).await {
                    warn!("Rejected upload '{}': {}", original, e);
                    return Err(AppError::Validation(field_error("video_file", &e.to_string())));
                }
                stored = Some(relative);
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Malformed field '{}': {}", name, e)))?;
                form.set_field(&name, value);
            }
        }

        form.validate()?;
        if stored.is_none() {
            return Err(AppError::Validation(field_error("video_file", "No file was submitted.")));
        }
        Ok(())
    }
    .await;

    if let Err(e) = parsed {
        if let Some(relative) = &stored {
            state.media.remove_source(relative).await;
        }
        return Err(e);
    }

    let Some(relative) = stored else {
        return Err(AppError::Validation(field_error("video_file", "No file was submitted.")));
    };
    info!("Upload stored at {}", relative);

    let video = ContentService::create_video(&state, form, &relative).await?;
    Ok(ApiSuccess(video, StatusCode::CREATED))
}

#[utoipa::path(
    delete,
    path = "/admin/videos/{id}",
    params(
        ("id" = i64, Path, description = "Video ID")
    ),
    responses(
        (status = 204, description = "Video and its files deleted"),
        (status = 404, description = "Video Not Found", body = DetailResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn delete_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_video_id(&id, "Video not found.")?;
    ContentService::delete_video(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
