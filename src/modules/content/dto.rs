use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use validator::Validate;

use super::model::Video;

/// Public representation returned by `GET /api/video/`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, ToSchema)]
pub struct VideoResponse {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub category: String,
}

impl From<Video> for VideoResponse {
    fn from(v: Video) -> Self {
        Self {
            id: v.id,
            created_at: v.created_at,
            title: v.title,
            description: v.description,
            thumbnail_url: v.thumbnail_url,
            category: v.category,
        }
    }
}

/// Text fields of the admin upload form.
#[derive(Debug, Default, Validate)]
pub struct CreateVideoForm {
    #[validate(length(min = 1, max = 255, message = "Ensure this field has between 1 and 255 characters."))]
    pub title: String,
    pub description: String,
    #[validate(url(message = "Enter a valid URL."))]
    pub thumbnail_url: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Ensure this field has between 1 and 100 characters."))]
    pub category: String,
}

impl CreateVideoForm {
    pub fn set_field(&mut self, name: &str, value: String) {
        match name {
            "title" => self.title = value.trim().to_string(),
            "description" => self.description = value,
            "category" => self.category = value.trim().to_string(),
            "thumbnail_url" => {
                let value = value.trim().to_string();
                self.thumbnail_url = (!value.is_empty()).then_some(value);
            }
            _ => {}
        }
    }
}

/// Documents the multipart body of the admin upload.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct UploadVideoForm {
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub category: String,
    #[schema(value_type = String, format = Binary)]
    pub video_file: Vec<u8>,
}
