use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "video_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

/// HLS rendition ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Resolution {
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::P480 => "480p",
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
        }
    }

    /// Target height; width follows the source aspect ratio.
    pub fn height(&self) -> u32 {
        match self {
            Resolution::P480 => 480,
            Resolution::P720 => 720,
            Resolution::P1080 => 1080,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "480p" => Ok(Resolution::P480),
            "720p" => Ok(Resolution::P720),
            "1080p" => Ok(Resolution::P1080),
            other => Err(format!("unsupported resolution '{}'", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, ToSchema)]
pub struct Video {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub category: String,
    /// Path of the uploaded source, relative to the media root.
    pub video_file: String,
    pub status: VideoStatus,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_parsing() {
        assert_eq!("480p".parse::<Resolution>().unwrap(), Resolution::P480);
        assert_eq!(" 1080P ".parse::<Resolution>().unwrap(), Resolution::P1080);
        assert!("360p".parse::<Resolution>().is_err());
        assert_eq!(Resolution::P720.to_string(), "720p");
        assert_eq!(Resolution::P720.height(), 720);
    }

    #[test]
    fn resolution_serializes_as_label() {
        assert_eq!(serde_json::to_string(&Resolution::P1080).unwrap(), "\"1080p\"");
        assert_eq!(serde_json::to_string(&VideoStatus::Processing).unwrap(), "\"processing\"");
    }
}
