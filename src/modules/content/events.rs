use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

pub const MAX_ATTEMPTS: u32 = 3;

/// Payload pushed onto the `default` queue after an upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscodeJob {
    pub id: Uuid,
    pub video_id: i64,
    /// Source path relative to the media root.
    pub source_path: String,
    #[serde(default)]
    pub attempts: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub enqueued_at: OffsetDateTime,
}

impl TranscodeJob {
    pub fn new(video_id: i64, source_path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            video_id,
            source_path: source_path.into(),
            attempts: 0,
            enqueued_at: OffsetDateTime::now_utc(),
        }
    }

    /// The same job with one more attempt recorded, or `None` once retries are exhausted.
    pub fn next_attempt(&self) -> Option<Self> {
        let attempts = self.attempts + 1;
        (attempts < MAX_ATTEMPTS).then(|| Self {
            attempts,
            enqueued_at: OffsetDateTime::now_utc(),
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_stop_after_max_attempts() {
        let job = TranscodeJob::new(1, "videos/a.mp4");
        let second = job.next_attempt().unwrap();
        let third = second.next_attempt().unwrap();

        assert_eq!(second.id, job.id);
        assert_eq!(third.attempts, 2);
        assert!(third.next_attempt().is_none());
    }

    #[test]
    fn attempts_default_to_zero() {
        let job: TranscodeJob = serde_json::from_str(
            r#"{"id":"8f14e45f-ceea-467e-a2c7-5f3b5e4a9d11","video_id":4,"source_path":"videos/x.mp4","enqueued_at":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(job.attempts, 0);
        assert_eq!(job.video_id, 4);
    }
}
