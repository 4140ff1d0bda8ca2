use crate::common::shutdown::shutdown_signal;
use crate::infrastructure::queue::redis_queue::JobQueue;
use crate::modules::content::events::{TranscodeJob, MAX_ATTEMPTS};
use crate::modules::content::model::VideoStatus;
use crate::modules::content::repository::ContentRepository;
use crate::modules::content::service::ContentService;
use crate::state::AppState;
use crate::workers::ffmpeg;
use std::time::Duration;
use tracing::{error, info, warn};

const POLL_TIMEOUT_SECS: f64 = 5.0;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

pub async fn start_transcoder_worker(state: AppState) {
    info!("🎥 Transcoder worker listening on '{}'", state.queue.key());
    if let Err(e) = state.queue.recover_in_flight().await {
        error!("Could not recover unfinished jobs: {}", e);
    }
    state.queue.log_depth().await;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let payload = tokio::select! {
            _ = &mut shutdown => break,
            popped = state.queue.dequeue_raw(POLL_TIMEOUT_SECS) => popped,
        };

        let payload = match payload {
            Ok(Some(payload)) => payload,
            Ok(None) => continue,
            Err(e) => {
                error!("Queue unavailable: {}", e);
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };

        // Dropping the job future kills ffmpeg; the payload goes back on the queue.
        let finished = tokio::select! {
            _ = &mut shutdown => false,
            _ = handle_payload(&state, &payload) => true,
        };

        if !finished {
            warn!("Interrupted mid-job, returning it to the queue");
            if let Err(e) = state.queue.release(&payload).await {
                error!("Could not release job, it will be recovered on next start: {}", e);
            }
            break;
        }
        if let Err(e) = state.queue.ack(&payload).await {
            error!("Could not ack job: {}", e);
        }
    }

    info!("Transcoder worker stopped");
}

/// Jobs run one at a time; ffmpeg already saturates the CPU.
async fn handle_payload(state: &AppState, payload: &str) {
    let job: TranscodeJob = match JobQueue::decode(payload) {
        Ok(job) => job,
        Err(e) => {
            error!("Discarding malformed job: {}", e);
            if let Err(e) = state.queue.push_failed(payload, &e.to_string()).await {
                error!("Could not park malformed job: {}", e);
            }
            return;
        }
    };

    info!(
        "📦 Job {} for video {} (attempt {}/{})",
        job.id,
        job.video_id,
        job.attempts + 1,
        MAX_ATTEMPTS
    );

    match process_job(state, &job).await {
        Ok(true) => info!("✅ Video {} ready", job.video_id),
        Ok(false) => {}
        Err(e) => {
            error!("❌ Job {} failed: {:#}", job.id, e);
            retry_or_fail(state, &job, &e.to_string()).await;
        }
    }
}

/// What happens to a job whose attempt just failed.
#[derive(Debug, PartialEq)]
enum FailureAction {
    Retry(TranscodeJob),
    GiveUp,
}

fn failure_action(job: &TranscodeJob) -> FailureAction {
    match job.next_attempt() {
        Some(next) => FailureAction::Retry(next),
        None => FailureAction::GiveUp,
    }
}

async fn retry_or_fail(state: &AppState, job: &TranscodeJob, reason: &str) {
    if let FailureAction::Retry(next) = failure_action(job) {
        match state.queue.enqueue(&next).await {
            Ok(()) => {
                warn!("Requeued job {} (attempt {}/{})", next.id, next.attempts + 1, MAX_ATTEMPTS);
                return;
            }
            Err(e) => error!("Could not requeue job {}: {}", job.id, e),
        }
    }

    let payload = serde_json::to_string(job).unwrap_or_default();
    if let Err(e) = state.queue.push_failed(&payload, reason).await {
        error!("Could not park job {}: {}", job.id, e);
    }
    if let Err(e) = ContentRepository::update_status(&state.db, job.video_id, VideoStatus::Failed).await {
        error!("Could not mark video {} as failed: {}", job.video_id, e);
    }
    ContentService::invalidate_list(state).await;
}

/// Returns `Ok(false)` when the video was deleted before the job ran.
async fn process_job(state: &AppState, job: &TranscodeJob) -> anyhow::Result<bool> {
    if !ContentRepository::update_status(&state.db, job.video_id, VideoStatus::Processing).await? {
        warn!("Video {} no longer exists, skipping job {}", job.video_id, job.id);
        return Ok(false);
    }

    let source = state.media.absolute(&job.source_path);
    if !tokio::fs::try_exists(&source).await? {
        return Err(anyhow::anyhow!("Source file {} is missing", source.display()));
    }

    for resolution in &state.config.hls_resolutions {
        let out_dir = state.media.rendition_dir(job.video_id, *resolution);
        ffmpeg::transcode_rendition(&state.config.ffmpeg_bin, &source, &out_dir, *resolution).await?;
    }

    if !ContentRepository::update_status(&state.db, job.video_id, VideoStatus::Ready).await? {
        warn!("Video {} was deleted while transcoding", job.video_id);
        state.media.remove_video_assets(job.video_id, &job.source_path).await;
        return Ok(false);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::AppConfig;
    use crate::infrastructure::db::pool::DbPool;

    #[test]
    fn failed_jobs_retry_until_the_third_attempt() {
        let first = TranscodeJob::new(9, "videos/a.mp4");

        let FailureAction::Retry(second) = failure_action(&first) else {
            panic!("first failure should retry");
        };
        let FailureAction::Retry(third) = failure_action(&second) else {
            panic!("second failure should retry");
        };
        assert_eq!(third.attempts, 2);
        assert_eq!(third.id, first.id);
        assert_eq!(failure_action(&third), FailureAction::GiveUp);
    }

    async fn insert_video(db: &DbPool, source: &str) -> i64 {
        ContentRepository::create_video(db, "Clip", "", None, "Nature", source)
            .await
            .unwrap()
            .id
    }

    async fn status_of(db: &DbPool, id: i64) -> VideoStatus {
        ContentRepository::get_video_by_id(db, id).await.unwrap().unwrap().status
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs PostgreSQL via DATABASE_URL"]
    async fn job_for_deleted_video_is_skipped(db: DbPool) {
        let state = AppState::for_tests_with_pool(AppConfig::for_tests(), db);
        let job = TranscodeJob::new(4242, "videos/gone.mp4");

        assert!(!process_job(&state, &job).await.unwrap());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs PostgreSQL via DATABASE_URL"]
    async fn missing_source_fails_the_attempt(db: DbPool) {
        let media = tempfile::tempdir().unwrap();
        let mut config = AppConfig::for_tests();
        config.media_root = media.path().to_path_buf();
        let state = AppState::for_tests_with_pool(config, db.clone());

        let id = insert_video(&db, "videos/missing.mp4").await;
        let job = TranscodeJob::new(id, "videos/missing.mp4");

        assert!(process_job(&state, &job).await.is_err());
        assert_eq!(status_of(&db, id).await, VideoStatus::Processing);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs PostgreSQL via DATABASE_URL"]
    async fn exhausted_job_marks_video_failed(db: DbPool) {
        let state = AppState::for_tests_with_pool(AppConfig::for_tests(), db.clone());
        let id = insert_video(&db, "videos/broken.mp4").await;

        let mut job = TranscodeJob::new(id, "videos/broken.mp4");
        job.attempts = MAX_ATTEMPTS - 1;
        retry_or_fail(&state, &job, "ffmpeg exited with 1").await;

        assert_eq!(status_of(&db, id).await, VideoStatus::Failed);
    }
}
