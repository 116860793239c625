//! Detection job handlers.

use std::path::Path;
use std::sync::Arc;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, Path as UrlPath, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::info;

use emoclip_models::{
    DetectionRequest, Emotion, EmotionJob, EmotionSegment, JobId, JobStatus,
};
use emoclip_worker::JobTracker;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::{remove_upload, AppState, JobEntry};

/// Multipart field carrying the video file.
const VIDEO_FIELD: &str = "video";
/// Multipart field carrying emotion codes; comma-separated and/or repeated.
const EMOTIONS_FIELD: &str = "emotions";

/// Upload a video and start detection.
///
/// The job is visible as `uploading` while the body streams to disk, then
/// detection runs in the background and the snapshot is returned with 202.
pub async fn create_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<EmotionJob>)> {
    tokio::fs::create_dir_all(&state.config.upload_dir).await?;

    let job_id = JobId::new();
    let tracker = JobTracker::new(EmotionJob::new(job_id.clone(), Vec::new()));
    let video_path = state.config.upload_dir.join(job_id.as_str());
    let entry = Arc::new(JobEntry::new(tracker, video_path));
    state.insert_job(Arc::clone(&entry)).await;

    let expected_len = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let (request, bytes) = match receive_upload(&entry, expected_len, &mut multipart).await {
        Ok(upload) => upload,
        Err(e) => {
            remove_upload(&entry.video_path).await;
            state.remove_job(&job_id).await;
            return Err(e);
        }
    };

    entry.tracker.set_emotions(request.emotions.clone());
    entry.tracker.upload_progress(100);
    metrics::record_job_submitted(bytes);
    info!(
        job_id = %job_id,
        bytes,
        emotions = ?request.emotions,
        "Job submitted"
    );

    let snapshot = entry.snapshot();
    state.spawn_detection(entry);
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

/// Consume the multipart body: stream the video to disk and collect emotions.
async fn receive_upload(
    entry: &JobEntry,
    expected_len: Option<u64>,
    multipart: &mut Multipart,
) -> ApiResult<(DetectionRequest, u64)> {
    let mut emotion_lists: Vec<String> = Vec::new();
    let mut received: Option<u64> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            VIDEO_FIELD => {
                if received.is_some() {
                    return Err(ApiError::bad_request("Only one video can be uploaded per job"));
                }
                let file_name = field.file_name().unwrap_or("video").to_string();
                entry.tracker.start_upload(&file_name);
                let written =
                    write_video(&mut field, &entry.video_path, expected_len, &entry.tracker)
                        .await?;
                received = Some(written);
            }
            EMOTIONS_FIELD => emotion_lists.push(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }

    let bytes = match received {
        Some(0) => return Err(ApiError::bad_request("Uploaded video is empty")),
        Some(bytes) => bytes,
        None => return Err(ApiError::bad_request("Missing 'video' file field")),
    };
    let request = DetectionRequest::parse(&emotion_lists.join(",")).map_err(ApiError::BadRequest)?;

    Ok((request, bytes))
}

async fn write_video(
    field: &mut Field<'_>,
    path: &Path,
    expected_len: Option<u64>,
    tracker: &JobTracker,
) -> ApiResult<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        if let Some(total) = expected_len {
            tracker.upload_progress(upload_percent(written, total));
        }
    }
    file.flush().await?;

    Ok(written)
}

/// Upload progress, held below 100 until the body is fully received.
fn upload_percent(written: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (written.saturating_mul(100) / total).min(99) as u8
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::bad_request(e.body_text())
    }
}

async fn find_job(state: &AppState, job_id: &str) -> ApiResult<Arc<JobEntry>> {
    state
        .job(&JobId::from_string(job_id))
        .await
        .ok_or_else(|| ApiError::not_found(format!("Job {} not found", job_id)))
}

/// List all known jobs, newest first.
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<EmotionJob>> {
    Json(state.job_snapshots().await)
}

/// Current job snapshot.
pub async fn get_job(
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<String>,
) -> ApiResult<Json<EmotionJob>> {
    let entry = find_job(&state, &job_id).await?;
    Ok(Json(entry.snapshot()))
}

#[derive(Debug, Deserialize)]
pub struct SegmentQuery {
    pub emotion: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentsResponse {
    pub job_id: JobId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<Emotion>,
    pub segments: Vec<EmotionSegment>,
}

/// Segments of a completed job, optionally filtered to one emotion.
pub async fn get_segments(
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<String>,
    Query(query): Query<SegmentQuery>,
) -> ApiResult<Json<SegmentsResponse>> {
    let entry = find_job(&state, &job_id).await?;
    let emotion = query
        .emotion
        .as_deref()
        .map(Emotion::from_label)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let job = entry.snapshot();
    if job.status != JobStatus::Completed {
        return Err(ApiError::conflict(format!(
            "Job {} is {}, segments are available once it completes",
            job.id, job.status
        )));
    }

    let segments = job
        .segments
        .unwrap_or_default()
        .into_iter()
        .filter(|s| emotion.map_or(true, |e| s.emotion == e))
        .collect();

    Ok(Json(SegmentsResponse {
        job_id: job.id,
        emotion,
        segments,
    }))
}

/// Cancel a running job, or forget a finished one.
///
/// Either way the uploaded video is removed.
pub async fn delete_job(
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<String>,
) -> ApiResult<Response> {
    let entry = find_job(&state, &job_id).await?;
    let was_terminal = entry.snapshot().is_terminal();

    entry.cancel_tx.send_replace(true);
    remove_upload(&entry.video_path).await;

    if was_terminal {
        state.remove_job(&entry.tracker.job_id()).await;
        info!(job_id = %job_id, "Job removed");
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    entry.tracker.fail("cancelled");
    metrics::record_job_cancelled();
    info!(job_id = %job_id, "Job cancelled");
    Ok(Json(entry.snapshot()).into_response())
}

/// Restart a failed job from scratch on the same upload.
pub async fn retry_job(
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<String>,
) -> ApiResult<(StatusCode, Json<EmotionJob>)> {
    let entry = find_job(&state, &job_id).await?;

    let status = entry.snapshot().status;
    if status != JobStatus::Error {
        return Err(ApiError::conflict(format!(
            "Only failed jobs can be retried; job {} is {}",
            job_id, status
        )));
    }
    if !tokio::fs::try_exists(&entry.video_path).await.unwrap_or(false) {
        return Err(ApiError::Gone(format!(
            "The upload for job {} is no longer available",
            job_id
        )));
    }

    entry.cancel_tx.send_replace(false);
    if !entry.tracker.reset_for_retry() {
        return Err(ApiError::conflict(format!("Job {} changed state", job_id)));
    }

    metrics::record_job_retried();
    info!(job_id = %job_id, "Job retried");
    let snapshot = entry.snapshot();
    state.spawn_detection(entry);
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_percent() {
        assert_eq!(upload_percent(0, 1000), 0);
        assert_eq!(upload_percent(500, 1000), 50);
        assert_eq!(upload_percent(1000, 1000), 99);
        assert_eq!(upload_percent(1200, 1000), 99);
        assert_eq!(upload_percent(10, 0), 0);
    }
}
