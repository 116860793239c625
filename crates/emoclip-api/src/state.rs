//! Application state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, RwLock, Semaphore};
use tracing::{info, warn};

use emoclip_media::{FfmpegFrameSource, FrameSource};
use emoclip_ml_client::classifier_from_env;
use emoclip_models::{DetectionRequest, EmotionJob, JobId};
use emoclip_worker::{EmotionDetector, JobTracker, WorkerConfig};

use crate::config::ApiConfig;

/// Builds the frame source for an uploaded video.
pub type FrameSourceFactory =
    Arc<dyn Fn(&Path, watch::Receiver<bool>) -> Arc<dyn FrameSource> + Send + Sync>;

/// One submitted job.
#[derive(Debug)]
pub struct JobEntry {
    pub tracker: Arc<JobTracker>,
    pub cancel_tx: watch::Sender<bool>,
    pub video_path: PathBuf,
}

impl JobEntry {
    pub fn new(tracker: JobTracker, video_path: PathBuf) -> Self {
        let (cancel_tx, _rx) = watch::channel(false);
        Self {
            tracker: Arc::new(tracker),
            cancel_tx,
            video_path,
        }
    }

    pub fn snapshot(&self) -> EmotionJob {
        self.tracker.snapshot()
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub detector: EmotionDetector,
    jobs: Arc<RwLock<HashMap<JobId, Arc<JobEntry>>>>,
    job_slots: Arc<Semaphore>,
    source_factory: FrameSourceFactory,
}

impl AppState {
    /// Create new application state from the environment.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let worker_config = WorkerConfig::from_env();
        worker_config.validate()?;
        let classifier = classifier_from_env()?;
        info!(
            backend = classifier.name(),
            max_jobs = worker_config.max_concurrent_jobs,
            "Detector ready"
        );

        tokio::fs::create_dir_all(&config.upload_dir).await?;

        Ok(Self::with_detector(
            config,
            EmotionDetector::new(classifier, worker_config),
        ))
    }

    /// Create state around an existing detector, reading frames with FFmpeg.
    pub fn with_detector(config: ApiConfig, detector: EmotionDetector) -> Self {
        let worker = detector.config().clone();
        let job_slots = Arc::new(Semaphore::new(worker.max_concurrent_jobs.max(1)));
        let source_factory: FrameSourceFactory = Arc::new(
            move |path: &Path, cancel_rx: watch::Receiver<bool>| -> Arc<dyn FrameSource> {
                Arc::new(
                    FfmpegFrameSource::new(path)
                        .with_scale_width(worker.frame_width)
                        .with_jpeg_quality(worker.jpeg_quality)
                        .with_timeout(worker.frame_extract_timeout.as_secs())
                        .with_cancel(cancel_rx),
                )
            },
        );

        Self {
            config,
            detector,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            job_slots,
            source_factory,
        }
    }

    pub fn with_source_factory(mut self, factory: FrameSourceFactory) -> Self {
        self.source_factory = factory;
        self
    }

    pub async fn insert_job(&self, entry: Arc<JobEntry>) {
        let id = entry.tracker.job_id();
        self.jobs.write().await.insert(id, entry);
    }

    pub async fn job(&self, id: &JobId) -> Option<Arc<JobEntry>> {
        self.jobs.read().await.get(id).cloned()
    }

    pub async fn remove_job(&self, id: &JobId) -> Option<Arc<JobEntry>> {
        self.jobs.write().await.remove(id)
    }

    /// Forget finished jobs whose last update is older than the retention window.
    ///
    /// Uploads kept for retrying failed jobs are deleted with them. Returns the
    /// number of jobs dropped.
    pub async fn prune_finished_jobs(&self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(self.config.job_retention)
            .ok()
            .and_then(|retention| now.checked_sub_signed(retention))
        else {
            return 0;
        };

        let expired: Vec<Arc<JobEntry>> = {
            let mut jobs = self.jobs.write().await;
            let ids: Vec<JobId> = jobs
                .iter()
                .filter(|(_, entry)| {
                    let job = entry.snapshot();
                    job.is_terminal() && job.updated_at < cutoff
                })
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| jobs.remove(id)).collect()
        };

        for entry in &expired {
            remove_upload(&entry.video_path).await;
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "Pruned finished jobs");
        }
        expired.len()
    }

    /// Snapshots of every known job, newest first.
    pub async fn job_snapshots(&self) -> Vec<EmotionJob> {
        let mut jobs: Vec<EmotionJob> = self
            .jobs
            .read()
            .await
            .values()
            .map(|entry| entry.snapshot())
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Run detection for `entry` in the background once a job slot frees up.
    ///
    /// The outcome is published through the entry's tracker.
    pub fn spawn_detection(&self, entry: Arc<JobEntry>) {
        let state = self.clone();
        tokio::spawn(async move {
            let mut cancel_rx = entry.cancel_tx.subscribe();

            let permit = tokio::select! {
                permit = state.job_slots.clone().acquire_owned() => permit,
                _ = cancel_rx.wait_for(|cancelled| *cancelled) => {
                    entry.tracker.fail("cancelled");
                    return;
                }
            };
            let Ok(_permit) = permit else {
                entry.tracker.fail("Server is shutting down");
                return;
            };

            let request = DetectionRequest::new(entry.snapshot().emotions);
            let source = (state.source_factory)(&entry.video_path, cancel_rx.clone());
            let result = state
                .detector
                .run(&request, source.as_ref(), cancel_rx, &entry.tracker)
                .await;

            // Only failed jobs can be retried, so completed uploads are no longer needed
            if result.is_ok() {
                remove_upload(&entry.video_path).await;
            }
        });
    }
}

/// Delete an uploaded video, ignoring files that are already gone.
pub async fn remove_upload(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove upload");
        }
    }
}
