//! The detection loop.
//!
//! One job is a strictly sequential pull loop: extract a frame, classify it,
//! feed the segmenter, publish progress, wait, repeat. Per-frame failures
//! close open runs and the loop carries on; run-level failures fail the job.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::Instrument;

use emoclip_media::{
    compute_segment_stats, EmotionSegmenter, FrameSampler, FrameSource, MediaError,
};
use emoclip_ml_client::{FrameClassifier, MlError};
use emoclip_models::{
    Detection, DetectionRequest, Emotion, EmotionSegment, FrameImage, FrameObservation,
};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::failures::FailureTracker;
use crate::logging::JobLogger;
use crate::metrics;
use crate::tracker::JobTracker;

/// Consecutive frame failures logged before going quiet.
const MAX_LOGGED_FRAME_FAILURES: u32 = 3;

/// Why a single frame produced no observation.
#[derive(Debug)]
enum FrameFailure {
    Extract(MediaError),
    Classify(MlError),
    Timeout(Duration),
}

impl FrameFailure {
    fn reason(&self) -> &'static str {
        match self {
            FrameFailure::Extract(_) => "extract",
            FrameFailure::Classify(e) => e.reason(),
            FrameFailure::Timeout(_) => "timeout",
        }
    }

    /// Failures that would repeat on every remaining frame.
    fn into_fatal(self) -> Result<Self, WorkerError> {
        match self {
            FrameFailure::Classify(e) if e.is_fatal() => Err(WorkerError::Classifier(e)),
            FrameFailure::Extract(e @ (MediaError::FfmpegNotFound | MediaError::Cancelled)) => {
                Err(WorkerError::Media(e))
            }
            other => Ok(other),
        }
    }
}

impl std::fmt::Display for FrameFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameFailure::Extract(e) => write!(f, "frame extraction failed: {}", e),
            FrameFailure::Classify(e) => write!(f, "classification failed: {}", e),
            FrameFailure::Timeout(d) => write!(f, "classification timed out after {:?}", d),
        }
    }
}

/// Runs emotion detection jobs against a classifier.
#[derive(Clone)]
pub struct EmotionDetector {
    classifier: Arc<dyn FrameClassifier>,
    config: WorkerConfig,
}

impl EmotionDetector {
    pub fn new(classifier: Arc<dyn FrameClassifier>, config: WorkerConfig) -> Self {
        Self { classifier, config }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn classifier(&self) -> &Arc<dyn FrameClassifier> {
        &self.classifier
    }

    /// Run one detection job to completion.
    ///
    /// The outcome is also published through `tracker`: `completed` with the
    /// sorted segment list, or `error` with a readable cause and no segments.
    pub async fn run<S>(
        &self,
        request: &DetectionRequest,
        source: &S,
        cancel: watch::Receiver<bool>,
        tracker: &JobTracker,
    ) -> WorkerResult<Vec<EmotionSegment>>
    where
        S: FrameSource + ?Sized,
    {
        let logger = JobLogger::new(&tracker.job_id(), "emotion_detection");
        let span = logger.create_span();
        let started = Instant::now();

        let result = self
            .detect(request, source, cancel, tracker, &logger)
            .instrument(span)
            .await;

        match &result {
            Ok(segments) => {
                metrics::record_segments(segments);
                metrics::record_detection_completed(started.elapsed().as_secs_f64());
                tracker.complete(segments.clone());
                logger.log_completion(&format!(
                    "{} segments in {:.1}s",
                    segments.len(),
                    started.elapsed().as_secs_f64()
                ));
            }
            Err(e) => {
                metrics::record_detection_failed();
                tracker.fail(e.user_message());
                if e.is_cancelled() {
                    logger.log_warning("cancelled");
                } else if e.is_input_error() {
                    logger.log_warning(&format!("rejected input: {}", e));
                } else {
                    logger.log_error(&e.to_string());
                }
            }
        }

        result
    }

    async fn detect<S>(
        &self,
        request: &DetectionRequest,
        source: &S,
        mut cancel: watch::Receiver<bool>,
        tracker: &JobTracker,
        logger: &JobLogger,
    ) -> WorkerResult<Vec<EmotionSegment>>
    where
        S: FrameSource + ?Sized,
    {
        request.validate().map_err(WorkerError::InvalidRequest)?;
        let emotions = &request.emotions;
        let mut segmenter = EmotionSegmenter::new(emotions, self.config.segmentation())?;

        ensure_not_cancelled(&cancel)?;
        let mut sampler = FrameSampler::open(source, self.config.sample_interval_secs).await?;
        let total = sampler.total_frames();
        tracker.start_processing(total);
        logger.log_start(&format!(
            "{} frames for [{}]",
            total,
            emotions
                .iter()
                .map(|e| e.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));

        let mut failures = FailureTracker::new(MAX_LOGGED_FRAME_FAILURES);
        let mut decoded = 0usize;

        loop {
            ensure_not_cancelled(&cancel)?;
            let Some(frame) = sampler.next_frame().await else {
                break;
            };
            ensure_not_cancelled(&cancel)?;

            let outcome = match frame.image {
                Ok(image) => {
                    decoded += 1;
                    self.classify(&image, emotions, &mut cancel).await?
                }
                Err(e) => Err(FrameFailure::Extract(e)),
            };

            let failed = match outcome {
                Ok(detections) => {
                    segmenter.ingest(&FrameObservation::new(frame.timestamp, detections))?;
                    failures.record_success();
                    metrics::record_frame_classified();
                    false
                }
                Err(failure) => {
                    let failure = failure.into_fatal()?;
                    metrics::record_frame_failure(failure.reason());
                    if failures.record_failure() {
                        logger.log_warning(&format!(
                            "frame at {:.1}s skipped: {}",
                            frame.timestamp, failure
                        ));
                    }
                    segmenter.ingest_failure(frame.timestamp)?;
                    true
                }
            };

            tracker.frame_processed(frame.index + 1, failed);

            if sampler.remaining() > 0 && !self.config.classify_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.classify_delay) => {}
                    _ = wait_for_cancel(&mut cancel) => return Err(WorkerError::Cancelled),
                }
            }
        }

        if total > 0 && decoded == 0 {
            return Err(MediaError::invalid_video("No frame could be decoded").into());
        }

        let segments = segmenter.finalize();
        let stats = compute_segment_stats(&segments);
        for entry in &stats.per_emotion {
            logger.log_progress(&format!(
                "{}: {} segments, {:.1}s total, peak {:.2}",
                entry.emotion, entry.count, entry.total_secs, entry.peak_confidence
            ));
        }
        if failures.total_failures() > 0 {
            logger.log_warning(&format!(
                "{} of {} frames failed",
                failures.total_failures(),
                total
            ));
        }

        Ok(segments)
    }

    /// Classify one frame under the timeout, aborting on cancellation.
    ///
    /// The outer error is cancellation only; everything else is a frame outcome.
    async fn classify(
        &self,
        image: &FrameImage,
        emotions: &[Emotion],
        cancel: &mut watch::Receiver<bool>,
    ) -> WorkerResult<Result<Vec<Detection>, FrameFailure>> {
        let timeout = self.config.classify_timeout;
        let call = tokio::time::timeout(timeout, self.classifier.classify(image, emotions));

        tokio::select! {
            result = call => Ok(match result {
                Ok(Ok(detections)) => Ok(detections),
                Ok(Err(e)) => Err(FrameFailure::Classify(e)),
                Err(_) => Err(FrameFailure::Timeout(timeout)),
            }),
            _ = wait_for_cancel(cancel) => Err(WorkerError::Cancelled),
        }
    }
}

fn ensure_not_cancelled(cancel: &watch::Receiver<bool>) -> WorkerResult<()> {
    if *cancel.borrow() {
        return Err(WorkerError::Cancelled);
    }
    Ok(())
}

/// Resolves once the flag flips to `true`; never resolves if the sender is gone.
async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}
