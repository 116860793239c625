//! End-to-end tests for the detection loop with scripted frames and scores.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use emoclip_media::{FrameSource, MediaError, MediaResult};
use emoclip_ml_client::{FrameClassifier, MlError, MlResult};
use emoclip_models::{
    Detection, DetectionRequest, Emotion, EmotionJob, FrameImage, JobId, JobStatus,
};
use emoclip_worker::{EmotionDetector, JobTracker, WorkerConfig, WorkerError};

/// Encodes the timestamp into the frame bytes so the classifier can look it up.
struct ScriptedSource {
    duration: f64,
    broken: Vec<f64>,
}

impl ScriptedSource {
    fn new(duration: f64) -> Self {
        Self {
            duration,
            broken: Vec::new(),
        }
    }
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn duration(&self) -> MediaResult<f64> {
        Ok(self.duration)
    }

    async fn frame_at(&self, timestamp: f64) -> MediaResult<FrameImage> {
        if self.broken.contains(&timestamp) {
            return Err(MediaError::invalid_video("corrupt packet"));
        }
        Ok(FrameImage::jpeg(timestamp.to_string().into_bytes()))
    }
}

enum Reply {
    Scores(Vec<(Emotion, f64)>),
    Fail(fn() -> MlError),
    Hang,
}

#[derive(Default)]
struct ScriptedClassifier {
    replies: Mutex<HashMap<String, Reply>>,
    calls: AtomicUsize,
    cancel_on_call: Option<(usize, watch::Sender<bool>)>,
}

impl ScriptedClassifier {
    fn reply(self, timestamp: f64, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(timestamp.to_string(), reply);
        self
    }

    fn scores(self, timestamp: f64, scores: &[(Emotion, f64)]) -> Self {
        self.reply(timestamp, Reply::Scores(scores.to_vec()))
    }
}

#[async_trait]
impl FrameClassifier for ScriptedClassifier {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn classify(&self, frame: &FrameImage, emotions: &[Emotion]) -> MlResult<Vec<Detection>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((n, tx)) = &self.cancel_on_call {
            if *n == call {
                tx.send(true).unwrap();
            }
        }

        let key = String::from_utf8(frame.bytes.clone()).unwrap();
        let reply = match self.replies.lock().unwrap().get(&key) {
            None => return Ok(Vec::new()),
            Some(Reply::Fail(make)) => return Err(make()),
            Some(Reply::Hang) => None,
            Some(Reply::Scores(scores)) => Some(
                scores
                    .iter()
                    .filter(|(e, _)| emotions.contains(e))
                    .map(|&(e, c)| Detection::new(e, c))
                    .collect(),
            ),
        };

        match reply {
            Some(detections) => Ok(detections),
            None => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn health_check(&self) -> MlResult<bool> {
        Ok(true)
    }
}

fn test_config() -> WorkerConfig {
    WorkerConfig {
        classify_delay: Duration::ZERO,
        classify_timeout: Duration::from_millis(100),
        ..Default::default()
    }
}

fn tracker(emotions: &[Emotion]) -> JobTracker {
    JobTracker::new(EmotionJob::new(JobId::new(), emotions.to_vec()))
}

fn spans(segments: &[emoclip_models::EmotionSegment]) -> Vec<(Emotion, f64, f64, f64)> {
    segments
        .iter()
        .map(|s| (s.emotion, s.start_time, s.end_time, s.confidence))
        .collect()
}

async fn run(
    classifier: ScriptedClassifier,
    source: &ScriptedSource,
    emotions: &[Emotion],
) -> (Result<Vec<emoclip_models::EmotionSegment>, WorkerError>, EmotionJob) {
    let detector = EmotionDetector::new(Arc::new(classifier), test_config());
    let tracker = tracker(emotions);
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let request = DetectionRequest::new(emotions.to_vec());

    let result = detector.run(&request, source, cancel_rx, &tracker).await;
    (result, tracker.snapshot())
}

#[tokio::test]
async fn joy_then_fear_example() {
    let classifier = ScriptedClassifier::default()
        .scores(0.0, &[(Emotion::Joy, 0.9)])
        .scores(2.0, &[(Emotion::Joy, 0.9)])
        .scores(4.0, &[(Emotion::Joy, 0.2)])
        .scores(6.0, &[(Emotion::Fear, 0.7)])
        .scores(8.0, &[(Emotion::Fear, 0.8)]);

    let (result, job) = run(
        classifier,
        &ScriptedSource::new(10.0),
        &[Emotion::Joy, Emotion::Fear],
    )
    .await;

    let segments = result.unwrap();
    assert_eq!(
        spans(&segments),
        vec![
            (Emotion::Joy, 0.0, 4.0, 0.9),
            (Emotion::Fear, 6.0, 10.0, 0.8)
        ]
    );
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert_eq!(job.frames_total, 5);
    assert_eq!(job.frames_processed, 5);
    assert_eq!(job.segments.as_deref(), Some(segments.as_slice()));
}

#[tokio::test]
async fn failed_classification_splits_run() {
    let mut classifier = ScriptedClassifier::default();
    for t in [0.0, 2.0, 6.0, 8.0] {
        classifier = classifier.scores(t, &[(Emotion::Joy, 0.8)]);
    }
    let classifier = classifier.reply(4.0, Reply::Fail(|| MlError::RateLimited));

    let (result, job) = run(classifier, &ScriptedSource::new(10.0), &[Emotion::Joy]).await;

    assert_eq!(
        spans(&result.unwrap()),
        vec![(Emotion::Joy, 0.0, 4.0, 0.8), (Emotion::Joy, 6.0, 10.0, 0.8)]
    );
    assert_eq!(job.frames_failed, 1);
    assert_eq!(job.status, JobStatus::Completed);
}

#[tokio::test]
async fn classifier_timeout_is_per_frame() {
    let classifier = ScriptedClassifier::default()
        .scores(0.0, &[(Emotion::Anger, 0.9)])
        .reply(2.0, Reply::Hang)
        .scores(4.0, &[(Emotion::Anger, 0.9)]);

    let (result, job) = run(classifier, &ScriptedSource::new(5.0), &[Emotion::Anger]).await;

    assert_eq!(
        spans(&result.unwrap()),
        vec![
            (Emotion::Anger, 0.0, 2.0, 0.9),
            (Emotion::Anger, 4.0, 6.0, 0.9)
        ]
    );
    assert_eq!(job.frames_failed, 1);
}

#[tokio::test]
async fn extraction_failure_is_per_frame() {
    let classifier = ScriptedClassifier::default()
        .scores(0.0, &[(Emotion::Joy, 0.9)])
        .scores(4.0, &[(Emotion::Joy, 0.9)]);
    let source = ScriptedSource {
        duration: 6.0,
        broken: vec![2.0],
    };

    let (result, job) = run(classifier, &source, &[Emotion::Joy]).await;

    assert_eq!(result.unwrap().len(), 2);
    assert_eq!(job.frames_failed, 1);
}

#[tokio::test]
async fn missing_credentials_fail_the_job() {
    let classifier = ScriptedClassifier::default()
        .scores(0.0, &[(Emotion::Joy, 0.9)])
        .reply(2.0, Reply::Fail(|| MlError::MissingCredentials("GATEWAY_API_KEY")));

    let (result, job) = run(classifier, &ScriptedSource::new(10.0), &[Emotion::Joy]).await;

    assert!(matches!(
        result,
        Err(WorkerError::Classifier(MlError::MissingCredentials(_)))
    ));
    assert_eq!(job.status, JobStatus::Error);
    assert!(job.segments.is_none());
    assert!(job.error.unwrap().contains("not configured"));
}

#[tokio::test]
async fn malformed_classifier_reply_fails_the_job() {
    let classifier = ScriptedClassifier::default()
        .scores(0.0, &[(Emotion::Joy, 0.9)])
        .reply(
            2.0,
            Reply::Fail(|| MlError::InvalidResponse("Confidence for joy out of range: 85".into())),
        )
        .scores(4.0, &[(Emotion::Joy, 0.9)]);

    let (result, job) = run(classifier, &ScriptedSource::new(10.0), &[Emotion::Joy]).await;

    assert!(matches!(
        result,
        Err(WorkerError::Classifier(MlError::InvalidResponse(_)))
    ));
    assert_eq!(job.status, JobStatus::Error);
    assert!(job.segments.is_none());
    assert_eq!(job.frames_processed, 1);
}

#[tokio::test]
async fn out_of_range_detection_fails_the_job() {
    let classifier = ScriptedClassifier::default()
        .scores(0.0, &[(Emotion::Joy, 0.9)])
        .scores(2.0, &[(Emotion::Joy, 85.0)]);

    let (result, job) = run(classifier, &ScriptedSource::new(10.0), &[Emotion::Joy]).await;

    assert!(matches!(
        result,
        Err(WorkerError::Media(MediaError::InvalidObservation(_)))
    ));
    assert_eq!(job.status, JobStatus::Error);
    assert!(job.segments.is_none());
}

#[tokio::test]
async fn undecodable_video_fails() {
    let source = ScriptedSource {
        duration: 4.0,
        broken: vec![0.0, 2.0],
    };

    let (result, job) = run(ScriptedClassifier::default(), &source, &[Emotion::Joy]).await;

    assert!(matches!(
        result,
        Err(WorkerError::Media(MediaError::InvalidVideo(_)))
    ));
    assert_eq!(job.status, JobStatus::Error);
}

#[tokio::test]
async fn empty_video_completes_without_segments() {
    let (result, job) = run(
        ScriptedClassifier::default(),
        &ScriptedSource::new(0.0),
        &[Emotion::Joy],
    )
    .await;

    assert!(result.unwrap().is_empty());
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
}

#[tokio::test]
async fn invalid_request_is_rejected() {
    let (result, job) = run(
        ScriptedClassifier::default(),
        &ScriptedSource::new(10.0),
        &[Emotion::Joy, Emotion::Joy],
    )
    .await;

    assert!(matches!(result, Err(WorkerError::InvalidRequest(_))));
    assert_eq!(job.status, JobStatus::Error);
}

#[tokio::test]
async fn cancellation_stops_between_frames() {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let classifier = ScriptedClassifier {
        cancel_on_call: Some((2, cancel_tx)),
        ..Default::default()
    };
    let classifier = Arc::new(classifier);
    let detector = EmotionDetector::new(classifier.clone(), test_config());
    let tracker = tracker(&[Emotion::Joy]);
    let request = DetectionRequest::new(vec![Emotion::Joy]);

    let result = detector
        .run(&request, &ScriptedSource::new(20.0), cancel_rx, &tracker)
        .await;

    assert!(matches!(result, Err(WorkerError::Cancelled)));
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    let job = tracker.snapshot();
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.error.as_deref(), Some("cancelled"));
}

#[tokio::test]
async fn cancelled_before_start() {
    let (_cancel_tx, cancel_rx) = watch::channel(true);
    let classifier = Arc::new(ScriptedClassifier::default());
    let detector = EmotionDetector::new(classifier.clone(), test_config());
    let tracker = tracker(&[Emotion::Joy]);

    let result = detector
        .run(
            &DetectionRequest::new(vec![Emotion::Joy]),
            &ScriptedSource::new(10.0),
            cancel_rx,
            &tracker,
        )
        .await;

    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn progress_is_published_per_frame() {
    let detector = EmotionDetector::new(Arc::new(ScriptedClassifier::default()), test_config());
    let tracker = tracker(&[Emotion::Sadness]);
    let mut rx = tracker.subscribe();
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    let seen = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let job = rx.borrow_and_update().clone();
            seen.push(job.progress);
            if job.is_terminal() {
                break;
            }
        }
        seen
    });

    detector
        .run(
            &DetectionRequest::new(vec![Emotion::Sadness]),
            &ScriptedSource::new(8.0),
            cancel_rx,
            &tracker,
        )
        .await
        .unwrap();

    let seen = seen.await.unwrap();
    assert_eq!(seen.last(), Some(&100));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
}
