//! Job status snapshots shared with readers.

use tokio::sync::watch;

use emoclip_models::{Emotion, EmotionJob, EmotionSegment, JobId, JobStatus};

/// Owns the current [`EmotionJob`] snapshot and publishes every transition.
///
/// Readers see whole snapshots only. Once a job is terminal, progress and
/// completion updates are ignored until [`JobTracker::reset_for_retry`].
#[derive(Debug)]
pub struct JobTracker {
    tx: watch::Sender<EmotionJob>,
}

impl JobTracker {
    pub fn new(job: EmotionJob) -> Self {
        let (tx, _rx) = watch::channel(job);
        Self { tx }
    }

    pub fn job_id(&self) -> JobId {
        self.tx.borrow().id.clone()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> EmotionJob {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EmotionJob> {
        self.tx.subscribe()
    }

    pub fn start_upload(&self, video_name: &str) {
        self.update(|job| {
            job.video_name = Some(video_name.to_string());
            job.set_upload_progress(0);
        });
    }

    /// Record the emotions requested alongside the upload.
    pub fn set_emotions(&self, emotions: Vec<Emotion>) {
        self.update(|job| job.emotions = emotions);
    }

    pub fn upload_progress(&self, percent: u8) {
        self.update(|job| job.set_upload_progress(percent));
    }

    pub fn start_processing(&self, frames_total: usize) {
        self.update(|job| job.start_processing(saturating_u32(frames_total)));
    }

    /// Record frame `processed` (1-based) as done.
    pub fn frame_processed(&self, processed: usize, failed: bool) {
        self.update(|job| job.record_frame(saturating_u32(processed), failed));
    }

    pub fn complete(&self, segments: Vec<EmotionSegment>) {
        self.update(|job| job.complete(segments));
    }

    pub fn fail(&self, error: impl Into<String>) {
        let error = error.into();
        self.update(|job| job.fail(error));
    }

    /// Return a failed job to `processing` with results cleared.
    ///
    /// Returns `false` if the job was not in the error state.
    pub fn reset_for_retry(&self) -> bool {
        self.tx.send_if_modified(|job| {
            if job.status != JobStatus::Error {
                return false;
            }
            job.reset_for_retry();
            true
        })
    }

    fn update(&self, f: impl FnOnce(&mut EmotionJob)) {
        self.tx.send_if_modified(|job| {
            if job.is_terminal() {
                return false;
            }
            f(job);
            true
        });
    }
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> JobTracker {
        JobTracker::new(EmotionJob::new(JobId::new(), vec![Emotion::Joy]))
    }

    #[test]
    fn test_lifecycle() {
        let tracker = tracker();
        let rx = tracker.subscribe();

        tracker.start_upload("clip.mp4");
        tracker.upload_progress(60);
        assert_eq!(rx.borrow().progress, 60);
        assert_eq!(rx.borrow().status, JobStatus::Uploading);

        tracker.start_processing(3);
        assert_eq!(rx.borrow().status, JobStatus::Processing);
        assert_eq!(rx.borrow().progress, 0);

        tracker.frame_processed(1, false);
        assert_eq!(rx.borrow().progress, 33);
        tracker.frame_processed(2, true);
        assert_eq!(rx.borrow().progress, 67);
        assert_eq!(rx.borrow().frames_failed, 1);

        tracker.complete(Vec::new());
        let job = tracker.snapshot();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.segments, Some(Vec::new()));
    }

    #[test]
    fn test_emotions_set_after_upload() {
        let tracker = JobTracker::new(EmotionJob::new(JobId::new(), Vec::new()));
        tracker.start_upload("clip.mp4");
        tracker.set_emotions(vec![Emotion::Fear, Emotion::Joy]);
        assert_eq!(tracker.snapshot().emotions, vec![Emotion::Fear, Emotion::Joy]);
    }

    #[test]
    fn test_terminal_state_is_sticky() {
        let tracker = tracker();
        tracker.start_processing(4);
        tracker.fail("cancelled");

        tracker.frame_processed(3, false);
        tracker.complete(Vec::new());

        let job = tracker.snapshot();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error.as_deref(), Some("cancelled"));
        assert!(job.segments.is_none());
    }

    #[test]
    fn test_reset_for_retry_only_from_error() {
        let tracker = tracker();
        tracker.start_processing(2);
        assert!(!tracker.reset_for_retry());

        tracker.fail("classifier down");
        assert!(tracker.reset_for_retry());
        let job = tracker.snapshot();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.error.is_none());
    }

    #[tokio::test]
    async fn test_subscribers_are_notified() {
        let tracker = tracker();
        let mut rx = tracker.subscribe();

        tracker.start_processing(1);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().status, JobStatus::Processing);
    }
}
