//! Command-line emotion detection.
//!
//! Usage: `emoclip-detect <video> <emotion[,emotion...]>`
//!
//! Prints the segment list as JSON on stdout; logs go to stderr.

use std::path::PathBuf;

use anyhow::{bail, Context};
use tokio::sync::watch;
use tracing::info;

use emoclip_media::FfmpegFrameSource;
use emoclip_ml_client::classifier_from_env;
use emoclip_models::{DetectionRequest, EmotionJob, JobId};
use emoclip_worker::{logging, EmotionDetector, JobTracker, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    logging::init_tracing();

    let mut args = std::env::args().skip(1);
    let (Some(video), Some(emotions)) = (args.next(), args.next()) else {
        bail!("usage: emoclip-detect <video> <emotion[,emotion...]>");
    };
    let video = PathBuf::from(video);
    if !video.exists() {
        bail!("video not found: {}", video.display());
    }

    let request = DetectionRequest::parse(&emotions).map_err(anyhow::Error::msg)?;
    let config = WorkerConfig::from_env();
    config.validate()?;
    info!("Worker config: {:?}", config);

    let classifier = classifier_from_env().context("failed to create classifier")?;
    let detector = EmotionDetector::new(classifier, config.clone());

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            let _ = cancel_tx.send(true);
        }
    });

    let source = FfmpegFrameSource::new(&video)
        .with_scale_width(config.frame_width)
        .with_jpeg_quality(config.jpeg_quality)
        .with_timeout(config.frame_extract_timeout.as_secs())
        .with_cancel(cancel_rx.clone());

    let file_name = video
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tracker = JobTracker::new(EmotionJob::new(JobId::new(), request.emotions.clone()));
    tracker.start_upload(&file_name);

    let mut progress = tracker.subscribe();
    let reporter = tokio::spawn(async move {
        let mut last = None;
        while progress.changed().await.is_ok() {
            let job = progress.borrow_and_update().clone();
            if last != Some(job.progress) {
                eprintln!("[{}] {}%", job.status, job.progress);
                last = Some(job.progress);
            }
        }
    });

    let segments = detector.run(&request, &source, cancel_rx, &tracker).await?;
    drop(tracker);
    reporter.await.ok();

    println!("{}", serde_json::to_string_pretty(&segments)?);
    Ok(())
}
