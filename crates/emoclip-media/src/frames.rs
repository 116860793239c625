//! Frame sampling.
//!
//! Frames are pulled one at a time in increasing timestamp order:
//!
//! ```rust,ignore
//! let source = FfmpegFrameSource::new(&video_path);
//! let mut sampler = FrameSampler::open(&source, DEFAULT_SAMPLE_INTERVAL_SECS).await?;
//! while let Some(frame) = sampler.next_frame().await {
//!     // frame.timestamp, frame.image: MediaResult<FrameImage>
//! }
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::watch;

use emoclip_models::FrameImage;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// Default spacing between sampled frames.
pub const DEFAULT_SAMPLE_INTERVAL_SECS: f64 = 2.0;

/// Sample timestamps `0, interval, 2·interval, … < duration`.
///
/// A zero or negative duration yields no timestamps.
pub fn sample_timestamps(duration: f64, interval: f64) -> MediaResult<Vec<f64>> {
    if !interval.is_finite() || interval <= 0.0 {
        return Err(MediaError::invalid_input(format!(
            "Sampling interval must be positive, got {}",
            interval
        )));
    }
    if !duration.is_finite() {
        return Err(MediaError::invalid_input(format!(
            "Video duration must be finite, got {}",
            duration
        )));
    }

    // Multiply instead of accumulating to avoid drift on long videos
    let mut timestamps = Vec::new();
    let mut index = 0u64;
    loop {
        let t = index as f64 * interval;
        if t >= duration {
            break;
        }
        timestamps.push(t);
        index += 1;
    }
    Ok(timestamps)
}

/// Something that can report a duration and render a still at a timestamp.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Total duration in seconds.
    async fn duration(&self) -> MediaResult<f64>;

    /// Encoded still image at `timestamp` seconds.
    async fn frame_at(&self, timestamp: f64) -> MediaResult<FrameImage>;
}

/// Frame source backed by the `ffprobe`/`ffmpeg` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegFrameSource {
    path: PathBuf,
    /// Output width; height follows the aspect ratio
    scale_width: u32,
    /// MJPEG qscale
    jpeg_quality: u8,
    timeout_secs: Option<u64>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl FfmpegFrameSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            scale_width: 640,
            jpeg_quality: 5,
            timeout_secs: None,
            cancel_rx: None,
        }
    }

    pub fn with_scale_width(mut self, width: u32) -> Self {
        self.scale_width = width.max(16);
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Bound each frame extraction.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Abort in-flight extraction when the flag flips to `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn grab_command(&self, timestamp: f64) -> FfmpegCommand {
        FfmpegCommand::to_stdout(&self.path)
            .seek(timestamp)
            .single_frame()
            .video_filter(format!("scale={}:-2", self.scale_width))
            .jpeg(self.jpeg_quality)
    }

    fn runner(&self) -> FfmpegRunner {
        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }
        if let Some(rx) = &self.cancel_rx {
            runner = runner.with_cancel(rx.clone());
        }
        runner
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn duration(&self) -> MediaResult<f64> {
        Ok(probe_video(&self.path).await?.duration)
    }

    async fn frame_at(&self, timestamp: f64) -> MediaResult<FrameImage> {
        let bytes = self.runner().run_capture(&self.grab_command(timestamp)).await?;
        if bytes.is_empty() {
            return Err(MediaError::invalid_video(format!(
                "No frame decoded at {:.3}s",
                timestamp
            )));
        }
        Ok(FrameImage::jpeg(bytes))
    }
}

/// One pulled sample. Extraction failures are kept per frame.
#[derive(Debug)]
pub struct SampledFrame {
    pub index: usize,
    pub timestamp: f64,
    pub image: MediaResult<FrameImage>,
}

/// Sequential pull loop over a [`FrameSource`].
pub struct FrameSampler<'a, S: FrameSource + ?Sized> {
    source: &'a S,
    timestamps: Vec<f64>,
    next: usize,
}

impl<'a, S: FrameSource + ?Sized> FrameSampler<'a, S> {
    /// Probe the source and plan timestamps.
    ///
    /// A source whose duration cannot be read is a fatal error.
    pub async fn open(source: &'a S, interval: f64) -> MediaResult<Self> {
        let duration = source.duration().await?;
        let timestamps = sample_timestamps(duration, interval)?;
        Ok(Self {
            source,
            timestamps,
            next: 0,
        })
    }

    /// Number of frames this sampler will yield.
    pub fn total_frames(&self) -> usize {
        self.timestamps.len()
    }

    pub fn remaining(&self) -> usize {
        self.timestamps.len() - self.next
    }

    /// Extract the next frame, or `None` when the timeline is exhausted.
    pub async fn next_frame(&mut self) -> Option<SampledFrame> {
        let index = self.next;
        let timestamp = *self.timestamps.get(index)?;
        self.next += 1;

        let image = self.source.frame_at(timestamp).await;
        Some(SampledFrame {
            index,
            timestamp,
            image,
        })
    }
}
