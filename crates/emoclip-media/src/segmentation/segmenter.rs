//! State machine turning frame observations into emotion segments.
//!
//! Every requested emotion gets its own track. A track is either idle or
//! holds one open run:
//!
//! ```text
//!                    confidence > threshold
//!     ┌──────────────────────────────────────────────┐
//!     │                                              ▼
//! ┌────────┐                                   ┌──────────┐
//! │  Idle  │                                   │ Open run │──┐ confidence > threshold
//! └────────┘                                   └──────────┘◄─┘ (extend, track peak)
//!     ▲                                              │
//!     └──────────── emit [start, lastMatch + B] ─────┘
//!                   confidence <= threshold, absent, or failed frame
//! ```

use std::cmp::Ordering;

use tracing::trace;

use emoclip_models::{Emotion, EmotionSegment, FrameObservation, SegmentId};

use super::config::SegmentationConfig;
use crate::error::{MediaError, MediaResult};

/// A run that is still collecting matches.
#[derive(Debug, Clone, Copy)]
struct OpenRun {
    start: f64,
    last_match: f64,
    peak: f64,
}

/// Per-emotion state.
#[derive(Debug, Clone)]
struct EmotionTrack {
    emotion: Emotion,
    open: Option<OpenRun>,
}

/// A closed run waiting for final ordering and id assignment.
#[derive(Debug, Clone, Copy)]
struct ClosedRun {
    emotion: Emotion,
    start: f64,
    end: f64,
    peak: f64,
}

/// Converts an ordered stream of observations into per-emotion segments.
pub struct EmotionSegmenter {
    config: SegmentationConfig,
    tracks: Vec<EmotionTrack>,
    closed: Vec<ClosedRun>,
    last_timestamp: Option<f64>,
    frames_ingested: usize,
}

impl EmotionSegmenter {
    /// Create a segmenter with one track per requested emotion.
    ///
    /// The emotion set must be non-empty and free of duplicates.
    pub fn new(emotions: &[Emotion], config: SegmentationConfig) -> MediaResult<Self> {
        if emotions.is_empty() {
            return Err(MediaError::invalid_input(
                "At least one emotion must be requested",
            ));
        }
        for (i, emotion) in emotions.iter().enumerate() {
            if emotions[..i].contains(emotion) {
                return Err(MediaError::invalid_input(format!(
                    "Emotion {} requested more than once",
                    emotion
                )));
            }
        }
        config.validate()?;

        Ok(Self {
            config,
            tracks: emotions
                .iter()
                .map(|&emotion| EmotionTrack {
                    emotion,
                    open: None,
                })
                .collect(),
            closed: Vec::new(),
            last_timestamp: None,
            frames_ingested: 0,
        })
    }

    /// Process one observation.
    ///
    /// Observations must arrive with strictly increasing timestamps.
    /// Detections for emotions that were not requested are ignored.
    pub fn ingest(&mut self, observation: &FrameObservation) -> MediaResult<()> {
        observation.validate()?;
        self.advance_clock(observation.timestamp)?;

        let threshold = self.config.match_threshold;
        let buffer = self.config.end_buffer_secs;
        let t = observation.timestamp;

        for track in &mut self.tracks {
            let matched = observation
                .confidence_for(track.emotion)
                .filter(|&confidence| confidence > threshold);

            match (matched, track.open.as_mut()) {
                (Some(confidence), Some(run)) => {
                    run.last_match = t;
                    run.peak = run.peak.max(confidence);
                }
                (Some(confidence), None) => {
                    track.open = Some(OpenRun {
                        start: t,
                        last_match: t,
                        peak: confidence,
                    });
                }
                (None, _) => {
                    if let Some(run) = track.open.take() {
                        trace!(
                            "Closing {} run at {:.2}s (started {:.2}s)",
                            track.emotion,
                            t,
                            run.start
                        );
                        self.closed.push(close_run(track.emotion, run, buffer));
                    }
                }
            }
        }

        self.frames_ingested += 1;
        Ok(())
    }

    /// Record a frame whose classification failed.
    ///
    /// Treated as a frame with no detections, so every open run closes.
    pub fn ingest_failure(&mut self, timestamp: f64) -> MediaResult<()> {
        self.ingest(&FrameObservation::empty(timestamp))
    }

    /// Close any remaining runs and return all segments, sorted by start
    /// time and then by emotion code, with sequential ids.
    pub fn finalize(mut self) -> Vec<EmotionSegment> {
        let buffer = self.config.end_buffer_secs;
        for track in &mut self.tracks {
            if let Some(run) = track.open.take() {
                self.closed.push(close_run(track.emotion, run, buffer));
            }
        }

        // Stable sort keeps per-emotion emission order on full ties
        self.closed.sort_by(|a, b| {
            a.start
                .total_cmp(&b.start)
                .then_with(|| a.emotion.as_str().cmp(b.emotion.as_str()))
        });

        self.closed
            .into_iter()
            .enumerate()
            .map(|(i, run)| EmotionSegment {
                id: SegmentId::sequential(i),
                emotion: run.emotion,
                start_time: run.start,
                end_time: run.end,
                confidence: run.peak,
            })
            .collect()
    }

    /// Number of tracks with an open run.
    pub fn open_runs(&self) -> usize {
        self.tracks.iter().filter(|t| t.open.is_some()).count()
    }

    /// Number of observations accepted so far, failures included.
    pub fn frames_ingested(&self) -> usize {
        self.frames_ingested
    }

    /// Number of segments already closed.
    pub fn segment_count(&self) -> usize {
        self.closed.len()
    }

    fn advance_clock(&mut self, timestamp: f64) -> MediaResult<()> {
        if let Some(previous) = self.last_timestamp {
            if timestamp.total_cmp(&previous) != Ordering::Greater {
                return Err(MediaError::OutOfOrderFrame {
                    previous,
                    current: timestamp,
                });
            }
        }
        self.last_timestamp = Some(timestamp);
        Ok(())
    }
}

fn close_run(emotion: Emotion, run: OpenRun, buffer: f64) -> ClosedRun {
    ClosedRun {
        emotion,
        start: run.start,
        end: run.last_match + buffer,
        peak: run.peak,
    }
}

/// Totals for a single emotion.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionStats {
    pub emotion: Emotion,
    /// Number of segments.
    pub count: usize,
    /// Summed segment duration in seconds.
    pub total_secs: f64,
    /// Highest segment confidence.
    pub peak_confidence: f64,
}

/// Statistics about a segment list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SegmentStats {
    /// One entry per emotion present, in first-appearance order.
    pub per_emotion: Vec<EmotionStats>,
    pub total_count: usize,
    pub total_secs: f64,
}

impl SegmentStats {
    pub fn for_emotion(&self, emotion: Emotion) -> Option<&EmotionStats> {
        self.per_emotion.iter().find(|s| s.emotion == emotion)
    }
}

/// Calculate statistics about the segments.
pub fn compute_segment_stats(segments: &[EmotionSegment]) -> SegmentStats {
    let mut stats = SegmentStats::default();

    for segment in segments {
        let duration = segment.duration_secs();
        stats.total_count += 1;
        stats.total_secs += duration;

        match stats
            .per_emotion
            .iter_mut()
            .find(|s| s.emotion == segment.emotion)
        {
            Some(entry) => {
                entry.count += 1;
                entry.total_secs += duration;
                entry.peak_confidence = entry.peak_confidence.max(segment.confidence);
            }
            None => stats.per_emotion.push(EmotionStats {
                emotion: segment.emotion,
                count: 1,
                total_secs: duration,
                peak_confidence: segment.confidence,
            }),
        }
    }

    stats
}
