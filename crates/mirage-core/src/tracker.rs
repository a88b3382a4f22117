//! Face tracking: the detector seam, a replay tracker, and identity matching.
//!
//! Real landmark detection lives outside this crate behind [`FaceTracker`].
//! [`ReplayTracker`] feeds recorded detections (from memory or a JSON-lines
//! file) for offline sessions and tests. [`IdentityMatcher`] turns per-tick
//! detections into faces with identifiers that stay stable across ticks.

use crate::types::{Detection, Face};
use std::collections::VecDeque;
use std::io::BufRead;
use std::path::Path;
use thiserror::Error;

/// Default per-axis match window, in pixels, for carrying an id across ticks.
pub const DEFAULT_MATCH_RADIUS_PX: f32 = 20.0;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("recording not found: {0}")]
    RecordingNotFound(String),
    #[error("tracker not initialized")]
    NotInitialized,
    #[error("bad recording line {line}: {source}")]
    BadRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of per-tick face detections.
pub trait FaceTracker {
    /// Prepare the tracker. Called once at session start; a failure here
    /// aborts the session.
    fn init(&mut self) -> Result<(), TrackerError>;

    /// Detections for the next tick. An empty vector means no faces.
    fn next_frame(&mut self) -> Result<Vec<Detection>, TrackerError>;
}

/// Replays recorded detection frames.
pub struct ReplayTracker {
    frames: Vec<Vec<Detection>>,
    queue: VecDeque<usize>,
    looping: bool,
    initialized: bool,
}

impl ReplayTracker {
    /// Replay in-memory frames.
    pub fn from_frames(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            frames,
            queue: VecDeque::new(),
            looping: false,
            initialized: false,
        }
    }

    /// Load a JSON-lines recording: one JSON array of detections per line.
    /// Blank lines are skipped.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TrackerError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TrackerError::RecordingNotFound(path.display().to_string()));
        }

        let reader = std::io::BufReader::new(std::fs::File::open(path)?);
        let mut frames = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let frame: Vec<Detection> = serde_json::from_str(&line)
                .map_err(|source| TrackerError::BadRecord { line: idx + 1, source })?;
            frames.push(frame);
        }

        tracing::info!(path = %path.display(), frames = frames.len(), "loaded recording");
        Ok(Self::from_frames(frames))
    }

    /// Restart from the first frame once the recording runs out.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Whether a non-looping replay has run out of frames.
    pub fn is_exhausted(&self) -> bool {
        self.initialized && !self.looping && self.queue.is_empty()
    }

    fn rewind(&mut self) {
        self.queue = (0..self.frames.len()).collect();
    }
}

impl FaceTracker for ReplayTracker {
    fn init(&mut self) -> Result<(), TrackerError> {
        self.rewind();
        self.initialized = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Vec<Detection>, TrackerError> {
        if !self.initialized {
            return Err(TrackerError::NotInitialized);
        }
        if self.queue.is_empty() && self.looping {
            self.rewind();
        }
        Ok(self
            .queue
            .pop_front()
            .map(|i| self.frames[i].clone())
            .unwrap_or_default())
    }
}

/// Faces for one tick plus the ids that disappeared since the previous tick.
#[derive(Debug, Clone, Default)]
pub struct TrackedFrame {
    pub faces: Vec<Face>,
    pub departed: Vec<String>,
}

/// Assigns stable identifiers to detections across ticks.
///
/// A detection inherits the id of a previous face when both box origins lie
/// within `radius` on each axis. Candidate pairs are taken closest first
/// (Euclidean distance between box origins), each previous face and each
/// detection used at most once, so reordered detections keep their ids.
/// Unmatched detections get a fresh `face-<n>` id.
pub struct IdentityMatcher {
    radius: f32,
    next_id: u64,
    previous: Vec<(String, f32, f32)>,
}

impl Default for IdentityMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_RADIUS_PX)
    }
}

impl IdentityMatcher {
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            next_id: 0,
            previous: Vec::new(),
        }
    }

    /// Match this tick's detections against the previous tick's faces.
    pub fn assign(&mut self, detections: Vec<Detection>) -> TrackedFrame {
        let mut candidates: Vec<(f32, usize, usize)> = Vec::new();
        for (pi, (_, px, py)) in self.previous.iter().enumerate() {
            for (di, det) in detections.iter().enumerate() {
                let dx = (det.bbox.x - px).abs();
                let dy = (det.bbox.y - py).abs();
                if dx < self.radius && dy < self.radius {
                    candidates.push(((dx * dx + dy * dy).sqrt(), pi, di));
                }
            }
        }
        candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut prev_taken = vec![false; self.previous.len()];
        let mut ids: Vec<Option<String>> = vec![None; detections.len()];
        for (_, pi, di) in candidates {
            if prev_taken[pi] || ids[di].is_some() {
                continue;
            }
            prev_taken[pi] = true;
            ids[di] = Some(self.previous[pi].0.clone());
        }

        let departed: Vec<String> = self
            .previous
            .iter()
            .zip(prev_taken.iter())
            .filter(|(_, &taken)| !taken)
            .map(|((id, _, _), _)| id.clone())
            .collect();

        let faces: Vec<Face> = detections
            .into_iter()
            .zip(ids)
            .map(|(det, id)| {
                let id = id.unwrap_or_else(|| self.fresh_id());
                Face::from_detection(id, det)
            })
            .collect();

        for id in &departed {
            tracing::debug!(face = %id, "face left the frame");
        }

        self.previous = faces
            .iter()
            .map(|f| (f.id.clone(), f.bbox.x, f.bbox.y))
            .collect();

        TrackedFrame { faces, departed }
    }

    /// Forget all faces. The id counter keeps running.
    pub fn reset(&mut self) {
        self.previous.clear();
    }

    fn fresh_id(&mut self) -> String {
        self.next_id += 1;
        let id = format!("face-{}", self.next_id);
        tracing::debug!(face = %id, "new face");
        id
    }
}
