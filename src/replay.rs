//! File-backed stand-ins for the capture and detection collaborators.
//!
//! A trace is a JSON recording of what a detector reported for each frame,
//! together with the frame's measured brightness. Replaying it drives the
//! engine exactly as a live camera and model would, which makes it the
//! default source for demos and soak runs.

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::capture::{Frame, FrameSource};
use crate::detection::{Detection, Detector};
use crate::error::Error;

const REPLAY_FRAME_SIZE: u32 = 4;

/// Detector output and brightness for one recorded frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    #[serde(default)]
    pub brightness: f64,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// A recorded session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayTrace {
    /// Pause between frames during playback
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    pub frames: Vec<RecordedFrame>,
}

fn default_frame_interval_ms() -> u64 {
    100
}

impl ReplayTrace {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json)
            .map_err(|e| Error::Serialization(format!("Invalid replay trace: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("Failed to read trace {:?}: {}", path, e)))?;
        let trace = Self::from_json(&json)?;
        info!("Loaded replay trace {:?} with {} frames", path, trace.frames.len());
        Ok(trace)
    }
}

/// Plays a trace back as a frame source. File-backed, so it can rewind.
pub struct ReplaySource {
    trace: Arc<ReplayTrace>,
    position: usize,
    opened: bool,
}

impl ReplaySource {
    pub fn new(trace: Arc<ReplayTrace>) -> Self {
        Self {
            trace,
            position: 0,
            opened: false,
        }
    }
}

#[async_trait]
impl FrameSource for ReplaySource {
    async fn open(&mut self) -> Result<(), Error> {
        if self.trace.frames.is_empty() {
            return Err(Error::Capture("Replay trace contains no frames".to_string()));
        }
        self.position = 0;
        self.opened = true;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Frame>, Error> {
        if !self.opened {
            return Err(Error::Capture("Replay source is not open".to_string()));
        }

        let Some(recorded) = self.trace.frames.get(self.position) else {
            return Ok(None);
        };

        if self.trace.frame_interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.trace.frame_interval_ms)).await;
        }

        let level = recorded.brightness.round().clamp(0.0, 255.0) as u8;
        let frame = Frame::uniform(
            self.position as u64,
            REPLAY_FRAME_SIZE,
            REPLAY_FRAME_SIZE,
            level,
        );
        self.position += 1;
        Ok(Some(frame))
    }

    async fn rewind(&mut self) -> Result<(), Error> {
        self.position = 0;
        Ok(())
    }

    fn is_live(&self) -> bool {
        false
    }

    fn release(&mut self) {
        self.opened = false;
    }
}

/// Answers detection requests from the trace, acting as one model that knows
/// a fixed set of classes and applies its own confidence floor
pub struct ReplayDetector {
    trace: Arc<ReplayTrace>,
    classes: Vec<String>,
    min_confidence: f32,
}

impl ReplayDetector {
    pub fn new(trace: Arc<ReplayTrace>, classes: Vec<String>, min_confidence: f32) -> Self {
        Self {
            trace,
            classes,
            min_confidence,
        }
    }
}

#[async_trait]
impl Detector for ReplayDetector {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, Error> {
        let recorded = self
            .trace
            .frames
            .get(frame.index as usize)
            .ok_or_else(|| Error::Detection(format!("No recorded detections for frame {}", frame.index)))?;

        Ok(recorded
            .detections
            .iter()
            .filter(|d| d.confidence >= self.min_confidence && self.classes.contains(&d.label))
            .cloned()
            .collect())
    }
}
