use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::capture::Frame;
use crate::error::Error;

/// Axis-aligned box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Height over width; a box without width is treated as infinitely tall
    pub fn aspect_ratio(&self) -> f64 {
        let width = self.width();
        if width > 0.0 {
            self.height() / width
        } else {
            f64::INFINITY
        }
    }
}

/// One labelled box reported by a detection model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Signal families fed into the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Person,
    Fire,
    Light,
}

impl Display for Modality {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Person => write!(f, "person"),
            Self::Fire => write!(f, "fire"),
            Self::Light => write!(f, "light"),
        }
    }
}

/// Detection collaborator.
///
/// Implementations apply their own confidence thresholding; the engine only
/// looks at labels and geometry.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, Error>;
}
