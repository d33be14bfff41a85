use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::errors::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Task {
    Detection,
    Segmentation,
}

impl Task {
    pub const ALL: [Task; 2] = [Task::Detection, Task::Segmentation];

    /// Directory under the weights root holding this task's models.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Task::Detection => "detection",
            Task::Segmentation => "segmentation",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Detection => f.write_str("Detection"),
            Task::Segmentation => f.write_str("Segmentation"),
        }
    }
}

impl FromStr for Task {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "detection" => Ok(Task::Detection),
            "segmentation" => Ok(Task::Segmentation),
            other => Err(DomainError::InvalidInput(format!("unknown task '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub task: Task,
    pub identifier: String,
    pub weights_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoloParams {
    pub input_size: u32,        // 640 for every exported YOLOv8 variant
    pub conf_threshold: f32,    // 0..1
    pub iou_threshold: f32,     // 0..1
    pub max_detections: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

/// Rejects thresholds outside `[0, 1]` (NaN included).
pub fn validate_confidence(confidence: f32) -> DomainResult<f32> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(confidence)
    } else {
        Err(DomainError::InvalidInput(format!(
            "confidence must be within [0, 1], got {confidence}"
        )))
    }
}
