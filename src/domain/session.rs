use serde::{Deserialize, Serialize};

use super::errors::DomainResult;
use super::model::{validate_confidence, Task};
use super::source::SourceKind;

/// Per-session selections, passed explicitly instead of living in UI globals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub task: Task,
    pub model: String,
    pub confidence: f32,
    pub source: SourceKind,
}

impl SessionSettings {
    pub const DEFAULT_CONFIDENCE: f32 = 0.40;

    pub fn new(task: Task, model: impl Into<String>, confidence: f32) -> DomainResult<Self> {
        Ok(Self {
            task,
            model: model.into(),
            confidence: validate_confidence(confidence)?,
            source: SourceKind::Image,
        })
    }
}
