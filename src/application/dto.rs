use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    detection::Region,
    errors::DomainResult,
    model::Task,
    session::SessionSettings,
    source::SourceKind,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub identifier: String,
    pub help: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub task: Task,
    pub models: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub tasks: Vec<ModelsResponse>,
    pub sources: Vec<SourceKind>,
    pub default_confidence: f32,
    pub demo_videos: Vec<String>,
    /// Video file extensions this build can decode.
    pub video_extensions: Vec<String>,
    pub default_image: String,
    pub default_detected_image: String,
    pub default_video: String,
    pub default_detected_video: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub task: Task,
    pub model: String,
    /// Percent slider value is converted on the page; this is already 0..1.
    pub confidence: Option<f32>,
}

impl CreateSessionRequest {
    pub fn into_settings(self) -> DomainResult<SessionSettings> {
        SessionSettings::new(
            self.task,
            self.model,
            self.confidence.unwrap_or(SessionSettings::DEFAULT_CONFIDENCE),
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSessionRequest {
    pub task: Option<Task>,
    pub model: Option<String>,
    pub confidence: Option<f32>,
}

impl UpdateSessionRequest {
    /// Overlays the provided fields on the current settings.
    pub fn apply_to(self, current: &SessionSettings) -> DomainResult<SessionSettings> {
        let mut next = SessionSettings::new(
            self.task.unwrap_or(current.task),
            self.model.unwrap_or_else(|| current.model.clone()),
            self.confidence.unwrap_or(current.confidence),
        )?;
        next.source = current.source;
        Ok(next)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub settings: SessionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDetectionResponse {
    pub width: u32,
    pub height: u32,
    /// Base64 JPEG of the annotated frame.
    pub image: String,
    pub regions: Vec<Region>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_overlays_only_given_fields() {
        let current = SessionSettings::new(Task::Detection, "yolov8n", 0.4).unwrap();
        let next = UpdateSessionRequest { confidence: Some(0.7), ..Default::default() }
            .apply_to(&current)
            .unwrap();
        assert_eq!(next.model, "yolov8n");
        assert_eq!(next.confidence, 0.7);
    }

    #[test]
    fn create_defaults_to_forty_percent() {
        let req: CreateSessionRequest =
            serde_json::from_str(r#"{"task":"Segmentation","model":"yolov8n-seg"}"#).unwrap();
        let settings = req.into_settings().unwrap();
        assert_eq!(settings.confidence, 0.4);
        assert_eq!(settings.task, Task::Segmentation);
    }
}
