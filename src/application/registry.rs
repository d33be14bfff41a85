use std::path::{Path, PathBuf};

use crate::domain::{
    errors::{DomainError, DomainResult},
    model::{ModelConfig, Task},
    source::SourceKind,
};

// Smallest and fastest first.
const DETECTION_MODELS: [&str; 5] = ["yolov8n", "yolov8s", "yolov8m", "yolov8l", "yolov8x"];
const SEGMENTATION_MODELS: [&str; 5] = [
    "yolov8n-seg",
    "yolov8s-seg",
    "yolov8m-seg",
    "yolov8l-seg",
    "yolov8x-seg",
];
const DEMO_VIDEOS: [&str; 3] = ["video_1", "video_2", "video_3"];

const WEIGHTS_EXTENSION: &str = "onnx";

/// Static lookup of models, demo assets and the camera device.
///
/// Read-only after construction, so it is shared between sessions behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    weights_dir: PathBuf,
    assets_dir: PathBuf,
    camera_index: u32,
}

impl ModelRegistry {
    pub fn new(weights_dir: impl Into<PathBuf>, assets_dir: impl Into<PathBuf>, camera_index: u32) -> Self {
        Self {
            weights_dir: weights_dir.into(),
            assets_dir: assets_dir.into(),
            camera_index,
        }
    }

    pub fn tasks(&self) -> &'static [Task] {
        &Task::ALL
    }

    pub fn sources(&self) -> &'static [SourceKind] {
        &SourceKind::ALL
    }

    pub fn list_models(&self, task: Task) -> &'static [&'static str] {
        match task {
            Task::Detection => &DETECTION_MODELS,
            Task::Segmentation => &SEGMENTATION_MODELS,
        }
    }

    pub fn resolve_path(&self, task: Task, identifier: &str) -> DomainResult<PathBuf> {
        if !self.list_models(task).contains(&identifier) {
            return Err(DomainError::UnknownIdentifier {
                task: task.to_string(),
                identifier: identifier.to_string(),
            });
        }
        Ok(self
            .weights_dir
            .join(task.dir_name())
            .join(identifier)
            .with_extension(WEIGHTS_EXTENSION))
    }

    pub fn model_config(&self, task: Task, identifier: &str) -> DomainResult<ModelConfig> {
        Ok(ModelConfig {
            task,
            identifier: identifier.to_string(),
            weights_path: self.resolve_path(task, identifier)?,
        })
    }

    /// Short help line for a registered model, keyed on its size letter.
    pub fn describe(&self, identifier: &str) -> &'static str {
        let size = identifier
            .strip_prefix("yolov8")
            .and_then(|rest| rest.chars().next());
        match size {
            Some('n') => "Nano: fewest parameters, fastest; suited to real-time use with moderate accuracy.",
            Some('s') => "Small: optimized for speed, trading some accuracy for faster inference.",
            Some('m') => "Medium: balance between speed and accuracy for general-purpose use.",
            Some('l') => "Large: more parameters and higher accuracy, slower inference.",
            Some('x') => "Extra large: highest accuracy, slowest inference.",
            _ => "",
        }
    }

    pub fn images_dir(&self) -> PathBuf {
        self.assets_dir.join("images")
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.assets_dir.join("videos")
    }

    pub fn default_image(&self) -> PathBuf {
        self.images_dir().join("default_image.jpg")
    }

    pub fn default_detected_image(&self) -> PathBuf {
        self.images_dir().join("default_image_detected.jpg")
    }

    pub fn default_video(&self) -> PathBuf {
        self.videos_dir().join("default_video.mp4")
    }

    pub fn default_detected_video(&self) -> PathBuf {
        self.videos_dir().join("default_video_detected.mp4")
    }

    pub fn demo_videos(&self) -> &'static [&'static str] {
        &DEMO_VIDEOS
    }

    pub fn demo_video(&self, name: &str) -> Option<PathBuf> {
        DEMO_VIDEOS
            .contains(&name)
            .then(|| self.videos_dir().join(name).with_extension("mp4"))
    }

    pub fn camera_index(&self) -> u32 {
        self.camera_index
    }

    pub fn weights_dir(&self) -> &Path {
        &self.weights_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModelRegistry {
        ModelRegistry::new("weights", ".", 0)
    }

    #[test]
    fn every_listed_model_resolves_to_a_path() {
        let reg = registry();
        for task in Task::ALL {
            for id in reg.list_models(task) {
                let path = reg.resolve_path(task, id).unwrap();
                assert!(!path.as_os_str().is_empty());
                assert!(path.ends_with(format!("{}/{}.onnx", task.dir_name(), id)));
            }
        }
    }

    #[test]
    fn models_are_listed_smallest_first() {
        let reg = registry();
        assert_eq!(reg.list_models(Task::Detection).first(), Some(&"yolov8n"));
        assert_eq!(reg.list_models(Task::Segmentation).last(), Some(&"yolov8x-seg"));
    }

    #[test]
    fn segmentation_model_is_unknown_under_detection() {
        let err = registry().resolve_path(Task::Detection, "yolov8n-seg").unwrap_err();
        assert!(matches!(err, DomainError::UnknownIdentifier { .. }));
    }

    #[test]
    fn unregistered_identifier_is_rejected() {
        let err = registry().model_config(Task::Segmentation, "yolov5s").unwrap_err();
        assert!(matches!(err, DomainError::UnknownIdentifier { ref identifier, .. } if identifier == "yolov5s"));
    }

    #[test]
    fn help_text_follows_model_size() {
        let reg = registry();
        assert!(reg.describe("yolov8n-seg").starts_with("Nano"));
        assert!(reg.describe("yolov8x").starts_with("Extra large"));
        assert_eq!(reg.describe("resnet"), "");
    }

    #[test]
    fn demo_assets_live_under_asset_root() {
        let reg = ModelRegistry::new("w", "/srv/app", 2);
        assert_eq!(reg.default_image(), PathBuf::from("/srv/app/images/default_image.jpg"));
        assert_eq!(reg.demo_video("video_2"), Some(PathBuf::from("/srv/app/videos/video_2.mp4")));
        assert_eq!(reg.demo_video("video_9"), None);
        assert_eq!(reg.camera_index(), 2);
        assert_eq!(reg.sources(), [SourceKind::Image, SourceKind::Video, SourceKind::Webcam]);
    }
}
