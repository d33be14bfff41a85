use std::path::Path;
use tracing::{error, info};

use super::yolo_engine::OnnxYoloEngine;
use crate::application::ports::{Detector, DetectorLoader};
use crate::domain::errors::{DomainError, DomainResult};

/// Loads ONNX weights from the registry's paths.
pub struct OnnxModelCatalog;

impl OnnxModelCatalog {
    pub fn new() -> Self {
        Self
    }

    fn validate(&self, weights: &Path) -> DomainResult<()> {
        let load_error = |reason: &str| DomainError::ModelLoadError {
            path: weights.display().to_string(),
            reason: reason.to_string(),
        };
        if weights.as_os_str().is_empty() {
            return Err(load_error("empty path"));
        }
        if !weights.is_file() {
            return Err(load_error("weights file not found"));
        }
        Ok(())
    }
}

impl DetectorLoader for OnnxModelCatalog {
    fn load(&self, weights: &Path) -> DomainResult<Box<dyn Detector>> {
        self.validate(weights)?;
        let engine = OnnxYoloEngine::load(weights).map_err(|e| {
            error!("cannot load {}: {:#}", weights.display(), e);
            DomainError::ModelLoadError {
                path: weights.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        info!("model loaded from {}", weights.display());
        Ok(Box::new(engine))
    }
}
