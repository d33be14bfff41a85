use image::RgbImage;
use std::path::Path;

use crate::application::ports::FrameSource;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::source::SourceState;

/// A single decoded picture; open and exhausted after one read.
pub struct StillImageSource {
    frame: Option<RgbImage>,
}

impl StillImageSource {
    pub fn from_path(path: &Path) -> DomainResult<Self> {
        let img = image::open(path)
            .map_err(|e| DomainError::SourceUnavailable(format!("{}: {}", path.display(), e)))?;
        Ok(Self { frame: Some(img.to_rgb8()) })
    }

    pub fn from_bytes(bytes: &[u8]) -> DomainResult<Self> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| DomainError::SourceUnavailable(format!("uploaded image: {}", e)))?;
        Ok(Self { frame: Some(img.to_rgb8()) })
    }
}

impl FrameSource for StillImageSource {
    fn state(&self) -> SourceState {
        if self.frame.is_some() { SourceState::Open } else { SourceState::Exhausted }
    }

    fn next_frame(&mut self) -> Option<RgbImage> {
        self.frame.take()
    }
}
