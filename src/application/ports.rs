use image::RgbImage;
use std::path::Path;

use crate::domain::{
    detection::DetectionResult,
    errors::DomainResult,
    source::{SourceDescriptor, SourceState},
};

/// A loaded model ready to run on single frames.
///
/// Implementations must only report regions whose score is at least
/// `confidence`; callers rely on this for monotonic filtering.
pub trait Detector: Send {
    fn infer(&mut self, image: &RgbImage, confidence: f32) -> DomainResult<DetectionResult>;
}

pub trait DetectorLoader: Send + Sync {
    fn load(&self, weights: &Path) -> DomainResult<Box<dyn Detector>>;
}

/// Pull-based frame producer. Returning `None` ends the stream; dropping the
/// source releases whatever capture it holds.
pub trait FrameSource {
    fn state(&self) -> SourceState;
    fn next_frame(&mut self) -> Option<RgbImage>;
}

pub trait MediaOpener: Send + Sync {
    fn open(&self, descriptor: &SourceDescriptor) -> DomainResult<Box<dyn FrameSource>>;
    /// Lowercase file extensions this build can decode as video.
    fn video_extensions(&self) -> Vec<&'static str>;
}

/// Iterator view over a boxed source.
pub struct Frames<'a> {
    source: &'a mut dyn FrameSource,
}

impl<'a> Frames<'a> {
    pub fn new(source: &'a mut dyn FrameSource) -> Self {
        Self { source }
    }
}

impl Iterator for Frames<'_> {
    type Item = RgbImage;

    fn next(&mut self) -> Option<RgbImage> {
        self.source.next_frame()
    }
}
