use image::RgbImage;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

use crate::application::{
    ports::{Detector, DetectorLoader, MediaOpener},
    registry::ModelRegistry,
    services::{process_frame, run_source, FrameOutput},
};
use crate::domain::{
    detection::Region,
    errors::{DomainError, DomainResult},
    model::validate_confidence,
    session::SessionSettings,
    source::{SourceDescriptor, SourceKind},
};

/// One user's view: its settings and the detector it exclusively owns.
pub struct DetectionSession {
    settings: SessionSettings,
    detector: Box<dyn Detector>,
    registry: Arc<ModelRegistry>,
    loader: Arc<dyn DetectorLoader>,
}

pub struct ImageDetection {
    pub rendered: RgbImage,
    pub regions: Vec<Region>,
}

impl DetectionSession {
    pub fn open(
        registry: Arc<ModelRegistry>,
        loader: Arc<dyn DetectorLoader>,
        settings: SessionSettings,
    ) -> DomainResult<Self> {
        validate_confidence(settings.confidence)?;
        let model = registry.model_config(settings.task, &settings.model)?;
        let detector = loader.load(&model.weights_path)?;
        info!("session ready with {} ({})", model.identifier, model.task);
        Ok(Self { settings, detector, registry, loader })
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Swaps the detector. On failure the previous model stays active.
    pub fn select_model(&mut self, settings: SessionSettings) -> DomainResult<()> {
        validate_confidence(settings.confidence)?;
        if settings.task != self.settings.task || settings.model != self.settings.model {
            let path = self.registry.resolve_path(settings.task, &settings.model)?;
            self.detector = self.loader.load(&path)?;
            info!("session switched to {} ({})", settings.model, settings.task);
        }
        self.settings = settings;
        Ok(())
    }

    /// Single-image detection; an empty upload falls back to the demo image.
    pub fn detect_image(&mut self, opener: &dyn MediaOpener, bytes: Vec<u8>) -> DomainResult<ImageDetection> {
        let descriptor = if bytes.is_empty() {
            SourceDescriptor::ImageFile(self.registry.default_image())
        } else {
            SourceDescriptor::ImageBytes(bytes)
        };
        let mut source = opener.open(&descriptor)?;
        let frame = source
            .next_frame()
            .ok_or_else(|| DomainError::InvalidFrame("image source produced no frame".into()))?;
        let FrameOutput { rendered, regions } =
            process_frame(self.detector.as_mut(), &frame, self.settings.confidence, true)?;
        self.settings.source = SourceKind::Image;
        Ok(ImageDetection { rendered, regions: regions.unwrap_or_default() })
    }

    /// One streamed frame through the current detector and threshold.
    pub fn process_streamed(&mut self, frame: &RgbImage) -> DomainResult<FrameOutput> {
        process_frame(self.detector.as_mut(), frame, self.settings.confidence, false)
    }
}

fn lock(session: &Mutex<DetectionSession>) -> MutexGuard<'_, DetectionSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Streams a video file or the camera through a shared session.
///
/// The session is locked only while a frame is inferred, so settings and
/// model changes made between frames apply from the next frame on.
pub fn stream_session<F>(
    session: &Mutex<DetectionSession>,
    opener: &dyn MediaOpener,
    descriptor: &SourceDescriptor,
    sink: F,
) -> DomainResult<u64>
where
    F: FnMut(u64, FrameOutput) -> ControlFlow<()>,
{
    let mut source = opener.open(descriptor).inspect_err(|e| warn!("cannot open source: {}", e))?;
    lock(session).settings.source = match descriptor {
        SourceDescriptor::Camera(_) => SourceKind::Webcam,
        SourceDescriptor::VideoFile(_) => SourceKind::Video,
        _ => SourceKind::Image,
    };
    let processed = run_source(source.as_mut(), |frame| lock(session).process_streamed(frame), sink)?;
    info!("source finished after {} frames ({:?})", processed, source.state());
    Ok(processed)
}
