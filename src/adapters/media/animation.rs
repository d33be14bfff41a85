use image::codecs::gif::GifDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, DynamicImage, Frames, RgbImage};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::warn;

use crate::application::ports::FrameSource;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::source::SourceState;

/// Extensions decoded without any native video library.
pub const ANIMATION_EXTENSIONS: [&str; 2] = ["gif", "webp"];

/// Sequential frames of an animated GIF or WebP, decoded lazily.
pub struct AnimationSource {
    frames: Option<Frames<'static>>,
    decoded: u64,
}

impl AnimationSource {
    pub fn open(path: &Path) -> DomainResult<Self> {
        let unavailable = |e: &dyn std::fmt::Display| DomainError::SourceUnavailable(format!("{}: {}", path.display(), e));
        let reader = BufReader::new(File::open(path).map_err(|e| unavailable(&e))?);
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let frames = match ext.as_str() {
            "gif" => GifDecoder::new(reader).map_err(|e| unavailable(&e))?.into_frames(),
            "webp" => WebPDecoder::new(reader).map_err(|e| unavailable(&e))?.into_frames(),
            other => return Err(unavailable(&format!("unsupported animation format '{other}'"))),
        };
        Ok(Self { frames: Some(frames), decoded: 0 })
    }
}

impl FrameSource for AnimationSource {
    fn state(&self) -> SourceState {
        if self.frames.is_some() { SourceState::Open } else { SourceState::Exhausted }
    }

    fn next_frame(&mut self) -> Option<RgbImage> {
        let frames = self.frames.as_mut()?;
        match frames.next() {
            Some(Ok(frame)) => {
                self.decoded += 1;
                Some(DynamicImage::ImageRgba8(frame.into_buffer()).to_rgb8())
            }
            Some(Err(e)) => {
                warn!("decode stopped after {} frames: {}", self.decoded, e);
                self.frames = None;
                None
            }
            None => {
                self.frames = None;
                None
            }
        }
    }
}
