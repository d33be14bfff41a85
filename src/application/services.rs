use image::{imageops::FilterType, RgbImage};
use std::ops::ControlFlow;
use tracing::debug;

use crate::application::ports::{Detector, FrameSource, Frames};
use crate::domain::{
    detection::Region,
    errors::{DomainError, DomainResult},
};

/// Every frame is normalized to 720 wide at 16:9 before inference.
pub const TARGET_WIDTH: u32 = 720;
pub const TARGET_HEIGHT: u32 = (TARGET_WIDTH * 9 + 8) / 16;

pub struct FrameOutput {
    pub rendered: RgbImage,
    /// Only filled when the caller asked for the region list.
    pub regions: Option<Vec<Region>>,
}

/// Resize, infer, and hand back the annotated frame.
pub fn process_frame(
    detector: &mut dyn Detector,
    frame: &RgbImage,
    confidence: f32,
    keep_regions: bool,
) -> DomainResult<FrameOutput> {
    let resized = normalize_frame(frame)?;
    let result = detector.infer(&resized, confidence)?;
    Ok(FrameOutput {
        rendered: result.rendered,
        regions: keep_regions.then_some(result.regions),
    })
}

fn normalize_frame(frame: &RgbImage) -> DomainResult<RgbImage> {
    let (w, h) = frame.dimensions();
    if w == 0 || h == 0 {
        return Err(DomainError::InvalidFrame(format!("degenerate frame {}x{}", w, h)));
    }
    let resized = image::imageops::resize(frame, TARGET_WIDTH, TARGET_HEIGHT, FilterType::Triangle);
    if resized.width() == 0 || resized.height() == 0 {
        return Err(DomainError::InvalidFrame("resize produced an empty frame".into()));
    }
    Ok(resized)
}

/// Drives a source through `step` until it runs dry or `sink` breaks.
///
/// Frames are pulled one at a time; the next read only happens after `sink`
/// returned for the previous one. Returns the number of processed frames.
pub fn run_source<P, F>(source: &mut dyn FrameSource, mut step: P, mut sink: F) -> DomainResult<u64>
where
    P: FnMut(&RgbImage) -> DomainResult<FrameOutput>,
    F: FnMut(u64, FrameOutput) -> ControlFlow<()>,
{
    let mut processed = 0u64;
    for frame in Frames::new(source) {
        let output = step(&frame)?;
        processed += 1;
        if sink(processed - 1, output).is_break() {
            debug!("consumer stopped after {} frames", processed);
            break;
        }
    }
    Ok(processed)
}
