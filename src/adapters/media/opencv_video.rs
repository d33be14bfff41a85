use image::RgbImage;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{VideoCapture, CAP_ANY},
};
use std::path::Path;
use tracing::{info, warn};

use crate::application::ports::FrameSource;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::source::SourceState;

pub struct OpenCvVideoSource {
    capture: Option<VideoCapture>,
    decoded: u64,
}

impl OpenCvVideoSource {
    pub fn open(path: &Path) -> DomainResult<Self> {
        let name = path.to_string_lossy();
        let unavailable = |msg: String| DomainError::SourceUnavailable(format!("{}: {}", name, msg));

        let capture = VideoCapture::from_file(&name, CAP_ANY).map_err(|e| unavailable(e.to_string()))?;
        if !capture.is_opened().map_err(|e| unavailable(e.to_string()))? {
            return Err(unavailable("cannot be decoded".into()));
        }
        info!("video opened: {}", name);
        Ok(Self { capture: Some(capture), decoded: 0 })
    }

    fn read_rgb(capture: &mut VideoCapture) -> opencv::Result<Option<RgbImage>> {
        let mut bgr = Mat::default();
        if !capture.read(&mut bgr)? || bgr.empty() {
            return Ok(None);
        }
        let mut rgb = Mat::default();
        imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
        let (w, h) = (rgb.cols() as u32, rgb.rows() as u32);
        Ok(RgbImage::from_vec(w, h, rgb.data_bytes()?.to_vec()))
    }

    fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.release() {
                warn!("video release failed: {}", e);
            }
            info!("video released after {} frames", self.decoded);
        }
    }
}

impl FrameSource for OpenCvVideoSource {
    fn state(&self) -> SourceState {
        if self.capture.is_some() { SourceState::Open } else { SourceState::Exhausted }
    }

    fn next_frame(&mut self) -> Option<RgbImage> {
        let capture = self.capture.as_mut()?;
        match Self::read_rgb(capture) {
            Ok(Some(frame)) => {
                self.decoded += 1;
                Some(frame)
            }
            Ok(None) => {
                self.release();
                None
            }
            Err(e) => {
                warn!("video read failed: {}", e);
                self.release();
                None
            }
        }
    }
}

impl Drop for OpenCvVideoSource {
    fn drop(&mut self) {
        self.release();
    }
}
