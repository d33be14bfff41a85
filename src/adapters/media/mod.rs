pub mod animation;
#[cfg(feature = "opencv")]
pub mod opencv_video;
pub mod still;

use std::path::Path;
use tracing::info;

use crate::application::ports::{FrameSource, MediaOpener};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::source::SourceDescriptor;

use self::animation::{AnimationSource, ANIMATION_EXTENSIONS};
use self::still::StillImageSource;

/// Container formats handed to OpenCV's videoio backend.
pub const CONTAINER_EXTENSIONS: [&str; 3] = ["mp4", "avi", "mov"];

/// Opens frame sources from local files, uploads and camera devices.
pub struct LocalMediaOpener;

impl LocalMediaOpener {
    pub fn new() -> Self {
        Self
    }

    fn open_video(&self, path: &Path) -> DomainResult<Box<dyn FrameSource>> {
        if !path.is_file() {
            return Err(DomainError::SourceUnavailable(format!("{}: no such file", path.display())));
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if ANIMATION_EXTENSIONS.contains(&ext.as_str()) {
            return Ok(Box::new(AnimationSource::open(path)?));
        }

        self.open_container(path, &ext)
    }

    #[cfg(feature = "opencv")]
    fn open_container(&self, path: &Path, ext: &str) -> DomainResult<Box<dyn FrameSource>> {
        use self::opencv_video::OpenCvVideoSource;
        if !CONTAINER_EXTENSIONS.contains(&ext) {
            return Err(DomainError::SourceUnavailable(format!(
                "{}: unsupported video format '.{}'",
                path.display(),
                ext
            )));
        }
        Ok(Box::new(OpenCvVideoSource::open(path)?))
    }

    #[cfg(not(feature = "opencv"))]
    fn open_container(&self, path: &Path, ext: &str) -> DomainResult<Box<dyn FrameSource>> {
        Err(DomainError::SourceUnavailable(format!(
            "{}: decoding .{} video requires the `opencv` feature",
            path.display(),
            ext
        )))
    }

    #[cfg(feature = "camera")]
    fn open_camera(&self, index: u32) -> DomainResult<Box<dyn FrameSource>> {
        use crate::adapters::v4l2::capture::{CaptureConfig, V4l2Capture};
        Ok(Box::new(V4l2Capture::open(&CaptureConfig::for_index(index))?))
    }

    #[cfg(not(feature = "camera"))]
    fn open_camera(&self, index: u32) -> DomainResult<Box<dyn FrameSource>> {
        Err(DomainError::SourceUnavailable(format!(
            "camera {} requested but camera support is not compiled in",
            index
        )))
    }
}

impl MediaOpener for LocalMediaOpener {
    fn open(&self, descriptor: &SourceDescriptor) -> DomainResult<Box<dyn FrameSource>> {
        let source: Box<dyn FrameSource> = match descriptor {
            SourceDescriptor::ImageFile(path) => Box::new(StillImageSource::from_path(path)?),
            SourceDescriptor::ImageBytes(bytes) => Box::new(StillImageSource::from_bytes(bytes)?),
            SourceDescriptor::VideoFile(path) => self.open_video(path)?,
            SourceDescriptor::Camera(index) => self.open_camera(*index)?,
        };
        info!("source opened: {}", describe(descriptor));
        Ok(source)
    }

    fn video_extensions(&self) -> Vec<&'static str> {
        let containers: &[&'static str] = if cfg!(feature = "opencv") { &CONTAINER_EXTENSIONS } else { &[] };
        ANIMATION_EXTENSIONS.iter().chain(containers).copied().collect()
    }
}

fn describe(descriptor: &SourceDescriptor) -> String {
    match descriptor {
        SourceDescriptor::ImageFile(p) => format!("image {}", p.display()),
        SourceDescriptor::ImageBytes(b) => format!("uploaded image ({} bytes)", b.len()),
        SourceDescriptor::VideoFile(p) => format!("video {}", p.display()),
        SourceDescriptor::Camera(i) => format!("camera {}", i),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::{process_frame, run_source, tests::RecordingDetector};
    use crate::domain::source::SourceState;
    use std::ops::ControlFlow;
    use std::path::PathBuf;

    #[test]
    fn nonexistent_video_is_unavailable() {
        let err = LocalMediaOpener::new()
            .open(&SourceDescriptor::VideoFile(PathBuf::from("/nonexistent/default_video.mp4")))
            .err();
        assert!(matches!(err, Some(DomainError::SourceUnavailable(_))));
    }

    #[test]
    fn gif_video_is_processed_frame_by_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.GIF");
        animation::tests::write_gif(&path, 6);

        let mut source = LocalMediaOpener::new().open(&SourceDescriptor::VideoFile(path)).unwrap();
        let mut det = RecordingDetector::default();
        let mut sent = 0;
        let processed = run_source(source.as_mut(), |f| process_frame(&mut det, f, 0.4, false), |_, out| {
            assert_eq!(out.rendered.dimensions(), (720, 405));
            sent += 1;
            ControlFlow::Continue(())
        })
        .unwrap();

        assert_eq!(processed, 6);
        assert_eq!(sent, 6);
        assert_eq!(det.seen.len(), 6);
        assert_eq!(source.state(), SourceState::Exhausted);
    }

    #[test]
    fn reported_extensions_follow_enabled_backends() {
        let exts = LocalMediaOpener::new().video_extensions();
        assert!(exts.contains(&"gif") && exts.contains(&"webp"));
        assert_eq!(exts.contains(&"mp4"), cfg!(feature = "opencv"));
    }

    #[cfg(feature = "opencv")]
    #[test]
    fn container_video_is_processed_frame_by_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.avi");
        opencv_video::tests::write_clip(&path, 8);

        let mut source = LocalMediaOpener::new().open(&SourceDescriptor::VideoFile(path)).unwrap();
        let mut det = RecordingDetector::default();
        let processed = run_source(source.as_mut(), |f| process_frame(&mut det, f, 0.4, false), |_, _| {
            ControlFlow::Continue(())
        })
        .unwrap();
        assert_eq!(processed, 8);
        assert_eq!(det.seen.len(), 8);
        assert_eq!(source.state(), SourceState::Exhausted);
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn container_video_names_the_missing_backend() {
        let file = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
        let err = LocalMediaOpener::new()
            .open(&SourceDescriptor::VideoFile(file.path().to_path_buf()))
            .err();
        assert!(matches!(err, Some(DomainError::SourceUnavailable(ref m)) if m.contains("opencv")));
    }

    #[test]
    fn image_bytes_open_as_single_frame() {
        let mut png = Vec::new();
        image::RgbImage::new(4, 4)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let mut source = LocalMediaOpener::new().open(&SourceDescriptor::ImageBytes(png)).unwrap();
        assert!(source.next_frame().is_some());
        assert!(source.next_frame().is_none());
    }
}
