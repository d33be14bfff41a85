use anyhow::{anyhow, Result};
use image::{ImageFormat, RgbImage};
use tracing::{info, warn};
use v4l::buffer::Type;
use v4l::format::FourCC;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::Device;

use crate::application::ports::FrameSource;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::source::SourceState;

/// Requested capture mode; the driver may round it to the nearest supported one.
pub struct CaptureConfig {
    pub camera_path: String,
    pub fourcc: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl CaptureConfig {
    pub fn for_index(index: u32) -> Self {
        Self {
            camera_path: format!("/dev/video{}", index),
            fourcc: "MJPG".into(),
            width: 1280,
            height: 720,
            fps: 30,
        }
    }
}

/// Live V4L2 camera read through an MMAP stream.
pub struct V4l2Capture {
    stream: Option<Stream<'static>>,
    fourcc: FourCC,
    width: u32,
    height: u32,
    frames: u64,
}

impl V4l2Capture {
    pub fn open(cfg: &CaptureConfig) -> DomainResult<Self> {
        Self::try_open(cfg).map_err(|e| DomainError::SourceUnavailable(format!("{}: {:#}", cfg.camera_path, e)))
    }

    fn try_open(cfg: &CaptureConfig) -> Result<Self> {
        let dev = Device::with_path(&cfg.camera_path)?;

        let mut fmt = dev.format()?;
        let b = cfg.fourcc.as_bytes();
        if b.len() != 4 {
            return Err(anyhow!("FourCC must be 4 characters"));
        }
        fmt.fourcc = FourCC::new(&[b[0], b[1], b[2], b[3]]);
        fmt.width = cfg.width;
        fmt.height = cfg.height;
        let actual_fmt = dev.set_format(&fmt)?;

        let mut params = dev.params()?;
        params.interval.numerator = 1;
        params.interval.denominator = cfg.fps;
        let _ = dev.set_params(&params);

        // The stream keeps its own handle on the device.
        let stream = Stream::with_buffers(&dev, Type::VideoCapture, 4)?;

        info!(
            "camera opened: {}x{} [{}] at {} fps",
            actual_fmt.width, actual_fmt.height, actual_fmt.fourcc, cfg.fps
        );

        Ok(Self {
            stream: Some(stream),
            fourcc: actual_fmt.fourcc,
            width: actual_fmt.width,
            height: actual_fmt.height,
            frames: 0,
        })
    }

    fn next_rgb(&mut self) -> Result<RgbImage> {
        let stream = self.stream.as_mut().ok_or_else(|| anyhow!("capture stopped"))?;
        let (data, _) = stream.next()?;
        let fcc_str = self.fourcc.str().map_err(|_| anyhow!("invalid FourCC"))?;

        match fcc_str {
            "MJPG" => Ok(image::load_from_memory_with_format(data, ImageFormat::Jpeg)?.to_rgb8()),
            "YUYV" => Ok(yuyv_to_rgb(data, self.width, self.height)),
            _ => Err(anyhow!("camera format {} is not supported", fcc_str)),
        }
    }
}

impl FrameSource for V4l2Capture {
    fn state(&self) -> SourceState {
        if self.stream.is_some() { SourceState::Open } else { SourceState::Stopped }
    }

    // A failed read ends the stream, same as running out of frames.
    fn next_frame(&mut self) -> Option<RgbImage> {
        match self.next_rgb() {
            Ok(frame) => {
                self.frames += 1;
                Some(frame)
            }
            Err(e) => {
                if self.stream.take().is_some() {
                    warn!("camera read failed after {} frames: {}", self.frames, e);
                }
                None
            }
        }
    }
}

/// YUYV (YUV 4:2:2) to RGB, BT.601.
fn yuyv_to_rgb(yuyv: &[u8], w: u32, h: u32) -> RgbImage {
    let mut out = RgbImage::new(w, h);
    if w == 0 {
        return out;
    }

    // Each 4-byte block [Y0, U, Y1, V] carries two pixels.
    for (i, chunk) in yuyv.chunks_exact(4).enumerate() {
        let y0 = chunk[0] as f32;
        let u = chunk[1] as f32 - 128.0;
        let y1 = chunk[2] as f32;
        let v = chunk[3] as f32 - 128.0;

        let pixel_idx = i as u32 * 2;
        let x = pixel_idx % w;
        let y = pixel_idx / w;
        if y >= h {
            break;
        }
        out.put_pixel(x, y, yuv_pixel(y0, u, v));
        if x + 1 < w {
            out.put_pixel(x + 1, y, yuv_pixel(y1, u, v));
        }
    }
    out
}

fn yuv_pixel(y: f32, u: f32, v: f32) -> image::Rgb<u8> {
    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
    image::Rgb([r, g, b])
}
