use anyhow::{anyhow, bail, Result};
use image::{imageops::FilterType, RgbImage};
use ndarray::{Array3, ArrayD, Axis, Ix2, Ix3, IxDyn};
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::Session;
use ort::value::Tensor;
use std::fs;
use std::path::Path;
use tracing::debug;

use super::annotate::draw_regions;
use super::postprocess::{decode_candidates, instance_mask, mask_outline, non_max_suppression, Candidate};
use crate::application::ports::Detector;
use crate::domain::detection::{DetectionResult, Geometry, Region};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::model::YoloParams;

const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

pub struct OnnxYoloEngine {
    session: Session,
    params: YoloParams,
}

impl OnnxYoloEngine {
    pub fn load(path: &Path) -> Result<Self> {
        let mut builder = Session::builder()?.with_intra_threads(4)?;

        // CUDA when the runtime has it, CPU otherwise.
        let cuda = CUDAExecutionProvider::default().build();
        if let Ok(builder_with_cuda) = builder.clone().with_execution_providers([cuda]) {
            builder = builder_with_cuda;
        }

        let model_bytes = fs::read(path)?;
        if model_bytes.is_empty() {
            bail!("weights file is empty");
        }
        let session = builder.commit_from_memory(&model_bytes)?;

        Ok(Self { session, params: YoloParams::default() })
    }

    pub fn infer_with(&mut self, rgb: &RgbImage, params: &YoloParams) -> Result<Vec<Region>> {
        if rgb.width() == 0 || rgb.height() == 0 {
            bail!("empty image {}x{}", rgb.width(), rgb.height());
        }

        let imgsz = params.input_size as usize;
        let resized = image::imageops::resize(rgb, imgsz as u32, imgsz as u32, FilterType::Triangle);

        let mut input = Array3::<f32>::zeros((3, imgsz, imgsz));
        for (x, y, pixel) in resized.enumerate_pixels() {
            input[[0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
            input[[1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
            input[[2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
        }

        let input_shape = vec![1i64, 3, imgsz as i64, imgsz as i64];
        let input_tensor = Tensor::from_array((input_shape, input.into_raw_vec_and_offset().0))?;

        let outputs = self.session.run(ort::inputs![input_tensor])?;
        let head = extract(&outputs[0])?;
        let protos = if outputs.len() > 1 { Some(extract(&outputs[1])?) } else { None };
        drop(outputs);

        // [1, C, N] -> [C, N]; [1, nm, mh, mw] -> [nm, mh, mw]
        let head = head.index_axis_move(Axis(0), 0).into_dimensionality::<Ix2>()?;
        let protos = protos
            .map(|p| p.index_axis_move(Axis(0), 0).into_dimensionality::<Ix3>())
            .transpose()?;
        let num_masks = protos.as_ref().map_or(0, |p| p.shape()[0]);

        let candidates = decode_candidates(head.view(), num_masks, params.conf_threshold);
        let kept = non_max_suppression(candidates, params.iou_threshold, params.max_detections);
        debug!("{} candidates kept after nms", kept.len());

        let sx = rgb.width() as f32 / imgsz as f32;
        let sy = rgb.height() as f32 / imgsz as f32;

        Ok(kept
            .into_iter()
            .map(|c| {
                let geometry = match &protos {
                    Some(p) => polygon_geometry(&c, p.view(), imgsz as f32, sx, sy),
                    None => rect_geometry(&c, sx, sy),
                };
                Region {
                    label: COCO_CLASSES.get(c.class_id).copied().unwrap_or("object").to_string(),
                    class_id: c.class_id,
                    score: c.score,
                    geometry,
                }
            })
            .collect())
    }
}

fn extract(value: &ort::value::DynValue) -> Result<ArrayD<f32>> {
    let (shape, data) = value.try_extract_tensor::<f32>()?;
    let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec()).map_err(|e| anyhow!("bad output shape: {e}"))
}

fn rect_geometry(c: &Candidate, sx: f32, sy: f32) -> Geometry {
    Geometry::Rect { x1: c.x1 * sx, y1: c.y1 * sy, x2: c.x2 * sx, y2: c.y2 * sy }
}

fn polygon_geometry(c: &Candidate, protos: ndarray::ArrayView3<f32>, input_size: f32, sx: f32, sy: f32) -> Geometry {
    let mask = instance_mask(c, protos, input_size);
    let kx = input_size / mask.width() as f32 * sx;
    let ky = input_size / mask.height() as f32 * sy;
    match mask_outline(&mask) {
        Some(points) => Geometry::Polygon {
            points: points.into_iter().map(|(x, y)| (x * kx, y * ky)).collect(),
        },
        None => rect_geometry(c, sx, sy),
    }
}

impl Detector for OnnxYoloEngine {
    fn infer(&mut self, image: &RgbImage, confidence: f32) -> DomainResult<DetectionResult> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DomainError::InferenceError("zero-size image".into()));
        }
        let params = YoloParams { conf_threshold: confidence, ..self.params.clone() };
        let regions = self
            .infer_with(image, &params)
            .map_err(|e| DomainError::InferenceError(e.to_string()))?;

        let mut rendered = image.clone();
        draw_regions(&mut rendered, &regions);
        Ok(DetectionResult { regions, rendered })
    }
}
