//! Decoding of raw YOLOv8 heads into scored candidates.
//!
//! The detection head is `[4 + nc + nm, N]` per image: box center/size in
//! model-input pixels, one score per class, then `nm` mask coefficients for
//! segmentation exports (zero for plain detection).

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use ndarray::{s, ArrayView2, ArrayView3, Axis};

#[derive(Debug, Clone)]
pub struct Candidate {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
    pub class_id: usize,
    pub coeffs: Vec<f32>,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }
}

/// Keeps every anchor whose best class score is at least `conf`.
pub fn decode_candidates(head: ArrayView2<f32>, num_masks: usize, conf: f32) -> Vec<Candidate> {
    let rows = head.shape()[0];
    if rows <= 4 + num_masks {
        return Vec::new();
    }
    let num_classes = rows - 4 - num_masks;

    let mut out = Vec::new();
    for col in head.axis_iter(Axis(1)) {
        let scores = col.slice(s![4..4 + num_classes]);
        let Some((class_id, &score)) = scores
            .indexed_iter()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            continue;
        };
        if score.is_nan() || score < conf {
            continue;
        }
        let (cx, cy, w, h) = (col[0], col[1], col[2], col[3]);
        out.push(Candidate {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
            score,
            class_id,
            coeffs: col.slice(s![4 + num_classes..]).to_vec(),
        });
    }
    out
}

pub fn iou(a: &Candidate, b: &Candidate) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);
    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter <= 0.0 {
        return 0.0;
    }
    inter / (a.area() + b.area() - inter + f32::EPSILON)
}

/// Greedy per-class NMS. Output is sorted by descending score.
pub fn non_max_suppression(mut candidates: Vec<Candidate>, iou_thresh: f32, max_det: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<Candidate> = Vec::new();
    for c in candidates {
        if kept.len() >= max_det {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == c.class_id && iou(k, &c) >= iou_thresh);
        if !suppressed {
            kept.push(c);
        }
    }
    kept
}

/// Binary instance mask at prototype resolution, limited to the candidate box.
///
/// `protos` is `[nm, mh, mw]`; `input_size` is the square model input the box
/// coordinates refer to.
pub fn instance_mask(candidate: &Candidate, protos: ArrayView3<f32>, input_size: f32) -> GrayImage {
    let (mh, mw) = (protos.shape()[1], protos.shape()[2]);
    let mut mask = GrayImage::new(mw as u32, mh as u32);
    if candidate.coeffs.len() != protos.shape()[0] {
        return mask;
    }

    let kx = mw as f32 / input_size;
    let ky = mh as f32 / input_size;
    let x_lo = (candidate.x1 * kx).floor().max(0.0) as usize;
    let y_lo = (candidate.y1 * ky).floor().max(0.0) as usize;
    let x_hi = ((candidate.x2 * kx).ceil().max(0.0) as usize).min(mw);
    let y_hi = ((candidate.y2 * ky).ceil().max(0.0) as usize).min(mh);

    for y in y_lo..y_hi {
        for x in x_lo..x_hi {
            let logit: f32 = candidate
                .coeffs
                .iter()
                .zip(protos.slice(s![.., y, x]).iter())
                .map(|(c, p)| c * p)
                .sum();
            // sigmoid(logit) > 0.5 <=> logit > 0
            if logit > 0.0 {
                mask.put_pixel(x as u32, y as u32, image::Luma([255]));
            }
        }
    }
    mask
}

/// Largest outer contour of a binary mask, in mask pixel coordinates.
pub fn mask_outline(mask: &GrayImage) -> Option<Vec<(f32, f32)>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.points.len() >= 3)
        .max_by_key(|c| c.points.len())
        .map(|c| c.points.iter().map(|p| (p.x as f32, p.y as f32)).collect())
}
