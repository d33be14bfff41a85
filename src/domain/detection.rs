use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Pixel-space outline of a detected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Geometry {
    Rect { x1: f32, y1: f32, x2: f32, y2: f32 },
    Polygon { points: Vec<(f32, f32)> },
}

impl Geometry {
    /// Axis-aligned bounds as `(x1, y1, x2, y2)`.
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        match self {
            Geometry::Rect { x1, y1, x2, y2 } => (*x1, *y1, *x2, *y2),
            Geometry::Polygon { points } => points.iter().fold(
                (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
                |(x1, y1, x2, y2), &(x, y)| (x1.min(x), y1.min(y), x2.max(x), y2.max(y)),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub label: String,
    pub class_id: usize,
    pub score: f32,
    pub geometry: Geometry,
}

/// Regions in descending score order plus the frame they were drawn on.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub regions: Vec<Region>,
    pub rendered: RgbImage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polygon_bounds_cover_all_points() {
        let g = Geometry::Polygon {
            points: vec![(4.0, 2.0), (10.0, 7.5), (1.0, 9.0)],
        };
        assert_eq!(g.bounds(), (1.0, 2.0, 10.0, 9.0));
    }

    #[test]
    fn geometry_is_tagged_in_json() {
        let g = Geometry::Rect { x1: 0.0, y1: 1.0, x2: 2.0, y2: 3.0 };
        let json = serde_json::to_value(&g).unwrap();
        assert_eq!(json["kind"], "rect");
        assert_eq!(json["x2"], 2.0);
    }
}
