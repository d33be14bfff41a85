use ab_glyph::FontVec;
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_polygon_mut, draw_hollow_rect_mut, draw_polygon_mut, draw_text_mut,
    text_size,
};
use imageproc::point::Point;
use imageproc::rect::Rect;
use std::sync::OnceLock;
use tracing::debug;

use crate::domain::detection::{Geometry, Region};

const PALETTE: [[u8; 3]; 10] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [26, 147, 52],
    [0, 212, 187],
    [52, 69, 147],
    [203, 56, 255],
];
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const BOX_THICKNESS: i32 = 2;
const FONT_SCALE: f32 = 16.0;
const MASK_ALPHA: f32 = 0.4;

static FONT: OnceLock<Option<FontVec>> = OnceLock::new();

fn system_font() -> Option<&'static FontVec> {
    FONT.get_or_init(|| {
        let font_paths = [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/System/Library/Fonts/Supplemental/Arial.ttf",
            "C:\\Windows\\Fonts\\arial.ttf",
        ];
        for path in font_paths {
            if let Ok(data) = std::fs::read(path) {
                if let Ok(font) = FontVec::try_from_vec(data) {
                    debug!("caption font: {}", path);
                    return Some(font);
                }
            }
        }
        debug!("no system font found, captions disabled");
        None
    })
    .as_ref()
}

pub fn class_color(class_id: usize) -> Rgb<u8> {
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// Draws every region onto `img`: masks first, then outlines and boxes, so
/// the outlines stay visible.
pub fn draw_regions(img: &mut RgbImage, regions: &[Region]) {
    for region in regions {
        if let Geometry::Polygon { points } = &region.geometry {
            fill_polygon(img, points, class_color(region.class_id));
        }
    }
    for region in regions {
        let color = class_color(region.class_id);
        if let Geometry::Polygon { points } = &region.geometry {
            if points.len() >= 3 {
                let outline: Vec<Point<f32>> = points.iter().map(|&(x, y)| Point::new(x, y)).collect();
                draw_hollow_polygon_mut(img, &outline, color);
            }
        }
        let (x1, y1, x2, y2) = region.geometry.bounds();
        draw_box(img, x1, y1, x2, y2, color);
        draw_caption(img, region, color);
    }
}

fn draw_box(img: &mut RgbImage, x1: f32, y1: f32, x2: f32, y2: f32, color: Rgb<u8>) {
    let (w, h) = (img.width() as f32, img.height() as f32);
    let left = x1.clamp(0.0, w - 1.0) as i32;
    let top = y1.clamp(0.0, h - 1.0) as i32;
    let right = x2.clamp(0.0, w - 1.0) as i32;
    let bottom = y2.clamp(0.0, h - 1.0) as i32;
    if right <= left || bottom <= top {
        return;
    }
    for t in 0..BOX_THICKNESS {
        let width = (right - left + 1 - 2 * t).max(1) as u32;
        let height = (bottom - top + 1 - 2 * t).max(1) as u32;
        draw_hollow_rect_mut(img, Rect::at(left + t, top + t).of_size(width, height), color);
    }
}

fn fill_polygon(img: &mut RgbImage, points: &[(f32, f32)], color: Rgb<u8>) {
    let mut poly: Vec<Point<i32>> = points
        .iter()
        .map(|&(x, y)| Point::new(x.round() as i32, y.round() as i32))
        .collect();
    poly.dedup();
    if poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }
    if poly.len() < 3 {
        return;
    }

    let mut overlay = img.clone();
    draw_polygon_mut(&mut overlay, &poly, color);
    for (dst, src) in img.pixels_mut().zip(overlay.pixels()) {
        if *dst != *src {
            for c in 0..3 {
                dst[c] = (dst[c] as f32 * (1.0 - MASK_ALPHA) + src[c] as f32 * MASK_ALPHA) as u8;
            }
        }
    }
}

fn draw_caption(img: &mut RgbImage, region: &Region, color: Rgb<u8>) {
    let Some(font) = system_font() else { return };
    let text = format!("{} {:.2}", region.label, region.score);
    let (tw, th) = text_size(FONT_SCALE, font, &text);

    let (x1, y1, _, _) = region.geometry.bounds();
    let x = x1.max(0.0) as i32;
    let y = (y1 - th as f32 - 4.0).max(0.0) as i32;
    if x >= img.width() as i32 || y >= img.height() as i32 {
        return;
    }
    draw_filled_rect_mut(img, Rect::at(x, y).of_size(tw + 4, th + 4), color);
    draw_text_mut(img, TEXT_COLOR, x + 2, y + 2, FONT_SCALE, font, &text);
}
