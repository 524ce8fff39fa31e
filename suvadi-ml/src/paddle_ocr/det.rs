use std::path::Path;

use anyhow::{Context, Result, ensure};
use image::{DynamicImage, GrayImage, Luma, imageops::FilterType};
use imageproc::contours::{BorderType, find_contours};
use imageproc::drawing::draw_polygon_mut;
use imageproc::geometry::min_area_rect;
use imageproc::point::Point;
use ndarray::{Array4, ArrayViewD};
use ort::{session::Session, value::Value};
use tracing::{debug, instrument};

use super::dist;
use crate::Device;

// ImageNet statistics, as used by DBNet's preprocessing.
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];
// DBNet wants both sides as multiples of 32, longest side capped.
const LIMIT_SIDE_LEN: u32 = 960;
const MIN_BOX_SIDE: f32 = 3.0;
const UNCLIP_RATIO: f32 = 1.5;
const MAX_CANDIDATES: usize = 1000;
const SORT_Y_TOLERANCE: f32 = 10.0;

/// A detected text region: four corners in source-image coordinates, ordered
/// top-left, top-right, bottom-right, bottom-left, plus the mean probability
/// the detector assigned to the region.
#[derive(Debug, Clone)]
pub struct TextBox {
    pub points: [[f32; 2]; 4],
    pub score: f32,
}

impl TextBox {
    /// Axis-aligned [x_min, y_min, x_max, y_max] around the quad.
    pub fn bounding(&self) -> [i32; 4] {
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for [x, y] in self.points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        [
            min_x.floor() as i32,
            min_y.floor() as i32,
            max_x.ceil() as i32,
            max_y.ceil() as i32,
        ]
    }
}

/// DBNet text detector.
pub struct TextDetector {
    session: Session,
    input_name: String,
    thresh: f32,
    box_thresh: f32,
}

impl TextDetector {
    pub fn new(model_path: &Path, device: Device, thresh: f32, box_thresh: f32) -> Result<Self> {
        let session = super::load_session(model_path, device)?;
        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .context("detection model declares no inputs")?;
        Ok(Self {
            session,
            input_name,
            thresh,
            box_thresh,
        })
    }

    /// Find text regions in the image, ordered top-to-bottom.
    #[instrument(level = "debug", skip_all)]
    pub fn detect(&mut self, image: &DynamicImage) -> Result<Vec<TextBox>> {
        let original = (image.width(), image.height());
        let resized = resized_dimensions(original.0, original.1);
        let input = preprocess(image, resized);

        let input_value = Value::from_array(input)?;
        let outputs = self.session.run(ort::inputs![&self.input_name => input_value])?;
        let prob_map = outputs[0].try_extract_array::<f32>()?;
        ensure!(
            prob_map.ndim() == 4,
            "detection output must be (1, 1, h, w), got {:?}",
            prob_map.shape()
        );

        let boxes = boxes_from_prob_map(
            &prob_map.view(),
            self.thresh,
            self.box_thresh,
            resized,
            original,
        );
        debug!(boxes = boxes.len(), "detection finished");

        Ok(sort_boxes(boxes))
    }
}

/// Target size for the detector input: longest side capped at
/// `LIMIT_SIDE_LEN`, both sides rounded to multiples of 32.
fn resized_dimensions(width: u32, height: u32) -> (u32, u32) {
    let longest = width.max(height) as f32;
    let scale = if longest > LIMIT_SIDE_LEN as f32 {
        LIMIT_SIDE_LEN as f32 / longest
    } else {
        1.0
    };
    (
        round_to_multiple_of_32(width as f32 * scale),
        round_to_multiple_of_32(height as f32 * scale),
    )
}

fn round_to_multiple_of_32(side: f32) -> u32 {
    (((side / 32.0).round() as u32) * 32).max(32)
}

#[instrument(level = "debug", skip_all)]
fn preprocess(image: &DynamicImage, resized: (u32, u32)) -> Array4<f32> {
    let rgb = image
        .resize_exact(resized.0, resized.1, FilterType::Triangle)
        .to_rgb8();
    let mut input = Array4::zeros((1, 3, resized.1 as usize, resized.0 as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            input[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
        }
    }
    input
}

#[instrument(level = "debug", skip_all)]
fn boxes_from_prob_map(
    prob_map: &ArrayViewD<'_, f32>,
    thresh: f32,
    box_thresh: f32,
    resized: (u32, u32),
    original: (u32, u32),
) -> Vec<TextBox> {
    let map_h = prob_map.shape()[2];
    let map_w = prob_map.shape()[3];

    let mut mask = GrayImage::new(map_w as u32, map_h as u32);
    for y in 0..map_h {
        for x in 0..map_w {
            if prob_map[[0, 0, y, x]] > thresh {
                mask.put_pixel(x as u32, y as u32, Luma([255]));
            }
        }
    }

    let ratio_w = original.0 as f32 / resized.0 as f32;
    let ratio_h = original.1 as f32 / resized.1 as f32;

    let mut boxes = Vec::new();
    for contour in find_contours::<i32>(&mask)
        .iter()
        .take(MAX_CANDIDATES)
    {
        if contour.border_type != BorderType::Outer || contour.points.len() < 4 {
            continue;
        }

        let rect = min_area_rect(&contour.points);
        let quad = order_points(rect.map(|p| [p.x as f32, p.y as f32]));
        let top = dist(quad[0], quad[1]);
        let side = dist(quad[0], quad[3]);
        if top.min(side) < MIN_BOX_SIDE {
            continue;
        }

        let score = box_score(prob_map, &rect, map_w, map_h);
        if score < box_thresh {
            continue;
        }

        let expanded = unclip(&quad, UNCLIP_RATIO);
        let points = expanded.map(|[x, y]| {
            [
                (x * ratio_w).clamp(0.0, original.0 as f32 - 1.0),
                (y * ratio_h).clamp(0.0, original.1 as f32 - 1.0),
            ]
        });

        boxes.push(TextBox { points, score });
    }

    boxes
}

/// Mean probability over the filled minimum-area rectangle.
fn box_score(prob_map: &ArrayViewD<'_, f32>, rect: &[Point<i32>; 4], map_w: usize, map_h: usize) -> f32 {
    let min_x = rect.iter().map(|p| p.x).min().unwrap_or(0).clamp(0, map_w as i32 - 1);
    let max_x = rect.iter().map(|p| p.x).max().unwrap_or(0).clamp(0, map_w as i32 - 1);
    let min_y = rect.iter().map(|p| p.y).min().unwrap_or(0).clamp(0, map_h as i32 - 1);
    let max_y = rect.iter().map(|p| p.y).max().unwrap_or(0).clamp(0, map_h as i32 - 1);

    let width = (max_x - min_x + 1) as u32;
    let height = (max_y - min_y + 1) as u32;
    let mut region = GrayImage::new(width, height);
    let shifted: Vec<Point<i32>> = rect
        .iter()
        .map(|p| Point::new(p.x - min_x, p.y - min_y))
        .collect();
    if shifted.first() == shifted.last() {
        return 0.0;
    }
    draw_polygon_mut(&mut region, &shifted, Luma([255]));

    let mut sum = 0.0;
    let mut count = 0u32;
    for y in 0..height {
        for x in 0..width {
            if region.get_pixel(x, y)[0] > 0 {
                sum += prob_map[[0, 0, (min_y as u32 + y) as usize, (min_x as u32 + x) as usize]];
                count += 1;
            }
        }
    }
    if count == 0 { 0.0 } else { sum / count as f32 }
}

/// Reorder four corners to top-left, top-right, bottom-right, bottom-left.
fn order_points(mut quad: [[f32; 2]; 4]) -> [[f32; 2]; 4] {
    quad.sort_by(|a, b| a[0].total_cmp(&b[0]));
    let (left_top, left_bottom) = if quad[0][1] <= quad[1][1] {
        (quad[0], quad[1])
    } else {
        (quad[1], quad[0])
    };
    let (right_top, right_bottom) = if quad[2][1] <= quad[3][1] {
        (quad[2], quad[3])
    } else {
        (quad[3], quad[2])
    };
    [left_top, right_top, right_bottom, left_bottom]
}

/// Grow the box outward by `area * ratio / perimeter` on every side, in the
/// rectangle's own frame. Recovers the glyph extent DBNet's shrink step
/// removed.
fn unclip(quad: &[[f32; 2]; 4], ratio: f32) -> [[f32; 2]; 4] {
    let width = dist(quad[0], quad[1]);
    let height = dist(quad[0], quad[3]);
    let area = width * height;
    let perimeter = 2.0 * (width + height);
    if perimeter <= f32::EPSILON {
        return *quad;
    }
    let offset = area * ratio / perimeter;

    let unit_x = [
        (quad[1][0] - quad[0][0]) / width,
        (quad[1][1] - quad[0][1]) / width,
    ];
    let unit_y = [
        (quad[3][0] - quad[0][0]) / height,
        (quad[3][1] - quad[0][1]) / height,
    ];
    let shift = |p: [f32; 2], sx: f32, sy: f32| {
        [
            p[0] + offset * (sx * unit_x[0] + sy * unit_y[0]),
            p[1] + offset * (sx * unit_x[1] + sy * unit_y[1]),
        ]
    };

    [
        shift(quad[0], -1.0, -1.0),
        shift(quad[1], 1.0, -1.0),
        shift(quad[2], 1.0, 1.0),
        shift(quad[3], -1.0, 1.0),
    ]
}

/// Order boxes top-to-bottom; boxes within `SORT_Y_TOLERANCE` vertically are
/// treated as one row and ordered left-to-right.
fn sort_boxes(mut boxes: Vec<TextBox>) -> Vec<TextBox> {
    boxes.sort_by(|a, b| {
        a.points[0][1]
            .total_cmp(&b.points[0][1])
            .then(a.points[0][0].total_cmp(&b.points[0][0]))
    });
    for i in 0..boxes.len().saturating_sub(1) {
        for j in (0..=i).rev() {
            if (boxes[j + 1].points[0][1] - boxes[j].points[0][1]).abs() < SORT_Y_TOLERANCE
                && boxes[j + 1].points[0][0] < boxes[j].points[0][0]
            {
                boxes.swap(j, j + 1);
            } else {
                break;
            }
        }
    }
    boxes
}
