mod cls;
mod det;
mod rec;

use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use ort::session::{Session, builder::GraphOptimizationLevel};
use tracing::{debug, instrument};

use crate::{Device, OcrEngine, define_models, output::OcrOutput};

pub use det::TextBox;

const INTRA_THREADS: usize = 4;
// Rectified crops this much taller than wide are vertical text lines.
const VERTICAL_ASPECT: f32 = 1.5;

define_models! {
    Detection => ("monkt/paddleocr-onnx", "detection/v3/det.onnx"),
    Orientation => ("SWHL/RapidOCR", "ch_ppocr_mobile_v2.0_cls_infer.onnx"),
    Recognition => ("monkt/paddleocr-onnx", "languages/tamil/rec.onnx"),
    Dictionary => ("monkt/paddleocr-onnx", "languages/tamil/dict.txt"),
}

/// Engine configuration. The defaults mirror PaddleOCR's Tamil preset:
/// textline orientation correction on, CPU execution, detection thresholds
/// 0.3 (pixel) and 0.5 (box).
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub use_textline_orientation: bool,
    pub text_det_thresh: f32,
    pub text_det_box_thresh: f32,
    pub device: Device,
    /// Revalidate cached model files against the Hub at load time. Off by
    /// default so a warm cache starts without any network traffic.
    pub check_remote_models: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            use_textline_orientation: true,
            text_det_thresh: 0.3,
            text_det_box_thresh: 0.5,
            device: Device::Cpu,
            check_remote_models: false,
        }
    }
}

/// Three-stage PaddleOCR pipeline: text detection, optional textline
/// orientation correction, CTC text recognition.
pub struct PaddleOcr {
    detector: det::TextDetector,
    classifier: Option<cls::TextLineClassifier>,
    recognizer: rec::TextRecognizer,
}

impl PaddleOcr {
    /// Fetch the model files (cache-first) and build the inference sessions.
    pub fn load(config: OcrConfig) -> Result<Self> {
        let check_remote = config.check_remote_models;
        let detector = det::TextDetector::new(
            &Manifest::Detection.get(check_remote)?,
            config.device,
            config.text_det_thresh,
            config.text_det_box_thresh,
        )?;
        let classifier = if config.use_textline_orientation {
            Some(cls::TextLineClassifier::new(
                &Manifest::Orientation.get(check_remote)?,
                config.device,
            )?)
        } else {
            None
        };
        let recognizer = rec::TextRecognizer::new(
            &Manifest::Recognition.get(check_remote)?,
            &Manifest::Dictionary.get(check_remote)?,
            config.device,
        )?;

        Ok(Self {
            detector,
            classifier,
            recognizer,
        })
    }

    #[instrument(level = "debug", skip_all)]
    fn predict_image(
        &mut self,
        image: &DynamicImage,
    ) -> Result<(Vec<String>, Vec<f32>, Vec<TextBox>)> {
        let boxes = self.detector.detect(image)?;
        let rgb = image.to_rgb8();

        let mut texts = Vec::with_capacity(boxes.len());
        let mut scores = Vec::with_capacity(boxes.len());
        for text_box in &boxes {
            let mut crop = rectify_crop(&rgb, text_box)?;
            if let Some(classifier) = self.classifier.as_mut() {
                crop = classifier.orient(crop)?;
            }
            let (text, score) = self.recognizer.recognize(&crop)?;
            texts.push(text);
            scores.push(score);
        }
        debug!(lines = texts.len(), "recognition finished");

        Ok((texts, scores, boxes))
    }
}

impl OcrEngine for PaddleOcr {
    #[instrument(level = "debug", skip_all, fields(image = %image_path.display()))]
    fn predict(&mut self, image_path: &Path) -> Result<Vec<OcrOutput>> {
        let image = image::open(image_path)
            .with_context(|| format!("failed to open {}", image_path.display()))?;
        let (rec_texts, rec_scores, boxes) = self.predict_image(&image)?;

        Ok(vec![OcrOutput {
            input_path: image_path.to_path_buf(),
            rec_texts,
            rec_scores,
            rec_polys: boxes.iter().map(|b| b.points).collect(),
            rec_boxes: boxes.iter().map(|b| b.bounding()).collect(),
            image,
        }])
    }
}

fn load_session(path: &Path, device: Device) -> Result<Session> {
    let session = Session::builder()?
        .with_execution_providers(device.execution_providers())?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(INTRA_THREADS)?
        .commit_from_file(path)
        .with_context(|| format!("failed to load model {}", path.display()))?;
    Ok(session)
}

/// Perspective-rectify a quadrilateral region into an upright crop. Crops
/// that come out much taller than wide are vertical lines and get rotated so
/// the baseline runs horizontally.
fn rectify_crop(image: &RgbImage, text_box: &TextBox) -> Result<DynamicImage> {
    let p = &text_box.points;
    let width = dist(p[0], p[1]).max(dist(p[3], p[2])).round().max(1.0) as u32;
    let height = dist(p[0], p[3]).max(dist(p[1], p[2])).round().max(1.0) as u32;

    let from = [
        (p[0][0], p[0][1]),
        (p[1][0], p[1][1]),
        (p[2][0], p[2][1]),
        (p[3][0], p[3][1]),
    ];
    let to = [
        (0.0, 0.0),
        (width as f32, 0.0),
        (width as f32, height as f32),
        (0.0, height as f32),
    ];
    let projection =
        Projection::from_control_points(from, to).context("degenerate text box corners")?;

    let mut crop = RgbImage::new(width, height);
    warp_into(
        image,
        &projection,
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
        &mut crop,
    );

    let crop = DynamicImage::ImageRgb8(crop);
    if crop.height() as f32 >= crop.width() as f32 * VERTICAL_ASPECT {
        Ok(crop.rotate90())
    } else {
        Ok(crop)
    }
}

pub(crate) fn dist(a: [f32; 2], b: [f32; 2]) -> f32 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}
