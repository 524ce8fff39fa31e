use std::path::Path;

use anyhow::{Context, Result, ensure};
use image::{DynamicImage, imageops::FilterType};
use ndarray::Array4;
use ort::{session::Session, value::Value};
use tracing::instrument;

use crate::Device;

const INPUT_HEIGHT: u32 = 48;
const INPUT_WIDTH: u32 = 192;
// Only flip when the model is clearly sure; a wrong flip is worse than none.
const ROTATE_THRESHOLD: f32 = 0.9;

/// Text-line orientation classifier. Decides whether a rectified crop is
/// upside down and needs a 180 degree flip before recognition.
pub struct TextLineClassifier {
    session: Session,
    input_name: String,
}

impl TextLineClassifier {
    pub fn new(model_path: &Path, device: Device) -> Result<Self> {
        let session = super::load_session(model_path, device)?;
        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .context("orientation model declares no inputs")?;
        Ok(Self {
            session,
            input_name,
        })
    }

    /// Returns the crop rotated 180 degrees when the model is confident it is
    /// upside down, otherwise the crop unchanged.
    #[instrument(level = "debug", skip_all)]
    pub fn orient(&mut self, crop: DynamicImage) -> Result<DynamicImage> {
        let input = preprocess(&crop);
        let input_value = Value::from_array(input)?;
        let outputs = self.session.run(ort::inputs![&self.input_name => input_value])?;
        let scores = outputs[0].try_extract_array::<f32>()?;
        ensure!(
            scores.ndim() == 2 && scores.shape()[1] == 2,
            "orientation output must be (1, 2), got {:?}",
            scores.shape()
        );

        // One probability per label, [0deg, 180deg].
        let inverted = scores[[0, 1]];
        if inverted > scores[[0, 0]] && inverted > ROTATE_THRESHOLD {
            Ok(crop.rotate180())
        } else {
            Ok(crop)
        }
    }
}

/// Scale to the fixed input height, cap the width, zero-pad the remainder.
fn preprocess(crop: &DynamicImage) -> Array4<f32> {
    let (w, h) = (crop.width().max(1), crop.height().max(1));
    let scaled_w = ((INPUT_HEIGHT as f32 / h as f32) * w as f32).ceil() as u32;
    let scaled_w = scaled_w.clamp(1, INPUT_WIDTH);
    let rgb = crop
        .resize_exact(scaled_w, INPUT_HEIGHT, FilterType::Triangle)
        .to_rgb8();

    let mut input = Array4::zeros((1, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            input[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - 0.5) / 0.5;
        }
    }
    input
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_is_height_capped_and_padded() {
        let crop = DynamicImage::new_rgb8(400, 20);
        let input = preprocess(&crop);
        assert_eq!(input.shape(), &[1, 3, 48, 192]);
    }

    #[test]
    fn white_maps_to_one_and_padding_stays_zero() {
        let mut img = image::RgbImage::new(10, 10);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([255, 255, 255]);
        }
        let input = preprocess(&DynamicImage::ImageRgb8(img));
        // 10x10 scales to 48x48; columns past that are padding.
        assert!((input[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert_eq!(input[[0, 0, 0, 100]], 0.0);
    }
}
