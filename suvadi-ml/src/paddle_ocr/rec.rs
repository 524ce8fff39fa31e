use std::fs;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use image::{DynamicImage, imageops::FilterType};
use ndarray::{Array4, ArrayView2, Axis, Ix2};
use ort::{session::Session, value::Value};
use tracing::instrument;

use crate::Device;

const INPUT_HEIGHT: u32 = 48;
// Narrow crops are padded up to the nominal PP-OCR recognition width.
const MIN_INPUT_WIDTH: u32 = 320;

/// CTC text recognizer over a character dictionary.
pub struct TextRecognizer {
    session: Session,
    input_name: String,
    dictionary: Vec<String>,
}

impl TextRecognizer {
    pub fn new(model_path: &Path, dict_path: &Path, device: Device) -> Result<Self> {
        let session = super::load_session(model_path, device)?;
        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .context("recognition model declares no inputs")?;
        let dictionary = load_dictionary(dict_path)?;
        Ok(Self {
            session,
            input_name,
            dictionary,
        })
    }

    /// Recognize a single rectified text-line crop, returning the decoded
    /// text and the mean probability of the kept timesteps.
    #[instrument(level = "debug", skip_all)]
    pub fn recognize(&mut self, crop: &DynamicImage) -> Result<(String, f32)> {
        let input = preprocess(crop);
        let input_value = Value::from_array(input)?;
        let outputs = self.session.run(ort::inputs![&self.input_name => input_value])?;
        let probs = outputs[0].try_extract_array::<f32>()?;
        ensure!(
            probs.ndim() == 3,
            "recognition output must be (batch, timesteps, classes), got {:?}",
            probs.shape()
        );

        let probs = probs
            .index_axis(Axis(0), 0)
            .into_dimensionality::<Ix2>()?;
        Ok(ctc_decode(&probs, &self.dictionary))
    }
}

/// Character dictionary: model class `i` maps to line `i - 1` (class 0 is the
/// CTC blank), with a trailing space entry appended.
fn load_dictionary(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read dictionary {}", path.display()))?;
    let mut characters: Vec<String> = content.lines().map(str::to_string).collect();
    characters.push(" ".to_string());
    Ok(characters)
}

/// Scale to the fixed input height, keep the aspect ratio, zero-pad narrow
/// crops up to the nominal width.
fn preprocess(crop: &DynamicImage) -> Array4<f32> {
    let (w, h) = (crop.width().max(1), crop.height().max(1));
    let ratio = w as f32 / h as f32;
    let scaled_w = ((INPUT_HEIGHT as f32 * ratio).ceil() as u32).max(1);
    let input_w = scaled_w.max(MIN_INPUT_WIDTH);
    let rgb = crop
        .resize_exact(scaled_w, INPUT_HEIGHT, FilterType::Triangle)
        .to_rgb8();

    let mut input = Array4::zeros((1, 3, INPUT_HEIGHT as usize, input_w as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            input[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - 0.5) / 0.5;
        }
    }
    input
}

/// Greedy CTC decode of a (timesteps, classes) probability matrix: argmax per
/// timestep, skip blanks, collapse consecutive repeats. A repeat separated by
/// a blank is a genuine double character and survives.
fn ctc_decode(probs: &ArrayView2<'_, f32>, dictionary: &[String]) -> (String, f32) {
    let mut text = String::new();
    let mut kept_scores = Vec::new();
    let mut prev_index: Option<usize> = None;

    for row in probs.rows() {
        let (index, score) = row
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((0, 0.0));

        if index == 0 {
            prev_index = None;
            continue;
        }
        if prev_index == Some(index) {
            continue;
        }
        prev_index = Some(index);

        if let Some(character) = dictionary.get(index - 1) {
            text.push_str(character);
            kept_scores.push(score);
        }
    }

    let confidence = if kept_scores.is_empty() {
        0.0
    } else {
        kept_scores.iter().sum::<f32>() / kept_scores.len() as f32
    };
    (text, confidence)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use ndarray::Array2;

    use super::*;

    fn dictionary() -> Vec<String> {
        vec!["அ".to_string(), "ஆ".to_string(), " ".to_string()]
    }

    fn probs(rows: &[[f32; 4]]) -> Array2<f32> {
        Array2::from_shape_vec((rows.len(), 4), rows.iter().flatten().copied().collect())
            .unwrap()
    }

    #[test]
    fn decode_skips_blanks_and_collapses_repeats() {
        // argmax sequence: அ அ blank அ ஆ
        let matrix = probs(&[
            [0.1, 0.8, 0.05, 0.05],
            [0.1, 0.7, 0.1, 0.1],
            [0.9, 0.05, 0.03, 0.02],
            [0.1, 0.6, 0.2, 0.1],
            [0.05, 0.05, 0.85, 0.05],
        ]);
        let (text, confidence) = ctc_decode(&matrix.view(), &dictionary());
        assert_eq!(text, "அஅஆ");
        let expected = (0.8 + 0.6 + 0.85) / 3.0;
        assert!((confidence - expected).abs() < 1e-6);
    }

    #[test]
    fn all_blank_decodes_to_empty_with_zero_confidence() {
        let matrix = probs(&[[1.0, 0.0, 0.0, 0.0], [0.9, 0.1, 0.0, 0.0]]);
        let (text, confidence) = ctc_decode(&matrix.view(), &dictionary());
        assert_eq!(text, "");
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn out_of_dictionary_indices_are_dropped() {
        let short = vec!["அ".to_string()];
        // argmax index 3 has no dictionary entry once blank is accounted for.
        let matrix = probs(&[[0.0, 0.1, 0.1, 0.8]]);
        let (text, confidence) = ctc_decode(&matrix.view(), &short);
        assert_eq!(text, "");
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn dictionary_appends_space_and_shifts_past_blank() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "அ")?;
        writeln!(file, "ஆ")?;
        let characters = load_dictionary(file.path())?;
        assert_eq!(characters, vec!["அ", "ஆ", " "]);
        Ok(())
    }

    #[test]
    fn narrow_crops_pad_to_nominal_width() {
        let crop = DynamicImage::new_rgb8(24, 48);
        let input = preprocess(&crop);
        assert_eq!(input.shape(), &[1, 3, 48, 320]);
    }

    #[test]
    fn wide_crops_keep_their_aspect_ratio() {
        let crop = DynamicImage::new_rgb8(480, 48);
        let input = preprocess(&crop);
        assert_eq!(input.shape(), &[1, 3, 48, 480]);
    }
}
