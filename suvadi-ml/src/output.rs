use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{DynamicImage, Rgba};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use serde::{Deserialize, Serialize};

/// Per-image result object produced by the OCR pipeline.
///
/// Serializes to the `<stem>_res.json` record downstream consumers read back.
/// The decoded source image rides along unserialized so the visualization can
/// be drawn without a second decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrOutput {
    pub input_path: PathBuf,
    pub rec_texts: Vec<String>,
    pub rec_scores: Vec<f32>,
    pub rec_polys: Vec<[[f32; 2]; 4]>,
    /// Axis-aligned [x_min, y_min, x_max, y_max] per detected region.
    pub rec_boxes: Vec<[i32; 4]>,
    #[serde(skip, default = "empty_image")]
    pub image: DynamicImage,
}

fn empty_image() -> DynamicImage {
    DynamicImage::new_rgb8(0, 0)
}

impl OcrOutput {
    fn stem(&self) -> Result<&str> {
        self.input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .context("input path has no usable file stem")
    }

    /// Write the structured record as `<stem>_res.json` and return its path.
    pub fn save_to_json(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(format!("{}_res.json", self.stem()?));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Draw the detected boxes over the source image and write it as
    /// `<stem>_res.png`, returning its path.
    pub fn save_to_img(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(format!("{}_res.png", self.stem()?));
        let mut canvas = self.image.to_rgba8();
        for bbox in &self.rec_boxes {
            let [x_min, y_min, x_max, y_max] = *bbox;
            if x_max <= x_min || y_max <= y_min {
                continue;
            }
            draw_hollow_rect_mut(
                &mut canvas,
                Rect::at(x_min, y_min).of_size((x_max - x_min) as u32, (y_max - y_min) as u32),
                Rgba([255, 0, 0, 255]),
            );
        }
        canvas
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OcrOutput {
        OcrOutput {
            input_path: PathBuf::from("/tmp/page.jpeg"),
            rec_texts: vec!["வணக்கம்".to_string()],
            rec_scores: vec![0.87],
            rec_polys: vec![[[2.0, 3.0], [12.0, 3.0], [12.0, 8.0], [2.0, 8.0]]],
            rec_boxes: vec![[2, 3, 12, 8]],
            image: DynamicImage::new_rgb8(16, 16),
        }
    }

    #[test]
    fn json_filename_follows_input_stem() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = sample().save_to_json(dir.path())?;
        assert_eq!(path.file_name().unwrap(), "page_res.json");
        Ok(())
    }

    #[test]
    fn json_record_round_trips() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let output = sample();
        let path = output.save_to_json(dir.path())?;
        let parsed: OcrOutput = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        assert_eq!(parsed.rec_texts, output.rec_texts);
        assert_eq!(parsed.rec_scores, output.rec_scores);
        assert_eq!(parsed.rec_boxes, output.rec_boxes);
        Ok(())
    }

    #[test]
    fn visualization_keeps_source_dimensions() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = sample().save_to_img(dir.path())?;
        let written = image::open(&path)?;
        assert_eq!((written.width(), written.height()), (16, 16));
        Ok(())
    }
}
