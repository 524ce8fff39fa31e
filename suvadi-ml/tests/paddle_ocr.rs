use anyhow::Result;
use image::{DynamicImage, Rgb, RgbImage};
use suvadi_ml::{OcrConfig, OcrEngine, PaddleOcr};

fn white_page(width: u32, height: u32) -> RgbImage {
    let mut page = RgbImage::new(width, height);
    for pixel in page.pixels_mut() {
        *pixel = Rgb([255, 255, 255]);
    }
    page
}

#[test]
#[ignore] // downloads the ONNX models on first run
fn pipeline_produces_one_paired_result_object() -> Result<()> {
    let dir = tempfile::tempdir()?;
    // Synthetic page with a dark band where a text line would sit.
    let mut page = white_page(640, 480);
    for y in 200..240 {
        for x in 40..600 {
            page.put_pixel(x, y, Rgb([20, 20, 20]));
        }
    }
    let image_path = dir.path().join("page.png");
    DynamicImage::ImageRgb8(page).save(&image_path)?;

    let mut engine = PaddleOcr::load(OcrConfig::default())?;
    let outputs = engine.predict(&image_path)?;
    assert_eq!(outputs.len(), 1);

    let output = &outputs[0];
    assert_eq!(output.rec_texts.len(), output.rec_scores.len());
    assert_eq!(output.rec_texts.len(), output.rec_polys.len());
    assert_eq!(output.rec_texts.len(), output.rec_boxes.len());

    let json_path = output.save_to_json(dir.path())?;
    assert!(json_path.ends_with("page_res.json"));
    let img_path = output.save_to_img(dir.path())?;
    assert!(img_path.ends_with("page_res.png"));

    Ok(())
}

#[test]
#[ignore] // downloads the ONNX models on first run
fn blank_page_yields_empty_lines() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let image_path = dir.path().join("blank.png");
    DynamicImage::ImageRgb8(white_page(320, 320)).save(&image_path)?;

    let mut engine = PaddleOcr::load(OcrConfig {
        use_textline_orientation: false,
        ..OcrConfig::default()
    })?;
    let outputs = engine.predict(&image_path)?;
    assert_eq!(outputs.len(), 1);
    assert!(outputs[0].rec_texts.is_empty());

    Ok(())
}
