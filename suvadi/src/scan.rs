use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use suvadi_ml::{OcrEngine, OcrOutput};
use tracing::debug;

use crate::record::OcrRecord;
use crate::report;

pub const DEFAULT_IMAGE: &str = "1702553327433.jpeg";
pub const TRANSCRIPT_FILE: &str = "extracted_text.txt";

/// One invocation's inputs: the image to scan and where artifacts land.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub image_path: PathBuf,
    pub output_dir: PathBuf,
}

impl ScanRequest {
    /// Resolve the CLI argument. Relative paths (and the default image) are
    /// taken relative to the program's own directory; artifacts go to
    /// `<program_dir>/output`.
    pub fn resolve(image: Option<PathBuf>) -> Result<Self> {
        let base = program_dir()?;
        let image = image.unwrap_or_else(|| {
            println!("Using default image: {DEFAULT_IMAGE}");
            PathBuf::from(DEFAULT_IMAGE)
        });
        let image_path = if image.is_absolute() {
            image
        } else {
            base.join(image)
        };
        Ok(Self {
            image_path,
            output_dir: base.join("output"),
        })
    }
}

fn program_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("cannot locate the running executable")?;
    Ok(exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// A recognized text line with its confidence in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedLine {
    pub text: String,
    pub confidence: f32,
}

/// All lines recognized in one scan, in detection order. Lives only for the
/// duration of the invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResult {
    pub lines: Vec<RecognizedLine>,
}

impl ScanResult {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Mean confidence across all lines, 0.0 when there are none.
    pub fn average_confidence(&self) -> f32 {
        if self.lines.is_empty() {
            return 0.0;
        }
        self.lines.iter().map(|line| line.confidence).sum::<f32>() / self.lines.len() as f32
    }
}

/// Run one scan: invoke the engine, persist its artifacts, re-read the JSON
/// records, print the report and write the transcript.
///
/// The engine is built through `engine_factory` only after the input file is
/// known to exist, so a bad path never pays the model-loading cost. A missing
/// input and an empty detection are normal outcomes reported on the console;
/// engine and filesystem failures propagate.
pub fn scan<E, F>(request: &ScanRequest, engine_factory: F) -> Result<ScanResult>
where
    E: OcrEngine,
    F: FnOnce() -> Result<E>,
{
    if !request.image_path.exists() {
        eprintln!(
            "Error: image file not found at {}",
            request.image_path.display()
        );
        return Ok(ScanResult::default());
    }

    println!(
        "Processing Tamil newspaper: {}",
        request.image_path.display()
    );
    println!("{}", "-".repeat(50));

    let mut engine = engine_factory()?;
    println!("Detecting text regions...");
    let outputs = engine.predict(&request.image_path)?;

    fs::create_dir_all(&request.output_dir)
        .with_context(|| format!("failed to create {}", request.output_dir.display()))?;

    if outputs.is_empty() {
        println!("No text detected in the image");
        return Ok(ScanResult::default());
    }

    let result = persist_outputs(&outputs, &request.output_dir)?;

    print!("{}", report::render_summary(&result));

    let transcript = write_transcript(&result, &request.image_path, &request.output_dir)?;
    println!("Plain text saved to: {}", transcript.display());

    Ok(result)
}

/// Persist each result object's visualization and JSON record, then read the
/// records back and concatenate their lines in engine order.
fn persist_outputs(outputs: &[OcrOutput], output_dir: &Path) -> Result<ScanResult> {
    let mut lines = Vec::new();
    for output in outputs {
        output.save_to_img(output_dir)?;
        let json_path = output.save_to_json(output_dir)?;
        let record = OcrRecord::read(&json_path)?;
        debug!(
            lines = record.rec_texts.len(),
            path = %json_path.display(),
            "parsed result record"
        );
        lines.extend(record.into_lines());
    }
    Ok(ScanResult { lines })
}

/// Write `extracted_text.txt`: a header naming the source image, a separator,
/// then one recognized line per row. Overwrites any previous transcript.
pub fn write_transcript(
    result: &ScanResult,
    image_path: &Path,
    output_dir: &Path,
) -> Result<PathBuf> {
    let path = output_dir.join(TRANSCRIPT_FILE);
    let body = report::render_transcript(result, image_path);
    fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
