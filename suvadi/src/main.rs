use std::path::PathBuf;

use clap::Parser;
use suvadi::scan::{self, ScanRequest};
use suvadi_ml::{OcrConfig, PaddleOcr};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

/// Scan a Tamil newspaper image and extract its text.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Image to scan; relative paths resolve next to the binary.
    image: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let cli = Cli::parse();
    let request = ScanRequest::resolve(cli.image)?;
    let result = scan::scan(&request, || PaddleOcr::load(OcrConfig::default()))?;

    if result.is_empty() {
        println!("No text was extracted. Try adjusting the confidence thresholds.");
    } else {
        println!("OCR processing complete.");
    }

    Ok(())
}
