mod hf_hub;

pub mod output;
pub mod paddle_ocr;

use std::path::Path;

use anyhow::Result;
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch,
};

pub use hf_hub::set_cache_dir;
pub use output::OcrOutput;
pub use paddle_ocr::{OcrConfig, PaddleOcr};

/// Compute device the ONNX Runtime sessions run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "CPU"),
            Device::Cuda => write!(f, "CUDA"),
        }
    }
}

impl Device {
    pub(crate) fn execution_providers(&self) -> Vec<ExecutionProviderDispatch> {
        match self {
            Device::Cpu => vec![CPUExecutionProvider::default().build()],
            // CPU stays registered as the fallback for unsupported ops.
            Device::Cuda => vec![
                CUDAExecutionProvider::default().build(),
                CPUExecutionProvider::default().build(),
            ],
        }
    }
}

/// An OCR engine turns an image on disk into per-image result objects,
/// each carrying recognized text lines and their confidence scores.
pub trait OcrEngine {
    fn predict(&mut self, image_path: &Path) -> Result<Vec<OcrOutput>>;
}
