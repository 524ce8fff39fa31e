pub mod record;
pub mod report;
pub mod scan;

pub use scan::{RecognizedLine, ScanRequest, ScanResult};
