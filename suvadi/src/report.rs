use std::path::Path;

use crate::scan::ScanResult;

const SEPARATOR_WIDTH: usize = 60;

/// Numbered results table framed by separators, followed by the total line
/// count and, when any lines exist, the average confidence.
pub fn render_summary(result: &ScanResult) -> String {
    let separator = "=".repeat(SEPARATOR_WIDTH);
    let mut out = String::new();
    out.push_str("\nExtracted Tamil text:\n");
    out.push_str(&separator);
    out.push('\n');
    for (index, line) in result.lines.iter().enumerate() {
        out.push_str(&format!(
            "{:>3}. [{}] {}\n",
            index + 1,
            percentage(line.confidence),
            line.text
        ));
    }
    out.push_str(&separator);
    out.push('\n');
    out.push_str(&format!("Total lines extracted: {}\n", result.lines.len()));
    if !result.lines.is_empty() {
        out.push_str(&format!(
            "Average confidence: {}\n",
            percentage(result.average_confidence())
        ));
    }
    out
}

/// Transcript body: a header naming the image, a separator, a blank line,
/// then one recognized text per row.
pub fn render_transcript(result: &ScanResult, image_path: &Path) -> String {
    let image_name = image_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut out = String::new();
    out.push_str(&format!("Tamil OCR Results - {image_name}\n"));
    out.push_str(&"=".repeat(SEPARATOR_WIDTH));
    out.push_str("\n\n");
    for line in &result.lines {
        out.push_str(&line.text);
        out.push('\n');
    }
    out
}

/// Confidence as a percentage with one decimal, e.g. `92.0%`.
fn percentage(confidence: f32) -> String {
    format!("{:.1}%", confidence * 100.0)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::scan::{RecognizedLine, ScanResult};

    fn result(pairs: &[(&str, f32)]) -> ScanResult {
        ScanResult {
            lines: pairs
                .iter()
                .map(|(text, confidence)| RecognizedLine {
                    text: (*text).to_string(),
                    confidence: *confidence,
                })
                .collect(),
        }
    }

    #[test]
    fn summary_rows_show_percentages_and_average() {
        let summary = render_summary(&result(&[("அ", 0.92), ("ஆ", 0.81)]));
        assert!(summary.contains("  1. [92.0%] அ"));
        assert!(summary.contains("  2. [81.0%] ஆ"));
        assert!(summary.contains("Total lines extracted: 2"));
        assert!(summary.contains("Average confidence: 86.5%"));
    }

    #[test]
    fn zero_scores_average_to_zero_percent() {
        let summary = render_summary(&result(&[("அ", 0.0), ("ஆ", 0.0)]));
        assert!(summary.contains("  1. [0.0%] அ"));
        assert!(summary.contains("Average confidence: 0.0%"));
    }

    #[test]
    fn empty_summary_omits_the_average() {
        let summary = render_summary(&result(&[]));
        assert!(summary.contains("Total lines extracted: 0"));
        assert!(!summary.contains("Average confidence"));
    }

    #[test]
    fn transcript_lists_texts_after_header() {
        let transcript = render_transcript(
            &result(&[("அ", 0.92), ("ஆ", 0.81)]),
            Path::new("/data/page.jpeg"),
        );
        assert!(transcript.starts_with("Tamil OCR Results - page.jpeg\n"));
        let lines: Vec<&str> = transcript.lines().collect();
        assert_eq!(lines[1], "=".repeat(SEPARATOR_WIDTH));
        assert_eq!(lines[2], "");
        assert_eq!(&lines[3..], ["அ", "ஆ"]);
    }

    #[test]
    fn empty_transcript_is_header_and_separator_only() {
        let transcript = render_transcript(&result(&[]), Path::new("page.jpeg"));
        assert_eq!(
            transcript,
            format!("Tamil OCR Results - page.jpeg\n{}\n\n", "=".repeat(60))
        );
    }
}
