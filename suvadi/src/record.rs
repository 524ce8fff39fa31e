use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::scan::RecognizedLine;

/// Tolerant reader for the engine-authored `<stem>_res.json` record.
///
/// The schema belongs to the engine and is versioned independently, so this
/// adapter ignores unknown fields and treats `rec_scores` as optional: when
/// the list is absent or its length disagrees with `rec_texts`, every line
/// falls back to confidence 0.0.
#[derive(Debug, Clone, Deserialize)]
pub struct OcrRecord {
    #[serde(default)]
    pub rec_texts: Vec<String>,
    #[serde(default)]
    pub rec_scores: Vec<f32>,
}

impl OcrRecord {
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("malformed result record {}", path.display()))
    }

    /// Pair texts with their scores in order.
    pub fn into_lines(self) -> Vec<RecognizedLine> {
        let scores = if self.rec_scores.len() == self.rec_texts.len() {
            self.rec_scores
        } else {
            vec![0.0; self.rec_texts.len()]
        };
        self.rec_texts
            .into_iter()
            .zip(scores)
            .map(|(text, confidence)| RecognizedLine { text, confidence })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texts_and_scores_pair_in_order() {
        let record: OcrRecord =
            serde_json::from_str(r#"{"rec_texts":["அ","ஆ"],"rec_scores":[0.92,0.81]}"#).unwrap();
        let lines = record.into_lines();
        assert_eq!(
            lines,
            vec![
                RecognizedLine {
                    text: "அ".to_string(),
                    confidence: 0.92
                },
                RecognizedLine {
                    text: "ஆ".to_string(),
                    confidence: 0.81
                },
            ]
        );
    }

    #[test]
    fn missing_scores_default_to_zero() {
        let record: OcrRecord = serde_json::from_str(r#"{"rec_texts":["அ","ஆ"]}"#).unwrap();
        let lines = record.into_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|line| line.confidence == 0.0));
    }

    #[test]
    fn mismatched_scores_default_to_zero() {
        let record: OcrRecord =
            serde_json::from_str(r#"{"rec_texts":["அ","ஆ"],"rec_scores":[0.5]}"#).unwrap();
        let lines = record.into_lines();
        assert_eq!(lines[0].confidence, 0.0);
        assert_eq!(lines[1].confidence, 0.0);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let record: OcrRecord = serde_json::from_str(
            r#"{"input_path":"x.png","rec_texts":["அ"],"rec_scores":[0.9],"rec_polys":[],"rec_boxes":[]}"#,
        )
        .unwrap();
        let lines = record.into_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "அ");
    }

    #[test]
    fn empty_record_yields_no_lines() {
        let record: OcrRecord = serde_json::from_str("{}").unwrap();
        assert!(record.into_lines().is_empty());
    }
}
