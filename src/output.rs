//! Result descriptors returned to callers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Descriptor of a successful conversion.
///
/// Serialises camelCase so a boundary layer can return it as the JSON body
/// of a 200 response without remapping fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    /// Always `true`; failures are reported through [`ConversionFailure`].
    pub success: bool,
    /// Basename of the produced artifact.
    pub output_file: String,
    /// Size in bytes of the produced artifact.
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_pages: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_characters: Option<usize>,
    /// Table rows written (PDF→XLSX) or read (XLSX→PDF).
    #[serde(default, rename = "rowsExtracted", skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    /// Slides generated (PDF→PPTX).
    #[serde(default, rename = "slidesGenerated", skip_serializing_if = "Option::is_none")]
    pub slides: Option<usize>,
    /// Human-readable summary.
    pub message: String,
    /// Name of the strategy that produced the artifact.
    pub strategy: String,
}

impl ConversionResult {
    /// Retrieval path under which a boundary layer serves the artifact.
    pub fn download_url(&self) -> String {
        format!("/outputs/{}", self.output_file)
    }
}

/// One failed strategy attempt: `(strategy name, error text)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyAttempt {
    pub strategy: String,
    pub error: String,
}

/// Every strategy in a chain failed; attempts are in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionFailure {
    pub attempted_strategies: Vec<StrategyAttempt>,
}

impl ConversionFailure {
    /// Error text of the last attempt, which is what the boundary shows first.
    pub fn last_error(&self) -> Option<&str> {
        self.attempted_strategies.last().map(|a| a.error.as_str())
    }
}

impl fmt::Display for ConversionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attempted_strategies.is_empty() {
            return f.write_str("no strategy attempted");
        }
        for (i, attempt) in self.attempted_strategies.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", attempt.strategy, attempt.error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConversionResult {
        ConversionResult {
            success: true,
            output_file: "document-1.pdf".into(),
            file_size: 1234,
            extracted_pages: None,
            extracted_characters: Some(42),
            rows: None,
            slides: None,
            message: "TXT content written to .pdf".into(),
            strategy: "txt-flow-pdf".into(),
        }
    }

    #[test]
    fn serialises_camel_case_and_skips_absent_counts() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["outputFile"], "document-1.pdf");
        assert_eq!(json["fileSize"], 1234);
        assert_eq!(json["extractedCharacters"], 42);
        assert!(json.get("extractedPages").is_none());
        assert!(json.get("rowsExtracted").is_none());
    }

    #[test]
    fn download_url_uses_outputs_prefix() {
        assert_eq!(sample().download_url(), "/outputs/document-1.pdf");
    }

    #[test]
    fn failure_display_and_last_error() {
        let failure = ConversionFailure {
            attempted_strategies: vec![
                StrategyAttempt {
                    strategy: "a".into(),
                    error: "first".into(),
                },
                StrategyAttempt {
                    strategy: "b".into(),
                    error: "second".into(),
                },
            ],
        };
        assert_eq!(failure.to_string(), "a: first; b: second");
        assert_eq!(failure.last_error(), Some("second"));
        assert_eq!(ConversionFailure::default().to_string(), "no strategy attempted");
    }
}
