//! The immutable description of one conversion.

use crate::format::{ConversionPair, DocumentFormat};
use std::path::{Path, PathBuf};

/// One conversion job.
///
/// Created by the boundary layer per upload. The file at `source_path` is
/// removed by [`crate::Converter::convert`] once the conversion terminates,
/// whatever the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub source_path: PathBuf,
    pub source_format: DocumentFormat,
    pub target_format: DocumentFormat,
    pub output_path: PathBuf,
}

impl ConversionRequest {
    pub fn new(
        source_path: impl Into<PathBuf>,
        source_format: DocumentFormat,
        target_format: DocumentFormat,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            source_format,
            target_format,
            output_path: output_path.into(),
        }
    }

    /// The dispatch key of this request.
    pub fn pair(&self) -> ConversionPair {
        ConversionPair::new(self.source_format, self.target_format)
    }

    /// Basename of the input, as shown in generated documents.
    pub fn source_name(&self) -> String {
        file_name(&self.source_path)
    }

    /// Basename of the output, as returned in [`crate::ConversionResult`].
    pub fn output_name(&self) -> String {
        file_name(&self.output_path)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_pair() {
        let req = ConversionRequest::new(
            "/scratch/uploads/document-1-0.pdf",
            DocumentFormat::Pdf,
            DocumentFormat::Txt,
            "/scratch/outputs/document-1-0.txt",
        );
        assert_eq!(req.source_name(), "document-1-0.pdf");
        assert_eq!(req.output_name(), "document-1-0.txt");
        assert_eq!(
            req.pair(),
            ConversionPair::new(DocumentFormat::Pdf, DocumentFormat::Txt)
        );
    }
}
