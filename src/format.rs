//! Document formats, the supported conversion pairs, and upload validation.
//!
//! The pairs listed here are static metadata for discovery endpoints; the
//! authoritative routing table lives in [`crate::dispatch::Dispatcher`].

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Maximum accepted upload size: 50 MB.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// File extensions accepted from uploads, lowercase with leading dot.
pub const ALLOWED_EXTENSIONS: [&str; 7] = [".doc", ".docx", ".pdf", ".xlsx", ".pptx", ".txt", ".html"];

/// Extensions the service can produce.
pub const OUTPUT_EXTENSIONS: [&str; 6] = [".pdf", ".docx", ".xlsx", ".pptx", ".txt", ".html"];

/// A file format the service reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Doc,
    Docx,
    Pdf,
    Xlsx,
    Pptx,
    Txt,
    Html,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 7] = [
        DocumentFormat::Doc,
        DocumentFormat::Docx,
        DocumentFormat::Pdf,
        DocumentFormat::Xlsx,
        DocumentFormat::Pptx,
        DocumentFormat::Txt,
        DocumentFormat::Html,
    ];

    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Doc => "doc",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Xlsx => "xlsx",
            DocumentFormat::Pptx => "pptx",
            DocumentFormat::Txt => "txt",
            DocumentFormat::Html => "html",
        }
    }

    /// Parse an extension, with or without the leading dot, case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        DocumentFormat::ALL
            .into_iter()
            .find(|f| f.extension() == ext)
    }

    /// Infer the format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extension().to_ascii_uppercase())
    }
}

impl FromStr for DocumentFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let alias = match lower.as_str() {
            "word" => Some(DocumentFormat::Docx),
            "excel" => Some(DocumentFormat::Xlsx),
            "powerpoint" | "ppt" => Some(DocumentFormat::Pptx),
            "text" => Some(DocumentFormat::Txt),
            "htm" => Some(DocumentFormat::Html),
            _ => None,
        };
        alias
            .or_else(|| DocumentFormat::from_extension(&lower))
            .ok_or(ConvertError::UnsupportedFileType { extension: lower })
    }
}

/// One (source, target) key of the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversionPair {
    pub from: DocumentFormat,
    pub to: DocumentFormat,
}

impl ConversionPair {
    pub const fn new(from: DocumentFormat, to: DocumentFormat) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for ConversionPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}→{}", self.from, self.to)
    }
}

/// A conversion direction as advertised to clients.
#[derive(Debug, Clone, Serialize)]
pub struct SupportedConversion {
    pub from: &'static str,
    pub to: &'static str,
    pub endpoint: &'static str,
    #[serde(skip)]
    pub sources: &'static [DocumentFormat],
    #[serde(skip)]
    pub target: DocumentFormat,
}

const PDF_ONLY: &[DocumentFormat] = &[DocumentFormat::Pdf];

/// The ten advertised conversion directions, in discovery order.
pub const SUPPORTED_CONVERSIONS: [SupportedConversion; 10] = [
    SupportedConversion {
        from: "DOC/DOCX",
        to: "PDF",
        endpoint: "/api/conversion/doc-to-pdf",
        sources: &[DocumentFormat::Doc, DocumentFormat::Docx],
        target: DocumentFormat::Pdf,
    },
    SupportedConversion {
        from: "PDF",
        to: "DOCX",
        endpoint: "/api/conversion/pdf-to-doc",
        sources: PDF_ONLY,
        target: DocumentFormat::Docx,
    },
    SupportedConversion {
        from: "PDF",
        to: "Excel",
        endpoint: "/api/conversion/pdf-to-excel",
        sources: PDF_ONLY,
        target: DocumentFormat::Xlsx,
    },
    SupportedConversion {
        from: "Excel",
        to: "PDF",
        endpoint: "/api/conversion/excel-to-pdf",
        sources: &[DocumentFormat::Xlsx],
        target: DocumentFormat::Pdf,
    },
    SupportedConversion {
        from: "PDF",
        to: "PowerPoint",
        endpoint: "/api/conversion/pdf-to-ppt",
        sources: PDF_ONLY,
        target: DocumentFormat::Pptx,
    },
    SupportedConversion {
        from: "PowerPoint",
        to: "PDF",
        endpoint: "/api/conversion/ppt-to-pdf",
        sources: &[DocumentFormat::Pptx],
        target: DocumentFormat::Pdf,
    },
    SupportedConversion {
        from: "PDF",
        to: "TXT",
        endpoint: "/api/conversion/pdf-to-txt",
        sources: PDF_ONLY,
        target: DocumentFormat::Txt,
    },
    SupportedConversion {
        from: "TXT",
        to: "PDF",
        endpoint: "/api/conversion/txt-to-pdf",
        sources: &[DocumentFormat::Txt],
        target: DocumentFormat::Pdf,
    },
    SupportedConversion {
        from: "PDF",
        to: "HTML",
        endpoint: "/api/conversion/pdf-to-html",
        sources: PDF_ONLY,
        target: DocumentFormat::Html,
    },
    SupportedConversion {
        from: "HTML",
        to: "PDF",
        endpoint: "/api/conversion/html-to-pdf",
        sources: &[DocumentFormat::Html],
        target: DocumentFormat::Pdf,
    },
];

/// Every concrete (source, target) pair covered by [`SUPPORTED_CONVERSIONS`].
pub fn supported_pairs() -> Vec<ConversionPair> {
    SUPPORTED_CONVERSIONS
        .iter()
        .flat_map(|c| c.sources.iter().map(|&from| ConversionPair::new(from, c.target)))
        .collect()
}

/// Static discovery document served by the boundary layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatsManifest {
    pub supported_formats: SupportedFormats,
    pub max_file_size: &'static str,
    pub upload_field: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupportedFormats {
    pub input: &'static [&'static str],
    pub output: &'static [&'static str],
    pub conversions: &'static [SupportedConversion],
}

/// Build the discovery document.
pub fn formats_manifest() -> FormatsManifest {
    FormatsManifest {
        supported_formats: SupportedFormats {
            input: &ALLOWED_EXTENSIONS,
            output: &OUTPUT_EXTENSIONS,
            conversions: &SUPPORTED_CONVERSIONS,
        },
        max_file_size: "50MB",
        upload_field: "document",
    }
}

/// Check an uploaded file's name and size, returning its format.
pub fn validate_upload(
    original_name: &str,
    size: u64,
    max_bytes: u64,
) -> Result<DocumentFormat, ConvertError> {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ConvertError::UnsupportedFileType { extension });
    }
    if size > max_bytes {
        return Err(ConvertError::FileTooLarge {
            size,
            limit: max_bytes,
        });
    }
    DocumentFormat::from_extension(&extension)
        .ok_or(ConvertError::UnsupportedFileType { extension })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_round_trip() {
        for f in DocumentFormat::ALL {
            assert_eq!(DocumentFormat::from_extension(f.extension()), Some(f));
        }
        assert_eq!(DocumentFormat::from_extension(".PDF"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension("csv"), None);
    }

    #[test]
    fn from_str_accepts_aliases() {
        assert_eq!("excel".parse::<DocumentFormat>().ok(), Some(DocumentFormat::Xlsx));
        assert_eq!("PowerPoint".parse::<DocumentFormat>().ok(), Some(DocumentFormat::Pptx));
        assert_eq!(".html".parse::<DocumentFormat>().ok(), Some(DocumentFormat::Html));
        assert!("odt".parse::<DocumentFormat>().is_err());
    }

    #[test]
    fn ten_directions_eleven_pairs() {
        assert_eq!(SUPPORTED_CONVERSIONS.len(), 10);
        let pairs = supported_pairs();
        assert_eq!(pairs.len(), 11);
        assert!(pairs.contains(&ConversionPair::new(DocumentFormat::Doc, DocumentFormat::Pdf)));
        assert!(!pairs.contains(&ConversionPair::new(DocumentFormat::Xlsx, DocumentFormat::Txt)));
    }

    #[test]
    fn validate_upload_rules() {
        assert_eq!(
            validate_upload("Report.DOCX", 10, MAX_UPLOAD_BYTES).ok(),
            Some(DocumentFormat::Docx)
        );
        assert!(matches!(
            validate_upload("notes.odt", 10, MAX_UPLOAD_BYTES),
            Err(ConvertError::UnsupportedFileType { .. })
        ));
        assert!(matches!(
            validate_upload("noext", 10, MAX_UPLOAD_BYTES),
            Err(ConvertError::UnsupportedFileType { .. })
        ));
        assert!(matches!(
            validate_upload("big.pdf", MAX_UPLOAD_BYTES + 1, MAX_UPLOAD_BYTES),
            Err(ConvertError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn manifest_serialises_endpoints() {
        let json = serde_json::to_value(formats_manifest()).unwrap();
        assert_eq!(json["maxFileSize"], "50MB");
        assert_eq!(json["uploadField"], "document");
        let conversions = json["supportedFormats"]["conversions"].as_array().unwrap();
        assert_eq!(conversions.len(), 10);
        assert_eq!(conversions[0]["endpoint"], "/api/conversion/doc-to-pdf");
        assert!(conversions[0].get("sources").is_none());
    }
}
