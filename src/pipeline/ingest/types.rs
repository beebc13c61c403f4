use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::LoadError;

/// Source document formats recognised by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
}

impl DocumentFormat {
    /// Detect the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "txt" | "md" | "markdown" => Ok(Self::PlainText),
            "" => Err(LoadError::UnsupportedFormat(format!(
                "{} has no file extension",
                path.display()
            ))),
            other => Err(LoadError::UnsupportedFormat(format!(".{other}"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::PlainText => "plain_text",
        }
    }

    pub fn is_pdf(&self) -> bool {
        matches!(self, Self::Pdf)
    }
}

/// One addressable unit of the source document (a page, a paragraph, or the
/// whole file). Immutable once produced by the loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUnit {
    pub pointer: String,
    pub text: String,
}

impl TextUnit {
    /// PDF page unit, `index` is 0-based.
    pub fn page(index: usize, text: String) -> Self {
        Self {
            pointer: format!("[p{}]", index + 1),
            text,
        }
    }

    /// DOCX paragraph unit, `ordinal` is 0-based over non-empty paragraphs.
    pub fn paragraph(ordinal: usize, text: String) -> Self {
        Self {
            pointer: format!("[para{}]", ordinal + 1),
            text,
        }
    }

    pub fn full(text: String) -> Self {
        Self {
            pointer: "[full]".to_string(),
            text,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A loaded source document: its format and its units in physical order.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub format: DocumentFormat,
    pub units: Vec<TextUnit>,
    /// Raw file bytes, kept for hashing and figure inspection.
    pub bytes: Vec<u8>,
}

impl LoadedDocument {
    /// Number of physical pages (PDF only; 0 otherwise).
    pub fn page_count(&self) -> usize {
        if self.format.is_pdf() {
            self.units.len()
        } else {
            0
        }
    }

    /// Total characters of text across all units.
    pub fn text_chars(&self) -> usize {
        self.units.iter().map(|u| u.text.chars().count()).sum()
    }

    /// Full document text with a header line per non-empty unit, in order.
    pub fn full_text(&self) -> String {
        self.units
            .iter()
            .filter(|u| !u.is_empty())
            .map(|u| format!("===== {} =====\n{}", u.pointer, u.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Extracts per-page text from PDF bytes.
///
/// Pages without a text layer yield empty strings; only an unreadable
/// document is an error.
pub trait PdfTextSource {
    fn page_texts(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, String>;
}
