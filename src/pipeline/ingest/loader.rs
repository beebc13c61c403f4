use std::path::Path;

use tracing::{debug, info};

use super::docx::docx_paragraphs;
use super::pdf::PdfTextExtractor;
use super::sanitize::normalize_whitespace;
use super::types::{DocumentFormat, LoadedDocument, PdfTextSource, TextUnit};
use super::LoadError;

/// Loads a source document into ordered `TextUnit`s.
///
/// The PDF text reader is injected so tests and alternative readers can be
/// swapped in without touching the loader.
pub struct DocumentLoader {
    pdf: Box<dyn PdfTextSource + Send + Sync>,
}

impl DocumentLoader {
    pub fn new(pdf: Box<dyn PdfTextSource + Send + Sync>) -> Self {
        Self { pdf }
    }

    /// Detect the format, read the file and split it into units.
    ///
    /// The format check runs before the file is touched, so an unknown
    /// extension fails with `UnsupportedFormat` even for a missing file.
    pub fn load(&self, path: &Path) -> Result<LoadedDocument, LoadError> {
        let format = DocumentFormat::from_path(path)?;

        let bytes = std::fs::read(path).map_err(|e| LoadError::DocumentOpen {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let units = match format {
            DocumentFormat::Pdf => self.pdf_units(path, &bytes)?,
            DocumentFormat::Docx => docx_units(path, &bytes)?,
            DocumentFormat::PlainText => {
                let text = String::from_utf8_lossy(&bytes);
                vec![TextUnit::full(normalize_whitespace(&text))]
            }
        };

        let doc = LoadedDocument {
            path: path.to_path_buf(),
            format,
            units,
            bytes,
        };

        info!(
            path = %path.display(),
            format = format.as_str(),
            units = doc.units.len(),
            chars = doc.text_chars(),
            "Document loaded"
        );

        Ok(doc)
    }

    fn pdf_units(&self, path: &Path, bytes: &[u8]) -> Result<Vec<TextUnit>, LoadError> {
        let pages = self
            .pdf
            .page_texts(bytes)
            .map_err(|reason| LoadError::DocumentOpen {
                path: path.to_path_buf(),
                reason,
            })?;

        let units: Vec<TextUnit> = pages
            .iter()
            .enumerate()
            .map(|(i, raw)| TextUnit::page(i, normalize_whitespace(raw)))
            .collect();

        let empty = units.iter().filter(|u| u.is_empty()).count();
        if empty > 0 {
            debug!(
                empty_pages = empty,
                total_pages = units.len(),
                "Pages without a text layer"
            );
        }

        Ok(units)
    }
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new(Box::new(PdfTextExtractor))
    }
}

fn docx_units(path: &Path, bytes: &[u8]) -> Result<Vec<TextUnit>, LoadError> {
    let paragraphs = docx_paragraphs(bytes).map_err(|reason| LoadError::DocumentOpen {
        path: path.to_path_buf(),
        reason,
    })?;

    Ok(paragraphs
        .iter()
        .map(|p| normalize_whitespace(p))
        .filter(|p| !p.is_empty())
        .enumerate()
        .map(|(i, text)| TextUnit::paragraph(i, text))
        .collect())
}

/// Load with the default PDF text reader.
pub fn load_document(path: &Path) -> Result<LoadedDocument, LoadError> {
    DocumentLoader::default().load(path)
}
