use super::types::PdfTextSource;

/// PDF text-layer reader using the pdf-extract crate.
/// No OCR: scanned pages come back as empty strings.
pub struct PdfTextExtractor;

impl PdfTextSource for PdfTextExtractor {
    fn page_texts(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, String> {
        pdf_extract::extract_text_from_mem_by_pages(pdf_bytes).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fixtures::{build_pdf, PageSpec};

    #[test]
    fn extracts_one_string_per_page() {
        let pdf = build_pdf(&[
            PageSpec::text("Introduction to the cohort"),
            PageSpec::text("Methods were prospective"),
            PageSpec::text("Results were robust"),
        ]);
        let pages = PdfTextExtractor.page_texts(&pdf).unwrap();
        assert_eq!(pages.len(), 3);
        assert!(pages[0].contains("Introduction"), "got: {:?}", pages[0]);
        assert!(pages[2].contains("Results"), "got: {:?}", pages[2]);
    }

    #[test]
    fn page_without_text_layer_is_empty_not_error() {
        let pdf = build_pdf(&[PageSpec::text("Some text here"), PageSpec::blank()]);
        let pages = PdfTextExtractor.page_texts(&pdf).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[1].trim().is_empty());
    }

    #[test]
    fn invalid_pdf_returns_error() {
        assert!(PdfTextExtractor.page_texts(b"not a pdf").is_err());
    }
}
