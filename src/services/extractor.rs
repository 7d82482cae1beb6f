use crate::services::ChatError;

const PDF_MAGIC: &[u8] = b"%PDF";

/// Turns raw upload bytes into plain text.
#[async_trait::async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, bytes: Vec<u8>) -> Result<String, ChatError>;
}

/// Text extraction for PDF files, pages in document order.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn extract_blocking(bytes: &[u8]) -> Result<String, ChatError> {
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(ChatError::Extraction(
                "File is not a valid PDF".to_string(),
            ));
        }

        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|err| ChatError::Extraction(format!("PDF parse error: {}", err)))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::Extraction(
                "No text could be extracted from the PDF".to_string(),
            ));
        }

        Ok(text.to_string())
    }
}

#[async_trait::async_trait]
impl DocumentExtractor for PdfExtractor {
    #[tracing::instrument(name = "Extract PDF text", skip_all, fields(size = bytes.len()))]
    async fn extract(&self, bytes: Vec<u8>) -> Result<String, ChatError> {
        // parsing is CPU bound and may panic on hostile input
        tokio::task::spawn_blocking(move || Self::extract_blocking(&bytes))
            .await
            .map_err(|err| {
                tracing::error!("PDF extraction task failed: {:?}", err);
                ChatError::Extraction("PDF could not be parsed".to_string())
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_pdf_bytes_are_rejected_before_parsing() {
        let err = PdfExtractor::extract_blocking(b"PK\x03\x04 zip archive").unwrap_err();
        assert_eq!(err.kind(), "extraction_error");
    }

    #[tokio::test]
    async fn truncated_pdf_is_an_extraction_error() {
        let err = PdfExtractor
            .extract(b"%PDF-1.4\n%%EOF".to_vec())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "extraction_error");
    }

    const TWO_PAGES: &[u8] = include_bytes!("../../tests/fixtures/two_pages.pdf");

    #[tokio::test]
    async fn text_follows_page_order() {
        let text = PdfExtractor.extract(TWO_PAGES.to_vec()).await.unwrap();

        let first = text.find("Quarterly").expect("page 1 text missing");
        let second = text.find("Outlook").expect("page 2 text missing");
        assert!(first < second, "pages out of order: {:?}", text);
        assert_eq!(text, text.trim());
    }

    #[test]
    fn same_bytes_extract_to_same_text() {
        let once = PdfExtractor::extract_blocking(TWO_PAGES).unwrap();
        let twice = PdfExtractor::extract_blocking(TWO_PAGES).unwrap();
        assert_eq!(once, twice);
    }
}
