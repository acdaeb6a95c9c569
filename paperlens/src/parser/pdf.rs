use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// How far into the file the `%PDF` signature may appear.
const SIGNATURE_WINDOW: usize = 1024;

#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The bytes are not a PDF the extractor can read.
    #[error("Failed to read PDF: {0}")]
    Unreadable(String),
    /// The extraction task itself died (panic or cancellation).
    #[error("PDF extraction task failed: {0}")]
    Worker(String),
}

/// Text pulled out of a PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    /// Pages that carry text, each prefixed with a `[Page N]` marker and
    /// separated by blank lines.
    pub text: String,
    /// Total number of pages, including pages without text.
    pub page_count: usize,
}

impl ExtractedText {
    pub fn from_pages<S: AsRef<str>>(pages: &[S]) -> Self {
        let text = pages
            .iter()
            .enumerate()
            .filter(|(_, page)| !page.as_ref().trim().is_empty())
            .map(|(i, page)| format!("[Page {}]\n{}", i + 1, page.as_ref()))
            .collect::<Vec<_>>()
            .join("\n\n");

        Self {
            text,
            page_count: pages.len(),
        }
    }
}

/// Abstract PDF text extraction interface.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractionError>;
}

/// Extracts text with the `pdf-extract` crate on the blocking thread pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
        if !has_pdf_signature(bytes) {
            return Err(ExtractionError::Unreadable(
                "missing %PDF signature".to_string(),
            ));
        }

        let data = bytes.to_vec();
        let pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&data)
        })
        .await
        .map_err(|e| ExtractionError::Worker(e.to_string()))?
        .map_err(|e| ExtractionError::Unreadable(e.to_string()))?;

        let extracted = ExtractedText::from_pages(&pages);
        info!("Extracted text from {} pages", extracted.page_count);
        Ok(extracted)
    }
}

fn has_pdf_signature(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(SIGNATURE_WINDOW)];
    window.windows(4).any(|w| w == b"%PDF")
}
