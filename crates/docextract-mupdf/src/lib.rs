use mupdf::{Document, TextPageFlags};

use docextract_core::config_file::MupdfConfig;
use docextract_core::{ExtractionError, ParserBackend, ParserSession};

const PDF_MAGIC: &str = "application/pdf";

/// MuPDF-based implementation of [`ParserBackend`].
///
/// This crate is the sole AGPL island: it isolates the mupdf dependency
/// (which is AGPL-3.0) so that the core service does not transitively
/// depend on it.
///
/// Header and footer exclusion are off by default. When enabled, text blocks
/// lying entirely in the top (header) or starting in the bottom (footer)
/// fraction of each page are dropped, which keeps running heads and page
/// numbers out of the extracted text.
#[derive(Debug, Clone, Default)]
pub struct MupdfBackend {
    /// Fraction of page height from bottom to exclude as footer (0.0–1.0).
    /// `None` disables footer exclusion.
    footer_exclusion_ratio: Option<f32>,
    /// Fraction of page height from top to exclude as header (0.0–1.0).
    /// `None` disables header exclusion.
    header_exclusion_ratio: Option<f32>,
}

impl MupdfBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a backend from the `[mupdf]` config section.
    pub fn from_config(config: &MupdfConfig) -> Self {
        Self::new()
            .with_header_exclusion(config.header_exclusion.unwrap_or(0.0))
            .with_footer_exclusion(config.footer_exclusion.unwrap_or(0.0))
    }

    /// Set the footer exclusion ratio. Pass `0.0` to disable.
    pub fn with_footer_exclusion(mut self, ratio: f32) -> Self {
        self.footer_exclusion_ratio = if ratio > 0.0 { Some(ratio.min(1.0)) } else { None };
        self
    }

    /// Set the header exclusion ratio. Pass `0.0` to disable.
    pub fn with_header_exclusion(mut self, ratio: f32) -> Self {
        self.header_exclusion_ratio = if ratio > 0.0 { Some(ratio.min(1.0)) } else { None };
        self
    }
}

impl ParserBackend for MupdfBackend {
    fn name(&self) -> &str {
        "mupdf"
    }

    fn open(&self, payload: &[u8]) -> Result<Box<dyn ParserSession>, ExtractionError> {
        let document = Document::from_bytes(payload, PDF_MAGIC)
            .map_err(|e| ExtractionError::MalformedDocument(e.to_string()))?;

        if document
            .needs_password()
            .map_err(|e| ExtractionError::ParserFailure(e.to_string()))?
        {
            return Err(ExtractionError::ParserFailure(
                "document is password protected".into(),
            ));
        }

        let page_count = document
            .page_count()
            .map_err(|e| ExtractionError::MalformedDocument(e.to_string()))?;
        if page_count <= 0 {
            return Err(ExtractionError::MalformedDocument(
                "document has no pages".into(),
            ));
        }

        tracing::debug!(page_count, bytes = payload.len(), "mupdf document opened");

        Ok(Box::new(MupdfSession {
            document,
            page_count: page_count as usize,
            footer_exclusion_ratio: self.footer_exclusion_ratio,
            header_exclusion_ratio: self.header_exclusion_ratio,
        }))
    }
}

/// One open MuPDF document. Dropping the document frees it inside MuPDF.
struct MupdfSession {
    document: Document,
    page_count: usize,
    footer_exclusion_ratio: Option<f32>,
    header_exclusion_ratio: Option<f32>,
}

impl ParserSession for MupdfSession {
    fn page_count(&self) -> Result<usize, ExtractionError> {
        Ok(self.page_count)
    }

    fn page_text(&mut self, index: usize) -> Result<String, ExtractionError> {
        let page_no = i32::try_from(index)
            .map_err(|_| ExtractionError::ParserFailure(format!("page index {index} out of range")))?;
        let page = self
            .document
            .load_page(page_no)
            .map_err(|e| ExtractionError::ParserFailure(e.to_string()))?;
        let text_page = page
            .to_text_page(TextPageFlags::empty())
            .map_err(|e| ExtractionError::ParserFailure(e.to_string()))?;

        // Get page bounds for header/footer exclusion
        let page_bounds = page
            .bounds()
            .map_err(|e| ExtractionError::ParserFailure(e.to_string()))?;
        let page_height = page_bounds.y1 - page_bounds.y0;

        let header_threshold = self
            .header_exclusion_ratio
            .map(|r| page_bounds.y0 + page_height * r);
        let footer_threshold = self
            .footer_exclusion_ratio
            .map(|r| page_bounds.y1 - page_height * r);

        let mut page_text = String::new();
        for block in text_page.blocks() {
            let block_bounds = block.bounds();

            if header_threshold.is_some_and(|t| block_bounds.y1 <= t) {
                continue;
            }
            if footer_threshold.is_some_and(|t| block_bounds.y0 >= t) {
                continue;
            }

            for line in block.lines() {
                page_text.extend(line.chars().map(|c| c.char().unwrap_or('\u{FFFD}')));
                page_text.push('\n');
            }
        }

        Ok(page_text)
    }

    fn close(self: Box<Self>) -> Result<(), ExtractionError> {
        drop(self.document);
        tracing::debug!("mupdf document closed");
        Ok(())
    }
}
