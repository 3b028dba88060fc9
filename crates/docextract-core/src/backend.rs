use crate::ExtractionError;

/// Trait for PDF parsing backends.
///
/// A backend is shared between calls and must hold no per-document state.
/// Everything tied to one document lives in the [`ParserSession`] returned
/// by [`open`](ParserBackend::open), which the caller owns for exactly one
/// extraction.
pub trait ParserBackend: Send + Sync {
    /// Short name used in log fields.
    fn name(&self) -> &str;

    /// Open `payload` as a PDF and return a session over it.
    ///
    /// Bytes the parser cannot open must map to
    /// [`ExtractionError::MalformedDocument`].
    fn open(&self, payload: &[u8]) -> Result<Box<dyn ParserSession>, ExtractionError>;
}

/// An open document inside the parser library.
///
/// Sessions are not required to be `Send`: they are created, used and closed
/// on the same blocking worker thread.
pub trait ParserSession {
    fn page_count(&self) -> Result<usize, ExtractionError>;

    /// Text of the page at zero-based `index`.
    fn page_text(&mut self, index: usize) -> Result<String, ExtractionError>;

    /// Release the parser resources held by this session.
    fn close(self: Box<Self>) -> Result<(), ExtractionError>;
}
