use crate::ExtractionError;

/// Readers accept a PDF header anywhere in the first kilobyte.
const HEADER_SEARCH_WINDOW: usize = 1024;
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Raw bytes of a document handed to one extraction call.
///
/// The payload is moved into the call and dropped before the call returns.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentPayload {
    bytes: Vec<u8>,
}

impl DocumentPayload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether a `%PDF-` header appears within the first 1024 bytes.
    pub fn looks_like_pdf(&self) -> bool {
        let window = &self.bytes[..self.bytes.len().min(HEADER_SEARCH_WINDOW)];
        window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
    }

    /// Reject payloads no PDF parser could open.
    pub fn validate(&self) -> Result<(), ExtractionError> {
        if self.is_empty() {
            return Err(ExtractionError::MalformedDocument("empty payload".into()));
        }
        if !self.looks_like_pdf() {
            return Err(ExtractionError::MalformedDocument(
                "missing %PDF- header".into(),
            ));
        }
        Ok(())
    }
}

impl From<Vec<u8>> for DocumentPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for DocumentPayload {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

// Payloads can be large; print the size only.
impl std::fmt::Debug for DocumentPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentPayload")
            .field("len", &self.bytes.len())
            .finish()
    }
}
