//! Mock parser backend for testing.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::{ExtractionError, ParserBackend, ParserSession};

/// Scripted document served by [`MockBackend`].
#[derive(Clone, Debug, Default)]
pub struct MockDocument {
    pages: Vec<String>,
    open_error: Option<String>,
    page_count_error: Option<String>,
    page_errors: HashMap<usize, String>,
    panic_on_page: Option<usize>,
    close_error: Option<String>,
    page_delay: Option<Duration>,
}

impl MockDocument {
    /// A document whose pages contain the given text, in order.
    pub fn pages<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pages: pages.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Opening fails with [`ExtractionError::MalformedDocument`].
    pub fn fail_open(mut self, msg: &str) -> Self {
        self.open_error = Some(msg.to_string());
        self
    }

    /// Reading the page count fails with [`ExtractionError::ParserFailure`].
    pub fn fail_page_count(mut self, msg: &str) -> Self {
        self.page_count_error = Some(msg.to_string());
        self
    }

    /// Reading page `index` fails with [`ExtractionError::ParserFailure`].
    pub fn fail_page(mut self, index: usize, msg: &str) -> Self {
        self.page_errors.insert(index, msg.to_string());
        self
    }

    /// Reading page `index` panics.
    pub fn panic_on_page(mut self, index: usize) -> Self {
        self.panic_on_page = Some(index);
        self
    }

    /// Closing fails with [`ExtractionError::ResourceCleanupFailure`].
    pub fn fail_close(mut self, msg: &str) -> Self {
        self.close_error = Some(msg.to_string());
        self
    }

    /// Sleep before returning each page.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = Some(delay);
        self
    }
}

/// A hand-rolled mock implementing [`ParserBackend`] for tests.
///
/// Every session it opens shares the backend's counters, so tests can assert
/// how many contexts were acquired and released.
pub struct MockBackend {
    document: MockDocument,
    opens: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn new(document: MockDocument) -> Self {
        Self {
            document,
            opens: Arc::new(AtomicUsize::new(0)),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How many times `open()` has been called.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// How many sessions have been closed (successfully or not).
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl ParserBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn open(&self, _payload: &[u8]) -> Result<Box<dyn ParserSession>, ExtractionError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = &self.document.open_error {
            return Err(ExtractionError::MalformedDocument(msg.clone()));
        }
        Ok(Box::new(MockSession {
            document: self.document.clone(),
            releases: Arc::clone(&self.releases),
        }))
    }
}

struct MockSession {
    document: MockDocument,
    releases: Arc<AtomicUsize>,
}

impl ParserSession for MockSession {
    fn page_count(&self) -> Result<usize, ExtractionError> {
        match &self.document.page_count_error {
            Some(msg) => Err(ExtractionError::ParserFailure(msg.clone())),
            None => Ok(self.document.pages.len()),
        }
    }

    fn page_text(&mut self, index: usize) -> Result<String, ExtractionError> {
        if let Some(delay) = self.document.page_delay {
            std::thread::sleep(delay);
        }
        if self.document.panic_on_page == Some(index) {
            panic!("mock parser panicked on page {index}");
        }
        if let Some(msg) = self.document.page_errors.get(&index) {
            return Err(ExtractionError::ParserFailure(msg.clone()));
        }
        self.document
            .pages
            .get(index)
            .cloned()
            .ok_or_else(|| ExtractionError::ParserFailure(format!("no page {index}")))
    }

    fn close(self: Box<Self>) -> Result<(), ExtractionError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        match &self.document.close_error {
            Some(msg) => Err(ExtractionError::ResourceCleanupFailure(msg.clone())),
            None => Ok(()),
        }
    }
}
