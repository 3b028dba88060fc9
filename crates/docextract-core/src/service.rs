use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::text::normalize_page_text;
use crate::{DocumentPayload, ExtractionError, ParserBackend, ParserContext};

/// What to do when the parser context fails to release after the text was
/// already extracted.
///
/// When extraction itself failed, the extraction error is always returned and
/// a cleanup failure is only logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupPolicy {
    /// Return the text, log a warning and record it in [`Extraction::cleanup_warning`].
    #[default]
    Lenient,
    /// Return [`ExtractionError::ResourceCleanupFailure`].
    Strict,
}

impl FromStr for CleanupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(CleanupPolicy::Lenient),
            "strict" => Ok(CleanupPolicy::Strict),
            other => Err(format!(
                "unknown cleanup policy '{other}' (expected 'lenient' or 'strict')"
            )),
        }
    }
}

/// Per-service extraction settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOptions {
    /// Inserted between the text of consecutive pages.
    pub page_separator: String,
    /// Run [`normalize_page_text`] over every page.
    pub normalize: bool,
    pub cleanup_policy: CleanupPolicy,
    /// Deadline for one call, checked at page boundaries. Once it passes the
    /// worker stops before the next page, so a call can overrun by the time
    /// of the page read in progress. `None` waits for the parser indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            page_separator: "\n\n".to_string(),
            normalize: true,
            cleanup_policy: CleanupPolicy::Lenient,
            timeout: None,
        }
    }
}

/// Text extracted from one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    /// Pages reported by the parser, including pages without text.
    pub page_count: usize,
    /// Set when the parser context failed to release under [`CleanupPolicy::Lenient`].
    pub cleanup_warning: Option<String>,
}

impl Extraction {
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Run one extraction on the current thread.
///
/// Pipeline:
/// 1. Reject empty payloads and payloads without a PDF header
/// 2. Acquire a [`ParserContext`] from `backend`
/// 3. Read every page in order, checking `cancel` before each one
/// 4. Release the context and apply the cleanup policy
///
/// The context is released exactly once on every path: explicitly in step 4,
/// or by its `Drop` impl if a page read panics.
pub fn extract_blocking(
    backend: &dyn ParserBackend,
    payload: &DocumentPayload,
    options: &ExtractionOptions,
    cancel: &CancellationToken,
) -> Result<Extraction, ExtractionError> {
    payload.validate()?;
    if cancel.is_cancelled() {
        return Err(ExtractionError::Cancelled);
    }

    let mut ctx = ParserContext::acquire(backend, payload.as_bytes())?;
    let outcome = read_pages(&mut ctx, options, cancel);
    let released = ctx.release();

    match (outcome, released) {
        (Ok(extraction), Ok(())) => Ok(extraction),
        (Ok(mut extraction), Err(cleanup)) => match options.cleanup_policy {
            CleanupPolicy::Lenient => {
                tracing::warn!(
                    backend = backend.name(),
                    error = %cleanup,
                    "parser context release failed after successful extraction"
                );
                extraction.cleanup_warning = Some(cleanup.to_string());
                Ok(extraction)
            }
            CleanupPolicy::Strict => {
                tracing::warn!(
                    backend = backend.name(),
                    error = %cleanup,
                    "parser context release failed after successful extraction, discarding text"
                );
                Err(cleanup)
            }
        },
        (Err(primary), Ok(())) => Err(primary),
        (Err(primary), Err(cleanup)) => {
            tracing::warn!(
                backend = backend.name(),
                error = %cleanup,
                primary = %primary,
                "parser context release failed after failed extraction"
            );
            Err(primary)
        }
    }
}

fn read_pages(
    ctx: &mut ParserContext,
    options: &ExtractionOptions,
    cancel: &CancellationToken,
) -> Result<Extraction, ExtractionError> {
    let page_count = ctx.page_count()?;
    let mut pages = Vec::with_capacity(page_count);

    for index in 0..page_count {
        if cancel.is_cancelled() {
            tracing::debug!(page = index, "extraction cancelled between pages");
            return Err(ExtractionError::Cancelled);
        }
        let raw = ctx.page_text(index)?;
        let text = if options.normalize {
            normalize_page_text(&raw)
        } else {
            raw
        };
        if !text.trim().is_empty() {
            pages.push(text);
        }
    }

    Ok(Extraction {
        text: pages.join(&options.page_separator),
        page_count,
        cleanup_warning: None,
    })
}

/// Async front door for text extraction.
///
/// Cheap to clone; every clone shares the backend. Calls are independent:
/// each one opens and releases its own parser context on a blocking worker.
#[derive(Clone)]
pub struct ExtractionService {
    backend: Arc<dyn ParserBackend>,
    options: ExtractionOptions,
}

impl std::fmt::Debug for ExtractionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionService")
            .field("backend", &self.backend.name())
            .field("options", &self.options)
            .finish()
    }
}

impl ExtractionService {
    pub fn new(backend: Arc<dyn ParserBackend>) -> Self {
        Self {
            backend,
            options: ExtractionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExtractionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ExtractionOptions {
        &self.options
    }

    /// Extract the text of `payload`.
    pub async fn extract(
        &self,
        payload: impl Into<DocumentPayload>,
    ) -> Result<Extraction, ExtractionError> {
        self.extract_with_cancel(payload, CancellationToken::new())
            .await
    }

    /// Extract the text of `payload`, stopping at the next page boundary once
    /// `cancel` fires.
    ///
    /// The worker is also cancelled if the configured timeout elapses or this
    /// future is dropped. On timeout this waits for the page read in progress
    /// to finish, so the parser context has been released by the time this
    /// returns.
    pub async fn extract_with_cancel(
        &self,
        payload: impl Into<DocumentPayload>,
        cancel: CancellationToken,
    ) -> Result<Extraction, ExtractionError> {
        let payload = payload.into();
        let backend = Arc::clone(&self.backend);
        let options = self.options.clone();
        let timeout = options.timeout;

        let worker_cancel = cancel.child_token();
        let worker_token = worker_cancel.clone();
        let _abandon = worker_cancel.clone().drop_guard();

        let span = tracing::debug_span!(
            "extract",
            backend = backend.name(),
            bytes = payload.len()
        );

        let mut handle = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            extract_blocking(backend.as_ref(), &payload, &options, &worker_token)
        });

        let joined = match timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    worker_cancel.cancel();
                    // Wait for the worker so its context is released before we return.
                    let _ = handle.await;
                    tracing::warn!(
                        timeout_ms = limit.as_millis() as u64,
                        "PDF extraction timed out"
                    );
                    return Err(ExtractionError::TimedOut(limit));
                }
            },
            None => handle.await,
        };

        let extraction = joined.map_err(|e| {
            if e.is_panic() {
                ExtractionError::ParserFailure("extraction worker panicked".into())
            } else {
                ExtractionError::Cancelled
            }
        })??;

        tracing::info!(
            page_count = extraction.page_count,
            chars = extraction.text.chars().count(),
            "PDF text extraction complete"
        );
        Ok(extraction)
    }
}
