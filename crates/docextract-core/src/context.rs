//! Scoped parser context.
//!
//! ```text
//! acquire() → ParserContext → page_count()/page_text() → release()
//!     ↓                                                      ↓
//! [backend.open]                                    [session.close, result reported]
//!                   (early return / `?` / panic)
//!                              ↓
//!                           drop() → [session.close, failure logged]
//! ```
//!
//! The session is taken out of the guard the first time it is closed, so
//! whichever of `release()` or `Drop` runs first is the only one that
//! touches the parser.

use crate::{ExtractionError, ParserBackend, ParserSession};

/// RAII guard over one [`ParserSession`].
pub struct ParserContext {
    session: Option<Box<dyn ParserSession>>,
    backend: String,
}

impl ParserContext {
    /// Open `payload` with `backend`. Nothing is held if opening fails.
    pub fn acquire(backend: &dyn ParserBackend, payload: &[u8]) -> Result<Self, ExtractionError> {
        let session = backend.open(payload)?;
        tracing::debug!(backend = backend.name(), "parser context acquired");
        Ok(Self {
            session: Some(session),
            backend: backend.name().to_string(),
        })
    }

    pub fn page_count(&self) -> Result<usize, ExtractionError> {
        self.session().page_count()
    }

    pub fn page_text(&mut self, index: usize) -> Result<String, ExtractionError> {
        self.session_mut().page_text(index)
    }

    /// Close the session now and report whether the parser released cleanly.
    pub fn release(mut self) -> Result<(), ExtractionError> {
        let result = self.take_session().close();
        tracing::debug!(
            backend = %self.backend,
            ok = result.is_ok(),
            "parser context released"
        );
        result
    }

    // The session is only taken by `release`, which consumes the guard, or by
    // `drop`. While a `&self` exists it is always present.
    fn session(&self) -> &dyn ParserSession {
        match self.session.as_deref() {
            Some(session) => session,
            None => unreachable!("parser context used after release"),
        }
    }

    fn session_mut(&mut self) -> &mut dyn ParserSession {
        match self.session.as_deref_mut() {
            Some(session) => session,
            None => unreachable!("parser context used after release"),
        }
    }

    fn take_session(&mut self) -> Box<dyn ParserSession> {
        match self.session.take() {
            Some(session) => session,
            None => unreachable!("parser context released twice"),
        }
    }
}

impl Drop for ParserContext {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            match session.close() {
                Ok(()) => {
                    tracing::debug!(backend = %self.backend, "parser context released on drop")
                }
                Err(e) => tracing::warn!(
                    backend = %self.backend,
                    error = %e,
                    "parser context release failed on drop"
                ),
            }
        }
    }
}
