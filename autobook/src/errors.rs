use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Click was intercepted by another element: {0}")]
    ClickIntercepted(String),

    #[error("Element is detached from the DOM: {0}")]
    StaleElement(String),

    #[error("Retry budget exhausted after {attempts} attempts: {operation}")]
    RetryExhausted { operation: String, attempts: u32 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Driver error: {0}")]
    DriverError(String),

    #[error("Browser session could not be created: {0}")]
    SessionNotCreated(String),
}

impl AutomationError {
    /// Driver/browser mismatch at startup. Retrying cannot succeed; the
    /// operator has to intervene.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AutomationError::SessionNotCreated(_))
    }

    /// Failures expected to resolve on their own within a few seconds
    /// (DOM re-renders, overlays, flaky driver round-trips).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AutomationError::StaleElement(_)
                | AutomationError::ClickIntercepted(_)
                | AutomationError::DriverError(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("malformed free-slot count text: {0:?}")]
    MalformedCount(String),
}
