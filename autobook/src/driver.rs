//! The boundary to the concrete browser driver.
//!
//! The rest of the crate never talks to a WebDriver product directly; it goes
//! through [`DriverSession`] and [`Element`]. A backend implements the two
//! `*Impl` traits, tests plug in a scripted fake.

use std::fmt;
use std::sync::Arc;

use crate::errors::AutomationError;
use crate::selector::Selector;

/// One live browser session, exclusively owned by one workflow run.
pub trait DriverSession: Send + Sync {
    /// Load the given URL in the session's window.
    fn navigate(&self, url: &str) -> Result<(), AutomationError>;

    /// Resolve a selector to an element, or `None` when nothing matches
    /// right now. Polling and timeouts live above this call, in
    /// [`crate::WaitPolicy`].
    fn find_element(&self, selector: &Selector) -> Result<Option<Element>, AutomationError>;

    /// Resolve a selector to every matching element (possibly empty).
    fn find_elements(&self, selector: &Selector) -> Result<Vec<Element>, AutomationError>;

    /// Run a script in the page, optionally against an element
    /// (`arguments[0]`).
    fn execute_script(
        &self,
        script: &str,
        element: Option<&Element>,
    ) -> Result<(), AutomationError>;

    /// Current page markup, used for post-mortem diagnostics.
    fn page_source(&self) -> Result<String, AutomationError>;

    /// Tear the session down. Idempotent.
    fn close(&self) -> Result<(), AutomationError>;
}

/// Creates fresh sessions for the restart loop: every recovery attempt gets
/// a brand-new browser, exactly like a manual relaunch would.
pub trait DriverFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn DriverSession>, AutomationError>;
}

/// The per-element operations a backend must provide.
pub trait ElementImpl: Send + Sync {
    fn click(&self) -> Result<(), AutomationError>;
    fn text(&self) -> Result<String, AutomationError>;
    fn send_keys(&self, text: &str) -> Result<(), AutomationError>;
    fn clear(&self) -> Result<(), AutomationError>;
    fn is_displayed(&self) -> Result<bool, AutomationError>;
    fn is_enabled(&self) -> Result<bool, AutomationError>;
    /// Short human-readable description for logs and error messages.
    fn describe(&self) -> String;
}

/// A handle to one element on the page.
#[derive(Clone)]
pub struct Element {
    inner: Arc<dyn ElementImpl>,
}

impl Element {
    pub fn new(inner: Arc<dyn ElementImpl>) -> Self {
        Self { inner }
    }

    pub fn click(&self) -> Result<(), AutomationError> {
        self.inner.click()
    }

    pub fn text(&self) -> Result<String, AutomationError> {
        self.inner.text()
    }

    pub fn send_keys(&self, text: &str) -> Result<(), AutomationError> {
        self.inner.send_keys(text)
    }

    pub fn clear(&self) -> Result<(), AutomationError> {
        self.inner.clear()
    }

    pub fn is_displayed(&self) -> Result<bool, AutomationError> {
        self.inner.is_displayed()
    }

    pub fn is_enabled(&self) -> Result<bool, AutomationError> {
        self.inner.is_enabled()
    }

    pub fn describe(&self) -> String {
        self.inner.describe()
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Element({})", self.inner.describe())
    }
}
