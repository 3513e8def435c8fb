//! Click/type/scroll primitives with bounded retry.
//!
//! The portal renders asynchronously: elements re-render mid-click, overlays
//! intercept pointer events, references go stale. The [`Actuator`] converts
//! that into a small set of dependable operations. Transient failures are
//! retried with a bounded budget and backoff; a spent budget escalates as
//! [`AutomationError::RetryExhausted`] instead of spinning forever.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::diagnostics::DiagnosticsSink;
use crate::driver::{DriverSession, Element};
use crate::errors::AutomationError;
use crate::selector::Selector;
use crate::wait::WaitPolicy;

/// Bounded retry with doubling backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(16),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry attempt (1-based): base, 2x, 4x, ...
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

pub struct Actuator {
    session: Arc<dyn DriverSession>,
    wait: WaitPolicy,
    retry: RetryPolicy,
    diagnostics: Option<Arc<dyn DiagnosticsSink>>,
}

impl Actuator {
    pub fn new(session: Arc<dyn DriverSession>, wait: WaitPolicy, retry: RetryPolicy) -> Self {
        Self {
            session,
            wait,
            retry,
            diagnostics: None,
        }
    }

    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    pub fn session(&self) -> &dyn DriverSession {
        self.session.as_ref()
    }

    pub fn wait(&self) -> &WaitPolicy {
        &self.wait
    }

    /// Wait until the element is clickable (up to the default timeout), then
    /// resolve it. Returns `None` when the wait elapses; the caller is
    /// responsible for null-checking.
    pub fn find(&self, selector: &Selector) -> Result<Option<Element>, AutomationError> {
        self.find_within(selector, self.wait.timeout)
    }

    /// [`find`](Self::find) with an explicit wait budget.
    pub fn find_within(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Option<Element>, AutomationError> {
        if !self.wait.await_clickable(self.session.as_ref(), selector, timeout) {
            return Ok(None);
        }
        self.session.find_element(selector)
    }

    /// Resolve every element matching the selector right now, possibly none.
    pub fn find_all(&self, selector: &Selector) -> Result<Vec<Element>, AutomationError> {
        self.session.find_elements(selector)
    }

    /// Click an element that must exist. A missing element fails fast with
    /// [`AutomationError::ElementNotFound`], which restarts the whole
    /// workflow; transient actuation errors (including an intercepted click)
    /// are retried until the budget is spent.
    pub fn click(&self, element: Option<&Element>) -> Result<(), AutomationError> {
        let element = Self::required(element, "click")?;
        self.click_retrying(element, false)
    }

    /// Like [`click`](Self::click), except an intercepted click is surfaced
    /// to the caller immediately: an overlapping element needs workflow-level
    /// recovery (re-scroll, re-search), not another blind attempt.
    pub fn click_best_effort(&self, element: Option<&Element>) -> Result<(), AutomationError> {
        let element = Self::required(element, "click")?;
        self.click_retrying(element, true)
    }

    pub fn send_text(&self, element: Option<&Element>, text: &str) -> Result<(), AutomationError> {
        let element = Self::required(element, "send_text")?;
        element.send_keys(text)
    }

    pub fn clear(&self, element: Option<&Element>) -> Result<(), AutomationError> {
        let element = Self::required(element, "clear")?;
        element.clear()
    }

    /// Scroll the page so the element is inside the viewport.
    pub fn scroll_into_view(&self, element: &Element) -> Result<(), AutomationError> {
        self.session
            .execute_script("return arguments[0].scrollIntoView(true);", Some(element))
    }

    fn required<'e>(
        element: Option<&'e Element>,
        operation: &str,
    ) -> Result<&'e Element, AutomationError> {
        element.ok_or_else(|| {
            AutomationError::ElementNotFound(format!("{operation} target never resolved"))
        })
    }

    fn click_retrying(
        &self,
        element: &Element,
        surface_intercepted: bool,
    ) -> Result<(), AutomationError> {
        let mut attempt = 0u32;
        loop {
            match element.click() {
                Ok(()) => return Ok(()),
                Err(AutomationError::ClickIntercepted(msg)) if surface_intercepted => {
                    debug!(element = %element.describe(), "click intercepted, surfacing to caller");
                    return Err(AutomationError::ClickIntercepted(msg));
                }
                Err(err) if err.is_transient() => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        self.capture("click-retries-exhausted");
                        return Err(AutomationError::RetryExhausted {
                            operation: format!("click {}", element.describe()),
                            attempts: attempt,
                        });
                    }
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        element = %element.describe(),
                        attempt,
                        ?delay,
                        error = %err,
                        "click failed, retrying"
                    );
                    std::thread::sleep(delay);
                }
                Err(err) => {
                    self.capture("click-failed");
                    return Err(err);
                }
            }
        }
    }

    fn capture(&self, label: &str) {
        if let Some(sink) = &self.diagnostics {
            sink.capture(self.session.as_ref(), label);
        }
    }
}
