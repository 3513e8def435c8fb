//! Blocking poll-until-predicate waits.
//!
//! Every timeout is an explicit per-call parameter; nothing mutates shared
//! timing state between calls. Callers pick between [`WaitPolicy::timeout`]
//! for ordinary waits and [`WaitPolicy::probe_timeout`] for "is this even
//! there" probes where absence is the common, expected answer.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::driver::DriverSession;
use crate::errors::AutomationError;
use crate::selector::Selector;

#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    /// Default wait for elements that ought to appear.
    pub timeout: Duration,
    /// Short wait for probes whose failure is ordinary control flow.
    pub probe_timeout: Duration,
    /// Sleep between predicate evaluations.
    pub poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl WaitPolicy {
    /// Block until the element is displayed. On timeout, log and return
    /// `false`; the page may already be in the desired state, so the caller
    /// proceeds regardless.
    pub fn await_visible(
        &self,
        session: &dyn DriverSession,
        selector: &Selector,
        timeout: Duration,
    ) -> bool {
        let satisfied = self.poll(timeout, || is_visible(session, selector));
        if !satisfied {
            warn!(%selector, ?timeout, "element did not become visible, proceeding anyway");
        }
        satisfied
    }

    /// Block until the element is gone or hidden (spinners, overlays).
    /// Timeout degrades to a logged no-op.
    pub fn await_invisible(&self, session: &dyn DriverSession, selector: &Selector, timeout: Duration) {
        let satisfied = self.poll(timeout, || !is_visible(session, selector));
        if !satisfied {
            warn!(%selector, ?timeout, "element still visible after wait, proceeding anyway");
        }
    }

    /// Block until the element is displayed and enabled. On timeout, log and
    /// return `false`.
    pub fn await_clickable(
        &self,
        session: &dyn DriverSession,
        selector: &Selector,
        timeout: Duration,
    ) -> bool {
        let satisfied = self.poll(timeout, || is_clickable(session, selector));
        if !satisfied {
            warn!(%selector, ?timeout, "element did not become clickable");
        }
        satisfied
    }

    /// Like [`await_visible`](Self::await_visible), but a timeout is a
    /// distinguished [`AutomationError::Timeout`] the caller must handle.
    /// Used where absence is a legitimate outcome, e.g. "no schedule grid
    /// exists for this week".
    pub fn require_visible(
        &self,
        session: &dyn DriverSession,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<(), AutomationError> {
        if self.poll(timeout, || is_visible(session, selector)) {
            Ok(())
        } else {
            Err(AutomationError::Timeout(format!(
                "element {selector} not visible within {timeout:?}"
            )))
        }
    }

    fn poll(&self, timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if predicate() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(self.poll_interval.min(timeout));
        }
    }
}

fn is_visible(session: &dyn DriverSession, selector: &Selector) -> bool {
    match session.find_element(selector) {
        Ok(Some(element)) => element.is_displayed().unwrap_or(false),
        Ok(None) => false,
        Err(err) => {
            debug!(%selector, error = %err, "visibility probe failed");
            false
        }
    }
}

fn is_clickable(session: &dyn DriverSession, selector: &Selector) -> bool {
    match session.find_element(selector) {
        Ok(Some(element)) => {
            element.is_displayed().unwrap_or(false) && element.is_enabled().unwrap_or(false)
        }
        Ok(None) => false,
        Err(err) => {
            debug!(%selector, error = %err, "clickability probe failed");
            false
        }
    }
}
