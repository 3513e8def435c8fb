//! The booking state machine.
//!
//! One pass: sign in, open the referral search, poll the specialty summary
//! into the ledger, then try to claim a slot for every pending referral.
//! There is no durable mid-flow resume point: any failure tears the session
//! down and the [`Runner`] starts the next pass from authentication. External
//! state (ledger and queue) is already persisted, so a restart only costs
//! navigation time.

use std::sync::Arc;
use std::thread;

use chrono::Local;
use tracing::{debug, error, info, instrument, warn};

use crate::actuator::Actuator;
use crate::config::Config;
use crate::diagnostics::FileDiagnostics;
use crate::driver::{DriverFactory, DriverSession, Element};
use crate::errors::AutomationError;
use crate::ledger;
use crate::locators;
use crate::notify::{LogNotifier, Notifier};
use crate::selector::Selector;
use crate::slots;
use crate::store::{ReferralRecord, Store};
use crate::wait::WaitPolicy;

fn sel(raw: &str) -> Selector {
    Selector::from(raw)
}

/// One full pass over one live browser session.
pub struct BookingWorkflow {
    actuator: Actuator,
    store: Store,
    notifier: Arc<dyn Notifier>,
    config: Config,
}

impl BookingWorkflow {
    pub fn new(session: Arc<dyn DriverSession>, store: Store, config: Config) -> Self {
        let mut actuator = Actuator::new(session, config.wait, config.retry);
        if let Some(dir) = &config.diagnostics_dir {
            actuator = actuator.with_diagnostics(Arc::new(FileDiagnostics::new(dir)));
        }
        Self {
            actuator,
            store,
            notifier: Arc::new(LogNotifier),
            config,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    fn session(&self) -> &dyn DriverSession {
        self.actuator.session()
    }

    fn wait(&self) -> &WaitPolicy {
        self.actuator.wait()
    }

    /// Execute one full pass: poll the specialty summary, then work the
    /// referral queue.
    #[instrument(skip(self))]
    pub fn run_once(&self) -> Result<(), AutomationError> {
        self.sign_in()?;
        self.open_referral_section()?;
        self.open_filters()?;
        self.clear_physician_filter()?;
        self.search_referral(&self.config.probe_referral)?;
        self.open_referral(&self.config.probe_referral)?;
        self.open_booking_dialog()?;

        let observed = self.poll_specialties()?;
        match ledger::reconcile(&self.store, &observed) {
            Ok(summary) => info!(?summary, "ledger reconciled"),
            // Persistence fault: the poll's effect is dropped, the pass
            // continues with whatever the ledger already holds.
            Err(err) => error!(error = %err, "could not reconcile ledger"),
        }
        self.close_summary()?;

        self.process_pending()?;
        info!("pass complete");
        Ok(())
    }

    // ---- authentication and navigation ----

    fn sign_in(&self) -> Result<(), AutomationError> {
        info!("signing in");
        self.session().navigate(&self.config.portal_url)?;
        let login = self.actuator.find(&sel(locators::LOGIN_INPUT))?;
        self.actuator.send_text(login.as_ref(), &self.config.login)?;
        let password = self.actuator.find(&sel(locators::PASSWORD_INPUT))?;
        self.actuator.send_text(password.as_ref(), &self.config.password)?;
        let submit = self.actuator.find(&sel(locators::SIGN_IN_BUTTON))?;
        self.actuator.click(submit.as_ref())
    }

    fn open_referral_section(&self) -> Result<(), AutomationError> {
        debug!("opening referral section");
        let section = self.actuator.find(&sel(locators::REFERRAL_SECTION))?;
        self.actuator.click(section.as_ref())
    }

    fn open_filters(&self) -> Result<(), AutomationError> {
        let toggle = self.actuator.find(&sel(locators::FILTER_TOGGLE))?;
        self.actuator.click(toggle.as_ref())
    }

    /// A physician filter left over from a manual session hides referrals;
    /// absence of the clear control just means the filter is already empty.
    fn clear_physician_filter(&self) -> Result<(), AutomationError> {
        let selector = sel(locators::PHYSICIAN_FILTER_CLEAR);
        match self
            .actuator
            .find_within(&selector, self.wait().probe_timeout)?
        {
            Some(clear) => self.actuator.click_best_effort(Some(&clear)),
            None => {
                debug!("no physician filter to clear");
                Ok(())
            }
        }
    }

    fn search_referral(&self, number: &str) -> Result<(), AutomationError> {
        debug!(number, "searching referral");
        let input = self.actuator.find(&sel(locators::REFERRAL_SEARCH_INPUT))?;
        self.actuator.clear(input.as_ref())?;
        self.actuator.click(input.as_ref())?;
        self.actuator.send_text(input.as_ref(), number)?;

        let search = self.actuator.find(&sel(locators::SEARCH_BUTTON))?;
        self.wait()
            .await_invisible(self.session(), &sel(locators::SPINNER), self.wait().timeout);
        self.actuator.click(search.as_ref())
    }

    fn open_referral(&self, number: &str) -> Result<(), AutomationError> {
        self.wait()
            .await_invisible(self.session(), &sel(locators::SPINNER), self.wait().timeout);
        self.wait()
            .await_visible(self.session(), &locators::referral_row(number), self.wait().timeout);
        let open = self.actuator.find(&sel(locators::OPEN_REFERRAL_BUTTON))?;
        self.actuator.click_best_effort(open.as_ref())
    }

    fn open_booking_dialog(&self) -> Result<(), AutomationError> {
        let book = self.actuator.find(&sel(locators::BOOK_BUTTON))?;
        self.actuator.click_best_effort(book.as_ref())?;

        // Once the next-week control is interactable the dialog has loaded.
        self.wait().await_clickable(
            self.session(),
            &sel(locators::NEXT_WEEK_BUTTON),
            self.wait().timeout,
        );
        let step_two = self.actuator.find(&sel(locators::STEP_TWO))?;
        self.actuator.click(step_two.as_ref())?;
        self.wait().await_visible(
            self.session(),
            &sel(locators::FIRST_SPECIALTY_ROW),
            self.wait().timeout,
        );
        Ok(())
    }

    // ---- specialty polling ----

    /// Read every (specialty, raw count text) pair from the summary table.
    /// A row whose cells have not rendered yet is re-read once before being
    /// dropped for the pass.
    pub fn poll_specialties(&self) -> Result<Vec<(String, String)>, AutomationError> {
        let rows = self.actuator.find_all(&sel(locators::SPECIALTY_ROWS))?;
        let mut observed = Vec::with_capacity(rows.len());
        for index in 1..=rows.len() {
            match self.read_specialty_row(index)? {
                Some(pair) => observed.push(pair),
                None => {
                    debug!(index, "row not rendered, re-reading once");
                    thread::sleep(self.wait().poll_interval);
                    match self.read_specialty_row(index)? {
                        Some(pair) => observed.push(pair),
                        None => warn!(index, "specialty row unreadable, skipped this pass"),
                    }
                }
            }
        }
        info!(rows = observed.len(), "specialty summary polled");
        Ok(observed)
    }

    fn read_specialty_row(
        &self,
        index: usize,
    ) -> Result<Option<(String, String)>, AutomationError> {
        let name = self.session().find_element(&locators::specialty_name(index))?;
        let count = self.session().find_element(&locators::specialty_count(index))?;
        match (name, count) {
            (Some(name), Some(count)) => Ok(Some((name.text()?, count.text()?))),
            _ => Ok(None),
        }
    }

    fn close_summary(&self) -> Result<(), AutomationError> {
        let close = self.actuator.find(&sel(locators::SUMMARY_CLOSE))?;
        self.actuator.click(close.as_ref())
    }

    // ---- the referral queue ----

    /// Attempt a booking for every pending referral whose specialty has free
    /// slots in the ledger. A referral whose specialty is unknown or at zero
    /// is skipped for the pass without touching the portal.
    #[instrument(skip(self))]
    pub fn process_pending(&self) -> Result<(), AutomationError> {
        let counts = match self.store.specialties() {
            Ok(counts) => counts,
            Err(err) => {
                error!(error = %err, "cannot read ledger, skipping referral processing");
                return Ok(());
            }
        };
        let pending = match self.store.pending_referrals() {
            Ok(pending) => pending,
            Err(err) => {
                error!(error = %err, "cannot read referral queue, skipping");
                return Ok(());
            }
        };
        info!(pending = pending.len(), "processing referral queue");

        for referral in &pending {
            let free = counts.get(&referral.specialty).copied().unwrap_or(0);
            if free <= 0 {
                debug!(
                    referral = %referral.referral_id,
                    specialty = %referral.specialty,
                    "no free slots in ledger, skipping"
                );
                continue;
            }
            if self.attempt_booking(referral)? {
                info!(referral = %referral.referral_id, "booked");
            }
        }
        Ok(())
    }

    /// Walk up to [`Config::week_limit`] weeks of the calendar for one
    /// referral. Returns whether a slot was claimed.
    #[instrument(skip(self, referral), fields(referral = %referral.referral_id))]
    pub fn attempt_booking(&self, referral: &ReferralRecord) -> Result<bool, AutomationError> {
        self.search_referral(&referral.referral_id)?;
        self.open_referral(&referral.referral_id)?;
        self.open_booking_dialog()?;
        self.scroll_to_step_marker()?;

        let predicate = slots::build_predicate(referral.specificity.as_deref());
        let forbidden = slots::forbidden_dates(Local::now().date_naive());

        let mut claimed = None;
        for week in 0..self.config.week_limit {
            self.ensure_next_week_ready();
            if !self.has_schedule_grid() {
                debug!(week, "no schedule grid this week");
                self.advance_week()?;
                continue;
            }
            let cells = self.actuator.find_all(&predicate)?;
            if cells.is_empty() {
                debug!(week, "no matching cells this week");
                self.advance_week()?;
                continue;
            }
            self.scroll_to_step_marker()?;
            if let Some(claim) = self.scan_cells(cells.len(), &predicate, &forbidden)? {
                claimed = Some(claim);
                break;
            }
            self.advance_week()?;
        }

        self.close_search_dialog()?;

        if let Some((date, time)) = claimed {
            if let Err(err) = self
                .store
                .mark_booked(&referral.referral_id, &date, &time)
            {
                // The claim stands on the portal; losing the local record is
                // recoverable by the operator, crashing here is not.
                error!(error = %err, "claim succeeded but could not be persisted");
            }
            self.notifier.notify(
                "Пациент записан",
                &format!(
                    "Направление {}: {} {}",
                    referral.referral_id, date, time
                ),
            );
            return Ok(true);
        }
        Ok(false)
    }

    // ---- week walking ----

    fn ensure_next_week_ready(&self) {
        let next_week = sel(locators::NEXT_WEEK_BUTTON);
        self.wait()
            .await_visible(self.session(), &next_week, self.wait().timeout);
        self.wait()
            .await_invisible(self.session(), &sel(locators::SPINNER), self.wait().timeout);
        self.wait()
            .await_clickable(self.session(), &next_week, self.wait().timeout);
    }

    /// Whether the current week has a schedule grid at all. Absence is the
    /// common case, so this probes with the short timeout and treats the
    /// distinguished timeout as a plain `false`.
    fn has_schedule_grid(&self) -> bool {
        match self.wait().require_visible(
            self.session(),
            &sel(locators::GRID_MARKER),
            self.wait().probe_timeout,
        ) {
            Ok(()) => true,
            Err(AutomationError::Timeout(_)) => false,
            Err(err) => {
                warn!(error = %err, "grid probe failed, treating as absent");
                false
            }
        }
    }

    fn advance_week(&self) -> Result<(), AutomationError> {
        let spinner = sel(locators::SPINNER);
        self.wait()
            .await_invisible(self.session(), &spinner, self.wait().timeout);
        self.scroll_to_step_marker()?;
        let next_week = self.actuator.find(&sel(locators::NEXT_WEEK_BUTTON))?;
        self.actuator.click(next_week.as_ref())?;
        self.wait()
            .await_invisible(self.session(), &spinner, self.wait().timeout);
        Ok(())
    }

    fn scroll_to_step_marker(&self) -> Result<(), AutomationError> {
        if let Some(marker) = self.session().find_element(&sel(locators::STEP_TWO))? {
            self.actuator.scroll_into_view(&marker)?;
        }
        Ok(())
    }

    // ---- cell scanning ----

    /// Open candidate cells in document order until one offers an acceptable
    /// date with at least one time, then claim the latest time.
    fn scan_cells(
        &self,
        cell_count: usize,
        predicate: &Selector,
        forbidden: &[String],
    ) -> Result<Option<(String, String)>, AutomationError> {
        for index in 1..=cell_count {
            let cell_sel = slots::nth_cell(predicate, index);
            let Some(cell) = self.session().find_element(&cell_sel)? else {
                debug!(index, "cell vanished before it could be opened");
                continue;
            };
            self.open_cell(&cell_sel, &cell)?;

            let date = self.read_cell_date()?;
            if slots::is_forbidden(&date, forbidden) {
                debug!(%date, "offered date is inside the exclusion window");
                self.reopen_cell_list()?;
                continue;
            }

            let times = self.actuator.find_all(&sel(locators::TIME_SLOTS))?;
            if times.is_empty() {
                debug!(%date, "no bookable times in cell");
                self.reopen_cell_list()?;
                continue;
            }

            let Some(time) = self.claim_last_time()? else {
                self.reopen_cell_list()?;
                continue;
            };
            self.confirm_claim()?;
            return Ok(Some((date, time)));
        }
        Ok(None)
    }

    fn open_cell(&self, cell_sel: &Selector, cell: &Element) -> Result<(), AutomationError> {
        if !self
            .wait()
            .await_clickable(self.session(), cell_sel, self.wait().probe_timeout)
        {
            self.actuator.scroll_into_view(cell)?;
        }
        self.actuator.click_best_effort(Some(cell))
    }

    fn read_cell_date(&self) -> Result<String, AutomationError> {
        let date_field = sel(locators::CELL_DATE_FIELD);
        self.wait()
            .await_visible(self.session(), &date_field, self.wait().timeout);
        match self.session().find_element(&date_field)? {
            Some(element) => element.text(),
            None => Err(AutomationError::ElementNotFound(
                "visit date field after opening a cell".into(),
            )),
        }
    }

    /// Clicking the now-active cell collapses it and brings the cell list
    /// back, so scanning can continue.
    fn reopen_cell_list(&self) -> Result<(), AutomationError> {
        let active = self.actuator.find(&sel(locators::ACTIVE_CELL))?;
        self.actuator.click_best_effort(active.as_ref())
    }

    /// Select the last (latest) offered time and return its label.
    fn claim_last_time(&self) -> Result<Option<String>, AutomationError> {
        let last = sel(locators::LAST_TIME_SLOT);
        if !self
            .wait()
            .await_clickable(self.session(), &last, self.wait().timeout)
        {
            return Ok(None);
        }
        let Some(element) = self.session().find_element(&last)? else {
            return Ok(None);
        };
        self.actuator.scroll_into_view(&element)?;
        let time = element.text()?;
        self.actuator.click_best_effort(Some(&element))?;
        Ok(Some(time))
    }

    fn confirm_claim(&self) -> Result<(), AutomationError> {
        let confirm = self.actuator.find(&sel(locators::CONFIRM_BOOKING))?;
        if let Some(element) = &confirm {
            self.actuator.scroll_into_view(element)?;
        }
        self.actuator.click(confirm.as_ref())?;
        let close = self.actuator.find(&sel(locators::CONFIRM_CLOSE))?;
        self.actuator.click(close.as_ref())
    }

    /// The search dialog may already be gone when a claim closed it; only
    /// click the close control if it is still around.
    fn close_search_dialog(&self) -> Result<(), AutomationError> {
        let selector = sel(locators::DIALOG_CLOSE);
        match self
            .actuator
            .find_within(&selector, self.wait().probe_timeout)?
        {
            Some(close) => self.actuator.click_best_effort(Some(&close)),
            None => Ok(()),
        }
    }
}

/// Drives passes to completion: a fresh session per attempt, bounded
/// restarts with a fixed delay, and an explicit give-up once the budget is
/// spent. Fatal session errors (driver/browser mismatch) are reported to the
/// operator and never retried.
pub struct Runner {
    factory: Arc<dyn DriverFactory>,
    store: Store,
    config: Config,
    notifier: Arc<dyn Notifier>,
}

impl Runner {
    pub fn new(factory: Arc<dyn DriverFactory>, store: Store, config: Config) -> Self {
        Self {
            factory,
            store,
            config,
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[instrument(skip(self))]
    pub fn run(&self) -> Result<(), AutomationError> {
        let mut restarts = 0u32;
        loop {
            let outcome = match self.factory.create() {
                Ok(session) => {
                    let workflow = BookingWorkflow::new(
                        session.clone(),
                        self.store.clone(),
                        self.config.clone(),
                    )
                    .with_notifier(self.notifier.clone());
                    let result = workflow.run_once();
                    if let Err(err) = session.close() {
                        warn!(error = %err, "session close failed");
                    }
                    result
                }
                Err(err) => Err(err),
            };

            match outcome {
                Ok(()) => return Ok(()),
                Err(err) if err.is_fatal() => {
                    self.notifier.notify(
                        "Авто-запись остановлена",
                        "Версия драйвера не поддерживает текущую версию браузера. Обновите драйвер.",
                    );
                    error!(error = %err, "fatal session error, manual intervention required");
                    return Err(err);
                }
                Err(err) => {
                    restarts += 1;
                    if restarts >= self.config.max_restarts {
                        error!(error = %err, restarts, "restart budget exhausted");
                        return Err(AutomationError::RetryExhausted {
                            operation: "booking pass".into(),
                            attempts: restarts,
                        });
                    }
                    warn!(error = %err, restarts, "pass failed, restarting from sign-in");
                    thread::sleep(self.config.restart_delay);
                }
            }
        }
    }
}
