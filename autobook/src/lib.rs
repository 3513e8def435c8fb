//! Resilient browser automation for claiming hospital referral slots.
//!
//! This crate automates a hospital scheduling portal: it signs in, reads the
//! number of free appointment slots per medical specialty into a local SQLite
//! ledger, and walks weekly calendar grids to claim an acceptable slot for
//! every referral still waiting to be booked.
//!
//! The browser itself is behind the [`DriverSession`] trait; any WebDriver
//! backend (or a scripted fake in tests) can plug in. On top of that sit
//! [`WaitPolicy`] (blocking poll-until-predicate waits) and [`Actuator`]
//! (click/type/scroll with bounded retry), and on top of those the
//! [`BookingWorkflow`] state machine.

pub mod actuator;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod errors;
pub mod ledger;
pub mod locators;
pub mod notify;
pub mod scheduler;
pub mod selector;
pub mod slots;
pub mod store;
pub mod wait;
pub mod workflow;

pub use actuator::{Actuator, RetryPolicy};
pub use config::Config;
pub use diagnostics::{DiagnosticsSink, FileDiagnostics};
pub use driver::{DriverFactory, DriverSession, Element, ElementImpl};
pub use errors::{AutomationError, StoreError};
pub use notify::{LogNotifier, Notifier};
pub use selector::Selector;
pub use store::{OpeningEvent, QueueOutcome, ReferralRecord, SpecialtyRecord, Store};
pub use wait::WaitPolicy;
pub use workflow::{BookingWorkflow, Runner};
