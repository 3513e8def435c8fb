//! Operator notifications. Fire-and-forget: a lost notification never fails
//! the workflow that sent it.

use tracing::info;

pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

/// Default sink: notifications land in the log. A desktop-notification
/// transport implements [`Notifier`] outside this crate.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) {
        info!(title, message, "notification");
    }
}
