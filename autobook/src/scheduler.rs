//! Periodic re-invocation of the booking pass.
//!
//! The pass itself is blocking and single-threaded, so each tick runs it on
//! the blocking pool while the interval timer stays on the runtime.

use std::sync::Arc;
use std::time::Duration;

use tokio::task;
use tracing::{error, info};

use crate::workflow::Runner;

/// Run a pass immediately, then once per `period`, until a fatal error or an
/// exhausted restart budget ends a pass unrecoverably.
///
/// The cadence is expected to be long enough that runs do not overlap; ticks
/// that fire while a pass is still executing are coalesced by awaiting the
/// running pass first.
pub async fn run_every(runner: Arc<Runner>, period: Duration) -> Result<(), crate::AutomationError> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        info!("starting scheduled pass");
        let runner = runner.clone();
        let outcome = task::spawn_blocking(move || runner.run())
            .await
            .map_err(|err| crate::AutomationError::DriverError(format!("pass panicked: {err}")))?;
        if let Err(err) = outcome {
            error!(error = %err, "scheduled pass gave up");
            return Err(err);
        }
    }
}
