//! Reconciling polled specialty counts against the stored ledger.
//!
//! The portal renders each count as semi-structured text ("Свободных ячеек:
//! 5", occasionally a bare number). The parser is explicit about that
//! grammar; a row that still fails after the workflow's single re-read is
//! skipped for the pass rather than failing it.

use tracing::{debug, info, warn};

use crate::errors::StoreError;
use crate::store::Store;

/// What one reconcile pass did, for logging and assertions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Specialties seen for the first time and inserted.
    pub inserted: usize,
    /// Stored counts brought in line with the observation.
    pub updated: usize,
    /// Opening events appended (count rose by more than one).
    pub events: usize,
    /// Rows dropped because the count text would not parse.
    pub skipped: usize,
}

/// Parse the numeric free-slot count out of the portal's rendering.
/// Accepts a `"...: <int>"` suffix or a bare integer. A free count is never
/// negative, so a negative number is rendering garbage too.
pub fn parse_free_count(raw: &str) -> Result<i64, StoreError> {
    let candidate = match raw.rsplit_once(": ") {
        Some((_, suffix)) => suffix,
        None => raw,
    };
    let count = candidate
        .trim()
        .parse::<i64>()
        .map_err(|_| StoreError::MalformedCount(raw.to_string()))?;
    if count < 0 {
        return Err(StoreError::MalformedCount(raw.to_string()));
    }
    Ok(count)
}

/// Bring the ledger in line with one poll of `(specialty, raw count text)`
/// pairs.
///
/// Unknown specialties are inserted as-is (no event). For known ones, the
/// stored count always converges to the observation; an opening event is
/// appended only when the count *rose* by more than one — single-slot
/// fluctuations are routine cancellations by other bookers, not a schedule
/// opening worth logging.
pub fn reconcile(
    store: &Store,
    observed: &[(String, String)],
) -> Result<ReconcileSummary, StoreError> {
    let known = store.specialties()?;
    let mut summary = ReconcileSummary::default();

    for (name, raw_count) in observed {
        let observed_count = match parse_free_count(raw_count) {
            Ok(count) => count,
            Err(err) => {
                warn!(specialty = %name, error = %err, "skipping row for this pass");
                summary.skipped += 1;
                continue;
            }
        };

        match known.get(name) {
            None => {
                info!(specialty = %name, count = observed_count, "new specialty");
                store.insert_specialty(name, observed_count)?;
                summary.inserted += 1;
            }
            Some(&stored) if stored == observed_count => {
                debug!(specialty = %name, count = stored, "unchanged");
            }
            Some(&stored) => {
                let delta = stored - observed_count;
                if delta < -1 {
                    info!(specialty = %name, delta, "slots opened, logging event");
                    store.log_opening(name, delta)?;
                    summary.events += 1;
                }
                store.set_free_count(name, observed_count)?;
                summary.updated += 1;
            }
        }
    }

    Ok(summary)
}
