//! Post-mortem capture for failed actuations.

use std::fs;
use std::path::PathBuf;

use chrono::Local;
use tracing::{error, info};

use crate::driver::DriverSession;

/// Receives a snapshot when an actuation gives up. Must never fail the
/// operation it is diagnosing.
pub trait DiagnosticsSink: Send + Sync {
    fn capture(&self, session: &dyn DriverSession, label: &str);
}

/// Writes the current page markup to a timestamped file.
pub struct FileDiagnostics {
    dir: PathBuf,
}

impl FileDiagnostics {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DiagnosticsSink for FileDiagnostics {
    fn capture(&self, session: &dyn DriverSession, label: &str) {
        let source = match session.page_source() {
            Ok(source) => source,
            Err(err) => {
                error!(label, error = %err, "could not read page source for diagnostics");
                return;
            }
        };
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let path = self.dir.join(format!("{label}-{stamp}.html"));
        if let Err(err) = fs::create_dir_all(&self.dir).and_then(|_| fs::write(&path, source)) {
            error!(label, path = %path.display(), error = %err, "could not write diagnostics snapshot");
        } else {
            info!(label, path = %path.display(), "diagnostics snapshot written");
        }
    }
}
