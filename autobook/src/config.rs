//! Runtime configuration, loaded from the environment (`.env` supported).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::actuator::RetryPolicy;
use crate::errors::AutomationError;
use crate::wait::WaitPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    /// Portal entry URL.
    pub portal_url: String,
    /// Portal credentials.
    pub login: String,
    pub password: String,
    /// A referral number that always resolves, used to reach the specialty
    /// summary during the polling phase.
    pub probe_referral: String,
    /// SQLite database path.
    pub db_path: PathBuf,
    /// Where to drop page snapshots on persistent failures; `None` disables.
    pub diagnostics_dir: Option<PathBuf>,
    pub wait: WaitPolicy,
    pub retry: RetryPolicy,
    /// How many week-advances a per-referral search may make.
    pub week_limit: u32,
    /// How many full restarts a run may burn through before escalating.
    pub max_restarts: u32,
    /// Pause before a restarted pass signs in again.
    pub restart_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            portal_url: String::new(),
            login: String::new(),
            password: String::new(),
            probe_referral: String::new(),
            db_path: PathBuf::from("data.db"),
            diagnostics_dir: None,
            wait: WaitPolicy::default(),
            retry: RetryPolicy::default(),
            week_limit: 3,
            max_restarts: 5,
            restart_delay: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Environment variable names match the original deployment scripts.
    pub fn from_env() -> Result<Self, AutomationError> {
        dotenvy::dotenv().ok();
        Ok(Self {
            portal_url: required("PORTAL_URL")?,
            login: required("EMIPLOG")?,
            password: required("EMIPPASS")?,
            probe_referral: required("DIRECTION_FOR_GET_TALONS")?,
            db_path: env::var("AUTOBOOK_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data.db")),
            diagnostics_dir: env::var("AUTOBOOK_DIAGNOSTICS").ok().map(PathBuf::from),
            ..Self::default()
        })
    }
}

fn required(name: &str) -> Result<String, AutomationError> {
    env::var(name)
        .map_err(|_| AutomationError::InvalidArgument(format!("missing environment variable {name}")))
}
