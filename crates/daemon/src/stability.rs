//! Stability probing for files that may still be written to.
//!
//! Before converting a file we poll its size until it has held the same
//! nonzero value for a configured number of consecutive checks. Copies and
//! downloads in progress keep changing size, and some copy tools create an
//! empty placeholder first, so a zero-size observation never counts.

use auto_convert_config::Config;
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Settings for a stabilization wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilitySettings {
    /// Maximum time to wait before giving up.
    pub timeout: Duration,
    /// Consecutive unchanged-size polls required.
    pub required_checks: u32,
    /// Interval between polls.
    pub poll_interval: Duration,
}

impl Default for StabilitySettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            required_checks: 3,
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl StabilitySettings {
    /// Derive settings from the watch section of the configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: Duration::from_secs(config.watch.stabilize_timeout_secs),
            required_checks: config.watch.stable_checks,
            poll_interval: Duration::from_millis(config.watch.poll_interval_ms),
        }
    }
}

/// Counter state for consecutive unchanged-size observations.
///
/// Pure so the counting rules can be property-tested without a filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StabilityProbe {
    last_size: Option<u64>,
    stable_count: u32,
}

impl StabilityProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one size observation and return the updated consecutive count.
    ///
    /// `None` means the file was missing at poll time (e.g. mid-rename);
    /// that resets the run but is not fatal. A size of zero also resets,
    /// so an empty placeholder file can never be reported stable.
    pub fn observe(&mut self, size: Option<u64>) -> u32 {
        match size {
            Some(size) if size > 0 && self.last_size == Some(size) => {
                self.stable_count += 1;
            }
            Some(size) => {
                self.stable_count = 0;
                self.last_size = Some(size);
            }
            None => {
                self.stable_count = 0;
                self.last_size = None;
            }
        }
        self.stable_count
    }

    /// Current run of consecutive unchanged observations.
    pub fn stable_count(&self) -> u32 {
        self.stable_count
    }
}

/// Wait until the file's size stops changing, or until the timeout expires.
///
/// Returns `Ok(true)` once the size has held steady (and nonzero) for
/// `required_checks` consecutive polls, `Ok(false)` if the timeout elapses
/// first. A missing file resets the count without aborting the wait; any
/// other stat error is propagated.
pub async fn wait_until_stable(path: &Path, settings: &StabilitySettings) -> io::Result<bool> {
    let deadline = Instant::now() + settings.timeout;
    let mut probe = StabilityProbe::new();

    while Instant::now() < deadline {
        let size = match tokio::fs::metadata(path).await {
            Ok(metadata) => Some(metadata.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };

        if probe.observe(size) >= settings.required_checks {
            return Ok(true);
        }

        sleep(settings.poll_interval).await;
    }

    Ok(false)
}
