//! Per-request diagnostic log

use serde::Serialize;
use tracing::{debug, warn};

/// Snapshot returned by `SessionManager::diagnostics`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticsReport {
    /// Collected entries in order
    pub entries: Vec<String>,
    /// Name of the log destination the entries are meant for
    pub destination: String,
}

/// Collects lifecycle notes for one manager instance.
///
/// Errors are always kept; step notes only when `verbose` is on. Everything
/// is mirrored to `tracing` as well.
#[derive(Debug, Clone)]
pub(crate) struct Diagnostics {
    verbose: bool,
    entries: Vec<String>,
    destination: String,
}

impl Diagnostics {
    pub(crate) fn new(verbose: bool, destination: impl Into<String>) -> Self {
        Self {
            verbose,
            entries: Vec::new(),
            destination: destination.into(),
        }
    }

    /// Record a step
    pub(crate) fn step(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!("{}", message);
        if self.verbose {
            self.entries.push(message);
        }
    }

    /// Record a failure
    pub(crate) fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.entries.push(message);
    }

    pub(crate) fn report(&self) -> DiagnosticsReport {
        DiagnosticsReport {
            entries: self.entries.clone(),
            destination: self.destination.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_only_kept_when_verbose() {
        let mut quiet = Diagnostics::new(false, "session.log");
        quiet.step("Session INIT");
        quiet.error("No session table");
        assert_eq!(quiet.report().entries, vec!["No session table".to_string()]);

        let mut verbose = Diagnostics::new(true, "session.log");
        verbose.step("Session INIT");
        verbose.error("No session table");
        let report = verbose.report();
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.destination, "session.log");
    }
}
