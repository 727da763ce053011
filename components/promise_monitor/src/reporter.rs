//! Reporters receive the unhandled set after every change.

use std::cell::Cell;

use tracing::{info, warn};

use crate::aggregator::UnhandledRejection;
use crate::formatter::{FormattedRejection, Formatter};

/// Receives the current set of unhandled rejections.
///
/// An empty set after a non-empty one means every previously reported
/// rejection has since been handled.
pub trait Reporter {
    /// Called with the full unhandled set.
    fn report(&self, unhandled: &[UnhandledRejection]);
}

impl<F> Reporter for F
where
    F: Fn(&[UnhandledRejection]),
{
    fn report(&self, unhandled: &[UnhandledRejection]) {
        self(unhandled)
    }
}

/// Logs reports through `tracing`.
///
/// Non-empty sets are logged at `warn` with the formatted rejections as a
/// JSON field; the transition back to an empty set is logged once at `info`.
#[derive(Debug, Default)]
pub struct TracingReporter {
    formatter: Formatter,
    outstanding: Cell<bool>,
}

impl TracingReporter {
    /// Creates a reporter using `formatter`.
    pub fn new(formatter: Formatter) -> Self {
        Self {
            formatter,
            outstanding: Cell::new(false),
        }
    }

    /// Returns true if the last report contained unhandled rejections.
    pub fn has_outstanding(&self) -> bool {
        self.outstanding.get()
    }

    /// Formats the set the way it is logged.
    pub fn format_all(&self, unhandled: &[UnhandledRejection]) -> Vec<FormattedRejection> {
        unhandled
            .iter()
            .map(|entry| self.formatter.format(&entry.record))
            .collect()
    }
}

impl Reporter for TracingReporter {
    fn report(&self, unhandled: &[UnhandledRejection]) {
        if unhandled.is_empty() {
            if self.outstanding.replace(false) {
                info!("[promises] All previously unhandled rejections have now been handled");
            }
            return;
        }

        self.outstanding.set(true);
        let new = unhandled.iter().filter(|entry| entry.first_report).count();
        match serde_json::to_string(&self.format_all(unhandled)) {
            Ok(rejections) => warn!(
                new,
                rejections = %rejections,
                "[promises] Unhandled rejections: {}",
                unhandled.len()
            ),
            Err(error) => warn!(
                new,
                error = %error,
                "[promises] Unhandled rejections: {}",
                unhandled.len()
            ),
        }
    }
}
