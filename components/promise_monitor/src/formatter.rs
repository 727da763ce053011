//! Stack stitching for unhandled rejections.

use std::time::UNIX_EPOCH;

use core_types::StackFrame;
use serde::{Deserialize, Serialize};

use crate::aggregator::Record;

/// Formatting options, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    /// Heading placed before the creation site
    pub unhandled_message: String,
    /// Separator placed before the rejection site
    pub reason_message: String,
    /// Frames whose source path contains one of these are left out
    pub omit_sources: Vec<String>,
    /// Maximum number of ancestor frames in a stitched stack
    pub max_ancestors: usize,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            unhandled_message: "Unhandled rejection escaped at:".to_string(),
            reason_message: "Caused by reason at:".to_string(),
            omit_sources: Vec::new(),
            max_ancestors: 32,
        }
    }
}

/// An unhandled rejection ready for logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedRejection {
    /// Raw promise id
    pub promise: u64,
    /// Display form of the reason
    pub reason: Option<String>,
    /// Creation time in milliseconds since the Unix epoch
    pub created: u64,
    /// Stitched stack: heading, creation site, ancestor sites, separator,
    /// rejection site
    pub stack: Vec<String>,
}

impl FormattedRejection {
    /// Serializes the rejection to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Turns records into [`FormattedRejection`]s.
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: FormatterConfig,
}

impl Formatter {
    /// Creates a formatter with `config`.
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    /// Creates a formatter from a JSON config; missing fields take their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Returns the active config.
    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    /// Formats one record.
    pub fn format(&self, record: &Record) -> FormattedRejection {
        let rejection = record.rejection();
        let created = record
            .created()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();

        let mut stack = vec![self.config.unhandled_message.clone()];
        stack.extend(self.frame(record.created_at()));
        stack.extend(
            record
                .ancestors()
                .take(self.config.max_ancestors)
                .filter_map(|ancestor| self.frame(ancestor.created_at())),
        );
        if let Some(rejection) = &rejection {
            stack.push(self.config.reason_message.clone());
            stack.extend(self.frame(&rejection.rejected_at));
        }

        FormattedRejection {
            promise: record.id().get(),
            reason: rejection.map(|rejection| rejection.reason.to_string()),
            created,
            stack,
        }
    }

    fn frame(&self, frame: &StackFrame) -> Option<String> {
        let omitted = frame.source_url.as_deref().is_some_and(|source| {
            self.config
                .omit_sources
                .iter()
                .any(|pattern| source.contains(pattern.as_str()))
        });
        (!omitted).then(|| frame.to_string())
    }
}
