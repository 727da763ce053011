//! Call-site snapshots.
//!
//! The engine has no interpreter stack to walk, so a "stack snapshot" is the
//! source location of the public call that created or rejected a promise,
//! captured through `#[track_caller]`. Causal chains are rebuilt by linking
//! snapshots of parent and child promises.

use std::fmt;
use std::panic::Location;

use serde::Serialize;

/// A single captured call site.
///
/// # Examples
///
/// ```
/// use core_types::StackFrame;
///
/// let frame = StackFrame {
///     function_name: Some("then".to_string()),
///     source_url: Some("src/main.rs".to_string()),
///     line: 25,
///     column: 10,
/// };
///
/// assert_eq!(frame.to_string(), "at then (src/main.rs:25:10)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackFrame {
    /// Name of the operation, or None for anonymous sites
    pub function_name: Option<String>,
    /// File path of the source, or None if not available
    pub source_url: Option<String>,
    /// Line number where the call occurred
    pub line: u32,
    /// Column number where the call occurred
    pub column: u32,
}

impl StackFrame {
    /// Builds a frame from a source location.
    pub fn from_location(function_name: &str, location: &Location<'_>) -> Self {
        Self {
            function_name: Some(function_name.to_string()),
            source_url: Some(location.file().to_string()),
            line: location.line(),
            column: location.column(),
        }
    }

    /// Captures the location of the caller.
    ///
    /// Inside a `#[track_caller]` chain this resolves to the outermost
    /// untracked call site.
    #[track_caller]
    pub fn capture(function_name: &str) -> Self {
        Self::from_location(function_name, Location::caller())
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.function_name.as_deref().unwrap_or("<anonymous>");
        match &self.source_url {
            Some(url) => write!(f, "at {} ({}:{}:{})", name, url, self.line, self.column),
            None => write!(f, "at {}", name),
        }
    }
}
