//! Engine error types.
//!
//! Rejection reasons are arbitrary values, but whenever the engine itself has
//! to reject (an empty reduction, a missing capability, a timeout) it uses a
//! [`JsError`] so callers can match on the [`ErrorKind`].

use std::fmt;

use thiserror::Error;

/// The kind of engine error.
///
/// These mirror the built-in error constructors of the scripting model the
/// engine serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Generic error
    Error,
    /// Type error (e.g., calling a non-function, empty reduction)
    TypeError,
    /// Value out of allowed range
    RangeError,
    /// An operation did not settle before its deadline
    TimeoutError,
    /// Internal engine error
    InternalError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::TimeoutError => "TimeoutError",
            ErrorKind::InternalError => "InternalError",
        };
        f.write_str(name)
    }
}

/// An engine error with a kind and a human-readable message.
///
/// # Examples
///
/// ```
/// use core_types::{ErrorKind, JsError};
///
/// let error = JsError::new(ErrorKind::TypeError, "undefined is not a function");
///
/// assert_eq!(error.message, "undefined is not a function");
/// assert_eq!(error.to_string(), "TypeError: undefined is not a function");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct JsError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
}

impl JsError {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a plain `Error`.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Error, message)
    }

    /// Creates a `TypeError`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    /// Creates a `RangeError`.
    pub fn range_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RangeError, message)
    }

    /// Creates the error a timed-out operation rejects with.
    pub fn timeout(millis: u128) -> Self {
        Self::new(
            ErrorKind::TimeoutError,
            format!("timed out after {}ms", millis),
        )
    }

    /// Creates an `InternalError`.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    /// Returns true if this error has the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}
