//! Foundation types shared by the promise engine crates.
//!
//! This crate provides the error values the engine produces when it has to
//! reject on its own behalf, and the call-site snapshots the monitor uses to
//! rebuild causal chains across asynchronous boundaries.
//!
//! # Overview
//!
//! - [`JsError`] - Engine-generated rejection reasons
//! - [`ErrorKind`] - Categories of engine errors
//! - [`StackFrame`] - A captured call site
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, JsError, StackFrame};
//!
//! let error = JsError::type_error("reduce of empty array with no initial value");
//! assert_eq!(error.kind, ErrorKind::TypeError);
//! assert_eq!(
//!     error.to_string(),
//!     "TypeError: reduce of empty array with no initial value"
//! );
//!
//! let frame = StackFrame::capture("example");
//! assert!(frame.line > 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod source;

pub use error::{ErrorKind, JsError};
pub use source::StackFrame;
