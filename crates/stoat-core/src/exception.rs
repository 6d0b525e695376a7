//! Typed non-local exit
//!
//! Raising does not unwind the Rust stack. A raising operation records the
//! exception object as the interpreter's pending exception and returns an
//! [`Unwind`] token; everything between the raise site and the host's
//! rescue boundary propagates it through `Result`.

use thiserror::Error;

use crate::value::Value;

/// A raised exception on its way out of the interpreter.
///
/// Carries the exception object plus a snapshot of its class name and
/// message taken at raise time, so the token renders without access to the
/// interpreter that produced it.
#[derive(Debug, Clone, Error)]
#[error("{class}: {message}")]
pub struct Unwind {
    value: Value,
    class: Box<str>,
    message: Box<str>,
}

impl Unwind {
    pub(crate) fn new(
        value: Value,
        class: impl Into<Box<str>>,
        message: impl Into<Box<str>>,
    ) -> Self {
        Self {
            value,
            class: class.into(),
            message: message.into(),
        }
    }

    /// The exception object.
    ///
    /// Subject to the same rooting rules as any other heap value; it stays
    /// alive while it is the pending exception of its interpreter.
    #[must_use]
    pub fn value(&self) -> Value {
        self.value
    }

    /// Name of the exception's class at raise time
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class
    }

    /// Exception message at raise time
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
