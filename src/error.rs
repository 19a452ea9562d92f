//! Error values carried by the live-call machinery.
//!
//! The errors facet forwards failures verbatim: the controller never inspects
//! them, and subscribers decide what to do (show a notice, call `retry()`,
//! ignore). [`Fault`] is the carrier for that: an opaque, cheaply clonable
//! wrapper around any `std::error::Error + Send + Sync`.
//!
//! Two ways to build one:
//! - [`Fault::new`] wraps a typed error and keeps it downcastable;
//! - [`Fault::msg`] builds one from a plain message (client-side validation,
//!   ad-hoc failures reported through the hooks).

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Opaque failure value surfaced on the errors facet.
///
/// Clonable (broadcast delivery clones per subscriber) and transparent:
/// `Display`/`source` delegate to the wrapped error.
///
/// # Example
/// ```
/// use callstream::Fault;
///
/// let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timed out");
/// let fault = Fault::new(io);
/// assert_eq!(fault.to_string(), "socket timed out");
/// assert!(fault.downcast_ref::<std::io::Error>().is_some());
///
/// let plain = Fault::msg("rate limited");
/// assert_eq!(plain.to_string(), "rate limited");
/// ```
#[derive(Clone, Debug, Error)]
#[error(transparent)]
pub struct Fault(Arc<dyn StdError + Send + Sync + 'static>);

impl Fault {
    /// Wraps a typed error.
    pub fn new<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(err))
    }

    /// Builds a fault from a plain message.
    pub fn msg(msg: impl Into<String>) -> Self {
        Self(Arc::new(Message(msg.into())))
    }

    /// Borrows the wrapped error.
    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.0
    }

    /// Attempts to downcast the wrapped error to a concrete type.
    ///
    /// Faults built with [`Fault::msg`] carry a private message type; match
    /// those by `to_string()` instead.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.0.downcast_ref::<E>()
    }
}

impl From<String> for Fault {
    fn from(msg: String) -> Self {
        Fault::msg(msg)
    }
}

impl From<&str> for Fault {
    fn from(msg: &str) -> Self {
        Fault::msg(msg)
    }
}

/// Message-only error used by [`Fault::msg`].
#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);
