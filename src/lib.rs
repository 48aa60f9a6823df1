//! Railway-oriented promises.
//!
//! Two pieces, usable together or apart:
//!
//! * [`railway`] — combinators over the two-track `Result` value: [`bind`],
//!   [`compose`], [`turnout`], [`turnin`], [`tee`], [`bimap`], [`try_catch`],
//!   [`unwrap`]. Synchronous pipelines that short-circuit on the first
//!   failure instead of raising.
//! * [`Promise`] — a thread-safe, one-shot asynchronous value container.
//!   Settles at most once (`fulfill`/`reject`), fans out to registered
//!   completions exactly once each, in registration order. Consumption is
//!   callback-only: there is no blocking wait, and a [`Dispatcher`] decides
//!   where completions actually run.
//!
//! # Examples
//!
//! ```
//! use promise_rail::Promise;
//! use std::thread;
//!
//! let promise: Promise<String> = Promise::new();
//! promise.then(|value| println!("received {value:?}"));
//!
//! let producer = promise.clone();
//! let worker = thread::spawn(move || producer.fulfill(String::from("🍓")));
//! worker.join().expect("the worker thread has panicked");
//! assert!(promise.is_fulfilled());
//! ```
//!
//! The two worlds bridge through [`Promise::complete`], which fulfills on
//! `Ok` and wraps an `Err` into a [`Failure`] rejection:
//!
//! ```
//! use promise_rail::{railway, Promise};
//!
//! let parse = railway::unwrap_fn(|text: &str| text.parse::<u32>().ok());
//! let promise: Promise<u32> = Promise::new();
//! promise.complete(parse("42"));
//! assert_eq!(promise.value().as_deref(), Some(&42));
//! ```

use std::any::Any;
use std::fmt;

use thiserror::Error;

mod dispatch;
mod promise;
pub mod railway;

pub use dispatch::{Dispatcher, Job};
pub use promise::Promise;
pub use railway::{bimap, bind, compose, tee, try_catch, turnin, turnout, unwrap};

/// The distinguished failure marker produced by [`railway::unwrap`] when the
/// optional value is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expected a value, found none")]
pub struct Nil;

/// A captured panic, as produced by [`railway::try_catch`] and the promise
/// chaining layer.
///
/// Only the panic message survives the capture: `panic!` payloads are
/// `&'static str` or `String`, and anything else (a `panic_any` with a custom
/// type) collapses to a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("panicked: {message}")]
pub struct Panic {
    message: String,
}

impl Panic {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
            (*text).to_owned()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "<non-string panic payload>".to_owned()
        };
        Self { message }
    }

    /// The message the panic carried.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The rejection value of a [`Promise`]: an arbitrary error lifted into the
/// untyped error channel.
///
/// Rejections are untyped; whatever went in comes back out via
/// [`Failure::downcast_ref`]:
///
/// ```
/// use promise_rail::Failure;
///
/// let failure = Failure::new("out of strawberries");
/// assert_eq!(failure.downcast_ref::<&str>(), Some(&"out of strawberries"));
/// assert!(failure.downcast_ref::<u32>().is_none());
/// ```
pub struct Failure(Box<dyn Any + Send + Sync>);

impl Failure {
    /// Lift an arbitrary error value into the rejection channel.
    pub fn new<E: Any + Send + Sync>(error: E) -> Self {
        Self(Box::new(error))
    }

    /// Borrow the carried error if it is an `E`.
    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        self.0.downcast_ref()
    }

    /// Take the carried error back out if it is an `E`.
    pub fn downcast<E: Any>(self) -> Result<E, Self> {
        match self.0.downcast::<E>() {
            Ok(error) => Ok(*error),
            Err(other) => Err(Self(other)),
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self::new(Panic::from_payload(payload))
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(panic) = self.downcast_ref::<Panic>() {
            write!(f, "Failure({panic})")
        } else if let Some(text) = self.downcast_ref::<&'static str>() {
            write!(f, "Failure({text:?})")
        } else if let Some(text) = self.downcast_ref::<String>() {
            write!(f, "Failure({text:?})")
        } else {
            f.write_str("Failure(..)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_round_trips_the_carried_error() {
        let failure = Failure::new(String::from("💥"));
        assert_eq!(failure.downcast_ref::<String>().map(String::as_str), Some("💥"));
        let back: String = failure.downcast().unwrap();
        assert_eq!(back, "💥");
    }

    #[test]
    fn failure_downcast_to_wrong_type_returns_self() {
        let failure = Failure::new(7u32);
        let failure = failure.downcast::<String>().unwrap_err();
        assert_eq!(failure.downcast_ref::<u32>(), Some(&7));
    }

    #[test]
    fn panic_payload_keeps_string_messages() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(Panic::from_payload(payload).message(), "boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("boom owned"));
        assert_eq!(Panic::from_payload(payload).message(), "boom owned");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(Panic::from_payload(payload).message(), "<non-string panic payload>");
    }
}
