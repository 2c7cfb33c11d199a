//! Runtime support for generated regression tests.
//!
//! Generated tests run the call under test through [`run`], so a panic turns
//! into an [`Outcome::Panicked`] value instead of aborting the test before the
//! assertions get to decide.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

/// A panic observed during a watched or replayed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedPanic {
    pub message: String,
}

impl CapturedPanic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Extract the message from a `catch_unwind` payload.
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "<non-string panic payload>".to_string()
        };
        Self { message }
    }
}

impl fmt::Display for CapturedPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panicked: {}", self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Returned(T),
    Panicked(CapturedPanic),
}

impl<T> Outcome<T> {
    pub fn is_panicked(&self) -> bool {
        matches!(self, Outcome::Panicked(_))
    }

    pub fn into_result(self) -> Result<T, CapturedPanic> {
        match self {
            Outcome::Returned(value) => Ok(value),
            Outcome::Panicked(panic) => Err(panic),
        }
    }

    /// The returned value; fails the test if the call panicked.
    pub fn expect_returned(self) -> T {
        match self {
            Outcome::Returned(value) => value,
            Outcome::Panicked(p) => panic!("call under test {p}"),
        }
    }

    /// The captured panic; fails the test if the call returned.
    pub fn expect_panicked(self) -> CapturedPanic {
        match self {
            Outcome::Panicked(p) => p,
            Outcome::Returned(_) => {
                panic!("call under test returned normally but the recording panicked")
            }
        }
    }
}

/// Run `f`, converting a panic into [`Outcome::Panicked`].
pub fn run<T>(f: impl FnOnce() -> T) -> Outcome<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Outcome::Returned(value),
        Err(payload) => Outcome::Panicked(CapturedPanic::from_payload(payload.as_ref())),
    }
}
