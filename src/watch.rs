//! The interception shim placed around watched calls.
//!
//! ```ignore
//! let target = describe!(double(x = 1_i64));
//! let y = watcher.call(&target, Invocation::new().arg(&x), || double(x));
//! ```
//!
//! When an argument is moved into the call, bind first with
//! [`Watcher::enter`] and run the call afterwards; binding snapshots the
//! arguments so the borrow ends before the move.

use std::any::{Any, TypeId};
use std::panic::{self, AssertUnwindSafe};

use crate::config::WatchConfig;
use crate::error::{CaptureError, SessionError};
use crate::replay::CapturedPanic;
use crate::snapshot::classify::Watched;
use crate::snapshot::model::InvocationRecord;
use crate::snapshot::recorder::{BoundArguments, CallResult, FunctionDescriptor, Invocation, Recorder};
use crate::snapshot::serializer::{is_tuple_type, SerializerRegistry};
use crate::snapshot::session::{Session, SharedSession};

/// Results that expand positionally into `ret_0..ret_n`.
pub trait TupleResults: Any {
    fn elements(&self) -> Vec<&dyn Watched>;
}

impl TupleResults for () {
    fn elements(&self) -> Vec<&dyn Watched> {
        Vec::new()
    }
}

macro_rules! tuple_results {
    ($($t:ident $idx:tt),+) => {
        impl<$($t: Any),+> TupleResults for ($($t,)+) {
            fn elements(&self) -> Vec<&dyn Watched> {
                vec![$(&self.$idx as &dyn Watched),+]
            }
        }
    };
}

tuple_results!(A 0);
tuple_results!(A 0, B 1);
tuple_results!(A 0, B 1, C 2);
tuple_results!(A 0, B 1, C 2, D 3);
tuple_results!(A 0, B 1, C 2, D 3, E 4);
tuple_results!(A 0, B 1, C 2, D 3, E 4, F 5);

pub struct Watcher {
    session: SharedSession,
    recorder: Recorder,
}

impl Watcher {
    pub fn new(session: SharedSession, recorder: Recorder) -> Self {
        Self { session, recorder }
    }

    /// Session in `config.initial_state` plus a recorder using `serializers`.
    pub fn from_config(
        config: &WatchConfig,
        serializers: SerializerRegistry,
    ) -> Result<Self, SessionError> {
        let session = Session::from_config(config)?.shared();
        let recorder = Recorder::new(serializers).with_call_stack(config.capture_call_stack);
        Ok(Self::new(session, recorder))
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Bind arguments for one call. Returns a passthrough handle when the
    /// session is not watching or the arguments cannot be captured.
    pub fn enter<'w>(
        &'w self,
        target: &'w FunctionDescriptor,
        invocation: Invocation<'_>,
    ) -> PendingCall<'w> {
        let bound = {
            let mut session = self.session.lock();
            if !session.is_watching() {
                None
            } else {
                if session.should_dump() {
                    // Keep the buffer on failure; the next call retries.
                    if let Err(err) = session.dump() {
                        tracing::error!(error = %err, "snapshot rotation failed");
                    }
                }
                match self.recorder.bind(target, &invocation) {
                    Ok(bound) => Some(bound),
                    Err(err) => {
                        tracing::warn!(
                            function = %target.name,
                            error = %err,
                            "skipping capture"
                        );
                        None
                    }
                }
            }
        };
        PendingCall {
            watcher: self,
            target,
            bound,
        }
    }

    /// Run a watched call whose result is recorded as `ret_0`.
    ///
    /// A unit result records no results at all. Tuple results are not
    /// recorded here; use [`call_tuple`](Self::call_tuple).
    pub fn call<R: Any>(
        &self,
        target: &FunctionDescriptor,
        invocation: Invocation<'_>,
        f: impl FnOnce() -> R,
    ) -> R {
        self.enter(target, invocation).run(f)
    }

    /// Run a watched call whose tuple result expands into positional results.
    pub fn call_tuple<R: TupleResults>(
        &self,
        target: &FunctionDescriptor,
        invocation: Invocation<'_>,
        f: impl FnOnce() -> R,
    ) -> R {
        self.enter(target, invocation).run_tuple(f)
    }

    fn finish(
        &self,
        target: &FunctionDescriptor,
        bound: BoundArguments,
        result: CallResult<'_>,
        note: &str,
    ) {
        let record = match self.recorder.capture(target, bound, result, note) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(function = %target.name, error = %err, "skipping capture");
                return;
            }
        };
        self.store(record);
    }

    fn store(&self, record: InvocationRecord) {
        let function = record.function_name.clone();
        match self.session.lock().record(record) {
            Ok(run_id) => tracing::debug!(function = %function, run_id, "recorded"),
            // The session left WATCHING while the call ran.
            Err(err) => tracing::debug!(function = %function, error = %err, "record dropped"),
        }
    }
}

/// A call whose arguments are already bound.
pub struct PendingCall<'w> {
    watcher: &'w Watcher,
    target: &'w FunctionDescriptor,
    bound: Option<BoundArguments>,
}

impl PendingCall<'_> {
    pub fn is_recording(&self) -> bool {
        self.bound.is_some()
    }

    pub fn run<R: Any>(mut self, f: impl FnOnce() -> R) -> R {
        let type_name = std::any::type_name::<R>();
        if is_tuple_type(type_name) && self.bound.take().is_some() {
            let err = CaptureError::TupleResult {
                function: self.target.name.clone(),
                type_name: type_name.to_string(),
            };
            tracing::warn!(function = %self.target.name, error = %err, "skipping capture");
        }
        self.execute(f, |value| {
            if TypeId::of::<R>() == TypeId::of::<()>() {
                CallResult::Tuple(Vec::new())
            } else {
                CallResult::Single(value)
            }
        })
    }

    pub fn run_tuple<R: TupleResults>(self, f: impl FnOnce() -> R) -> R {
        self.execute(f, |value| CallResult::Tuple(value.elements()))
    }

    fn execute<R: Any>(
        self,
        f: impl FnOnce() -> R,
        as_result: impl for<'a> FnOnce(&'a R) -> CallResult<'a>,
    ) -> R {
        let Some(bound) = self.bound else {
            return f();
        };

        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => {
                self.watcher
                    .finish(self.target, bound, as_result(&value), "");
                value
            }
            Err(payload) => {
                let captured = CapturedPanic::from_payload(payload.as_ref());
                let note = captured.to_string();
                self.watcher
                    .finish(self.target, bound, CallResult::Panicked(&captured), &note);
                panic::resume_unwind(payload)
            }
        }
    }
}

/// Build a [`FunctionDescriptor`] for the named function.
///
/// `file!()` and `module_path!()` are taken where the macro is invoked, so
/// invoke it in the module that defines the function.
///
/// ```ignore
/// describe!(scale(&table, factor = 1.0_f64));
/// describe!(Counter => absorb(&mut other));
/// ```
#[macro_export]
macro_rules! describe {
    (@params $d:expr;) => { $d };
    (@params $d:expr; &mut $p:ident $(, $($rest:tt)*)?) => {
        $crate::describe!(@params $d.param_mut(stringify!($p)); $($($rest)*)?)
    };
    (@params $d:expr; & $p:ident $(, $($rest:tt)*)?) => {
        $crate::describe!(@params $d.param_ref(stringify!($p)); $($($rest)*)?)
    };
    (@params $d:expr; $p:ident = $default:expr $(, $($rest:tt)*)?) => {
        $crate::describe!(@params $d.param_default(stringify!($p), $default); $($($rest)*)?)
    };
    (@params $d:expr; $p:ident $(, $($rest:tt)*)?) => {
        $crate::describe!(@params $d.param(stringify!($p)); $($($rest)*)?)
    };
    ($name:ident ( $($params:tt)* )) => {
        $crate::describe!(@params
            $crate::snapshot::recorder::FunctionDescriptor::new(
                stringify!($name),
                file!(),
                module_path!(),
            );
            $($params)*)
    };
    ($owner:ty => $name:ident ( $($params:tt)* )) => {
        $crate::describe!(@params
            $crate::snapshot::recorder::FunctionDescriptor::new(
                stringify!($name),
                file!(),
                module_path!(),
            )
            .method_of::<$owner>();
            $($params)*)
    };
}
