//! Call API
//!
//! [`Runtime`] drives the whole frame protocol for a body closure:
//! create the frame, run the body, record its return value or failure,
//! unwind, finalize.
//!
//! # Examples
//!
//! ```
//! use deferral_runtime::Runtime;
//!
//! let runtime = Runtime::new();
//! let result = runtime.call_named("count", 0i64, |frame, r| {
//!     let r1 = r.clone();
//!     frame.defer("first", move |_| {
//!         r1.update(|n| n + 1);
//!         Ok(())
//!     })?;
//!     let r2 = r.clone();
//!     frame.defer("second", move |_| {
//!         r2.update(|n| n + 1);
//!         Ok(())
//!     })?;
//!     Ok(r.get())
//! });
//! assert_eq!(result, Ok(2));
//! ```

use crate::binding::Binding;
use crate::error::{Failure, FailureOrigin};
use crate::frame::InvocationFrame;
use crate::trace::{LogTrace, NullTrace, UnwindObserver};
use deferral_config::Config;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Unwind behaviour knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnwindOptions {
    /// Convert panics in bodies and actions into failures
    pub catch_panics: bool,
    /// Maximum pending actions per frame
    pub max_pending: Option<usize>,
}

impl Default for UnwindOptions {
    fn default() -> Self {
        Self {
            catch_panics: true,
            max_pending: None,
        }
    }
}

impl UnwindOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            catch_panics: config.catch_panics(),
            max_pending: config.max_pending(),
        }
    }
}

/// Entry point for running invocations
///
/// Holds no per-call state, so one runtime can be shared across threads;
/// every call builds its own frame on the calling thread.
#[derive(Clone)]
pub struct Runtime {
    options: UnwindOptions,
    observer: Arc<dyn UnwindObserver>,
}

impl Runtime {
    /// Runtime with default options and no tracing
    pub fn new() -> Self {
        Self::with_options(UnwindOptions::default())
    }

    pub fn with_options(options: UnwindOptions) -> Self {
        Self {
            options,
            observer: Arc::new(NullTrace),
        }
    }

    /// Runtime configured from a loaded [`Config`]
    ///
    /// Unwind events go to the `log` facade when `log.trace` is enabled.
    pub fn from_config(config: &Config) -> Self {
        let observer: Arc<dyn UnwindObserver> = if config.trace_enabled() {
            Arc::new(LogTrace)
        } else {
            Arc::new(NullTrace)
        };
        Self {
            options: UnwindOptions::from_config(config),
            observer,
        }
    }

    /// Replace the observer
    pub fn with_observer(mut self, observer: Arc<dyn UnwindObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn options(&self) -> &UnwindOptions {
        &self.options
    }

    pub fn observer(&self) -> Arc<dyn UnwindObserver> {
        Arc::clone(&self.observer)
    }

    /// Frame with an unnamed result, for hosts driving the protocol by hand
    pub fn frame_unnamed<'a, T>(&self, name: impl Into<String>) -> InvocationFrame<'a, T> {
        InvocationFrame::unnamed(name, self.options, self.observer())
    }

    /// Frame with a named result, for hosts driving the protocol by hand
    pub fn frame_named<'a, T>(&self, name: impl Into<String>, initial: T) -> InvocationFrame<'a, T> {
        InvocationFrame::named(name, initial, self.options, self.observer())
    }

    /// Invoke `body` with an unnamed result
    ///
    /// The value the body returns is snapshotted before any deferred action
    /// runs; actions cannot change what the caller receives.
    pub fn call<'a, T, F>(&self, name: &str, body: F) -> Result<T, Failure>
    where
        T: Clone,
        F: FnOnce(&mut InvocationFrame<'a, T>) -> Result<T, Failure>,
    {
        let mut frame = self.frame_unnamed(name);
        let outcome = self.run_body(|| body(&mut frame));
        conclude(frame, outcome)
    }

    /// Invoke `body` with a named result slot initialised to `initial`
    ///
    /// The body receives the slot; its `Ok` value is stored into it before
    /// unwind, and the caller receives whatever the slot holds afterwards.
    pub fn call_named<'a, T, F>(&self, name: &str, initial: T, body: F) -> Result<T, Failure>
    where
        T: Clone,
        F: FnOnce(&mut InvocationFrame<'a, T>, &Binding<T>) -> Result<T, Failure>,
    {
        let slot = Binding::new(initial);
        let mut frame =
            InvocationFrame::with_named_slot(name, slot.clone(), self.options, self.observer());
        let outcome = self.run_body(|| body(&mut frame, &slot));
        conclude(frame, outcome)
    }

    fn run_body<T>(&self, body: impl FnOnce() -> Result<T, Failure>) -> Result<T, Failure> {
        if !self.options.catch_panics {
            return body();
        }
        panic::catch_unwind(AssertUnwindSafe(body))
            .unwrap_or_else(|payload| Err(Failure::from_panic(FailureOrigin::Body, payload)))
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

fn conclude<T: Clone>(
    mut frame: InvocationFrame<'_, T>,
    outcome: Result<T, Failure>,
) -> Result<T, Failure> {
    match outcome {
        Ok(value) => frame.begin_return(value)?,
        Err(failure) => frame.fail(failure)?,
    }
    frame.unwind()?;
    frame.finalize()
}
