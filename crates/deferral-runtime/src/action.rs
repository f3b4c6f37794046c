//! Deferred actions and their capture modes

use crate::error::ActionResult;
use crate::scope::UnwindScope;
use crate::value::Value;
use serde::Serialize;
use std::fmt;

/// How a deferred action obtained its inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Arguments snapshotted at registration
    Value,
    /// Free variables resolved through bindings at execution time
    Environment,
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureMode::Value => write!(f, "value"),
            CaptureMode::Environment => write!(f, "environment"),
        }
    }
}

/// Body of a value-capturing action
pub type ValueFn<'a, T> = Box<dyn FnOnce(&[Value], &mut UnwindScope<'_, T>) -> ActionResult + 'a>;

/// Body of an environment-capturing action
pub type EnvFn<'a, T> = Box<dyn FnOnce(&mut UnwindScope<'_, T>) -> ActionResult + 'a>;

/// A unit of work registered on an invocation frame
///
/// `ValueCaptured` owns a snapshot of its arguments taken at registration.
/// `EnvCaptured` owns only the bindings its closure holds and reads them when
/// it runs.
pub enum DeferredAction<'a, T> {
    ValueCaptured {
        label: String,
        args: Vec<Value>,
        run: ValueFn<'a, T>,
    },
    EnvCaptured {
        label: String,
        run: EnvFn<'a, T>,
    },
}

impl<'a, T> DeferredAction<'a, T> {
    /// Build a value-capturing action; `args` are the snapshot
    pub fn with_args<F>(label: impl Into<String>, args: Vec<Value>, run: F) -> Self
    where
        F: FnOnce(&[Value], &mut UnwindScope<'_, T>) -> ActionResult + 'a,
    {
        DeferredAction::ValueCaptured {
            label: label.into(),
            args,
            run: Box::new(run),
        }
    }

    /// Build an environment-capturing action
    pub fn closure<F>(label: impl Into<String>, run: F) -> Self
    where
        F: FnOnce(&mut UnwindScope<'_, T>) -> ActionResult + 'a,
    {
        DeferredAction::EnvCaptured {
            label: label.into(),
            run: Box::new(run),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            DeferredAction::ValueCaptured { label, .. } => label,
            DeferredAction::EnvCaptured { label, .. } => label,
        }
    }

    pub fn capture_mode(&self) -> CaptureMode {
        match self {
            DeferredAction::ValueCaptured { .. } => CaptureMode::Value,
            DeferredAction::EnvCaptured { .. } => CaptureMode::Environment,
        }
    }

    /// Snapshotted arguments; empty for environment capture
    pub fn args(&self) -> &[Value] {
        match self {
            DeferredAction::ValueCaptured { args, .. } => args,
            DeferredAction::EnvCaptured { .. } => &[],
        }
    }

    /// Consume and execute the action
    pub(crate) fn run(self, scope: &mut UnwindScope<'_, T>) -> ActionResult {
        match self {
            DeferredAction::ValueCaptured { args, run, .. } => run(&args, scope),
            DeferredAction::EnvCaptured { run, .. } => run(scope),
        }
    }
}

impl<T> fmt::Debug for DeferredAction<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredAction")
            .field("label", &self.label())
            .field("capture", &self.capture_mode())
            .field("args", &self.args())
            .finish()
    }
}
