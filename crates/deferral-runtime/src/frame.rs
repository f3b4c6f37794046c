//! Invocation frames and the deferred-call stack
//!
//! Each invocation owns one [`InvocationFrame`]. The frame accumulates
//! deferred actions while `Running`, records the return value (or body
//! failure) when it moves to `Returning`, runs every pending action in
//! reverse registration order during `unwind`, and hands the final result to
//! the caller in `finalize`.
//!
//! ## Lifecycle
//!
//! ```text
//!   Running ──begin_return / fail──▶ Returning ──unwind──▶ Done ──finalize──▶ caller
//!      │ register*                      │ fail (masks)
//! ```
//!
//! The named result slot is read only in `finalize`, after every action has
//! run, so actions that write it change what the caller receives. An unnamed
//! result is snapshotted at `begin_return` and never exposed to actions.

use crate::action::DeferredAction;
use crate::binding::Binding;
use crate::error::{ActionResult, Failure, FailureKind, FailureOrigin, FrameError};
use crate::runtime::UnwindOptions;
use crate::scope::UnwindScope;
use crate::trace::{UnwindEvent, UnwindObserver};
use crate::value::Value;
use serde::Serialize;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Frame status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStatus {
    /// Body executing; actions may be registered
    Running,
    /// Return value or failure recorded; waiting for unwind
    Returning,
    /// Every action has run
    Done,
}

impl fmt::Display for FrameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameStatus::Running => write!(f, "running"),
            FrameStatus::Returning => write!(f, "returning"),
            FrameStatus::Done => write!(f, "done"),
        }
    }
}

/// Where the return value lives until `finalize`
pub enum ResultSlot<T> {
    /// Shared with the body and every action
    Named(Binding<T>),
    /// Anonymous temporary filled by `begin_return`
    Unnamed(Option<T>),
}

/// Outcome of an unwind pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnwindSummary {
    /// Number of actions executed
    pub executed: usize,
    /// Number of actions that failed or panicked
    pub failures: usize,
}

struct Pending<'a, T> {
    position: usize,
    action: DeferredAction<'a, T>,
}

/// Runtime record for one in-progress call
pub struct InvocationFrame<'a, T> {
    name: String,
    status: FrameStatus,
    pending: Vec<Pending<'a, T>>,
    registered: usize,
    slot: ResultSlot<T>,
    failure: Option<Failure>,
    options: UnwindOptions,
    observer: Arc<dyn UnwindObserver>,
}

impl<'a, T> InvocationFrame<'a, T> {
    /// Frame whose result is an anonymous temporary
    pub fn unnamed(
        name: impl Into<String>,
        options: UnwindOptions,
        observer: Arc<dyn UnwindObserver>,
    ) -> Self {
        Self::enter(name.into(), ResultSlot::Unnamed(None), options, observer)
    }

    /// Frame with a named result slot initialised to `initial`
    pub fn named(
        name: impl Into<String>,
        initial: T,
        options: UnwindOptions,
        observer: Arc<dyn UnwindObserver>,
    ) -> Self {
        Self::with_named_slot(name, Binding::new(initial), options, observer)
    }

    /// Frame whose named result slot is an existing binding
    pub fn with_named_slot(
        name: impl Into<String>,
        slot: Binding<T>,
        options: UnwindOptions,
        observer: Arc<dyn UnwindObserver>,
    ) -> Self {
        Self::enter(name.into(), ResultSlot::Named(slot), options, observer)
    }

    fn enter(
        name: String,
        slot: ResultSlot<T>,
        options: UnwindOptions,
        observer: Arc<dyn UnwindObserver>,
    ) -> Self {
        let named = matches!(slot, ResultSlot::Named(_));
        log::trace!("enter frame '{}' (named result: {})", name, named);
        observer.log(UnwindEvent::FrameEntered {
            frame: name.clone(),
            named,
        });
        Self {
            name,
            status: FrameStatus::Running,
            pending: Vec::new(),
            registered: 0,
            slot,
            failure: None,
            options,
            observer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> FrameStatus {
        self.status
    }

    /// Number of actions not yet executed
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// The failure currently propagating, if any
    pub fn in_flight(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    /// Alias of the named result slot; `None` for unnamed frames
    pub fn named_result(&self) -> Option<Binding<T>> {
        match &self.slot {
            ResultSlot::Named(binding) => Some(binding.clone()),
            ResultSlot::Unnamed(_) => None,
        }
    }

    /// Register an environment-capturing action
    ///
    /// The closure resolves whatever bindings it holds when it runs.
    pub fn defer<F>(&mut self, label: impl Into<String>, run: F) -> Result<(), FrameError>
    where
        F: FnOnce(&mut UnwindScope<'_, T>) -> ActionResult + 'a,
    {
        self.register(DeferredAction::closure(label, run))
    }

    /// Register a value-capturing action
    ///
    /// `args` are evaluated and snapshotted now; later changes to their
    /// sources are not seen by the action.
    pub fn defer_with<I, F>(
        &mut self,
        label: impl Into<String>,
        args: I,
        run: F,
    ) -> Result<(), FrameError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
        F: FnOnce(&[Value], &mut UnwindScope<'_, T>) -> ActionResult + 'a,
    {
        let snapshot = args.into_iter().map(Into::into).collect();
        self.register(DeferredAction::with_args(label, snapshot, run))
    }

    /// Register a pre-built action
    pub fn register(&mut self, action: DeferredAction<'a, T>) -> Result<(), FrameError> {
        self.expect_status(&[FrameStatus::Running], "register an action on")?;

        if let Some(limit) = self.options.max_pending {
            if self.pending.len() >= limit {
                return Err(FrameError::PendingLimit {
                    frame: self.name.clone(),
                    limit,
                });
            }
        }

        self.registered += 1;
        let position = self.registered;
        log::trace!(
            "frame '{}': defer #{} '{}' ({} capture)",
            self.name,
            position,
            action.label(),
            action.capture_mode()
        );
        self.observer.log(UnwindEvent::ActionRegistered {
            frame: self.name.clone(),
            label: action.label().to_string(),
            position,
            capture: action.capture_mode(),
            args: action.args().to_vec(),
        });
        self.pending.push(Pending { position, action });
        Ok(())
    }

    /// Record the return value and stop accepting registrations
    ///
    /// Named frames store `value` into the shared slot; unnamed frames keep
    /// it in a temporary that actions cannot reach.
    pub fn begin_return(&mut self, value: T) -> Result<(), FrameError> {
        self.expect_status(&[FrameStatus::Running], "begin return on")?;
        match &mut self.slot {
            ResultSlot::Named(binding) => binding.set(value),
            ResultSlot::Unnamed(temp) => *temp = Some(value),
        }
        self.enter_returning();
        Ok(())
    }

    /// Bare return: keep whatever the named slot currently holds
    pub fn begin_return_current(&mut self) -> Result<(), FrameError> {
        if matches!(self.slot, ResultSlot::Unnamed(_)) {
            return Err(FrameError::NoNamedResult {
                frame: self.name.clone(),
            });
        }
        self.expect_status(&[FrameStatus::Running], "begin return on")?;
        self.enter_returning();
        Ok(())
    }

    fn enter_returning(&mut self) {
        self.status = FrameStatus::Returning;
        let named = matches!(self.slot, ResultSlot::Named(_));
        log::trace!("frame '{}': returning", self.name);
        self.observer.log(UnwindEvent::ReturnBegun {
            frame: self.name.clone(),
            named,
        });
    }

    /// Record a body failure
    ///
    /// Unwind still runs every pending action; the failure reaches the caller
    /// unless a deferred action raises a newer one.
    pub fn fail(&mut self, failure: Failure) -> Result<(), FrameError> {
        self.expect_status(&[FrameStatus::Running, FrameStatus::Returning], "fail")?;
        log::debug!("frame '{}': {}", self.name, failure);
        self.observer.log(UnwindEvent::BodyFailed {
            frame: self.name.clone(),
            message: failure.to_string(),
        });
        self.status = FrameStatus::Returning;
        self.record_failure(failure);
        Ok(())
    }

    /// Run every pending action, most recently registered first
    ///
    /// Never stops early: a failing or panicking action replaces the
    /// in-flight failure and the remaining actions still run.
    pub fn unwind(&mut self) -> Result<UnwindSummary, FrameError> {
        self.expect_status(&[FrameStatus::Returning], "unwind")?;

        let mut summary = UnwindSummary::default();
        while let Some(entry) = self.pending.pop() {
            summary.executed += 1;
            if let Err(failure) = self.execute(entry, self.options.catch_panics) {
                summary.failures += 1;
                self.record_failure(failure);
            }
        }

        self.status = FrameStatus::Done;
        log::debug!(
            "frame '{}': unwound {} action(s), {} failed",
            self.name,
            summary.executed,
            summary.failures
        );
        self.observer.log(UnwindEvent::FrameDone {
            frame: self.name.clone(),
            executed: summary.executed,
        });
        Ok(summary)
    }

    fn execute(&self, entry: Pending<'a, T>, catch_panics: bool) -> ActionResult {
        let Pending { position, action } = entry;
        let label = action.label().to_string();
        let origin = FailureOrigin::Action {
            label: label.clone(),
            position,
        };

        self.observer.log(UnwindEvent::ActionStarted {
            frame: self.name.clone(),
            label: label.clone(),
            position,
        });

        let named = match &self.slot {
            ResultSlot::Named(binding) => Some(binding),
            ResultSlot::Unnamed(_) => None,
        };
        let mut scope = UnwindScope::new(&self.name, &label, position, self.failure.as_ref(), named);

        let outcome = if catch_panics {
            panic::catch_unwind(AssertUnwindSafe(|| action.run(&mut scope)))
                .unwrap_or_else(|payload| Err(Failure::from_panic(origin.clone(), payload)))
        } else {
            action.run(&mut scope)
        };

        outcome.map_err(|failure| {
            let failure = failure.with_origin(origin);
            self.observer.log(UnwindEvent::ActionFailed {
                frame: self.name.clone(),
                label,
                position,
                message: failure.message.clone(),
            });
            failure
        })
    }

    fn record_failure(&mut self, failure: Failure) {
        if let Some(previous) = self.failure.take() {
            log::warn!(
                "frame '{}': '{}' masked by '{}'",
                self.name,
                previous,
                failure
            );
            self.observer.log(UnwindEvent::FailureMasked {
                frame: self.name.clone(),
                masked: previous.to_string(),
                by: failure.to_string(),
            });
        }
        self.failure = Some(failure);
    }

    fn expect_status(
        &self,
        allowed: &[FrameStatus],
        operation: &'static str,
    ) -> Result<(), FrameError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(FrameError::InvalidStatus {
                frame: self.name.clone(),
                operation,
                status: self.status,
            })
        }
    }
}

impl<'a, T: Clone> InvocationFrame<'a, T> {
    /// Hand the result to the caller
    ///
    /// Reads the named slot only now, after unwind, so deferred writes are
    /// visible. The last failure raised wins over any value.
    pub fn finalize(mut self) -> Result<T, Failure> {
        self.expect_status(&[FrameStatus::Done], "finalize")?;

        let result = match self.failure.take() {
            Some(failure) => Err(failure),
            None => match &mut self.slot {
                ResultSlot::Named(binding) => Ok(binding.get()),
                ResultSlot::Unnamed(temp) => temp.take().ok_or_else(|| Failure {
                    origin: FailureOrigin::Frame,
                    kind: FailureKind::Raised,
                    message: format!("frame '{}' finished without a return value", self.name),
                }),
            },
        };

        self.observer.log(UnwindEvent::FrameFinalized {
            frame: self.name.clone(),
            ok: result.is_ok(),
        });
        result
    }
}

impl<T> Drop for InvocationFrame<'_, T> {
    /// Run whatever is still pending so nothing acquired stays unreleased
    ///
    /// Reached when a panic escapes the body or the owner never unwound.
    /// Failures here have no caller to go to and are only logged.
    fn drop(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        log::warn!(
            "frame '{}' dropped while {} with {} pending action(s)",
            self.name,
            self.status,
            self.pending.len()
        );
        self.observer.log(UnwindEvent::FrameAbandoned {
            frame: self.name.clone(),
            pending: self.pending.len(),
        });

        while let Some(entry) = self.pending.pop() {
            if let Err(failure) = self.execute(entry, true) {
                log::warn!("frame '{}': discarded {}", self.name, failure);
            }
        }
        self.status = FrameStatus::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{MemoryTrace, NullTrace};
    use pretty_assertions::assert_eq;

    fn unnamed<'a, T>(name: &str) -> InvocationFrame<'a, T> {
        InvocationFrame::unnamed(name, UnwindOptions::default(), Arc::new(NullTrace))
    }

    #[test]
    fn test_new_frame_is_running_and_empty() {
        let frame: InvocationFrame<'_, ()> = unnamed("f");
        assert_eq!(frame.status(), FrameStatus::Running);
        assert_eq!(frame.pending(), 0);
        assert!(frame.named_result().is_none());
    }

    #[test]
    fn test_lifo_order() {
        let log = Binding::new(Vec::new());
        let mut frame = unnamed("f");
        for i in 1..=3 {
            let log = log.clone();
            frame
                .defer(format!("push {}", i), move |_| {
                    log.modify(|v| v.push(i));
                    Ok(())
                })
                .unwrap();
        }
        frame.begin_return(()).unwrap();
        let summary = frame.unwind().unwrap();
        frame.finalize().unwrap();

        assert_eq!(summary.executed, 3);
        assert_eq!(log.get(), vec![3, 2, 1]);
    }

    #[test]
    fn test_register_after_return_rejected() {
        let mut frame: InvocationFrame<'_, i64> = unnamed("f");
        frame.begin_return(0).unwrap();
        let err = frame.defer("late", |_| Ok(())).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot register an action on frame 'f' while it is returning"
        );
    }

    #[test]
    fn test_unwind_requires_returning() {
        let mut frame: InvocationFrame<'_, i64> = unnamed("f");
        assert!(matches!(
            frame.unwind(),
            Err(FrameError::InvalidStatus {
                status: FrameStatus::Running,
                ..
            })
        ));
    }

    #[test]
    fn test_finalize_before_unwind_is_frame_failure() {
        let mut frame: InvocationFrame<'_, i64> = unnamed("f");
        frame.begin_return(1).unwrap();
        let failure = frame.finalize().unwrap_err();
        assert_eq!(failure.origin, FailureOrigin::Frame);
    }

    #[test]
    fn test_bare_return_needs_named_slot() {
        let mut frame: InvocationFrame<'_, i64> = unnamed("f");
        assert!(matches!(
            frame.begin_return_current(),
            Err(FrameError::NoNamedResult { .. })
        ));

        let mut named = InvocationFrame::named(
            "g",
            7,
            UnwindOptions::default(),
            Arc::new(NullTrace),
        );
        named.begin_return_current().unwrap();
        named.unwind().unwrap();
        assert_eq!(named.finalize(), Ok(7));
    }

    #[test]
    fn test_pending_limit() {
        let options = UnwindOptions {
            max_pending: Some(1),
            ..Default::default()
        };
        let mut frame: InvocationFrame<'_, ()> =
            InvocationFrame::unnamed("f", options, Arc::new(NullTrace));
        frame.defer("one", |_| Ok(())).unwrap();
        assert_eq!(
            frame.defer("two", |_| Ok(())),
            Err(FrameError::PendingLimit {
                frame: "f".to_string(),
                limit: 1
            })
        );
    }

    #[test]
    fn test_drop_runs_pending_actions() {
        let released = Binding::new(Vec::new());
        let trace = MemoryTrace::new();
        {
            let mut frame: InvocationFrame<'_, ()> =
                InvocationFrame::unnamed("f", UnwindOptions::default(), Arc::new(trace.clone()));
            for name in ["a", "b"] {
                let released = released.clone();
                frame
                    .defer(name, move |_| {
                        released.modify(|v| v.push(name));
                        Ok(())
                    })
                    .unwrap();
            }
        }
        assert_eq!(released.get(), vec!["b", "a"]);
        assert!(trace
            .events()
            .contains(&UnwindEvent::FrameAbandoned {
                frame: "f".to_string(),
                pending: 2
            }));
    }

    #[test]
    fn test_action_failure_is_retagged() {
        let mut frame: InvocationFrame<'_, i64> = unnamed("f");
        frame
            .defer("close", |_| Err(Failure::raise("handle already closed")))
            .unwrap();
        frame.begin_return(1).unwrap();
        let summary = frame.unwind().unwrap();
        let failure = frame.finalize().unwrap_err();

        assert_eq!(summary.failures, 1);
        assert_eq!(
            failure.origin,
            FailureOrigin::Action {
                label: "close".to_string(),
                position: 1
            }
        );
        assert_eq!(
            failure.to_string(),
            "deferred action 'close' (#1) failed: handle already closed"
        );
    }
}
