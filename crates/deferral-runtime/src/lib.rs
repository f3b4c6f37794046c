//! Deferral Runtime - deferred-call stack
//!
//! This library provides scoped deferred actions for invocations:
//! - Per-invocation frames that run registered actions in reverse order
//! - Value capture (arguments snapshotted at registration) and environment
//!   capture (bindings resolved at execution)
//! - Named result slots that deferred actions can rewrite
//! - Failure propagation where the last failure raised during unwind wins
//!
//! Most callers only need [`Runtime::call`] and [`Runtime::call_named`].

/// Deferral runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod action;
pub mod binding;
pub mod error;
pub mod frame;
pub mod runtime;
pub mod scenarios;
pub mod scope;
pub mod shared;
pub mod trace;
pub mod value;

pub use action::{CaptureMode, DeferredAction};
pub use binding::Binding;
pub use error::{ActionResult, Failure, FailureKind, FailureOrigin, FrameError};
pub use frame::{FrameStatus, InvocationFrame, ResultSlot, UnwindSummary};
pub use runtime::{Runtime, UnwindOptions};
pub use scenarios::{Scenario, ScenarioReport, UnknownScenario};
pub use scope::UnwindScope;
pub use shared::SharedTable;
pub use trace::{LogTrace, MemoryTrace, NullTrace, TraceEntry, UnwindEvent, UnwindObserver};
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoke() {
        assert_eq!(VERSION, "0.1.0");
    }
}
