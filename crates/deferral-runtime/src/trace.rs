//! Unwind tracing
//!
//! Structured record of frame lifecycle events (registration, return,
//! action execution, failure masking) for diagnostics and tests.

use crate::action::CaptureMode;
use crate::value::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Frame lifecycle event
#[derive(Debug, Clone, PartialEq)]
pub enum UnwindEvent {
    /// A frame was created
    FrameEntered { frame: String, named: bool },
    /// A deferred action was registered
    ActionRegistered {
        frame: String,
        label: String,
        position: usize,
        capture: CaptureMode,
        args: Vec<Value>,
    },
    /// The body reached its return
    ReturnBegun { frame: String, named: bool },
    /// The body failed
    BodyFailed { frame: String, message: String },
    /// A deferred action is about to run
    ActionStarted {
        frame: String,
        label: String,
        position: usize,
    },
    /// A deferred action failed
    ActionFailed {
        frame: String,
        label: String,
        position: usize,
        message: String,
    },
    /// A newer failure replaced the one in flight
    FailureMasked {
        frame: String,
        masked: String,
        by: String,
    },
    /// Unwind finished
    FrameDone { frame: String, executed: usize },
    /// A frame was dropped with actions still pending
    FrameAbandoned { frame: String, pending: usize },
    /// The result was handed to the caller
    FrameFinalized { frame: String, ok: bool },
}

impl UnwindEvent {
    /// True for events that describe a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            UnwindEvent::BodyFailed { .. }
                | UnwindEvent::ActionFailed { .. }
                | UnwindEvent::FailureMasked { .. }
                | UnwindEvent::FrameAbandoned { .. }
        )
    }
}

impl fmt::Display for UnwindEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnwindEvent::FrameEntered { frame, named } => {
                if *named {
                    write!(f, "{}: enter (named result)", frame)
                } else {
                    write!(f, "{}: enter", frame)
                }
            }
            UnwindEvent::ActionRegistered {
                frame,
                label,
                position,
                capture,
                args,
            } => {
                write!(f, "{}: defer #{} {} [{}", frame, position, label, capture)?;
                for (i, arg) in args.iter().enumerate() {
                    write!(f, "{}{}", if i == 0 { ": " } else { ", " }, arg)?;
                }
                write!(f, "]")
            }
            UnwindEvent::ReturnBegun { frame, named } => {
                let slot = if *named { "named slot" } else { "temporary" };
                write!(f, "{}: return into {}", frame, slot)
            }
            UnwindEvent::BodyFailed { frame, message } => {
                write!(f, "{}: body failed: {}", frame, message)
            }
            UnwindEvent::ActionStarted {
                frame,
                label,
                position,
            } => write!(f, "{}: run #{} {}", frame, position, label),
            UnwindEvent::ActionFailed {
                frame,
                label,
                position,
                message,
            } => write!(f, "{}: #{} {} failed: {}", frame, position, label, message),
            UnwindEvent::FailureMasked { frame, masked, by } => {
                write!(f, "{}: '{}' masked by '{}'", frame, masked, by)
            }
            UnwindEvent::FrameDone { frame, executed } => {
                write!(f, "{}: unwound {} action(s)", frame, executed)
            }
            UnwindEvent::FrameAbandoned { frame, pending } => {
                write!(f, "{}: dropped with {} pending action(s)", frame, pending)
            }
            UnwindEvent::FrameFinalized { frame, ok } => {
                let outcome = if *ok { "value" } else { "failure" };
                write!(f, "{}: finalized with {}", frame, outcome)
            }
        }
    }
}

static SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Trace entry with a process-wide sequence number
#[derive(Debug, Clone)]
pub struct TraceEntry {
    /// Monotonic across all observers in the process
    pub sequence: u64,
    pub event: UnwindEvent,
}

impl TraceEntry {
    pub fn new(event: UnwindEvent) -> Self {
        Self {
            sequence: SEQUENCE.fetch_add(1, Ordering::Relaxed),
            event,
        }
    }

    /// Format as log line
    pub fn to_log_line(&self) -> String {
        format!("[{:06}] {}", self.sequence, self.event)
    }
}

/// Sink for unwind events
pub trait UnwindObserver: Send + Sync {
    /// Record an event
    fn log(&self, event: UnwindEvent);

    /// Get all recorded entries (for testing)
    fn entries(&self) -> Vec<TraceEntry>;

    /// Clear all recorded entries (for testing)
    fn clear(&self);
}

/// In-memory observer
#[derive(Debug, Clone, Default)]
pub struct MemoryTrace {
    entries: Arc<Mutex<Vec<TraceEntry>>>,
}

impl MemoryTrace {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TraceEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Recorded events without sequence numbers
    pub fn events(&self) -> Vec<UnwindEvent> {
        self.lock().iter().map(|e| e.event.clone()).collect()
    }

    /// Recorded events rendered one per line
    pub fn render(&self) -> String {
        self.lock()
            .iter()
            .map(|e| e.event.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl UnwindObserver for MemoryTrace {
    fn log(&self, event: UnwindEvent) {
        self.lock().push(TraceEntry::new(event));
    }

    fn entries(&self) -> Vec<TraceEntry> {
        self.lock().clone()
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

/// Observer that forwards events to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTrace;

impl UnwindObserver for LogTrace {
    fn log(&self, event: UnwindEvent) {
        let entry = TraceEntry::new(event);
        if entry.event.is_failure() {
            log::warn!(target: "deferral::trace", "{}", entry.to_log_line());
        } else {
            log::debug!(target: "deferral::trace", "{}", entry.to_log_line());
        }
    }

    fn entries(&self) -> Vec<TraceEntry> {
        Vec::new()
    }

    fn clear(&self) {}
}

/// Observer that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTrace;

impl UnwindObserver for NullTrace {
    fn log(&self, _event: UnwindEvent) {}

    fn entries(&self) -> Vec<TraceEntry> {
        Vec::new()
    }

    fn clear(&self) {}
}
