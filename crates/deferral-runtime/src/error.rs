//! Failures raised during an invocation and frame lifecycle errors

use crate::frame::FrameStatus;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use thiserror::Error;

/// Where a failure was raised
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum FailureOrigin {
    /// The invocation body, before or during `begin_return`
    Body,
    /// A deferred action while the frame was unwinding
    Action {
        /// Action label given at registration
        label: String,
        /// Registration position, starting at 1
        position: usize,
    },
    /// Misuse of the frame lifecycle
    Frame,
}

impl fmt::Display for FailureOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureOrigin::Body => write!(f, "invocation body"),
            FailureOrigin::Action { label, position } => {
                write!(f, "deferred action '{}' (#{})", label, position)
            }
            FailureOrigin::Frame => write!(f, "frame"),
        }
    }
}

/// How a failure was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Returned as an `Err`
    Raised,
    /// Caught from a panic
    Panicked,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Raised => write!(f, "failed"),
            FailureKind::Panicked => write!(f, "panicked"),
        }
    }
}

/// Failure propagated out of an invocation
///
/// Bodies and actions build one with [`Failure::raise`]; the unwind driver
/// re-tags failures returned by deferred actions with the action's origin.
/// When several failures occur, the last one raised wins.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{origin} {kind}: {message}")]
pub struct Failure {
    #[serde(flatten)]
    pub origin: FailureOrigin,
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    /// Raise a failure from invocation code
    pub fn raise(message: impl Into<String>) -> Self {
        Self {
            origin: FailureOrigin::Body,
            kind: FailureKind::Raised,
            message: message.into(),
        }
    }

    /// Build a failure from a caught panic payload
    pub fn from_panic(origin: FailureOrigin, payload: Box<dyn Any + Send>) -> Self {
        Self {
            origin,
            kind: FailureKind::Panicked,
            message: panic_message(payload.as_ref()),
        }
    }

    /// Replace the origin
    pub fn with_origin(mut self, origin: FailureOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// True if this failure was raised by a deferred action
    pub fn is_action_failure(&self) -> bool {
        matches!(self.origin, FailureOrigin::Action { .. })
    }
}

impl From<FrameError> for Failure {
    fn from(err: FrameError) -> Self {
        Self {
            origin: FailureOrigin::Frame,
            kind: FailureKind::Raised,
            message: err.to_string(),
        }
    }
}

/// Extract the message from a panic payload
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Result returned by deferred actions
pub type ActionResult = Result<(), Failure>;

/// Frame lifecycle misuse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// An operation that needs a specific status was called in another one
    #[error("cannot {operation} frame '{frame}' while it is {status}")]
    InvalidStatus {
        frame: String,
        operation: &'static str,
        status: FrameStatus,
    },

    /// The frame already holds the configured number of pending actions
    #[error("frame '{frame}' already holds {limit} pending deferred actions")]
    PendingLimit { frame: String, limit: usize },

    /// A named-result operation was used on a frame without a named result
    #[error("frame '{frame}' has no named result slot")]
    NoNamedResult { frame: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_body_failure() {
        let failure = Failure::raise("disk full");
        assert_eq!(failure.to_string(), "invocation body failed: disk full");
    }

    #[test]
    fn test_display_action_panic() {
        let failure = Failure::from_panic(
            FailureOrigin::Action {
                label: "unlock".to_string(),
                position: 2,
            },
            Box::new("poisoned"),
        );
        assert_eq!(
            failure.to_string(),
            "deferred action 'unlock' (#2) panicked: poisoned"
        );
        assert!(failure.is_action_failure());
    }

    #[test]
    fn test_string_panic_payload() {
        let failure = Failure::from_panic(FailureOrigin::Body, Box::new(String::from("boom")));
        assert_eq!(failure.message, "boom");
        assert_eq!(failure.kind, FailureKind::Panicked);
    }

    #[test]
    fn test_frame_error_converts_with_frame_origin() {
        let failure: Failure = FrameError::NoNamedResult {
            frame: "lookup".to_string(),
        }
        .into();
        assert_eq!(failure.origin, FailureOrigin::Frame);
        assert_eq!(
            failure.to_string(),
            "frame failed: frame 'lookup' has no named result slot"
        );
    }

    #[test]
    fn test_failure_json_shape() {
        let failure = Failure::raise("x").with_origin(FailureOrigin::Action {
            label: "close".to_string(),
            position: 1,
        });
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["origin"], "action");
        assert_eq!(json["label"], "close");
        assert_eq!(json["position"], 1);
        assert_eq!(json["kind"], "raised");
        assert_eq!(json["message"], "x");
    }
}
