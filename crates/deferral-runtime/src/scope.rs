//! What a deferred action can see while it runs

use crate::binding::Binding;
use crate::error::{Failure, FrameError};

/// View of the unwinding frame handed to each deferred action
///
/// The anonymous temporary of an unnamed result is deliberately absent:
/// an action can only observe it if the value was passed in as a captured
/// argument.
pub struct UnwindScope<'s, T> {
    frame: &'s str,
    label: &'s str,
    position: usize,
    in_flight: Option<&'s Failure>,
    named: Option<&'s Binding<T>>,
}

impl<'s, T> UnwindScope<'s, T> {
    pub(crate) fn new(
        frame: &'s str,
        label: &'s str,
        position: usize,
        in_flight: Option<&'s Failure>,
        named: Option<&'s Binding<T>>,
    ) -> Self {
        Self {
            frame,
            label,
            position,
            in_flight,
            named,
        }
    }

    /// Name of the frame being unwound
    pub fn frame_name(&self) -> &str {
        self.frame
    }

    /// Label of the running action
    pub fn label(&self) -> &str {
        self.label
    }

    /// Registration position of the running action, starting at 1
    pub fn position(&self) -> usize {
        self.position
    }

    /// The failure currently propagating, if any
    ///
    /// Observing it does not clear it.
    pub fn in_flight(&self) -> Option<&Failure> {
        self.in_flight
    }

    pub fn has_named_result(&self) -> bool {
        self.named.is_some()
    }

    /// Alias of the named result slot
    pub fn named_result(&self) -> Option<Binding<T>> {
        self.named.cloned()
    }

    /// Overwrite the named result
    pub fn set_result(&mut self, value: T) -> Result<(), FrameError> {
        self.slot()?.set(value);
        Ok(())
    }

    fn slot(&self) -> Result<&'s Binding<T>, FrameError> {
        self.named.ok_or_else(|| FrameError::NoNamedResult {
            frame: self.frame.to_string(),
        })
    }
}

impl<'s, T: Clone> UnwindScope<'s, T> {
    /// Current value of the named result; `None` for unnamed results
    pub fn result(&self) -> Option<T> {
        self.named.map(Binding::get)
    }

    /// Apply `f` to the named result and return the new value
    pub fn update_result(&mut self, f: impl FnOnce(T) -> T) -> Result<T, FrameError> {
        Ok(self.slot()?.update(f))
    }
}
