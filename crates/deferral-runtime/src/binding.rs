//! Shared mutable bindings
//!
//! A [`Binding`] is the storage location an environment-capturing deferred
//! action closes over. Clones alias the same cell, so a read inside the
//! action observes whatever the body last wrote, not the value at
//! registration time. Named result slots are bindings too.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared mutable variable, scoped to one thread of execution
pub struct Binding<T> {
    cell: Rc<RefCell<T>>,
}

impl<T> Binding<T> {
    /// Create a binding holding `value`
    pub fn new(value: T) -> Self {
        Self {
            cell: Rc::new(RefCell::new(value)),
        }
    }

    /// Overwrite the value
    pub fn set(&self, value: T) {
        *self.cell.borrow_mut() = value;
    }

    /// Overwrite the value, returning the previous one
    pub fn replace(&self, value: T) -> T {
        self.cell.replace(value)
    }

    /// Read through a borrow
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.cell.borrow())
    }

    /// Mutate in place
    pub fn modify<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.cell.borrow_mut())
    }

    /// True if both bindings alias the same storage
    pub fn ptr_eq(&self, other: &Binding<T>) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T: Clone> Binding<T> {
    /// Read the current value
    pub fn get(&self) -> T {
        self.cell.borrow().clone()
    }

    /// Apply `f` to the current value, store the result and return it
    pub fn update(&self, f: impl FnOnce(T) -> T) -> T {
        let next = f(self.get());
        self.set(next.clone());
        next
    }
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T: Default> Default for Binding<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Binding").field(&*self.cell.borrow()).finish()
    }
}
