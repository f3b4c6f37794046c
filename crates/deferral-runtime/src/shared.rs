//! Shared lookup table guarded by a mutex
//!
//! An explicit context object instead of a process-wide map and lock. Every
//! operation runs in its own invocation frame: it acquires the lock and
//! immediately registers the matching release, so the guard is dropped
//! during unwind whether the body returns or fails.

use crate::error::Failure;
use crate::runtime::Runtime;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Key/value table safe to share between threads
#[derive(Debug, Default)]
pub struct SharedTable {
    entries: Mutex<HashMap<String, Value>>,
}

impl SharedTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn acquire(&self) -> Result<MutexGuard<'_, HashMap<String, Value>>, Failure> {
        self.entries
            .lock()
            .map_err(|_| Failure::raise("shared table lock poisoned"))
    }

    /// Read `key`
    pub fn lookup(&self, runtime: &Runtime, key: &str) -> Result<Option<Value>, Failure> {
        runtime.call("lookup", |frame| {
            let guard = self.acquire()?;
            let value = guard.get(key).cloned();
            frame.defer("unlock", move |_| {
                drop(guard);
                Ok(())
            })?;
            Ok(value)
        })
    }

    /// Store `value` under `key`, returning the previous value
    pub fn insert(
        &self,
        runtime: &Runtime,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, Failure> {
        let key = key.into();
        let value = value.into();
        runtime.call("insert", |frame| {
            let mut guard = self.acquire()?;
            let previous = guard.insert(key, value);
            frame.defer("unlock", move |_| {
                drop(guard);
                Ok(())
            })?;
            Ok(previous)
        })
    }

    /// Remove `key`, returning its value
    pub fn remove(&self, runtime: &Runtime, key: &str) -> Result<Option<Value>, Failure> {
        runtime.call("remove", |frame| {
            let mut guard = self.acquire()?;
            let removed = guard.remove(key);
            frame.defer("unlock", move |_| {
                drop(guard);
                Ok(())
            })?;
            Ok(removed)
        })
    }

    /// Number of entries; 0 if the lock is poisoned
    pub fn len(&self) -> usize {
        self.acquire().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
