//! Blocking multi-reader/exclusive-writer lock: spec.md §4.1's "Read/write
//! lock" flavor, distinct from the optimistic version used by the
//! B-tree and sparse array. Writer starvation avoidance is not a
//! contract the spec requires, so this is a direct wrapper over
//! [std::sync::RwLock] rather than a hand-rolled fair lock — the
//! teacher crate reaches for `std::sync::RwLock` itself wherever it
//! needs this same shape (e.g. `wral/journals.rs`'s `self.journals.write()`).

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub struct RwExclusive<T>(RwLock<T>);

impl<T> RwExclusive<T> {
    pub fn new(value: T) -> RwExclusive<T> {
        RwExclusive(RwLock::new(value))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read().expect("RwExclusive poisoned")
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write().expect("RwExclusive poisoned")
    }
}
