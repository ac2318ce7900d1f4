//! Exclusive spin lock, for critical sections a handful of
//! instructions long.
//!
//! Grounded on the teacher crate's latch-and-spin primitives
//! (`spinlock.rs`, `gate.rs`): a single atomic word, compare-and-swap
//! to acquire, released by dropping the guard. Unlike those two,
//! [SpinLock] has no reader side — it is the primitive spec.md §4.1
//! calls out for the relation container's primary-index-check-plus-
//! master-append critical section.

use std::{
    cell::UnsafeCell,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, Ordering},
};

pub struct SpinLock<T> {
    locked: AtomicBool,
    value: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub fn new(value: T) -> SpinLock<T> {
        SpinLock {
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Block, spinning, until the lock is acquired.
    pub fn lock(&self) -> SpinGuard<'_, T> {
        loop {
            if let Some(guard) = self.try_lock() {
                break guard;
            }
            std::hint::spin_loop();
        }
    }

    /// Acquire the lock if uncontended, returning immediately otherwise.
    pub fn try_lock(&self) -> Option<SpinGuard<'_, T>> {
        match self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
        {
            Ok(_) => Some(SpinGuard { door: self }),
            Err(_) => None,
        }
    }
}

pub struct SpinGuard<'a, T> {
    door: &'a SpinLock<T>,
}

impl<'a, T> Deref for SpinGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.door.value.get() }
    }
}

impl<'a, T> DerefMut for SpinGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.door.value.get() }
    }
}

impl<'a, T> Drop for SpinGuard<'a, T> {
    fn drop(&mut self) {
        self.door.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod spin_test {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_mutual_exclusion() {
        let lock = Arc::new(SpinLock::new(0usize));
        let mut handles = vec![];
        for _ in 0..8 {
            let lock = Arc::clone(&lock);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    *lock.lock() += 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.lock(), 8000);
    }
}
