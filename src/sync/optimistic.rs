//! Optimistic read/write lock: version-stamped reader leases,
//! validated after the read, with upgrade-to-write on success.
//!
//! This is the synchronization primitive behind [crate::btree] node
//! access and [crate::sparse]'s root/first-leaf descriptors. It
//! generalizes the teacher crate's bit-packed `AtomicU64`
//! latch-and-spin (`spinlock.rs`, `gate.rs`, `latch_lock.rs`) into an
//! explicit sequence-lock: an even version means "stable", an odd
//! version means "a writer is in the middle of an update". Per
//! spec.md §9's Design Note, the pointer-low-bit trick from the
//! original C++ is re-expressed here as a plain version counter
//! rather than stealing a bit from a pointer.
//!
//! Readers call [OptLock::start_read], read whatever fields they
//! need, then call [OptLock::validate] (or [Lease::end_read]); if
//! validation fails the read may have observed a half-written node
//! and must be discarded and retried. Writers call [OptLock::start_write]
//! (blocking) or [OptLock::try_start_write] (non-blocking), mutate
//! through the returned guard, then either [WriteGuard::commit] or
//! [WriteGuard::abort] (the latter when a speculative update turned
//! out to be unnecessary and nothing should appear to have changed).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease(u64);

impl Lease {
    /// True if this lease's version is still current, i.e. no writer
    /// has committed or is mid-update since the lease was taken.
    pub fn is_valid_against(&self, lock: &OptLock) -> bool {
        lock.version.load(Ordering::Acquire) == self.0
    }
}

/// Version-stamped optimistic reader/writer lock. Carries no payload
/// of its own — it guards whatever fields the owning node stores
/// alongside it.
pub struct OptLock {
    version: AtomicU64,
}

impl Default for OptLock {
    fn default() -> OptLock {
        OptLock::new()
    }
}

impl OptLock {
    pub fn new() -> OptLock {
        OptLock {
            version: AtomicU64::new(0),
        }
    }

    /// Take a reader lease. Spins while a writer is mid-update (odd
    /// version) rather than blocking — critical sections under this
    /// lock are expected to be short.
    pub fn start_read(&self) -> Lease {
        loop {
            let v = self.version.load(Ordering::Acquire);
            if v & 1 == 0 {
                return Lease(v);
            }
            std::hint::spin_loop();
        }
    }

    /// Validate a previously taken lease: true only if no writer
    /// acquired the lock between `start_read` and this call.
    pub fn validate(&self, lease: Lease) -> bool {
        self.version.load(Ordering::Acquire) == lease.0
    }

    pub fn end_read(&self, lease: Lease) -> bool {
        self.validate(lease)
    }

    /// True if a writer currently holds this lock.
    pub fn is_write_locked(&self) -> bool {
        self.version.load(Ordering::Acquire) & 1 != 0
    }

    /// Acquire the write lock if it is free right now; never blocks.
    pub fn try_start_write(&self) -> Option<WriteGuard<'_>> {
        let v = self.version.load(Ordering::Acquire);
        if v & 1 != 0 {
            return None;
        }
        self.version
            .compare_exchange(v, v + 1, Ordering::AcqRel, Ordering::Relaxed)
            .ok()
            .map(|_| WriteGuard {
                lock: self,
                base: v,
                done: false,
            })
    }

    /// Acquire the write lock, spinning until it is free.
    pub fn start_write(&self) -> WriteGuard<'_> {
        loop {
            if let Some(guard) = self.try_start_write() {
                return guard;
            }
            std::hint::spin_loop();
        }
    }

    /// Upgrade a reader lease straight to a write lock, atomically:
    /// succeeds only if the lease is still valid and no writer is
    /// active. Used when a descent that started as a read discovers
    /// it needs to mutate the node it is sitting on (e.g. the B-tree
    /// leaf it is about to insert into).
    pub fn try_upgrade_to_write(&self, lease: Lease) -> Option<WriteGuard<'_>> {
        self.version
            .compare_exchange(lease.0, lease.0 + 1, Ordering::AcqRel, Ordering::Relaxed)
            .ok()
            .map(|_| WriteGuard {
                lock: self,
                base: lease.0,
                done: false,
            })
    }
}

/// Held while a write is in progress. The node's fields may be
/// mutated freely through `&mut` references obtained independently
/// (this guard only owns the version bookkeeping) because acquiring
/// it is the only way to mutate: readers never write, and only one
/// writer can hold the lock at a time.
pub struct WriteGuard<'a> {
    lock: &'a OptLock,
    base: u64,
    done: bool,
}

impl<'a> WriteGuard<'a> {
    /// Publish the write: bump the version past the writer's odd
    /// value, making it visible (and even) to subsequent readers.
    pub fn commit(mut self) {
        self.lock.version.store(self.base + 2, Ordering::Release);
        self.done = true;
    }

    /// Release the lock without publishing a change: restores the
    /// exact pre-write version, so in-flight readers who took a lease
    /// before this write started still see a valid, unchanged state.
    /// Used when a speculatively-started write (e.g. the losing side
    /// of a child-creation race) turns out to do nothing.
    pub fn abort(mut self) {
        self.lock.version.store(self.base, Ordering::Release);
        self.done = true;
    }
}

impl<'a> Drop for WriteGuard<'a> {
    fn drop(&mut self) {
        if !self.done {
            // default to publishing, matching ordinary RAII-guarded
            // mutation: the common case is that the caller mutated
            // fields and simply let the guard fall out of scope.
            self.lock.version.store(self.base + 2, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod optimistic_test {
    use super::*;

    #[test]
    fn test_reader_sees_committed_write() {
        let lock = OptLock::new();
        let lease = lock.start_read();
        assert!(lock.validate(lease));

        lock.start_write().commit();
        assert!(!lock.validate(lease));

        let lease2 = lock.start_read();
        assert!(lock.validate(lease2));
    }

    #[test]
    fn test_abort_restores_version() {
        let lock = OptLock::new();
        let lease = lock.start_read();
        lock.start_write().abort();
        assert!(lock.validate(lease));
    }

    #[test]
    fn test_upgrade_fails_after_concurrent_write() {
        let lock = OptLock::new();
        let lease = lock.start_read();
        lock.start_write().commit();
        assert!(lock.try_upgrade_to_write(lease).is_none());
    }

    #[test]
    fn test_upgrade_succeeds_when_uncontended() {
        let lock = OptLock::new();
        let lease = lock.start_read();
        let guard = lock.try_upgrade_to_write(lease).expect("uncontended upgrade");
        guard.commit();
        assert!(lock.is_write_locked() == false);
    }
}
