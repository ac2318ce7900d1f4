//! Synchronization kit: the handful of lock flavors every other
//! module in this crate is built from. See spec.md §4.1.

mod blocklist;
mod optimistic;
mod rwlock;
mod spin;

pub use blocklist::{BlockList, BlockListIter};
pub use optimistic::{Lease, OptLock, WriteGuard};
pub use rwlock::RwExclusive;
pub use spin::{SpinGuard, SpinLock};
