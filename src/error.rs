//! Crate-wide error type and the `err_at!` tagging macro.
//!
//! Concurrent retries (CAS failures, optimistic-read validation
//! failures) are never surfaced as an [Error] — callers loop locally.
//! Only the cases spec.md §7 calls out as surfacing errors construct
//! one of these variants: structural misuse of a torn-down iterator,
//! a failed debug-build invariant check, an out-of-range arena index,
//! or disjoint-set capacity exhaustion.

use std::{fmt, result};

/// Crate-wide result alias.
pub type Result<T> = result::Result<T, Error>;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Error {
    /// Iteration over a [crate::binrel::BinaryEquivalenceRelation]
    /// observed a cached trie invalidated by a concurrent insert.
    StructuralModification(String),
    /// A debug-only `check()` validator found a broken invariant.
    InvariantViolation(String),
    /// Indexed access into a [crate::sync::BlockList] fell outside
    /// `0..size()`.
    RangeCheck(String),
    /// A dense disjoint-set would exceed `u32::MAX` elements.
    CapacityExhausted(String),
    /// A [crate::btree] or [crate::relation] `Config` value was
    /// inconsistent (e.g. block size too small to hold one key).
    InvalidConfig(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::StructuralModification(s) => write!(f, "structural modification: {}", s),
            Error::InvariantViolation(s) => write!(f, "invariant violation: {}", s),
            Error::RangeCheck(s) => write!(f, "range check: {}", s),
            Error::CapacityExhausted(s) => write!(f, "capacity exhausted: {}", s),
            Error::InvalidConfig(s) => write!(f, "invalid config: {}", s),
        }
    }
}

impl std::error::Error for Error {}

/// Construct an [Error] tagged with its variant and a formatted
/// message, in the `err_at!(Tag, msg: "...", args)` idiom.
macro_rules! err_at {
    ($variant:ident, msg: $($arg:expr),+) => {
        Err(crate::error::Error::$variant(format!($($arg),+)))
    };
}

pub(crate) use err_at;
