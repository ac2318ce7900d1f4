//! Concurrent in-memory relational storage core for bottom-up Datalog
//! evaluation: a family of data structures — sparse array and bitmap,
//! trie, B-tree, union-find, binary equivalence relation and a
//! relation container built from them — tuned for one workload,
//! storing the facts a Datalog engine derives while it runs.
//!
//! Every structure here favors concurrent readers over concurrent
//! writers: inserts into the same container from multiple threads are
//! safe, but the container is not meant to be mutated and iterated in
//! a tight loop from opposing threads without the caller coordinating
//! around `clear`. See each module's own documentation for its exact
//! contract.
//!
//! - [sync]: the lock primitives everything else is built from.
//! - [tuple]: the fixed-arity integer tuple every container stores.
//! - [sparse]: sparse array and sparse bitmap.
//! - [trie]: ordered tuple sets nested over [sparse].
//! - [btree]: the concurrent ordered index.
//! - [unionfind]: dense and sparse disjoint-set forests.
//! - [binrel]: binary equivalence relations built on [unionfind] and [trie].
//! - [relation]: the primary+secondary-index container tying it together.

pub mod error;
pub mod sync;
pub mod tuple;

pub mod sparse;
pub mod trie;

pub mod btree;
pub mod unionfind;

pub mod binrel;
pub mod relation;

pub use error::{Error, Result};
pub use tuple::Tuple;
