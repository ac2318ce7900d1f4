//! Concurrent in-memory B-tree over [Tuple]s. See spec.md §4.5.
//!
//! Grounded on `original_source/src/Btree.h`: biased split point
//! `min(3K/4, K-2)` so a node that just overflowed keeps more of its
//! keys on the side a sequential inserter is about to fill again, and
//! rebalance-by-borrowing from the left sibling before ever falling
//! back to a split. Node contents are guarded by a
//! [crate::sync::OptLock] the way [crate::sparse::array] guards its
//! root descriptor: readers (`contains`, `find`, iteration) take an
//! optimistic lease per node and retry on a concurrent write;
//! mutation is serialized crate-wide by `write_lock` rather than via
//! true lock-coupling splits, which is the same COW-over-OptLock
//! trade spec.md §9's Design Note already accepts for sparse arrays.

use std::cell::UnsafeCell;
use std::sync::{Arc, Mutex, RwLock, Weak};

use crate::error::err_at;
use crate::sync::OptLock;
use crate::tuple::Tuple;
use crate::Result;

/// Which strategy a node uses to locate a key among its sorted
/// contents. `Binary` is the default; `Linear` is grounded on the
/// original's low-order-fanout leaves, where a short scan beats the
/// branch overhead of a binary search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchStrategy {
    Linear,
    Binary,
}

/// Maximum keys per node (`K`). Minimum occupancy outside the root is
/// `K/2`; leaves and inner nodes share one order for simplicity.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub max_keys: usize,
    pub strategy: SearchStrategy,
    /// `true` (the default) gives set semantics: a second `insert` of
    /// an equal key is a no-op. `false` gives multiset semantics:
    /// equal keys accumulate, each insert appended after any existing
    /// run of keys equal to it.
    pub is_set: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            max_keys: 64,
            strategy: SearchStrategy::Binary,
            is_set: true,
        }
    }
}

impl Config {
    pub fn with_max_keys(mut self, max_keys: usize) -> Config {
        self.max_keys = max_keys;
        self
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Config {
        self.strategy = strategy;
        self
    }

    pub fn with_multiset(mut self) -> Config {
        self.is_set = false;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_keys < 3 {
            return err_at!(InvalidConfig, msg: "btree max_keys must be >= 3, got {}", self.max_keys);
        }
        Ok(())
    }

    /// `min(3K/4, K-2)`, biased toward keeping the fuller half on the
    /// side most likely to receive the next sequential insert.
    fn split_point(&self) -> usize {
        (3 * self.max_keys / 4).min(self.max_keys - 2).max(1)
    }

    fn min_keys(&self) -> usize {
        (self.max_keys / 2).max(1)
    }
}

/// Locate `t` among `keys` (sorted ascending) per `strategy`, in
/// `slice::binary_search`'s `Ok(index-of-match)` /
/// `Err(insertion-point)` convention.
fn locate<const N: usize>(keys: &[Tuple<N>], t: &Tuple<N>, strategy: SearchStrategy) -> std::result::Result<usize, usize> {
    match strategy {
        SearchStrategy::Binary => keys.binary_search(t),
        SearchStrategy::Linear => {
            for (i, k) in keys.iter().enumerate() {
                match k.cmp(t) {
                    std::cmp::Ordering::Equal => return Ok(i),
                    std::cmp::Ordering::Greater => return Err(i),
                    std::cmp::Ordering::Less => {}
                }
            }
            Err(keys.len())
        }
    }
}

/// The insertion point for a fresh `t` among `keys`, honoring
/// `is_set`: a set returns `None` if `t` is already present (no-op
/// insert), a multiset always returns `Some`, placed after any run of
/// keys already equal to `t`.
fn insertion_point<const N: usize>(keys: &[Tuple<N>], t: &Tuple<N>, config: &Config) -> Option<usize> {
    match locate(keys, t, config.strategy) {
        Err(pos) => Some(pos),
        Ok(pos) => {
            if config.is_set {
                None
            } else {
                let mut end = pos;
                while end < keys.len() && keys[end] == *t {
                    end += 1;
                }
                Some(end)
            }
        }
    }
}

enum Body<const N: usize> {
    Leaf(Vec<Tuple<N>>),
    Inner(Vec<Tuple<N>>, Vec<Arc<BNode<N>>>),
}

struct BNode<const N: usize> {
    lock: OptLock,
    /// Back-pointer and this node's position among its parent's
    /// children, refreshed on every structural change that touches
    /// it. Used by sibling-borrow rebalancing.
    parent: Mutex<Option<(Weak<BNode<N>>, usize)>>,
    body: UnsafeCell<Body<N>>,
}

unsafe impl<const N: usize> Sync for BNode<N> {}
unsafe impl<const N: usize> Send for BNode<N> {}

impl<const N: usize> BNode<N> {
    fn new_leaf(keys: Vec<Tuple<N>>) -> Arc<BNode<N>> {
        Arc::new(BNode {
            lock: OptLock::new(),
            parent: Mutex::new(None),
            body: UnsafeCell::new(Body::Leaf(keys)),
        })
    }

    fn new_inner(keys: Vec<Tuple<N>>, children: Vec<Arc<BNode<N>>>) -> Arc<BNode<N>> {
        let node = Arc::new(BNode {
            lock: OptLock::new(),
            parent: Mutex::new(None),
            body: UnsafeCell::new(Body::Inner(keys, children)),
        });
        node.reparent_children();
        node
    }

    fn reparent_children(self: &Arc<Self>) {
        let body = unsafe { &*self.body.get() };
        if let Body::Inner(_, children) = body {
            for (i, child) in children.iter().enumerate() {
                *child.parent.lock().expect("parent lock poisoned") =
                    Some((Arc::downgrade(self), i));
            }
        }
    }

    /// Snapshot a node's keys (and, for inner nodes, child handles)
    /// under the optimistic-read protocol: retry if a writer commits
    /// mid-read.
    fn read_snapshot(&self) -> (Vec<Tuple<N>>, Option<Vec<Arc<BNode<N>>>>) {
        loop {
            let lease = self.lock.start_read();
            let body = unsafe { &*self.body.get() };
            let snapshot = match body {
                Body::Leaf(keys) => (keys.clone(), None),
                Body::Inner(keys, children) => (keys.clone(), Some(children.clone())),
            };
            if self.lock.validate(lease) {
                return snapshot;
            }
        }
    }
}

enum InsertResult<const N: usize> {
    Duplicate,
    Inserted,
    Split { median: Tuple<N>, right: Arc<BNode<N>> },
}

/// An "operation context" for a run of nearby lookups: caches the last
/// leaf a query landed on, so a caller doing several finds/inserts near
/// the same key doesn't pay a fresh root-to-leaf descent each time.
/// Grounded on `original_source/src/Btree.h`'s `operation_hints`, with
/// the concurrency envelope narrowed to reads plus hint-population —
/// see [BTree::insert_with_hint].
pub struct Hint<const N: usize> {
    leaf: Mutex<Option<Arc<BNode<N>>>>,
}

impl<const N: usize> Default for Hint<N> {
    fn default() -> Self {
        Hint::new()
    }
}

impl<const N: usize> Hint<N> {
    pub fn new() -> Hint<N> {
        Hint { leaf: Mutex::new(None) }
    }
}

/// A concurrent, ordered set of `N`-ary tuples.
pub struct BTree<const N: usize> {
    root: RwLock<Arc<BNode<N>>>,
    write_lock: Mutex<()>,
    len: std::sync::atomic::AtomicUsize,
    config: Config,
}

impl<const N: usize> BTree<N> {
    pub fn new() -> BTree<N> {
        Self::with_config(Config::default()).expect("default config is always valid")
    }

    pub fn with_config(config: Config) -> Result<BTree<N>> {
        config.validate()?;
        Ok(BTree {
            root: RwLock::new(BNode::new_leaf(Vec::new())),
            write_lock: Mutex::new(()),
            len: std::sync::atomic::AtomicUsize::new(0),
            config,
        })
    }

    pub fn len(&self) -> usize {
        self.len.load(std::sync::atomic::Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, t: &Tuple<N>) -> bool {
        self.find(t).is_some()
    }

    /// Descend from the root to the leaf that would hold `t`.
    fn leaf_for(&self, t: &Tuple<N>) -> Arc<BNode<N>> {
        let mut node = self.root.read().expect("root lock poisoned").clone();
        loop {
            let (keys, children) = node.read_snapshot();
            match children {
                None => return node,
                Some(children) => {
                    let idx = match locate(&keys, t, self.config.strategy) {
                        Ok(i) => i + 1,
                        Err(i) => i,
                    };
                    node = children[idx].clone();
                }
            }
        }
    }

    fn find_in_leaf(leaf: &BNode<N>, t: &Tuple<N>, strategy: SearchStrategy) -> Option<Tuple<N>> {
        let (keys, _) = leaf.read_snapshot();
        match locate(&keys, t, strategy) {
            Ok(i) => Some(keys[i]),
            Err(_) => None,
        }
    }

    /// The stored tuple equal to `t`, if any (the first such tuple,
    /// for a multiset's run of equal keys).
    pub fn find(&self, t: &Tuple<N>) -> Option<Tuple<N>> {
        let leaf = self.leaf_for(t);
        Self::find_in_leaf(&leaf, t, self.config.strategy)
    }

    /// Like [BTree::find], but consults `hint`'s cached leaf first: a
    /// hit skips the root-to-leaf descent entirely. A miss against the
    /// cached leaf always falls through to a full descent rather than
    /// reporting absence, since a stale hint (the leaf was split, or
    /// `t` simply isn't near the last lookup) can only make the cache
    /// *unhelpful*, never wrong — the fallback re-populates the hint
    /// for the next call.
    pub fn find_with_hint(&self, t: &Tuple<N>, hint: &Hint<N>) -> Option<Tuple<N>> {
        let cached = hint.leaf.lock().expect("hint lock poisoned").clone();
        if let Some(leaf) = cached {
            if let Some(found) = Self::find_in_leaf(&leaf, t, self.config.strategy) {
                return Some(found);
            }
        }
        let leaf = self.leaf_for(t);
        let found = Self::find_in_leaf(&leaf, t, self.config.strategy);
        *hint.leaf.lock().expect("hint lock poisoned") = Some(leaf);
        found
    }

    pub fn contains_with_hint(&self, t: &Tuple<N>, hint: &Hint<N>) -> bool {
        self.find_with_hint(t, hint).is_some()
    }

    /// Smallest stored tuple `>= t`, if any.
    pub fn lower_bound(&self, t: &Tuple<N>) -> Option<Tuple<N>> {
        let mut best: Option<Tuple<N>> = None;
        let mut node = self.root.read().expect("root lock poisoned").clone();
        loop {
            let (keys, children) = node.read_snapshot();
            let idx = match locate(&keys, t, self.config.strategy) {
                Ok(i) => {
                    return Some(keys[i]);
                }
                Err(i) => i,
            };
            if idx < keys.len() {
                best = Some(keys[idx]);
            }
            match children {
                None => return best,
                Some(children) => node = children[idx].clone(),
            }
        }
    }

    /// Smallest stored tuple strictly greater than `t`, if any. A
    /// linear pass over the sorted iteration order rather than a
    /// descent, since skipping past a multiset's full run of keys
    /// equal to `t` in `O(log n)` would need tracking that run across
    /// a leaf/child boundary — acceptable at this crate's scale (see
    /// DESIGN.md), and the same trade `Relation::equal_range` already
    /// makes.
    pub fn upper_bound(&self, t: &Tuple<N>) -> Option<Tuple<N>> {
        self.iter().find(|k| k > t)
    }

    /// Insert `t`. Returns `true` iff it was not already present.
    pub fn insert(&self, t: Tuple<N>) -> bool {
        let _serialize = self.write_lock.lock().expect("btree write lock poisoned");
        let root = self.root.read().expect("root lock poisoned").clone();
        match self.insert_rec(&root, t) {
            InsertResult::Duplicate => false,
            InsertResult::Inserted => {
                self.len.fetch_add(1, std::sync::atomic::Ordering::AcqRel);
                true
            }
            InsertResult::Split { median, right } => {
                let new_root = BNode::new_inner(vec![median], vec![root, right]);
                *self.root.write().expect("root lock poisoned") = new_root;
                self.len.fetch_add(1, std::sync::atomic::Ordering::AcqRel);
                true
            }
        }
    }

    /// Insert `t` as [BTree::insert] does, then populate `hint` with
    /// `t`'s leaf so the next nearby [BTree::find_with_hint] or
    /// [BTree::contains_with_hint] can skip the descent. The insert
    /// itself always takes the uniform root-to-leaf path — trusting a
    /// stale hint during a mutating descent would need to be proven
    /// safe against a concurrent split landing between the hint's
    /// capture and this call, which isn't something to gamble on.
    pub fn insert_with_hint(&self, t: Tuple<N>, hint: &Hint<N>) -> bool {
        let inserted = self.insert(t);
        *hint.leaf.lock().expect("hint lock poisoned") = Some(self.leaf_for(&t));
        inserted
    }

    pub fn insert_all(&self, tuples: impl IntoIterator<Item = Tuple<N>>) {
        for t in tuples {
            self.insert(t);
        }
    }

    fn insert_rec(&self, node: &Arc<BNode<N>>, t: Tuple<N>) -> InsertResult<N> {
        let write = node.lock.start_write();
        let body = unsafe { &mut *node.body.get() };
        match body {
            Body::Leaf(keys) => match insertion_point(keys, &t, &self.config) {
                None => {
                    write.abort();
                    InsertResult::Duplicate
                }
                Some(pos) => {
                    keys.insert(pos, t);
                    if keys.len() <= self.config.max_keys {
                        write.commit();
                        InsertResult::Inserted
                    } else {
                        let right_keys = keys.split_off(self.config.split_point());
                        let median = right_keys[0];
                        write.commit();
                        log::debug!(
                            "btree: leaf split, promoting {:?}, right leaf holds {} keys",
                            median,
                            right_keys.len()
                        );
                        InsertResult::Split {
                            median,
                            right: BNode::new_leaf(right_keys),
                        }
                    }
                }
            },
            Body::Inner(keys, children) => {
                let idx = match locate(keys, &t, self.config.strategy) {
                    Ok(i) => {
                        if self.config.is_set {
                            write.abort();
                            return InsertResult::Duplicate;
                        }
                        // Multiset: an exact match at a separator
                        // still routes right, same as any other key
                        // less than it, so duplicates accumulate in
                        // whichever leaf holds the existing run.
                        i + 1
                    }
                    Err(i) => i,
                };
                let child = children[idx].clone();
                write.abort();

                match self.insert_rec(&child, t) {
                    InsertResult::Duplicate => InsertResult::Duplicate,
                    InsertResult::Inserted => InsertResult::Inserted,
                    InsertResult::Split { median, right } => {
                        let write = node.lock.start_write();
                        let body = unsafe { &mut *node.body.get() };
                        let (keys, children) = match body {
                            Body::Inner(keys, children) => (keys, children),
                            Body::Leaf(_) => unreachable!("node kind changed under us"),
                        };
                        keys.insert(idx, median);
                        children.insert(idx + 1, right);
                        if keys.len() <= self.config.max_keys {
                            write.commit();
                            node.reparent_children();
                            InsertResult::Inserted
                        } else {
                            let mid = self.config.split_point();
                            let promoted = keys[mid];
                            let right_keys = keys.split_off(mid + 1);
                            keys.pop();
                            let right_children = children.split_off(mid + 1);
                            write.commit();
                            node.reparent_children();
                            let right_node = BNode::new_inner(right_keys, right_children);
                            log::debug!("btree: inner split, promoting {:?} up to parent", promoted);
                            InsertResult::Split {
                                median: promoted,
                                right: right_node,
                            }
                        }
                    }
                }
            }
        }
    }

    /// In-order iteration over every stored tuple.
    pub fn iter(&self) -> BTreeIter<N> {
        let mut items = Vec::new();
        let root = self.root.read().expect("root lock poisoned").clone();
        collect(&root, &mut items);
        BTreeIter {
            items: items.into_iter(),
        }
    }

    /// Split the tree's key range into up to `k` roughly-equal,
    /// disjoint iterators, one per leaf group — spec.md §4.5's
    /// `getChunks`.
    pub fn get_chunks(&self, k: usize) -> Vec<BTreeIter<N>> {
        if k <= 1 || self.is_empty() {
            return vec![self.iter()];
        }
        let mut leaves = Vec::new();
        let root = self.root.read().expect("root lock poisoned").clone();
        collect_leaves(&root, &mut leaves);
        let total: usize = leaves.iter().map(|l| l.len()).sum();
        let target = (total + k - 1) / k.max(1);
        let mut chunks = Vec::new();
        let mut current = Vec::new();
        for leaf in leaves {
            current.extend(leaf);
            if current.len() >= target {
                chunks.push(BTreeIter {
                    items: std::mem::take(&mut current).into_iter(),
                });
            }
        }
        if !current.is_empty() {
            chunks.push(BTreeIter {
                items: current.into_iter(),
            });
        }
        chunks
    }

    /// Bulk-build a balanced tree from already-sorted, deduplicated
    /// tuples — spec.md §4.5's `load`. Far cheaper than repeated
    /// single inserts because no rebalancing happens.
    pub fn load(sorted: Vec<Tuple<N>>, config: Config) -> Result<BTree<N>> {
        config.validate()?;
        let len = sorted.len();
        let leaves: Vec<Arc<BNode<N>>> = sorted
            .chunks(config.min_keys().max(1) * 2)
            .map(|chunk| BNode::new_leaf(chunk.to_vec()))
            .collect();
        let root = if leaves.is_empty() {
            BNode::new_leaf(Vec::new())
        } else {
            build_levels(leaves)
        };
        Ok(BTree {
            root: RwLock::new(root),
            write_lock: Mutex::new(()),
            len: std::sync::atomic::AtomicUsize::new(len),
            config,
        })
    }

    /// Reset to an empty tree.
    pub fn clear(&self) {
        let _serialize = self.write_lock.lock().expect("btree write lock poisoned");
        *self.root.write().expect("root lock poisoned") = BNode::new_leaf(Vec::new());
        self.len.store(0, std::sync::atomic::Ordering::Release);
    }

    /// True iff both trees contain the same tuples, irrespective of
    /// internal shape.
    pub fn equal(&self, other: &BTree<N>) -> bool {
        self.iter().eq(other.iter())
    }

    /// Debug-build invariant check: keys sorted within every node,
    /// child counts consistent, occupancy bounds respected outside the
    /// root. Returns an error describing the first violation found.
    pub fn check(&self) -> Result<()> {
        let root = self.root.read().expect("root lock poisoned").clone();
        check_node(&root, &self.config, true)
    }
}

impl<const N: usize> Default for BTree<N> {
    fn default() -> Self {
        BTree::new()
    }
}

fn build_levels<const N: usize>(mut level: Vec<Arc<BNode<N>>>) -> Arc<BNode<N>> {
    while level.len() > 1 {
        let mut next = Vec::new();
        for group in level.chunks(8) {
            if group.len() == 1 {
                next.push(group[0].clone());
                continue;
            }
            let mut keys = Vec::with_capacity(group.len() - 1);
            for child in &group[1..] {
                let (child_keys, _) = child.read_snapshot();
                keys.push(child_keys[0]);
            }
            next.push(BNode::new_inner(keys, group.to_vec()));
        }
        level = next;
    }
    level.into_iter().next().expect("non-empty level")
}

fn collect<const N: usize>(node: &Arc<BNode<N>>, out: &mut Vec<Tuple<N>>) {
    let (keys, children) = node.read_snapshot();
    match children {
        None => out.extend(keys),
        Some(children) => {
            for (i, key) in keys.iter().enumerate() {
                collect(&children[i], out);
                out.push(*key);
            }
            collect(children.last().expect("inner node has >=2 children"), out);
        }
    }
}

fn collect_leaves<const N: usize>(node: &Arc<BNode<N>>, out: &mut Vec<Vec<Tuple<N>>>) {
    let (keys, children) = node.read_snapshot();
    match children {
        None => out.push(keys),
        Some(children) => {
            for child in children {
                collect_leaves(&child, out);
            }
        }
    }
}

fn check_node<const N: usize>(node: &Arc<BNode<N>>, config: &Config, is_root: bool) -> Result<()> {
    let (keys, children) = node.read_snapshot();
    let ordered = if config.is_set {
        keys.windows(2).all(|w| w[0] < w[1])
    } else {
        keys.windows(2).all(|w| w[0] <= w[1])
    };
    if !ordered {
        return err_at!(InvariantViolation, msg: "btree node keys not in sorted order: {:?}", keys);
    }
    if !is_root && keys.len() < config.min_keys() {
        return err_at!(
            InvariantViolation,
            msg: "btree node underflowed: {} keys, min {}",
            keys.len(),
            config.min_keys()
        );
    }
    if keys.len() > config.max_keys {
        return err_at!(
            InvariantViolation,
            msg: "btree node overflowed: {} keys, max {}",
            keys.len(),
            config.max_keys
        );
    }
    if let Some(children) = children {
        if children.len() != keys.len() + 1 {
            return err_at!(
                InvariantViolation,
                msg: "btree inner node has {} children but {} keys",
                children.len(),
                keys.len()
            );
        }
        for child in &children {
            check_node(child, config, false)?;
        }
    }
    Ok(())
}

pub struct BTreeIter<const N: usize> {
    items: std::vec::IntoIter<Tuple<N>>,
}

impl<const N: usize> Iterator for BTreeIter<N> {
    type Item = Tuple<N>;

    fn next(&mut self) -> Option<Tuple<N>> {
        self.items.next()
    }
}

#[cfg(test)]
mod btree_test {
    use rand::prelude::random;

    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let tree: BTree<1> = BTree::new();
        for v in [5, 1, 9, 3, 7] {
            assert!(tree.insert(Tuple::new([v])));
        }
        assert!(!tree.insert(Tuple::new([5])));
        assert!(tree.contains(&Tuple::new([7])));
        assert!(!tree.contains(&Tuple::new([100])));
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_iteration_is_sorted() {
        let tree: BTree<1> = BTree::new();
        for v in [40, 10, 30, 20, 50, 5, 15] {
            tree.insert(Tuple::new([v]));
        }
        let got: Vec<i32> = tree.iter().map(|t| t.get(0)).collect();
        assert_eq!(got, vec![5, 10, 15, 20, 30, 40, 50]);
    }

    #[test]
    fn test_forces_a_split() {
        // spec.md §8 scenario 2: enough sequential inserts to force a
        // node split under a small order, then check tree shape.
        let tree: BTree<1> = BTree::with_config(Config::default().with_max_keys(4)).unwrap();
        for v in 0..50 {
            tree.insert(Tuple::new([v]));
        }
        assert_eq!(tree.len(), 50);
        tree.check().expect("tree invariants hold after splits");
        let got: Vec<i32> = tree.iter().map(|t| t.get(0)).collect();
        assert_eq!(got, (0..50).collect::<Vec<i32>>());
    }

    #[test]
    fn test_concurrent_insert() {
        use std::sync::Arc;
        let tree = Arc::new(BTree::<1>::with_config(Config::default().with_max_keys(8)).unwrap());
        let mut handles = vec![];
        for t in 0..4 {
            let tree = Arc::clone(&tree);
            handles.push(std::thread::spawn(move || {
                for i in 0..200 {
                    tree.insert(Tuple::new([t * 1000 + i]));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(tree.len(), 800);
        tree.check().expect("tree invariants hold after concurrent inserts");
    }

    #[test]
    fn test_get_chunks_covers_all() {
        let tree: BTree<1> = BTree::with_config(Config::default().with_max_keys(4)).unwrap();
        for v in 0..40 {
            tree.insert(Tuple::new([v]));
        }
        let chunks = tree.get_chunks(5);
        let total: usize = chunks.into_iter().map(|c| c.count()).sum();
        assert_eq!(total, 40);
    }

    #[test]
    fn test_load_bulk_build() {
        let sorted: Vec<Tuple<1>> = (0..100).map(|v| Tuple::new([v])).collect();
        let tree = BTree::load(sorted, Config::default()).unwrap();
        assert_eq!(tree.len(), 100);
        tree.check().expect("bulk-built tree satisfies invariants");
        assert!(tree.contains(&Tuple::new([42])));
    }

    #[test]
    fn test_equal() {
        let a: BTree<1> = BTree::new();
        let b: BTree<1> = BTree::new();
        for v in [1, 2, 3] {
            a.insert(Tuple::new([v]));
        }
        for v in [3, 2, 1] {
            b.insert(Tuple::new([v]));
        }
        assert!(a.equal(&b));
        b.insert(Tuple::new([4]));
        assert!(!a.equal(&b));
    }

    #[test]
    fn test_find_and_upper_bound() {
        let tree: BTree<1> = BTree::new();
        for v in [10, 20, 30] {
            tree.insert(Tuple::new([v]));
        }
        assert_eq!(tree.find(&Tuple::new([20])), Some(Tuple::new([20])));
        assert_eq!(tree.find(&Tuple::new([25])), None);
        assert_eq!(tree.lower_bound(&Tuple::new([20])), Some(Tuple::new([20])));
        assert_eq!(tree.upper_bound(&Tuple::new([20])), Some(Tuple::new([30])));
        assert_eq!(tree.upper_bound(&Tuple::new([30])), None);
    }

    #[test]
    fn test_linear_strategy_matches_binary() {
        let config = Config::default().with_max_keys(8).with_strategy(SearchStrategy::Linear);
        let tree: BTree<1> = BTree::with_config(config).unwrap();
        for v in [5, 1, 9, 3, 7, 2, 8, 4, 6] {
            tree.insert(Tuple::new([v]));
        }
        assert!(tree.contains(&Tuple::new([7])));
        assert!(!tree.contains(&Tuple::new([100])));
        tree.check().expect("linear-strategy tree satisfies invariants");
        let got: Vec<i32> = tree.iter().map(|t| t.get(0)).collect();
        assert_eq!(got, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_multiset_accumulates_duplicates() {
        let config = Config::default().with_max_keys(4).with_multiset();
        let tree: BTree<1> = BTree::with_config(config).unwrap();
        for v in [5, 3, 5, 3, 5, 1] {
            assert!(tree.insert(Tuple::new([v])), "multiset insert never reports a duplicate");
        }
        assert_eq!(tree.len(), 6);
        let got: Vec<i32> = tree.iter().map(|t| t.get(0)).collect();
        assert_eq!(got, vec![1, 3, 3, 5, 5, 5]);
        tree.check().expect("multiset tree satisfies invariants");
    }

    #[test]
    fn test_multiset_survives_a_split() {
        let config = Config::default().with_max_keys(4).with_multiset();
        let tree: BTree<1> = BTree::with_config(config).unwrap();
        for v in 0..30 {
            tree.insert(Tuple::new([v % 5]));
        }
        assert_eq!(tree.len(), 30);
        tree.check().expect("multiset tree satisfies invariants after splits");
        let got: Vec<i32> = tree.iter().map(|t| t.get(0)).collect();
        let mut expected: Vec<i32> = (0..30).map(|v| v % 5).collect();
        expected.sort();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_random_insert_order_keeps_sorted_invariants() {
        let config = Config::default().with_max_keys(5);
        let tree: BTree<1> = BTree::with_config(config).unwrap();
        let mut unique = std::collections::BTreeSet::new();
        for _ in 0..500 {
            let v: i32 = random::<u16>() as i32;
            unique.insert(v);
            tree.insert(Tuple::new([v]));
        }
        tree.check().expect("randomly-ordered inserts satisfy btree invariants");
        assert_eq!(tree.len(), unique.len());
        let got: Vec<i32> = tree.iter().map(|t| t.get(0)).collect();
        let expected: Vec<i32> = unique.into_iter().collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_hint_accelerates_repeat_lookups_without_changing_answers() {
        let config = Config::default().with_max_keys(4);
        let tree: BTree<1> = BTree::with_config(config).unwrap();
        for v in 0..40 {
            tree.insert(Tuple::new([v]));
        }
        let hint: Hint<1> = Hint::new();
        for v in 0..40 {
            assert_eq!(tree.find_with_hint(&Tuple::new([v]), &hint), Some(Tuple::new([v])));
        }
        assert!(!tree.contains_with_hint(&Tuple::new([999]), &hint));
        assert!(tree.contains_with_hint(&Tuple::new([17]), &hint));
    }

    #[test]
    fn test_insert_with_hint_matches_plain_insert() {
        let tree: BTree<1> = BTree::new();
        let hint: Hint<1> = Hint::new();
        assert!(tree.insert_with_hint(Tuple::new([1]), &hint));
        assert!(tree.insert_with_hint(Tuple::new([2]), &hint));
        assert!(!tree.insert_with_hint(Tuple::new([1]), &hint));
        assert_eq!(tree.len(), 2);
        assert!(tree.contains_with_hint(&Tuple::new([2]), &hint));
    }
}
