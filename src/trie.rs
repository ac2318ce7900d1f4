//! Ordered set of fixed-arity integer tuples, built from nested
//! [crate::sparse::SparseArray]s with a [crate::sparse::SparseBitmap]
//! at the terminal level. See spec.md §4.4.
//!
//! Unlike the original C++ (one template instantiation per arity),
//! arity here is a runtime field and the tree is a recursive enum —
//! the approach spec.md §9's Design Note suggests ("dispatch can be
//! monomorphized by generics or handled by tagged variants of index
//! kind"). Every public entry point still takes `&[i32]` tuples whose
//! length the caller is expected to match to [Trie::arity].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::sparse::{MergeOp, SparseArray, SparseBitmap};

#[derive(Clone)]
enum Level {
    /// Arity-0 trie: a single present/absent flag.
    Flag(Arc<AtomicBool>),
    /// Arity-1 trie: presence is a set bit.
    Bitmap(Arc<SparseBitmap>),
    /// Arity-N (N >= 2) trie: sparse array from the first column to
    /// the nested trie over the remaining columns.
    Inner(Arc<SparseArray<Link, LinkMerge>>),
}

/// A nested trie link. `None` in a populated sparse-array cell never
/// occurs — cells are either absent (default) or hold `Some`.
#[derive(Clone, Default)]
struct Link(Option<Arc<TrieNode>>);

impl PartialEq for Link {
    fn eq(&self, other: &Link) -> bool {
        match (&self.0, &other.0) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

struct LinkMerge;

impl MergeOp<Link> for LinkMerge {
    fn merge(left: &Link, right: &Link) -> Link {
        match (&left.0, &right.0) {
            (None, None) => Link(None),
            (Some(l), None) => Link(Some(l.clone())),
            (None, Some(r)) => Link(Some(r.clone())),
            (Some(l), Some(r)) => {
                let merged = TrieNode {
                    arity: l.arity,
                    level: l.level.clone(),
                };
                merged.level_ref().add_all_into(&r.level);
                Link(Some(Arc::new(merged)))
            }
        }
    }
}

struct TrieNode {
    arity: usize,
    level: Level,
}

impl TrieNode {
    fn new(arity: usize) -> TrieNode {
        let level = match arity {
            0 => Level::Flag(Arc::new(AtomicBool::new(false))),
            1 => Level::Bitmap(Arc::new(SparseBitmap::new())),
            _ => Level::Inner(Arc::new(SparseArray::new())),
        };
        TrieNode { arity, level }
    }

    fn level_ref(&self) -> LevelRef<'_> {
        LevelRef(&self.level)
    }
}

struct LevelRef<'a>(&'a Level);

impl<'a> LevelRef<'a> {
    fn add_all_into(&self, other: &Level) {
        match (self.0, other) {
            (Level::Bitmap(a), Level::Bitmap(b)) => a.add_all(b),
            (Level::Inner(a), Level::Inner(b)) => a.add_all(b),
            (Level::Flag(a), Level::Flag(b)) => {
                if b.load(Ordering::SeqCst) {
                    a.store(true, Ordering::SeqCst);
                }
            }
            _ => unreachable!("mismatched trie levels at same arity"),
        }
    }
}

/// An "operation context" caching the child reached by the first
/// column's value, so a run of lookups sharing a leading column skips
/// that column's [crate::sparse::SparseArray] lookup. Trusting a cache
/// hit is safe because of [Trie::insert_at]'s invariant: once a
/// head-keyed child is created it is never replaced, only raced for,
/// so a cached `Arc` stays valid for the trie's lifetime regardless of
/// later inserts under other heads.
pub struct Hint {
    child: Mutex<Option<(i32, Arc<TrieNode>)>>,
}

impl Default for Hint {
    fn default() -> Self {
        Hint::new()
    }
}

impl Hint {
    pub fn new() -> Hint {
        Hint {
            child: Mutex::new(None),
        }
    }
}

/// An ordered set of `arity`-column integer tuples.
pub struct Trie {
    arity: usize,
    root: TrieNode,
}

impl Trie {
    pub fn new(arity: usize) -> Trie {
        Trie {
            arity,
            root: TrieNode::new(arity),
        }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Insert a tuple. Returns `true` iff it was new.
    pub fn insert(&self, tuple: &[i32]) -> bool {
        assert_eq!(tuple.len(), self.arity, "tuple arity mismatch");
        Self::insert_at(&self.root, tuple)
    }

    fn insert_at(node: &TrieNode, tuple: &[i32]) -> bool {
        match &node.level {
            Level::Flag(flag) => !flag.swap(true, Ordering::SeqCst),
            Level::Bitmap(bitmap) => bitmap.set(tuple[0] as u32),
            Level::Inner(array) => {
                let head = tuple[0] as u32;
                let existing = array.get(head);
                let child = match existing.0 {
                    Some(child) => child,
                    None => {
                        let child = Arc::new(TrieNode::new(node.arity - 1));
                        // Losers of this race simply drop their
                        // speculative child (Arc refcount reaches
                        // zero) and pick up whichever child actually
                        // won, fulfilling spec.md §4.4's insert
                        // contract.
                        array.update(head, Link(Some(child.clone())));
                        match array.get(head).0 {
                            Some(winner) => winner,
                            None => child,
                        }
                    }
                };
                Self::insert_at(&child, &tuple[1..])
            }
        }
    }

    pub fn contains(&self, tuple: &[i32]) -> bool {
        assert_eq!(tuple.len(), self.arity, "tuple arity mismatch");
        Self::contains_at(&self.root, tuple)
    }

    fn contains_at(node: &TrieNode, tuple: &[i32]) -> bool {
        match &node.level {
            Level::Flag(flag) => flag.load(Ordering::SeqCst),
            Level::Bitmap(bitmap) => bitmap.test(tuple[0] as u32),
            Level::Inner(array) => match array.get(tuple[0] as u32).0 {
                None => false,
                Some(child) => Self::contains_at(&child, &tuple[1..]),
            },
        }
    }

    /// Like [Trie::contains], but consults `hint`'s cached first-column
    /// child before touching the root array. Only arity >= 2 tries
    /// have a child to cache; lower arities fall through to the plain
    /// check.
    pub fn contains_with_hint(&self, tuple: &[i32], hint: &Hint) -> bool {
        assert_eq!(tuple.len(), self.arity, "tuple arity mismatch");
        let array = match &self.root.level {
            Level::Inner(array) => array,
            _ => return self.contains(tuple),
        };
        let head = tuple[0];
        let cached = hint.child.lock().expect("hint lock poisoned").clone();
        if let Some((cached_head, child)) = cached {
            if cached_head == head {
                return Self::contains_at(&child, &tuple[1..]);
            }
        }
        match array.get(head as u32).0 {
            None => false,
            Some(child) => {
                let found = Self::contains_at(&child, &tuple[1..]);
                *hint.child.lock().expect("hint lock poisoned") = Some((head, child));
                found
            }
        }
    }

    /// Insert as [Trie::insert] does, then cache the first column's
    /// child in `hint` for the next nearby [Trie::contains_with_hint]
    /// or [Trie::insert_with_hint].
    pub fn insert_with_hint(&self, tuple: &[i32], hint: &Hint) -> bool {
        let inserted = self.insert(tuple);
        if let Level::Inner(array) = &self.root.level {
            if let Some(child) = array.get(tuple[0] as u32).0 {
                *hint.child.lock().expect("hint lock poisoned") = Some((tuple[0], child));
            }
        }
        inserted
    }

    /// Recursive element count. Not cached, per spec.md §4.4.
    pub fn size(&self) -> usize {
        Self::size_at(&self.root)
    }

    fn size_at(node: &TrieNode) -> usize {
        match &node.level {
            Level::Flag(flag) => usize::from(flag.load(Ordering::SeqCst)),
            Level::Bitmap(bitmap) => bitmap.size(),
            Level::Inner(array) => array
                .iter()
                .map(|(_, link)| link.0.map(|c| Self::size_at(&c)).unwrap_or(0))
                .sum(),
        }
    }

    /// Merge `other`'s tuples into `self`.
    pub fn insert_all(&self, other: &Trie) {
        assert_eq!(self.arity, other.arity, "arity mismatch in insert_all");
        self.root.level_ref().add_all_into(&other.root.level);
    }

    /// All tuples, in lexicographic order.
    pub fn iter(&self) -> TrieIter {
        let mut items = Vec::new();
        collect(&self.root, &mut Vec::new(), &mut items);
        TrieIter {
            items: items.into_iter(),
        }
    }

    /// All tuples sharing `prefix` in their first `prefix.len()`
    /// columns — spec.md §4.4's `getBoundaries<L>`.
    pub fn boundaries(&self, prefix: &[i32]) -> TrieIter {
        let mut items = Vec::new();
        collect_prefixed(&self.root, prefix, &mut Vec::new(), &mut items);
        TrieIter {
            items: items.into_iter(),
        }
    }

    /// Split the top-level cursor into approximately `k` disjoint
    /// sub-iterators, spec.md §4.4's "Partitioning" bullet.
    pub fn partition(&self, k: usize) -> Vec<TrieIter> {
        if self.arity == 0 || k <= 1 {
            return vec![self.iter()];
        }
        match &self.root.level {
            Level::Bitmap(bitmap) => {
                let heads: Vec<u32> = bitmap.iter().collect();
                chunk_by_heads(heads, k)
                    .into_iter()
                    .map(|group| {
                        let items: Vec<Vec<i32>> = group.into_iter().map(|h| vec![h as i32]).collect();
                        TrieIter {
                            items: items.into_iter(),
                        }
                    })
                    .collect()
            }
            Level::Inner(array) => {
                let heads: Vec<u32> = array.iter().map(|(k, _)| k).collect();
                chunk_by_heads(heads, k)
                    .into_iter()
                    .map(|group| {
                        let mut items = Vec::new();
                        for head in group {
                            if let Some(child) = array.get(head).0 {
                                collect(&child, &mut vec![head as i32], &mut items);
                            }
                        }
                        TrieIter {
                            items: items.into_iter(),
                        }
                    })
                    .collect()
            }
            Level::Flag(_) => vec![self.iter()],
        }
    }
}

fn chunk_by_heads(heads: Vec<u32>, k: usize) -> Vec<Vec<u32>> {
    if heads.is_empty() {
        return vec![];
    }
    let chunk_size = (heads.len() + k - 1) / k.max(1);
    heads
        .chunks(chunk_size.max(1))
        .map(|c| c.to_vec())
        .collect()
}

fn collect(node: &TrieNode, prefix: &mut Vec<i32>, out: &mut Vec<Vec<i32>>) {
    match &node.level {
        Level::Flag(flag) => {
            if flag.load(Ordering::SeqCst) {
                out.push(prefix.clone());
            }
        }
        Level::Bitmap(bitmap) => {
            for bit in bitmap.iter() {
                prefix.push(bit as i32);
                out.push(prefix.clone());
                prefix.pop();
            }
        }
        Level::Inner(array) => {
            for (head, link) in array.iter() {
                if let Some(child) = link.0 {
                    prefix.push(head as i32);
                    collect(&child, prefix, out);
                    prefix.pop();
                }
            }
        }
    }
}

fn collect_prefixed(node: &TrieNode, prefix: &[i32], built: &mut Vec<i32>, out: &mut Vec<Vec<i32>>) {
    if prefix.is_empty() {
        collect(node, built, out);
        return;
    }
    match &node.level {
        Level::Flag(_) => {}
        Level::Bitmap(bitmap) => {
            if bitmap.test(prefix[0] as u32) {
                built.push(prefix[0]);
                out.push(built.clone());
                built.pop();
            }
        }
        Level::Inner(array) => {
            if let Some(child) = array.get(prefix[0] as u32).0 {
                built.push(prefix[0]);
                collect_prefixed(&child, &prefix[1..], built, out);
                built.pop();
            }
        }
    }
}

pub struct TrieIter {
    items: std::vec::IntoIter<Vec<i32>>,
}

impl Iterator for TrieIter {
    type Item = Vec<i32>;

    fn next(&mut self) -> Option<Vec<i32>> {
        self.items.next()
    }
}

#[cfg(test)]
mod trie_test {
    use super::*;

    #[test]
    fn test_pairs_scenario() {
        // spec.md §8 scenario 1.
        let trie = Trie::new(2);
        for t in [[1, 2], [1, 3], [2, 1], [1, 2]] {
            trie.insert(&t);
        }
        assert_eq!(trie.size(), 3);
        let all: Vec<Vec<i32>> = trie.iter().collect();
        assert_eq!(all, vec![vec![1, 2], vec![1, 3], vec![2, 1]]);

        let bounded: Vec<Vec<i32>> = trie.boundaries(&[1]).collect();
        assert_eq!(bounded, vec![vec![1, 2], vec![1, 3]]);
    }

    #[test]
    fn test_contains_respects_clear_semantics() {
        let trie = Trie::new(1);
        assert!(!trie.contains(&[5]));
        trie.insert(&[5]);
        assert!(trie.contains(&[5]));
    }

    #[test]
    fn test_insert_all_merges() {
        let a = Trie::new(2);
        a.insert(&[1, 1]);
        let b = Trie::new(2);
        b.insert(&[1, 2]);
        b.insert(&[2, 2]);

        a.insert_all(&b);
        let all: Vec<Vec<i32>> = a.iter().collect();
        assert_eq!(all, vec![vec![1, 1], vec![1, 2], vec![2, 2]]);
    }

    #[test]
    fn test_hint_accelerates_repeat_lookups_without_changing_answers() {
        let trie = Trie::new(2);
        for t in [[1, 2], [1, 3], [2, 1]] {
            trie.insert(&t);
        }
        let hint = Hint::new();
        assert!(trie.contains_with_hint(&[1, 2], &hint));
        assert!(trie.contains_with_hint(&[1, 3], &hint));
        assert!(!trie.contains_with_hint(&[1, 9], &hint));
        assert!(trie.contains_with_hint(&[2, 1], &hint));
        assert!(!trie.contains_with_hint(&[3, 1], &hint));
    }

    #[test]
    fn test_insert_with_hint_matches_plain_insert() {
        let trie = Trie::new(2);
        let hint = Hint::new();
        assert!(trie.insert_with_hint(&[1, 1], &hint));
        assert!(!trie.insert_with_hint(&[1, 1], &hint));
        assert!(trie.insert_with_hint(&[1, 2], &hint));
        assert_eq!(trie.size(), 2);
        assert!(trie.contains_with_hint(&[1, 2], &hint));
    }

    #[test]
    fn test_partition_covers_all() {
        let trie = Trie::new(2);
        for i in 0..20 {
            trie.insert(&[i, i * 2]);
        }
        let parts = trie.partition(4);
        let total: usize = parts.into_iter().map(|p| p.count()).sum();
        assert_eq!(total, 20);
    }
}
