//! Relation container: a primary index plus zero or more secondary
//! indices over the same tuples, backed by one append-only master
//! arena. See spec.md §4.8/§6.
//!
//! Grounded on `original_source/src/Relation.h`: every index is a
//! `Btree` over a permuted view of the tuple (the permutation is what
//! `Index` records), and insertion is "check primary, append to
//! master, insert into every index" under one short critical section
//! so a reader never observes a tuple present in one index but not
//! another. The original distinguishes a "direct" index (small tuples
//! stored inline) from an "indirect" one (a master-storage offset
//! stored instead, for large tuples) as a space optimization; since a
//! [Tuple] here is at most a few `i32`s regardless of arity, that
//! distinction collapses and every index stores tuples directly (see
//! DESIGN.md).

use crate::btree::BTree;
use crate::sync::{BlockList, SpinLock};
use crate::tuple::Tuple;

/// A secondary index's column permutation: `order[i]` names which
/// source column occupies position `i` in the index's key order.
#[derive(Clone)]
pub struct Index<const N: usize> {
    pub order: [usize; N],
}

impl<const N: usize> Index<N> {
    pub fn new(order: [usize; N]) -> Index<N> {
        Index { order }
    }
}

struct Secondary<const N: usize> {
    index: Index<N>,
    tree: BTree<N>,
}

/// A set of `N`-ary tuples, queryable through a primary index (natural
/// column order) and any number of secondary indices registered at
/// construction time.
pub struct Relation<const N: usize> {
    master: BlockList<Tuple<N>>,
    primary: BTree<N>,
    secondary: Vec<Secondary<N>>,
    insert_lock: SpinLock<()>,
}

impl<const N: usize> Relation<N> {
    pub fn new() -> Relation<N> {
        Relation {
            master: BlockList::new(),
            primary: BTree::new(),
            secondary: Vec::new(),
            insert_lock: SpinLock::new(()),
        }
    }

    pub fn with_indices(indices: Vec<Index<N>>) -> Relation<N> {
        Relation {
            master: BlockList::new(),
            primary: BTree::new(),
            secondary: indices
                .into_iter()
                .map(|index| Secondary {
                    index,
                    tree: BTree::new(),
                })
                .collect(),
            insert_lock: SpinLock::new(()),
        }
    }

    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    pub fn contains(&self, t: &Tuple<N>) -> bool {
        self.primary.contains(t)
    }

    /// Insert `t`. The primary-index check, master append and every
    /// secondary insert happen under one lock, so concurrent readers
    /// never see a tuple land in one index but not the others.
    pub fn insert(&self, t: Tuple<N>) -> bool {
        let _guard = self.insert_lock.lock();
        if self.primary.contains(&t) {
            return false;
        }
        self.master.append(t);
        self.primary.insert(t);
        for secondary in &self.secondary {
            secondary.tree.insert(t.permute(&secondary.index.order));
        }
        true
    }

    /// Insert `t`, consulting and repopulating `hint` on the primary
    /// index's existence check. The master append and every secondary
    /// insert still go through the uniform path; only the primary's
    /// "is it already here" lookup is hint-accelerated, since that's
    /// the lookup a caller inserting a run of nearby tuples repeats.
    pub fn insert_with_hint(&self, t: Tuple<N>, hint: &crate::btree::Hint<N>) -> bool {
        let _guard = self.insert_lock.lock();
        if self.primary.contains_with_hint(&t, hint) {
            return false;
        }
        self.master.append(t);
        self.primary.insert_with_hint(t, hint);
        for secondary in &self.secondary {
            secondary.tree.insert(t.permute(&secondary.index.order));
        }
        true
    }

    pub fn insert_all(&self, tuples: impl IntoIterator<Item = Tuple<N>>) {
        for t in tuples {
            self.insert(t);
        }
    }

    /// Tuples in primary-index (natural column) order.
    pub fn iter(&self) -> crate::btree::BTreeIter<N> {
        self.primary.iter()
    }

    /// Tuples in the order they were first inserted.
    pub fn insertion_order_iter(&self) -> crate::sync::BlockListIter<'_, Tuple<N>> {
        self.master.iter()
    }

    /// Every stored tuple whose columns, read through secondary index
    /// `which`'s permutation, share `prefix` in their leading columns.
    /// Linear in the index's size; an equality range on a B-tree key
    /// prefix rather than a true range-seek, since that requires
    /// partial keys narrower than `Tuple<N>` (see DESIGN.md).
    pub fn equal_range(&self, which: usize, prefix: &[i32]) -> Vec<Tuple<N>> {
        let secondary = &self.secondary[which];
        secondary
            .tree
            .iter()
            .filter(|permuted| permuted.as_slice()[..prefix.len()] == *prefix)
            .map(|permuted| permuted.unpermute(&secondary.index.order))
            .collect()
    }

    /// Split the primary index into up to `k` disjoint sub-iterators.
    pub fn partition(&self, k: usize) -> Vec<crate::btree::BTreeIter<N>> {
        self.primary.get_chunks(k)
    }

    /// Drop every tuple and index entry.
    pub fn purge(&self) {
        let _guard = self.insert_lock.lock();
        log::debug!(
            "relation: purge clearing {} tuples across {} secondary indices",
            self.primary.len(),
            self.secondary.len()
        );
        self.master.clear();
        self.primary.clear();
        for secondary in &self.secondary {
            secondary.tree.clear();
        }
    }

    pub fn equal(&self, other: &Relation<N>) -> bool {
        self.primary.equal(&other.primary)
    }
}

impl<const N: usize> Default for Relation<N> {
    fn default() -> Self {
        Relation::new()
    }
}

#[cfg(test)]
mod relation_test {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let rel: Relation<2> = Relation::new();
        assert!(rel.insert(Tuple::new([1, 2])));
        assert!(!rel.insert(Tuple::new([1, 2])));
        assert!(rel.contains(&Tuple::new([1, 2])));
        assert_eq!(rel.len(), 1);
    }

    #[test]
    fn test_secondary_index_query() {
        // index permutation [1, 0]: query by second column first.
        let rel: Relation<2> = Relation::with_indices(vec![Index::new([1, 0])]);
        rel.insert(Tuple::new([1, 10]));
        rel.insert(Tuple::new([2, 10]));
        rel.insert(Tuple::new([3, 20]));

        let mut by_second: Vec<i32> = rel.equal_range(0, &[10]).into_iter().map(|t| t.get(0)).collect();
        by_second.sort();
        assert_eq!(by_second, vec![1, 2]);
    }

    #[test]
    fn test_insertion_order_preserved_in_master() {
        let rel: Relation<1> = Relation::new();
        for v in [5, 1, 3] {
            rel.insert(Tuple::new([v]));
        }
        let order: Vec<i32> = rel.insertion_order_iter().map(|t| t.get(0)).collect();
        assert_eq!(order, vec![5, 1, 3]);
        let sorted: Vec<i32> = rel.iter().map(|t| t.get(0)).collect();
        assert_eq!(sorted, vec![1, 3, 5]);
    }

    #[test]
    fn test_insert_with_hint_matches_plain_insert() {
        let rel: Relation<1> = Relation::new();
        let hint = crate::btree::Hint::new();
        assert!(rel.insert_with_hint(Tuple::new([1]), &hint));
        assert!(!rel.insert_with_hint(Tuple::new([1]), &hint));
        assert!(rel.insert_with_hint(Tuple::new([2]), &hint));
        assert_eq!(rel.len(), 2);
        assert!(rel.contains(&Tuple::new([2])));
    }

    #[test]
    fn test_purge_clears_everything() {
        let rel: Relation<1> = Relation::new();
        rel.insert(Tuple::new([1]));
        rel.insert(Tuple::new([2]));
        rel.purge();
        assert!(rel.is_empty());
        assert!(!rel.contains(&Tuple::new([1])));
    }
}
