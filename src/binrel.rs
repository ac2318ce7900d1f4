//! Binary equivalence relation: a disjoint-set over elements, paired
//! with a per-representative cache of the class's *members* so that
//! pair queries don't have to walk the union-find forest on every
//! call. See spec.md §4.8.
//!
//! Grounded on `original_source/src/BinaryRelation.h`'s
//! `BinaryRelation<TupleType>`: `sds` (a `SparseDisjointSet`) tracks
//! class membership, and `orderedStates` caches one `Trie<1>` of
//! members per representative — never a trie of pairs. `insert` unions
//! then invalidates whichever representatives it just merged away;
//! `generateTrieIfNone` rebuilds a representative's trie from the
//! class's current membership the first time a query needs it. Pairs
//! are never stored: every `(x, y)` in a class of size `n` is derived
//! on demand by nesting two passes over the same `n`-element members
//! trie (the original's `frontIter`/`backIter` cursor pair), so a
//! cache rebuild costs `O(n)` rather than `O(n^2)`. `contains` and
//! `size` go straight to `sds` and never touch the trie at all, again
//! matching the original.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::err_at;
use crate::trie::Trie;
use crate::unionfind::SparseDisjointSet;
use crate::Result;

/// A symmetric, transitive relation over `i32` elements: the set of
/// pairs `(x, y)` such that `x` and `y` are in the same class.
pub struct BinaryEquivalenceRelation {
    classes: SparseDisjointSet,
    /// Representative element -> trie of that class's members.
    /// `None` means invalidated since the last rebuild; absent means
    /// never cached at all (same effect, `generate_trie_if_none`
    /// treats both as "build it").
    tries: RwLock<HashMap<i32, Option<Arc<Trie>>>>,
}

impl Default for BinaryEquivalenceRelation {
    fn default() -> Self {
        BinaryEquivalenceRelation::new()
    }
}

impl BinaryEquivalenceRelation {
    pub fn new() -> BinaryEquivalenceRelation {
        BinaryEquivalenceRelation {
            classes: SparseDisjointSet::new(),
            tries: RwLock::new(HashMap::new()),
        }
    }

    /// Merge `x` and `y`'s classes. Invalidates both representatives
    /// as they stood before the union (one of them won't be a
    /// representative any more; the other's membership just grew), so
    /// the next query rebuilds from scratch rather than reading a
    /// trie that no longer reflects the union. Returns `true` iff the
    /// classes were previously distinct.
    pub fn insert(&self, x: i32, y: i32) -> Result<bool> {
        let before_x = self.classes.find(x)?;
        let before_y = self.classes.find(y)?;
        let merged = self.classes.union(x, y)?;
        if merged {
            let mut tries = self.tries.write().expect("binrel poisoned");
            tries.remove(&before_x);
            tries.remove(&before_y);
        }
        Ok(merged)
    }

    /// `element`'s class trie, rebuilding it first if necessary. Does
    /// not require `element` to itself be a representative.
    fn representative_trie(&self, element: i32) -> Result<Arc<Trie>> {
        let rep = self.classes.find(element)?;
        {
            let tries = self.tries.read().expect("binrel poisoned");
            if let Some(Some(trie)) = tries.get(&rep) {
                return Ok(Arc::clone(trie));
            }
        }
        self.generate_trie_if_none(rep)
    }

    /// Rebuild `rep`'s members trie from current disjoint-set
    /// membership if it is missing or invalidated. Holds the write
    /// lock for the whole rebuild so a concurrent invalidation can't
    /// interleave with it (see DESIGN.md's Open Question decisions).
    fn generate_trie_if_none(&self, rep: i32) -> Result<Arc<Trie>> {
        let mut tries = self.tries.write().expect("binrel poisoned");
        if let Some(Some(trie)) = tries.get(&rep) {
            return Ok(Arc::clone(trie));
        }
        let members = self.classes.members_of(rep)?;
        let built = Trie::new(1);
        for m in members {
            built.insert(&[m]);
        }
        let built = Arc::new(built);
        tries.insert(rep, Some(Arc::clone(&built)));
        Ok(built)
    }

    /// `true` iff `x` and `y` are in the same class. Checked directly
    /// against the disjoint-set forest; never touches a trie.
    pub fn contains(&self, x: i32, y: i32) -> Result<bool> {
        Ok(self.classes.find(x)? == self.classes.find(y)?)
    }

    /// Sum of `|class|^2` over every class, matching the pair-counting
    /// semantics of an equivalence relation's extension. Computed
    /// straight from the disjoint-set's class sizes, not from any
    /// cached trie.
    pub fn size(&self) -> Result<usize> {
        let mut total = 0usize;
        for rep in self.classes.representatives()? {
            let n = self.classes.members_of(rep)?.len();
            total += n * n;
        }
        Ok(total)
    }

    /// Every `(x, y)` pair in the relation (spec.md §4.8's "full
    /// scan"), class by class in ascending representative order.
    pub fn iter(&self) -> Result<Vec<[i32; 2]>> {
        let mut reps = self.classes.representatives()?;
        reps.sort_unstable();
        let mut out = Vec::new();
        for rep in reps {
            let trie = self.representative_trie(rep)?;
            out.extend(pairs_of(&members_sorted(&trie)));
        }
        Ok(out)
    }

    /// Every pair `>= (x, y)`, spec.md §4.8's "find at" flavor.
    pub fn find(&self, x: i32, y: i32) -> Result<Vec<[i32; 2]>> {
        Ok(self.iter()?.into_iter().filter(|p| *p >= [x, y]).collect())
    }

    /// Every pair in the inclusive range `[start, end]`, spec.md
    /// §4.8's "find between" flavor.
    pub fn find_between(&self, start: [i32; 2], end: [i32; 2]) -> Result<Vec<[i32; 2]>> {
        Ok(self.iter()?.into_iter().filter(|p| *p >= start && *p <= end).collect())
    }

    /// Every `(x, y)` pair within the single class containing
    /// `element`, spec.md §4.8's "closure of representative" flavor.
    pub fn closure(&self, element: i32) -> Result<Vec<[i32; 2]>> {
        let rep = self.classes.find(element)?;
        let trie = self.representative_trie(rep)?;
        Ok(pairs_of(&members_sorted(&trie)).collect())
    }

    /// Every `(f, m)` pair for `f` in `fronts` and `m` any member of
    /// the single class containing every element of `fronts` — spec.md
    /// §4.8's "front product" flavor. `fronts` must all share one
    /// class, matching the original's same restriction.
    pub fn front_product(&self, fronts: &[i32]) -> Result<Vec<[i32; 2]>> {
        let Some((&first, rest)) = fronts.split_first() else {
            return Ok(Vec::new());
        };
        let rep = self.classes.find(first)?;
        for &f in rest {
            if self.classes.find(f)? != rep {
                return err_at!(
                    InvariantViolation,
                    msg: "front_product elements must share one class: {} and {} don't",
                    first,
                    f
                );
            }
        }
        let trie = self.representative_trie(rep)?;
        let members = members_sorted(&trie);
        let mut out = Vec::with_capacity(fronts.len() * members.len());
        for &f in fronts {
            for &m in &members {
                out.push([f, m]);
            }
        }
        Ok(out)
    }

    /// Split the relation's pairs into up to `k` roughly-equal
    /// sub-iterators, spec.md §4.8's "Partition" bullet. A class whose
    /// `n^2` pairs fit in one chunk is emitted whole via [Self::closure];
    /// a larger class is sliced by accumulating members into a
    /// `fronts` list (via [Self::front_product]) until the slice's
    /// pair count reaches the target chunk size.
    pub fn partition(&self, k: usize) -> Result<Vec<Vec<[i32; 2]>>> {
        let total = self.size()?;
        if k <= 1 || total == 0 {
            return Ok(vec![self.iter()?]);
        }
        let chunk_size = (total + k - 1) / k;
        let mut chunks = Vec::new();
        let mut reps = self.classes.representatives()?;
        reps.sort_unstable();
        for rep in reps {
            let mut members = self.classes.members_of(rep)?;
            members.sort_unstable();
            let class_size = members.len();
            if class_size * class_size <= chunk_size {
                chunks.push(self.closure(rep)?);
                continue;
            }
            let mut fronts = Vec::new();
            let mut acc = 0usize;
            for m in members {
                fronts.push(m);
                acc += class_size;
                if acc >= chunk_size {
                    chunks.push(self.front_product(&fronts)?);
                    fronts.clear();
                    acc = 0;
                }
            }
            if !fronts.is_empty() {
                chunks.push(self.front_product(&fronts)?);
            }
        }
        Ok(chunks)
    }
}

fn members_sorted(trie: &Trie) -> Vec<i32> {
    let mut members: Vec<i32> = trie.iter().map(|t| t[0]).collect();
    members.sort_unstable();
    members
}

/// Lazily nest two passes over the same members list into the class's
/// full pair set — the Rust-iterator-combinator shape of the
/// original's paired `frontIter`/`backIter` cursors over one trie.
fn pairs_of(members: &[i32]) -> impl Iterator<Item = [i32; 2]> + '_ {
    members.iter().flat_map(move |&f| members.iter().map(move |&b| [f, b]))
}

#[cfg(test)]
mod binrel_test {
    use super::*;

    #[test]
    fn test_equivalence_scenario() {
        // spec.md §8 scenario 4.
        let rel = BinaryEquivalenceRelation::new();
        rel.insert(1, 2).unwrap();
        rel.insert(2, 3).unwrap();
        rel.insert(10, 11).unwrap();

        assert!(rel.contains(1, 3).unwrap());
        assert!(!rel.contains(1, 10).unwrap());
        assert_eq!(rel.size().unwrap(), 9 + 4);

        let mut front = rel.front_product(&[1]).unwrap();
        front.sort();
        assert_eq!(front, vec![[1, 1], [1, 2], [1, 3]]);
    }

    #[test]
    fn test_singleton_class() {
        let rel = BinaryEquivalenceRelation::new();
        rel.insert(5, 5).unwrap();
        assert!(rel.contains(5, 5).unwrap());
        assert_eq!(rel.size().unwrap(), 1);
    }

    #[test]
    fn test_closure_and_full_scan_agree() {
        let rel = BinaryEquivalenceRelation::new();
        rel.insert(1, 2).unwrap();
        rel.insert(2, 3).unwrap();
        rel.insert(7, 8).unwrap();

        let mut closure_1 = rel.closure(1).unwrap();
        closure_1.sort();
        assert_eq!(closure_1, vec![[1, 1], [1, 2], [1, 3], [2, 1], [2, 2], [2, 3], [3, 1], [3, 2], [3, 3]]);

        let all = rel.iter().unwrap();
        assert_eq!(all.len(), rel.size().unwrap());
        assert!(closure_1.iter().all(|p| all.contains(p)));
    }

    #[test]
    fn test_find_and_find_between() {
        let rel = BinaryEquivalenceRelation::new();
        rel.insert(1, 2).unwrap();
        rel.insert(2, 3).unwrap();

        let at_least_2_2 = rel.find(2, 2).unwrap();
        assert!(at_least_2_2.iter().all(|p| *p >= [2, 2]));
        assert!(at_least_2_2.contains(&[2, 2]));

        let between = rel.find_between([1, 2], [2, 1]).unwrap();
        assert!(between.iter().all(|p| *p >= [1, 2] && *p <= [2, 1]));
        assert!(between.contains(&[1, 2]));
        assert!(!between.contains(&[1, 1]));
    }

    #[test]
    fn test_front_product_rejects_mixed_classes() {
        let rel = BinaryEquivalenceRelation::new();
        rel.insert(1, 2).unwrap();
        rel.insert(10, 11).unwrap();
        assert!(rel.front_product(&[1, 10]).is_err());
    }

    #[test]
    fn test_partition_covers_all_pairs() {
        let rel = BinaryEquivalenceRelation::new();
        for i in 0..10 {
            rel.insert(0, i).unwrap();
        }
        rel.insert(100, 101).unwrap();

        let chunks = rel.partition(3).unwrap();
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert_eq!(total, rel.size().unwrap());
    }

    #[test]
    fn test_insert_invalidates_stale_cache() {
        let rel = BinaryEquivalenceRelation::new();
        rel.insert(1, 2).unwrap();
        // Force a rebuild so a cached trie exists before the class grows.
        assert_eq!(rel.closure(1).unwrap().len(), 4);
        rel.insert(2, 3).unwrap();
        assert_eq!(rel.closure(1).unwrap().len(), 9);
    }
}
