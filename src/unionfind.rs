//! Disjoint-set forests: a dense, array-backed union-find over `u32`
//! node ids, and a sparse wrapper bijecting arbitrary `i32` elements to
//! those ids. See spec.md §4.6.
//!
//! Grounded on `original_source/src/UnionFind.h`: each node is a single
//! packed 64-bit word (`parent` in the high 32 bits, `rank` in the
//! low 32), stored in a [crate::sync::BlockList] so growth never moves
//! existing nodes. `find` does path-halving via `compare_exchange`
//! loops rather than a recursive rewrite, and `union` breaks rank ties
//! by favoring the higher node id, both to keep the operation
//! lock-free.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::error::err_at;
use crate::sync::BlockList;
use crate::Result;

fn pack(parent: u32, rank: u32) -> u64 {
    (u64::from(parent) << 32) | u64::from(rank)
}

fn unpack(word: u64) -> (u32, u32) {
    ((word >> 32) as u32, word as u32)
}

/// Dense union-find over node ids `0..size()`. Every node starts as
/// its own representative with rank 0.
pub struct UnionFind {
    nodes: RwLock<Vec<AtomicU64>>,
}

impl Default for UnionFind {
    fn default() -> Self {
        UnionFind::new()
    }
}

impl UnionFind {
    pub fn new() -> UnionFind {
        UnionFind {
            nodes: RwLock::new(Vec::new()),
        }
    }

    pub fn size(&self) -> usize {
        self.nodes.read().expect("unionfind poisoned").len()
    }

    /// Allocate a fresh node, its own representative. Returns the new
    /// node's id.
    pub fn make_node(&self) -> Result<u32> {
        let mut nodes = self.nodes.write().expect("unionfind poisoned");
        let id = nodes.len();
        if id > u32::MAX as usize {
            return err_at!(CapacityExhausted, msg: "union-find cannot exceed {} nodes", u32::MAX);
        }
        nodes.push(AtomicU64::new(pack(id as u32, 0)));
        Ok(id as u32)
    }

    /// Find the representative of `x`, path-halving along the way:
    /// every node visited is re-pointed at its grandparent via CAS, so
    /// repeated finds on the same chain flatten it over time without
    /// any node ever holding an exclusive lock.
    pub fn find(&self, x: u32) -> u32 {
        let nodes = self.nodes.read().expect("unionfind poisoned");
        let mut cur = x;
        loop {
            let word = nodes[cur as usize].load(Ordering::Acquire);
            let (parent, rank) = unpack(word);
            if parent == cur {
                return cur;
            }
            let grandparent_word = nodes[parent as usize].load(Ordering::Acquire);
            let (grandparent, _) = unpack(grandparent_word);
            if grandparent != parent {
                let _ = nodes[cur as usize].compare_exchange(
                    word,
                    pack(grandparent, rank),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                );
            }
            cur = parent;
        }
    }

    /// Union the classes containing `x` and `y`. Ties in rank are
    /// broken by attaching the lower id under the higher, matching the
    /// original's tie-break rule. Returns `true` iff the classes were
    /// previously distinct.
    pub fn union(&self, x: u32, y: u32) -> bool {
        loop {
            let rx = self.find(x);
            let ry = self.find(y);
            if rx == ry {
                return false;
            }
            let nodes = self.nodes.read().expect("unionfind poisoned");
            let wx = nodes[rx as usize].load(Ordering::Acquire);
            let wy = nodes[ry as usize].load(Ordering::Acquire);
            let (_, rank_x) = unpack(wx);
            let (_, rank_y) = unpack(wy);

            // Tie-break by favoring the higher id as the new root, per
            // the original's rule.
            let (small, small_word, large) = if rank_x < rank_y || (rank_x == rank_y && rx < ry) {
                (rx, wx, ry)
            } else {
                (ry, wy, rx)
            };

            if nodes[small as usize]
                .compare_exchange(small_word, pack(large, rank_x.min(rank_y)), Ordering::AcqRel, Ordering::Relaxed)
                .is_err()
            {
                continue;
            }
            if rank_x == rank_y {
                let large_word_now = nodes[large as usize].load(Ordering::Acquire);
                let (large_parent, large_rank) = unpack(large_word_now);
                let _ = nodes[large as usize].compare_exchange(
                    large_word_now,
                    pack(large_parent, large_rank + 1),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                );
            }
            log::trace!("unionfind: merged node {} under representative {}", small, large);
            return true;
        }
    }

    /// Every node mapped to its current representative.
    pub fn find_all(&self) -> Vec<u32> {
        (0..self.size() as u32).map(|x| self.find(x)).collect()
    }

    /// Group node ids by representative.
    pub fn gen_map(&self) -> HashMap<u32, Vec<u32>> {
        let mut map: HashMap<u32, Vec<u32>> = HashMap::new();
        for x in 0..self.size() as u32 {
            map.entry(self.find(x)).or_default().push(x);
        }
        map
    }

    pub fn clear(&self) {
        self.nodes.write().expect("unionfind poisoned").clear();
    }
}

/// A disjoint-set over arbitrary `i32` elements, bijected to dense
/// node ids on first sight. Grounded on the same original header's
/// `SparseDisjointSet` wrapper.
pub struct SparseDisjointSet {
    dense: UnionFind,
    to_node: RwLock<HashMap<i32, u32>>,
    to_element: BlockList<i32>,
}

impl Default for SparseDisjointSet {
    fn default() -> Self {
        SparseDisjointSet::new()
    }
}

impl SparseDisjointSet {
    pub fn new() -> SparseDisjointSet {
        SparseDisjointSet {
            dense: UnionFind::new(),
            to_node: RwLock::new(HashMap::new()),
            to_element: BlockList::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.dense.size()
    }

    /// Map `element` to a node id, allocating one if this is the first
    /// time it's been seen.
    pub fn node_of(&self, element: i32) -> Result<u32> {
        if let Some(&id) = self.to_node.read().expect("unionfind poisoned").get(&element) {
            return Ok(id);
        }
        let mut to_node = self.to_node.write().expect("unionfind poisoned");
        if let Some(&id) = to_node.get(&element) {
            return Ok(id);
        }
        let id = self.dense.make_node()?;
        self.to_element.append(element);
        to_node.insert(element, id);
        Ok(id)
    }

    pub fn find(&self, element: i32) -> Result<i32> {
        let node = self.node_of(element)?;
        let rep_node = self.dense.find(node);
        self.to_element.get(rep_node as usize)
    }

    pub fn union(&self, x: i32, y: i32) -> Result<bool> {
        let nx = self.node_of(x)?;
        let ny = self.node_of(y)?;
        Ok(self.dense.union(nx, ny))
    }

    /// The distinct representative elements across every known class.
    pub fn representatives(&self) -> Result<Vec<i32>> {
        let mut seen = std::collections::HashSet::new();
        for &node in self.to_node.read().expect("unionfind poisoned").values() {
            let rep_node = self.dense.find(node);
            seen.insert(self.to_element.get(rep_node as usize)?);
        }
        Ok(seen.into_iter().collect())
    }

    /// Every element whose class representative is `rep_element`.
    pub fn members_of(&self, rep_element: i32) -> Result<Vec<i32>> {
        let rep_node = self.dense.find(self.node_of(rep_element)?);
        let mut members = Vec::new();
        for (&element, &node) in self.to_node.read().expect("unionfind poisoned").iter() {
            if self.dense.find(node) == rep_node {
                members.push(element);
            }
        }
        Ok(members)
    }

    pub fn clear(&self) {
        self.dense.clear();
        self.to_node.write().expect("unionfind poisoned").clear();
        self.to_element.clear();
    }
}

#[cfg(test)]
mod unionfind_test {
    use super::*;

    #[test]
    fn test_union_find_scenario() {
        // spec.md §8 scenario 3.
        let uf = UnionFind::new();
        for _ in 0..6 {
            uf.make_node().unwrap();
        }
        assert!(uf.union(0, 1));
        assert!(uf.union(1, 2));
        assert!(!uf.union(0, 2));
        assert!(uf.union(3, 4));

        assert_eq!(uf.find(0), uf.find(2));
        assert_ne!(uf.find(0), uf.find(3));
        assert_eq!(uf.find(3), uf.find(4));
        assert_ne!(uf.find(5), uf.find(0));
    }

    #[test]
    fn test_sparse_disjoint_set() {
        let ds = SparseDisjointSet::new();
        ds.union(10, 20).unwrap();
        ds.union(20, 30).unwrap();
        assert_eq!(ds.find(10).unwrap(), ds.find(30).unwrap());
        assert_ne!(ds.find(10).unwrap(), ds.find(99).unwrap());
    }

    #[test]
    fn test_concurrent_union() {
        use std::sync::Arc;
        let uf = Arc::new(UnionFind::new());
        for _ in 0..1000 {
            uf.make_node().unwrap();
        }
        let mut handles = vec![];
        for t in 0..4 {
            let uf = Arc::clone(&uf);
            handles.push(std::thread::spawn(move || {
                for i in 0..250 {
                    let a = t * 250 + i;
                    let b = (a + 1) % 1000;
                    uf.union(a as u32, b as u32);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let rep = uf.find(0);
        for x in 0..1000u32 {
            assert_eq!(uf.find(x), rep);
        }
    }
}
