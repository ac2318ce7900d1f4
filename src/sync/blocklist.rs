//! Chunked, append-only arena with O(1) indexed access.
//!
//! Grounded on `original_source/src/BlockList.h`: two-level addressing
//! splits an index into a block number (high bits) and an offset
//! within the block (low `BLOCKBITS` bits), so growth never moves
//! previously appended elements — every returned index and reference
//! is stable for the arena's lifetime, which is what lets
//! [crate::relation] secondary indices hold raw master-storage
//! offsets across concurrent inserts.
//!
//! Appending takes a [crate::sync::SpinLock]; reads are lock-free so
//! long as the caller upholds the "no concurrent `clear` during
//! iteration" rule from spec.md §5.

use std::sync::RwLock;

use crate::{error::err_at, Result};

const BLOCKBITS: u32 = 10;
const BLOCKSIZE: usize = 1 << BLOCKBITS;
const BLOCKMASK: usize = BLOCKSIZE - 1;

/// Append-only chunked arena. `T` values are never moved once
/// appended: each block is a `Vec<T>` allocated at push time and
/// never reallocated.
pub struct BlockList<T> {
    blocks: RwLock<Vec<Box<[T; BLOCKSIZE]>>>,
    len: std::sync::atomic::AtomicUsize,
    append_lock: crate::sync::SpinLock<()>,
}

impl<T> Default for BlockList<T>
where
    T: Default + Copy,
{
    fn default() -> Self {
        BlockList::new()
    }
}

impl<T> BlockList<T>
where
    T: Default + Copy,
{
    pub fn new() -> BlockList<T> {
        BlockList {
            blocks: RwLock::new(Vec::new()),
            len: std::sync::atomic::AtomicUsize::new(0),
            append_lock: crate::sync::SpinLock::new(()),
        }
    }

    pub fn len(&self) -> usize {
        self.len.load(std::sync::atomic::Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a value, returning its stable index.
    pub fn append(&self, value: T) -> usize {
        let _guard = self.append_lock.lock();
        let len = self.len();
        let blocknum = len >> BLOCKBITS;
        {
            let blocks = self.blocks.read().expect("BlockList poisoned");
            if blocknum >= blocks.len() {
                drop(blocks);
                let mut blocks = self.blocks.write().expect("BlockList poisoned");
                while blocknum >= blocks.len() {
                    blocks.push(Box::new([T::default(); BLOCKSIZE]));
                }
            }
        }
        {
            let mut blocks = self.blocks.write().expect("BlockList poisoned");
            blocks[blocknum][len & BLOCKMASK] = value;
        }
        self.len.fetch_add(1, std::sync::atomic::Ordering::AcqRel);
        len
    }

    pub fn get(&self, index: usize) -> Result<T> {
        if index >= self.len() {
            return err_at!(
                RangeCheck,
                msg: "BlockList index {} out of range, len={}",
                index,
                self.len()
            );
        }
        let blocknum = index >> BLOCKBITS;
        let blocks = self.blocks.read().expect("BlockList poisoned");
        Ok(blocks[blocknum][index & BLOCKMASK])
    }

    /// Reset the arena to empty, freeing all blocks. Caller must
    /// ensure no concurrent readers or appenders, per spec.md §5
    /// ("`clear` is exclusive").
    pub fn clear(&self) {
        let _guard = self.append_lock.lock();
        self.blocks.write().expect("BlockList poisoned").clear();
        self.len.store(0, std::sync::atomic::Ordering::Release);
    }

    /// Snapshot iteration over `0..len()`, in append order, walking
    /// block boundaries transparently.
    pub fn iter(&self) -> BlockListIter<'_, T> {
        BlockListIter {
            list: self,
            pos: 0,
            end: self.len(),
        }
    }
}

pub struct BlockListIter<'a, T> {
    list: &'a BlockList<T>,
    pos: usize,
    end: usize,
}

impl<'a, T> Iterator for BlockListIter<'a, T>
where
    T: Default + Copy,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.pos >= self.end {
            return None;
        }
        let v = self.list.get(self.pos).ok()?;
        self.pos += 1;
        Some(v)
    }
}

#[cfg(test)]
mod blocklist_test {
    use super::*;

    #[test]
    fn test_append_get() {
        let list: BlockList<i64> = BlockList::new();
        for i in 0..3000i64 {
            let idx = list.append(i);
            assert_eq!(idx as i64, i);
        }
        assert_eq!(list.len(), 3000);
        for i in 0..3000i64 {
            assert_eq!(list.get(i as usize).unwrap(), i);
        }
        assert!(list.get(3000).is_err());
    }

    #[test]
    fn test_clear_resets() {
        let list: BlockList<i64> = BlockList::new();
        list.append(1);
        list.append(2);
        list.clear();
        assert_eq!(list.len(), 0);
        assert!(list.get(0).is_err());
    }

    #[test]
    fn test_iter_matches_append_order() {
        let list: BlockList<i64> = BlockList::new();
        for i in 0..2500i64 {
            list.append(i);
        }
        let collected: Vec<i64> = list.iter().collect();
        let expected: Vec<i64> = (0..2500).collect();
        assert_eq!(collected, expected);
    }

    #[test]
    fn test_concurrent_append() {
        use std::sync::Arc;
        let list = Arc::new(BlockList::<i64>::new());
        let mut handles = vec![];
        for t in 0..8 {
            let list = Arc::clone(&list);
            handles.push(std::thread::spawn(move || {
                for i in 0..500i64 {
                    list.append(t * 1000 + i);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(list.len(), 4000);
    }
}
