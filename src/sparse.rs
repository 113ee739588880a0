//! A sparse multi-dimensional array built from nested binary trees.
//!
//! Values are addressed by a *path* of keys. Each path component selects a
//! cell in one level's tree; a cell can hold a value, a sub-array for the
//! next dimension, or both at once, so `["a"]` and `["a", "b"]` are
//! independent slots. Only the cells actually touched are allocated, which
//! is what makes the array sparse.

extern crate alloc;

use core::cmp::Ordering;
use core::fmt;

use alloc::boxed::Box;

use crate::node::Node;
use crate::tree::{BaseInserted, BinTree, KeyPolicy};

struct Cell<K, V> {
    value: Option<V>,
    sub: Option<SparseArray<K, V>>,
}

impl<K, V> Cell<K, V> {
    fn empty() -> Cell<K, V> {
        Cell {
            value: None,
            sub: None,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Cell<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("value", &self.value)
            .field("sub", &self.sub)
            .finish()
    }
}

/// A path-addressed sparse array of arbitrary dimension.
pub struct SparseArray<K, V> {
    tree: BinTree<K, Cell<K, V>>,
}

impl<K: Ord, V> SparseArray<K, V> {
    /// Creates an empty array ordered by `K`'s natural order.
    pub fn new() -> SparseArray<K, V> {
        SparseArray {
            tree: BinTree::new(KeyPolicy::Reject),
        }
    }
}

impl<K, V> SparseArray<K, V> {
    /// Creates an empty array ordered by an explicit comparison function.
    ///
    /// Every dimension of the array uses the same comparator.
    pub fn with_comparator(cmp: fn(&K, &K) -> Ordering) -> SparseArray<K, V> {
        SparseArray {
            tree: BinTree::with_comparator(cmp, KeyPolicy::Reject),
        }
    }

    /// Number of cells at this level only.
    #[inline]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// `true` if this level holds no cells.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Number of values stored at every depth below this level.
    pub fn total_values(&self) -> usize {
        self.tree
            .iter()
            .map(|n| {
                let cell = n.value();
                usize::from(cell.value.is_some())
                    + cell.sub.as_ref().map_or(0, SparseArray::total_values)
            })
            .sum()
    }

    /// Stores `value` at `path`, returning the value it displaced.
    ///
    /// Missing cells along the path are created on the way down. An empty
    /// path addresses nothing; the value is dropped and `None` returned.
    pub fn set(&mut self, path: &[K], value: V) -> Option<V>
    where
        K: Clone,
    {
        let (first, rest) = path.split_first()?;
        let cmp = self.tree.comparator();
        // One descent: probe with an empty cell and keep whichever node ends
        // up holding the key. The tree rejects duplicates, so an existing
        // cell comes back untouched through the error path.
        let probe = Box::new(Node::new(first.clone(), Cell::empty()));
        let mut node = match self.tree.base_insert(probe) {
            Ok(BaseInserted::Linked(np)) | Ok(BaseInserted::Replaced(_, np)) => np,
            Err(dup) => dup.existing,
        };
        // SAFETY: the node is owned by `tree`; `&mut self` is exclusive.
        let cell = unsafe { node.as_mut() }.value_mut();
        if rest.is_empty() {
            cell.value.replace(value)
        } else {
            cell.sub
                .get_or_insert_with(|| SparseArray::with_comparator(cmp))
                .set(rest, value)
        }
    }

    /// The value at `path`, if one was stored there.
    pub fn get(&self, path: &[K]) -> Option<&V> {
        let (first, rest) = path.split_first()?;
        let node = self.tree.find_raw(first)?;
        // SAFETY: the node is owned by `tree` and lives as long as `&self`.
        let cell = unsafe { node.as_ref() }.value();
        if rest.is_empty() {
            cell.value.as_ref()
        } else {
            cell.sub.as_ref()?.get(rest)
        }
    }

    /// Mutable access to the value at `path`.
    pub fn get_mut(&mut self, path: &[K]) -> Option<&mut V> {
        let (first, rest) = path.split_first()?;
        let mut node = self.tree.find_raw(first)?;
        // SAFETY: the node is owned by `tree`; `&mut self` is exclusive.
        let cell = unsafe { node.as_mut() }.value_mut();
        if rest.is_empty() {
            cell.value.as_mut()
        } else {
            cell.sub.as_mut()?.get_mut(rest)
        }
    }

    /// Removes and returns the value at `path`.
    ///
    /// Cells left holding neither a value nor a sub-array are pruned, all
    /// the way back up the path.
    pub fn remove(&mut self, path: &[K]) -> Option<V> {
        let (first, rest) = path.split_first()?;
        let mut node = self.tree.find_raw(first)?;
        // SAFETY: the node is owned by `tree`; `&mut self` is exclusive.
        let cell = unsafe { node.as_mut() }.value_mut();
        let out = if rest.is_empty() {
            cell.value.take()
        } else {
            let sub = cell.sub.as_mut()?;
            let v = sub.remove(rest)?;
            if sub.is_empty() {
                cell.sub = None;
            }
            Some(v)
        };
        if out.is_some() && cell.value.is_none() && cell.sub.is_none() {
            // SAFETY: the handle came from this tree's lookup just above.
            let _ = unsafe { self.tree.remove_node(node) };
        }
        out
    }

    /// Detaches and returns the sub-array at `path`.
    ///
    /// Every value beneath `path` leaves with it; the detached array is a
    /// self-contained `SparseArray`. Cells emptied by the detachment are
    /// pruned just as in [`SparseArray::remove`].
    pub fn remove_subarray(&mut self, path: &[K]) -> Option<SparseArray<K, V>> {
        let (first, rest) = path.split_first()?;
        let mut node = self.tree.find_raw(first)?;
        // SAFETY: the node is owned by `tree`; `&mut self` is exclusive.
        let cell = unsafe { node.as_mut() }.value_mut();
        let out = if rest.is_empty() {
            cell.sub.take()
        } else {
            let sub = cell.sub.as_mut()?;
            let detached = sub.remove_subarray(rest)?;
            if sub.is_empty() {
                cell.sub = None;
            }
            Some(detached)
        };
        if out.is_some() && cell.value.is_none() && cell.sub.is_none() {
            // SAFETY: the handle came from this tree's lookup just above.
            let _ = unsafe { self.tree.remove_node(node) };
        }
        out
    }

    /// The sub-array rooted at `path`, if one exists.
    pub fn subarray(&self, path: &[K]) -> Option<&SparseArray<K, V>> {
        let (first, rest) = path.split_first()?;
        let node = self.tree.find_raw(first)?;
        // SAFETY: the node is owned by `tree` and lives as long as `&self`.
        let sub = unsafe { node.as_ref() }.value().sub.as_ref()?;
        if rest.is_empty() {
            Some(sub)
        } else {
            sub.subarray(rest)
        }
    }

    /// The keys present at this level, in comparator order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.tree.iter().map(Node::key)
    }

    /// Drops every cell at this level and below.
    pub fn clear(&mut self) {
        self.tree.clear();
    }
}

impl<K: Ord, V> Default for SparseArray<K, V> {
    fn default() -> SparseArray<K, V> {
        SparseArray::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for SparseArray<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.tree.iter().map(|n| (n.key(), n.value())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec::Vec;

    use super::*;

    #[test]
    fn set_and_get_across_depths() {
        let mut arr: SparseArray<&str, i32> = SparseArray::new();
        assert_eq!(arr.set(&["x"], 1), None);
        assert_eq!(arr.set(&["a", "b"], 2), None);
        assert_eq!(arr.set(&["a", "b", "c"], 3), None);
        assert_eq!(arr.get(&["x"]), Some(&1));
        assert_eq!(arr.get(&["a", "b"]), Some(&2));
        assert_eq!(arr.get(&["a", "b", "c"]), Some(&3));
        assert_eq!(arr.get(&["a"]), None);
        assert_eq!(arr.get(&["a", "z"]), None);
        assert_eq!(arr.total_values(), 3);
    }

    #[test]
    fn set_replaces_and_returns_old_value() {
        let mut arr: SparseArray<i32, &str> = SparseArray::new();
        assert_eq!(arr.set(&[1, 2], "old"), None);
        assert_eq!(arr.set(&[1, 2], "new"), Some("old"));
        assert_eq!(arr.get(&[1, 2]), Some(&"new"));
        assert_eq!(arr.total_values(), 1);
    }

    #[test]
    fn set_over_occupied_cell_reuses_it() {
        let mut arr: SparseArray<&str, i32> = SparseArray::new();
        arr.set(&["a"], 1);
        arr.set(&["a", "b"], 2);
        // Both slots ride the same cell; writing either again must keep
        // the other intact.
        assert_eq!(arr.set(&["a"], 10), Some(1));
        assert_eq!(arr.set(&["a", "b"], 20), Some(2));
        assert_eq!(arr.get(&["a"]), Some(&10));
        assert_eq!(arr.get(&["a", "b"]), Some(&20));
        assert_eq!(arr.len(), 1);
    }

    #[test]
    fn value_and_subarray_share_a_cell() {
        let mut arr: SparseArray<&str, i32> = SparseArray::new();
        arr.set(&["a"], 1);
        arr.set(&["a", "b"], 2);
        assert_eq!(arr.get(&["a"]), Some(&1));
        assert_eq!(arr.get(&["a", "b"]), Some(&2));

        // removing the value keeps the sub-array alive
        assert_eq!(arr.remove(&["a"]), Some(1));
        assert_eq!(arr.get(&["a", "b"]), Some(&2));
        assert_eq!(arr.len(), 1);
    }

    #[test]
    fn remove_prunes_empty_cells_up_the_path() {
        let mut arr: SparseArray<&str, i32> = SparseArray::new();
        arr.set(&["a", "b", "c"], 1);
        arr.set(&["a", "x"], 2);

        assert_eq!(arr.remove(&["a", "b", "c"]), Some(1));
        // "b" was left empty and is gone, "a" still carries "x"
        let level: Vec<&str> = arr.subarray(&["a"]).unwrap().keys().copied().collect();
        assert_eq!(level, ["x"]);

        assert_eq!(arr.remove(&["a", "x"]), Some(2));
        assert!(arr.is_empty());
    }

    #[test]
    fn remove_misses_change_nothing() {
        let mut arr: SparseArray<&str, i32> = SparseArray::new();
        arr.set(&["a", "b"], 1);
        assert_eq!(arr.remove(&["z"]), None);
        assert_eq!(arr.remove(&["a"]), None);
        assert_eq!(arr.remove(&["a", "z"]), None);
        assert_eq!(arr.remove(&[]), None);
        assert_eq!(arr.get(&["a", "b"]), Some(&1));
        assert_eq!(arr.len(), 1);
    }

    #[test]
    fn subarray_navigation() {
        let mut arr: SparseArray<i32, i32> = SparseArray::new();
        for (a, b) in [(1, 10), (1, 20), (2, 10)] {
            arr.set(&[a, b], a * 100 + b);
        }
        let sub = arr.subarray(&[1]).unwrap();
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.get(&[20]), Some(&120));
        assert!(arr.subarray(&[3]).is_none());
        assert!(arr.subarray(&[2, 10]).is_none());
    }

    #[test]
    fn remove_subarray_detaches_everything_beneath() {
        let mut arr: SparseArray<&str, i32> = SparseArray::new();
        arr.set(&["a", "b", "c"], 1);
        arr.set(&["a", "b", "d"], 2);
        arr.set(&["a", "x"], 3);

        let detached = arr.remove_subarray(&["a", "b"]).unwrap();
        assert_eq!(detached.total_values(), 2);
        assert_eq!(detached.get(&["c"]), Some(&1));
        assert_eq!(detached.get(&["d"]), Some(&2));

        assert_eq!(arr.get(&["a", "b", "c"]), None);
        assert_eq!(arr.get(&["a", "x"]), Some(&3));
        assert_eq!(arr.total_values(), 1);

        // detaching the last branch prunes "a" itself
        arr.remove(&["a", "x"]);
        assert!(arr.is_empty());
        assert!(arr.remove_subarray(&["a"]).is_none());
    }

    #[test]
    fn keys_come_out_in_order() {
        let mut arr: SparseArray<i32, ()> = SparseArray::new();
        for k in [5, 1, 9, 3] {
            arr.set(&[k], ());
        }
        let keys: Vec<i32> = arr.keys().copied().collect();
        assert_eq!(keys, [1, 3, 5, 9]);
    }

    #[test]
    fn get_mut_edits_in_place() {
        let mut arr: SparseArray<&str, i32> = SparseArray::new();
        arr.set(&["a", "b"], 1);
        *arr.get_mut(&["a", "b"]).unwrap() += 41;
        assert_eq!(arr.get(&["a", "b"]), Some(&42));
    }

    #[test]
    fn clear_drops_all_levels() {
        let mut arr: SparseArray<i32, i32> = SparseArray::new();
        for i in 0..10 {
            arr.set(&[i % 3, i], i);
        }
        arr.clear();
        assert!(arr.is_empty());
        assert_eq!(arr.total_values(), 0);
        arr.set(&[1], 1);
        assert_eq!(arr.total_values(), 1);
    }
}
