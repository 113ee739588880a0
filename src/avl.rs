//! AVL height balancing.
//!
//! The [`Avl`] discipline keeps every node's subtrees within one level of
//! each other. The per-node balance state lives in the node's `lean` field,
//! which reuses [`Dir`]: `Left` and `Right` mean taller on that side, `Up`
//! means even. Inserts repair upward from the new node and stop as soon as a
//! subtree's height is unchanged; removals repair upward from the splice
//! point and stop on the same condition. Both repairs perform at most a
//! handful of pointer writes per level and never recurse.

extern crate alloc;

use alloc::boxed::Box;
use core::ptr::NonNull;

use crate::node::{Dir, Node};
use crate::tree::{
    lean_of, link_of, set_lean, set_link, set_side, side_of, Balancer, BaseInserted, DuplicateKey,
    Inserted, Tree,
};

/// The AVL discipline marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct Avl;

/// A height-balanced binary search tree.
pub type AvlTree<K, V> = Tree<K, V, Avl>;

impl Balancer for Avl {
    fn insert<K, V>(
        tree: &mut Tree<K, V, Self>,
        node: Box<Node<K, V>>,
    ) -> Result<Inserted<K, V>, DuplicateKey<K, V>> {
        match tree.base_insert(node)? {
            BaseInserted::Linked(np) => {
                // SAFETY: `np` was just linked into `tree`.
                unsafe { rebalance_insert(tree, np) };
                Ok(Inserted::Linked)
            }
            // An overwrite splices into the old node's exact position, so
            // heights are untouched and no repair is needed.
            BaseInserted::Replaced(old, _) => Ok(Inserted::Replaced(old)),
        }
    }

    unsafe fn remove<K, V>(
        tree: &mut Tree<K, V, Self>,
        node: NonNull<Node<K, V>>,
    ) -> Box<Node<K, V>> {
        // SAFETY: contract forwarded from the caller.
        let (dead, shrunk_at) = unsafe { tree.base_remove(node) };
        if let Some((parent, side)) = shrunk_at {
            // SAFETY: `parent` is still owned by `tree`.
            unsafe { rebalance_remove(tree, parent, side) };
        }
        dead
    }
}

/// Rotates the subtree rooted at `r` toward `way`, promoting the child on
/// the opposite side. Returns the new subtree root. Lean fields are the
/// caller's responsibility.
unsafe fn rotate_toward<K, V, B: Balancer>(
    tree: &mut Tree<K, V, B>,
    r: NonNull<Node<K, V>>,
    way: Dir,
) -> NonNull<Node<K, V>> {
    // SAFETY: caller guarantees `r` is owned by `tree` and has a child on
    // the rising side.
    unsafe {
        let Some(rise) = link_of(r, way.rev()) else {
            return r;
        };
        let mid = link_of(rise, way);

        set_link(r, way.rev(), mid);
        if let Some(m) = mid {
            set_link(m, Dir::Up, Some(r));
            set_side(m, way.rev());
        }

        let parent = link_of(r, Dir::Up);
        set_link(rise, Dir::Up, parent);
        set_side(rise, side_of(r));
        match parent {
            Some(p) => set_link(p, side_of(rise), Some(rise)),
            None => tree.root = Some(rise),
        }

        set_link(rise, way, Some(r));
        set_link(r, Dir::Up, Some(rise));
        set_side(r, way);
        rise
    }
}

/// The zig-zag repair: `n` is `p`'s child on the `heavy` side and leans the
/// other way, so the inner grandchild rotates to the top of the subtree.
/// Returns the new subtree root. Leans are set from the grandchild's lean.
unsafe fn double_rotate<K, V, B: Balancer>(
    tree: &mut Tree<K, V, B>,
    p: NonNull<Node<K, V>>,
    n: NonNull<Node<K, V>>,
    heavy: Dir,
) -> NonNull<Node<K, V>> {
    // SAFETY: caller guarantees the zig-zag shape described above.
    unsafe {
        let Some(g) = link_of(n, heavy.rev()) else {
            return n;
        };
        rotate_toward(tree, n, heavy);
        rotate_toward(tree, p, heavy.rev());
        match lean_of(g) {
            l if l == heavy => {
                set_lean(p, heavy.rev());
                set_lean(n, Dir::Up);
            }
            Dir::Up => {
                set_lean(p, Dir::Up);
                set_lean(n, Dir::Up);
            }
            _ => {
                set_lean(p, Dir::Up);
                set_lean(n, heavy);
            }
        }
        set_lean(g, Dir::Up);
        g
    }
}

/// Walks up from a freshly linked node, updating leans and rotating at the
/// first node that went out of balance. One rotation always restores the
/// subtree to its pre-insert height, so at most one (possibly double)
/// rotation happens per insert.
unsafe fn rebalance_insert<K, V>(tree: &mut Tree<K, V, Avl>, node: NonNull<Node<K, V>>) {
    let mut n = node;
    // SAFETY: every node visited is owned by `tree`.
    unsafe {
        while let Some(p) = link_of(n, Dir::Up) {
            let side = side_of(n);
            let lean = lean_of(p);
            if lean == side.rev() {
                // The shorter side grew; the subtree is now even.
                set_lean(p, Dir::Up);
                break;
            }
            if lean == Dir::Up {
                // The subtree got taller; the imbalance may be higher up.
                set_lean(p, side);
                n = p;
            } else {
                // lean == side: two levels deep on one side.
                if lean_of(n) == side {
                    rotate_toward(tree, p, side.rev());
                    set_lean(p, Dir::Up);
                    set_lean(n, Dir::Up);
                } else {
                    double_rotate(tree, p, n, side);
                }
                break;
            }
        }
    }
}

/// Walks up from the point where a subtree lost height, updating leans and
/// rotating where needed. Unlike inserts, a removal can require a rotation
/// at every level on the way up.
unsafe fn rebalance_remove<K, V>(
    tree: &mut Tree<K, V, Avl>,
    parent: NonNull<Node<K, V>>,
    shrunk: Dir,
) {
    let mut p = parent;
    let mut shrunk = shrunk;
    // SAFETY: every node visited is owned by `tree`.
    unsafe {
        loop {
            let lean = lean_of(p);
            let subroot = if lean == shrunk {
                // The taller side shrank; now even, but one level shorter.
                set_lean(p, Dir::Up);
                p
            } else if lean == Dir::Up {
                // Now leaning the other way; overall height unchanged.
                set_lean(p, shrunk.rev());
                return;
            } else {
                let heavy = shrunk.rev();
                let Some(s) = link_of(p, heavy) else {
                    return;
                };
                let s_lean = lean_of(s);
                if s_lean == shrunk {
                    double_rotate(tree, p, s, heavy)
                } else if s_lean == Dir::Up {
                    // Rotation keeps the subtree's height, so repair stops.
                    rotate_toward(tree, p, shrunk);
                    set_lean(p, heavy);
                    set_lean(s, shrunk);
                    return;
                } else {
                    rotate_toward(tree, p, shrunk);
                    set_lean(p, Dir::Up);
                    set_lean(s, Dir::Up);
                    s
                }
            };
            match link_of(subroot, Dir::Up) {
                Some(next) => {
                    shrunk = side_of(subroot);
                    p = next;
                }
                None => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec::Vec;

    use super::*;
    use crate::node::Link;
    use crate::tree::KeyPolicy;

    /// Recomputes subtree heights, asserting that every lean field matches
    /// the actual height difference. Returns the subtree height.
    fn checked_height<K, V>(link: Link<K, V>) -> i32 {
        let Some(n) = link else { return 0 };
        // SAFETY: test-only walk over live nodes.
        unsafe {
            let lh = checked_height(link_of(n, Dir::Left));
            let rh = checked_height(link_of(n, Dir::Right));
            let expected = match lh - rh {
                0 => Dir::Up,
                1 => Dir::Left,
                -1 => Dir::Right,
                d => panic!("AVL violation: height difference {d}"),
            };
            assert_eq!(lean_of(n), expected);
            1 + lh.max(rh)
        }
    }

    fn check_avl<K, V>(tree: &AvlTree<K, V>) -> i32 {
        tree.check_structure();
        checked_height(tree.root)
    }

    fn keys<K: Copy, V>(tree: &AvlTree<K, V>) -> Vec<K> {
        tree.iter().map(|n| *n.key()).collect()
    }

    #[test]
    fn ascending_inserts_stay_balanced() {
        let mut tree: AvlTree<i32, ()> = AvlTree::new(KeyPolicy::Reject);
        for k in 1..=5 {
            tree.insert_value(k, ()).unwrap();
        }
        assert_eq!(keys(&tree), [1, 2, 3, 4, 5]);
        assert_eq!(tree.root().map(|n| *n.key()), Some(2));
        assert_eq!(check_avl(&tree), 3);
    }

    #[test]
    fn descending_inserts_stay_balanced() {
        let mut tree: AvlTree<i32, ()> = AvlTree::new(KeyPolicy::Reject);
        for k in (1..=7).rev() {
            tree.insert_value(k, ()).unwrap();
        }
        assert_eq!(keys(&tree), [1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(check_avl(&tree), 3);
    }

    #[test]
    fn zig_zag_inserts_trigger_double_rotations() {
        let mut tree: AvlTree<i32, ()> = AvlTree::new(KeyPolicy::Reject);
        for k in [50, 20, 70, 10, 30, 25] {
            tree.insert_value(k, ()).unwrap();
            check_avl(&tree);
        }
        assert_eq!(keys(&tree), [10, 20, 25, 30, 50, 70]);
    }

    #[test]
    fn sequential_deletes_keep_balance() {
        let mut tree: AvlTree<i32, i32> = AvlTree::new(KeyPolicy::Reject);
        for k in 1..=32 {
            tree.insert_value(k, k).unwrap();
        }
        for k in 1..=32 {
            assert!(tree.remove(&k).is_some());
            check_avl(&tree);
        }
        assert!(tree.is_empty());
    }

    #[test]
    fn remove_interior_node_rebalances() {
        let mut tree: AvlTree<i32, ()> = AvlTree::new(KeyPolicy::Reject);
        for k in [8, 4, 12, 2, 6, 10, 14, 1, 3, 5, 7] {
            tree.insert_value(k, ()).unwrap();
        }
        check_avl(&tree);
        tree.remove(&12).unwrap();
        check_avl(&tree);
        tree.remove(&14).unwrap();
        // Deleting the whole right flank forces a rotation at the root.
        check_avl(&tree);
        assert_eq!(keys(&tree), [1, 2, 3, 4, 5, 6, 7, 8, 10]);
    }

    #[test]
    fn overwrite_preserves_balance_state() {
        let mut tree: AvlTree<i32, i32> = AvlTree::new(KeyPolicy::Overwrite);
        for k in 1..=10 {
            tree.insert_value(k, k).unwrap();
        }
        let before = check_avl(&tree);
        match tree.insert_value(4, 44).unwrap() {
            Inserted::Replaced(old) => assert_eq!(old.into_parts(), (4, 4)),
            Inserted::Linked => panic!("expected replacement"),
        }
        assert_eq!(check_avl(&tree), before);
        assert_eq!(tree.find(&4).map(|n| *n.value()), Some(44));
    }

    #[test]
    fn duplicates_keep_balance() {
        let mut tree: AvlTree<i32, usize> = AvlTree::new(KeyPolicy::Duplicates);
        for (i, k) in [5, 5, 5, 2, 8, 5, 2].iter().enumerate() {
            tree.insert_value(*k, i).unwrap();
            check_avl(&tree);
        }
        assert_eq!(keys(&tree), [2, 2, 5, 5, 5, 5, 8]);
    }

    #[test]
    fn randomized_against_btreemap() {
        use rand::prelude::*;
        use std::collections::BTreeMap;

        let mut rng = SmallRng::seed_from_u64(0xa71);
        let mut tree: AvlTree<u32, u32> = AvlTree::new(KeyPolicy::Overwrite);
        let mut oracle: BTreeMap<u32, u32> = BTreeMap::new();

        for round in 0..3000 {
            let key = rng.random_range(0..500u32);
            if rng.random_bool(0.55) {
                let val = rng.random();
                tree.insert_value(key, val).unwrap();
                oracle.insert(key, val);
            } else {
                let mine = tree.remove(&key).map(|n| n.into_parts().1);
                assert_eq!(mine, oracle.remove(&key));
            }
            if round % 250 == 0 {
                check_avl(&tree);
            }
        }
        let height = check_avl(&tree);
        let n = tree.len() as f64;
        // AVL height bound: 1.4405 * log2(n + 2).
        assert!(f64::from(height) <= 1.4405 * (n + 2.0).log2() + 1.0);

        let mine: Vec<(u32, u32)> = tree.iter().map(|n| (*n.key(), *n.value())).collect();
        let theirs: Vec<(u32, u32)> = oracle.into_iter().collect();
        assert_eq!(mine, theirs);
    }
}
