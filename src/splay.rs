//! Splay balancing: move-to-root restructuring on every access.
//!
//! The [`Splay`] discipline rotates the accessed node all the way to the
//! root using the classic zig-zig / zig-zag / zig steps. Nothing about the
//! node layout changes and no extra state is kept; the entire discipline is
//! the `splay_up` loop below. Frequently accessed nodes collect near the
//! root, which is what the cache in [`crate::cache`] relies on: stale
//! entries sink toward the leaves where eviction finds them.

extern crate alloc;

use alloc::boxed::Box;
use core::ptr::NonNull;

use crate::node::{Dir, Node};
use crate::tree::{
    link_of, set_link, set_side, side_of, sub_slide, Balancer, BaseInserted, DuplicateKey,
    Inserted, Tree,
};

/// The splay discipline marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct Splay;

/// A self-adjusting binary search tree.
pub type SplayTree<K, V> = Tree<K, V, Splay>;

/// Moves `p` up one level with a single direction-symmetric rotation.
///
/// The tree's root pointer is not touched; `splay_up` fixes it once the
/// node reaches the top.
unsafe fn rotate_up<K, V>(p: NonNull<Node<K, V>>) {
    // SAFETY: caller guarantees `p` is a live tree node.
    unsafe {
        let Some(parent) = link_of(p, Dir::Up) else {
            return;
        };
        let way = side_of(p);
        let revway = way.rev();

        // p's inner subtree becomes the parent's `way` child.
        let mid = link_of(p, revway);
        set_link(parent, way, mid);
        if let Some(m) = mid {
            set_link(m, Dir::Up, Some(parent));
            set_side(m, way);
        }

        // p steps into the parent's position.
        let grand = link_of(parent, Dir::Up);
        set_link(p, Dir::Up, grand);
        set_side(p, side_of(parent));
        if let Some(g) = grand {
            set_link(g, side_of(p), Some(p));
        }

        // The old parent hangs off p's inner side.
        set_link(parent, Dir::Up, Some(p));
        set_side(parent, revway);
        set_link(p, revway, Some(parent));
    }
}

/// Splays `n` to the root of `tree`.
pub(crate) unsafe fn splay_up<K, V, B: Balancer>(
    tree: &mut Tree<K, V, B>,
    n: NonNull<Node<K, V>>,
) {
    // SAFETY: caller guarantees `n` is owned by `tree`.
    unsafe {
        while let Some(parent) = link_of(n, Dir::Up) {
            if side_of(parent) == side_of(n) {
                // Zig-zig: straight-line grandparent chain, rotate the
                // parent first.
                rotate_up(parent);
            } else if side_of(parent) != Dir::Up {
                // Zig-zag: rotate n twice.
                rotate_up(n);
            }
            rotate_up(n);
        }
        tree.root = Some(n);
    }
}

impl Balancer for Splay {
    fn insert<K, V>(
        tree: &mut Tree<K, V, Self>,
        node: Box<Node<K, V>>,
    ) -> Result<Inserted<K, V>, DuplicateKey<K, V>> {
        match tree.base_insert(node) {
            Ok(BaseInserted::Linked(np)) => {
                // SAFETY: `np` was just linked into `tree`.
                unsafe { splay_up(tree, np) };
                Ok(Inserted::Linked)
            }
            Ok(BaseInserted::Replaced(old, np)) => {
                // SAFETY: `np` now occupies the old node's position.
                unsafe { splay_up(tree, np) };
                Ok(Inserted::Replaced(old))
            }
            Err(dup) => {
                // Even a refused insert is an access: splay the node that
                // blocked it.
                let existing = dup.existing;
                // SAFETY: `existing` is the in-tree node the probe hit.
                unsafe { splay_up(tree, existing) };
                Err(dup)
            }
        }
    }

    unsafe fn remove<K, V>(
        tree: &mut Tree<K, V, Self>,
        node: NonNull<Node<K, V>>,
    ) -> Box<Node<K, V>> {
        // SAFETY: contract forwarded from the caller; splaying first means
        // the dead node's subtrees are exactly the tree's two halves.
        unsafe {
            splay_up(tree, node);

            let left = link_of(node, Dir::Left);
            let right = link_of(node, Dir::Right);
            if let Some(l) = left {
                // The left half becomes the tree; its rightmost node has a
                // free right slot where the right half re-attaches.
                set_link(l, Dir::Up, None);
                set_side(l, Dir::Up);
                let junction = sub_slide(l, Dir::Right);
                set_link(junction, Dir::Right, right);
                if let Some(r) = right {
                    set_link(r, Dir::Up, Some(junction));
                    set_side(r, Dir::Right);
                }
                tree.root = Some(l);
                splay_up(tree, junction);
            } else {
                if let Some(r) = right {
                    set_link(r, Dir::Up, None);
                    set_side(r, Dir::Up);
                }
                tree.root = right;
            }
            tree.count -= 1;

            let mut dead = Box::from_raw(node.as_ptr());
            dead.reset_links();
            dead
        }
    }

    fn find<K, V>(tree: &mut Tree<K, V, Self>, key: &K) -> Option<NonNull<Node<K, V>>> {
        let n = tree.find_raw(key)?;
        // SAFETY: `n` came from this tree.
        unsafe { splay_up(tree, n) };
        Some(n)
    }

    fn locate<K, V>(
        tree: &mut Tree<K, V, Self>,
        key: &K,
        op: crate::tree::Lookup,
    ) -> Option<NonNull<Node<K, V>>> {
        let n = tree.locate_raw(key, op)?;
        // SAFETY: `n` came from this tree.
        unsafe { splay_up(tree, n) };
        Some(n)
    }
}

impl<K, V> SplayTree<K, V> {
    /// Splays the tree at the given handle, making it the root.
    ///
    /// Useful for promoting a node found by traversal without re-running a
    /// key comparison.
    ///
    /// # Safety
    ///
    /// `node` must refer to a node currently owned by this tree.
    pub unsafe fn splay_node(&mut self, node: NonNull<Node<K, V>>) {
        // SAFETY: contract forwarded from the caller.
        unsafe { splay_up(self, node) };
    }
}
