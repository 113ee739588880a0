//! Tree node layout shared by every tree flavor.
//!
//! A node carries three links in a single array indexed by [`Dir`]: the left
//! child, the parent and the right child. Keeping the parent link in the same
//! array as the children lets traversal and rotation code treat "which way am
//! I going" and "which child am I" as the same value, which is what makes the
//! direction-symmetric rotation and neighbor-walking code below possible.
//!
//! The same `Dir` type doubles as the node's side (which slot of its parent
//! points back at it; `Up` means the node is the tree root) and as its lean
//! (AVL balance: taller-on-the-left, balanced, taller-on-the-right).

use core::fmt;
use core::ptr::NonNull;

/// A link slot: either a pointer to another node or empty.
pub(crate) type Link<K, V> = Option<NonNull<Node<K, V>>>;

/// Direction through a node's link array.
///
/// The discriminants are the array indices, so `links[dir as usize]` selects
/// the left child, the parent or the right child directly. `Up` is also the
/// neutral value for a node's side (root) and lean (balanced).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Dir {
    /// Toward the left child; as a lean, taller on the left.
    Left = 0,
    /// Toward the parent; as a side, the node is the root; as a lean, balanced.
    Up = 1,
    /// Toward the right child; as a lean, taller on the right.
    Right = 2,
}

impl Dir {
    /// The horizontal mirror of this direction. `Up` is its own mirror.
    #[inline]
    pub fn rev(self) -> Dir {
        match self {
            Dir::Left => Dir::Right,
            Dir::Up => Dir::Up,
            Dir::Right => Dir::Left,
        }
    }

    /// Maps a comparison of a probe key against a node's key onto the
    /// direction the search must take: `Less` descends left, `Greater`
    /// descends right and `Equal` stops (`Up`).
    #[inline]
    pub fn of(ord: core::cmp::Ordering) -> Dir {
        match ord {
            core::cmp::Ordering::Less => Dir::Left,
            core::cmp::Ordering::Equal => Dir::Up,
            core::cmp::Ordering::Greater => Dir::Right,
        }
    }
}

/// A key/value pair with the intrusive linkage needed to sit in a tree.
///
/// Callers allocate nodes (`Box<Node<K, V>>`) and hand them to a tree, which
/// owns them until removal hands them back. The linkage fields are private;
/// outside the crate a node is only ever seen through a reference borrowed
/// from its tree, so the key cannot be mutated out from under the ordering.
pub struct Node<K, V> {
    pub(crate) links: [Link<K, V>; 3],
    /// Which slot of the parent points back here. `Up` when this is the root
    /// or the node is detached.
    pub(crate) side: Dir,
    /// AVL balance of the subtree rooted here. Unused by the other flavors.
    pub(crate) lean: Dir,
    key: K,
    value: V,
}

impl<K, V> Node<K, V> {
    /// Creates a detached node ready for insertion.
    pub fn new(key: K, value: V) -> Node<K, V> {
        Node {
            links: [None, None, None],
            side: Dir::Up,
            lean: Dir::Up,
            key,
            value,
        }
    }

    /// The node's key.
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The node's value.
    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Mutable access to the value. The key stays immutable so the node's
    /// position in its tree remains consistent.
    #[inline]
    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    /// Consumes a detached node and returns its key and value.
    pub fn into_parts(self) -> (K, V) {
        (self.key, self.value)
    }

    #[inline]
    pub(crate) fn link(&self, dir: Dir) -> Link<K, V> {
        self.links[dir as usize]
    }

    /// Split borrow for visitors that read the key while mutating the value.
    #[inline]
    pub(crate) fn key_value_mut(&mut self) -> (&K, &mut V) {
        (&self.key, &mut self.value)
    }

    /// Clears the linkage so a detached node cannot dangle into its old tree.
    pub(crate) fn reset_links(&mut self) {
        self.links = [None, None, None];
        self.side = Dir::Up;
        self.lean = Dir::Up;
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Node<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("side", &self.side)
            .field("lean", &self.lean)
            .finish()
    }
}
