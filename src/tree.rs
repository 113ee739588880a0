//! The base binary search tree and the pluggable balancing seam.
//!
//! Every tree flavor in this crate is the same [`Tree`] type parameterized by
//! a [`Balancer`]. The base tree owns the node linkage, the search and
//! insertion plumbing and all of the traversal primitives; a balancer only
//! decides what restructuring happens after an insert, a removal or (for the
//! splay flavor) a lookup. [`Natural`] is the strategy that does nothing, so
//! [`BinTree`] is a plain unbalanced BST.
//!
//! Traversal never recurses and never allocates. Walking to a neighbor
//! follows parent links, which is why every node carries one.
//!
//! # Ownership
//!
//! The tree owns its nodes. Callers hand a `Box<Node<K, V>>` to
//! [`Tree::insert`]; the box is leaked into the tree and re-materialized when
//! the node is removed or the tree is dropped. Handle-based operations
//! ([`Tree::remove_node`]) are `unsafe` because the tree cannot verify that a
//! raw handle refers to one of its own nodes.

extern crate alloc;

use alloc::boxed::Box;
use core::cmp::Ordering;
use core::fmt;
use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::node::{Dir, Link, Node};

// ---------------------------------------------------------------------------
// Raw link plumbing shared with the balancer modules.
//
// All of these require the pointer to refer to a live node owned by the tree
// being manipulated. They exist so that rotation and traversal code reads as
// link juggling rather than as a wall of pointer dereferences.
// ---------------------------------------------------------------------------

#[inline]
pub(crate) unsafe fn link_of<K, V>(n: NonNull<Node<K, V>>, dir: Dir) -> Link<K, V> {
    // SAFETY: caller guarantees `n` is live.
    unsafe { (*n.as_ptr()).links[dir as usize] }
}

#[inline]
pub(crate) unsafe fn set_link<K, V>(n: NonNull<Node<K, V>>, dir: Dir, to: Link<K, V>) {
    // SAFETY: caller guarantees `n` is live.
    unsafe {
        (*n.as_ptr()).links[dir as usize] = to;
    }
}

#[inline]
pub(crate) unsafe fn side_of<K, V>(n: NonNull<Node<K, V>>) -> Dir {
    // SAFETY: caller guarantees `n` is live.
    unsafe { (*n.as_ptr()).side }
}

#[inline]
pub(crate) unsafe fn set_side<K, V>(n: NonNull<Node<K, V>>, side: Dir) {
    // SAFETY: caller guarantees `n` is live.
    unsafe {
        (*n.as_ptr()).side = side;
    }
}

#[inline]
pub(crate) unsafe fn lean_of<K, V>(n: NonNull<Node<K, V>>) -> Dir {
    // SAFETY: caller guarantees `n` is live.
    unsafe { (*n.as_ptr()).lean }
}

#[inline]
pub(crate) unsafe fn set_lean<K, V>(n: NonNull<Node<K, V>>, lean: Dir) {
    // SAFETY: caller guarantees `n` is live.
    unsafe {
        (*n.as_ptr()).lean = lean;
    }
}

/// Slides down one side of a subtree and returns the last node on that side.
///
/// With `way == Dir::Up` this climbs to the tree root instead.
pub(crate) unsafe fn sub_slide<K, V>(start: NonNull<Node<K, V>>, way: Dir) -> NonNull<Node<K, V>> {
    let mut p = start;
    // SAFETY: caller guarantees `start` is live; every link we follow stays
    // within the same tree.
    unsafe {
        while let Some(next) = link_of(p, way) {
            p = next;
        }
    }
    p
}

/// Returns the in-order neighbor of `p` in the given horizontal direction,
/// or `None` if `p` is the first/last node of its tree.
pub(crate) unsafe fn neighbor<K, V>(p: NonNull<Node<K, V>>, way: Dir) -> Link<K, V> {
    // SAFETY: caller guarantees `p` is live and linked into a tree.
    unsafe {
        if let Some(child) = link_of(p, way) {
            return Some(sub_slide(child, way.rev()));
        }
        let mut p = p;
        while let Some(parent) = link_of(p, Dir::Up) {
            if side_of(p) == way {
                p = parent;
            } else {
                return Some(parent);
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Public configuration and result types.
// ---------------------------------------------------------------------------

/// What a tree does when an inserted key compares equal to an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyPolicy {
    /// The insert is refused and the new node is handed back.
    #[default]
    Reject,
    /// The new node takes the old node's place; the old node is handed back.
    Overwrite,
    /// Both nodes stay in the tree. Equal keys form a contiguous run in
    /// traversal order.
    Duplicates,
}

/// Comparison operator for ranged lookup; see [`Tree::locate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// The last node with a key strictly less than the probe.
    Lt,
    /// An exact match, or failing that the last node less than the probe.
    Le,
    /// An exact match only.
    Eq,
    /// An exact match, or failing that the first node greater than the probe.
    Ge,
    /// The first node with a key strictly greater than the probe.
    Gt,
}

/// Outcome of a successful insert.
#[derive(Debug)]
pub enum Inserted<K, V> {
    /// The node was linked into the tree as a new entry.
    Linked,
    /// The key was already present and the tree is in [`KeyPolicy::Overwrite`]
    /// mode; the displaced node is returned so the caller can reclaim it.
    Replaced(Box<Node<K, V>>),
}

/// A refused insert under [`KeyPolicy::Reject`].
///
/// Carries the rejected node back to the caller so nothing leaks.
pub struct DuplicateKey<K, V> {
    /// The node that could not be inserted.
    pub rejected: Box<Node<K, V>>,
    pub(crate) existing: NonNull<Node<K, V>>,
}

impl<K, V> DuplicateKey<K, V> {
    /// Unwraps the rejected node.
    pub fn into_node(self) -> Box<Node<K, V>> {
        self.rejected
    }
}

impl<K, V> fmt::Debug for DuplicateKey<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplicateKey").finish_non_exhaustive()
    }
}

/// Internal insert outcome that still carries the handle of the node now in
/// the tree, so balancers can restructure around it.
pub(crate) enum BaseInserted<K, V> {
    Linked(NonNull<Node<K, V>>),
    Replaced(Box<Node<K, V>>, NonNull<Node<K, V>>),
}

// ---------------------------------------------------------------------------
// The balancing seam.
// ---------------------------------------------------------------------------

/// A tree-shape discipline.
///
/// Implementations are zero-sized markers ([`Natural`], [`crate::avl::Avl`],
/// [`crate::splay::Splay`]) whose methods wrap the base tree's plumbing with
/// whatever restructuring the discipline requires. User code rarely calls
/// these directly; the inherent methods on [`Tree`] forward here.
pub trait Balancer: Sized {
    /// Inserts a detached node, then restores the discipline's shape.
    fn insert<K, V>(
        tree: &mut Tree<K, V, Self>,
        node: Box<Node<K, V>>,
    ) -> Result<Inserted<K, V>, DuplicateKey<K, V>>;

    /// Detaches `node`, restores the discipline's shape, and returns
    /// ownership of the node.
    ///
    /// # Safety
    ///
    /// `node` must be owned by `tree`.
    unsafe fn remove<K, V>(
        tree: &mut Tree<K, V, Self>,
        node: NonNull<Node<K, V>>,
    ) -> Box<Node<K, V>>;

    /// Exact-match lookup. Disciplines that restructure on access override
    /// this; the default is a plain descent.
    fn find<K, V>(tree: &mut Tree<K, V, Self>, key: &K) -> Option<NonNull<Node<K, V>>> {
        tree.find_raw(key)
    }

    /// Ranged lookup; the default is the base tree's [`Tree::locate`] logic.
    fn locate<K, V>(
        tree: &mut Tree<K, V, Self>,
        key: &K,
        op: Lookup,
    ) -> Option<NonNull<Node<K, V>>> {
        tree.locate_raw(key, op)
    }
}

/// The do-nothing discipline: tree shape is whatever insertion order built.
#[derive(Debug, Clone, Copy, Default)]
pub struct Natural;

impl Balancer for Natural {
    fn insert<K, V>(
        tree: &mut Tree<K, V, Self>,
        node: Box<Node<K, V>>,
    ) -> Result<Inserted<K, V>, DuplicateKey<K, V>> {
        match tree.base_insert(node)? {
            BaseInserted::Linked(_) => Ok(Inserted::Linked),
            BaseInserted::Replaced(old, _) => Ok(Inserted::Replaced(old)),
        }
    }

    unsafe fn remove<K, V>(
        tree: &mut Tree<K, V, Self>,
        node: NonNull<Node<K, V>>,
    ) -> Box<Node<K, V>> {
        // SAFETY: contract forwarded from the caller.
        let (dead, _) = unsafe { tree.base_remove(node) };
        dead
    }
}

/// A plain, unbalanced binary search tree.
pub type BinTree<K, V> = Tree<K, V, Natural>;

// ---------------------------------------------------------------------------
// The tree itself.
// ---------------------------------------------------------------------------

fn ord_cmp<K: Ord>(a: &K, b: &K) -> Ordering {
    a.cmp(b)
}

/// An intrusive, parent-linked binary search tree with a pluggable balancing
/// discipline.
///
/// See the [module docs](crate::tree) for the ownership model. Lookup methods
/// take `&mut self` uniformly because the splay discipline restructures the
/// tree on every access.
pub struct Tree<K, V, B: Balancer = Natural> {
    pub(crate) root: Link<K, V>,
    pub(crate) count: usize,
    cmp: fn(&K, &K) -> Ordering,
    policy: KeyPolicy,
    strategy: PhantomData<B>,
}

// SAFETY: the tree owns every node it points at; moving the tree moves that
// ownership wholesale, exactly as if the nodes were in a Vec.
unsafe impl<K: Send, V: Send, B: Balancer> Send for Tree<K, V, B> {}

// SAFETY: shared references only permit reads; every mutating or
// restructuring operation takes `&mut self`.
unsafe impl<K: Sync, V: Sync, B: Balancer> Sync for Tree<K, V, B> {}

impl<K: Ord, V, B: Balancer> Tree<K, V, B> {
    /// Creates an empty tree ordered by `K`'s `Ord` implementation.
    pub fn new(policy: KeyPolicy) -> Tree<K, V, B> {
        Tree::with_comparator(ord_cmp::<K>, policy)
    }
}

impl<K, V, B: Balancer> Tree<K, V, B> {
    /// Creates an empty tree ordered by an explicit comparison function.
    ///
    /// The comparator must be a total order and must never change for the
    /// lifetime of the tree.
    pub fn with_comparator(cmp: fn(&K, &K) -> Ordering, policy: KeyPolicy) -> Tree<K, V, B> {
        Tree {
            root: None,
            count: 0,
            cmp,
            policy,
            strategy: PhantomData,
        }
    }

    /// Number of nodes in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// `true` if the tree holds no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The duplicate-key policy this tree was created with.
    #[inline]
    pub fn policy(&self) -> KeyPolicy {
        self.policy
    }

    pub(crate) fn comparator(&self) -> fn(&K, &K) -> Ordering {
        self.cmp
    }

    /// The current root node, if any.
    pub fn root(&self) -> Option<&Node<K, V>> {
        // SAFETY: the root is owned by this tree; the borrow ties the
        // reference to `&self`.
        self.root.map(|r| unsafe { &*r.as_ptr() })
    }

    // -- insertion ----------------------------------------------------------

    /// Inserts a caller-allocated node.
    ///
    /// On a key collision the outcome follows [`KeyPolicy`]: rejection hands
    /// the node back in the error, overwrite hands back the displaced node,
    /// and duplicate mode links the new node into the existing run.
    pub fn insert(
        &mut self,
        node: Box<Node<K, V>>,
    ) -> Result<Inserted<K, V>, DuplicateKey<K, V>> {
        B::insert(self, node)
    }

    /// Convenience wrapper that boxes a fresh [`Node`] and inserts it.
    pub fn insert_value(
        &mut self,
        key: K,
        value: V,
    ) -> Result<Inserted<K, V>, DuplicateKey<K, V>> {
        self.insert(Box::new(Node::new(key, value)))
    }

    // -- lookup -------------------------------------------------------------

    /// Finds a node with a key equal to `key`.
    ///
    /// In a duplicate-mode tree the match is whichever equal node the descent
    /// hits first; use [`Tree::first_of`] to reach the start of the run.
    pub fn find(&mut self, key: &K) -> Option<&Node<K, V>> {
        // SAFETY: the handle came from this tree; the borrow ties it to self.
        B::find(self, key).map(|n| unsafe { &*n.as_ptr() })
    }

    /// Like [`Tree::find`], but grants mutable access to the node's value.
    pub fn find_mut(&mut self, key: &K) -> Option<&mut Node<K, V>> {
        // SAFETY: the handle came from this tree; the exclusive borrow of
        // self guarantees no aliasing.
        B::find(self, key).map(|n| unsafe { &mut *n.as_ptr() })
    }

    /// Ranged lookup: the best node under the given comparison operator.
    ///
    /// In a duplicate-mode tree, a result less than the probe is the last of
    /// its run and a result greater than the probe is the first of its run,
    /// so repeated `Lt`/`Gt` probes step cleanly across runs.
    pub fn locate(&mut self, key: &K, op: Lookup) -> Option<&Node<K, V>> {
        // SAFETY: the handle came from this tree; the borrow ties it to self.
        B::locate(self, key, op).map(|n| unsafe { &*n.as_ptr() })
    }

    // -- removal ------------------------------------------------------------

    /// Removes one node whose key equals `key` and returns ownership of it.
    pub fn remove(&mut self, key: &K) -> Option<Box<Node<K, V>>> {
        let n = B::find(self, key)?;
        // SAFETY: `n` was just found in this tree.
        Some(unsafe { B::remove(self, n) })
    }

    /// Removes the node behind a raw handle and returns ownership of it.
    ///
    /// # Safety
    ///
    /// `node` must refer to a node currently owned by this tree. Handing in a
    /// handle from another tree, or one that was already removed, corrupts
    /// both trees.
    pub unsafe fn remove_node(&mut self, node: NonNull<Node<K, V>>) -> Box<Node<K, V>> {
        // SAFETY: contract forwarded from the caller.
        unsafe { B::remove(self, node) }
    }

    // -- traversal ----------------------------------------------------------

    /// The node with the smallest key.
    pub fn first(&self) -> Option<&Node<K, V>> {
        // SAFETY: all links stay within this tree.
        self.root
            .map(|r| unsafe { &*sub_slide(r, Dir::Left).as_ptr() })
    }

    /// The node with the largest key.
    pub fn last(&self) -> Option<&Node<K, V>> {
        // SAFETY: all links stay within this tree.
        self.root
            .map(|r| unsafe { &*sub_slide(r, Dir::Right).as_ptr() })
    }

    /// The leftmost descendant of the subtree rooted at `node`.
    pub fn subtree_first<'a>(&'a self, node: &Node<K, V>) -> &'a Node<K, V> {
        // SAFETY: `node` is borrowed from this tree, so its links are live.
        unsafe { &*sub_slide(NonNull::from(node), Dir::Left).as_ptr() }
    }

    /// The rightmost descendant of the subtree rooted at `node`.
    pub fn subtree_last<'a>(&'a self, node: &Node<K, V>) -> &'a Node<K, V> {
        // SAFETY: `node` is borrowed from this tree, so its links are live.
        unsafe { &*sub_slide(NonNull::from(node), Dir::Right).as_ptr() }
    }

    /// The in-order successor of `node`.
    pub fn next_of<'a>(&'a self, node: &Node<K, V>) -> Option<&'a Node<K, V>> {
        // SAFETY: `node` is borrowed from this tree, so its links are live.
        unsafe { neighbor(NonNull::from(node), Dir::Right).map(|n| &*n.as_ptr()) }
    }

    /// The in-order predecessor of `node`.
    pub fn prev_of<'a>(&'a self, node: &Node<K, V>) -> Option<&'a Node<K, V>> {
        // SAFETY: `node` is borrowed from this tree, so its links are live.
        unsafe { neighbor(NonNull::from(node), Dir::Left).map(|n| &*n.as_ptr()) }
    }

    /// The first node of `node`'s duplicate run.
    ///
    /// Outside [`KeyPolicy::Duplicates`] mode this is `node` itself.
    pub fn first_of<'a>(&'a self, node: &Node<K, V>) -> &'a Node<K, V> {
        // SAFETY: `node` is borrowed from this tree.
        unsafe { &*self.border(node.key(), NonNull::from(node), Dir::Left).as_ptr() }
    }

    /// The last node of `node`'s duplicate run.
    ///
    /// Outside [`KeyPolicy::Duplicates`] mode this is `node` itself.
    pub fn last_of<'a>(&'a self, node: &Node<K, V>) -> &'a Node<K, V> {
        // SAFETY: `node` is borrowed from this tree.
        unsafe { &*self.border(node.key(), NonNull::from(node), Dir::Right).as_ptr() }
    }

    /// An in-order iterator over the tree's nodes.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            next: self.first_raw(),
            marker: PhantomData,
        }
    }

    /// Visits every node in key order and returns the visit count.
    pub fn traverse<F>(&self, mut visit: F) -> usize
    where
        F: FnMut(&K, &V),
    {
        let mut count = 0;
        for node in self.iter() {
            visit(node.key(), node.value());
            count += 1;
        }
        count
    }

    /// Visits every node in key order, removing those for which `keep`
    /// returns `false`. Returns the number of nodes removed.
    ///
    /// The successor is fetched before each visit, so removal of the current
    /// node never disturbs the walk.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let mut removed = 0;
        let mut p = self.first_raw();
        while let Some(n) = p {
            // SAFETY: `n` is owned by this tree; the mutable borrow is
            // dropped before any restructuring happens.
            unsafe {
                let next = neighbor(n, Dir::Right);
                let (key, value) = (*n.as_ptr()).key_value_mut();
                if !keep(key, value) {
                    drop(B::remove(self, n));
                    removed += 1;
                }
                p = next;
            }
        }
        removed
    }

    /// Removes and drops every node, returning how many were removed.
    ///
    /// Teardown dismantles the tree bottom-up without recursing, so deep or
    /// degenerate trees do not risk the stack.
    pub fn clear(&mut self) -> usize {
        let mut removed = 0;
        // SAFETY: every pointer followed here is a live node owned by this
        // tree; each node is unlinked from its parent before being dropped.
        unsafe {
            let mut p = self.first_raw();
            while let Some(start) = p {
                let mut q = start;
                while let Some(right) = link_of(q, Dir::Right) {
                    q = sub_slide(right, Dir::Left);
                }
                p = link_of(q, Dir::Up);
                if let Some(parent) = p {
                    let side = if link_of(parent, Dir::Left) == Some(q) {
                        Dir::Left
                    } else {
                        Dir::Right
                    };
                    set_link(parent, side, None);
                }
                drop(Box::from_raw(q.as_ptr()));
                removed += 1;
            }
        }
        self.root = None;
        self.count = 0;
        removed
    }

    /// Picks a deep leaf node, useful as a cheap-to-remove eviction victim.
    ///
    /// A single descent can bottom out on a shallow leaf even in a full-ish
    /// tree, so this follows a small number of alternating-direction paths
    /// and returns the leaf at the bottom of the longest one.
    pub fn leaf(&self) -> Option<&Node<K, V>> {
        // SAFETY: the handle came from this tree.
        self.leaf_raw().map(|n| unsafe { &*n.as_ptr() })
    }

    pub(crate) fn leaf_raw(&self) -> Link<K, V> {
        const MAX_PATHS: usize = 4;

        let leader = self.root?;
        let mut p = [leader; MAX_PATHS];
        let mut q = [leader; MAX_PATHS];
        let mut paths = 1;
        let mut way = Dir::Left;

        // SAFETY: every link followed stays within this tree.
        unsafe {
            while paths > 0 {
                q[..paths].copy_from_slice(&p[..paths]);

                // Fill the next level from the current frontier, preferring
                // the current direction and topping up from the other side.
                let mut filled = 0;
                for node in &q[..paths] {
                    if let Some(child) = link_of(*node, way) {
                        p[filled] = child;
                        filled += 1;
                    }
                }
                way = way.rev();
                let mut i = 0;
                while i < paths && filled < MAX_PATHS - 1 {
                    if let Some(child) = link_of(q[i], way) {
                        p[filled] = child;
                        filled += 1;
                    }
                    i += 1;
                }
                paths = filled;
            }
        }
        Some(q[0])
    }

    // -- internal plumbing --------------------------------------------------

    #[inline]
    pub(crate) fn first_raw(&self) -> Link<K, V> {
        // SAFETY: the root is owned by this tree.
        self.root.map(|r| unsafe { sub_slide(r, Dir::Left) })
    }

    /// Compares a probe key against a node's key, as a descent direction.
    #[inline]
    fn dir_of(&self, key: &K, node: NonNull<Node<K, V>>) -> Dir {
        // SAFETY: `node` is owned by this tree.
        Dir::of((self.cmp)(key, unsafe { (*node.as_ptr()).key() }))
    }

    /// Non-recursive search. Returns the matching node (if any) along with
    /// the last parent visited and the direction last taken, which is the
    /// attachment point for an insert when no match exists.
    fn tree_find(&self, key: &K) -> (Link<K, V>, Link<K, V>, Dir) {
        let mut p = self.root;
        let mut parent: Link<K, V> = None;
        let mut dir = Dir::Up;
        while let Some(n) = p {
            let d = self.dir_of(key, n);
            if d == Dir::Up {
                break;
            }
            parent = Some(n);
            dir = d;
            // SAFETY: `n` is owned by this tree.
            p = unsafe { link_of(n, d) };
        }
        (p, parent, dir)
    }

    /// Plain descent from `start` looking for an exact match.
    fn q_find(&self, key: &K, start: Link<K, V>) -> Link<K, V> {
        let mut p = start;
        while let Some(n) = p {
            match self.dir_of(key, n) {
                Dir::Up => return Some(n),
                // SAFETY: `n` is owned by this tree.
                d => p = unsafe { link_of(n, d) },
            }
        }
        None
    }

    pub(crate) fn find_raw(&self, key: &K) -> Link<K, V> {
        self.q_find(key, self.root)
    }

    /// Walks from a matching node to the first (or last) node of its
    /// duplicate run. A no-op unless duplicates are allowed.
    unsafe fn border(&self, key: &K, p: NonNull<Node<K, V>>, way: Dir) -> NonNull<Node<K, V>> {
        if self.policy != KeyPolicy::Duplicates || way == Dir::Up {
            return p;
        }
        let mut p = p;
        // SAFETY: caller guarantees `p` is owned by this tree; all links
        // followed stay within it.
        unsafe {
            // Climb to the root of the subtree containing the whole run.
            let mut q = link_of(p, Dir::Up);
            while let Some(up) = q {
                if self.dir_of(key, up) != Dir::Up {
                    break;
                }
                p = up;
                q = link_of(p, Dir::Up);
            }
            // Then chase further matches back down on the `way` side.
            let mut q = link_of(p, way);
            while let Some(sub) = q {
                match self.q_find(key, Some(sub)) {
                    Some(found) => {
                        p = found;
                        q = link_of(p, way);
                    }
                    None => break,
                }
            }
        }
        p
    }

    pub(crate) fn locate_raw(&self, key: &K, op: Lookup) -> Link<K, V> {
        let (found, parent, last_dir) = self.tree_find(key);

        if let Some(p) = found {
            // SAFETY: `p` came from this tree.
            return unsafe {
                match op {
                    Lookup::Lt => neighbor(self.border(key, p, Dir::Left), Dir::Left),
                    Lookup::Gt => neighbor(self.border(key, p, Dir::Right), Dir::Right),
                    _ => Some(self.border(key, p, Dir::Left)),
                }
            };
        }

        if op == Lookup::Eq {
            return None;
        }
        // `parent` is the node whose key is nearest the probe; step past it
        // if the miss landed on the wrong side.
        let parent = parent?;
        // SAFETY: `parent` came from this tree.
        unsafe {
            match op {
                Lookup::Lt | Lookup::Le => {
                    if last_dir == Dir::Left {
                        neighbor(parent, Dir::Left)
                    } else {
                        Some(parent)
                    }
                }
                _ => {
                    if last_dir == Dir::Right {
                        neighbor(parent, Dir::Right)
                    } else {
                        Some(parent)
                    }
                }
            }
        }
    }

    /// Links a detached node below `parent` on the given side, or installs it
    /// as the root when `parent` is `None`.
    unsafe fn link_child(
        &mut self,
        parent: Link<K, V>,
        side: Dir,
        node: NonNull<Node<K, V>>,
    ) {
        // SAFETY: caller guarantees `node` is detached and `parent` (if any)
        // is owned by this tree with a free `side` slot.
        unsafe {
            set_link(node, Dir::Up, parent);
            match parent {
                Some(p) => {
                    set_side(node, side);
                    set_link(p, side, Some(node));
                }
                None => {
                    set_side(node, Dir::Up);
                    self.root = Some(node);
                }
            }
        }
    }

    /// Shape-neutral insert: places the node per the key policy and reports
    /// where it landed. Balancers restructure afterwards.
    pub(crate) fn base_insert(
        &mut self,
        mut node: Box<Node<K, V>>,
    ) -> Result<BaseInserted<K, V>, DuplicateKey<K, V>> {
        node.reset_links();
        let (found, parent, dir) = self.tree_find(node.key());

        let Some(found) = found else {
            let np = NonNull::from(Box::leak(node));
            // SAFETY: `np` is detached; `parent`/`dir` came from tree_find.
            unsafe { self.link_child(parent, dir, np) };
            self.count += 1;
            return Ok(BaseInserted::Linked(np));
        };

        match self.policy {
            KeyPolicy::Reject => Err(DuplicateKey {
                rejected: node,
                existing: found,
            }),
            KeyPolicy::Overwrite => {
                // SAFETY: `found` came from this tree.
                let (old, np) = unsafe { self.replace_node(found, node) };
                Ok(BaseInserted::Replaced(old, np))
            }
            KeyPolicy::Duplicates => {
                // Descend right from the first match, re-comparing at each
                // step, so equal keys stack up at the end of their run.
                let (parent, dir) = {
                    let mut dir = Dir::Right;
                    let mut parent = found;
                    let mut q = Some(found);
                    while let Some(qn) = q {
                        parent = qn;
                        if dir == Dir::Up {
                            dir = Dir::Right;
                        }
                        // SAFETY: every node visited is owned by this tree.
                        q = unsafe { link_of(qn, dir) };
                        if let Some(qq) = q {
                            dir = self.dir_of(node.key(), qq);
                        }
                    }
                    (parent, dir)
                };
                let np = NonNull::from(Box::leak(node));
                // SAFETY: `np` is detached; `parent` has a free `dir` slot.
                unsafe { self.link_child(Some(parent), dir, np) };
                self.count += 1;
                Ok(BaseInserted::Linked(np))
            }
        }
    }

    /// Splices `node` into `old`'s exact position (links, side and lean) and
    /// detaches `old`. The tree's shape is untouched, so no rebalancing is
    /// ever needed afterwards.
    unsafe fn replace_node(
        &mut self,
        old: NonNull<Node<K, V>>,
        mut node: Box<Node<K, V>>,
    ) -> (Box<Node<K, V>>, NonNull<Node<K, V>>) {
        // SAFETY: caller guarantees `old` is owned by this tree and `node`
        // is detached.
        unsafe {
            node.links = (*old.as_ptr()).links;
            node.side = side_of(old);
            node.lean = lean_of(old);
            let np = NonNull::from(Box::leak(node));
            if let Some(l) = link_of(np, Dir::Left) {
                set_link(l, Dir::Up, Some(np));
            }
            if let Some(r) = link_of(np, Dir::Right) {
                set_link(r, Dir::Up, Some(np));
            }
            match link_of(np, Dir::Up) {
                Some(p) => set_link(p, side_of(np), Some(np)),
                None => self.root = Some(np),
            }
            let mut old = Box::from_raw(old.as_ptr());
            old.reset_links();
            (old, np)
        }
    }

    /// Shape-neutral removal. Returns the detached node plus the parent and
    /// side from which the subtree lost height, which is what an AVL
    /// balancer needs to start its upward repair walk.
    pub(crate) unsafe fn base_remove(
        &mut self,
        dead: NonNull<Node<K, V>>,
    ) -> (Box<Node<K, V>>, Option<(NonNull<Node<K, V>>, Dir)>) {
        // SAFETY: caller guarantees `dead` is owned by this tree.
        unsafe {
            // A node with two children trades places with its in-order
            // predecessor, which is guaranteed to have no right child. The
            // nodes themselves move; payloads never do.
            if let (Some(left), Some(_)) = (link_of(dead, Dir::Left), link_of(dead, Dir::Right)) {
                let pred = sub_slide(left, Dir::Right);
                self.swap_with_pred(dead, pred);
            }

            let parent = link_of(dead, Dir::Up);
            let side = side_of(dead);
            let child = link_of(dead, Dir::Left).or(link_of(dead, Dir::Right));
            if let Some(c) = child {
                set_link(c, Dir::Up, parent);
                set_side(c, side);
            }
            match parent {
                Some(p) => set_link(p, side, child),
                None => {
                    self.root = child;
                    if let Some(c) = child {
                        set_side(c, Dir::Up);
                    }
                }
            }
            self.count -= 1;

            let mut dead = Box::from_raw(dead.as_ptr());
            dead.reset_links();
            (dead, parent.map(|p| (p, side)))
        }
    }

    /// Exchanges the tree positions of `a` and its in-order predecessor `b`.
    /// Side and lean travel with the position, not the node.
    unsafe fn swap_with_pred(&mut self, a: NonNull<Node<K, V>>, b: NonNull<Node<K, V>>) {
        // SAFETY: caller guarantees both nodes are owned by this tree, `b`
        // is the in-order predecessor of `a`, and `a` has two children (so
        // `b` sits in `a`'s left subtree with no right child).
        unsafe {
            let a_parent = link_of(a, Dir::Up);
            let a_side = side_of(a);
            let a_lean = lean_of(a);
            let a_left = link_of(a, Dir::Left);
            let a_right = link_of(a, Dir::Right);
            let b_parent = link_of(b, Dir::Up);
            let b_side = side_of(b);
            let b_left = link_of(b, Dir::Left);
            let b_lean = lean_of(b);

            // b takes a's position.
            set_link(b, Dir::Up, a_parent);
            set_side(b, a_side);
            set_lean(b, a_lean);
            match a_parent {
                Some(p) => set_link(p, a_side, Some(b)),
                None => self.root = Some(b),
            }
            if let Some(r) = a_right {
                set_link(b, Dir::Right, Some(r));
                set_link(r, Dir::Up, Some(b));
            }

            if a_left == Some(b) {
                // Adjacent case: a becomes b's left child.
                set_link(b, Dir::Left, Some(a));
                set_link(a, Dir::Up, Some(b));
                set_side(a, Dir::Left);
            } else {
                if let Some(l) = a_left {
                    set_link(b, Dir::Left, Some(l));
                    set_link(l, Dir::Up, Some(b));
                }
                set_link(a, Dir::Up, b_parent);
                set_side(a, b_side);
                if let Some(bp) = b_parent {
                    set_link(bp, b_side, Some(a));
                }
            }

            // a takes over b's old left subtree and lean; b had no right.
            set_link(a, Dir::Left, b_left);
            if let Some(l) = b_left {
                set_link(l, Dir::Up, Some(a));
            }
            set_link(a, Dir::Right, None);
            set_lean(a, b_lean);
        }
    }

    /// Asserts parent/side consistency, count and key ordering. Test-only.
    #[cfg(test)]
    pub(crate) fn check_structure(&self) {
        extern crate std;
        use std::vec::Vec;

        let mut stack: Vec<NonNull<Node<K, V>>> = Vec::new();
        let mut seen = 0usize;
        if let Some(r) = self.root {
            // SAFETY: test-only walk over nodes owned by this tree.
            unsafe {
                assert!(link_of(r, Dir::Up).is_none());
                assert_eq!(side_of(r), Dir::Up);
            }
            stack.push(r);
        }
        while let Some(n) = stack.pop() {
            seen += 1;
            // SAFETY: test-only walk over nodes owned by this tree.
            unsafe {
                for d in [Dir::Left, Dir::Right] {
                    if let Some(c) = link_of(n, d) {
                        assert_eq!(link_of(c, Dir::Up), Some(n));
                        assert_eq!(side_of(c), d);
                        stack.push(c);
                    }
                }
            }
        }
        assert_eq!(seen, self.count);

        let mut prev: Option<&K> = None;
        for node in self.iter() {
            if let Some(p) = prev {
                assert_ne!((self.cmp)(p, node.key()), Ordering::Greater);
            }
            prev = Some(node.key());
        }
    }
}

impl<K, V, B: Balancer> Drop for Tree<K, V, B> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<K, V, B: Balancer> fmt::Debug for Tree<K, V, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("len", &self.count)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<'a, K, V, B: Balancer> IntoIterator for &'a Tree<K, V, B> {
    type Item = &'a Node<K, V>;
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

/// In-order iterator over a tree's nodes. Created by [`Tree::iter`].
pub struct Iter<'a, K, V> {
    next: Link<K, V>,
    marker: PhantomData<&'a Node<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = &'a Node<K, V>;

    fn next(&mut self) -> Option<&'a Node<K, V>> {
        let n = self.next?;
        // SAFETY: the iterator borrows the tree, so every node stays live
        // and unmoved for 'a.
        unsafe {
            self.next = neighbor(n, Dir::Right);
            Some(&*n.as_ptr())
        }
    }
}

impl<K, V> fmt::Debug for Iter<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::string::String;
    use std::vec::Vec;

    use super::*;

    fn filled(keys: &[i32]) -> BinTree<i32, i32> {
        let mut tree = BinTree::new(KeyPolicy::Reject);
        for &k in keys {
            assert!(tree.insert_value(k, k * 10).is_ok());
        }
        tree.check_structure();
        tree
    }

    fn keys_in_order<B: Balancer>(tree: &Tree<i32, i32, B>) -> Vec<i32> {
        tree.iter().map(|n| *n.key()).collect()
    }

    #[test]
    fn insert_orders_keys() {
        let mut tree = filled(&[5, 2, 8, 1, 3, 9, 7]);
        assert_eq!(tree.len(), 7);
        assert_eq!(keys_in_order(&tree), [1, 2, 3, 5, 7, 8, 9]);
        assert_eq!(tree.first().map(|n| *n.key()), Some(1));
        assert_eq!(tree.last().map(|n| *n.key()), Some(9));
        assert_eq!(tree.find(&7).map(|n| *n.value()), Some(70));
        assert!(tree.find(&4).is_none());
    }

    #[test]
    fn shape_follows_insertion_order() {
        // No balancing: the first key stays at the root.
        let mut tree = filled(&[5, 2, 8]);
        assert_eq!(tree.root().map(|n| *n.key()), Some(5));
        tree.insert_value(1, 10).ok();
        assert_eq!(tree.root().map(|n| *n.key()), Some(5));
    }

    #[test]
    fn reject_policy_hands_node_back() {
        let mut tree = filled(&[1, 2]);
        let err = tree.insert_value(2, 99).unwrap_err();
        assert_eq!(*err.into_node().key(), 2);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.find(&2).map(|n| *n.value()), Some(20));
    }

    #[test]
    fn overwrite_policy_returns_old_node() {
        let mut tree: BinTree<i32, i32> = BinTree::new(KeyPolicy::Overwrite);
        for k in [3, 1, 4] {
            tree.insert_value(k, k).unwrap();
        }
        match tree.insert_value(3, 33).unwrap() {
            Inserted::Replaced(old) => assert_eq!(old.into_parts(), (3, 3)),
            Inserted::Linked => panic!("expected replacement"),
        }
        tree.check_structure();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.find(&3).map(|n| *n.value()), Some(33));
    }

    #[test]
    fn overwrite_replaces_the_root_in_place() {
        let mut tree: BinTree<i32, i32> = BinTree::new(KeyPolicy::Overwrite);
        for k in [5, 2, 8] {
            tree.insert_value(k, k).unwrap();
        }
        tree.insert_value(5, 55).unwrap();
        assert_eq!(tree.root().map(|n| (*n.key(), *n.value())), Some((5, 55)));
        tree.check_structure();
    }

    #[test]
    fn duplicates_form_a_run() {
        let mut tree: BinTree<i32, i32> = BinTree::new(KeyPolicy::Duplicates);
        for (i, k) in [5, 2, 5, 8, 5, 2].iter().enumerate() {
            tree.insert_value(*k, i as i32).unwrap();
        }
        tree.check_structure();
        assert_eq!(tree.len(), 6);
        assert_eq!(keys_in_order(&tree), [2, 2, 5, 5, 5, 8]);

        let hit = tree.find_raw(&5).map(|n| unsafe { &*n.as_ptr() }).unwrap();
        assert_eq!(*tree.first_of(hit).key(), 5);
        assert_eq!(*tree.last_of(hit).key(), 5);
        assert!(core::ptr::eq(
            tree.first_of(hit),
            tree.first_of(tree.first_of(hit))
        ));
    }

    #[test]
    fn locate_on_exact_and_missing_keys() {
        let mut tree = filled(&[10, 20, 30, 40]);

        assert_eq!(tree.locate(&20, Lookup::Eq).map(|n| *n.key()), Some(20));
        assert_eq!(tree.locate(&25, Lookup::Eq).map(|n| *n.key()), None);

        assert_eq!(tree.locate(&25, Lookup::Lt).map(|n| *n.key()), Some(20));
        assert_eq!(tree.locate(&25, Lookup::Le).map(|n| *n.key()), Some(20));
        assert_eq!(tree.locate(&25, Lookup::Ge).map(|n| *n.key()), Some(30));
        assert_eq!(tree.locate(&25, Lookup::Gt).map(|n| *n.key()), Some(30));

        assert_eq!(tree.locate(&20, Lookup::Lt).map(|n| *n.key()), Some(10));
        assert_eq!(tree.locate(&20, Lookup::Gt).map(|n| *n.key()), Some(30));
        assert_eq!(tree.locate(&20, Lookup::Le).map(|n| *n.key()), Some(20));
        assert_eq!(tree.locate(&20, Lookup::Ge).map(|n| *n.key()), Some(20));

        assert_eq!(tree.locate(&5, Lookup::Lt).map(|n| *n.key()), None);
        assert_eq!(tree.locate(&5, Lookup::Ge).map(|n| *n.key()), Some(10));
        assert_eq!(tree.locate(&45, Lookup::Gt).map(|n| *n.key()), None);
        assert_eq!(tree.locate(&45, Lookup::Le).map(|n| *n.key()), Some(40));
    }

    #[test]
    fn locate_on_empty_tree() {
        let mut tree: BinTree<i32, i32> = BinTree::new(KeyPolicy::Reject);
        for op in [Lookup::Lt, Lookup::Le, Lookup::Eq, Lookup::Ge, Lookup::Gt] {
            assert!(tree.locate(&1, op).is_none());
        }
    }

    #[test]
    fn locate_honors_duplicate_run_borders() {
        let mut tree: BinTree<i32, i32> = BinTree::new(KeyPolicy::Duplicates);
        for (i, k) in [20, 10, 20, 30, 20].iter().enumerate() {
            tree.insert_value(*k, i as i32).unwrap();
        }
        // Lt lands on the predecessor of the whole run.
        assert_eq!(tree.locate(&20, Lookup::Lt).map(|n| *n.key()), Some(10));
        // Gt lands on the successor of the whole run.
        assert_eq!(tree.locate(&20, Lookup::Gt).map(|n| *n.key()), Some(30));
        // Eq lands on the first node of the run.
        let first = tree.locate(&20, Lookup::Eq).map(|n| *n.value());
        assert_eq!(first, Some(0));
    }

    #[test]
    fn remove_leaf_and_single_child() {
        let mut tree = filled(&[5, 2, 8, 1]);
        // Leaf.
        let dead = tree.remove(&8).unwrap();
        assert_eq!(dead.into_parts(), (8, 80));
        tree.check_structure();
        // Node with one child.
        tree.remove(&2).unwrap();
        tree.check_structure();
        assert_eq!(keys_in_order(&tree), [1, 5]);
    }

    #[test]
    fn remove_node_with_two_children() {
        let mut tree = filled(&[5, 2, 8, 1, 3, 7, 9]);
        tree.remove(&5).unwrap();
        tree.check_structure();
        assert_eq!(keys_in_order(&tree), [1, 2, 3, 7, 8, 9]);
        // The root had two children; the predecessor (3) took its place.
        assert_eq!(tree.root().map(|n| *n.key()), Some(3));
    }

    #[test]
    fn remove_nonadjacent_predecessor_relinks_its_old_parent() {
        // Removing 5 swaps in its predecessor 3, whose old parent 2 must be
        // re-pointed at the node that takes 3's place. Drain the rest to
        // catch any stale child pointer left behind by the swap.
        let mut tree = filled(&[5, 2, 8, 1, 3, 7, 9]);
        tree.remove(&5).unwrap();
        tree.check_structure();
        assert_eq!(keys_in_order(&tree), [1, 2, 3, 7, 8, 9]);
        for key in [8, 2, 3, 9, 1, 7] {
            tree.remove(&key).unwrap();
            tree.check_structure();
        }
        assert!(tree.is_empty());
    }

    #[test]
    fn remove_where_predecessor_is_direct_child() {
        let mut tree = filled(&[5, 2, 8, 1]);
        // 5's predecessor is 2, its own left child, which itself has a child.
        tree.remove(&5).unwrap();
        tree.check_structure();
        assert_eq!(keys_in_order(&tree), [1, 2, 8]);
    }

    #[test]
    fn remove_missing_key_is_none() {
        let mut tree = filled(&[1, 2, 3]);
        assert!(tree.remove(&9).is_none());
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn neighbor_walk_both_ways() {
        let tree = filled(&[4, 2, 6, 1, 3, 5, 7]);
        let mut forward = Vec::new();
        let mut node = tree.first();
        while let Some(n) = node {
            forward.push(*n.key());
            node = tree.next_of(n);
        }
        assert_eq!(forward, [1, 2, 3, 4, 5, 6, 7]);

        let mut backward = Vec::new();
        let mut node = tree.last();
        while let Some(n) = node {
            backward.push(*n.key());
            node = tree.prev_of(n);
        }
        assert_eq!(backward, [7, 6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn subtree_bounds() {
        let tree = filled(&[4, 2, 6, 1, 3, 5, 7]);
        let six = tree.iter().find(|n| *n.key() == 6).unwrap();
        assert_eq!(*tree.subtree_first(six).key(), 5);
        assert_eq!(*tree.subtree_last(six).key(), 7);
        let one = tree.iter().find(|n| *n.key() == 1).unwrap();
        assert!(core::ptr::eq(tree.subtree_first(one), one));
        let root = tree.root().unwrap();
        assert_eq!(*tree.subtree_first(root).key(), 1);
        assert_eq!(*tree.subtree_last(root).key(), 7);
    }

    #[test]
    fn traverse_counts_visits() {
        let tree = filled(&[3, 1, 2]);
        let mut seen = Vec::new();
        let count = tree.traverse(|k, v| seen.push((*k, *v)));
        assert_eq!(count, 3);
        assert_eq!(seen, [(1, 10), (2, 20), (3, 30)]);
    }

    #[test]
    fn retain_removes_while_walking() {
        let mut tree = filled(&[1, 2, 3, 4, 5, 6]);
        let removed = tree.retain(|k, _| k % 2 == 0);
        assert_eq!(removed, 3);
        tree.check_structure();
        assert_eq!(keys_in_order(&tree), [2, 4, 6]);
    }

    #[test]
    fn clear_reports_count_and_empties() {
        let mut tree = filled(&[5, 2, 8, 1, 3]);
        assert_eq!(tree.clear(), 5);
        assert!(tree.is_empty());
        assert!(tree.root().is_none());
        // The tree is reusable afterwards.
        tree.insert_value(42, 420).unwrap();
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn leaf_is_a_real_leaf() {
        let tree = filled(&[8, 4, 12, 2, 6, 10, 14, 1]);
        let leaf = tree.leaf().unwrap();
        assert!(leaf.link(Dir::Left).is_none());
        assert!(leaf.link(Dir::Right).is_none());
    }

    #[test]
    fn leaf_of_single_node_tree_is_the_root() {
        let tree = filled(&[1]);
        assert_eq!(tree.leaf().map(|n| *n.key()), Some(1));
    }

    #[test]
    fn custom_comparator_reverses_order() {
        fn rev(a: &i32, b: &i32) -> Ordering {
            b.cmp(a)
        }
        let mut tree: BinTree<i32, ()> = BinTree::with_comparator(rev, KeyPolicy::Reject);
        for k in [1, 2, 3] {
            tree.insert_value(k, ()).unwrap();
        }
        let keys: Vec<i32> = tree.iter().map(|n| *n.key()).collect();
        assert_eq!(keys, [3, 2, 1]);
    }

    #[test]
    fn string_keys_work() {
        let mut tree: BinTree<String, usize> = BinTree::new(KeyPolicy::Reject);
        for (i, w) in ["pear", "apple", "quince"].iter().enumerate() {
            tree.insert_value(String::from(*w), i).unwrap();
        }
        let keys: Vec<&str> = tree.iter().map(|n| n.key().as_str()).collect();
        assert_eq!(keys, ["apple", "pear", "quince"]);
    }

    #[test]
    fn randomized_against_btreemap() {
        use rand::prelude::*;
        use std::collections::BTreeMap;

        let mut rng = SmallRng::seed_from_u64(0x5eed);
        let mut tree: BinTree<u16, u16> = BinTree::new(KeyPolicy::Overwrite);
        let mut oracle: BTreeMap<u16, u16> = BTreeMap::new();

        for _ in 0..4000 {
            let key = rng.random_range(0..400u16);
            if rng.random_bool(0.6) {
                let val = rng.random_range(0..u16::MAX);
                tree.insert_value(key, val).unwrap();
                oracle.insert(key, val);
            } else {
                let mine = tree.remove(&key).map(|n| n.into_parts().1);
                assert_eq!(mine, oracle.remove(&key));
            }
            assert_eq!(tree.len(), oracle.len());
        }
        tree.check_structure();
        let mine: Vec<(u16, u16)> = tree.iter().map(|n| (*n.key(), *n.value())).collect();
        let theirs: Vec<(u16, u16)> = oracle.into_iter().collect();
        assert_eq!(mine, theirs);
    }
}
