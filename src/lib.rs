#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Code Reference
//!
//! This section provides quick code examples and API references for each tree
//! flavor and for the cache built on top of them.
//!
//! ## Flavor Selection Guide
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                  Which Tree Flavor Should I Use?                 │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  Are your keys inserted in random order and rarely removed?      │
//! │        │                                                         │
//! │   Yes  │  No                                                     │
//! │    │   │                                                         │
//! │    ▼   ▼                                                         │
//! │ ┌─────────┐  Do a few hot keys dominate the lookups?             │
//! │ │ BinTree │       │                                              │
//! │ └─────────┘  Yes  │  No                                          │
//! │               │   │                                              │
//! │               ▼   ▼                                              │
//! │        ┌───────────┐  ┌─────────┐                                │
//! │        │ SplayTree │  │ AvlTree │                                │
//! │        └───────────┘  └─────────┘                                │
//! │                                                                  │
//! │  Need a bounded hot-set store instead of a plain map?            │
//! │        └──────────▶ Cache (splay tree + leaf eviction)           │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Performance Characteristics
//!
//! | Flavor | Find | Insert | Remove | Shape Guarantee |
//! |--------|------|--------|--------|-----------------|
//! | [`BinTree`] | O(depth) | O(depth) | O(depth) | none |
//! | [`AvlTree`] | O(log n) | O(log n) | O(log n) | height-balanced |
//! | [`SplayTree`] | O(log n) amortized | O(log n) amortized | O(log n) amortized | hot keys near root |
//!
//! ## Code Examples
//!
//! ### Plain tree
//!
//! The unbalanced flavor takes whatever shape the insertion order gives it.
//! Every traversal primitive walks parent links, so iteration needs no stack
//! and no recursion.
//!
//! ```rust
//! use treekit::{BinTree, KeyPolicy};
//!
//! let mut tree: BinTree<i32, &str> = BinTree::new(KeyPolicy::Reject);
//! tree.insert_value(2, "two").ok();
//! tree.insert_value(1, "one").ok();
//! tree.insert_value(3, "three").ok();
//!
//! assert_eq!(tree.find(&2).map(|n| *n.value()), Some("two"));
//! let keys: Vec<i32> = tree.iter().map(|n| *n.key()).collect();
//! assert_eq!(keys, [1, 2, 3]);
//! ```
//!
//! ### AVL tree
//!
//! Same API, but insert and remove repair the tree so its height stays
//! logarithmic no matter how adversarial the key order is.
//!
//! ```rust
//! use treekit::{AvlTree, KeyPolicy};
//!
//! let mut tree: AvlTree<i32, ()> = AvlTree::new(KeyPolicy::Reject);
//! for k in 0..1000 {
//!     tree.insert_value(k, ()).ok();   // fully sorted input
//! }
//! assert_eq!(tree.len(), 1000);
//! assert_eq!(tree.first().map(|n| *n.key()), Some(0));
//! assert_eq!(tree.last().map(|n| *n.key()), Some(999));
//! ```
//!
//! ### Splay tree
//!
//! Every access moves the touched node to the root, so repeated lookups on a
//! small working set get cheaper over time.
//!
//! ```rust
//! use treekit::{KeyPolicy, SplayTree};
//!
//! let mut tree: SplayTree<&str, i32> = SplayTree::new(KeyPolicy::Reject);
//! tree.insert_value("hot", 1).ok();
//! tree.insert_value("cold", 2).ok();
//!
//! tree.find(&"hot");
//! assert_eq!(tree.root().map(|n| *n.key()), Some("hot"));
//! ```
//!
//! ### Duplicate keys and ranged lookup
//!
//! Each tree carries a [`KeyPolicy`] deciding what a key collision means, and
//! [`Tree::locate`] finds the best node under a relational match.
//!
//! ```rust
//! use treekit::{BinTree, KeyPolicy, Lookup};
//!
//! let mut tree: BinTree<i32, char> = BinTree::new(KeyPolicy::Duplicates);
//! for (k, v) in [(10, 'a'), (20, 'b'), (20, 'c'), (30, 'd')] {
//!     tree.insert_value(k, v).ok();
//! }
//!
//! // the largest key not above 25
//! let node = tree.locate(&25, Lookup::Le).unwrap();
//! assert_eq!(*node.key(), 20);
//! // no key is below 10
//! assert!(tree.locate(&10, Lookup::Lt).is_none());
//! ```
//!
//! ### Bounded cache
//!
//! The cache wraps a splay tree in overwrite mode and enforces an entry-count
//! limit and a memory budget, whichever trips first. Eviction removes deep
//! leaves, which are both cheap to unlink and cold by the splay heuristic.
//!
//! ```rust
//! use treekit::{Cache, CacheConfig};
//!
//! let mut cache: Cache<&str, Vec<u8>> = Cache::new(CacheConfig {
//!     max_entries: 1000,
//!     max_memory: 10 * 1024,   // bytes, tracked per entry
//! });
//!
//! cache.put("a", vec![0u8; 100], 100);
//! cache.put("b", vec![0u8; 200], 200);
//! assert!(cache.get(&"a").is_some());
//! assert!(cache.get(&"missing").is_none());
//! assert_eq!(cache.hit_ratio(), 5000);   // basis points, 1 hit in 2 tries
//! ```
//!
//! ## Modules
//!
//! - [`node`]: the shared node layout and direction type
//! - [`tree`]: the base tree, traversal primitives and the balancing seam
//! - [`avl`]: height-balancing strategy
//! - [`splay`]: move-to-root strategy
//! - [`cache`]: bounded key/value cache on the splay flavor
//! - [`config`]: cache configuration
//! - [`metrics`]: decaying hit/try counters
//! - [`dlist`], [`slist`]: companion linked lists
//! - [`sparse`]: path-addressed sparse array of nested trees

#![no_std]

/// The node layout shared by every tree flavor.
///
/// A [`Node`](node::Node) owns its key and value and links to its left
/// child, parent and right child through one three-slot array indexed by
/// [`Dir`](node::Dir). Nodes are boxed by the caller and owned by the tree
/// they are linked into.
pub mod node;

/// The base binary search tree and the balancing seam.
///
/// [`Tree`](tree::Tree) implements insertion, removal, exact and ranged
/// lookup, duplicate-run borders, neighbor stepping, iteration and bulk
/// teardown. A [`Balancer`](tree::Balancer) plugged in as a type parameter
/// decides what happens after each structural change; [`Natural`](tree::Natural)
/// does nothing and leaves the shape to the insertion order.
pub mod tree;

/// Height-balancing via AVL rotations.
///
/// The [`Avl`](avl::Avl) strategy repairs the tree after every insert and
/// remove, keeping the height within a constant factor of `log2(n)`.
pub mod avl;

/// Move-to-root balancing via splay rotations.
///
/// The [`Splay`](splay::Splay) strategy rotates every accessed node to the
/// root, so frequently used keys stay near the top of the tree.
pub mod splay;

/// Bounded key/value cache built on the splay flavor.
///
/// [`Cache`](cache::Cache) enforces an entry-count limit and a memory
/// budget, evicting deep leaves when either is exceeded and tracking a
/// decaying hit ratio.
pub mod cache;

/// Cache configuration.
pub mod config;

/// Cache hit/try accounting with decay.
pub mod metrics;

/// Doubly linked list with O(1) operations at both ends.
pub mod dlist;

/// Singly linked list with a tail pointer.
pub mod slist;

/// Path-addressed sparse array of nested trees.
pub mod sparse;

// Re-export tree types
pub use avl::{Avl, AvlTree};
pub use splay::{Splay, SplayTree};
pub use tree::{
    Balancer, BinTree, DuplicateKey, Inserted, Iter, KeyPolicy, Lookup, Natural, Tree,
};

// Re-export node types
pub use node::{Dir, Node};

// Re-export cache types
pub use cache::Cache;
pub use config::CacheConfig;
pub use metrics::CacheStats;

// Re-export companion containers
pub use dlist::DList;
pub use slist::SList;
pub use sparse::SparseArray;
