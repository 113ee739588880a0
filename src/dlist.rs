//! A doubly linked list with O(1) operations at both ends.
//!
//! Unlike the trees in this crate, the list allocates its own nodes; values
//! go in and come out by move. It serves the classic queue/stack/deque
//! roles: `push_front`/`pop_front` make a stack, `push_back`/`pop_front`
//! make a queue.

extern crate alloc;

use alloc::boxed::Box;
use core::fmt;
use core::marker::PhantomData;
use core::ptr::NonNull;

struct DNode<T> {
    prev: Option<NonNull<DNode<T>>>,
    next: Option<NonNull<DNode<T>>>,
    val: T,
}

/// An owning doubly linked list.
pub struct DList<T> {
    head: Option<NonNull<DNode<T>>>,
    tail: Option<NonNull<DNode<T>>>,
    len: usize,
}

// SAFETY: the list owns every node; moving it moves that ownership.
unsafe impl<T: Send> Send for DList<T> {}
// SAFETY: shared access is read-only; mutation requires `&mut`.
unsafe impl<T: Sync> Sync for DList<T> {}

impl<T> DList<T> {
    /// Creates an empty list.
    pub fn new() -> DList<T> {
        DList {
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Number of values in the list.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` if the list holds no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Adds a value at the front.
    pub fn push_front(&mut self, val: T) {
        let node = NonNull::from(Box::leak(Box::new(DNode {
            prev: None,
            next: self.head,
            val,
        })));
        // SAFETY: `node` is fresh; `head` (if any) is owned by this list.
        unsafe {
            match self.head {
                Some(head) => (*head.as_ptr()).prev = Some(node),
                None => self.tail = Some(node),
            }
        }
        self.head = Some(node);
        self.len += 1;
    }

    /// Adds a value at the back.
    pub fn push_back(&mut self, val: T) {
        let node = NonNull::from(Box::leak(Box::new(DNode {
            prev: self.tail,
            next: None,
            val,
        })));
        // SAFETY: `node` is fresh; `tail` (if any) is owned by this list.
        unsafe {
            match self.tail {
                Some(tail) => (*tail.as_ptr()).next = Some(node),
                None => self.head = Some(node),
            }
        }
        self.tail = Some(node);
        self.len += 1;
    }

    /// Removes and returns the front value.
    pub fn pop_front(&mut self) -> Option<T> {
        let head = self.head?;
        // SAFETY: `head` is owned by this list and is unlinked before the
        // box is reclaimed.
        unsafe {
            let node = Box::from_raw(head.as_ptr());
            self.head = node.next;
            match self.head {
                Some(next) => (*next.as_ptr()).prev = None,
                None => self.tail = None,
            }
            self.len -= 1;
            Some(node.val)
        }
    }

    /// Removes and returns the back value.
    pub fn pop_back(&mut self) -> Option<T> {
        let tail = self.tail?;
        // SAFETY: `tail` is owned by this list and is unlinked before the
        // box is reclaimed.
        unsafe {
            let node = Box::from_raw(tail.as_ptr());
            self.tail = node.prev;
            match self.tail {
                Some(prev) => (*prev.as_ptr()).next = None,
                None => self.head = None,
            }
            self.len -= 1;
            Some(node.val)
        }
    }

    /// The front value, if any.
    pub fn front(&self) -> Option<&T> {
        // SAFETY: the head is owned by this list.
        self.head.map(|n| unsafe { &(*n.as_ptr()).val })
    }

    /// The back value, if any.
    pub fn back(&self) -> Option<&T> {
        // SAFETY: the tail is owned by this list.
        self.tail.map(|n| unsafe { &(*n.as_ptr()).val })
    }

    /// Mutable access to the front value.
    pub fn front_mut(&mut self) -> Option<&mut T> {
        // SAFETY: the head is owned by this list; `&mut self` is exclusive.
        self.head.map(|n| unsafe { &mut (*n.as_ptr()).val })
    }

    /// Mutable access to the back value.
    pub fn back_mut(&mut self) -> Option<&mut T> {
        // SAFETY: the tail is owned by this list; `&mut self` is exclusive.
        self.tail.map(|n| unsafe { &mut (*n.as_ptr()).val })
    }

    /// Drops every value in the list.
    pub fn clear(&mut self) {
        while self.pop_front().is_some() {}
    }

    /// A front-to-back iterator.
    pub fn iter(&self) -> DListIter<'_, T> {
        DListIter {
            next: self.head,
            marker: PhantomData,
        }
    }
}

impl<T> Default for DList<T> {
    fn default() -> DList<T> {
        DList::new()
    }
}

impl<T> Drop for DList<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: fmt::Debug> fmt::Debug for DList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> FromIterator<T> for DList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> DList<T> {
        let mut list = DList::new();
        for val in iter {
            list.push_back(val);
        }
        list
    }
}

impl<'a, T> IntoIterator for &'a DList<T> {
    type Item = &'a T;
    type IntoIter = DListIter<'a, T>;

    fn into_iter(self) -> DListIter<'a, T> {
        self.iter()
    }
}

/// Front-to-back iterator over a [`DList`]. Created by [`DList::iter`].
pub struct DListIter<'a, T> {
    next: Option<NonNull<DNode<T>>>,
    marker: PhantomData<&'a DNode<T>>,
}

impl<'a, T> Iterator for DListIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let n = self.next?;
        // SAFETY: the iterator borrows the list, so nodes stay live for 'a.
        unsafe {
            self.next = (*n.as_ptr()).next;
            Some(&(*n.as_ptr()).val)
        }
    }
}

impl<T> fmt::Debug for DListIter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DListIter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec::Vec;

    use super::*;

    #[test]
    fn push_pop_both_ends() {
        let mut list = DList::new();
        list.push_back(2);
        list.push_front(1);
        list.push_back(3);
        assert_eq!(list.len(), 3);
        assert_eq!(list.front(), Some(&1));
        assert_eq!(list.back(), Some(&3));
        assert_eq!(list.pop_front(), Some(1));
        assert_eq!(list.pop_back(), Some(3));
        assert_eq!(list.pop_back(), Some(2));
        assert_eq!(list.pop_back(), None);
        assert!(list.is_empty());
    }

    #[test]
    fn queue_discipline() {
        let mut list = DList::new();
        for i in 0..5 {
            list.push_back(i);
        }
        let drained: Vec<i32> = core::iter::from_fn(|| list.pop_front()).collect();
        assert_eq!(drained, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn stack_discipline() {
        let mut list = DList::new();
        for i in 0..5 {
            list.push_front(i);
        }
        let drained: Vec<i32> = core::iter::from_fn(|| list.pop_front()).collect();
        assert_eq!(drained, [4, 3, 2, 1, 0]);
    }

    #[test]
    fn iter_walks_front_to_back() {
        let list: DList<i32> = (1..=4).collect();
        let seen: Vec<i32> = list.iter().copied().collect();
        assert_eq!(seen, [1, 2, 3, 4]);
    }

    #[test]
    fn front_mut_edits_in_place() {
        let mut list: DList<i32> = (1..=3).collect();
        *list.front_mut().unwrap() += 10;
        *list.back_mut().unwrap() += 20;
        let seen: Vec<i32> = list.iter().copied().collect();
        assert_eq!(seen, [11, 2, 23]);
    }

    #[test]
    fn clear_empties_and_list_is_reusable() {
        let mut list: DList<i32> = (1..=3).collect();
        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.front(), None);
        list.push_back(9);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn drop_releases_nodes() {
        // Mostly a leak-checker target; must not double-free.
        let list: DList<std::string::String> =
            (0..100).map(|i| std::format!("v{i}")).collect();
        drop(list);
    }
}
