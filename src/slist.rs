//! A singly linked list with a tail pointer.
//!
//! Half the link overhead of [`DList`](crate::dlist::DList) when traversal
//! only ever runs one way. The tail pointer keeps `push_back` O(1), so the
//! list still works as a FIFO queue; there is no `pop_back`.

extern crate alloc;

use alloc::boxed::Box;
use core::fmt;
use core::marker::PhantomData;
use core::ptr::NonNull;

struct SNode<T> {
    next: Option<NonNull<SNode<T>>>,
    val: T,
}

/// An owning singly linked list.
pub struct SList<T> {
    head: Option<NonNull<SNode<T>>>,
    tail: Option<NonNull<SNode<T>>>,
    len: usize,
}

// SAFETY: the list owns every node; moving it moves that ownership.
unsafe impl<T: Send> Send for SList<T> {}
// SAFETY: shared access is read-only; mutation requires `&mut`.
unsafe impl<T: Sync> Sync for SList<T> {}

impl<T> SList<T> {
    /// Creates an empty list.
    pub fn new() -> SList<T> {
        SList {
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
        let node = NonNull::from(Box::leak(Box::new(SNode {
            next: self.head,
            val,
        })));
        if self.head.is_none() {
            self.tail = Some(node);
        }
        self.head = Some(node);
        self.len += 1;
    }

    /// Adds a value at the back.
    pub fn push_back(&mut self, val: T) {
        let node = NonNull::from(Box::leak(Box::new(SNode { next: None, val })));
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
            if self.head.is_none() {
                self.tail = None;
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

    /// Mutable access to the front value.
    pub fn front_mut(&mut self) -> Option<&mut T> {
        // SAFETY: the head is owned by this list; `&mut self` is exclusive.
        self.head.map(|n| unsafe { &mut (*n.as_ptr()).val })
    }

    /// Drops every value in the list.
    pub fn clear(&mut self) {
        while self.pop_front().is_some() {}
    }

    /// A front-to-back iterator.
    pub fn iter(&self) -> SListIter<'_, T> {
        SListIter {
            next: self.head,
            marker: PhantomData,
        }
    }
}

impl<T> Default for SList<T> {
    fn default() -> SList<T> {
        SList::new()
    }
}

impl<T> Drop for SList<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: fmt::Debug> fmt::Debug for SList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> FromIterator<T> for SList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> SList<T> {
        let mut list = SList::new();
        for val in iter {
            list.push_back(val);
        }
        list
    }
}

impl<'a, T> IntoIterator for &'a SList<T> {
    type Item = &'a T;
    type IntoIter = SListIter<'a, T>;

    fn into_iter(self) -> SListIter<'a, T> {
        self.iter()
    }
}

/// Front-to-back iterator over an [`SList`]. Created by [`SList::iter`].
pub struct SListIter<'a, T> {
    next: Option<NonNull<SNode<T>>>,
    marker: PhantomData<&'a SNode<T>>,
}

impl<'a, T> Iterator for SListIter<'a, T> {
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

impl<T> fmt::Debug for SListIter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SListIter").finish_non_exhaustive()
    }
}
