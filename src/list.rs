// src/list.rs

//! Ordered list with stable keys
//!
//! Every collection in the broker (registered devices, the global channel
//! pool, a device's channels, a channel's poll set) is one of these lists
//! behind its own lock. It keeps the shape of a kernel doubly-linked list
//! while storing its nodes in an [`Arena`], so membership is named by a
//! [`ListKey`] instead of an embedded pointer:
//!
//! - `push_back` / `pop_front` / `remove` are O(1)
//! - `remove` of a key that is no longer (or never was) a member is a no-op
//! - `next_circular` wraps from the tail back to the head, which is what the
//!   round-robin cursor walks
//! - `len` is maintained as a count, never recomputed

use crate::arena::{Arena, Key};

/// Membership handle returned by [`List::push_back`]
pub type ListKey = Key;

struct Node<T> {
    value: T,
    prev: Option<ListKey>,
    next: Option<ListKey>,
}

/// Counted doubly-linked list over arena nodes
pub struct List<T> {
    nodes: Arena<Node<T>>,
    head: Option<ListKey>,
    tail: Option<ListKey>,
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> List<T> {
    pub const fn new() -> Self {
        Self {
            nodes: Arena::new(),
            head: None,
            tail: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Key of the first member
    #[inline]
    pub fn front(&self) -> Option<ListKey> {
        self.head
    }

    pub fn get(&self, key: ListKey) -> Option<&T> {
        self.nodes.get(key).map(|node| &node.value)
    }

    /// Append at the tail
    pub fn push_back(&mut self, value: T) -> ListKey {
        let key = self.nodes.insert(Node {
            value,
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => {
                if let Some(node) = self.nodes.get_mut(tail) {
                    node.next = Some(key);
                }
            }
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        key
    }

    /// Remove and return the first member
    pub fn pop_front(&mut self) -> Option<T> {
        let head = self.head?;
        self.remove(head)
    }

    /// Unlink `key` if it is a member
    pub fn remove(&mut self, key: ListKey) -> Option<T> {
        let node = self.nodes.remove(key)?;
        match node.prev {
            Some(prev) => {
                if let Some(p) = self.nodes.get_mut(prev) {
                    p.next = node.next;
                }
            }
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => {
                if let Some(n) = self.nodes.get_mut(next) {
                    n.prev = node.prev;
                }
            }
            None => self.tail = node.prev,
        }
        Some(node.value)
    }

    /// Successor of `key`, treating the list as circular
    ///
    /// Returns `None` only if `key` is not a member.
    pub fn next_circular(&self, key: ListKey) -> Option<ListKey> {
        let node = self.nodes.get(key)?;
        node.next.or(self.head)
    }

    /// Iterate head to tail
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }
}

impl<T> core::fmt::Debug for List<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("List").field("len", &self.len()).finish()
    }
}

/// Head-to-tail iterator over values
pub struct Iter<'a, T> {
    list: &'a List<T>,
    cursor: Option<ListKey>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.cursor?;
        let node = self.list.nodes.get(key)?;
        self.cursor = node.next;
        Some(&node.value)
    }
}
