use std::fmt::{self, Debug};
use std::iter::FusedIterator;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::error::{invariant_violation, CollectionError, Result};
use crate::node::{Node, NodeArena, NodeHandle};

// Internal doubly linked list implementation.
//
// Not synchronized: `RecencyList` and the caches wrap it in their own lock and
// only touch it while holding that lock. Every node is owned by `arena`;
// `head`, `tail` and the node links are plain handles into it.
#[derive(Debug)]
pub(crate) struct RawList<T> {
    arena: NodeArena<T>,
    head: Option<NodeHandle>,
    tail: Option<NodeHandle>,
}

impl<T> RawList<T> {
    pub(crate) fn new() -> Self {
        Self::with_capacity(0)
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: NodeArena::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.arena.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }

    pub(crate) fn head(&self) -> Option<NodeHandle> {
        self.head
    }

    pub(crate) fn tail(&self) -> Option<NodeHandle> {
        self.tail
    }

    fn node(&self, handle: NodeHandle) -> &Node<T> {
        match self.arena.get(handle) {
            Some(node) => node,
            None => invariant_violation(format_args!("stale node handle {handle:?}")),
        }
    }

    fn node_mut(&mut self, handle: NodeHandle) -> &mut Node<T> {
        match self.arena.get_mut(handle) {
            Some(node) => node,
            None => invariant_violation(format_args!("stale node handle {handle:?}")),
        }
    }

    pub(crate) fn get(&self, handle: NodeHandle) -> &T {
        &self.node(handle).value
    }

    pub(crate) fn right_of(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.node(handle).right
    }

    pub(crate) fn left_of(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.node(handle).left
    }

    // Insert a value at the front of the list
    pub(crate) fn push_front(&mut self, value: T) -> NodeHandle {
        match self.head {
            Some(head) => self.insert_before(head, value),
            None => self.push_first(value),
        }
    }

    // Insert a value at the back of the list
    pub(crate) fn push_back(&mut self, value: T) -> NodeHandle {
        match self.tail {
            Some(tail) => self.insert_after(tail, value),
            None => self.push_first(value),
        }
    }

    fn push_first(&mut self, value: T) -> NodeHandle {
        let handle = self.arena.insert(Node::new(value));
        self.head = Some(handle);
        self.tail = Some(handle);
        handle
    }

    // Splice a new node right after `at`
    pub(crate) fn insert_after(&mut self, at: NodeHandle, value: T) -> NodeHandle {
        let right = self.node(at).right;
        let handle = self.arena.insert(Node {
            value,
            left: Some(at),
            right,
        });
        self.node_mut(at).right = Some(handle);
        match right {
            Some(right) => self.node_mut(right).left = Some(handle),
            None => self.tail = Some(handle),
        }
        handle
    }

    // Splice a new node right before `at`
    pub(crate) fn insert_before(&mut self, at: NodeHandle, value: T) -> NodeHandle {
        let left = self.node(at).left;
        let handle = self.arena.insert(Node {
            value,
            left,
            right: Some(at),
        });
        self.node_mut(at).left = Some(handle);
        match left {
            Some(left) => self.node_mut(left).right = Some(handle),
            None => self.head = Some(handle),
        }
        handle
    }

    // Bridge the neighbours of `handle` and clear its own links.
    // The node stays in the arena.
    fn detach(&mut self, handle: NodeHandle) {
        let node = self.node_mut(handle);
        let (left, right) = (node.left.take(), node.right.take());

        match left {
            Some(left) => self.node_mut(left).right = right,
            None => self.head = right,
        }
        match right {
            Some(right) => self.node_mut(right).left = left,
            None => self.tail = left,
        }
    }

    // Link a detached node in as the new head
    fn attach_front(&mut self, handle: NodeHandle) {
        let old_head = self.head;
        {
            let node = self.node_mut(handle);
            node.left = None;
            node.right = old_head;
        }
        match old_head {
            Some(old_head) => self.node_mut(old_head).left = Some(handle),
            None => self.tail = Some(handle),
        }
        self.head = Some(handle);
    }

    /// Removes the node behind `handle` in O(1) and returns its value.
    ///
    /// The handle must belong to a node currently linked into this list.
    pub(crate) fn unlink(&mut self, handle: NodeHandle) -> T {
        self.detach(handle);
        match self.arena.remove(handle) {
            Some(node) => node.value,
            None => invariant_violation(format_args!("unlinked node {handle:?} has no slot")),
        }
    }

    // Relink an existing node as the head without reallocating it
    pub(crate) fn move_to_front(&mut self, handle: NodeHandle) {
        if self.head == Some(handle) {
            return;
        }
        self.detach(handle);
        self.attach_front(handle);
    }

    pub(crate) fn pop_back(&mut self) -> Option<T> {
        self.tail.map(|tail| self.unlink(tail))
    }

    pub(crate) fn pop_front(&mut self) -> Option<T> {
        self.head.map(|head| self.unlink(head))
    }

    /// Locates the node at `index`, walking from whichever end is closer.
    pub(crate) fn handle_at(&self, index: usize) -> Option<NodeHandle> {
        let len = self.len();
        if index >= len {
            return None;
        }

        if index > len / 2 {
            let mut current = self.tail?;
            for _ in 0..(len - 1 - index) {
                current = self.left_of(current)?;
            }
            Some(current)
        } else {
            let mut current = self.head?;
            for _ in 0..index {
                current = self.right_of(current)?;
            }
            Some(current)
        }
    }

    pub(crate) fn clear(&mut self) {
        self.arena.clear();
        self.head = None;
        self.tail = None;
    }

    // Borrowing traversal, head to tail
    pub(crate) fn iter(&self) -> RawIter<'_, T> {
        RawIter {
            list: self,
            cursor: self.head,
        }
    }

    fn step(&self, handle: NodeHandle, direction: Direction) -> (&T, Option<NodeHandle>) {
        let node = self.node(handle);
        let next = match direction {
            Direction::Forward => node.right,
            Direction::Backward => node.left,
        };
        (&node.value, next)
    }
}

impl<T> Default for RawList<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

pub(crate) struct RawIter<'a, T> {
    list: &'a RawList<T>,
    cursor: Option<NodeHandle>,
}

impl<'a, T> Iterator for RawIter<'a, T> {
    type Item = (NodeHandle, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        let (value, next) = self.list.step(handle, Direction::Forward);
        self.cursor = next;
        Some((handle, value))
    }
}

/// A thread-safe doubly linked list.
///
/// Every operation takes the list's lock for its whole duration. Mutations
/// take the write lock; `len`, peeks, searches and traversals share the read
/// lock. Reads take it recursively, so a read nested inside a traversal on the
/// same thread does not queue behind a waiting writer.
///
/// # Examples
///
/// ```rust
/// use recency_cache::RecencyList;
///
/// let list = RecencyList::from_values([1, 3, 6]);
/// list.insert(2, 0).unwrap();
/// list.append([7]);
/// assert_eq!(list.to_vec(), vec![1, 2, 3, 6, 7]);
/// assert_eq!(list.pop(), Ok(7));
/// assert_eq!(list.dequeue(), Ok(1));
/// ```
pub struct RecencyList<T> {
    inner: RwLock<RawList<T>>,
}

impl<T> RecencyList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RawList::new()),
        }
    }

    /// Creates a list seeded with `values`, equivalent to appending each of
    /// them in order.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let list = Self::new();
        list.append(values);
        list
    }

    /// Returns the number of values in the list.
    pub fn len(&self) -> usize {
        self.inner.read_recursive().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read_recursive().is_empty()
    }

    /// Adds each value at the end of the list, in order.
    pub fn append<I>(&self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        let mut list = self.inner.write();
        for value in values {
            list.push_back(value);
        }
    }

    /// Adds each value at the start of the list, one after another.
    ///
    /// `prepend([1, 2, 3])` on an empty list leaves it as `[3, 2, 1]`.
    pub fn prepend<I>(&self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        let mut list = self.inner.write();
        for value in values {
            list.push_front(value);
        }
    }

    pub fn push_back(&self, value: T) {
        self.inner.write().push_back(value);
    }

    pub fn push_front(&self, value: T) {
        self.inner.write().push_front(value);
    }

    /// Inserts `value` right after the value at index `after`.
    ///
    /// Inserting after the last index is the same as appending. Use
    /// [`prepend`](Self::prepend) to insert at the start.
    ///
    /// # Errors
    ///
    /// [`CollectionError::IndexOutOfRange`] if `after >= len()`.
    pub fn insert(&self, value: T, after: usize) -> Result<()> {
        let mut list = self.inner.write();
        let len = list.len();
        if after >= len {
            return Err(CollectionError::IndexOutOfRange { index: after, len });
        }

        if after == len - 1 {
            list.push_back(value);
        } else {
            let at = list
                .handle_at(after)
                .ok_or(CollectionError::IndexOutOfRange { index: after, len })?;
            list.insert_after(at, value);
        }
        Ok(())
    }

    /// Removes and returns the last value.
    pub fn pop(&self) -> Result<T> {
        self.inner.write().pop_back().ok_or(CollectionError::IsEmpty)
    }

    /// Removes and returns the first value.
    pub fn dequeue(&self) -> Result<T> {
        self.inner.write().pop_front().ok_or(CollectionError::IsEmpty)
    }

    /// Removes and returns the value at index `at`.
    ///
    /// # Errors
    ///
    /// [`CollectionError::IsEmpty`] on an empty list,
    /// [`CollectionError::IndexOutOfRange`] if `at >= len()`.
    pub fn remove(&self, at: usize) -> Result<T> {
        let mut list = self.inner.write();
        let len = list.len();
        if len == 0 {
            return Err(CollectionError::IsEmpty);
        }
        if at >= len {
            return Err(CollectionError::IndexOutOfRange { index: at, len });
        }

        let removed = if at == 0 {
            list.pop_front()
        } else if at == len - 1 {
            list.pop_back()
        } else {
            list.handle_at(at).map(|handle| list.unlink(handle))
        };
        removed.ok_or(CollectionError::IndexOutOfRange { index: at, len })
    }

    /// Returns the index of the first value for which `equal(value, target)`
    /// holds.
    pub fn search<F>(&self, target: &T, equal: F) -> Result<usize>
    where
        F: Fn(&T, &T) -> bool,
    {
        self.inner
            .read_recursive()
            .iter()
            .position(|(_, value)| equal(value, target))
            .ok_or(CollectionError::NotFound)
    }

    /// Removes every value.
    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

impl<T: Clone> RecencyList<T> {
    /// Returns a copy of the value at index `at`.
    pub fn index(&self, at: usize) -> Result<T> {
        let list = self.inner.read_recursive();
        let len = list.len();
        list.handle_at(at)
            .map(|handle| list.get(handle).clone())
            .ok_or(CollectionError::IndexOutOfRange { index: at, len })
    }

    /// Returns a copy of the first value without removing it.
    pub fn front(&self) -> Result<T> {
        let list = self.inner.read_recursive();
        list.head()
            .map(|head| list.get(head).clone())
            .ok_or(CollectionError::IsEmpty)
    }

    /// Returns a copy of the last value without removing it.
    pub fn back(&self) -> Result<T> {
        let list = self.inner.read_recursive();
        list.tail()
            .map(|tail| list.get(tail).clone())
            .ok_or(CollectionError::IsEmpty)
    }

    /// Returns an iterator over `(index, value)` pairs from head to tail.
    ///
    /// The iterator holds the list's read lock until it is dropped, so
    /// breaking out of a loop early releases it too. Read-only calls such as
    /// [`len`](Self::len) or [`front`](Self::front) are fine inside the loop;
    /// calling a mutating method on the same list while the iterator is alive
    /// deadlocks.
    ///
    /// ```rust
    /// use recency_cache::RecencyList;
    ///
    /// let list = RecencyList::from_values(["a", "b", "c"]);
    /// for (idx, value) in list.all() {
    ///     if idx == 1 {
    ///         assert_eq!(value, "b");
    ///         break;
    ///     }
    /// }
    /// list.push_back("d");
    /// ```
    pub fn all(&self) -> Iter<'_, T> {
        let list = self.inner.read_recursive();
        let cursor = list.head();
        let remaining = list.len();
        Iter {
            list,
            cursor,
            index: 0,
            remaining,
            direction: Direction::Forward,
        }
    }

    /// Returns an iterator over `(index, value)` pairs from tail to head.
    ///
    /// Indices count from the head, so the first pair is `(len - 1, last)`.
    /// Locking behaves as for [`all`](Self::all).
    pub fn backward(&self) -> Iter<'_, T> {
        let list = self.inner.read_recursive();
        let cursor = list.tail();
        let remaining = list.len();
        Iter {
            list,
            cursor,
            index: remaining.saturating_sub(1),
            remaining,
            direction: Direction::Backward,
        }
    }

    /// Copies the values into a `Vec`, head first.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner
            .read_recursive()
            .iter()
            .map(|(_, value)| value.clone())
            .collect()
    }
}

impl<T> Default for RecencyList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for RecencyList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_values(iter)
    }
}

impl<T> Extend<T> for RecencyList<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let list = self.inner.get_mut();
        for value in iter {
            list.push_back(value);
        }
    }
}

impl<T: Debug> Debug for RecencyList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = self.inner.read_recursive();
        f.debug_list()
            .entries(list.iter().map(|(_, value)| value))
            .finish()
    }
}

/// Lock-holding iterator returned by [`RecencyList::all`] and
/// [`RecencyList::backward`].
pub struct Iter<'a, T> {
    list: RwLockReadGuard<'a, RawList<T>>,
    cursor: Option<NodeHandle>,
    index: usize,
    remaining: usize,
    direction: Direction,
}

impl<T: Clone> Iterator for Iter<'_, T> {
    type Item = (usize, T);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        let (value, next) = self.list.step(handle, self.direction);
        let item = (self.index, value.clone());

        self.cursor = next;
        self.remaining -= 1;
        match self.direction {
            Direction::Forward => self.index += 1,
            Direction::Backward => self.index = self.index.saturating_sub(1),
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T: Clone> ExactSizeIterator for Iter<'_, T> {}

impl<T: Clone> FusedIterator for Iter<'_, T> {}
