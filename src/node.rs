//! Node storage for the doubly linked list.
//!
//! Nodes live in slots of a [`NodeArena`] and refer to their neighbours by
//! [`NodeHandle`] instead of by pointer. A handle carries the generation of the
//! slot it was issued for, so a handle kept after its node was unlinked is
//! rejected rather than silently resolving to whatever reused the slot.

use crate::error::invariant_violation;

/// Non-owning reference to a node inside a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeHandle {
    slot: usize,
    generation: u64,
}

// A unit of storage in the list
#[derive(Debug)]
pub(crate) struct Node<T> {
    pub(crate) value: T,
    // Previous node, `None` at the head
    pub(crate) left: Option<NodeHandle>,
    // Next node, `None` at the tail
    pub(crate) right: Option<NodeHandle>,
}

impl<T> Node<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            value,
            left: None,
            right: None,
        }
    }
}

#[derive(Debug)]
enum Slot<T> {
    Occupied { generation: u64, node: Node<T> },
    Vacant { generation: u64, next_free: Option<usize> },
}

/// Slot store owning every node of one list.
///
/// Freed slots are chained into a free list and reused by later inserts with
/// a bumped generation.
#[derive(Debug)]
pub(crate) struct NodeArena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<usize>,
    len: usize,
}

impl<T> NodeArena<T> {
    pub(crate) fn new() -> Self {
        Self::with_capacity(0)
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    // Store a node and hand out a fresh handle for it
    pub(crate) fn insert(&mut self, node: Node<T>) -> NodeHandle {
        self.len += 1;
        match self.free_head {
            Some(slot) => {
                let generation = match self.slots[slot] {
                    Slot::Vacant {
                        generation,
                        next_free,
                    } => {
                        self.free_head = next_free;
                        generation + 1
                    }
                    Slot::Occupied { .. } => invariant_violation(format_args!(
                        "free list points at occupied slot {slot}"
                    )),
                };
                self.slots[slot] = Slot::Occupied { generation, node };
                NodeHandle { slot, generation }
            }
            None => {
                let slot = self.slots.len();
                self.slots.push(Slot::Occupied {
                    generation: 0,
                    node,
                });
                NodeHandle {
                    slot,
                    generation: 0,
                }
            }
        }
    }

    // Release the slot behind `handle`, returning its node
    pub(crate) fn remove(&mut self, handle: NodeHandle) -> Option<Node<T>> {
        match self.slots.get(handle.slot) {
            Some(Slot::Occupied { generation, .. }) if *generation == handle.generation => {}
            _ => return None,
        }
        let vacant = Slot::Vacant {
            generation: handle.generation,
            next_free: self.free_head,
        };
        self.free_head = Some(handle.slot);
        self.len -= 1;
        match std::mem::replace(&mut self.slots[handle.slot], vacant) {
            Slot::Occupied { node, .. } => Some(node),
            Slot::Vacant { .. } => None,
        }
    }

    pub(crate) fn get(&self, handle: NodeHandle) -> Option<&Node<T>> {
        match self.slots.get(handle.slot) {
            Some(Slot::Occupied { generation, node }) if *generation == handle.generation => {
                Some(node)
            }
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut Node<T>> {
        match self.slots.get_mut(handle.slot) {
            Some(Slot::Occupied { generation, node }) if *generation == handle.generation => {
                Some(node)
            }
            _ => None,
        }
    }

    // Drop every node but keep the slots, so handles issued before the
    // clear stay stale once the slots are reused
    pub(crate) fn clear(&mut self) {
        let mut next_free = None;
        for (slot, entry) in self.slots.iter_mut().enumerate().rev() {
            let generation = match entry {
                Slot::Occupied { generation, .. } | Slot::Vacant { generation, .. } => *generation,
            };
            *entry = Slot::Vacant {
                generation,
                next_free,
            };
            next_free = Some(slot);
        }
        self.free_head = next_free;
        self.len = 0;
    }
}

impl<T> Default for NodeArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut arena = NodeArena::new();
        let a = arena.insert(Node::new("a"));
        let b = arena.insert(Node::new("b"));

        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a).map(|n| n.value), Some("a"));
        assert_eq!(arena.get(b).map(|n| n.value), Some("b"));
    }

    #[test]
    fn test_stale_handle_is_rejected() {
        let mut arena = NodeArena::new();
        let a = arena.insert(Node::new(1));
        assert_eq!(arena.remove(a).map(|n| n.value), Some(1));
        assert!(arena.remove(a).is_none());

        // The freed slot is reused under a new generation
        let b = arena.insert(Node::new(2));
        assert_ne!(a, b);
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b).map(|n| n.value), Some(2));
        assert_eq!(arena.slots.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut arena = NodeArena::new();
        let a = arena.insert(Node::new(1));
        arena.insert(Node::new(2));
        arena.clear();

        assert_eq!(arena.len(), 0);
        assert!(arena.get(a).is_none());
    }

    #[test]
    fn test_handles_from_before_clear_stay_stale() {
        let mut arena = NodeArena::new();
        let a = arena.insert(Node::new(1));
        let b = arena.insert(Node::new(2));
        arena.remove(b);
        arena.clear();

        // Both slots are reused, lowest first, under new generations
        let c = arena.insert(Node::new(3));
        let d = arena.insert(Node::new(4));
        assert_eq!(arena.slots.len(), 2);
        assert_eq!(c.slot, a.slot);
        assert_eq!(d.slot, b.slot);
        assert!(arena.get(a).is_none());
        assert!(arena.get(b).is_none());
        assert!(arena.remove(a).is_none());
        assert_eq!(arena.get(c).map(|n| n.value), Some(3));
        assert_eq!(arena.get(d).map(|n| n.value), Some(4));
        assert_eq!(arena.len(), 2);
    }
}
