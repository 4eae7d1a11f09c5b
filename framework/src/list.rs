//! Index-linked lists
//!
//! Nodes live in an [`Arena`] and are addressed by [`NodeId`]. A [`List`] is
//! a small `Copy` head (first, last, length) that threads through arena
//! nodes, so several lists (free list, queues, per-entity lists) can share
//! one fixed-capacity arena. A node belongs to at most one list at a time.

use alloc::vec::Vec;

/// Handle of a node in an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    linked: bool,
}

/// Head of a doubly-linked list over an [`Arena`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct List {
    head: Option<NodeId>,
    tail: Option<NodeId>,
    len: usize,
}

impl List {
    pub const fn new() -> Self {
        Self { head: None, tail: None, len: 0 }
    }

    pub const fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn head(&self) -> Option<NodeId> {
        self.head
    }
}

/// Node storage shared by any number of [`List`]s.
#[derive(Debug)]
pub struct Arena<T> {
    nodes: Vec<Node<T>>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub const fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { nodes: Vec::with_capacity(capacity) }
    }

    /// Adds an unlinked node holding `value`.
    pub fn insert(&mut self, value: T) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { value, prev: None, next: None, linked: false });
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> &T {
        &self.nodes[id.index()].value
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut T {
        &mut self.nodes[id.index()].value
    }

    pub fn is_linked(&self, id: NodeId) -> bool {
        self.nodes[id.index()].linked
    }

    /// Appends `id` to the end of `list`.
    ///
    /// # Panics
    ///
    /// If the node already belongs to a list.
    pub fn push_tail(&mut self, list: &mut List, id: NodeId) {
        let node = &mut self.nodes[id.index()];
        assert!(!node.linked, "list node {} linked twice", id.0);
        node.linked = true;
        node.prev = list.tail;
        node.next = None;

        match list.tail {
            Some(tail) => self.nodes[tail.index()].next = Some(id),
            None => list.head = Some(id),
        }
        list.tail = Some(id);
        list.len += 1;
    }

    /// Inserts `id` at the front of `list`.
    ///
    /// # Panics
    ///
    /// If the node already belongs to a list.
    pub fn push_head(&mut self, list: &mut List, id: NodeId) {
        let node = &mut self.nodes[id.index()];
        assert!(!node.linked, "list node {} linked twice", id.0);
        node.linked = true;
        node.prev = None;
        node.next = list.head;

        match list.head {
            Some(head) => self.nodes[head.index()].prev = Some(id),
            None => list.tail = Some(id),
        }
        list.head = Some(id);
        list.len += 1;
    }

    /// Unlinks and returns the first node of `list`.
    pub fn pop_head(&mut self, list: &mut List) -> Option<NodeId> {
        let head = list.head?;
        self.remove(list, head);
        Some(head)
    }

    /// Unlinks `id` from `list`.
    ///
    /// # Panics
    ///
    /// If the node is not linked, or the list's ends disagree with the
    /// node's links (the node belongs to another list).
    pub fn remove(&mut self, list: &mut List, id: NodeId) {
        let (prev, next) = {
            let node = &self.nodes[id.index()];
            assert!(node.linked, "list node {} is not linked", id.0);
            (node.prev, node.next)
        };

        match prev {
            Some(prev) => self.nodes[prev.index()].next = next,
            None => {
                assert_eq!(list.head, Some(id), "list node {} not in this list", id.0);
                list.head = next;
            }
        }
        match next {
            Some(next) => self.nodes[next.index()].prev = prev,
            None => {
                assert_eq!(list.tail, Some(id), "list node {} not in this list", id.0);
                list.tail = prev;
            }
        }

        let node = &mut self.nodes[id.index()];
        node.prev = None;
        node.next = None;
        node.linked = false;
        list.len -= 1;
    }

    /// Node after `id` in whichever list holds it.
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].next
    }

    pub fn iter<'a>(&'a self, list: &List) -> Iter<'a, T> {
        Iter { arena: self, cursor: list.head }
    }

    /// First node of `list` whose value matches `pred`.
    pub fn find<F>(&self, list: &List, mut pred: F) -> Option<NodeId>
    where
        F: FnMut(&T) -> bool,
    {
        self.iter(list).find(|(_, value)| pred(value)).map(|(id, _)| id)
    }

    pub fn contains(&self, list: &List, id: NodeId) -> bool {
        self.iter(list).any(|(node, _)| node == id)
    }
}

/// Iterator over the nodes of one list, head to tail.
pub struct Iter<'a, T> {
    arena: &'a Arena<T>,
    cursor: Option<NodeId>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (NodeId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let node = &self.arena.nodes[id.index()];
        self.cursor = node.next;
        Some((id, &node.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn values(arena: &Arena<u32>, list: &List) -> Vec<u32> {
        arena.iter(list).map(|(_, v)| *v).collect()
    }

    #[test]
    fn fifo_order() {
        let mut arena = Arena::new();
        let mut list = List::new();
        for v in 0..4 {
            let id = arena.insert(v);
            arena.push_tail(&mut list, id);
        }
        assert_eq!(list.len(), 4);
        assert_eq!(values(&arena, &list), vec![0, 1, 2, 3]);

        let first = arena.pop_head(&mut list).unwrap();
        assert_eq!(*arena.get(first), 0);
        assert!(!arena.is_linked(first));
        assert_eq!(values(&arena, &list), vec![1, 2, 3]);
    }

    #[test]
    fn lists_share_an_arena() {
        let mut arena = Arena::new();
        let mut free = List::new();
        let mut busy = List::new();
        let ids: Vec<_> = (0..3).map(|v| arena.insert(v)).collect();
        for &id in &ids {
            arena.push_tail(&mut free, id);
        }

        let moved = arena.pop_head(&mut free).unwrap();
        arena.push_head(&mut busy, moved);
        assert_eq!(values(&arena, &free), vec![1, 2]);
        assert_eq!(values(&arena, &busy), vec![0]);
        assert!(arena.contains(&busy, moved));
        assert!(!arena.contains(&free, moved));
    }

    #[test]
    fn remove_from_middle_and_ends() {
        let mut arena = Arena::new();
        let mut list = List::new();
        let ids: Vec<_> = (0..5).map(|v| arena.insert(v)).collect();
        for &id in &ids {
            arena.push_tail(&mut list, id);
        }

        arena.remove(&mut list, ids[2]);
        arena.remove(&mut list, ids[0]);
        arena.remove(&mut list, ids[4]);
        assert_eq!(values(&arena, &list), vec![1, 3]);
        assert_eq!(arena.find(&list, |v| *v == 3), Some(ids[3]));
        assert_eq!(arena.find(&list, |v| *v == 2), None);

        arena.remove(&mut list, ids[1]);
        arena.remove(&mut list, ids[3]);
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
        assert_eq!(arena.pop_head(&mut list), None);
    }

    #[test]
    #[should_panic]
    fn double_link_panics() {
        let mut arena = Arena::new();
        let mut a = List::new();
        let mut b = List::new();
        let id = arena.insert(1u32);
        arena.push_tail(&mut a, id);
        arena.push_tail(&mut b, id);
    }

    #[test]
    #[should_panic]
    fn remove_from_wrong_list_panics() {
        let mut arena = Arena::new();
        let mut a = List::new();
        let mut b = List::new();
        let id = arena.insert(1u32);
        arena.push_tail(&mut a, id);
        arena.remove(&mut b, id);
    }
}
