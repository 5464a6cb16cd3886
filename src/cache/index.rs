//! Recency ordering for LRU eviction.
//!
//! [`EvictionIndex`] is an intrusive doubly-linked list stored in a slab
//! (`Vec` of nodes addressed by position) plus a `key → position` map.
//! Promotion, insertion, arbitrary removal and popping the least recently
//! used key are all O(1) and independent of capacity.
//!
//! Freed slots go on a free list and are reused by later insertions. A
//! freed slot keeps no key and no links, so a reinserted key always gets a
//! fresh position and the map never points at a stale slot.

use std::collections::HashMap;

/// Sentinel for "no neighbour".
const NIL: usize = usize::MAX;

#[derive(Debug, Clone)]
struct Node {
    key: String,
    /// Towards the most recently used end.
    prev: usize,
    /// Towards the least recently used end.
    next: usize,
}

/// Total recency order over a set of keys, most recently used first.
#[derive(Debug, Clone)]
pub struct EvictionIndex {
    nodes: Vec<Node>,
    free: Vec<usize>,
    positions: HashMap<String, usize>,
    /// Most recently used.
    head: usize,
    /// Least recently used.
    tail: usize,
}

impl EvictionIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty index with room for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            positions: HashMap::with_capacity(capacity),
            head: NIL,
            tail: NIL,
        }
    }

    /// Number of keys tracked.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the index tracks no keys.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Whether `key` is tracked.
    pub fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    /// Make `key` the most recently used, inserting it if absent.
    pub fn insert(&mut self, key: &str) {
        if self.touch(key) {
            return;
        }
        let idx = self.allocate(key.to_string());
        self.link_front(idx);
        self.positions.insert(key.to_string(), idx);
    }

    /// Promote `key` to most recently used.
    ///
    /// Returns `false` if the key is not tracked.
    pub fn touch(&mut self, key: &str) -> bool {
        let Some(&idx) = self.positions.get(key) else {
            return false;
        };
        if self.head != idx {
            self.unlink(idx);
            self.link_front(idx);
        }
        true
    }

    /// Stop tracking `key`.
    ///
    /// Returns `false` if the key was not tracked.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.positions.remove(key) {
            Some(idx) => {
                self.release(idx);
                true
            }
            None => false,
        }
    }

    /// Remove and return the least recently used key.
    pub fn pop_lru(&mut self) -> Option<String> {
        if self.tail == NIL {
            return None;
        }
        let idx = self.tail;
        let key = self.release(idx);
        self.positions.remove(&key);
        Some(key)
    }

    /// The least recently used key, without removing it.
    pub fn peek_lru(&self) -> Option<&str> {
        (self.tail != NIL).then(|| self.nodes[self.tail].key.as_str())
    }

    /// The most recently used key.
    pub fn peek_mru(&self) -> Option<&str> {
        (self.head != NIL).then(|| self.nodes[self.head].key.as_str())
    }

    /// Forget every key and release all slots.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.positions.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    /// Keys from least to most recently used (eviction order).
    pub fn iter_lru(&self) -> Iter<'_> {
        Iter {
            index: self,
            cursor: self.tail,
            towards_mru: true,
            remaining: self.len(),
        }
    }

    /// Keys from most to least recently used.
    pub fn iter_mru(&self) -> Iter<'_> {
        Iter {
            index: self,
            cursor: self.head,
            towards_mru: false,
            remaining: self.len(),
        }
    }

    // -- slab management ---------------------------------------------------

    fn allocate(&mut self, key: String) -> usize {
        let node = Node {
            key,
            prev: NIL,
            next: NIL,
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Unlink `idx`, blank it, put it on the free list and return its key.
    fn release(&mut self, idx: usize) -> String {
        self.unlink(idx);
        let node = &mut self.nodes[idx];
        node.prev = NIL;
        node.next = NIL;
        let key = std::mem::take(&mut node.key);
        self.free.push(idx);
        key
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = &self.nodes[idx];
            (node.prev, node.next)
        };
        if prev == NIL {
            self.head = next;
        } else {
            self.nodes[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.nodes[next].prev = prev;
        }
    }

    fn link_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = &mut self.nodes[idx];
            node.prev = NIL;
            node.next = old_head;
        }
        if old_head == NIL {
            self.tail = idx;
        } else {
            self.nodes[old_head].prev = idx;
        }
        self.head = idx;
    }
}

impl Default for EvictionIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over keys in recency order. See [`EvictionIndex::iter_lru`].
pub struct Iter<'a> {
    index: &'a EvictionIndex,
    cursor: usize,
    towards_mru: bool,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }
        let node = &self.index.nodes[self.cursor];
        self.cursor = if self.towards_mru { node.prev } else { node.next };
        self.remaining = self.remaining.saturating_sub(1);
        Some(node.key.as_str())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}
