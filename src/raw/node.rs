use smallvec::SmallVec;

use super::handle::Handle;

/// Inline capacity for per-node storage. Nodes at small orders live
/// entirely on the stack; larger orders spill to the heap.
const INLINE: usize = 8;

pub(crate) enum Node<K> {
    Inner(InnerNode<K>),
    Leaf(LeafNode<K>),
}

/// Routing node.
///
/// `separators[i]` is the largest key reachable through `children[i]`; the
/// last child is unbounded on the right, so `children` is always one longer
/// than `separators`.
pub(crate) struct InnerNode<K> {
    separators: SmallVec<[K; INLINE]>,
    children: SmallVec<[Handle; INLINE]>,
}

/// Terminal node holding the entries, sorted by key.
///
/// `values` are handles into the value arena, parallel to `keys`. `next`
/// refers to the successor leaf but does not own it; every leaf is owned by
/// its parent's child array.
pub(crate) struct LeafNode<K> {
    next: Option<Handle>,
    keys: SmallVec<[K; INLINE]>,
    values: SmallVec<[Handle; INLINE]>,
}

/// Result of searching for a key within a leaf.
pub(crate) enum SearchResult {
    /// Key present at this index.
    Found(usize),
    /// Key absent; this is where it would be inserted.
    Missing(usize),
}

impl<K> Node<K> {
    pub(crate) fn as_leaf(&self) -> &LeafNode<K> {
        match self {
            Node::Leaf(leaf) => leaf,
            Node::Inner(_) => panic!("expected leaf node"),
        }
    }

    pub(crate) fn as_leaf_mut(&mut self) -> &mut LeafNode<K> {
        match self {
            Node::Leaf(leaf) => leaf,
            Node::Inner(_) => panic!("expected leaf node"),
        }
    }

    pub(crate) fn as_inner(&self) -> &InnerNode<K> {
        match self {
            Node::Inner(inner) => inner,
            Node::Leaf(_) => panic!("expected inner node"),
        }
    }

    pub(crate) fn as_inner_mut(&mut self) -> &mut InnerNode<K> {
        match self {
            Node::Inner(inner) => inner,
            Node::Leaf(_) => panic!("expected inner node"),
        }
    }
}

impl<K> InnerNode<K> {
    /// Creates the inner node installed above a split root.
    pub(crate) fn new_root(separator: K, left: Handle, right: Handle) -> Self {
        let mut separators = SmallVec::new();
        separators.push(separator);
        let mut children = SmallVec::new();
        children.push(left);
        children.push(right);
        Self { separators, children }
    }

    pub(crate) fn separator_count(&self) -> usize {
        self.separators.len()
    }

    pub(crate) fn child_count(&self) -> usize {
        self.children.len()
    }

    #[inline]
    pub(crate) fn separator(&self, index: usize) -> &K {
        &self.separators[index]
    }

    #[inline]
    pub(crate) fn child(&self, index: usize) -> Handle {
        self.children[index]
    }

    pub(crate) fn set_separator(&mut self, index: usize, separator: K) {
        self.separators[index] = separator;
    }

    /// Returns the index of the child whose subtree may contain `key`.
    #[inline]
    pub(crate) fn select_child(&self, key: &K) -> usize
    where
        K: Ord,
    {
        // separators[i] bounds child i from above, so the first separator
        // >= the target names the child to descend into; past the last
        // separator the rightmost child covers everything.
        match self.separators.binary_search(key) {
            Ok(index) | Err(index) => index,
        }
    }

    /// Splices in the right half of a split child: `separator` becomes the
    /// new upper bound of `children[index]`, `right_child` lands after it.
    pub(crate) fn insert_entry(&mut self, index: usize, separator: K, right_child: Handle) {
        self.separators.insert(index, separator);
        self.children.insert(index + 1, right_child);
    }

    /// Removes `separators[index]` and the child to its right.
    pub(crate) fn remove_entry(&mut self, index: usize) -> (K, Handle) {
        let separator = self.separators.remove(index);
        let child = self.children.remove(index + 1);
        (separator, child)
    }

    /// Appends `child` as the new rightmost; `separator` bounds the child
    /// that was rightmost until now.
    pub(crate) fn push_back(&mut self, separator: K, child: Handle) {
        self.separators.push(separator);
        self.children.push(child);
    }

    /// Removes the rightmost child; the returned separator bounded the
    /// child that is rightmost after the call.
    pub(crate) fn pop_back(&mut self) -> Option<(K, Handle)> {
        let separator = self.separators.pop()?;
        let child = self.children.pop().unwrap();
        Some((separator, child))
    }

    /// Inserts `child` as the new leftmost, bounded by `separator`.
    pub(crate) fn push_front(&mut self, separator: K, child: Handle) {
        self.separators.insert(0, separator);
        self.children.insert(0, child);
    }

    /// Removes the leftmost child together with its separator.
    pub(crate) fn pop_front(&mut self) -> Option<(K, Handle)> {
        if self.separators.is_empty() {
            return None;
        }
        let separator = self.separators.remove(0);
        let child = self.children.remove(0);
        Some((separator, child))
    }

    /// Splits at the midpoint. The median separator is lifted out entirely
    /// and returned alongside the new right node; it ends up in the parent,
    /// not in either half.
    pub(crate) fn split(&mut self) -> (K, InnerNode<K>) {
        let mid = self.separators.len() / 2;
        let right = InnerNode {
            separators: self.separators.drain(mid + 1..).collect(),
            children: self.children.drain(mid + 1..).collect(),
        };
        let median = self.separators.pop().unwrap();
        (median, right)
    }

    /// Concatenates a right sibling onto this node. `separator` is pulled
    /// down from the parent and lands between the two key sequences, the
    /// inverse of the lift in [`split`](Self::split).
    pub(crate) fn merge_with_right(&mut self, separator: K, mut right: InnerNode<K>) {
        self.separators.push(separator);
        self.separators.append(&mut right.separators);
        self.children.append(&mut right.children);
    }
}

impl<K> LeafNode<K> {
    pub(crate) fn new() -> Self {
        Self {
            next: None,
            keys: SmallVec::new(),
            values: SmallVec::new(),
        }
    }

    pub(crate) fn key_count(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub(crate) fn key(&self, index: usize) -> &K {
        &self.keys[index]
    }

    #[inline]
    pub(crate) fn value(&self, index: usize) -> Handle {
        self.values[index]
    }

    pub(crate) fn last_key(&self) -> Option<&K> {
        self.keys.last()
    }

    pub(crate) fn next(&self) -> Option<Handle> {
        self.next
    }

    pub(crate) fn set_next(&mut self, next: Option<Handle>) {
        self.next = next;
    }

    #[inline]
    pub(crate) fn search(&self, key: &K) -> SearchResult
    where
        K: Ord,
    {
        match self.keys.binary_search(key) {
            Ok(index) => SearchResult::Found(index),
            Err(index) => SearchResult::Missing(index),
        }
    }

    pub(crate) fn insert(&mut self, index: usize, key: K, value: Handle) {
        self.keys.insert(index, key);
        self.values.insert(index, value);
    }

    pub(crate) fn remove(&mut self, index: usize) -> (K, Handle) {
        let key = self.keys.remove(index);
        let value = self.values.remove(index);
        (key, value)
    }

    pub(crate) fn push_back(&mut self, key: K, value: Handle) {
        self.keys.push(key);
        self.values.push(value);
    }

    pub(crate) fn push_front(&mut self, key: K, value: Handle) {
        self.keys.insert(0, key);
        self.values.insert(0, value);
    }

    pub(crate) fn pop_back(&mut self) -> Option<(K, Handle)> {
        let key = self.keys.pop()?;
        let value = self.values.pop().unwrap();
        Some((key, value))
    }

    pub(crate) fn pop_front(&mut self) -> Option<(K, Handle)> {
        if self.keys.is_empty() {
            return None;
        }
        let key = self.keys.remove(0);
        let value = self.values.remove(0);
        Some((key, value))
    }

    /// Splits at the midpoint, returning the separator (a copy of the left
    /// half's new last key) and the new right leaf. The caller wires the
    /// right leaf into the chain.
    pub(crate) fn split(&mut self) -> (K, LeafNode<K>)
    where
        K: Clone,
    {
        let mid = self.keys.len() / 2;
        let mut right = LeafNode::new();
        right.keys = self.keys.drain(mid..).collect();
        right.values = self.values.drain(mid..).collect();
        let separator = self.keys.last().unwrap().clone();
        (separator, right)
    }

    /// Concatenates a right sibling onto this leaf and takes over its
    /// successor link.
    pub(crate) fn merge_with_right(&mut self, mut right: LeafNode<K>) {
        self.keys.append(&mut right.keys);
        self.values.append(&mut right.values);
        self.next = right.next;
    }
}
