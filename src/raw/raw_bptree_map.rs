use smallvec::SmallVec;
use tracing::trace;

use super::arena::Arena;
use super::handle::Handle;
use super::node::{InnerNode, LeafNode, Node, SearchResult};

/// The core B+ tree backing `BPlusTreeMap`.
///
/// Nodes live in one arena, values in another; the tree holds the root, the
/// head of the leaf chain, the entry count, and the branching order. All
/// per-node capacity bounds derive from the order at runtime.
pub(crate) struct RawBPlusTreeMap<K, V> {
    nodes: Arena<Node<K>>,
    values: Arena<V>,
    /// Root node; `None` iff the tree is empty.
    root: Option<Handle>,
    /// Leftmost leaf, the head of the `next` chain.
    first_leaf: Option<Handle>,
    len: usize,
    order: usize,
}

/// Outcome of a raw insertion attempt.
enum RawInsert<V> {
    Inserted,
    Replaced(V),
    Duplicate,
}

/// One level of the descent from root to leaf.
struct PathElement {
    node: Handle,
    child_index: usize,
}

type Path = SmallVec<[PathElement; 16]>;

impl<K, V> RawBPlusTreeMap<K, V> {
    /// Creates an empty tree. The caller validates `order >= 3`.
    pub(crate) const fn new(order: usize) -> Self {
        Self {
            nodes: Arena::new(),
            values: Arena::new(),
            root: None,
            first_leaf: None,
            len: 0,
            order,
        }
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) const fn order(&self) -> usize {
        self.order
    }

    pub(crate) fn first_leaf(&self) -> Option<Handle> {
        self.first_leaf
    }

    pub(crate) fn node(&self, handle: Handle) -> &Node<K> {
        self.nodes.get(handle)
    }

    pub(crate) fn value(&self, handle: Handle) -> &V {
        self.values.get(handle)
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.values.clear();
        self.root = None;
        self.first_leaf = None;
        self.len = 0;
    }

    /// Largest number of entries (or separators) a node may hold.
    fn max_keys(&self) -> usize {
        self.order
    }

    /// Smallest number of entries a non-root leaf may hold.
    fn min_leaf_keys(&self) -> usize {
        self.order.div_ceil(2)
    }

    /// Smallest number of separators a non-root inner node may hold. One
    /// below the leaf minimum for odd orders: an inner split lifts its
    /// median out, so both halves of an overflowing node must stay legal.
    fn min_separators(&self) -> usize {
        self.order / 2
    }
}

impl<K: Ord + Clone, V> RawBPlusTreeMap<K, V> {
    /// Locates a key, returning the leaf holding it and the index within.
    pub(crate) fn search(&self, key: &K) -> Option<(Handle, usize)> {
        let mut current = self.root?;
        loop {
            match self.nodes.get(current) {
                Node::Inner(inner) => current = inner.child(inner.select_child(key)),
                Node::Leaf(leaf) => {
                    return match leaf.search(key) {
                        SearchResult::Found(index) => Some((current, index)),
                        SearchResult::Missing(_) => None,
                    };
                }
            }
        }
    }

    pub(crate) fn get(&self, key: &K) -> Option<&V> {
        let (leaf_handle, index) = self.search(key)?;
        let leaf = self.nodes.get(leaf_handle).as_leaf();
        Some(self.values.get(leaf.value(index)))
    }

    pub(crate) fn contains_key(&self, key: &K) -> bool {
        self.search(key).is_some()
    }

    /// Position of the first entry with key >= `key`, if any.
    pub(crate) fn lower_bound(&self, key: &K) -> Option<(Handle, usize)> {
        let mut current = self.root?;
        loop {
            match self.nodes.get(current) {
                Node::Inner(inner) => current = inner.child(inner.select_child(key)),
                Node::Leaf(leaf) => {
                    let index = match leaf.search(key) {
                        SearchResult::Found(index) | SearchResult::Missing(index) => index,
                    };
                    // Chained leaves are never empty, so the successor's
                    // first entry is the bound when this leaf runs out.
                    return if index < leaf.key_count() {
                        Some((current, index))
                    } else {
                        leaf.next().map(|next| (next, 0))
                    };
                }
            }
        }
    }

    /// Position of the first entry with key > `key`, if any.
    pub(crate) fn upper_bound(&self, key: &K) -> Option<(Handle, usize)> {
        let mut current = self.root?;
        loop {
            match self.nodes.get(current) {
                Node::Inner(inner) => current = inner.child(inner.select_child(key)),
                Node::Leaf(leaf) => {
                    let index = match leaf.search(key) {
                        SearchResult::Found(index) => index + 1,
                        SearchResult::Missing(index) => index,
                    };
                    return if index < leaf.key_count() {
                        Some((current, index))
                    } else {
                        leaf.next().map(|next| (next, 0))
                    };
                }
            }
        }
    }

    /// Inserts only if the key is absent; returns false on a duplicate.
    pub(crate) fn try_insert(&mut self, key: K, value: V) -> bool {
        matches!(self.insert_inner(key, value, false), RawInsert::Inserted)
    }

    /// Inserts or overwrites, returning the replaced value if any.
    pub(crate) fn upsert(&mut self, key: K, value: V) -> Option<V> {
        match self.insert_inner(key, value, true) {
            RawInsert::Replaced(old) => Some(old),
            // Duplicate is never produced when overwriting.
            RawInsert::Inserted | RawInsert::Duplicate => None,
        }
    }

    fn insert_inner(&mut self, key: K, value: V, overwrite: bool) -> RawInsert<V> {
        let Some(root) = self.root else {
            let value_handle = self.values.alloc(value);
            let mut leaf = LeafNode::new();
            leaf.push_back(key, value_handle);
            let leaf_handle = self.nodes.alloc(Node::Leaf(leaf));
            self.root = Some(leaf_handle);
            self.first_leaf = Some(leaf_handle);
            self.len = 1;
            return RawInsert::Inserted;
        };

        let mut path: Path = SmallVec::new();
        let mut current = root;
        loop {
            match self.nodes.get(current) {
                Node::Inner(inner) => {
                    let child_index = inner.select_child(&key);
                    path.push(PathElement { node: current, child_index });
                    current = inner.child(child_index);
                }
                Node::Leaf(_) => break,
            }
        }

        let leaf = self.nodes.get_mut(current).as_leaf_mut();
        match leaf.search(&key) {
            SearchResult::Found(index) => {
                if overwrite {
                    // Replace in place to avoid alloc/free churn.
                    let value_handle = leaf.value(index);
                    let old = core::mem::replace(self.values.get_mut(value_handle), value);
                    RawInsert::Replaced(old)
                } else {
                    RawInsert::Duplicate
                }
            }
            SearchResult::Missing(index) => {
                let max_keys = self.max_keys();
                let value_handle = self.values.alloc(value);
                let leaf = self.nodes.get_mut(current).as_leaf_mut();
                leaf.insert(index, key, value_handle);
                self.len += 1;
                if leaf.key_count() > max_keys {
                    self.split_leaf_and_propagate(current, &mut path);
                }
                RawInsert::Inserted
            }
        }
    }

    fn split_leaf_and_propagate(&mut self, leaf_handle: Handle, path: &mut Path) {
        let leaf = self.nodes.get_mut(leaf_handle).as_leaf_mut();
        let (separator, mut right_leaf) = leaf.split();

        // Splice the right half into the chain after the left half.
        right_leaf.set_next(leaf.next());
        let right_handle = self.nodes.alloc(Node::Leaf(right_leaf));
        self.nodes.get_mut(leaf_handle).as_leaf_mut().set_next(Some(right_handle));

        trace!(
            target: "tilia::tree",
            left = leaf_handle.to_index(),
            right = right_handle.to_index(),
            "split leaf"
        );
        self.propagate_split(path, separator, right_handle);
    }

    fn propagate_split(&mut self, path: &mut Path, mut separator: K, mut new_child: Handle) {
        let max_keys = self.max_keys();
        while let Some(element) = path.pop() {
            let parent = self.nodes.get_mut(element.node).as_inner_mut();
            parent.insert_entry(element.child_index, separator, new_child);
            if parent.separator_count() <= max_keys {
                return;
            }

            let (median, right) = parent.split();
            let right_handle = self.nodes.alloc(Node::Inner(right));
            trace!(
                target: "tilia::tree",
                left = element.node.to_index(),
                right = right_handle.to_index(),
                "split inner node"
            );
            separator = median;
            new_child = right_handle;
        }

        // The root itself split; grow the tree by one level.
        let old_root = self.root.unwrap();
        let new_root = self.nodes.alloc(Node::Inner(InnerNode::new_root(separator, old_root, new_child)));
        self.root = Some(new_root);
        trace!(target: "tilia::tree", root = new_root.to_index(), "grew new root");
    }

    /// Removes a key, returning its value.
    pub(crate) fn remove(&mut self, key: &K) -> Option<V> {
        let root = self.root?;

        let mut path: Path = SmallVec::new();
        let mut current = root;
        loop {
            match self.nodes.get(current) {
                Node::Inner(inner) => {
                    let child_index = inner.select_child(key);
                    path.push(PathElement { node: current, child_index });
                    current = inner.child(child_index);
                }
                Node::Leaf(_) => break,
            }
        }

        let leaf = self.nodes.get_mut(current).as_leaf_mut();
        let index = match leaf.search(key) {
            SearchResult::Found(index) => index,
            SearchResult::Missing(_) => return None,
        };
        let (_, value_handle) = leaf.remove(index);
        let removed = self.values.take(value_handle);
        self.len -= 1;

        if self.len == 0 {
            self.nodes.clear();
            self.values.clear();
            self.root = None;
            self.first_leaf = None;
            return Some(removed);
        }

        let underfull = self.nodes.get(current).as_leaf().key_count() < self.min_leaf_keys();
        if !underfull || path.is_empty() {
            self.refresh_separators(current, &path);
            return Some(removed);
        }
        self.rebalance_leaf(current, &mut path);
        Some(removed)
    }

    /// Tightens the nearest ancestor separator after a removal lowered a
    /// leaf's largest key. A stale separator would still route correctly
    /// (it covers the leaf from above), but keeping separators tight keeps
    /// them meaningful.
    fn refresh_separators(&mut self, leaf_handle: Handle, path: &Path) {
        if path.is_empty() {
            return;
        }
        let leaf = self.nodes.get(leaf_handle).as_leaf();
        if leaf.key_count() == 0 {
            return;
        }
        let last_key = leaf.last_key().unwrap().clone();
        for element in path.iter().rev() {
            let parent = self.nodes.get_mut(element.node).as_inner_mut();
            // The first ancestor where we are not the rightmost child holds
            // the separator bounding this subtree.
            if element.child_index < parent.separator_count() {
                parent.set_separator(element.child_index, last_key);
                break;
            }
        }
    }

    fn rebalance_leaf(&mut self, leaf_handle: Handle, path: &mut Path) {
        let parent_element = path.last().unwrap();
        let parent_handle = parent_element.node;
        let child_index = parent_element.child_index;
        let parent = self.nodes.get(parent_handle).as_inner();

        // Prefer the right sibling, fall back to the left.
        if child_index + 1 < parent.child_count() {
            let right = parent.child(child_index + 1);
            if self.nodes.get(right).as_leaf().key_count() > self.min_leaf_keys() {
                self.borrow_from_right_leaf(leaf_handle, right, parent_handle, child_index);
                return;
            }
        }
        if child_index > 0 {
            let left = parent.child(child_index - 1);
            if self.nodes.get(left).as_leaf().key_count() > self.min_leaf_keys() {
                self.borrow_from_left_leaf(leaf_handle, left, parent_handle, child_index);
                return;
            }
        }
        if child_index + 1 < parent.child_count() {
            let right = parent.child(child_index + 1);
            self.merge_leaves(leaf_handle, right, path, child_index);
        } else {
            let left = parent.child(child_index - 1);
            self.merge_leaves(left, leaf_handle, path, child_index - 1);
        }
    }

    fn borrow_from_right_leaf(
        &mut self,
        leaf_handle: Handle,
        right_handle: Handle,
        parent_handle: Handle,
        child_index: usize,
    ) {
        let right = self.nodes.get_mut(right_handle).as_leaf_mut();
        let (key, value) = right.pop_front().unwrap();

        let leaf = self.nodes.get_mut(leaf_handle).as_leaf_mut();
        leaf.push_back(key.clone(), value);

        // The borrowed key is now the leaf's largest, hence its separator.
        let parent = self.nodes.get_mut(parent_handle).as_inner_mut();
        parent.set_separator(child_index, key);
        trace!(
            target: "tilia::tree",
            leaf = leaf_handle.to_index(),
            sibling = right_handle.to_index(),
            "borrowed entry from right leaf"
        );
    }

    fn borrow_from_left_leaf(
        &mut self,
        leaf_handle: Handle,
        left_handle: Handle,
        parent_handle: Handle,
        child_index: usize,
    ) {
        let left = self.nodes.get_mut(left_handle).as_leaf_mut();
        let (key, value) = left.pop_back().unwrap();
        let left_last = left.last_key().unwrap().clone();

        let leaf = self.nodes.get_mut(leaf_handle).as_leaf_mut();
        leaf.push_front(key, value);

        let parent = self.nodes.get_mut(parent_handle).as_inner_mut();
        parent.set_separator(child_index - 1, left_last);
        trace!(
            target: "tilia::tree",
            leaf = leaf_handle.to_index(),
            sibling = left_handle.to_index(),
            "borrowed entry from left leaf"
        );
    }

    fn merge_leaves(&mut self, left_handle: Handle, right_handle: Handle, path: &mut Path, separator_index: usize) {
        let right = match self.nodes.take(right_handle) {
            Node::Leaf(leaf) => leaf,
            Node::Inner(_) => panic!("expected leaf node"),
        };

        // The left leaf is the right one's predecessor in the chain, so
        // absorbing it also redirects the only incoming `next` reference.
        let left = self.nodes.get_mut(left_handle).as_leaf_mut();
        left.merge_with_right(right);

        trace!(
            target: "tilia::tree",
            survivor = left_handle.to_index(),
            removed = right_handle.to_index(),
            "merged leaves"
        );
        self.remove_separator_and_propagate(path, separator_index);
    }

    /// Drops the separator and child slot left behind by a merge, then
    /// repairs the parent if that made it underfull.
    fn remove_separator_and_propagate(&mut self, path: &mut Path, separator_index: usize) {
        let parent_element = path.pop().unwrap();
        let parent_handle = parent_element.node;

        let parent = self.nodes.get_mut(parent_handle).as_inner_mut();
        // The removed child was already taken from the arena by the merge.
        let _ = parent.remove_entry(separator_index);
        let separator_count = parent.separator_count();
        let only_child = if parent.child_count() == 1 { Some(parent.child(0)) } else { None };

        if path.is_empty() {
            // The parent is the root; with a single child left, that child
            // becomes the new root and the tree shrinks by one level.
            if let Some(new_root) = only_child {
                self.nodes.free(parent_handle);
                self.root = Some(new_root);
                trace!(target: "tilia::tree", root = new_root.to_index(), "collapsed root");
            }
            return;
        }
        if separator_count >= self.min_separators() {
            return;
        }
        self.rebalance_inner(parent_handle, path);
    }

    fn rebalance_inner(&mut self, node_handle: Handle, path: &mut Path) {
        let parent_element = path.last().unwrap();
        let parent_handle = parent_element.node;
        let child_index = parent_element.child_index;
        let parent = self.nodes.get(parent_handle).as_inner();

        if child_index + 1 < parent.child_count() {
            let right = parent.child(child_index + 1);
            if self.nodes.get(right).as_inner().separator_count() > self.min_separators() {
                self.borrow_from_right_inner(node_handle, right, parent_handle, child_index);
                return;
            }
        }
        if child_index > 0 {
            let left = parent.child(child_index - 1);
            if self.nodes.get(left).as_inner().separator_count() > self.min_separators() {
                self.borrow_from_left_inner(node_handle, left, parent_handle, child_index);
                return;
            }
        }
        if child_index + 1 < parent.child_count() {
            let right = parent.child(child_index + 1);
            self.merge_inner(node_handle, right, path, child_index);
        } else {
            let left = parent.child(child_index - 1);
            self.merge_inner(left, node_handle, path, child_index - 1);
        }
    }

    fn borrow_from_right_inner(
        &mut self,
        node_handle: Handle,
        right_handle: Handle,
        parent_handle: Handle,
        child_index: usize,
    ) {
        // The parent separator bounds this node's current last child; the
        // sibling's first separator bounds the child it gives up, which
        // becomes this node's new upper bound.
        let parent_separator = self.nodes.get(parent_handle).as_inner().separator(child_index).clone();

        let right = self.nodes.get_mut(right_handle).as_inner_mut();
        let (right_separator, right_child) = right.pop_front().unwrap();

        let node = self.nodes.get_mut(node_handle).as_inner_mut();
        node.push_back(parent_separator, right_child);

        let parent = self.nodes.get_mut(parent_handle).as_inner_mut();
        parent.set_separator(child_index, right_separator);
        trace!(
            target: "tilia::tree",
            node = node_handle.to_index(),
            sibling = right_handle.to_index(),
            "borrowed child from right inner node"
        );
    }

    fn borrow_from_left_inner(
        &mut self,
        node_handle: Handle,
        left_handle: Handle,
        parent_handle: Handle,
        child_index: usize,
    ) {
        let parent_separator = self.nodes.get(parent_handle).as_inner().separator(child_index - 1).clone();

        let left = self.nodes.get_mut(left_handle).as_inner_mut();
        let (left_separator, left_child) = left.pop_back().unwrap();

        let node = self.nodes.get_mut(node_handle).as_inner_mut();
        node.push_front(parent_separator, left_child);

        let parent = self.nodes.get_mut(parent_handle).as_inner_mut();
        parent.set_separator(child_index - 1, left_separator);
        trace!(
            target: "tilia::tree",
            node = node_handle.to_index(),
            sibling = left_handle.to_index(),
            "borrowed child from left inner node"
        );
    }

    fn merge_inner(&mut self, left_handle: Handle, right_handle: Handle, path: &mut Path, separator_index: usize) {
        let parent_handle = path.last().unwrap().node;
        let separator = self.nodes.get(parent_handle).as_inner().separator(separator_index).clone();

        let right = match self.nodes.take(right_handle) {
            Node::Inner(inner) => inner,
            Node::Leaf(_) => panic!("expected inner node"),
        };

        let left = self.nodes.get_mut(left_handle).as_inner_mut();
        left.merge_with_right(separator, right);

        trace!(
            target: "tilia::tree",
            survivor = left_handle.to_index(),
            removed = right_handle.to_index(),
            "merged inner nodes"
        );
        self.remove_separator_and_propagate(path, separator_index);
    }
}
