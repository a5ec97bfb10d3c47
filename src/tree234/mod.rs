//! Counted 2-3-4 tree.
//!
//! Every child link records how many elements live below it, which turns the
//! tree into an order-statistics structure: the `i`-th element, the rank of a
//! key, and insertion or deletion at a rank all cost `O(log n)`.
//!
//! A tree is either *sorted* (a strict total order supplied at construction
//! decides where elements go, and duplicates are rejected) or *unsorted* (a
//! plain sequence addressed by position). The mode is fixed for the life of
//! the tree.
//!
//! Nodes live in a per-tree arena and refer to each other by handle. Upward
//! repair walks a recorded descent path instead of parent links.

mod node;
mod surgery;

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use node::{Child, Node, NodeArena, NodeId, MAX_ELEMS};

type Comparator<T> = Rc<dyn Fn(&T, &T) -> Ordering>;

/// How a relative search picks its result against the key.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Relation {
    /// The element equal to the key.
    Eq,
    /// The greatest element strictly less than the key.
    Lt,
    /// The greatest element less than or equal to the key.
    Le,
    /// The least element strictly greater than the key.
    Gt,
    /// The least element greater than or equal to the key.
    Ge,
}

enum Order<T> {
    Sorted(Comparator<T>),
    Unsorted,
}

impl<T> Clone for Order<T> {
    fn clone(&self) -> Self {
        match self {
            Order::Sorted(cmp) => Order::Sorted(Rc::clone(cmp)),
            Order::Unsorted => Order::Unsorted,
        }
    }
}

/// A counted 2-3-4 tree, sorted or positional.
///
/// Invariants held between operations:
/// - every node has 1..=3 elements and either no children or one more child
///   than elements;
/// - all leaves sit at the same depth;
/// - each child link's count equals the number of elements in that subtree;
/// - in sorted mode, the in-order sequence is strictly increasing under the
///   tree's comparator.
pub struct Tree234<T> {
    nodes: NodeArena<T>,
    root: Option<NodeId>,
    order: Order<T>,
}

impl<T> Tree234<T> {
    /// An empty sorted tree ordered by `cmp`, which must be a strict total
    /// order.
    pub fn with_comparator(cmp: impl Fn(&T, &T) -> Ordering + 'static) -> Self {
        Self::with_order(Order::Sorted(Rc::new(cmp)))
    }

    /// An empty sorted tree ordered by `T`'s own [`Ord`].
    pub fn ordered() -> Self
    where
        T: Ord + 'static,
    {
        Self::with_comparator(T::cmp)
    }

    /// An empty positional tree.
    pub fn unsorted() -> Self {
        Self::with_order(Order::Unsorted)
    }

    fn with_order(order: Order<T>) -> Self {
        Self {
            nodes: NodeArena::new(),
            root: None,
            order,
        }
    }

    /// An empty tree in the same mode, with the same comparator.
    fn emptied(&self) -> Self {
        Self::with_order(self.order.clone())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.root.map_or(0, |root| self.nodes[root].count())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    #[inline]
    pub fn is_sorted(&self) -> bool {
        matches!(self.order, Order::Sorted(_))
    }

    fn comparator(&self) -> &Comparator<T> {
        match &self.order {
            Order::Sorted(cmp) => cmp,
            Order::Unsorted => panic!("comparator-driven operation on an unsorted tree"),
        }
    }

    #[inline]
    fn after_mutation(&self) {
        #[cfg(feature = "validate")]
        self.assert_valid();
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// The element at rank `index`, or `None` if `index >= len()`.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len() {
            return None;
        }
        let mut id = self.root?;
        let mut index = index;
        'descend: loop {
            let node = &self.nodes[id];
            if node.is_leaf() {
                return node.elems.get(index);
            }
            for (ki, kid) in node.kids.iter().enumerate() {
                if index < kid.count {
                    id = kid.node;
                    continue 'descend;
                }
                index -= kid.count;
                if index == 0 {
                    return node.elems.get(ki);
                }
                index -= 1;
            }
            return None;
        }
    }

    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    pub fn last(&self) -> Option<&T> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// The element equal to `key` under the tree's comparator.
    ///
    /// # Panics
    ///
    /// Panics on an unsorted tree.
    pub fn find(&self, key: &T) -> Option<&T> {
        self.find_relative(Some(key), Relation::Eq).map(|(e, _)| e)
    }

    /// The rank of the element equal to `key`.
    pub fn index_of(&self, key: &T) -> Option<usize> {
        self.find_relative(Some(key), Relation::Eq).map(|(_, i)| i)
    }

    /// Like [`find`](Self::find) but comparing a key of another type with
    /// `cmp(key, element)`. Usable in either mode, provided the sequence is
    /// ordered with respect to `cmp`.
    pub fn find_by<K: ?Sized>(&self, key: &K, cmp: impl FnMut(&K, &T) -> Ordering) -> Option<&T> {
        self.find_relative_by(Some(key), Relation::Eq, cmp)
            .map(|(e, _)| e)
    }

    /// Relative search with the tree's own comparator. Returns the element
    /// and its rank.
    ///
    /// A `None` key stands for a value beyond either end of the order: with
    /// [`Relation::Gt`] it yields the first element, with [`Relation::Lt`]
    /// the last.
    ///
    /// # Panics
    ///
    /// Panics on an unsorted tree, or if `key` is `None` and `relation` is
    /// neither `Lt` nor `Gt`.
    pub fn find_relative(&self, key: Option<&T>, relation: Relation) -> Option<(&T, usize)> {
        let cmp = self.comparator();
        self.find_relative_by(key, relation, |k: &T, e: &T| cmp(k, e))
    }

    /// Relative search comparing `key` against elements with
    /// `cmp(key, element)`.
    pub fn find_relative_by<K: ?Sized>(
        &self,
        key: Option<&K>,
        relation: Relation,
        mut cmp: impl FnMut(&K, &T) -> Ordering,
    ) -> Option<(&T, usize)> {
        let sentinel = match key {
            Some(_) => Ordering::Equal,
            None => match relation {
                Relation::Lt => Ordering::Greater,
                Relation::Gt => Ordering::Less,
                _ => panic!("a missing search key only supports Lt and Gt, not {relation:?}"),
            },
        };
        let mut compare = |elem: &T| match key {
            Some(key) => cmp(key, elem),
            None => sentinel,
        };

        let mut id = self.root?;
        let mut index = 0;
        let found = 'descend: loop {
            let node = &self.nodes[id];
            let mut ki = 0;
            while ki < node.elems.len() {
                let c = compare(&node.elems[ki]);
                if c == Ordering::Less {
                    break;
                }
                if let Some(kid) = node.kids.get(ki) {
                    index += kid.count;
                }
                if c == Ordering::Equal {
                    break 'descend true;
                }
                index += 1;
                ki += 1;
            }
            match node.kids.get(ki) {
                Some(kid) => id = kid.node,
                None => break false,
            }
        };

        // `index` is now the rank of the match, or where the key would be
        // inserted.
        let index = match (found, relation) {
            (true, Relation::Eq | Relation::Le | Relation::Ge) => index,
            (true, Relation::Lt) | (false, Relation::Lt | Relation::Le) => index.checked_sub(1)?,
            (true, Relation::Gt) => index + 1,
            (false, Relation::Gt | Relation::Ge) => index,
            (false, Relation::Eq) => return None,
        };
        self.get(index).map(|elem| (elem, index))
    }

    pub fn iter(&self) -> Iter<'_, T> {
        let mut iter = Iter {
            tree: self,
            stack: Vec::new(),
            remaining: self.len(),
        };
        if let Some(root) = self.root {
            iter.push_leftmost(root);
        }
        iter
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Inserts `value` in order and returns the stored element.
    ///
    /// If an equal element is already present, `value` is dropped and the
    /// existing element is returned; the tree is unchanged.
    ///
    /// # Panics
    ///
    /// Panics on an unsorted tree; use [`insert_at`](Self::insert_at).
    pub fn insert(&mut self, value: T) -> &T {
        let cmp = self.comparator();
        let mut rank = 0;
        let mut existing = None;
        let mut cursor = self.root;
        'descend: while let Some(id) = cursor {
            let node = &self.nodes[id];
            let mut ki = 0;
            while ki < node.elems.len() {
                match cmp(&value, &node.elems[ki]) {
                    Ordering::Less => break,
                    Ordering::Equal => {
                        existing = Some((id, ki));
                        break 'descend;
                    }
                    Ordering::Greater => {
                        rank += node.kids.get(ki).map_or(0, |k| k.count) + 1;
                        ki += 1;
                    }
                }
            }
            cursor = node.kids.get(ki).map(|k| k.node);
        }

        if let Some((id, ki)) = existing {
            return &self.nodes[id].elems[ki];
        }
        self.insert_rank(rank, value);
        self.after_mutation();
        self.get(rank).expect("inserted element is present at its rank")
    }

    /// Inserts `value` so that it ends up at rank `index`, returning the
    /// stored element. An `index` beyond `len()` hands `value` back.
    ///
    /// # Panics
    ///
    /// Panics on a sorted tree; use [`insert`](Self::insert).
    pub fn insert_at(&mut self, index: usize, value: T) -> Result<&T, T> {
        assert!(
            !self.is_sorted(),
            "positional insert on a sorted tree; use insert"
        );
        if index > self.len() {
            return Err(value);
        }
        self.insert_rank(index, value);
        self.after_mutation();
        Ok(self.get(index).expect("inserted element is present at its rank"))
    }

    /// Places `value` at rank `index` (`index <= len()`) regardless of mode.
    fn insert_rank(&mut self, index: usize, value: T) {
        let Some(root) = self.root else {
            self.root = Some(self.nodes.alloc(Node::leaf(value)));
            return;
        };

        let mut path = Vec::new();
        let mut id = root;
        let mut index = index;
        loop {
            let node = &mut self.nodes[id];
            if node.is_leaf() {
                node.elems.insert(index, value);
                break;
            }
            let mut ki = 0;
            while index > node.kids[ki].count {
                index -= node.kids[ki].count + 1;
                ki += 1;
            }
            node.kids[ki].count += 1;
            path.push((id, ki));
            id = node.kids[ki].node;
        }
        self.repair_overflow(path, id);
    }

    /// Splits overflowing nodes from `id` upward along `path`, whose entries
    /// are `(ancestor, child index taken)`, growing a new root if the old one
    /// overflows. Counts along `path` must already include the new elements.
    fn repair_overflow(&mut self, mut path: Vec<(NodeId, usize)>, mut id: NodeId) {
        while self.nodes[id].elems.len() > MAX_ELEMS {
            let (promoted, right) = self.nodes.split_overflow(id);
            let left = Child {
                node: id,
                count: self.nodes[id].count(),
            };
            let right = Child {
                node: right,
                count: self.nodes[right].count(),
            };
            match path.pop() {
                Some((parent, ki)) => {
                    tracing::trace!("node {id:?} overflowed, splitting into {:?}", right.node);
                    let p = &mut self.nodes[parent];
                    p.kids[ki] = left;
                    p.elems.insert(ki, promoted);
                    p.kids.insert(ki + 1, right);
                    id = parent;
                }
                None => {
                    tracing::trace!("root {id:?} overflowed, growing a new root");
                    let root = self.nodes.alloc(Node::branch(promoted, left, right));
                    self.root = Some(root);
                    return;
                }
            }
        }
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Removes and returns the element equal to `key`.
    ///
    /// # Panics
    ///
    /// Panics on an unsorted tree; use [`remove_at`](Self::remove_at).
    pub fn remove(&mut self, key: &T) -> Option<T> {
        let index = self.index_of(key)?;
        self.remove_at(index)
    }

    /// Removes and returns the element at rank `index`.
    ///
    /// Descends top-down, topping up every child it enters to at least two
    /// elements so the removal never leaves a node empty. An element found in
    /// an internal node is replaced by its in-order successor, which is then
    /// removed from its leaf.
    pub fn remove_at(&mut self, index: usize) -> Option<T> {
        if index >= self.len() {
            return None;
        }
        let mut id = self.root?;
        let mut index = index;
        let mut replace: Option<(NodeId, usize)> = None;

        loop {
            if self.nodes[id].is_leaf() {
                let removed = self.nodes[id].elems.remove(index);
                if self.nodes[id].elems.is_empty() {
                    debug_assert_eq!(Some(id), self.root);
                    self.nodes.release(id);
                    self.root = None;
                }
                let value = match replace {
                    Some((at, ei)) => std::mem::replace(&mut self.nodes[at].elems[ei], removed),
                    None => removed,
                };
                self.after_mutation();
                return Some(value);
            }

            let node = &self.nodes[id];
            let mut ki = 0;
            let mut local = index;
            let mut here = false;
            loop {
                let count = node.kids[ki].count;
                if local < count {
                    break;
                }
                if local == count {
                    here = true;
                    break;
                }
                local -= count + 1;
                ki += 1;
            }

            // Either descend towards the target, or towards the successor of
            // an element held right here.
            let (down, next_index) = if here { (ki + 1, 0) } else { (ki, local) };
            let child = node.kids[down].node;
            if self.nodes[child].elems.len() < 2 {
                if let Some(root) = self.reinforce(id, down) {
                    id = root;
                }
                // The subtree under `id` still holds the same sequence.
                continue;
            }

            if here {
                replace = Some((id, ki));
            }
            self.nodes[id].kids[down].count -= 1;
            id = child;
            index = next_index;
        }
    }

    /// Brings `parent`'s child `ki` up from one element to at least two, by
    /// borrowing through a rotation when a neighbour can spare an element and
    /// merging with a neighbour otherwise.
    ///
    /// Returns the new root if the merge emptied a one-element root.
    fn reinforce(&mut self, parent: NodeId, ki: usize) -> Option<NodeId> {
        let kids = &self.nodes[parent].kids;
        let spare = |j: usize| self.nodes[kids[j].node].elems.len() > 1;
        let left_spare = ki > 0 && spare(ki - 1);
        let right_spare = ki + 1 < kids.len() && spare(ki + 1);

        if left_spare {
            self.nodes.rotate_right(parent, ki);
            return None;
        }
        if right_spare {
            self.nodes.rotate_left(parent, ki);
            return None;
        }

        let j = ki.saturating_sub(1);
        self.nodes.merge_kids(parent, j);
        if !self.nodes[parent].elems.is_empty() {
            return None;
        }
        debug_assert_eq!(Some(parent), self.root);
        let root = self.nodes[parent].kids[0].node;
        tracing::trace!("root {parent:?} emptied, {root:?} takes over");
        self.nodes.release(parent);
        self.root = Some(root);
        Some(root)
    }

    // =========================================================================
    // Copying and validation
    // =========================================================================

    /// A deep copy with every element mapped through `f`, keeping the mode
    /// and comparator. In sorted mode `f` must preserve the order.
    pub fn copy_with(&self, mut f: impl FnMut(&T) -> T) -> Self {
        let mut copy = self.emptied();
        copy.root = self
            .root
            .map(|root| self.nodes.copy_subtree(root, &mut copy.nodes, &mut f));
        copy
    }

    /// Checks every structural invariant, panicking on the first violation.
    pub fn assert_valid(&self) {
        let Some(root) = self.root else {
            assert_eq!(self.nodes.live(), 0, "empty tree still owns nodes");
            return;
        };
        let mut leaf_depth = None;
        let mut reachable = 0;
        let total = self.validate_node(root, 0, &mut leaf_depth, &mut reachable);
        assert_eq!(total, self.len(), "root count disagrees with contents");
        assert_eq!(
            reachable,
            self.nodes.live(),
            "arena holds unreachable nodes"
        );

        if let Order::Sorted(cmp) = &self.order {
            let mut iter = self.iter();
            if let Some(mut prev) = iter.next() {
                for elem in iter {
                    assert_eq!(
                        cmp(prev, elem),
                        Ordering::Less,
                        "in-order sequence is not strictly increasing"
                    );
                    prev = elem;
                }
            }
        }
    }

    fn validate_node(
        &self,
        id: NodeId,
        depth: usize,
        leaf_depth: &mut Option<usize>,
        reachable: &mut usize,
    ) -> usize {
        *reachable += 1;
        let node = &self.nodes[id];
        let n = node.elems.len();
        assert!(
            (1..=MAX_ELEMS).contains(&n),
            "node {id:?} holds {n} elements"
        );

        if node.is_leaf() {
            match *leaf_depth {
                Some(d) => assert_eq!(d, depth, "leaf {id:?} at uneven depth"),
                None => *leaf_depth = Some(depth),
            }
            return n;
        }

        assert_eq!(node.kids.len(), n + 1, "node {id:?} has a bad child count");
        let mut total = n;
        for kid in &node.kids {
            let actual = self.validate_node(kid.node, depth + 1, leaf_depth, reachable);
            assert_eq!(actual, kid.count, "stale count on link to {:?}", kid.node);
            total += actual;
        }
        total
    }
}

impl<T: Clone> Clone for Tree234<T> {
    fn clone(&self) -> Self {
        self.copy_with(T::clone)
    }
}

impl<T: fmt::Debug> fmt::Debug for Tree234<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T> IntoIterator for &'a Tree234<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

/// In-order iterator over a [`Tree234`].
pub struct Iter<'a, T> {
    tree: &'a Tree234<T>,
    /// `(node, next element to yield)`; the children left of that element
    /// have already been visited.
    stack: Vec<(NodeId, usize)>,
    remaining: usize,
}

impl<'a, T> Iter<'a, T> {
    fn push_leftmost(&mut self, mut id: NodeId) {
        loop {
            self.stack.push((id, 0));
            match self.tree.nodes[id].kids.first() {
                Some(kid) => id = kid.node,
                None => return,
            }
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        while let Some(top) = self.stack.last_mut() {
            let (id, ei) = *top;
            let tree = self.tree;
            let node = &tree.nodes[id];
            if ei == node.elems.len() {
                self.stack.pop();
                continue;
            }
            top.1 += 1;
            if let Some(kid) = node.kids.get(ei + 1) {
                self.push_leftmost(kid.node);
            }
            self.remaining -= 1;
            return Some(&node.elems[ei]);
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}


#[cfg(test)]
mod proptests;
