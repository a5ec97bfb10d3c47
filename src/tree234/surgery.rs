//! Splitting a tree at a rank and joining two trees end to end.
//!
//! Both operations work inside one arena. When the two sides end up in
//! different trees, the smaller side is the one whose nodes get moved, so the
//! node traffic is bounded by the smaller part.

use std::cmp::Ordering;

use super::node::{Child, Node, NodeId};
use super::{Order, Relation, Tree234};
use crate::error::JoinError;

/// Which edge of a freshly split tree is ragged.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Fringe {
    /// The left half: its rightmost path may hold underfull nodes.
    Right,
    /// The right half: its leftmost path may hold underfull nodes.
    Left,
}

impl<T> Tree234<T> {
    /// Splits off `[index, len)` into a new tree; `self` keeps `[0, index)`.
    ///
    /// The cut itself is logarithmic, but the nodes of whichever half is
    /// smaller are moved into their own arena, so the whole call costs
    /// O(log n + min(index, len - index)).
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    pub fn split_off(&mut self, index: usize) -> Self {
        let (left, right) = self.split_in_place(index);
        self.separate(left, right)
    }

    /// Splits off `[0, index)` into a new tree; `self` keeps `[index, len)`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    pub fn split_off_front(&mut self, index: usize) -> Self {
        let (left, right) = self.split_in_place(index);
        self.separate(right, left)
    }

    /// Splits into `([0, index), [index, len))`.
    pub fn split_at(mut self, index: usize) -> (Self, Self) {
        let right = self.split_off(index);
        (self, right)
    }

    /// Splits a sorted tree at `key`: the returned tree holds every element
    /// standing in `relation` to `key` and `self` keeps the rest.
    ///
    /// # Panics
    ///
    /// Panics on an unsorted tree or with [`Relation::Eq`].
    pub fn split_by(&mut self, key: &T, relation: Relation) -> Self {
        let boundary = |rel| {
            self.find_relative(Some(key), rel)
                .map_or(self.len(), |(_, i)| i)
        };
        match relation {
            Relation::Lt => {
                let index = boundary(Relation::Ge);
                self.split_off_front(index)
            }
            Relation::Le => {
                let index = boundary(Relation::Gt);
                self.split_off_front(index)
            }
            Relation::Gt => {
                let index = boundary(Relation::Gt);
                self.split_off(index)
            }
            Relation::Ge => {
                let index = boundary(Relation::Ge);
                self.split_off(index)
            }
            Relation::Eq => panic!("cannot split at an equality"),
        }
    }

    /// Appends `other` after `self`.
    ///
    /// In sorted mode every element of `self` must compare less than every
    /// element of `other`; otherwise both trees are left untouched and
    /// [`JoinError::Unordered`] is returned. On success `other` is empty.
    ///
    /// The smaller operand's nodes are moved into the larger one's arena
    /// before the graft, so a join costs O(log n + min(n, m)).
    ///
    /// # Panics
    ///
    /// Panics if exactly one of the two trees is sorted.
    pub fn join(&mut self, other: &mut Self) -> Result<(), JoinError> {
        Self::check_joinable(self, other, &self.order)?;
        let order = self.order.clone();
        let (empty, other_empty) = (self.emptied(), other.emptied());
        let left = std::mem::replace(self, empty);
        let right = std::mem::replace(other, other_empty);
        *self = Self::concat(left, right, order);
        self.after_mutation();
        Ok(())
    }

    /// Prepends `other` before `self`, under the same rules as
    /// [`join`](Self::join) with the operands swapped.
    pub fn join_reversed(&mut self, other: &mut Self) -> Result<(), JoinError> {
        Self::check_joinable(other, self, &self.order)?;
        let order = self.order.clone();
        let (empty, other_empty) = (self.emptied(), other.emptied());
        let right = std::mem::replace(self, empty);
        let left = std::mem::replace(other, other_empty);
        *self = Self::concat(left, right, order);
        self.after_mutation();
        Ok(())
    }

    fn check_joinable(left: &Self, right: &Self, order: &Order<T>) -> Result<(), JoinError> {
        assert_eq!(
            left.is_sorted(),
            right.is_sorted(),
            "cannot join a sorted tree with an unsorted one"
        );
        if let (Order::Sorted(cmp), Some(last), Some(first)) = (order, left.last(), right.first()) {
            if cmp(last, first) != Ordering::Less {
                tracing::debug!(
                    left = left.len(),
                    right = right.len(),
                    "join rejected: operands overlap"
                );
                return Err(JoinError::Unordered);
            }
        }
        Ok(())
    }

    /// Splits the tree's nodes into two fringe-repaired roots, both still in
    /// `self.nodes`. Leaves `self.root` empty.
    fn split_in_place(&mut self, index: usize) -> (Option<NodeId>, Option<NodeId>) {
        let len = self.len();
        assert!(index <= len, "split index {index} beyond length {len}");
        let Some(root) = self.root.take() else {
            return (None, None);
        };
        if index == 0 {
            return (None, Some(root));
        }
        if index == len {
            return (Some(root), None);
        }

        // Cut every node on the path to the split point in two. The left
        // pieces keep the original handles; each right piece is new and
        // hangs off the first child slot of the right piece above it.
        let mut right_root = None;
        let mut right_parent: Option<NodeId> = None;
        let mut cursor = Some(root);
        let mut index = index;
        while let Some(id) = cursor {
            let node = &mut self.nodes[id];
            let right = if node.is_leaf() {
                cursor = None;
                Node {
                    elems: node.elems.drain(index..).collect(),
                    kids: Default::default(),
                }
            } else {
                let mut ki = 0;
                while index > node.kids[ki].count {
                    index -= node.kids[ki].count + 1;
                    ki += 1;
                }
                let cut = node.kids[ki];
                let elems = node.elems.drain(ki..).collect();
                let mut kids: smallvec::SmallVec<[Child; 5]> = node.kids.drain(ki + 1..).collect();
                // The placeholder handle is replaced once the child is cut.
                kids.insert(
                    0,
                    Child {
                        node: cut.node,
                        count: cut.count - index,
                    },
                );
                node.kids[ki].count = index;
                cursor = Some(cut.node);
                Node { elems, kids }
            };

            let right = self.nodes.alloc(right);
            match right_parent {
                Some(parent) => self.nodes[parent].kids[0].node = right,
                None => right_root = Some(right),
            }
            right_parent = Some(right);
        }

        let left = self.repair_fringe(root, Fringe::Right);
        let right = right_root.and_then(|r| self.repair_fringe(r, Fringe::Left));
        (left, right)
    }

    /// Restores the node invariants along the ragged edge of a split half.
    ///
    /// First drops element-less roots, then walks down the fringe topping up
    /// each fringe child to at least two elements, so that a merge further
    /// down always has a separator to take from its parent.
    fn repair_fringe(&mut self, mut root: NodeId, fringe: Fringe) -> Option<NodeId> {
        while self.nodes[root].elems.is_empty() {
            let next = self.nodes[root].kids.first().map(|k| k.node);
            self.nodes.release(root);
            root = next?;
            tracing::trace!("dropped an empty root after split, {root:?} takes over");
        }

        let mut id = root;
        while !self.nodes[id].is_leaf() {
            let kids = &self.nodes[id].kids;
            let (ki, ni) = match fringe {
                Fringe::Left => (0, 1),
                Fringe::Right => (kids.len() - 1, kids.len() - 2),
            };
            let sub = kids[ki].node;
            let neighbour = kids[ni].node;
            let sub_len = self.nodes[sub].elems.len();
            if sub_len >= 2 {
                id = sub;
                continue;
            }

            let spare = self.nodes[neighbour].elems.len();
            tracing::trace!(
                "repairing {fringe:?} fringe under {id:?}: child has {sub_len}, neighbour {spare}"
            );
            if spare == 1 || (sub_len == 0 && spare == 2) {
                let j = ki.min(ni);
                self.nodes.merge_kids(id, j);
                let merged = self.nodes[id].kids[j].node;
                if self.nodes[id].elems.is_empty() {
                    debug_assert_eq!(id, root);
                    self.nodes.release(id);
                    root = merged;
                }
                id = merged;
            } else {
                for _ in sub_len..2 {
                    match fringe {
                        Fringe::Left => self.nodes.rotate_left(id, ki),
                        Fringe::Right => self.nodes.rotate_right(id, ki),
                    }
                }
                id = sub;
            }
        }
        Some(root)
    }

    /// Hands one of two in-arena roots to a new tree, keeping the other in
    /// `self`. Whichever side is smaller is moved to a fresh arena.
    fn separate(&mut self, keep: Option<NodeId>, give: Option<NodeId>) -> Self {
        let count = |root: Option<NodeId>| root.map_or(0, |r| self.nodes[r].count());
        let (keep_len, give_len) = (count(keep), count(give));
        let mut other = self.emptied();
        if give_len <= keep_len {
            other.root = give.map(|g| self.nodes.transplant(g, &mut other.nodes));
            self.root = keep;
        } else {
            self.root = keep.map(|k| self.nodes.transplant(k, &mut other.nodes));
            std::mem::swap(&mut self.nodes, &mut other.nodes);
            other.root = give;
        }
        tracing::debug!(kept = keep_len, split_off = give_len, "split tree");
        self.after_mutation();
        other.after_mutation();
        other
    }

    /// Concatenates two trees already known to be in order.
    fn concat(mut left: Self, mut right: Self, order: Order<T>) -> Self {
        if right.is_empty() {
            return Self { order, ..left };
        }
        if left.is_empty() {
            return Self { order, ..right };
        }

        // The first element of `right` becomes the separator between the two.
        let sep = right
            .remove_at(0)
            .expect("non-empty right operand has a first element");
        let (nodes, left_root, right_root) = if left.len() >= right.len() {
            let moved = right
                .root
                .map(|r| right.nodes.transplant(r, &mut left.nodes));
            (left.nodes, left.root, moved)
        } else {
            let moved = left
                .root
                .map(|r| left.nodes.transplant(r, &mut right.nodes));
            (right.nodes, moved, right.root)
        };

        let mut tree = Self {
            nodes,
            root: None,
            order,
        };
        match (left_root, right_root) {
            (Some(l), Some(r)) => tree.graft(l, sep, r),
            (Some(l), None) => {
                tree.root = Some(l);
                let end = tree.len();
                tree.insert_rank(end, sep);
            }
            (None, _) => unreachable!("left operand is non-empty"),
        }
        tree
    }

    /// Joins two non-empty subtrees of this arena around `sep`, hanging the
    /// shorter one off the taller one's facing spine at matching height.
    fn graft(&mut self, left: NodeId, sep: T, right: NodeId) {
        let (hl, hr) = (self.height(left), self.height(right));
        let lc = Child {
            node: left,
            count: self.nodes[left].count(),
        };
        let rc = Child {
            node: right,
            count: self.nodes[right].count(),
        };
        tracing::debug!(
            left_height = hl,
            right_height = hr,
            left = lc.count,
            right = rc.count,
            "joining trees"
        );

        match hl.cmp(&hr) {
            Ordering::Equal => {
                self.root = Some(self.nodes.alloc(Node::branch(sep, lc, rc)));
            }
            Ordering::Greater => {
                self.root = Some(left);
                let mut path = Vec::with_capacity(hl - hr);
                let mut id = left;
                for _ in 0..hl - hr - 1 {
                    let node = &mut self.nodes[id];
                    let ki = node.kids.len() - 1;
                    node.kids[ki].count += rc.count + 1;
                    path.push((id, ki));
                    id = node.kids[ki].node;
                }
                let node = &mut self.nodes[id];
                node.elems.push(sep);
                node.kids.push(rc);
                self.repair_overflow(path, id);
            }
            Ordering::Less => {
                self.root = Some(right);
                let mut path = Vec::with_capacity(hr - hl);
                let mut id = right;
                for _ in 0..hr - hl - 1 {
                    let node = &mut self.nodes[id];
                    node.kids[0].count += lc.count + 1;
                    path.push((id, 0));
                    id = node.kids[0].node;
                }
                let node = &mut self.nodes[id];
                node.elems.insert(0, sep);
                node.kids.insert(0, lc);
                self.repair_overflow(path, id);
            }
        }
    }

    /// Levels from `id` down to its leaves, counting both ends.
    fn height(&self, mut id: NodeId) -> usize {
        let mut height = 1;
        while let Some(kid) = self.nodes[id].kids.first() {
            id = kid.node;
            height += 1;
        }
        height
    }
}
