use smallvec::{smallvec, SmallVec};
use std::ops::{Index, IndexMut};

/// Most elements a settled node may hold. A node is allowed to exceed this by
/// one only between an insertion and the overflow repair that follows it.
pub(crate) const MAX_ELEMS: usize = 3;

/// Handle of a node inside a [`NodeArena`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct NodeId(u32);

impl NodeId {
    #[inline]
    fn slot(self) -> usize {
        self.0 as usize
    }
}

/// A child link: the child's handle and the number of elements below it.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Child {
    pub(crate) node: NodeId,
    pub(crate) count: usize,
}

/// One 2-3-4 node.
///
/// - `elems` is packed from the left: 1..=3 elements once settled.
/// - `kids` is empty for a leaf, `elems.len() + 1` otherwise.
pub(crate) struct Node<T> {
    pub(crate) elems: SmallVec<[T; 4]>,
    pub(crate) kids: SmallVec<[Child; 5]>,
}

impl<T> Node<T> {
    pub(crate) fn leaf(value: T) -> Self {
        Self {
            elems: smallvec![value],
            kids: SmallVec::new(),
        }
    }

    pub(crate) fn branch(sep: T, left: Child, right: Child) -> Self {
        Self {
            elems: smallvec![sep],
            kids: smallvec![left, right],
        }
    }

    #[inline]
    pub(crate) fn is_leaf(&self) -> bool {
        self.kids.is_empty()
    }

    /// Elements in this node's whole subtree.
    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.elems.len() + self.kids.iter().map(|k| k.count).sum::<usize>()
    }
}

/// Slot storage for the nodes of one tree, with a free list of vacated slots.
pub(crate) struct NodeArena<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<NodeId>,
    live: usize,
}

impl<T> NodeArena<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Number of occupied slots.
    pub(crate) fn live(&self) -> usize {
        self.live
    }

    pub(crate) fn alloc(&mut self, node: Node<T>) -> NodeId {
        self.live += 1;
        if let Some(id) = self.free.pop() {
            self.slots[id.slot()] = Some(node);
            return id;
        }
        let id = NodeId(u32::try_from(self.slots.len()).expect("node arena exhausted"));
        self.slots.push(Some(node));
        id
    }

    pub(crate) fn release(&mut self, id: NodeId) -> Node<T> {
        let node = self.slots[id.slot()]
            .take()
            .expect("released a vacant node slot");
        self.live -= 1;
        self.free.push(id);
        node
    }

    /// Moves the subtree rooted at `id` out of this arena into `dst`,
    /// returning the subtree's new root handle.
    pub(crate) fn transplant(&mut self, id: NodeId, dst: &mut NodeArena<T>) -> NodeId {
        let mut node = self.release(id);
        for kid in node.kids.iter_mut() {
            kid.node = self.transplant(kid.node, dst);
        }
        dst.alloc(node)
    }

    /// Deep-copies the subtree rooted at `id` into `dst`, mapping every
    /// element through `f`.
    pub(crate) fn copy_subtree<U>(
        &self,
        id: NodeId,
        dst: &mut NodeArena<U>,
        f: &mut impl FnMut(&T) -> U,
    ) -> NodeId {
        let node = &self[id];
        let elems = node.elems.iter().map(&mut *f).collect();
        let kids = node
            .kids
            .iter()
            .map(|kid| Child {
                node: self.copy_subtree(kid.node, dst, f),
                count: kid.count,
            })
            .collect();
        dst.alloc(Node { elems, kids })
    }

    /// Splits an overflowing node (four elements) in place.
    ///
    /// The node keeps its first element and first two children; the second
    /// element is returned for promotion together with a new node holding the
    /// last two elements and last three children.
    pub(crate) fn split_overflow(&mut self, id: NodeId) -> (T, NodeId) {
        let node = &mut self[id];
        debug_assert_eq!(node.elems.len(), MAX_ELEMS + 1);
        let right_elems: SmallVec<[T; 4]> = node.elems.drain(2..).collect();
        let right_kids: SmallVec<[Child; 5]> = if node.is_leaf() {
            SmallVec::new()
        } else {
            node.kids.drain(2..).collect()
        };
        let promoted = node.elems.pop().expect("overflowing node has elements");
        let right = self.alloc(Node {
            elems: right_elems,
            kids: right_kids,
        });
        (promoted, right)
    }

    /// Moves the last element (and last child) of `parent`'s child `ki - 1`
    /// through the separator into the front of child `ki`.
    pub(crate) fn rotate_right(&mut self, parent: NodeId, ki: usize) {
        let from = self[parent].kids[ki - 1].node;
        let to = self[parent].kids[ki].node;
        tracing::trace!("rotating one element from {from:?} into {to:?}");

        let donor = &mut self[from];
        let elem = donor.elems.pop().expect("donor sibling has elements");
        let kid = donor.kids.pop();
        let moved = 1 + kid.map_or(0, |k| k.count);

        let sep = std::mem::replace(&mut self[parent].elems[ki - 1], elem);
        let receiver = &mut self[to];
        receiver.elems.insert(0, sep);
        if let Some(kid) = kid {
            receiver.kids.insert(0, kid);
        }

        let kids = &mut self[parent].kids;
        kids[ki - 1].count -= moved;
        kids[ki].count += moved;
    }

    /// Moves the first element (and first child) of `parent`'s child `ki + 1`
    /// through the separator onto the end of child `ki`.
    pub(crate) fn rotate_left(&mut self, parent: NodeId, ki: usize) {
        let from = self[parent].kids[ki + 1].node;
        let to = self[parent].kids[ki].node;
        tracing::trace!("rotating one element from {from:?} into {to:?}");

        let donor = &mut self[from];
        let elem = donor.elems.remove(0);
        let kid = if donor.is_leaf() {
            None
        } else {
            Some(donor.kids.remove(0))
        };
        let moved = 1 + kid.map_or(0, |k| k.count);

        let sep = std::mem::replace(&mut self[parent].elems[ki], elem);
        let receiver = &mut self[to];
        receiver.elems.push(sep);
        if let Some(kid) = kid {
            receiver.kids.push(kid);
        }

        let kids = &mut self[parent].kids;
        kids[ki + 1].count -= moved;
        kids[ki].count += moved;
    }

    /// Merges `parent`'s children `j` and `j + 1` around separator `j`.
    /// The merged node keeps child `j`'s handle.
    pub(crate) fn merge_kids(&mut self, parent: NodeId, j: usize) {
        let p = &mut self[parent];
        let sep = p.elems.remove(j);
        let right = p.kids.remove(j + 1);
        p.kids[j].count += 1 + right.count;
        let left = p.kids[j].node;
        tracing::trace!("merging {:?} into {left:?}", right.node);

        let absorbed = self.release(right.node);
        let node = &mut self[left];
        node.elems.push(sep);
        node.elems.extend(absorbed.elems);
        node.kids.extend(absorbed.kids);
    }
}

impl<T> Index<NodeId> for NodeArena<T> {
    type Output = Node<T>;

    #[inline]
    fn index(&self, id: NodeId) -> &Node<T> {
        self.slots[id.slot()]
            .as_ref()
            .expect("dangling node handle")
    }
}

impl<T> IndexMut<NodeId> for NodeArena<T> {
    #[inline]
    fn index_mut(&mut self, id: NodeId) -> &mut Node<T> {
        self.slots[id.slot()]
            .as_mut()
            .expect("dangling node handle")
    }
}
