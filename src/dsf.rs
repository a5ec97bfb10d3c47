//! Disjoint-set forest with parity tracking.
//!
//! Besides plain connectivity, every member of a class carries a parity bit
//! relative to the class representative, so a merge can assert that two
//! elements are "the same" or "inverted" with respect to each other, and any
//! two members of one class can later be asked which they are.
//!
//! The representative of a class is always its smallest element. Merges keep
//! the numerically smaller of the two representatives as the root, which
//! makes representatives independent of merge order.

use std::fmt;

use crate::error::ParityConflict;

/// Largest domain a [`Dsf`] can hold. Two bits of each cell are flags and the
/// remaining 30 must fit the size of a class spanning the whole domain.
pub const MAX_ELEMENTS: usize = (1 << 30) - 1;

/// One packed forest slot.
///
/// - bit 0: inverted relative to the parent (non-roots only);
/// - bit 1: this element is a root;
/// - bits 2..: parent index for non-roots, class size for roots.
#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell(u32);

impl Cell {
    const INVERTED: u32 = 1;
    const ROOT: u32 = 2;
    const SHIFT: u32 = 2;

    #[inline]
    fn root(size: usize) -> Self {
        debug_assert!(size <= MAX_ELEMENTS);
        Self(((size as u32) << Self::SHIFT) | Self::ROOT)
    }

    #[inline]
    fn child(parent: usize, inverted: bool) -> Self {
        debug_assert!(parent < MAX_ELEMENTS);
        Self(((parent as u32) << Self::SHIFT) | u32::from(inverted))
    }

    #[inline]
    fn is_root(self) -> bool {
        self.0 & Self::ROOT != 0
    }

    #[inline]
    fn inverted(self) -> bool {
        self.0 & Self::INVERTED != 0
    }

    #[inline]
    fn parent(self) -> usize {
        debug_assert!(!self.is_root());
        (self.0 >> Self::SHIFT) as usize
    }

    #[inline]
    fn size(self) -> usize {
        debug_assert!(self.is_root());
        (self.0 >> Self::SHIFT) as usize
    }
}

/// A union-find over `0..n` whose merges may assert relative parity.
#[derive(Clone, PartialEq, Eq)]
pub struct Dsf {
    cells: Vec<Cell>,
}

impl Dsf {
    /// `n` singleton classes.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [`MAX_ELEMENTS`].
    pub fn new(n: usize) -> Self {
        assert!(n <= MAX_ELEMENTS, "dsf of {n} elements exceeds {MAX_ELEMENTS}");
        Self {
            cells: vec![Cell::root(1); n],
        }
    }

    /// Returns every element to its own singleton class.
    pub fn reset(&mut self) {
        self.cells.fill(Cell::root(1));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The representative (smallest member) of `i`'s class.
    pub fn canonify(&mut self, i: usize) -> usize {
        self.canonify_with_parity(i).0
    }

    /// The representative of `i`'s class, and whether `i` is inverted
    /// relative to it.
    ///
    /// Every element visited on the way is re-pointed straight at the
    /// representative, carrying its accumulated parity.
    pub fn canonify_with_parity(&mut self, i: usize) -> (usize, bool) {
        let (root, inverted) = self.walk(i);

        let mut cur = i;
        let mut parity = inverted;
        while cur != root {
            let cell = self.cells[cur];
            self.cells[cur] = Cell::child(root, parity);
            parity ^= cell.inverted();
            cur = cell.parent();
        }
        debug_assert!(!parity, "parity along a compressed path must cancel");

        (root, inverted)
    }

    /// Follows parent links without compressing.
    fn walk(&self, mut i: usize) -> (usize, bool) {
        let mut inverted = false;
        loop {
            let cell = self.cells[i];
            if cell.is_root() {
                return (i, inverted);
            }
            inverted ^= cell.inverted();
            i = cell.parent();
        }
    }

    /// Merges the classes of `a` and `b` without asserting any inversion.
    /// Equivalent to `union_signed(a, b, false)`.
    pub fn union(&mut self, a: usize, b: usize) -> Result<bool, ParityConflict> {
        self.union_signed(a, b, false)
    }

    /// Merges the classes of `a` and `b`, recording that `b` is `inverted`
    /// relative to `a`.
    ///
    /// Returns `Ok(true)` if two classes were merged and `Ok(false)` if `a`
    /// and `b` were already joined with that parity. If they were already
    /// joined with the opposite parity, nothing changes and
    /// [`ParityConflict`] is returned.
    pub fn union_signed(&mut self, a: usize, b: usize, inverted: bool) -> Result<bool, ParityConflict> {
        let (ra, pa) = self.canonify_with_parity(a);
        let (rb, pb) = self.canonify_with_parity(b);
        let inverted = inverted ^ pa ^ pb;

        if ra == rb {
            if inverted {
                tracing::debug!(a, b, "parity conflict in signed union");
                return Err(ParityConflict { a, b });
            }
            return Ok(false);
        }

        let (keep, absorb) = if ra < rb { (ra, rb) } else { (rb, ra) };
        let size = self.cells[keep].size() + self.cells[absorb].size();
        self.cells[keep] = Cell::root(size);
        self.cells[absorb] = Cell::child(keep, inverted);
        Ok(true)
    }

    pub fn same_class(&mut self, a: usize, b: usize) -> bool {
        self.canonify(a) == self.canonify(b)
    }

    /// Whether `b` is inverted relative to `a`, or `None` if they are in
    /// different classes.
    pub fn relative_parity(&mut self, a: usize, b: usize) -> Option<bool> {
        let (ra, pa) = self.canonify_with_parity(a);
        let (rb, pb) = self.canonify_with_parity(b);
        (ra == rb).then_some(pa ^ pb)
    }

    /// Number of elements in `i`'s class.
    pub fn class_size(&mut self, i: usize) -> usize {
        let root = self.canonify(i);
        self.cells[root].size()
    }
}

struct Member(usize, bool);

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.1 {
            write!(f, "!{}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Renders each class as `representative: [members]`, with inverted members
/// prefixed by `!`.
impl fmt::Debug for Dsf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut classes: Vec<Vec<Member>> = (0..self.len()).map(|_| Vec::new()).collect();
        for i in 0..self.len() {
            let (root, inverted) = self.walk(i);
            classes[root].push(Member(i, inverted));
        }
        f.debug_map()
            .entries(
                classes
                    .iter()
                    .enumerate()
                    .filter(|(_, members)| !members.is_empty()),
            )
            .finish()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_merges_are_consistent(
            n in 1usize..40,
            merges in prop::collection::vec((any::<prop::sample::Index>(), any::<prop::sample::Index>(), any::<bool>()), 0..80),
        ) {
            let mut dsf = Dsf::new(n);
            let mut asserted = Vec::new();

            for (a, b, inverted) in merges {
                let (a, b) = (a.index(n), b.index(n));
                if dsf.union_signed(a, b, inverted).is_ok() {
                    asserted.push((a, b, inverted));
                }
                // Every accepted assertion still holds after later merges.
                for &(x, y, inv) in &asserted {
                    prop_assert_eq!(dsf.relative_parity(x, y), Some(inv));
                }
            }

            for a in 0..n {
                prop_assert!(dsf.same_class(a, a));
                let rep = dsf.canonify(a);
                prop_assert!(rep <= a);
                prop_assert_eq!(dsf.canonify(rep), rep);
                for b in 0..n {
                    prop_assert_eq!(dsf.same_class(a, b), dsf.same_class(b, a));
                    if let (Some(ab), Some(ba)) = (dsf.relative_parity(a, b), dsf.relative_parity(b, a)) {
                        prop_assert_eq!(ab, ba);
                    }
                }
            }
        }
    }
}
