//! # puzzle-structures
//!
//! The two combinatorial structures that puzzle generators and solvers lean
//! on:
//!
//! - [`Tree234`]: a counted 2-3-4 tree. Every child link carries the element
//!   count of its subtree, so the tree answers rank queries, positional
//!   inserts and deletes, and can be split at or joined across any rank.
//!   It runs either sorted (by a comparator fixed at construction) or
//!   unsorted (a rank-addressed sequence).
//! - [`Dsf`]: a disjoint-set forest over `0..n` that can also record whether
//!   two members of a class are "the same" or "inverted" relative to each
//!   other.
//!
//! ## Example
//!
//! ```rust
//! use puzzle_structures::{Dsf, Relation, Tree234};
//!
//! let mut tree = Tree234::ordered();
//! for v in [5, 2, 8, 1, 9, 3] {
//!     tree.insert(v);
//! }
//! assert_eq!(tree.get(0), Some(&1));
//! assert_eq!(tree.find_relative(Some(&4), Relation::Gt), Some((&5, 3)));
//!
//! let mut dsf = Dsf::new(4);
//! dsf.union_signed(0, 1, true).unwrap();
//! assert_eq!(dsf.relative_parity(0, 1), Some(true));
//! assert!(dsf.union_signed(1, 0, false).is_err());
//! ```

pub mod dsf;
pub mod error;
pub mod tree234;

pub use dsf::Dsf;
pub use error::{JoinError, ParityConflict};
pub use tree234::{Iter, Relation, Tree234};
