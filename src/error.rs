use thiserror::Error;

/// Why [`Tree234::join`](crate::Tree234::join) refused to combine two trees.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    /// Some element of the left operand does not compare strictly less than
    /// every element of the right operand.
    #[error("join operands are not strictly ordered")]
    Unordered,
}

/// A signed union contradicted the parity already recorded between two
/// elements of the same class.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("elements {a} and {b} are already joined with the opposite parity")]
pub struct ParityConflict {
    pub a: usize,
    pub b: usize,
}
