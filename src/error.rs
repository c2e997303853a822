//! Crate-wide error taxonomy.
//!
//! Every fallible entry point in this crate returns `Result<T, problemo::Problem>` so callers
//! deal with a single error type regardless of which module failed. Internally, modules raise a
//! [`NmfError`] variant and attach it to a `Result` with [`problemo::ProblemResult::via`], or build
//! an ad hoc [`problemo::Problem`] from a `&str` with `.gloss()` for one-off precondition checks.

use derive_more::{Display, Error};

/// Typed failure categories for the NNLS solver, projection engine, and ALS driver.
#[derive(Debug, Display, Error, PartialEq)]
pub enum NmfError {
    #[display("matrix `a` must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[display("rows(a) = {a_rows} does not match rows(b) = {b_rows}")]
    DimensionMismatch { a_rows: usize, b_rows: usize },

    #[display("project() requires exactly one of `w` or `h`, got {count}")]
    ExactlyOneFactorRequired { count: usize },

    #[display("factor shape {got:?} is incompatible with A's shape {a_shape:?} for rank {k}")]
    IncompatibleFactorShape {
        got: (usize, usize),
        a_shape: (usize, usize),
        k: usize,
    },

    #[display("L1 must satisfy 0 <= L1 < 1, got {value}")]
    L1OutOfRange { value: f64 },

    #[display("mask_zeros requires a sparse A")]
    MaskZerosRequiresSparse,

    #[display("mask_zeros is not supported when updating w in-place")]
    MaskZerosUnsupportedDirection,

    #[display("rank k must be at least 1, got {k}")]
    InvalidRank { k: usize },

    #[display("a degenerate Gram matrix could not be factorized (column {col})")]
    DegenerateSystem { col: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_with_context() {
        let err = NmfError::L1OutOfRange { value: 1.5 };
        assert_eq!(err.to_string(), "L1 must satisfy 0 <= L1 < 1, got 1.5");
    }
}
