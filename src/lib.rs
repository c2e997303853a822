//! Non-negative matrix factorization of large, predominantly sparse matrices.
//!
//! Factorizes a non-negative matrix `A` (features x samples) into `A ~= w * diag(d) * h`, where
//! `w` (features x k), `h` (k x samples), and `d` (length k) are chosen to minimize reconstruction
//! error under optional non-negativity and L1 sparsity constraints. Built from three layers:
//!
//! - [`nnls`] — a hybrid Forward Active Set Tuning (FAST) + coordinate descent solver for
//!   `a * x = b`, `x >= 0`, column by column.
//! - [`project`] — per-column construction of the Gram system against a sparse or dense `A`,
//!   dispatched across threads, with rank-1/rank-2 specializations.
//! - [`als`] — the alternating-least-squares driver that repeatedly projects `h` from `w` and `w`
//!   from `h`, with diagonal scaling and a correlation-based stopping rule.

pub type E = f64;
pub type I = usize;

pub mod als;
pub mod error;
pub mod linalg;
pub mod model;
pub mod mse;
pub mod nnls;
pub mod project;
pub mod sparse;
pub mod threads;

pub use als::{NmfOptions, nmf};
pub use model::{Model, Status};
pub use mse::mse;
pub use nnls::{NnlsOptions, nnls};
pub use project::{ProjectOptions, project};
pub use sparse::SparseView;
pub use threads::{get_threads, set_threads};
