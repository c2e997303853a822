//! Projection engine: given one non-negative factor matrix, solves for the other against `A`.
//!
//! Per-column construction of the Gram system (`w * w^T`, `w * A[:,j]`) dispatched across threads,
//! with closed-form specializations for rank 1 and rank 2 that bypass the general NNLS solver
//! entirely (parallel overhead exceeds the arithmetic at those ranks, so they run serially).

use faer::{Col, Mat, MatRef};
use problemo::Problem;
use problemo::common::IntoCommonProblem;
use rayon::prelude::*;

use crate::E;
use crate::error::NmfError;
use crate::linalg::Llt;
use crate::nnls::{NnlsOptions, nnls_column};
use crate::sparse::SparseView;
use crate::threads::with_pool;

/// Sparse or dense view of the matrix being factorized.
#[derive(Clone, Copy)]
pub enum InputMatrix<'a> {
    Sparse(SparseView<'a>),
    Dense(MatRef<'a, E>),
}

impl<'a> InputMatrix<'a> {
    pub fn nrows(&self) -> usize {
        match self {
            InputMatrix::Sparse(s) => s.nrows(),
            InputMatrix::Dense(d) => d.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            InputMatrix::Sparse(s) => s.ncols(),
            InputMatrix::Dense(d) => d.ncols(),
        }
    }

    fn is_sparse(&self) -> bool {
        matches!(self, InputMatrix::Sparse(_))
    }
}

/// Configuration for [`project`].
#[derive(Debug, Clone, Copy)]
pub struct ProjectOptions {
    nonneg: bool,
    l1: E,
    mask_zeros: bool,
    transpose: bool,
    symmetric: bool,
    cd_maxit: usize,
    cd_tol: E,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            nonneg: true,
            l1: 0.0,
            mask_zeros: false,
            transpose: false,
            symmetric: false,
            cd_maxit: 100,
            cd_tol: 1e-8,
        }
    }
}

impl ProjectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nonneg(mut self, nonneg: bool) -> Self {
        self.nonneg = nonneg;
        self
    }

    pub fn with_l1(mut self, l1: E) -> Self {
        self.l1 = l1;
        self
    }

    pub fn with_mask_zeros(mut self, mask_zeros: bool) -> Self {
        self.mask_zeros = mask_zeros;
        self
    }

    /// Selects the transposed strategy for the "update w from h" direction: materialize `A^T`
    /// once so the inner update loop is fully parallel. Leave at the default (`false`, the
    /// in-place strategy) when `A` is large enough that transposition dominates.
    pub fn with_transpose(mut self, transpose: bool) -> Self {
        self.transpose = transpose;
        self
    }

    /// Explicit symmetry hint: when `true` and the transposed strategy is selected, `A` is known
    /// to equal `A^T` already, so the "update w from h" step reduces directly to the h-update
    /// against `A` itself rather than paying to materialize a transpose.
    pub fn with_symmetric(mut self, symmetric: bool) -> Self {
        self.symmetric = symmetric;
        self
    }

    pub fn with_cd_maxit(mut self, cd_maxit: usize) -> Self {
        self.cd_maxit = cd_maxit;
        self
    }

    pub fn with_cd_tol(mut self, cd_tol: E) -> Self {
        self.cd_tol = cd_tol;
        self
    }

    pub fn build(self) -> Result<Self, Problem> {
        if self.l1 < 0.0 {
            return Err(format!("L1 must be >= 0, got {}", self.l1).as_str().gloss());
        }
        Ok(self)
    }

    fn nnls_options(&self) -> NnlsOptions {
        NnlsOptions::new()
            .with_nonneg(self.nonneg)
            .with_l1(self.l1)
            .with_cd_maxit(self.cd_maxit)
            .with_cd_tol(self.cd_tol)
            .with_fast_nnls(true)
    }
}

/// Given `A` and exactly one of `w`/`h`, solves for the other factor. Columns are independent and
/// are dispatched across the process-wide thread pool for `k >= 3`; ranks 1 and 2 run serially.
pub fn project(
    a: InputMatrix<'_>,
    w: Option<MatRef<'_, E>>,
    h: Option<MatRef<'_, E>>,
    options: &ProjectOptions,
) -> Result<Mat<E>, Problem> {
    let count = w.is_some() as usize + h.is_some() as usize;
    if count != 1 {
        return Err(NmfError::ExactlyOneFactorRequired { count }.into());
    }

    if options.mask_zeros {
        if !a.is_sparse() {
            return Err(NmfError::MaskZerosRequiresSparse.into());
        }
        if w.is_none() {
            return Err(NmfError::MaskZerosUnsupportedDirection.into());
        }
    }

    if let Some(w) = w {
        if w.nrows() != a.nrows() {
            return Err(NmfError::DimensionMismatch {
                a_rows: a.nrows(),
                b_rows: w.nrows(),
            }
            .into());
        }
        if options.mask_zeros {
            let InputMatrix::Sparse(sparse) = a else {
                unreachable!("validated sparse above")
            };
            return update_h_from_w_masked(sparse, w, options);
        }
        return project_shared(w, a, options);
    }

    let h = h.expect("exactly one of w/h validated above");
    if h.ncols() != a.ncols() {
        return Err(NmfError::DimensionMismatch {
            a_rows: a.ncols(),
            b_rows: h.ncols(),
        }
        .into());
    }
    update_w_from_h(a, h, options)
}

/// Shared computation for "update h from w" and the transposed-path half of "update w from h":
/// both reduce to solving `(fixed^T * fixed) * x[:,j] = fixed^T * target[:,j]` for every column
/// `j` of `target`.
fn project_shared(
    fixed: MatRef<'_, E>,
    target: InputMatrix<'_>,
    options: &ProjectOptions,
) -> Result<Mat<E>, Problem> {
    let k = fixed.ncols();
    let ncols = target.ncols();
    let gram = fixed.transpose() * fixed;

    let rhs_col = |j: usize| -> Col<E> {
        match target {
            InputMatrix::Dense(d) => fixed.transpose() * d.col(j),
            InputMatrix::Sparse(s) => {
                let mut b = Col::<E>::zeros(k);
                for (row, val) in s.col_iter(j) {
                    for kk in 0..k {
                        b[kk] += val * fixed[(row, kk)];
                    }
                }
                b
            }
        }
    };

    let columns: Vec<Result<Col<E>, Problem>> = match k {
        1 => (0..ncols)
            .map(|j| Ok(solve_rank1(gram[(0, 0)], rhs_col(j)[0], options)))
            .collect(),
        2 => (0..ncols)
            .map(|j| {
                let b = rhs_col(j);
                Ok(solve_rank2(&gram, b[0], b[1], options))
            })
            .collect(),
        _ => {
            let llt = Llt::factorize(gram.as_ref())?;
            let nnls_opts = options.nnls_options();
            with_pool(|| {
                (0..ncols)
                    .into_par_iter()
                    .map(|j| nnls_column(gram.as_ref(), rhs_col(j).as_ref(), Some(&llt), &nnls_opts))
                    .collect()
            })
        }
    };

    assemble(k, ncols, columns)
}

fn update_w_from_h(a: InputMatrix<'_>, h: MatRef<'_, E>, options: &ProjectOptions) -> Result<Mat<E>, Problem> {
    // `project_shared` expects `fixed` oriented so `fixed.nrows() == target.nrows()`, matching
    // `w` (m x k) in the h-update; `h` is `k x n`, so it must be transposed to `n x k` first —
    // otherwise `fixed.transpose() * fixed` computes `h^T * h` (n x n) instead of `h * h^T`.
    let ht = h.transpose();
    if options.symmetric {
        let wt = project_shared(ht, a, options)?;
        return Ok(wt.transpose().to_owned());
    }
    if options.transpose {
        let transposed = transpose_input(a);
        let wt = project_shared(ht, transposed.view(), options)?;
        return Ok(wt.transpose().to_owned());
    }
    update_w_from_h_in_place(a, h, options)
}

/// Accumulates right-hand sides row-by-row across samples into an `m x k` buffer without ever
/// materializing `A^T`, then solves `(h * h^T) * w[i,:]^T = buffer[i,:]^T` once per feature row.
fn update_w_from_h_in_place(
    a: InputMatrix<'_>,
    h: MatRef<'_, E>,
    options: &ProjectOptions,
) -> Result<Mat<E>, Problem> {
    let k = h.nrows();
    let m = a.nrows();
    let n = a.ncols();

    let mut buffer = Mat::<E>::zeros(m, k);
    match a {
        InputMatrix::Dense(d) => {
            for j in 0..n {
                let hcol = h.col(j);
                for i in 0..m {
                    let aij = d[(i, j)];
                    if aij == 0.0 {
                        continue;
                    }
                    for kk in 0..k {
                        buffer[(i, kk)] += aij * hcol[kk];
                    }
                }
            }
        }
        InputMatrix::Sparse(s) => {
            for j in 0..n {
                let hcol = h.col(j);
                for (i, val) in s.col_iter(j) {
                    for kk in 0..k {
                        buffer[(i, kk)] += val * hcol[kk];
                    }
                }
            }
        }
    }

    let gram = h * h.transpose();

    let rows: Vec<Result<Col<E>, Problem>> = match k {
        1 => (0..m)
            .map(|i| Ok(solve_rank1(gram[(0, 0)], buffer[(i, 0)], options)))
            .collect(),
        2 => (0..m)
            .map(|i| Ok(solve_rank2(&gram, buffer[(i, 0)], buffer[(i, 1)], options)))
            .collect(),
        _ => {
            let llt = Llt::factorize(gram.as_ref())?;
            let nnls_opts = options.nnls_options();
            with_pool(|| {
                (0..m)
                    .into_par_iter()
                    .map(|i| {
                        let b = Col::from_fn(k, |kk| buffer[(i, kk)]);
                        nnls_column(gram.as_ref(), b.as_ref(), Some(&llt), &nnls_opts)
                    })
                    .collect()
            })
        }
    };

    let wt = assemble(k, m, rows)?;
    Ok(wt.transpose().to_owned())
}

/// Zero-masked "update h from w": per column, restricts both the Gram matrix and the right-hand
/// side to the rows where `A[:,j]` is non-zero, so the Gram matrix must be recomputed from scratch
/// for every column instead of factorized once and shared. Slower than the unmasked path by
/// design; see the module docs.
fn update_h_from_w_masked(
    a: SparseView<'_>,
    w: MatRef<'_, E>,
    options: &ProjectOptions,
) -> Result<Mat<E>, Problem> {
    let k = w.ncols();
    let ncols = a.ncols();
    let nnls_opts = options.nnls_options();

    let columns: Vec<Result<Col<E>, Problem>> = with_pool(|| {
        (0..ncols)
            .into_par_iter()
            .map(|j| {
                let mut gram = Mat::<E>::zeros(k, k);
                let mut b = Col::<E>::zeros(k);
                for (row, val) in a.col_iter(j) {
                    for p in 0..k {
                        b[p] += val * w[(row, p)];
                        for q in 0..k {
                            gram[(p, q)] += w[(row, p)] * w[(row, q)];
                        }
                    }
                }
                let llt = Llt::factorize(gram.as_ref())?;
                nnls_column(gram.as_ref(), b.as_ref(), Some(&llt), &nnls_opts)
            })
            .collect()
    });

    assemble(k, ncols, columns)
}

fn solve_rank1(a: E, b: E, options: &ProjectOptions) -> Col<E> {
    let b = b - options.l1;
    let val = b / a;
    Col::from_fn(1, |_| if options.nonneg { val.max(0.0) } else { val })
}

fn solve_rank2(gram: &Mat<E>, b1: E, b2: E, options: &ProjectOptions) -> Col<E> {
    let b1 = b1 - options.l1;
    let b2 = b2 - options.l1;
    let a11 = gram[(0, 0)];
    let a22 = gram[(1, 1)];
    let a12 = gram[(0, 1)];
    let det = a11 * a22 - a12 * a12;

    let mut x1 = (a22 * b1 - a12 * b2) / det;
    let mut x2 = (a11 * b2 - a12 * b1) / det;

    if options.nonneg {
        if x1 < 0.0 {
            x1 = 0.0;
            x2 = (b2 / a22).max(0.0);
        } else if x2 < 0.0 {
            x2 = 0.0;
            x1 = (b1 / a11).max(0.0);
        }
    }
    Col::from_fn(2, |i| if i == 0 { x1 } else { x2 })
}

fn assemble(k: usize, ncols: usize, columns: Vec<Result<Col<E>, Problem>>) -> Result<Mat<E>, Problem> {
    let columns: Vec<Col<E>> = columns.into_iter().collect::<Result<_, _>>()?;
    Ok(Mat::from_fn(k, ncols, |i, j| columns[j][i]))
}

struct OwnedCsc {
    nrows: usize,
    ncols: usize,
    col_ptrs: Vec<usize>,
    row_indices: Vec<usize>,
    values: Vec<E>,
}

impl OwnedCsc {
    fn view(&self) -> InputMatrix<'_> {
        InputMatrix::Sparse(SparseView::new(
            self.nrows,
            self.ncols,
            &self.col_ptrs,
            &self.row_indices,
            &self.values,
        ))
    }
}

/// Builds `A^T` for the transposed-path strategy: a counting-sort CSC transpose for sparse input,
/// a plain dense transpose otherwise wrapped back in the same [`InputMatrix`] shape.
fn transpose_input(a: InputMatrix<'_>) -> TransposedInput {
    match a {
        InputMatrix::Dense(d) => TransposedInput::Dense(d.transpose().to_owned()),
        InputMatrix::Sparse(s) => TransposedInput::Sparse(transpose_csc(&s)),
    }
}

enum TransposedInput {
    Dense(Mat<E>),
    Sparse(OwnedCsc),
}

impl TransposedInput {
    fn view(&self) -> InputMatrix<'_> {
        match self {
            TransposedInput::Dense(m) => InputMatrix::Dense(m.as_ref()),
            TransposedInput::Sparse(csc) => csc.view(),
        }
    }
}

fn transpose_csc(a: &SparseView<'_>) -> OwnedCsc {
    let nrows = a.ncols();
    let ncols = a.nrows();
    let nnz = a.nnz();

    let mut counts = vec![0usize; ncols + 1];
    for j in 0..a.ncols() {
        for (row, _) in a.col_iter(j) {
            counts[row + 1] += 1;
        }
    }
    for i in 0..ncols {
        counts[i + 1] += counts[i];
    }
    let col_ptrs = counts.clone();

    let mut row_indices = vec![0usize; nnz];
    let mut values = vec![0.0; nnz];
    let mut cursor = counts;
    for j in 0..a.ncols() {
        for (row, val) in a.col_iter(j) {
            let dest = cursor[row];
            row_indices[dest] = j;
            values[dest] = val;
            cursor[row] += 1;
        }
    }

    OwnedCsc {
        nrows,
        ncols,
        col_ptrs,
        row_indices,
        values,
    }
}
