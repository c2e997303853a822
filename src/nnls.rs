//! Hybrid FAST + sequential coordinate descent non-negative least squares solver.
//!
//! Solves `a * x = b`, `x >= 0`, independently for each column of `b`. `a` is assumed symmetric
//! positive semi-definite; the caller is responsible for that when `fast_nnls` is selected; a
//! non-SPD `a` combined with `fast_nnls` is undefined but non-trapping behavior.

use faer::{Col, Mat, MatRef, unzip, zip};
use problemo::Problem;
use problemo::common::IntoCommonProblem;

use crate::E;
use crate::error::NmfError;
use crate::linalg::Llt;
use crate::linalg::dense::axpy;

/// Denominator floor guarding the coordinate-descent tolerance update against division by zero.
const TAU: E = 1e-15;

/// Configuration for [`nnls`].
#[derive(Debug, Clone, Copy)]
pub struct NnlsOptions {
    cd_maxit: usize,
    cd_tol: E,
    fast_nnls: bool,
    nonneg: bool,
    l1: E,
}

impl Default for NnlsOptions {
    fn default() -> Self {
        Self {
            cd_maxit: 100,
            cd_tol: 1e-8,
            fast_nnls: false,
            nonneg: true,
            l1: 0.0,
        }
    }
}

impl NnlsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cd_maxit(mut self, cd_maxit: usize) -> Self {
        self.cd_maxit = cd_maxit;
        self
    }

    pub fn with_cd_tol(mut self, cd_tol: E) -> Self {
        self.cd_tol = cd_tol;
        self
    }

    pub fn with_fast_nnls(mut self, fast_nnls: bool) -> Self {
        self.fast_nnls = fast_nnls;
        self
    }

    pub fn with_nonneg(mut self, nonneg: bool) -> Self {
        self.nonneg = nonneg;
        self
    }

    pub fn with_l1(mut self, l1: E) -> Self {
        self.l1 = l1;
        self
    }

    pub fn build(self) -> Result<Self, Problem> {
        if self.l1 < 0.0 {
            return Err(format!("L1 must be >= 0, got {}", self.l1).as_str().gloss());
        }
        Ok(self)
    }
}

/// Solves `a * x = b`, column by column, under the configured options.
///
/// Raises [`NmfError::NotSquare`] if `a` is not square, or [`NmfError::DimensionMismatch`] if
/// `rows(a) != rows(b)`. Does not raise on coordinate-descent non-convergence; returns the last
/// iterate.
pub fn nnls(a: MatRef<'_, E>, b: MatRef<'_, E>, options: &NnlsOptions) -> Result<Mat<E>, Problem> {
    if a.nrows() != a.ncols() {
        return Err(NmfError::NotSquare {
            rows: a.nrows(),
            cols: a.ncols(),
        }
        .into());
    }
    if a.nrows() != b.nrows() {
        return Err(NmfError::DimensionMismatch {
            a_rows: a.nrows(),
            b_rows: b.nrows(),
        }
        .into());
    }

    let shared_llt = if options.fast_nnls {
        Some(Llt::factorize(a)?)
    } else {
        None
    };

    let mut x = Mat::<E>::zeros(a.nrows(), b.ncols());
    for j in 0..b.ncols() {
        let col = nnls_column(a, b.col(j), shared_llt.as_ref(), options)?;
        zip!(x.col_mut(j), col.as_ref()).for_each(|unzip!(dst, src)| *dst = *src);
    }
    Ok(x)
}

/// Solves a single right-hand side against `a`. Exposed crate-wide so the projection engine can
/// drive its own (parallel) column loop directly, rather than through the sequential batch
/// wrapper [`nnls`].
pub(crate) fn nnls_column(
    a: MatRef<'_, E>,
    b: faer::ColRef<'_, E>,
    shared_llt: Option<&Llt>,
    options: &NnlsOptions,
) -> Result<Col<E>, Problem> {
    let m = a.nrows();

    let mut b_work = b.to_owned();
    if options.l1 > 0.0 {
        zip!(b_work.as_mut()).for_each(|unzip!(b)| *b -= options.l1);
    }

    let mut x = Col::<E>::zeros(m);

    if let Some(llt) = shared_llt {
        x = llt.solve(b_work.as_ref());

        if options.nonneg {
            loop {
                let feasible: Vec<usize> = (0..m).filter(|&i| x[i] > 0.0).collect();
                if feasible.is_empty() {
                    x = Col::<E>::zeros(m);
                    break;
                }

                let sub_a = gather(a, &feasible);
                let sub_b = gather_col(b_work.as_ref(), &feasible);
                let sub_llt = Llt::factorize(sub_a.as_ref())?;
                let xf = sub_llt.solve(sub_b.as_ref());

                let mut candidate = Col::<E>::zeros(m);
                for (idx, &row) in feasible.iter().enumerate() {
                    candidate[row] = xf[idx];
                }
                x = candidate;

                let all_positive = feasible.iter().enumerate().all(|(idx, _)| xf[idx] > 0.0);
                if all_positive {
                    break;
                }
            }
        }

        // Residual right-hand side feeding the coordinate-descent refinement below.
        let ax = a * x.as_ref();
        zip!(b_work.as_mut(), ax.as_ref()).for_each(|unzip!(b, ax)| *b -= *ax);
    }

    for _iter in 0..options.cd_maxit {
        let mut tol = 0.0;
        for i in 0..m {
            let aii = a[(i, i)];
            let delta = b_work[i] / aii;

            if options.nonneg && x[i] + delta < 0.0 {
                if x[i] != 0.0 {
                    axpy(x[i], a.col(i), &mut b_work);
                    x[i] = 0.0;
                    tol += 1.0;
                }
            } else if delta != 0.0 {
                x[i] += delta;
                axpy(-delta, a.col(i), &mut b_work);
                tol += (delta / (x[i] + TAU)).abs();
            }
        }
        if tol / (m as E) < options.cd_tol {
            break;
        }
    }

    Ok(x)
}

fn gather(a: MatRef<'_, E>, indices: &[usize]) -> Mat<E> {
    Mat::from_fn(indices.len(), indices.len(), |i, j| {
        a[(indices[i], indices[j])]
    })
}

fn gather_col(b: faer::ColRef<'_, E>, indices: &[usize]) -> Col<E> {
    Col::from_fn(indices.len(), |i| b[indices[i]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spd_3x3() -> Mat<E> {
        Mat::from_fn(3, 3, |i, j| {
            [
                [4.0, 12.0, -16.0],
                [12.0, 37.0, -43.0],
                [-16.0, -43.0, 98.0],
            ][i][j]
        })
    }

    #[test]
    fn unconstrained_fast_nnls_matches_direct_solve_when_already_nonneg() {
        let a = spd_3x3();
        let x_true = Col::from_fn(3, |i| [1.0, 2.0, 3.0][i]);
        let b_col = a.as_ref() * x_true.as_ref();
        let b = Mat::from_fn(3, 1, |i, _| b_col[i]);

        let options = NnlsOptions::new().with_fast_nnls(true).build().unwrap();
        let x = nnls(a.as_ref(), b.as_ref(), &options).unwrap();

        for i in 0..3 {
            assert!((x[(i, 0)] - x_true[i]).abs() < 1e-6);
        }
    }

    #[test]
    fn coordinate_descent_enforces_nonnegativity() {
        // a = identity, b has a negative entry; unconstrained solution would be negative there.
        let a = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 0.0 });
        let b = Mat::from_fn(2, 1, |i, _| [-1.0, 2.0][i]);

        let options = NnlsOptions::new().with_cd_maxit(50).build().unwrap();
        let x = nnls(a.as_ref(), b.as_ref(), &options).unwrap();

        assert!(x[(0, 0)] >= 0.0);
        assert!((x[(1, 0)] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_non_square_a() {
        let a = Mat::<E>::zeros(2, 3);
        let b = Mat::<E>::zeros(2, 1);
        let options = NnlsOptions::new().build().unwrap();
        assert!(nnls(a.as_ref(), b.as_ref(), &options).is_err());
    }

    #[test]
    fn l1_shifts_solution_toward_sparser_result() {
        let a = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 0.0 });
        let b = Mat::from_fn(2, 1, |i, _| [1.0, 0.05][i]);

        let plain = NnlsOptions::new().build().unwrap();
        let x_plain = nnls(a.as_ref(), b.as_ref(), &plain).unwrap();

        let sparse = NnlsOptions::new().with_l1(0.1).build().unwrap();
        let x_sparse = nnls(a.as_ref(), b.as_ref(), &sparse).unwrap();

        assert!(x_plain[(1, 0)] > 0.0);
        assert_eq!(x_sparse[(1, 0)], 0.0);
    }
}
