//! Dense Cholesky (LLT) factorization and the GEMV/axpy wrappers built on top of it.
//!
//! The Gram systems solved here are always `k x k` for the factorization rank `k` (typically
//! single digits to low hundreds), so a textbook Cholesky–Banachiewicz in-place elimination is
//! both simpler and plenty fast; there is no need to route through a general sparse factorization
//! path for matrices this small and this dense.

use faer::{Col, ColRef, Mat, MatRef, unzip, zip};

use crate::E;
use crate::error::NmfError;

/// Lower-triangular Cholesky factor `L` of a symmetric positive semi-definite matrix, such that
/// `L * L^T` reconstructs the original matrix.
#[derive(Debug, Clone)]
pub struct Llt {
    l: Mat<E>,
}

impl Llt {
    /// Factorizes `a`, which must be square. `a` is read only through its lower triangle.
    ///
    /// Returns [`NmfError::DegenerateSystem`] if a diagonal pivot is non-positive after
    /// subtracting the accumulated row contributions, which happens when `a` is not actually
    /// positive definite (e.g. a feasible-set sub-system collapsed to a singular matrix).
    pub fn factorize(a: MatRef<'_, E>) -> Result<Self, NmfError> {
        let n = a.nrows();
        assert_eq!(n, a.ncols(), "Llt::factorize requires a square matrix");

        let mut l = Mat::<E>::zeros(n, n);
        for j in 0..n {
            let mut sum = a[(j, j)];
            for p in 0..j {
                sum -= l[(j, p)] * l[(j, p)];
            }
            if sum <= 0.0 {
                return Err(NmfError::DegenerateSystem { col: j });
            }
            let ljj = sum.sqrt();
            l[(j, j)] = ljj;

            for i in (j + 1)..n {
                let mut sum = a[(i, j)];
                for p in 0..j {
                    sum -= l[(i, p)] * l[(j, p)];
                }
                l[(i, j)] = sum / ljj;
            }
        }
        Ok(Self { l })
    }

    /// Dimension of the factorized system.
    pub fn dim(&self) -> usize {
        self.l.nrows()
    }

    /// Solves `L * L^T * x = b` in place via forward then back substitution.
    pub fn solve_in_place(&self, b: &mut Col<E>) {
        let n = self.l.nrows();
        debug_assert_eq!(b.nrows(), n);

        // Forward substitution: L * y = b.
        for i in 0..n {
            let mut sum = b[i];
            for p in 0..i {
                sum -= self.l[(i, p)] * b[p];
            }
            b[i] = sum / self.l[(i, i)];
        }
        // Back substitution: L^T * x = y.
        for i in (0..n).rev() {
            let mut sum = b[i];
            for p in (i + 1)..n {
                sum -= self.l[(p, i)] * b[p];
            }
            b[i] = sum / self.l[(i, i)];
        }
    }

    /// Solves `L * L^T * x = b`, returning a fresh vector.
    pub fn solve(&self, b: ColRef<'_, E>) -> Col<E> {
        let mut x = b.to_owned();
        self.solve_in_place(&mut x);
        x
    }
}

/// `y = A * x`.
pub(crate) fn gemv(a: MatRef<'_, E>, x: ColRef<'_, E>) -> Col<E> {
    a * x
}

/// `y += alpha * x`, in place.
pub(crate) fn axpy(alpha: E, x: ColRef<'_, E>, y: &mut Col<E>) {
    zip!(y.as_mut(), x).for_each(|unzip!(y, x)| *y += alpha * *x);
}
