//! Mean squared reconstruction error against sparse or dense `A`, computed column-wise and
//! parallelized across columns.

use faer::{ColRef, Mat, MatRef};
use problemo::Problem;
use rayon::prelude::*;

use crate::E;
use crate::error::NmfError;
use crate::project::InputMatrix;
use crate::threads::with_pool;

/// `sum((A[:,j] - w * diag(d) * h[:,j])^2)` across all columns, divided by `m * n` (or, when
/// `mask_zeros` is set, by the total count of non-zero entries of `A` instead).
pub fn mse(
    a: InputMatrix<'_>,
    w: MatRef<'_, E>,
    d: ColRef<'_, E>,
    h: MatRef<'_, E>,
    mask_zeros: bool,
) -> Result<E, Problem> {
    if mask_zeros && !matches!(a, InputMatrix::Sparse(_)) {
        return Err(NmfError::MaskZerosRequiresSparse.into());
    }

    let m = a.nrows();
    let n = a.ncols();
    let k = w.ncols();

    // w scaled by d, shared across every column's reconstruction.
    let wd = Mat::from_fn(m, k, |i, c| w[(i, c)] * d[c]);

    let per_column: Vec<(E, usize)> = with_pool(|| {
        (0..n)
            .into_par_iter()
            .map(|j| column_error(a, wd.as_ref(), h, j, mask_zeros))
            .collect()
    });

    let (total_sq_err, total_count) = per_column
        .into_iter()
        .fold((0.0, 0usize), |(se, ce), (s, c)| (se + s, ce + c));

    let denom = if mask_zeros { total_count } else { m * n };
    if denom == 0 {
        return Ok(0.0);
    }
    Ok(total_sq_err / denom as E)
}

fn column_error(a: InputMatrix<'_>, wd: MatRef<'_, E>, h: MatRef<'_, E>, j: usize, mask_zeros: bool) -> (E, usize) {
    let hcol = h.col(j);
    let reconstruct = |i: usize| -> E {
        let mut acc = 0.0;
        for c in 0..wd.ncols() {
            acc += wd[(i, c)] * hcol[c];
        }
        acc
    };

    match a {
        InputMatrix::Dense(d) => {
            let mut sq = 0.0;
            let mut count = 0usize;
            for i in 0..d.nrows() {
                let aij = d[(i, j)];
                if mask_zeros && aij == 0.0 {
                    continue;
                }
                let diff = aij - reconstruct(i);
                sq += diff * diff;
                count += 1;
            }
            (sq, count)
        }
        InputMatrix::Sparse(s) => {
            if mask_zeros {
                let mut sq = 0.0;
                let mut count = 0usize;
                for (i, val) in s.col_iter(j) {
                    let diff = val - reconstruct(i);
                    sq += diff * diff;
                    count += 1;
                }
                (sq, count)
            } else {
                // Every row contributes: zero-valued rows reconstruct against 0.0 directly, and
                // non-zero rows are visited via the sparse column iterator.
                let mut seen = vec![false; s.nrows()];
                let mut sq = 0.0;
                for (i, val) in s.col_iter(j) {
                    let diff = val - reconstruct(i);
                    sq += diff * diff;
                    seen[i] = true;
                }
                for i in 0..s.nrows() {
                    if !seen[i] {
                        let diff = reconstruct(i);
                        sq += diff * diff;
                    }
                }
                (sq, s.nrows())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::Col;

    #[test]
    fn perfect_reconstruction_has_zero_error() {
        let w = Mat::from_fn(3, 1, |i, _| [1.0, 2.0, 3.0][i]);
        let d = Col::from_fn(1, |_| 1.0);
        let h = Mat::from_fn(1, 2, |_, j| [2.0, 0.5][j]);

        let a_data: Vec<Vec<E>> = (0..2)
            .map(|j| (0..3).map(|i| w[(i, 0)] * h[(0, j)]).collect())
            .collect();
        let a = Mat::from_fn(3, 2, |i, j| a_data[j][i]);

        let result = mse(InputMatrix::Dense(a.as_ref()), w.as_ref(), d.as_ref(), h.as_ref(), false).unwrap();
        assert!(result < 1e-20);
    }

    #[test]
    fn mask_zeros_requires_sparse() {
        let w = Mat::<E>::zeros(3, 1);
        let d = Col::<E>::zeros(1);
        let h = Mat::<E>::zeros(1, 2);
        let a = Mat::<E>::zeros(3, 2);
        let result = mse(InputMatrix::Dense(a.as_ref()), w.as_ref(), d.as_ref(), h.as_ref(), true);
        assert!(result.is_err());
    }

    mod masked_vs_unmasked {
        use super::*;
        use crate::sparse::SparseView;
        use rstest::rstest;
        use rstest_reuse::{apply, template};

        #[template]
        #[rstest]
        fn mse_case(#[values(false, true)] mask_zeros: bool) {}

        #[apply(mse_case)]
        fn mse_is_finite_and_nonneg_either_way(mask_zeros: bool) {
            let w = Mat::from_fn(3, 1, |i, _| [1.0, 2.0, 3.0][i]);
            let d = Col::from_fn(1, |_| 1.0);
            let h = Mat::from_fn(1, 2, |_, j| [0.9, 0.4][j]);
            // 3x2 sparse: col0 has an explicit zero at row 1 to exercise the masked path.
            let col_ptrs = vec![0, 2, 4];
            let row_indices = vec![0, 2, 0, 1];
            let values = vec![1.0, 2.5, 1.8, 0.8];
            let a = SparseView::new(3, 2, &col_ptrs, &row_indices, &values);

            let result = mse(InputMatrix::Sparse(a), w.as_ref(), d.as_ref(), h.as_ref(), mask_zeros).unwrap();
            assert!(result.is_finite());
            assert!(result >= 0.0);
        }
    }
}
