//! Alternating-least-squares driver: repeatedly projects `h` from `w` and `w` from `h`, applying
//! diagonal scaling, a correlation-based stopping rule, and (optionally) zero-masking and L1
//! sparsity.

use std::time::{SystemTime, UNIX_EPOCH};

use faer::{Col, Mat};
use problemo::Problem;
use problemo::common::IntoCommonProblem;

use crate::E;
use crate::error::NmfError;
use crate::linalg::vector_ops::pearson_correlation;
use crate::model::Model;
use crate::project::{InputMatrix, ProjectOptions, project};

/// Configuration for [`nmf`].
#[derive(Debug, Clone, Copy)]
pub struct NmfOptions {
    tol: E,
    maxit: usize,
    verbose: bool,
    nonneg: bool,
    l1_w: E,
    l1_h: E,
    seed: Option<u64>,
    diag: bool,
    mask_zeros: bool,
    /// Explicit symmetry hint, avoiding the first-column equality probe: when `true`, the
    /// "update w from h" step is known to reduce to the h-update against `A^T = A` and skips
    /// transposition entirely.
    symmetric: bool,
    /// Strategy for the "update w from h" step when `symmetric` is `false`: `true` materializes
    /// `A^T` once (fully parallel inner loop); `false` accumulates in place (no extra memory).
    transpose: bool,
}

impl Default for NmfOptions {
    fn default() -> Self {
        Self {
            tol: 1e-4,
            maxit: 100,
            verbose: true,
            nonneg: true,
            l1_w: 0.0,
            l1_h: 0.0,
            seed: None,
            diag: true,
            mask_zeros: false,
            symmetric: false,
            transpose: false,
        }
    }
}

impl NmfOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tol(mut self, tol: E) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_maxit(mut self, maxit: usize) -> Self {
        self.maxit = maxit;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_nonneg(mut self, nonneg: bool) -> Self {
        self.nonneg = nonneg;
        self
    }

    pub fn with_l1(mut self, l1_w: E, l1_h: E) -> Self {
        self.l1_w = l1_w;
        self.l1_h = l1_h;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_diag(mut self, diag: bool) -> Self {
        self.diag = diag;
        self
    }

    pub fn with_mask_zeros(mut self, mask_zeros: bool) -> Self {
        self.mask_zeros = mask_zeros;
        self
    }

    pub fn with_symmetric(mut self, symmetric: bool) -> Self {
        self.symmetric = symmetric;
        self
    }

    pub fn with_transpose(mut self, transpose: bool) -> Self {
        self.transpose = transpose;
        self
    }

    pub fn build(self) -> Result<Self, Problem> {
        if !(0.0..1.0).contains(&self.l1_w) {
            return Err(NmfError::L1OutOfRange { value: self.l1_w }.into());
        }
        if !(0.0..1.0).contains(&self.l1_h) {
            return Err(NmfError::L1OutOfRange { value: self.l1_h }.into());
        }
        Ok(self)
    }
}

/// A small deterministic generator (splitmix64) used only for the pseudo-random initialization
/// of `w`; reproducibility requires that the same seed always yield the same stream.
struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// A uniform sample in `[0, 1)` built from the top 53 bits of a 64-bit draw.
    fn next_uniform(&mut self) -> E {
        (self.next_u64() >> 11) as E * (1.0 / (1u64 << 53) as E)
    }
}

fn default_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x2545_F491_4F6C_DD1D)
}

/// Factorizes `A` (`m x n`, non-negative) into `w * diag(d) * h` with `w` `m x k` and `h` `k x n`.
///
/// `w` is initialized from a deterministic pseudo-random generator seeded with `options`'s seed
/// (or, absent one, a process-entropy-derived seed), `d` is initialized to all ones, and `h` is
/// produced by the first projection step.
pub fn nmf(a: InputMatrix<'_>, k: usize, options: &NmfOptions) -> Result<Model, Problem> {
    if k == 0 {
        return Err(NmfError::InvalidRank { k }.into());
    }
    if options.mask_zeros && !matches!(a, InputMatrix::Sparse(_)) {
        return Err(NmfError::MaskZerosRequiresSparse.into());
    }

    let m = a.nrows();
    let n = a.ncols();

    let seed = options.seed.unwrap_or_else(default_seed);
    let mut rng = SplitMix64::new(seed);
    let mut w = Mat::<E>::from_fn(m, k, |_, _| 0.0);
    for j in 0..k {
        for i in 0..m {
            w[(i, j)] = rng.next_uniform();
        }
    }
    let mut d = Col::<E>::from_fn(k, |_| 1.0);
    let mut h = Mat::<E>::zeros(k, n);

    let h_options = ProjectOptions::new()
        .with_nonneg(options.nonneg)
        .with_l1(options.l1_h)
        .with_mask_zeros(options.mask_zeros)
        .build()?;
    let w_options = ProjectOptions::new()
        .with_nonneg(options.nonneg)
        .with_l1(options.l1_w)
        .with_transpose(options.transpose)
        .with_symmetric(options.symmetric)
        .build()?;

    let mut tol_history = Vec::with_capacity(options.maxit);
    let mut iter = 0usize;

    for _ in 0..options.maxit {
        // Step 1: update h from w.
        h = project(a, Some(w.as_ref()), None, &h_options)?;

        // Step 2: diagonal scaling of h's rows.
        if options.diag {
            for r in 0..k {
                let row_sum: E = (0..n).map(|j| h[(r, j)]).sum();
                if row_sum > 0.0 {
                    for j in 0..n {
                        h[(r, j)] /= row_sum;
                    }
                    d[r] *= row_sum;
                }
            }
        }

        let w_prev = w.clone();

        // Step 3: update w from h; project() skips transposition entirely when `symmetric` is set.
        w = project(a, None, Some(h.as_ref()), &w_options)?;

        // Step 4: diagonal scaling of w's columns.
        if options.diag {
            for c in 0..k {
                let col_sum: E = (0..m).map(|i| w[(i, c)]).sum();
                if col_sum > 0.0 {
                    for i in 0..m {
                        w[(i, c)] /= col_sum;
                    }
                    d[c] *= col_sum;
                }
            }
        }

        // Step 5: correlation-based tolerance, matching factors by position.
        let mut mean_corr = 0.0;
        for c in 0..k {
            let prev_col = Col::from_fn(m, |i| w_prev[(i, c)]);
            let curr_col = Col::from_fn(m, |i| w[(i, c)]);
            mean_corr += pearson_correlation(prev_col.as_ref(), curr_col.as_ref());
        }
        mean_corr /= k as E;
        let tol = 1.0 - mean_corr;

        iter += 1;
        tol_history.push(tol);

        if options.verbose {
            eprintln!("iter {iter}: tol = {tol}");
        }

        if tol < options.tol {
            break;
        }
    }

    let mut model = Model::new(w, d, h);
    model.tol_history = tol_history;
    model.iter = iter;
    Ok(model)
}
