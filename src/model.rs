//! The factorization result and its convergence diagnostics.

use faer::{Col, Mat};

use crate::E;

/// Convergence status of a completed or in-progress [`crate::als::nmf`] run.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Status {
    #[default]
    /// The driver is still iterating.
    InProgress,
    /// The tolerance threshold was reached before `maxit`.
    Converged,
    /// `maxit` was reached without the tolerance threshold firing.
    IterationLimit,
}

/// `A ~= w * diag(d) * h`, together with the tolerance trajectory that produced it.
#[derive(Debug, Clone)]
pub struct Model {
    /// Features x k.
    pub w: Mat<E>,
    /// Length k; per-factor scale absorbed out of `w` and `h`.
    pub d: Col<E>,
    /// k x samples.
    pub h: Mat<E>,
    /// One entry per completed ALS iteration.
    pub tol_history: Vec<E>,
    /// Count of completed ALS iterations.
    pub iter: usize,
}

impl Model {
    pub(crate) fn new(w: Mat<E>, d: Col<E>, h: Mat<E>) -> Self {
        Self {
            w,
            d,
            h,
            tol_history: Vec::new(),
            iter: 0,
        }
    }

    /// Factorization rank.
    pub fn rank(&self) -> usize {
        self.d.nrows()
    }

    /// The status implied by the tolerance trajectory and the configured stopping threshold and
    /// iteration limit. Does not recompute anything; it is a pure classification of fields
    /// already on `self`.
    pub fn status(&self, tol_threshold: E, maxit: usize) -> Status {
        if let Some(&last) = self.tol_history.last() {
            if last < tol_threshold {
                return Status::Converged;
            }
        }
        if self.iter >= maxit {
            Status::IterationLimit
        } else {
            Status::InProgress
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reports_converged_before_iteration_limit() {
        let mut model = Model::new(Mat::zeros(1, 1), Col::zeros(1), Mat::zeros(1, 1));
        model.tol_history = vec![1e-2, 1e-6];
        model.iter = 2;
        assert_eq!(model.status(1e-4, 100), Status::Converged);
    }

    #[test]
    fn status_reports_iteration_limit() {
        let mut model = Model::new(Mat::zeros(1, 1), Col::zeros(1), Mat::zeros(1, 1));
        model.tol_history = vec![1e-2, 5e-3];
        model.iter = 100;
        assert_eq!(model.status(1e-4, 100), Status::IterationLimit);
    }

    #[test]
    fn status_reports_in_progress() {
        let mut model = Model::new(Mat::zeros(1, 1), Col::zeros(1), Mat::zeros(1, 1));
        model.tol_history = vec![1e-2];
        model.iter = 1;
        assert_eq!(model.status(1e-4, 100), Status::InProgress);
    }
}
