// =============================================================================
// Logistic Regression Solvers
// =============================================================================
//
// Two ways of maximizing the logistic log-likelihood
//
//     l(c) = -Σ ln(1 + exp(-y_i · x_i'c)),     y_i ∈ {-1, +1}
//
// each written as a transition state (see `crate::state`):
//
//   - cg:    conjugate gradient with Hestenes–Stiefel updates, a Powell
//            restart, and an exact line search under the local quadratic
//            model given by X'AX
//   - irls:  iteratively reweighted least squares; every iteration solves
//            the weighted normal equations (X'AX) c = X'Az from scratch
//
// Both accumulate the same per-row quantities:
//
//     xc = x'c                          linear predictor
//     a  = σ(xc) σ(-xc)                 logistic weight (curvature)
//     X'AX += a · x x'                  information matrix
//     l    -= ln(1 + exp(-y · xc))      log-likelihood
//
// and they differ in the vector they accumulate next to X'AX (gradient vs.
// weighted working response) and in what `finalize` does with it.
//
// `fit` contains an in-memory engine that drives either solver over a
// design matrix.
//
// =============================================================================

mod cg;
mod fit;
mod irls;

pub use cg::CgState;
pub use fit::{fit_logistic, fit_solver, FitConfig, FitResult, Method, SolverFit};
pub use irls::IrlsState;

use ndarray::{Array1, Array2, ArrayView1};

/// Logistic function σ(t) = 1 / (1 + e^{-t}).
///
/// Note: σ(-t) = 1 - σ(t).
#[inline]
pub fn sigma(t: f64) -> f64 {
    1.0 / (1.0 + (-t).exp())
}

/// ln(1 + e^t), evaluated without overflowing for large t.
#[inline]
pub fn log1p_exp(t: f64) -> f64 {
    if t > 0.0 {
        t + (-t).exp().ln_1p()
    } else {
        t.exp().ln_1p()
    }
}

/// Per-row quantities shared by both solvers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RowTerms {
    /// Linear predictor x'c
    pub xc: f64,
    /// Logistic weight σ(xc) σ(-xc)
    pub a: f64,
    /// σ(-y · xc) · y, the row's contribution to the score per unit of x
    pub score: f64,
    /// -ln(1 + exp(-y · xc))
    pub log_likelihood: f64,
}

#[inline]
pub(crate) fn row_terms(coef: &Array1<f64>, y: f64, x: ArrayView1<'_, f64>) -> RowTerms {
    let xc = x.dot(coef);
    RowTerms {
        xc,
        a: sigma(xc) * sigma(-xc),
        score: sigma(-y * xc) * y,
        log_likelihood: -log1p_exp(-y * xc),
    }
}

/// m += a · x x'
#[inline]
pub(crate) fn add_weighted_outer(m: &mut Array2<f64>, a: f64, x: ArrayView1<'_, f64>) {
    for (i, &xi) in x.iter().enumerate() {
        let axi = a * xi;
        for (j, &xj) in x.iter().enumerate() {
            m[[i, j]] += axi * xj;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_sigma_symmetry() {
        for &t in &[-5.0, -0.3, 0.0, 1.7, 12.0] {
            assert_abs_diff_eq!(sigma(t) + sigma(-t), 1.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(sigma(0.0), 0.5, epsilon = 1e-15);
    }

    #[test]
    fn test_log1p_exp_matches_naive_and_survives_overflow() {
        for &t in &[-20.0, -1.0, 0.0, 0.5, 30.0] {
            let naive = (1.0 + f64::exp(t)).ln();
            assert_abs_diff_eq!(log1p_exp(t), naive, epsilon = 1e-12);
        }
        // exp(1000) overflows; ln(1 + e^1000) is 1000 to machine precision
        assert_abs_diff_eq!(log1p_exp(1000.0), 1000.0, epsilon = 1e-9);
        assert!(log1p_exp(-1000.0) >= 0.0);
    }

    #[test]
    fn test_row_terms_at_zero_coefficients() {
        let coef = Array1::zeros(2);
        let x = array![1.0, -2.0];
        let t = row_terms(&coef, -1.0, x.view());
        assert_abs_diff_eq!(t.xc, 0.0);
        assert_abs_diff_eq!(t.a, 0.25, epsilon = 1e-15);
        assert_abs_diff_eq!(t.score, -0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(t.log_likelihood, -(2.0_f64).ln(), epsilon = 1e-15);
    }

    #[test]
    fn test_add_weighted_outer_is_symmetric() {
        let mut m = Array2::zeros((3, 3));
        add_weighted_outer(&mut m, 0.5, array![1.0, 2.0, -1.0].view());
        add_weighted_outer(&mut m, 2.0, array![0.0, 1.0, 3.0].view());
        assert_abs_diff_eq!(m[[1, 2]], m[[2, 1]]);
        assert_abs_diff_eq!(m[[0, 0]], 0.5);
        assert_abs_diff_eq!(m[[2, 2]], 0.5 + 18.0);
        assert_abs_diff_eq!(m[[1, 2]], -1.0 + 6.0);
    }
}
