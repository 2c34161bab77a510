// =============================================================================
// Conjugate Gradient
// =============================================================================
//
// THE ITERATION
// -------------
// Each iteration sees the data once (through `accumulate`) and produces the
// new gradient g_k = Σ σ(-y_i x_i'c) y_i x_i together with X'A_kX, where
// A_k = diag(a_1, ..., a_n) and a_i = σ(x_i'c) σ(-x_i'c). `finalize` then:
//
//   k = 0:    d_0 = g_0                           (steepest ascent)
//
//   k ≥ 1:              g_k'(g_k - g_{k-1})
//             beta_k = ---------------------      (Hestenes–Stiefel)
//                      d_{k-1}'(g_k - g_{k-1})
//
//             d_k = g_k - beta_k d_{k-1}
//
//   step:                g_k'd_k
//             alpha_k = -----------,   c_k = c_{k-1} + alpha_k d_k
//                       d_k'X'AX d_k
//
// The step is the exact maximizer along d_k of the quadratic model of l(c)
// whose (negative) Hessian is X'AX.
//
// A zero gradient leaves the model where it is (c is already a stationary
// point), and the following iteration starts again from steepest ascent.
//
// POWELL RESTART
// --------------
// The direction is reset to the gradient (beta = 0) when the Polak–Ribière
// coefficient g_k'(g_k - g_{k-1}) / g_{k-1}'g_{k-1} is negative. Note that
// this tests the Polak–Ribière value even though the Hestenes–Stiefel value
// is the one used otherwise.
//
// =============================================================================

use ndarray::{Array1, Array2, ArrayView1};

use crate::convert::{ensure_finite_matrix, is_finite_vector};
use crate::error::{Result, RustyLogitError};
use crate::layout::{expect_len, FlatReader, FlatWriter};
use crate::solvers::{add_weighted_outer, row_terms};
use crate::state::SolverState;

/// Transition state of the conjugate-gradient solver.
#[derive(Debug, Clone, PartialEq)]
pub struct CgState {
    // Inter-iteration (changed by `finalize` only)
    /// Completed finalizations
    pub iteration: u64,
    /// Coefficients c
    pub coef: Array1<f64>,
    /// Search direction d
    pub dir: Array1<f64>,
    /// Gradient of the previous iteration
    pub grad: Array1<f64>,
    /// Last Hestenes–Stiefel coefficient (0 after a restart)
    pub beta: f64,

    // Intra-iteration (reset every iteration, summed by merge)
    /// Rows accumulated this iteration
    pub row_count: u64,
    /// Gradient at `coef`, being accumulated
    pub grad_accum: Array1<f64>,
    /// X'AX at `coef`
    pub info_matrix: Array2<f64>,
    /// l(coef)
    pub log_likelihood: f64,
}

impl SolverState for CgState {
    const NAME: &'static str = "cg";

    fn flat_len(width: usize) -> usize {
        5 + width * width + 4 * width
    }

    fn zeroed(width: usize) -> Self {
        Self {
            iteration: 0,
            coef: Array1::zeros(width),
            dir: Array1::zeros(width),
            grad: Array1::zeros(width),
            beta: 0.0,
            row_count: 0,
            grad_accum: Array1::zeros(width),
            info_matrix: Array2::zeros((width, width)),
            log_likelihood: 0.0,
        }
    }

    fn width(&self) -> usize {
        self.coef.len()
    }

    fn coef(&self) -> &Array1<f64> {
        &self.coef
    }

    fn row_count(&self) -> u64 {
        self.row_count
    }

    fn info_matrix(&self) -> &Array2<f64> {
        &self.info_matrix
    }

    fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    fn iterations(&self) -> Option<u64> {
        Some(self.iteration)
    }

    fn reset(&mut self) {
        self.row_count = 0;
        self.grad_accum.fill(0.0);
        self.info_matrix.fill(0.0);
        self.log_likelihood = 0.0;
    }

    fn accumulate(&mut self, y: f64, x: ArrayView1<'_, f64>) {
        let t = row_terms(&self.coef, y, x);
        self.row_count += 1;
        self.grad_accum.scaled_add(t.score, &x);
        add_weighted_outer(&mut self.info_matrix, t.a, x);
        self.log_likelihood += t.log_likelihood;
    }

    fn merge_from(&mut self, other: &Self) {
        self.row_count += other.row_count;
        self.grad_accum += &other.grad_accum;
        self.info_matrix += &other.info_matrix;
        self.log_likelihood += other.log_likelihood;
    }

    fn finalize(mut self) -> Result<Self> {
        ensure_finite_matrix(&self.info_matrix, "information matrix")?;
        if !is_finite_vector(self.grad_accum.view()) {
            return Err(RustyLogitError::NonFiniteInput(
                "accumulated gradient is not finite".to_string(),
            ));
        }

        if self.grad_accum.iter().all(|&g| g == 0.0) {
            // `coef` is a stationary point of l; there is nothing to step along
            log::debug!(
                "cg iteration {}: zero gradient, coefficients unchanged",
                self.iteration
            );
            self.grad = self.grad_accum.clone();
            self.dir.fill(0.0);
            self.beta = 0.0;
            self.iteration += 1;
            return Ok(self);
        }

        if self.iteration == 0 || self.dir.iter().all(|&d| d == 0.0) {
            self.beta = 0.0;
            self.dir = self.grad_accum.clone();
            self.grad = self.grad_accum.clone();
        } else {
            let grad_change = &self.grad_accum - &self.grad;
            let numerator = self.grad_accum.dot(&grad_change);
            let mut beta = numerator / self.dir.dot(&grad_change);

            if numerator / self.grad.dot(&self.grad) < 0.0 {
                log::debug!("cg iteration {}: Powell restart", self.iteration);
                beta = 0.0;
            }
            if !beta.is_finite() {
                return Err(RustyLogitError::NumericalDegeneracy(format!(
                    "Hestenes-Stiefel coefficient is not finite at iteration {}",
                    self.iteration
                )));
            }

            self.beta = beta;
            self.dir = &self.grad_accum - &(&self.dir * beta);
            self.grad = self.grad_accum.clone();
        }

        let curvature = self.dir.dot(&self.info_matrix.dot(&self.dir));
        if curvature == 0.0 || !curvature.is_finite() {
            log::warn!(
                "cg iteration {}: step denominator d'X'AXd = {}",
                self.iteration,
                curvature
            );
            return Err(RustyLogitError::NumericalDegeneracy(format!(
                "step size denominator d'X'AXd is {} at iteration {}",
                curvature, self.iteration
            )));
        }

        let alpha = self.grad.dot(&self.dir) / curvature;
        self.coef.scaled_add(alpha, &self.dir);
        self.iteration += 1;
        Ok(self)
    }

    fn to_flat(&self) -> Vec<f64> {
        let mut w = FlatWriter::with_capacity(Self::flat_len(self.width()));
        w.scalar(self.iteration as f64)
            .scalar(self.width() as f64)
            .vector(&self.coef)
            .vector(&self.dir)
            .vector(&self.grad)
            .scalar(self.beta)
            .scalar(self.row_count as f64)
            .vector(&self.grad_accum)
            .matrix(&self.info_matrix)
            .scalar(self.log_likelihood);
        w.finish()
    }

    fn from_flat(buf: &[f64]) -> Result<Self> {
        let mut r = FlatReader::new(buf);
        let iteration = r.count("iteration")?;
        let width = r.width()?;
        expect_len(buf, Self::flat_len(width), width)?;

        let state = Self {
            iteration,
            coef: r.vector(width, "coef")?,
            dir: r.vector(width, "dir")?,
            grad: r.vector(width, "grad")?,
            beta: r.scalar("beta")?,
            row_count: r.count("rowCount")?,
            grad_accum: r.vector(width, "gradAccum")?,
            info_matrix: r.matrix(width, "infoMatrix")?,
            log_likelihood: r.scalar("logLikelihood")?,
        };
        r.finish()?;
        Ok(state)
    }
}

// =============================================================================
// Tests
// =============================================================================
