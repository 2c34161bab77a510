// =============================================================================
// IRLS: Iteratively Reweighted Least Squares
// =============================================================================
//
// THE BIG PICTURE
// ---------------
// Newton's method for the logistic log-likelihood can be rewritten as a
// weighted least-squares problem. At the current coefficients c each row
// gets
//
//     a_i = σ(x_i'c) σ(-x_i'c)                          weight
//
//                    σ(-y_i x_i'c) y_i
//     z_i = x_i'c + -------------------                 working response
//                           a_i
//
// and the next coefficients solve the weighted normal equations
//
//     (X'AX) c_new = X'Az
//
// Both sides are sums over rows, so a pass over the data only has to
// accumulate X'AX and X'Az; `finalize` then does the solve. Each row adds
// a_i z_i = a_i x_i'c + σ(-y_i x_i'c) y_i, which stays finite when a_i
// underflows far from the decision boundary.
//
// RANK DEFICIENCY
// ---------------
// X'AX is singular when columns of X are collinear. Instead of failing we
// use the Moore–Penrose pseudo-inverse, which picks the minimum-norm
// solution. The pseudo-inverse is computed by SVD, which must never see
// NaN/Inf; rows are checked in `transition` and the accumulated system is
// checked again here.
//
// There is no direction or gradient bookkeeping: each iteration is a full
// re-solve at the current coefficients, not an increment.
//
// =============================================================================

use ndarray::{Array1, Array2, ArrayView1};

use crate::convert::{ensure_finite_matrix, is_finite_vector, pinv};
use crate::error::{Result, RustyLogitError};
use crate::layout::{expect_len, FlatReader, FlatWriter};
use crate::solvers::{add_weighted_outer, row_terms};
use crate::state::SolverState;

/// Transition state of the IRLS solver.
#[derive(Debug, Clone, PartialEq)]
pub struct IrlsState {
    // Inter-iteration
    /// Coefficients c
    pub coef: Array1<f64>,

    // Intra-iteration
    /// Rows accumulated this iteration
    pub row_count: u64,
    /// X'Az
    pub rhs_accum: Array1<f64>,
    /// X'AX
    pub info_matrix: Array2<f64>,
    /// l(coef)
    pub log_likelihood: f64,
}

impl SolverState for IrlsState {
    const NAME: &'static str = "irls";

    fn flat_len(width: usize) -> usize {
        3 + width * width + 2 * width
    }

    fn zeroed(width: usize) -> Self {
        Self {
            coef: Array1::zeros(width),
            row_count: 0,
            rhs_accum: Array1::zeros(width),
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

    fn reset(&mut self) {
        self.row_count = 0;
        self.rhs_accum.fill(0.0);
        self.info_matrix.fill(0.0);
        self.log_likelihood = 0.0;
    }

    fn accumulate(&mut self, y: f64, x: ArrayView1<'_, f64>) {
        let t = row_terms(&self.coef, y, x);

        // a·z = a·xc + score, without dividing by a (0 for |xc| ≳ 745)
        self.row_count += 1;
        self.rhs_accum.scaled_add(t.a * t.xc + t.score, &x);
        add_weighted_outer(&mut self.info_matrix, t.a, x);
        self.log_likelihood += t.log_likelihood;
    }

    fn merge_from(&mut self, other: &Self) {
        self.row_count += other.row_count;
        self.rhs_accum += &other.rhs_accum;
        self.info_matrix += &other.info_matrix;
        self.log_likelihood += other.log_likelihood;
    }

    fn finalize(mut self) -> Result<Self> {
        ensure_finite_matrix(&self.info_matrix, "design matrix")?;
        if !is_finite_vector(self.rhs_accum.view()) {
            return Err(RustyLogitError::NonFiniteInput(
                "design matrix is not finite".to_string(),
            ));
        }

        self.coef = pinv(&self.info_matrix)?.dot(&self.rhs_accum);
        Ok(self)
    }

    fn to_flat(&self) -> Vec<f64> {
        let mut w = FlatWriter::with_capacity(Self::flat_len(self.width()));
        w.scalar(self.width() as f64)
            .vector(&self.coef)
            .scalar(self.row_count as f64)
            .vector(&self.rhs_accum)
            .matrix(&self.info_matrix)
            .scalar(self.log_likelihood);
        w.finish()
    }

    fn from_flat(buf: &[f64]) -> Result<Self> {
        let mut r = FlatReader::new(buf);
        let width = r.width()?;
        expect_len(buf, Self::flat_len(width), width)?;

        let state = Self {
            coef: r.vector(width, "coef")?,
            row_count: r.count("rowCount")?,
            rhs_accum: r.vector(width, "rhsAccum")?,
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
