// =============================================================================
// Logistic Regression Results
// =============================================================================
//
// This class holds the coefficient table of a logistic regression, either
// from `fit_logistic` or from `<method>_result` on a flat state. Fields that
// only the fit engine knows (convergence, likelihood trace, final state) are
// None for the latter.
// =============================================================================

use pyo3::prelude::*;
use numpy::{IntoPyArray, PyArray1};

use rustylogit_core::{FitResult, LogisticResult};

/// Results from fitting a logistic regression.
///
/// Contains coefficients, Wald tests and odds ratios.
#[pyclass(name = "LogisticResults")]
#[derive(Clone)]
pub struct PyLogisticResults {
    /// Coefficient table and diagnostics
    pub(crate) inner: LogisticResult,
    /// Solver name, when produced by the fit engine
    pub(crate) method: Option<String>,
    /// Did the log-likelihood settle within the tolerance?
    pub(crate) converged: Option<bool>,
    /// Log-likelihood after every iteration
    pub(crate) log_likelihood_history: Option<Vec<f64>>,
    /// Last finalized state in its flat layout
    pub(crate) state: Option<Vec<f64>>,
}

impl From<LogisticResult> for PyLogisticResults {
    fn from(inner: LogisticResult) -> Self {
        Self {
            inner,
            method: None,
            converged: None,
            log_likelihood_history: None,
            state: None,
        }
    }
}

impl From<FitResult> for PyLogisticResults {
    fn from(fit: FitResult) -> Self {
        Self {
            inner: fit.result,
            method: Some(fit.method.to_string()),
            converged: Some(fit.converged),
            log_likelihood_history: Some(fit.log_likelihood_history),
            state: Some(fit.state),
        }
    }
}

#[pymethods]
impl PyLogisticResults {
    /// Get the fitted coefficients.
    #[getter]
    fn params<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.inner.coefficients.clone().into_pyarray_bound(py)
    }

    /// Alias for params.
    #[getter]
    fn coefficients<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.inner.coefficients.clone().into_pyarray_bound(py)
    }

    /// Standard errors sqrt(diag((X'AX)⁺)).
    #[getter]
    fn bse<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.inner.std_errors.clone().into_pyarray_bound(py)
    }

    /// Wald z statistics.
    #[getter]
    fn tvalues<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.inner.z_stats.clone().into_pyarray_bound(py)
    }

    /// Two-sided p-values of the Wald statistics.
    #[getter]
    fn pvalues<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.inner.p_values.clone().into_pyarray_bound(py)
    }

    /// exp(coefficients).
    #[getter]
    fn odds_ratios<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.inner.odds_ratios.clone().into_pyarray_bound(py)
    }

    #[getter]
    fn llf(&self) -> f64 {
        self.inner.log_likelihood
    }

    /// Condition number of X'AX. Very large values point at collinear
    /// columns.
    #[getter]
    fn condition_number(&self) -> f64 {
        self.inner.condition_number
    }

    #[getter]
    fn nobs(&self) -> u64 {
        self.inner.num_rows_processed
    }

    /// Number of iterations, or None when the state does not track it.
    #[getter]
    fn iterations(&self) -> Option<u64> {
        self.inner.num_iterations
    }

    #[getter]
    fn method(&self) -> Option<String> {
        self.method.clone()
    }

    #[getter]
    fn converged(&self) -> Option<bool> {
        self.converged
    }

    #[getter]
    fn llf_history(&self) -> Option<Vec<f64>> {
        self.log_likelihood_history.clone()
    }

    /// Final state as a flat list, ready to be passed back into
    /// `<method>_transition` as `previous`.
    #[getter]
    fn state(&self) -> Option<Vec<f64>> {
        self.state.clone()
    }

    /// Coefficient table as text.
    fn summary(&self) -> String {
        self.inner.to_string()
    }

    fn __repr__(&self) -> String {
        format!(
            "LogisticResults(n_coef={}, nobs={}, llf={:.6})",
            self.inner.width(),
            self.inner.num_rows_processed,
            self.inner.log_likelihood
        )
    }
}
