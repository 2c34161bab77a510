// =============================================================================
// Logistic Fitting (Python Bindings)
// =============================================================================
//
// fit_logistic_py runs the in-memory engine over a NumPy design matrix. The
// response arrives as floats (0/1, or any value where nonzero means true)
// because that is what most Python callers have at hand.
// =============================================================================

use pyo3::prelude::*;
use pyo3::exceptions::PyValueError;
use numpy::{PyReadonlyArray1, PyReadonlyArray2};
use ndarray::{Array1, Array2};

use rustylogit_core::{fit_logistic, FitConfig, Method};

use crate::results_py::PyLogisticResults;
use crate::to_py_err;

/// Fit a logistic regression.
///
/// # Arguments
/// * `y` - Response (n,); nonzero is the positive class
/// * `x` - Design matrix (n, p); add a column of ones for an intercept
/// * `method` - "irls" or "cg"
/// * `max_iter` - Maximum number of passes over the data
/// * `tol` - Stop when the log-likelihood changes by less than this
/// * `n_partitions` - Partitions accumulated in parallel (0 = one per thread)
/// * `verbose` - Log every iteration at info level
#[pyfunction]
#[pyo3(signature = (y, x, method="irls", max_iter=20, tol=1e-4, n_partitions=0, verbose=false))]
pub fn fit_logistic_py(
    y: PyReadonlyArray1<f64>,
    x: PyReadonlyArray2<f64>,
    method: &str,
    max_iter: usize,
    tol: f64,
    n_partitions: usize,
    verbose: bool,
) -> PyResult<PyLogisticResults> {
    let y_array: Array1<f64> = y.as_array().to_owned();
    let x_array: Array2<f64> = x.as_array().to_owned();

    if let Some(bad) = y_array.iter().find(|v| !v.is_finite()) {
        return Err(PyValueError::new_err(format!(
            "y must be finite, found {}",
            bad
        )));
    }
    let labels: Array1<bool> = y_array.mapv(|v| v != 0.0);

    let config = FitConfig {
        method: method.parse::<Method>().map_err(to_py_err)?,
        max_iterations: max_iter,
        tolerance: tol,
        n_partitions,
        verbose,
    };

    let result = fit_logistic(&x_array, &labels, &config)
        .map_err(|e| PyValueError::new_err(format!("logistic fitting failed: {}", e)))?;

    Ok(PyLogisticResults::from(result))
}
