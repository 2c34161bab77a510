// =============================================================================
// RustyLogit Python Bindings
// =============================================================================
//
// This module creates the bridge between Rust and Python using PyO3.
// It wraps the pure Rust code from `rustylogit-core` and exposes it as
// a Python module that can be imported with `import rustylogit`.
//
// STRUCTURE:
// ----------
// - fitting_py:    fit_logistic_py, the in-memory engine
// - aggregate_py:  <method>_transition / _merge / _final / _distance /
//                  _result on flat states, for callers with their own engine
// - results_py:    the LogisticResults class both of them return
//
// FOR MAINTAINERS:
// ----------------
// When adding new functionality:
// 1. Implement the logic in `rustylogit-core` first
// 2. Create a Python wrapper here that calls the Rust code
// 3. Add it to the module in the `_rustylogit` function at the bottom
//
// =============================================================================

use pyo3::prelude::*;
use pyo3::exceptions::PyValueError;

use rustylogit_core::RustyLogitError;

mod aggregate_py;
mod fitting_py;
mod results_py;

use aggregate_py::{
    cg_distance, cg_final, cg_merge, cg_result, cg_transition,
    irls_distance, irls_final, irls_merge, irls_result, irls_transition,
};
use fitting_py::fit_logistic_py;
use results_py::PyLogisticResults;

/// Every core error surfaces in Python as ValueError.
pub(crate) fn to_py_err(e: RustyLogitError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

#[pymodule]
fn _rustylogit(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Results
    m.add_class::<PyLogisticResults>()?;

    // In-memory fitting
    m.add_function(wrap_pyfunction!(fit_logistic_py, m)?)?;

    // Conjugate gradient on flat states
    m.add_function(wrap_pyfunction!(cg_transition, m)?)?;
    m.add_function(wrap_pyfunction!(cg_merge, m)?)?;
    m.add_function(wrap_pyfunction!(cg_final, m)?)?;
    m.add_function(wrap_pyfunction!(cg_distance, m)?)?;
    m.add_function(wrap_pyfunction!(cg_result, m)?)?;

    // IRLS on flat states
    m.add_function(wrap_pyfunction!(irls_transition, m)?)?;
    m.add_function(wrap_pyfunction!(irls_merge, m)?)?;
    m.add_function(wrap_pyfunction!(irls_final, m)?)?;
    m.add_function(wrap_pyfunction!(irls_distance, m)?)?;
    m.add_function(wrap_pyfunction!(irls_result, m)?)?;

    Ok(())
}
