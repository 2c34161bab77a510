// =============================================================================
// Flat-State Aggregate Functions (Python Bindings)
// =============================================================================
//
// The transition/merge/final/distance/result functions for each solver,
// taking and returning states as flat lists of floats. An engine that
// owns the data (a database aggregate, a distributed job) calls these to
// drive the solvers itself:
//
//     state = None
//     for y, x in partition:
//         state = cg_transition(state, y, x, previous)
//     merged = cg_merge(state_a, state_b)
//     previous = cg_final(merged)
//
// `None` and the empty list both stand for the empty accumulator.
// =============================================================================

use pyo3::prelude::*;
use ndarray::Array1;

use rustylogit_core::{result, Accumulator, CgState, IrlsState, SolverState};

use crate::results_py::PyLogisticResults;
use crate::to_py_err;

// =============================================================================
// Generic Helpers
// =============================================================================

fn decode_accumulator<S: SolverState>(state: Option<Vec<f64>>) -> PyResult<Accumulator<S>> {
    match state {
        Some(buf) => Accumulator::from_flat(&buf).map_err(to_py_err),
        None => Ok(Accumulator::new()),
    }
}

fn decode_state<S: SolverState>(state: &[f64]) -> PyResult<S> {
    S::from_flat(state).map_err(to_py_err)
}

fn transition<S: SolverState>(
    state: Option<Vec<f64>>,
    y: bool,
    x: Vec<f64>,
    previous: Option<Vec<f64>>,
) -> PyResult<Vec<f64>> {
    let acc = decode_accumulator::<S>(state)?;
    let previous = match previous {
        Some(buf) if !buf.is_empty() => Some(decode_state::<S>(&buf)?),
        _ => None,
    };
    let x = Array1::from(x);
    let acc = acc
        .transition(y, x.view(), previous.as_ref())
        .map_err(to_py_err)?;
    Ok(acc.to_flat())
}

fn merge<S: SolverState>(left: Option<Vec<f64>>, right: Option<Vec<f64>>) -> PyResult<Vec<f64>> {
    let left = decode_accumulator::<S>(left)?;
    let right = decode_accumulator::<S>(right)?;
    Ok(left.merge(right).map_err(to_py_err)?.to_flat())
}

fn finalize<S: SolverState>(state: Option<Vec<f64>>) -> PyResult<Vec<f64>> {
    let state = decode_accumulator::<S>(state)?
        .finalize()
        .map_err(to_py_err)?;
    Ok(state.to_flat())
}

fn distance<S: SolverState>(left: Vec<f64>, right: Vec<f64>) -> PyResult<f64> {
    let left = decode_state::<S>(&left)?;
    let right = decode_state::<S>(&right)?;
    Ok(rustylogit_core::distance(&left, &right))
}

fn summarize<S: SolverState>(state: Vec<f64>) -> PyResult<PyLogisticResults> {
    let state = decode_state::<S>(&state)?;
    let summary = result(&state).map_err(to_py_err)?;
    Ok(PyLogisticResults::from(summary))
}

// =============================================================================
// Conjugate Gradient
// =============================================================================

/// Add one observation to a CG accumulator.
///
/// # Arguments
/// * `state` - Accumulator so far (None or [] when empty)
/// * `y` - Label
/// * `x` - Feature vector; its length fixes the width on the first row
/// * `previous` - Finalized state of the previous iteration, if any
#[pyfunction]
#[pyo3(signature = (state, y, x, previous=None))]
pub fn cg_transition(
    state: Option<Vec<f64>>,
    y: bool,
    x: Vec<f64>,
    previous: Option<Vec<f64>>,
) -> PyResult<Vec<f64>> {
    transition::<CgState>(state, y, x, previous)
}

/// Combine two partial CG accumulators of the same iteration.
#[pyfunction]
#[pyo3(signature = (left, right))]
pub fn cg_merge(left: Option<Vec<f64>>, right: Option<Vec<f64>>) -> PyResult<Vec<f64>> {
    merge::<CgState>(left, right)
}

/// Run one CG step on a fully merged accumulator.
#[pyfunction]
#[pyo3(signature = (state))]
pub fn cg_final(state: Option<Vec<f64>>) -> PyResult<Vec<f64>> {
    finalize::<CgState>(state)
}

/// |Δ log-likelihood| between two finalized CG states.
#[pyfunction]
pub fn cg_distance(left: Vec<f64>, right: Vec<f64>) -> PyResult<f64> {
    distance::<CgState>(left, right)
}

/// Coefficient table of a finalized CG state.
#[pyfunction]
pub fn cg_result(state: Vec<f64>) -> PyResult<PyLogisticResults> {
    summarize::<CgState>(state)
}

// =============================================================================
// IRLS
// =============================================================================

/// Add one observation to an IRLS accumulator.
///
/// Same arguments as `cg_transition`.
#[pyfunction]
#[pyo3(signature = (state, y, x, previous=None))]
pub fn irls_transition(
    state: Option<Vec<f64>>,
    y: bool,
    x: Vec<f64>,
    previous: Option<Vec<f64>>,
) -> PyResult<Vec<f64>> {
    transition::<IrlsState>(state, y, x, previous)
}

#[pyfunction]
#[pyo3(signature = (left, right))]
pub fn irls_merge(left: Option<Vec<f64>>, right: Option<Vec<f64>>) -> PyResult<Vec<f64>> {
    merge::<IrlsState>(left, right)
}

/// Solve the weighted normal equations of a fully merged accumulator.
#[pyfunction]
#[pyo3(signature = (state))]
pub fn irls_final(state: Option<Vec<f64>>) -> PyResult<Vec<f64>> {
    finalize::<IrlsState>(state)
}

#[pyfunction]
pub fn irls_distance(left: Vec<f64>, right: Vec<f64>) -> PyResult<f64> {
    distance::<IrlsState>(left, right)
}

#[pyfunction]
pub fn irls_result(state: Vec<f64>) -> PyResult<PyLogisticResults> {
    summarize::<IrlsState>(state)
}
