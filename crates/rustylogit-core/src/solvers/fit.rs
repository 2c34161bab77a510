// =============================================================================
// Fit Engine
// =============================================================================
//
// An in-memory driver for the transition states. It plays the part a
// database or a dataflow engine would normally play:
//
//     previous = none
//     repeat:
//         split the rows into partitions
//         accumulate every partition in parallel, starting from `previous`
//         merge the partial accumulators (any order, empty = identity)
//         state = finalize(merged)
//         stop if distance(previous, state) < tolerance
//         previous = state
//     until max_iterations
//
// The states never see more than one row at a time, so the engine is also a
// working example of how to drive them from somewhere else.
//
// =============================================================================

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use log::Level;
use ndarray::{Array1, Array2};
use rayon::prelude::*;

use crate::error::{Result, RustyLogitError};
use crate::inference::{result, LogisticResult};
use crate::solvers::{CgState, IrlsState};
use crate::state::{distance, Accumulator, SolverState};

// =============================================================================
// Configuration
// =============================================================================

/// Which solver to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// Iteratively reweighted least squares (Newton's method)
    #[default]
    Irls,
    /// Conjugate gradient
    Cg,
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Method::Irls => IrlsState::NAME,
            Method::Cg => CgState::NAME,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = RustyLogitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "irls" | "newton" => Ok(Method::Irls),
            "cg" | "conjugate-gradient" | "conjugate_gradient" => Ok(Method::Cg),
            other => Err(RustyLogitError::InvalidValue(format!(
                "unknown optimizer '{}'. Use 'irls' or 'cg'.",
                other
            ))),
        }
    }
}

/// Configuration options for the fit engine.
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// Solver to use.
    /// Default: IRLS
    pub method: Method,

    /// Maximum number of passes over the data.
    /// Default: 20
    pub max_iterations: usize,

    /// Stop once the log-likelihood changes by less than this between two
    /// consecutive iterations.
    /// Default: 1e-4
    pub tolerance: f64,

    /// Number of partitions accumulated in parallel. 0 means one per rayon
    /// worker thread.
    /// Default: 0
    pub n_partitions: usize,

    /// Log every iteration at info level instead of debug level.
    /// Default: false
    pub verbose: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            method: Method::Irls,
            max_iterations: 20,
            tolerance: 1e-4,
            n_partitions: 0,
            verbose: false,
        }
    }
}

impl FitConfig {
    fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(RustyLogitError::InvalidValue(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.tolerance >= 0.0) || self.tolerance.is_infinite() {
            return Err(RustyLogitError::InvalidValue(format!(
                "tolerance must be finite and non-negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    fn partitions(&self) -> usize {
        if self.n_partitions == 0 {
            rayon::current_num_threads()
        } else {
            self.n_partitions
        }
    }
}

// =============================================================================
// Result Structures
// =============================================================================

/// Outcome of driving one solver to convergence.
#[derive(Debug, Clone)]
pub struct SolverFit<S> {
    /// Last finalized state
    pub state: S,
    /// Number of iterations run
    pub iterations: usize,
    /// Did the log-likelihood settle within the tolerance?
    pub converged: bool,
    /// Log-likelihood of every finalized state, in order
    pub log_likelihood_history: Vec<f64>,
}

/// Results from `fit_logistic`.
#[derive(Debug, Clone)]
pub struct FitResult {
    /// Solver that produced the fit
    pub method: Method,
    /// Coefficients and diagnostics of the last state
    pub result: LogisticResult,
    /// Number of iterations run
    pub iterations: usize,
    /// Did the log-likelihood settle within the tolerance?
    pub converged: bool,
    /// Log-likelihood of every finalized state, in order
    pub log_likelihood_history: Vec<f64>,
    /// Last finalized state in its flat layout
    pub state: Vec<f64>,
}

// =============================================================================
// Main Fitting Functions
// =============================================================================

/// Fit a logistic regression of `y` on the columns of `x`.
///
/// The model has no implicit intercept; add a column of ones to `x` if you
/// want one.
///
/// # Arguments
/// * `x` - Design matrix (n × p)
/// * `y` - Binary response (n)
/// * `config` - Solver and stopping rule
///
/// # Returns
/// * `Ok(FitResult)` - Coefficients, diagnostics and iteration trace
/// * `Err(RustyLogitError)` - Invalid input, or a solver failure
pub fn fit_logistic(x: &Array2<f64>, y: &Array1<bool>, config: &FitConfig) -> Result<FitResult> {
    match config.method {
        Method::Irls => package(config.method, fit_solver::<IrlsState>(x, y, config)?),
        Method::Cg => package(config.method, fit_solver::<CgState>(x, y, config)?),
    }
}

fn package<S: SolverState>(method: Method, fit: SolverFit<S>) -> Result<FitResult> {
    let mut summary = result(&fit.state)?;
    summary.num_iterations = Some(fit.iterations as u64);
    Ok(FitResult {
        method,
        result: summary,
        iterations: fit.iterations,
        converged: fit.converged,
        log_likelihood_history: fit.log_likelihood_history,
        state: fit.state.to_flat(),
    })
}

/// Drive one solver over an in-memory data set.
///
/// `config.method` is ignored; the solver is chosen by `S`.
pub fn fit_solver<S: SolverState>(
    x: &Array2<f64>,
    y: &Array1<bool>,
    config: &FitConfig,
) -> Result<SolverFit<S>> {
    // -------------------------------------------------------------------------
    // Step 0: Validate inputs
    // -------------------------------------------------------------------------
    let n = y.len();
    let p = x.ncols();

    if x.nrows() != n {
        return Err(RustyLogitError::DimensionMismatch(format!(
            "X has {} rows but y has {} elements",
            x.nrows(),
            n
        )));
    }
    if n == 0 {
        return Err(RustyLogitError::EmptyInput("y is empty".to_string()));
    }
    if p == 0 {
        return Err(RustyLogitError::EmptyInput("X has no columns".to_string()));
    }
    config.validate()?;

    let ranges = partition_ranges(n, config.partitions());
    let level = if config.verbose { Level::Info } else { Level::Debug };
    log::debug!(
        "{}: {} rows, {} columns, {} partitions",
        S::NAME,
        n,
        p,
        ranges.len()
    );

    // -------------------------------------------------------------------------
    // Step 1: Iterate transition → merge → finalize
    // -------------------------------------------------------------------------
    let mut previous: Option<S> = None;
    let mut history = Vec::new();
    let mut converged = false;

    while history.len() < config.max_iterations {
        let carried = previous.as_ref();
        let merged = ranges
            .par_iter()
            .map(|range| accumulate_partition(x, y, range.clone(), carried))
            .try_reduce(Accumulator::new, |left, right| left.merge(right))?;

        let state = merged.finalize()?;
        history.push(state.log_likelihood());

        let change = previous.as_ref().map(|prev| distance(prev, &state));
        log::log!(
            level,
            "{} iteration {}: log-likelihood = {:.8}, change = {}",
            S::NAME,
            history.len(),
            state.log_likelihood(),
            change.map_or_else(|| "-".to_string(), |d| format!("{:.3e}", d))
        );

        previous = Some(state);
        if matches!(change, Some(d) if d < config.tolerance) {
            converged = true;
            break;
        }
    }

    let state = previous.ok_or_else(|| {
        RustyLogitError::EmptyInput("no iterations were run".to_string())
    })?;

    if !converged {
        log::warn!(
            "{} did not converge after {} iterations",
            S::NAME,
            history.len()
        );
    }

    Ok(SolverFit {
        state,
        iterations: history.len(),
        converged,
        log_likelihood_history: history,
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Run the transition over one contiguous block of rows.
fn accumulate_partition<S: SolverState>(
    x: &Array2<f64>,
    y: &Array1<bool>,
    rows: Range<usize>,
    previous: Option<&S>,
) -> Result<Accumulator<S>> {
    rows.into_iter().try_fold(Accumulator::new(), |acc, i| {
        acc.transition(y[i], x.row(i), previous)
    })
}

/// Split `0..n` into at most `k` contiguous, non-empty ranges whose sizes
/// differ by at most one.
pub(crate) fn partition_ranges(n: usize, k: usize) -> Vec<Range<usize>> {
    let k = k.clamp(1, n.max(1));
    let base = n / k;
    let extra = n % k;
    let mut ranges = Vec::with_capacity(k);
    let mut start = 0;
    for i in 0..k {
        let len = base + usize::from(i < extra);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

// =============================================================================
// Tests
// =============================================================================
