// =============================================================================
// RustyLogit Core Library
// =============================================================================
//
// Logistic regression as a streaming aggregate. The data are never held as a
// design matrix: rows are fed one at a time into a transition state, partial
// states from different partitions are merged, and one finalize step per
// iteration moves the model forward.
//
// STRUCTURE:
// ----------
//   - state:       the Accumulator sum type, the SolverState trait and the
//                  aggregate operations (transition, merge, finalize,
//                  distance)
//   - solvers:     the conjugate-gradient and IRLS states, plus an in-memory
//                  fit engine that drives them
//   - inference:   standard errors, Wald tests, odds ratios (result)
//   - layout:      the flat f64 layout states use at the boundary
//   - convert:     ndarray ↔ nalgebra, pseudo-inverse, condition number
//   - error:       error type used throughout the library
//
// FOR MAINTAINERS:
// ----------------
// The flat layouts in `layout` are a wire format: anything that stores or
// ships states depends on the exact offsets. Change them only together with
// every consumer.
//
// =============================================================================

pub mod convert;
pub mod error;
pub mod inference;
pub mod layout;
pub mod solvers;
pub mod state;

// Re-export commonly used items at the top level for convenience
pub use error::{Result, RustyLogitError};
pub use inference::{pvalue_z, result, LogisticResult};
pub use solvers::{fit_logistic, fit_solver, CgState, FitConfig, FitResult, IrlsState, Method, SolverFit};
pub use state::{distance, Accumulator, SolverState};
