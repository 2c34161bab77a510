// =============================================================================
// Error Types
// =============================================================================
//
// Every failure in this crate is terminal for the current fit. There is no
// local recovery: the caller gets one of these variants instead of a state
// or a result tuple, and decides what to do with the run.
//
// The variants fall into three families:
//   - bad input:            NonFiniteInput, DimensionMismatch, EmptyInput,
//                           InvalidValue, InvalidLayout
//   - driver bugs:          IncompatibleStates
//   - numerical trouble:    NumericalDegeneracy
//
// =============================================================================

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RustyLogitError>;

/// Errors raised by the aggregate operations and the fit engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RustyLogitError {
    /// A label, a feature vector or an accumulated matrix is not finite.
    ///
    /// Raised before any accumulation so that NaN/Inf never reaches the
    /// pseudo-inverse.
    #[error("non-finite input: {0}")]
    NonFiniteInput(String),

    /// Two partial states cannot be merged. This means the engine paired
    /// states that were never part of the same aggregation.
    #[error("internal error: incompatible transition states (width {left} vs {right})")]
    IncompatibleStates { left: usize, right: usize },

    /// Lengths that must agree do not.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The conjugate-gradient update has no defined step.
    #[error("numerical degeneracy: {0}")]
    NumericalDegeneracy(String),

    /// Nothing to work with (no rows, no columns).
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// A flat state buffer does not follow the state layout.
    #[error("invalid state layout: {0}")]
    InvalidLayout(String),

    /// A configuration value is out of range.
    #[error("invalid value: {0}")]
    InvalidValue(String),
}
