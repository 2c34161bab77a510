// =============================================================================
// Transition States and the Aggregate Operations
// =============================================================================
//
// Both solvers are written as a streaming aggregate with the same shape:
//
//     transition:  (accumulator, row)           -> accumulator
//     merge:       (accumulator, accumulator)   -> accumulator
//     finalize:    accumulator                  -> state for next iteration
//     distance:    (state, state)               -> f64
//     result:      state                        -> coefficients + inference
//
// The engine runs `transition` over each partition, reduces the partial
// accumulators with `merge` in whatever order it likes, and calls `finalize`
// once per iteration.
//
// THE EMPTY ACCUMULATOR
// ---------------------
// An accumulator does not know its width until it sees its first row. That
// is modelled as a sum type: `Accumulator::Empty` holds nothing and is the
// identity of `merge`; the first `transition` turns it into
// `Accumulator::Populated`. There is no sentinel row count to check.
//
// WHAT EACH SOLVER PROVIDES
// -------------------------
// `SolverState` is the seam between this generic plumbing and the
// solver-specific maths in `solvers::cg` and `solvers::irls`. It splits the
// fields into inter-iteration ones (the model, carried forward and only
// changed by `finalize`) and intra-iteration ones (sufficient statistics,
// reset at the start of every iteration and summed by `merge`).
//
// =============================================================================

use std::fmt::Debug;

use ndarray::{Array1, Array2, ArrayView1};

use crate::convert::is_finite_vector;
use crate::error::{Result, RustyLogitError};

/// Solver-specific transition state.
pub trait SolverState: Clone + Debug + PartialEq + Send + Sync + Sized {
    /// Short solver name used in log lines ("cg", "irls").
    const NAME: &'static str;

    /// Length of the flat buffer for a state of the given width.
    fn flat_len(width: usize) -> usize;

    /// A state of the given width with every field zero.
    fn zeroed(width: usize) -> Self;

    /// Number of coefficients.
    fn width(&self) -> usize;

    /// Current coefficient estimate.
    fn coef(&self) -> &Array1<f64>;

    /// Rows accumulated in the current iteration.
    fn row_count(&self) -> u64;

    /// Accumulated X'AX.
    fn info_matrix(&self) -> &Array2<f64>;

    /// Accumulated log-likelihood of the current coefficients.
    fn log_likelihood(&self) -> f64;

    /// Finalizations this state has been through, if the solver counts them.
    fn iterations(&self) -> Option<u64> {
        None
    }

    /// Zero the intra-iteration fields, keep the inter-iteration ones.
    fn reset(&mut self);

    /// Add one observation. `y` is ±1; `x` has already been validated.
    fn accumulate(&mut self, y: f64, x: ArrayView1<'_, f64>);

    /// Add the intra-iteration fields of `other` into `self`.
    fn merge_from(&mut self, other: &Self);

    /// Advance the model by one iteration.
    fn finalize(self) -> Result<Self>;

    /// Encode into the flat layout.
    fn to_flat(&self) -> Vec<f64>;

    /// Decode from the flat layout.
    fn from_flat(buf: &[f64]) -> Result<Self>;
}

/// Intra-iteration accumulator: empty until the first row arrives.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Accumulator<S> {
    /// No rows seen yet. Identity element of `merge`.
    #[default]
    Empty,
    /// At least one row accumulated.
    Populated(S),
}

impl<S: SolverState> Accumulator<S> {
    /// The identity accumulator.
    pub fn new() -> Self {
        Accumulator::Empty
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Accumulator::Empty)
    }

    /// Rows accumulated so far (0 for the empty accumulator).
    pub fn row_count(&self) -> u64 {
        match self {
            Accumulator::Empty => 0,
            Accumulator::Populated(s) => s.row_count(),
        }
    }

    pub fn state(&self) -> Option<&S> {
        match self {
            Accumulator::Empty => None,
            Accumulator::Populated(s) => Some(s),
        }
    }

    pub fn into_state(self) -> Option<S> {
        match self {
            Accumulator::Empty => None,
            Accumulator::Populated(s) => Some(s),
        }
    }

    /// Accumulate one observation.
    ///
    /// On the first row the width is taken from `x`. If `previous` (the
    /// finalized state of the last iteration) is given, its model fields are
    /// carried into the new accumulator; otherwise the model starts at zero.
    /// `previous` is ignored once the accumulator is populated.
    ///
    /// The row is validated before anything is accumulated. Use
    /// [`Accumulator::push`] to keep the accumulator when a row is rejected.
    ///
    /// # Errors
    /// * `NonFiniteInput` - `x` contains NaN or ±Inf
    /// * `EmptyInput` - `x` has no elements
    /// * `DimensionMismatch` - `x` does not match the accumulator's width or
    ///   the previous state's width
    pub fn transition(
        self,
        y: bool,
        x: ArrayView1<'_, f64>,
        previous: Option<&S>,
    ) -> Result<Self> {
        self.check_row(x, previous)?;
        Ok(self.accumulate_checked(y, x, previous))
    }

    /// In-place form of [`Accumulator::transition`].
    ///
    /// On error the accumulator is left exactly as it was.
    pub fn push(&mut self, y: bool, x: ArrayView1<'_, f64>, previous: Option<&S>) -> Result<()> {
        self.check_row(x, previous)?;
        let acc = std::mem::replace(self, Accumulator::Empty);
        *self = acc.accumulate_checked(y, x, previous);
        Ok(())
    }

    fn check_row(&self, x: ArrayView1<'_, f64>, previous: Option<&S>) -> Result<()> {
        if !is_finite_vector(x) {
            return Err(RustyLogitError::NonFiniteInput(
                "design matrix is not finite".to_string(),
            ));
        }
        if x.is_empty() {
            return Err(RustyLogitError::EmptyInput(
                "feature vector has no elements".to_string(),
            ));
        }

        match (self, previous) {
            (Accumulator::Populated(state), _) if state.width() != x.len() => {
                Err(RustyLogitError::DimensionMismatch(format!(
                    "row has {} features but the state has width {}",
                    x.len(),
                    state.width()
                )))
            }
            (Accumulator::Empty, Some(prev)) if prev.width() != x.len() => {
                Err(RustyLogitError::DimensionMismatch(format!(
                    "row has {} features but the previous state has width {}",
                    x.len(),
                    prev.width()
                )))
            }
            _ => Ok(()),
        }
    }

    /// `x` must have passed `check_row`.
    fn accumulate_checked(self, y: bool, x: ArrayView1<'_, f64>, previous: Option<&S>) -> Self {
        let mut state = match (self, previous) {
            (Accumulator::Populated(state), _) => state,
            (Accumulator::Empty, Some(prev)) => {
                let mut carried = prev.clone();
                carried.reset();
                carried
            }
            (Accumulator::Empty, None) => S::zeroed(x.len()),
        };

        let label = if y { 1.0 } else { -1.0 };
        state.accumulate(label, x);
        Accumulator::Populated(state)
    }

    /// Combine two partial accumulators of the same iteration.
    ///
    /// If either side is empty the other is returned untouched. Otherwise
    /// the intra-iteration fields are summed and the model fields of `self`
    /// are kept.
    ///
    /// # Errors
    /// * `IncompatibleStates` - the two widths differ
    pub fn merge(self, other: Self) -> Result<Self> {
        match (self, other) {
            (Accumulator::Empty, other) => Ok(other),
            (this, Accumulator::Empty) => Ok(this),
            (Accumulator::Populated(mut left), Accumulator::Populated(right)) => {
                if left.width() != right.width() {
                    return Err(RustyLogitError::IncompatibleStates {
                        left: left.width(),
                        right: right.width(),
                    });
                }
                left.merge_from(&right);
                Ok(Accumulator::Populated(left))
            }
        }
    }

    /// Produce the state for the next iteration from a fully merged
    /// accumulator.
    ///
    /// # Errors
    /// * `EmptyInput` - no rows were accumulated
    /// * whatever the solver's `finalize` raises
    pub fn finalize(self) -> Result<S> {
        match self {
            Accumulator::Empty => Err(RustyLogitError::EmptyInput(
                "no rows were accumulated in this iteration".to_string(),
            )),
            Accumulator::Populated(state) => state.finalize(),
        }
    }

    /// Encode into the flat layout. The empty accumulator encodes as the
    /// all-zero buffer of width 0.
    pub fn to_flat(&self) -> Vec<f64> {
        match self {
            Accumulator::Empty => vec![0.0; S::flat_len(0)],
            Accumulator::Populated(s) => s.to_flat(),
        }
    }

    /// Decode from the flat layout.
    ///
    /// An empty buffer, or any buffer whose row count is zero, decodes to
    /// `Accumulator::Empty`.
    pub fn from_flat(buf: &[f64]) -> Result<Self> {
        if buf.is_empty() {
            return Ok(Accumulator::Empty);
        }
        let state = S::from_flat(buf)?;
        if state.row_count() == 0 {
            Ok(Accumulator::Empty)
        } else {
            Ok(Accumulator::Populated(state))
        }
    }
}

/// Absolute difference of the log-likelihoods of two finalized states.
///
/// The caller compares this against its own tolerance; nothing here decides
/// convergence.
pub fn distance<S: SolverState>(left: &S, right: &S) -> f64 {
    (left.log_likelihood() - right.log_likelihood()).abs()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solvers::{CgState, IrlsState};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn feed<S: SolverState>(rows: &[(bool, [f64; 2])]) -> Accumulator<S> {
        rows.iter().fold(Accumulator::new(), |acc, (y, x)| {
            acc.transition(*y, ArrayView1::from(&x[..]), None).unwrap()
        })
    }

    #[test]
    fn test_empty_is_merge_identity() {
        let acc: Accumulator<IrlsState> = feed(&[(true, [1.0, 0.5]), (false, [1.0, -2.0])]);
        assert_eq!(acc.clone().merge(Accumulator::Empty).unwrap(), acc);
        assert_eq!(Accumulator::Empty.merge(acc.clone()).unwrap(), acc);
        assert!(Accumulator::<CgState>::Empty
            .merge(Accumulator::Empty)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_first_row_fixes_width() {
        let acc: Accumulator<CgState> = feed(&[(true, [1.0, 2.0])]);
        let state = acc.state().unwrap();
        assert_eq!(state.width(), 2);
        assert_eq!(state.row_count(), 1);

        let err = acc.transition(false, array![1.0, 2.0, 3.0].view(), None);
        assert!(matches!(err, Err(RustyLogitError::DimensionMismatch(_))));
    }

    #[test]
    fn test_transition_rejects_bad_rows() {
        let acc: Accumulator<IrlsState> = feed(&[(true, [1.0, 2.0])]);
        let before = acc.clone();

        let err = acc
            .clone()
            .transition(true, array![1.0, f64::NAN].view(), None);
        assert!(matches!(err, Err(RustyLogitError::NonFiniteInput(_))));
        let err = acc
            .clone()
            .transition(true, array![f64::NEG_INFINITY, 0.0].view(), None);
        assert!(matches!(err, Err(RustyLogitError::NonFiniteInput(_))));
        assert_eq!(acc, before);

        let err = Accumulator::<IrlsState>::new().transition(true, ArrayView1::<f64>::from(&[][..]), None);
        assert!(matches!(err, Err(RustyLogitError::EmptyInput(_))));
    }

    #[test]
    fn test_push_keeps_accumulator_on_rejected_row() {
        let mut acc: Accumulator<CgState> = feed(&[(true, [1.0, 2.0]), (false, [0.5, -1.0])]);
        let snapshot = acc.to_flat();

        let bad = [
            array![1.0, f64::NAN],
            array![f64::INFINITY, 0.0],
            array![1.0, 2.0, 3.0],
        ];
        for x in &bad {
            assert!(acc.push(true, x.view(), None).is_err());
            assert_eq!(acc.to_flat(), snapshot);
        }

        acc.push(true, array![2.0, 0.0].view(), None).unwrap();
        assert_eq!(acc.row_count(), 3);
    }

    #[test]
    fn test_push_matches_transition() {
        let rows = [(true, [1.0, 0.5]), (false, [1.0, -2.0])];
        let mut pushed = Accumulator::<IrlsState>::new();
        for (y, x) in &rows {
            pushed.push(*y, ArrayView1::from(&x[..]), None).unwrap();
        }
        assert_eq!(pushed, feed::<IrlsState>(&rows));

        let mut empty = Accumulator::<IrlsState>::new();
        let previous = IrlsState::zeroed(3);
        assert!(matches!(
            empty.push(true, array![1.0, 2.0].view(), Some(&previous)),
            Err(RustyLogitError::DimensionMismatch(_))
        ));
        assert!(empty.is_empty());
    }

    #[test]
    fn test_merge_rejects_different_widths() {
        let left: Accumulator<CgState> = feed(&[(true, [1.0, 2.0])]);
        let right = Accumulator::<CgState>::new()
            .transition(false, array![1.0].view(), None)
            .unwrap();
        assert_eq!(
            left.merge(right),
            Err(RustyLogitError::IncompatibleStates { left: 2, right: 1 })
        );
    }

    #[test]
    fn test_merge_sums_statistics() {
        let rows = [(true, [1.0, 0.5]), (false, [1.0, -2.0]), (true, [1.0, 3.0])];
        let all: Accumulator<IrlsState> = feed(&rows);
        let merged = feed::<IrlsState>(&rows[..1])
            .merge(feed(&rows[1..]))
            .unwrap();

        let (a, b) = (all.state().unwrap(), merged.state().unwrap());
        assert_eq!(b.row_count, 3);
        assert_abs_diff_eq!(a.log_likelihood, b.log_likelihood, epsilon = 1e-12);
        for (u, v) in a.info_matrix.iter().zip(b.info_matrix.iter()) {
            assert_abs_diff_eq!(*u, *v, epsilon = 1e-12);
        }
        for (u, v) in a.rhs_accum.iter().zip(b.rhs_accum.iter()) {
            assert_abs_diff_eq!(*u, *v, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_previous_state_is_carried_forward() {
        let mut previous = CgState::zeroed(2);
        previous.iteration = 3;
        previous.coef = array![0.5, -1.0];
        previous.dir = array![1.0, 1.0];
        previous.beta = 0.25;
        previous.row_count = 40;
        previous.log_likelihood = -12.0;

        let acc = Accumulator::new()
            .transition(true, array![1.0, 0.0].view(), Some(&previous))
            .unwrap();
        let s = acc.state().unwrap();
        assert_eq!(s.iteration, 3);
        assert_eq!(s.coef, previous.coef);
        assert_eq!(s.dir, previous.dir);
        assert_eq!(s.beta, 0.25);
        assert_eq!(s.row_count, 1);
        // Only the new row contributes: -ln(1 + e^{-0.5})
        assert_abs_diff_eq!(s.log_likelihood, -(1.0 + (-0.5_f64).exp()).ln(), epsilon = 1e-12);

        let err = Accumulator::new().transition(true, array![1.0].view(), Some(&previous));
        assert!(matches!(err, Err(RustyLogitError::DimensionMismatch(_))));
    }

    #[test]
    fn test_finalize_empty_is_an_error() {
        assert!(matches!(
            Accumulator::<IrlsState>::new().finalize(),
            Err(RustyLogitError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_flat_empty_accumulator() {
        let empty = Accumulator::<CgState>::new();
        let flat = empty.to_flat();
        assert_eq!(flat.len(), CgState::flat_len(0));
        assert!(Accumulator::<CgState>::from_flat(&flat).unwrap().is_empty());
        assert!(Accumulator::<IrlsState>::from_flat(&[]).unwrap().is_empty());

        // A width-2 state whose row count is still zero is also empty
        let zero = IrlsState::zeroed(2).to_flat();
        assert!(Accumulator::<IrlsState>::from_flat(&zero).unwrap().is_empty());
    }

    #[test]
    fn test_flat_populated_accumulator() {
        let acc: Accumulator<CgState> = feed(&[(true, [1.0, 0.5]), (false, [1.0, -2.0])]);
        let decoded = Accumulator::<CgState>::from_flat(&acc.to_flat()).unwrap();
        assert_eq!(decoded, acc);
        assert_eq!(decoded.row_count(), 2);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let mut a = IrlsState::zeroed(1);
        let mut b = IrlsState::zeroed(1);
        a.log_likelihood = -3.5;
        b.log_likelihood = -1.25;
        assert_eq!(distance(&a, &b), 2.25);
        assert_eq!(distance(&b, &a), 2.25);
        assert_eq!(distance(&a, &a), 0.0);
    }
}
