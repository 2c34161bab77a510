// =============================================================================
// ndarray ↔ nalgebra Conversion and Dense Linear Algebra
// =============================================================================
//
// States keep their vectors and matrices in ndarray (the natural fit for row
// views and element-wise merges). The few decompositions we need (SVD for
// the pseudo-inverse and the condition number) come from nalgebra, so this
// module owns the conversions in both directions.
//
// NON-FINITE INPUT:
// -----------------
// Iterative SVD routines are not guaranteed to terminate on NaN/Inf input.
// Everything that reaches `pinv` or `condition_number` goes through
// `ensure_finite_matrix` first.
//
// =============================================================================

use nalgebra::{DMatrix, DVector, SVD};
use ndarray::{Array1, Array2, ArrayView1};

use crate::error::{Result, RustyLogitError};

// =============================================================================
// ndarray → nalgebra
// =============================================================================

/// Convert an ndarray Array2 to a nalgebra DMatrix.
#[inline]
pub fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    let (nrows, ncols) = a.dim();
    DMatrix::from_fn(nrows, ncols, |i, j| a[[i, j]])
}

/// Convert an ndarray Array1 to a nalgebra DVector.
#[inline]
pub fn to_dvector(v: &Array1<f64>) -> DVector<f64> {
    DVector::from_iterator(v.len(), v.iter().copied())
}

// =============================================================================
// nalgebra → ndarray
// =============================================================================

/// Convert a nalgebra DMatrix to an ndarray Array2.
#[inline]
pub fn to_array2(m: &DMatrix<f64>) -> Array2<f64> {
    let (nrows, ncols) = m.shape();
    Array2::from_shape_fn((nrows, ncols), |(i, j)| m[(i, j)])
}

// =============================================================================
// Finiteness checks
// =============================================================================

/// True if every element of the vector is finite.
#[inline]
pub fn is_finite_vector(v: ArrayView1<'_, f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// True if every element of the matrix is finite.
#[inline]
pub fn is_finite_matrix(m: &Array2<f64>) -> bool {
    m.iter().all(|x| x.is_finite())
}

/// Reject a matrix containing NaN or ±Inf.
pub fn ensure_finite_matrix(m: &Array2<f64>, what: &str) -> Result<()> {
    if is_finite_matrix(m) {
        Ok(())
    } else {
        Err(RustyLogitError::NonFiniteInput(format!("{} is not finite", what)))
    }
}

// =============================================================================
// SVD-based operations
// =============================================================================

fn square_svd(a: &Array2<f64>) -> Result<SVD<f64, nalgebra::Dyn, nalgebra::Dyn>> {
    if a.nrows() != a.ncols() {
        return Err(RustyLogitError::DimensionMismatch(format!(
            "expected a square matrix, got {}x{}",
            a.nrows(),
            a.ncols()
        )));
    }
    ensure_finite_matrix(a, "information matrix")?;
    Ok(to_dmatrix(a).svd(true, true))
}

/// Cut-off below which singular values are treated as zero.
///
/// Same rule as LAPACK-based `pinv` implementations:
/// `max(rows, cols) · σ_max · ε`.
fn singular_value_tolerance(singular_values: &DVector<f64>, n: usize) -> f64 {
    let s_max = singular_values.iter().copied().fold(0.0_f64, f64::max);
    n as f64 * s_max * f64::EPSILON
}

/// Moore–Penrose pseudo-inverse of a square matrix.
///
/// Singular and rank-deficient input is fine: directions whose singular value
/// falls under the tolerance are dropped instead of inverted. The all-zero
/// matrix maps to the all-zero matrix.
///
/// # Errors
/// * `DimensionMismatch` - `a` is not square
/// * `NonFiniteInput` - `a` contains NaN or ±Inf
pub fn pinv(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    let svd = square_svd(a)?;
    let (Some(u), Some(v_t)) = (svd.u.as_ref(), svd.v_t.as_ref()) else {
        return Err(RustyLogitError::NumericalDegeneracy(
            "SVD did not return singular vectors".to_string(),
        ));
    };

    let s = &svd.singular_values;
    let tol = singular_value_tolerance(s, n);
    let mut s_inv = DMatrix::zeros(n, n);
    for i in 0..s.len() {
        if s[i] > tol {
            s_inv[(i, i)] = 1.0 / s[i];
        }
    }

    let a_pinv = v_t.transpose() * s_inv * u.transpose();
    Ok(to_array2(&a_pinv))
}

/// 2-norm condition number σ_max / σ_min of a square matrix.
///
/// Returns `+∞` for a singular matrix.
pub fn condition_number(a: &Array2<f64>) -> Result<f64> {
    let svd = square_svd(a)?;
    let s = &svd.singular_values;
    let s_max = s.iter().copied().fold(0.0_f64, f64::max);
    let s_min = s.iter().copied().fold(f64::INFINITY, f64::min);
    if s_min > 0.0 {
        Ok(s_max / s_min)
    } else {
        Ok(f64::INFINITY)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_roundtrip_matrix() {
        let a = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        assert_eq!(to_array2(&to_dmatrix(&a)), a);
    }

    #[test]
    fn test_pinv_matches_inverse_for_full_rank() {
        let a = array![[4.0, 1.0], [1.0, 3.0]];
        let inv = pinv(&a).unwrap();
        let product = a.dot(&inv);
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(product[[i, j]], expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_pinv_rank_deficient() {
        // Rank one: [1 1; 1 1] has pseudo-inverse [1 1; 1 1] / 4
        let a = array![[1.0, 1.0], [1.0, 1.0]];
        let p = pinv(&a).unwrap();
        for v in p.iter() {
            assert_abs_diff_eq!(*v, 0.25, epsilon = 1e-12);
        }
        // Moore–Penrose condition A A⁺ A = A
        let back = a.dot(&p).dot(&a);
        for (x, y) in back.iter().zip(a.iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_pinv_zero_matrix() {
        let a = Array2::<f64>::zeros((3, 3));
        let p = pinv(&a).unwrap();
        assert!(p.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_pinv_rejects_non_finite() {
        let a = array![[1.0, f64::NAN], [0.0, 1.0]];
        assert!(matches!(pinv(&a), Err(RustyLogitError::NonFiniteInput(_))));
    }

    #[test]
    fn test_condition_number() {
        let a = array![[4.0, 0.0], [0.0, 0.5]];
        assert_abs_diff_eq!(condition_number(&a).unwrap(), 8.0, epsilon = 1e-10);

        let singular = array![[1.0, 1.0], [1.0, 1.0]];
        let c = condition_number(&singular).unwrap();
        assert!(c > 1e12);
    }
}
