// =============================================================================
// Statistical Inference
// =============================================================================
//
// Turns a finalized transition state into the usual coefficient table:
//
//   - standard errors from the pseudo-inverse of the information matrix
//   - Wald z statistics and their two-sided p-values
//   - odds ratios exp(c_i)
//
// Both solvers share this code; all it needs from a state is the
// coefficients, the log-likelihood and X'AX.
//
// Keep in mind that X'AX is accumulated at the coefficients the last
// iteration *started* from, so the standard errors belong to the previous
// coefficient estimate. Once the fit has converged the difference is
// negligible.
//
// =============================================================================

use std::fmt;

use ndarray::Array1;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::convert::{condition_number, pinv};
use crate::error::Result;
use crate::state::SolverState;

// =============================================================================
// P-Value Calculation
// =============================================================================

/// Calculate two-tailed p-value from a z-statistic.
///
/// Computed as 2 Φ(-|z|) rather than 2 (1 - Φ(|z|)) so that very small
/// p-values do not cancel to zero.
///
/// An infinite z (a zero standard error) gives p = 0; NaN gives NaN.
pub fn pvalue_z(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }

    let normal = match Normal::new(0.0, 1.0) {
        Ok(d) => d,
        Err(_) => return f64::NAN,
    };

    2.0 * normal.cdf(-z.abs())
}

/// Get significance stars for a p-value.
///
/// - "***" : p < 0.001
/// - "**"  : p < 0.01
/// - "*"   : p < 0.05
/// - "."   : p < 0.1
/// - ""    : p >= 0.1
pub fn significance_stars(pvalue: f64) -> &'static str {
    if pvalue < 0.001 {
        "***"
    } else if pvalue < 0.01 {
        "**"
    } else if pvalue < 0.05 {
        "*"
    } else if pvalue < 0.1 {
        "."
    } else {
        ""
    }
}

// =============================================================================
// Result Structure
// =============================================================================

/// Coefficients and diagnostics of a logistic regression fit.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticResult {
    /// Fitted coefficients
    pub coefficients: Array1<f64>,
    /// Log-likelihood of the last pass over the data
    pub log_likelihood: f64,
    /// sqrt(diag((X'AX)⁺))
    pub std_errors: Array1<f64>,
    /// Wald statistics coefficient / standard error
    pub z_stats: Array1<f64>,
    /// Two-sided p-values of the Wald statistics
    pub p_values: Array1<f64>,
    /// exp(coefficient)
    pub odds_ratios: Array1<f64>,
    /// Condition number of X'AX (+∞ when singular)
    pub condition_number: f64,
    /// Rows seen in the last pass over the data
    pub num_rows_processed: u64,
    /// Iterations performed, when known
    pub num_iterations: Option<u64>,
}

/// Compute coefficients and diagnostics for a finalized state.
///
/// # Errors
/// * `NonFiniteInput` - X'AX contains NaN or ±Inf
pub fn result<S: SolverState>(state: &S) -> Result<LogisticResult> {
    let info = state.info_matrix();
    let inverse = pinv(info)?;
    let coef = state.coef();

    let std_errors: Array1<f64> = (0..coef.len()).map(|i| inverse[[i, i]].sqrt()).collect();
    let z_stats: Array1<f64> = coef
        .iter()
        .zip(std_errors.iter())
        .map(|(&c, &se)| c / se)
        .collect();
    let p_values = z_stats.mapv(pvalue_z);
    let odds_ratios = coef.mapv(f64::exp);

    Ok(LogisticResult {
        coefficients: coef.clone(),
        log_likelihood: state.log_likelihood(),
        std_errors,
        z_stats,
        p_values,
        odds_ratios,
        condition_number: condition_number(info)?,
        num_rows_processed: state.row_count(),
        num_iterations: state.iterations(),
    })
}

impl LogisticResult {
    /// Number of coefficients.
    pub fn width(&self) -> usize {
        self.coefficients.len()
    }
}

// =============================================================================
// Summary Table
// =============================================================================

impl fmt::Display for LogisticResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Logistic regression")?;
        writeln!(f, "  rows processed:  {}", self.num_rows_processed)?;
        if let Some(n) = self.num_iterations {
            writeln!(f, "  iterations:      {}", n)?;
        }
        writeln!(f, "  log-likelihood:  {:.6}", self.log_likelihood)?;
        writeln!(f, "  condition no.:   {:.4e}", self.condition_number)?;
        writeln!(
            f,
            "{:>8} {:>12} {:>12} {:>9} {:>10} {:>12}",
            "", "coef", "std err", "z", "P>|z|", "odds ratio"
        )?;
        for i in 0..self.width() {
            writeln!(
                f,
                "{:>8} {:>12.6} {:>12.6} {:>9.3} {:>10.4} {:>12.6} {}",
                format!("x[{}]", i),
                self.coefficients[i],
                self.std_errors[i],
                self.z_stats[i],
                self.p_values[i],
                self.odds_ratios[i],
                significance_stars(self.p_values[i]),
            )?;
        }
        write!(f, "---\nSignif. codes: 0 '***' 0.001 '**' 0.01 '*' 0.05 '.' 0.1 ' ' 1")
    }
}

// =============================================================================
// Tests
// =============================================================================
