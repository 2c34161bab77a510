//! End-to-end tests of the in-memory fit engine.

use approx::assert_abs_diff_eq;
use ndarray::{Array1, Array2};
use rustylogit_core::{
    fit_logistic, fit_solver, CgState, FitConfig, IrlsState, Method, RustyLogitError, SolverState,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic two-covariate data with an intercept column.
///
/// The labels follow a fixed pseudo-random pattern so that neither class is
/// separable from the other.
fn synthetic_data(n: usize) -> (Array2<f64>, Array1<bool>) {
    let x = Array2::from_shape_fn((n, 3), |(i, j)| match j {
        0 => 1.0,
        1 => ((i * 7) % 11) as f64 / 5.0 - 1.0,
        _ => ((i * 5) % 13) as f64 / 6.0 - 1.0,
    });
    let y = Array1::from_shape_fn(n, |i| {
        let signal = 1.2 * x[[i, 1]] - 0.8 * x[[i, 2]] + 0.3;
        let noise = ((i * 37 + 11) % 17) as f64 / 8.5 - 1.0;
        signal + 1.5 * noise > 0.0
    });
    (x, y)
}

#[test]
fn partition_count_does_not_change_the_fit() {
    init_logging();
    let (x, y) = synthetic_data(60);
    let fits: Vec<_> = [1, 2, 7, 60]
        .iter()
        .map(|&n_partitions| {
            let config = FitConfig {
                tolerance: 1e-10,
                n_partitions,
                ..FitConfig::default()
            };
            fit_logistic(&x, &y, &config).unwrap()
        })
        .collect();

    let reference = &fits[0];
    assert!(reference.converged);
    for fit in &fits[1..] {
        assert_eq!(fit.iterations, reference.iterations);
        assert_eq!(fit.result.num_rows_processed, 60);
        for i in 0..3 {
            assert_abs_diff_eq!(
                fit.result.coefficients[i],
                reference.result.coefficients[i],
                epsilon = 1e-9
            );
        }
    }
}

#[test]
fn more_partitions_than_rows() {
    let (x, y) = synthetic_data(5);
    let config = FitConfig {
        n_partitions: 64,
        max_iterations: 3,
        ..FitConfig::default()
    };
    let fit = fit_solver::<IrlsState>(&x, &y, &config).unwrap();
    assert_eq!(fit.state.row_count, 5);
}

#[test]
fn both_solvers_find_the_same_maximum() {
    init_logging();
    let (x, y) = synthetic_data(60);
    let irls = fit_logistic(
        &x,
        &y,
        &FitConfig {
            tolerance: 1e-10,
            ..FitConfig::default()
        },
    )
    .unwrap();
    let cg = fit_logistic(
        &x,
        &y,
        &FitConfig {
            method: Method::Cg,
            tolerance: 1e-10,
            max_iterations: 100,
            verbose: true,
            ..FitConfig::default()
        },
    )
    .unwrap();

    assert_eq!(cg.method, Method::Cg);
    assert_abs_diff_eq!(
        cg.result.log_likelihood,
        irls.result.log_likelihood,
        epsilon = 1e-6
    );
    for i in 0..3 {
        assert_abs_diff_eq!(
            cg.result.coefficients[i],
            irls.result.coefficients[i],
            epsilon = 1e-3
        );
    }
}

#[test]
fn log_likelihood_history_is_recorded() {
    let (x, y) = synthetic_data(40);
    let fit = fit_solver::<CgState>(
        &x,
        &y,
        &FitConfig {
            max_iterations: 4,
            tolerance: 0.0,
            ..FitConfig::default()
        },
    )
    .unwrap();
    assert_eq!(fit.iterations, 4);
    assert_eq!(fit.state.iteration, 4);
    assert_eq!(fit.log_likelihood_history.len(), 4);
    assert_eq!(
        fit.log_likelihood_history[3],
        fit.state.log_likelihood()
    );
    // The first pass is evaluated at c = 0
    assert_abs_diff_eq!(
        fit.log_likelihood_history[0],
        -40.0 * 2.0_f64.ln(),
        epsilon = 1e-10
    );
}

#[test]
fn fit_result_exposes_flat_state() {
    let (x, y) = synthetic_data(30);
    let fit = fit_logistic(&x, &y, &FitConfig::default()).unwrap();
    let state = IrlsState::from_flat(&fit.state).unwrap();
    assert_eq!(state.coef, fit.result.coefficients);
    assert_eq!(state.row_count, 30);
    assert!(fit.result.to_string().contains("x[2]"));
}

#[test]
fn empty_input_is_rejected() {
    let x = Array2::<f64>::zeros((0, 2));
    let y = Array1::<bool>::from(vec![]);
    assert!(matches!(
        fit_logistic(&x, &y, &FitConfig::default()),
        Err(RustyLogitError::EmptyInput(_))
    ));

    let x = Array2::<f64>::zeros((3, 0));
    let y = Array1::from(vec![true, false, true]);
    assert!(matches!(
        fit_logistic(&x, &y, &FitConfig::default()),
        Err(RustyLogitError::EmptyInput(_))
    ));
}
