//! Multivariate-normal EM imputation of a numeric block.
//!
//! Missing cells are `NaN`. Each iteration computes, per row, the
//! conditional mean of the missing part given the observed part, then
//! re-estimates the mean and covariance from the completed sufficient
//! statistics. Rows sharing a missingness pattern share one factorisation.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use ndarray::{Array1, Array2, Axis};
use serde::Serialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use thiserror::Error;
use tracing::debug;

const LN_2PI: f64 = 1.837_877_066_409_345_3;

/// Ridge multipliers tried, relative to the mean diagonal, before a
/// covariance block is declared singular.
const RIDGE_STEPS: [f64; 9] = [0.0, 1e-10, 1e-9, 1e-8, 1e-7, 1e-6, 1e-5, 1e-4, 1e-3];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EmParams {
    pub max_iterations: usize,
    pub log_likelihood_threshold: f64,
}

impl Default for EmParams {
    fn default() -> Self {
        Self {
            max_iterations: usize::MAX,
            log_likelihood_threshold: 1e-4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmError {
    #[error("numeric block has no rows")]
    EmptyBlock,

    #[error("covariance matrix is singular")]
    SingularCovariance,

    #[error("log-likelihood is not finite at iteration {0}")]
    NonFiniteLikelihood(usize),
}

/// Fills the missing cells of a numeric block.
pub trait EmRoutine: Send + Sync {
    /// Returns `block` with `NaN` cells filled. Columns without any
    /// observed value are returned unchanged.
    fn impute(&self, block: &Array2<f64>, params: &EmParams) -> Result<Array2<f64>, EmError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianEm;

impl EmRoutine for GaussianEm {
    fn impute(&self, block: &Array2<f64>, params: &EmParams) -> Result<Array2<f64>, EmError> {
        if block.nrows() == 0 {
            return Err(EmError::EmptyBlock);
        }

        let modelled: Vec<usize> = block
            .axis_iter(Axis(1))
            .enumerate()
            .filter(|(_, column)| column.iter().any(|v| !v.is_nan()))
            .map(|(j, _)| j)
            .collect();
        let data = block.select(Axis(1), &modelled);
        if !data.iter().any(|v| v.is_nan()) {
            return Ok(block.clone());
        }

        let n = data.nrows() as f64;
        let mut mean = observed_means(&data);
        let mut completed = data.clone();
        for mut row in completed.axis_iter_mut(Axis(0)) {
            for (cell, m) in row.iter_mut().zip(mean.iter()) {
                if cell.is_nan() {
                    *cell = *m;
                }
            }
        }
        let mut cov = covariance(&completed, &mean);

        let mut previous: Option<f64> = None;
        let mut iteration = 0usize;
        while iteration < params.max_iterations {
            iteration += 1;
            let step = e_step(&data, &mean, &cov, &mut completed)?;
            if !step.log_likelihood.is_finite() {
                return Err(EmError::NonFiniteLikelihood(iteration));
            }
            let converged = previous
                .is_some_and(|p| (step.log_likelihood - p).abs() < params.log_likelihood_threshold);
            previous = Some(step.log_likelihood);
            if converged {
                break;
            }

            mean = &step.sum_x / n;
            cov = &step.sum_xx / n - outer(&mean, &mean);
        }
        debug!(
            "EM stopped after {} iterations on {}x{} block (log-likelihood {:?})",
            iteration,
            data.nrows(),
            data.ncols(),
            previous
        );

        let mut result = block.clone();
        for (j, &column) in modelled.iter().enumerate() {
            result.column_mut(column).assign(&completed.column(j));
        }
        Ok(result)
    }
}

struct StepStats {
    log_likelihood: f64,
    sum_x: Array1<f64>,
    sum_xx: Array2<f64>,
}

/// Conditional model for one missingness pattern.
struct PatternModel {
    observed: Vec<usize>,
    missing: Vec<usize>,
    chol: Option<Cholesky<f64, Dyn>>,
    log_det: f64,
    /// Σmo Σoo⁻¹
    regression: Array2<f64>,
    conditional_cov: Array2<f64>,
}

impl PatternModel {
    fn new(mask: &[bool], cov: &Array2<f64>) -> Result<Self, EmError> {
        let (missing, observed): (Vec<usize>, Vec<usize>) =
            (0..mask.len()).partition(|&j| mask[j]);
        let sigma_mm = submatrix(cov, &missing, &missing);

        if observed.is_empty() {
            return Ok(Self {
                regression: Array2::zeros((missing.len(), 0)),
                conditional_cov: sigma_mm,
                chol: None,
                log_det: 0.0,
                observed,
                missing,
            });
        }

        let sigma_oo = submatrix(cov, &observed, &observed);
        let sigma_om = submatrix(cov, &observed, &missing);
        let chol = regularized_cholesky(&sigma_oo)?;
        let log_det = 2.0 * chol.l_dirty().diagonal().iter().map(|d| d.ln()).sum::<f64>();
        let solved = from_matrix(&chol.solve(&to_matrix(&sigma_om)));
        let regression = solved.t().to_owned();
        let conditional_cov = sigma_mm - sigma_om.t().dot(&solved);

        Ok(Self {
            observed,
            missing,
            chol: Some(chol),
            log_det,
            regression,
            conditional_cov,
        })
    }
}

fn e_step(
    data: &Array2<f64>,
    mean: &Array1<f64>,
    cov: &Array2<f64>,
    completed: &mut Array2<f64>,
) -> Result<StepStats, EmError> {
    let p = data.ncols();
    let mut patterns: HashMap<Vec<bool>, PatternModel> = HashMap::new();
    let mut stats = StepStats {
        log_likelihood: 0.0,
        sum_x: Array1::zeros(p),
        sum_xx: Array2::zeros((p, p)),
    };

    for (i, row) in data.axis_iter(Axis(0)).enumerate() {
        let mask: Vec<bool> = row.iter().map(|v| v.is_nan()).collect();
        let model = match patterns.entry(mask) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let model = PatternModel::new(e.key(), cov)?;
                e.insert(model)
            }
        };

        let diff: Array1<f64> = model
            .observed
            .iter()
            .map(|&j| row[j] - mean[j])
            .collect();
        if let Some(chol) = &model.chol {
            let z = chol
                .l_dirty()
                .solve_lower_triangular(&DVector::from_iterator(diff.len(), diff.iter().copied()))
                .ok_or(EmError::SingularCovariance)?;
            stats.log_likelihood -=
                0.5 * (model.observed.len() as f64 * LN_2PI + model.log_det + z.norm_squared());
        }

        let mut x = row.to_owned();
        if !model.missing.is_empty() {
            let shift = model.regression.dot(&diff);
            for (k, &j) in model.missing.iter().enumerate() {
                x[j] = mean[j] + shift[k];
            }
        }
        completed.row_mut(i).assign(&x);

        stats.sum_x += &x;
        stats.sum_xx += &outer(&x, &x);
        for (a, &ja) in model.missing.iter().enumerate() {
            for (b, &jb) in model.missing.iter().enumerate() {
                stats.sum_xx[[ja, jb]] += model.conditional_cov[[a, b]];
            }
        }
    }
    Ok(stats)
}

fn observed_means(data: &Array2<f64>) -> Array1<f64> {
    data.axis_iter(Axis(1))
        .map(|column| {
            let (sum, count) = column
                .iter()
                .filter(|v| !v.is_nan())
                .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            if count == 0 { 0.0 } else { sum / count as f64 }
        })
        .collect()
}

/// Maximum-likelihood covariance (divides by n).
fn covariance(data: &Array2<f64>, mean: &Array1<f64>) -> Array2<f64> {
    let centered = data - &mean.view().insert_axis(Axis(0));
    centered.t().dot(&centered) / data.nrows() as f64
}

fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    a.view()
        .insert_axis(Axis(1))
        .dot(&b.view().insert_axis(Axis(0)))
}

fn submatrix(m: &Array2<f64>, rows: &[usize], cols: &[usize]) -> Array2<f64> {
    m.select(Axis(0), rows).select(Axis(1), cols)
}

fn to_matrix(a: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

fn from_matrix(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Factorises `a`, adding an escalating ridge to the diagonal while it is
/// not numerically positive definite.
fn regularized_cholesky(a: &Array2<f64>) -> Result<Cholesky<f64, Dyn>, EmError> {
    let n = a.nrows();
    let scale = match a.diag().sum() / n as f64 {
        s if s.is_finite() && s > 0.0 => s,
        _ => 1.0,
    };
    let base = to_matrix(a);
    RIDGE_STEPS
        .iter()
        .find_map(|&ridge| {
            let candidate = &base + DMatrix::<f64>::identity(n, n) * (ridge * scale);
            Cholesky::new(candidate)
        })
        .ok_or(EmError::SingularCovariance)
}
