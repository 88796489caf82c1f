//! Log partition function of the Mallows model.
//!
//! `Z(α) = Σ_σ exp(−α d(σ, ρ) / n)` summed over all permutations `σ` of `n`
//! items. The value does not depend on `ρ`.

use nalgebra::{DMatrix, DVector};
use rv::misc::LogSumExp;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cardinality::CardinalityTable;
use crate::error::{Error, Result};
use crate::metric::Metric;
use crate::utils::ln_factorial;

/// Polynomial approximation `log Z(α) ≈ Σ_k c_k α^k`, fitted to importance
/// sampling estimates. Only trustworthy inside the fitted α range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartitionFunctionFit {
    n: usize,
    metric: Metric,
    coefficients: Vec<f64>,
}

impl PartitionFunctionFit {
    /// Wrap precomputed coefficients, lowest order first.
    pub fn new(n: usize, metric: Metric, coefficients: Vec<f64>) -> Result<Self> {
        if n < 1 {
            return Err(Error::invalid("number of items must be at least 1"));
        }
        if coefficients.is_empty() {
            return Err(Error::invalid("partition function fit has no coefficients"));
        }
        if let Some(c) = coefficients.iter().find(|c| !c.is_finite()) {
            return Err(Error::NumericalInstability(format!(
                "partition function fit has non-finite coefficient {c}"
            )));
        }
        Ok(Self {
            n,
            metric,
            coefficients,
        })
    }

    #[must_use]
    pub const fn n(&self) -> usize {
        self.n
    }

    #[must_use]
    pub const fn metric(&self) -> Metric {
        self.metric
    }

    #[must_use]
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    #[must_use]
    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Evaluate the polynomial at `alpha`.
    #[must_use]
    pub fn eval(&self, alpha: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc.mul_add(alpha, c))
    }
}

/// Least-squares polynomial fit of `log_z` against `alpha_grid`.
pub fn fit_partition_function(
    n: usize,
    metric: Metric,
    alpha_grid: &[f64],
    log_z: &[f64],
    degree: usize,
) -> Result<PartitionFunctionFit> {
    if alpha_grid.len() != log_z.len() {
        return Err(Error::invalid(format!(
            "alpha grid has {} values but {} estimates were given",
            alpha_grid.len(),
            log_z.len()
        )));
    }
    if alpha_grid.len() <= degree {
        return Err(Error::invalid(format!(
            "a degree {degree} fit needs more than {degree} grid points, got {}",
            alpha_grid.len()
        )));
    }
    if alpha_grid.iter().chain(log_z).any(|x| !x.is_finite()) {
        return Err(Error::NumericalInstability(
            "alpha grid or log partition estimates contain non-finite values".to_string(),
        ));
    }

    let n_coef = degree + 1;
    let mut design = DMatrix::from_fn(alpha_grid.len(), n_coef, |i, k| {
        alpha_grid[i].powi(i32::try_from(k).unwrap_or(i32::MAX))
    });
    // Scale columns to unit norm; raw powers of α span many orders of magnitude.
    let scales: Vec<f64> = design
        .column_iter()
        .map(|col| {
            let norm = col.norm();
            if norm > 0.0 { norm } else { 1.0 }
        })
        .collect();
    for (mut col, scale) in design.column_iter_mut().zip(&scales) {
        col /= *scale;
    }

    let y = DVector::from_column_slice(log_z);
    let solution = design
        .svd(true, true)
        .solve(&y, 1e-12)
        .map_err(|e| Error::NumericalInstability(format!("least squares fit failed: {e}")))?;

    let coefficients: Vec<f64> = solution
        .iter()
        .zip(&scales)
        .map(|(c, scale)| c / scale)
        .collect();
    let fit = PartitionFunctionFit::new(n, metric, coefficients)?;

    let mut sorted = alpha_grid.to_vec();
    sorted.sort_by(f64::total_cmp);
    let increasing = sorted
        .windows(2)
        .any(|w| fit.eval(w[1]) > fit.eval(w[0]) + 1e-8);
    if increasing {
        warn!(
            n,
            %metric,
            "fitted log partition function increases somewhere on the alpha grid"
        );
    }
    debug!(n, %metric, degree, coefficients = ?fit.coefficients, "fitted log partition function");

    Ok(fit)
}

/// Where the log partition function comes from, decided once per run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionFunctionSource {
    /// Exact summation over a cardinality table.
    Exact(CardinalityTable),
    /// Evaluation of an importance sampling fit.
    Approximate(PartitionFunctionFit),
    /// Closed-form expression; available for Kendall, Cayley and Hamming.
    ClosedForm { n: usize, metric: Metric },
}

impl PartitionFunctionSource {
    /// Choose between a cardinality table and a fit.
    ///
    /// The table wins when both are given. Either must match `n` and `metric`.
    pub fn from_options(
        n: usize,
        cardinalities: Option<CardinalityTable>,
        fit: Option<PartitionFunctionFit>,
        metric: Metric,
    ) -> Result<Self> {
        let source = match (cardinalities, fit) {
            (Some(table), _) => Self::Exact(table),
            (None, Some(fit)) => Self::Approximate(fit),
            (None, None) => {
                return Err(Error::MissingConfiguration(
                    "either a cardinality table or a partition function fit is required"
                        .to_string(),
                ));
            }
        };
        source.check(n, metric)?;
        Ok(source)
    }

    /// Closed-form source for the metrics that have one.
    pub fn closed_form(n: usize, metric: Metric) -> Result<Self> {
        if n < 1 {
            return Err(Error::invalid("number of items must be at least 1"));
        }
        match metric {
            Metric::Kendall | Metric::Cayley | Metric::Hamming => Ok(Self::ClosedForm { n, metric }),
            Metric::Footrule | Metric::Spearman => Err(Error::invalid(format!(
                "{metric} has no closed-form partition function"
            ))),
        }
    }

    #[must_use]
    pub const fn n(&self) -> usize {
        match self {
            Self::Exact(table) => table.n(),
            Self::Approximate(fit) => fit.n(),
            Self::ClosedForm { n, .. } => *n,
        }
    }

    #[must_use]
    pub const fn metric(&self) -> Metric {
        match self {
            Self::Exact(table) => table.metric(),
            Self::Approximate(fit) => fit.metric(),
            Self::ClosedForm { metric, .. } => *metric,
        }
    }

    /// Fail with `InvalidInput` unless the source describes `n` items under `metric`.
    pub fn check(&self, n: usize, metric: Metric) -> Result<()> {
        if self.n() != n || self.metric() != metric {
            return Err(Error::invalid(format!(
                "partition function source is for {} items under {}, expected {n} items under {metric}",
                self.n(),
                self.metric()
            )));
        }
        Ok(())
    }

    /// `log Z(alpha)`. May be non-finite; callers decide how to treat that.
    #[must_use]
    pub fn log_z(&self, alpha: f64) -> f64 {
        match self {
            Self::Exact(table) => exact_log_z(table, alpha),
            Self::Approximate(fit) => fit.eval(alpha),
            Self::ClosedForm { n, metric } => closed_form_log_z(*n, *metric, alpha),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn exact_log_z(table: &CardinalityTable, alpha: f64) -> f64 {
    let n = table.n() as f64;
    table
        .iter()
        .map(|(d, count)| (count as f64).ln() - alpha * d as f64 / n)
        .logsumexp()
}

fn closed_form_log_z(n: usize, metric: Metric, alpha: f64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let scaled = alpha / n as f64;
    match metric {
        Metric::Kendall => {
            if scaled == 0.0 {
                return ln_factorial(n);
            }
            let denom = (-(-scaled).exp_m1()).ln();
            (1..=n)
                .map(|i| {
                    #[allow(clippy::cast_precision_loss)]
                    let i = i as f64;
                    (-(-i * scaled).exp_m1()).ln() - denom
                })
                .sum()
        }
        Metric::Cayley => {
            let decay = (-scaled).exp();
            (1..n)
                .map(|i| {
                    #[allow(clippy::cast_precision_loss)]
                    let i = i as f64;
                    (i * decay).ln_1p()
                })
                .sum()
        }
        Metric::Hamming => {
            // Z = n! e^{−α} Σ_j (e^{α/n} − 1)^j / j!
            // ln(e^s − 1), stable for large s; −inf at s = 0 drops every j ≥ 1 term.
            let ln_base = scaled + (-(-scaled).exp()).ln_1p();
            let series = std::iter::once(0.0)
                .chain((1..=n).map(|j| {
                    #[allow(clippy::cast_precision_loss)]
                    let j_f = j as f64;
                    j_f * ln_base - ln_factorial(j)
                }))
                .logsumexp();
            ln_factorial(n) - alpha + series
        }
        Metric::Footrule | Metric::Spearman => f64::NAN,
    }
}

/// `log Z(alpha)` for `n` items.
///
/// Uses exact summation when `cardinalities` is given (even if a fit is also
/// given), otherwise the fit. Fails with `MissingConfiguration` when neither is.
pub fn log_partition_function(
    n: usize,
    alpha: f64,
    cardinalities: Option<&CardinalityTable>,
    fit: Option<&PartitionFunctionFit>,
    metric: Metric,
) -> Result<f64> {
    if n < 1 {
        return Err(Error::invalid("number of items must be at least 1"));
    }
    if !alpha.is_finite() || alpha < 0.0 {
        return Err(Error::invalid(format!(
            "alpha must be finite and non-negative, got {alpha}"
        )));
    }
    let source =
        PartitionFunctionSource::from_options(n, cardinalities.cloned(), fit.cloned(), metric)?;
    let value = source.log_z(alpha);
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::NumericalInstability(format!(
            "log partition function at alpha = {alpha} is {value}"
        )))
    }
}

/// Parse the metric by name and evaluate the log partition function.
pub fn evaluate_log_partition_function(
    n: usize,
    alpha: f64,
    cardinalities: Option<&CardinalityTable>,
    fit: Option<&PartitionFunctionFit>,
    metric: &str,
) -> Result<f64> {
    log_partition_function(n, alpha, cardinalities, fit, metric.parse()?)
}
