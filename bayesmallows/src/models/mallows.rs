use std::sync::Arc;

use rayon::prelude::*;

use super::Model;
use crate::distance::distance_unchecked;
use crate::error::{Error, Result};
use crate::metric::Metric;
use crate::partition::PartitionFunctionSource;
use crate::ranking::validate_permutation;

/// Complete rankings, one per assessor, that the model is scored against.
pub type Rankings = Vec<Vec<usize>>;

/// Mallows model with consensus `rho`, dispersion `alpha` and an
/// exponential prior on `alpha`.
///
/// The likelihood of rankings `R_1..R_N` is
/// `exp(−α/n · Σ_j d(R_j, ρ)) / Z(α)^N`. `ρ` has a uniform prior.
#[derive(Clone, Debug)]
pub struct MallowsModel {
    rho: Vec<usize>,
    alpha: f64,
    alpha_prior_rate: f64,
    partition: Arc<PartitionFunctionSource>,
}

impl MallowsModel {
    pub fn new(
        rho: Vec<usize>,
        alpha: f64,
        alpha_prior_rate: f64,
        partition: Arc<PartitionFunctionSource>,
    ) -> Result<Self> {
        validate_permutation(&rho)?;
        if rho.len() != partition.n() {
            return Err(Error::invalid(format!(
                "consensus ranks {} items, partition function is for {}",
                rho.len(),
                partition.n()
            )));
        }
        if !alpha.is_finite() || alpha < 0.0 {
            return Err(Error::invalid(format!(
                "alpha must be finite and non-negative, got {alpha}"
            )));
        }
        if !alpha_prior_rate.is_finite() || alpha_prior_rate <= 0.0 {
            return Err(Error::invalid(format!(
                "alpha prior rate must be positive, got {alpha_prior_rate}"
            )));
        }
        Ok(Self {
            rho,
            alpha,
            alpha_prior_rate,
            partition,
        })
    }

    #[must_use]
    pub fn rho(&self) -> &[usize] {
        &self.rho
    }

    #[must_use]
    pub const fn alpha(&self) -> f64 {
        self.alpha
    }

    #[must_use]
    pub fn n_items(&self) -> usize {
        self.rho.len()
    }

    #[must_use]
    pub fn metric(&self) -> Metric {
        self.partition.metric()
    }

    #[must_use]
    pub const fn alpha_prior_rate(&self) -> f64 {
        self.alpha_prior_rate
    }

    #[must_use]
    pub fn partition(&self) -> &PartitionFunctionSource {
        &self.partition
    }

    #[must_use]
    pub(crate) fn with_rho(self, rho: Vec<usize>) -> Self {
        Self { rho, ..self }
    }

    #[must_use]
    pub(crate) fn with_alpha(self, alpha: f64) -> Self {
        Self { alpha, ..self }
    }

    /// `Σ_j d(R_j, rho)`, computed across assessors in parallel.
    #[must_use]
    pub fn total_distance(&self, data: &Rankings) -> f64 {
        total_distance(data, &self.rho, self.metric())
    }

    /// Log of the exponential prior density at `alpha`.
    #[must_use]
    pub fn ln_alpha_prior(&self, alpha: f64) -> f64 {
        if alpha < 0.0 {
            f64::NEG_INFINITY
        } else {
            self.alpha_prior_rate.ln() - self.alpha_prior_rate * alpha
        }
    }
}

/// Sum of distances from every ranking to `rho`.
///
/// Distances are whole numbers, so the parallel sum does not depend on the
/// reduction order.
pub(crate) fn total_distance(data: &Rankings, rho: &[usize], metric: Metric) -> f64 {
    data.par_iter()
        .map(|ranking| distance_unchecked(ranking, rho, metric))
        .sum()
}

impl Model<Rankings> for MallowsModel {
    fn ln_likelihood(&self, data: &Rankings) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let (n, n_assessors) = (self.n_items() as f64, data.len() as f64);
        -self.alpha / n * self.total_distance(data) - n_assessors * self.partition.log_z(self.alpha)
    }

    fn ln_prior(&self) -> f64 {
        self.ln_alpha_prior(self.alpha)
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::cardinality::summation_distances;
    use crate::ranking::identity;

    fn model(rho: Vec<usize>, alpha: f64) -> MallowsModel {
        let n = rho.len();
        let table = summation_distances(n, None, Metric::Footrule).unwrap();
        MallowsModel::new(rho, alpha, 0.1, Arc::new(PartitionFunctionSource::Exact(table))).unwrap()
    }

    #[test]
    fn likelihood_is_a_distribution_over_single_rankings() {
        // Summing exp(log likelihood) over every possible ranking gives one.
        let m = model(vec![2, 1, 3, 4], 1.7);
        let total: f64 = (1..=4)
            .permutations(4)
            .map(|p| m.ln_likelihood(&vec![p]).exp())
            .sum();
        assert::close(total, 1.0, 1e-10);
    }

    #[test]
    fn consensus_equal_to_data_scores_highest() {
        let data: Rankings = vec![identity(5), identity(5)];
        let at_data = model(identity(5), 2.0).ln_score(&data);
        let elsewhere = model(vec![2, 1, 3, 4, 5], 2.0).ln_score(&data);
        assert!(at_data > elsewhere);
    }

    #[test]
    fn prior_is_exponential() {
        let m = model(identity(3), 2.0);
        assert::close(m.ln_prior(), 0.1_f64.ln() - 0.2, 1e-12);
        assert_eq!(m.ln_alpha_prior(-1.0), f64::NEG_INFINITY);
    }

    #[test]
    fn rejects_inconsistent_parameters() {
        let table = summation_distances(3, None, Metric::Footrule).unwrap();
        let source = Arc::new(PartitionFunctionSource::Exact(table));
        assert!(MallowsModel::new(identity(4), 1.0, 0.1, source.clone()).is_err());
        assert!(MallowsModel::new(vec![1, 1, 2], 1.0, 0.1, source.clone()).is_err());
        assert!(MallowsModel::new(identity(3), -1.0, 0.1, source.clone()).is_err());
        assert!(MallowsModel::new(identity(3), 1.0, 0.0, source).is_err());
    }
}
