//! The Mallows posterior sampler and the chains it produces.

use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use itertools::Itertools;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, trace, warn};

use crate::cardinality::CardinalityTable;
use crate::config::{AlphaProposal, SamplerConfig};
use crate::error::{Error, Result};
use crate::mcmc::augment::{Imputer, KeepCompletion};
use crate::mcmc::samplers::continuous::AlphaRandomWalk;
use crate::mcmc::samplers::rho::LeapAndShift;
use crate::mcmc::{Acceptance, Sampler};
use crate::metric::Metric;
use crate::models::mallows::MallowsModel;
use crate::partition::{PartitionFunctionFit, PartitionFunctionSource};
use crate::ranking::{RankingMatrix, identity, is_consistent_completion};
use crate::utils::MeanAndVariance;

/// Shared flag asking a running sampler to stop after its current iteration.
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Information about sampling progress.
///
/// Passed to progress callbacks after every iteration.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Iterations completed so far (1-based).
    pub iteration: usize,

    /// Total number of iterations requested
    pub total: usize,

    pub rho_acceptance_rate: f64,

    pub alpha_acceptance_rate: f64,

    /// Dispersion after this iteration
    pub alpha: f64,
}

/// Posterior draws of the consensus ranking and the dispersion.
///
/// Entry `t` of each chain is the state after iteration `t + 1`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MallowsChain {
    pub metric: Metric,
    pub n_items: usize,
    pub rho_chain: Vec<Vec<usize>>,
    pub alpha_chain: Vec<f64>,
    pub rho_acceptance: Acceptance,
    pub alpha_acceptance: Acceptance,
    /// Whether the run stopped early through its [`StopFlag`].
    pub cancelled: bool,
}

impl MallowsChain {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rho_chain.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rho_chain.is_empty()
    }

    #[must_use]
    pub fn rho_acceptance_rate(&self) -> f64 {
        self.rho_acceptance.rate()
    }

    #[must_use]
    pub fn alpha_acceptance_rate(&self) -> f64 {
        self.alpha_acceptance.rate()
    }

    /// Mean and variance of α over the draws after `burn_in`.
    #[must_use]
    pub fn alpha_summary(&self, burn_in: usize) -> MeanAndVariance {
        self.alpha_chain.iter().skip(burn_in).copied().collect()
    }

    /// Posterior mean of α, `None` when no draws remain after `burn_in`.
    #[must_use]
    pub fn posterior_mean_alpha(&self, burn_in: usize) -> Option<f64> {
        let summary = self.alpha_summary(burn_in);
        (summary.count() > 0).then(|| summary.mean())
    }

    /// Posterior mean rank of every item after `burn_in`.
    #[must_use]
    pub fn posterior_mean_rank(&self, burn_in: usize) -> Option<Vec<f64>> {
        let draws = self.rho_chain.get(burn_in..)?;
        if draws.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let means = (0..self.n_items)
            .map(|item| {
                draws
                    .iter()
                    .map(|rho| rho[item] as f64)
                    .collect::<MeanAndVariance>()
                    .mean()
            })
            .collect();
        Some(means)
    }

    /// Most frequently visited consensus after `burn_in`.
    ///
    /// Ties go to the lexicographically smallest ranking.
    #[must_use]
    pub fn modal_rho(&self, burn_in: usize) -> Option<Vec<usize>> {
        self.rho_chain
            .iter()
            .skip(burn_in)
            .counts()
            .into_iter()
            .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| b.cmp(a)))
            .map(|(rho, _)| rho.clone())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Posterior sampler for the Bayesian Mallows model.
///
/// Each iteration completes the partially observed rows through the
/// [`Imputer`], updates the consensus by leap-and-shift and, on iterations
/// divisible by `alpha_update_interval`, updates the dispersion.
pub struct MallowsSampler<I = KeepCompletion> {
    data: RankingMatrix,
    partition: Arc<PartitionFunctionSource>,
    config: SamplerConfig,
    imputer: I,
    stop: Option<StopFlag>,
}

impl MallowsSampler<KeepCompletion> {
    /// Validate `data`, `partition` and `config` against each other.
    pub fn new(
        data: RankingMatrix,
        partition: Arc<PartitionFunctionSource>,
        config: SamplerConfig,
    ) -> Result<Self> {
        let n = data.n_items();
        config.validate(n)?;
        partition.check(n, config.metric)?;
        Ok(Self {
            data,
            partition,
            config,
            imputer: KeepCompletion,
            stop: None,
        })
    }
}

impl<I: Imputer> MallowsSampler<I> {
    #[must_use]
    pub fn with_imputer<J: Imputer>(self, imputer: J) -> MallowsSampler<J> {
        MallowsSampler {
            data: self.data,
            partition: self.partition,
            config: self.config,
            imputer,
            stop: self.stop,
        }
    }

    #[must_use]
    pub fn with_stop_flag(self, stop: StopFlag) -> Self {
        Self {
            stop: Some(stop),
            ..self
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SamplerConfig {
        &self.config
    }

    #[must_use]
    pub const fn data(&self) -> &RankingMatrix {
        &self.data
    }

    pub fn run<R: Rng>(&mut self, rng: &mut R) -> Result<MallowsChain> {
        self.run_inner(rng, None::<fn(&ProgressInfo)>)
    }

    /// Run the sampler, reporting progress after every iteration.
    pub fn run_with_progress<R, F>(&mut self, rng: &mut R, progress_callback: F) -> Result<MallowsChain>
    where
        R: Rng,
        F: FnMut(&ProgressInfo),
    {
        self.run_inner(rng, Some(progress_callback))
    }

    #[instrument(skip_all, fields(
        n_items = self.data.n_items(),
        n_assessors = self.data.n_assessors(),
        metric = %self.config.metric
    ))]
    fn run_inner<R, F>(&mut self, rng: &mut R, mut progress_callback: Option<F>) -> Result<MallowsChain>
    where
        R: Rng,
        F: FnMut(&ProgressInfo),
    {
        let n = self.data.n_items();
        let config = &self.config;

        let initial_log_z = self.partition.log_z(config.alpha_init);
        if !initial_log_z.is_finite() {
            return Err(Error::NumericalInstability(format!(
                "log partition function at alpha_init = {} is {initial_log_z}",
                config.alpha_init
            )));
        }

        let rho = config.initial_rho.clone().unwrap_or_else(|| identity(n));
        let mut model = MallowsModel::new(
            rho,
            config.alpha_init,
            config.alpha_prior_rate,
            Arc::clone(&self.partition),
        )?;
        let mut rho_sampler = LeapAndShift::new(config.leap_window_for(n))?;
        let mut alpha_sampler = AlphaRandomWalk::new(config.alpha_proposal_sd, config.alpha_proposal)?;

        let partial_rows = self.data.partial_rows();
        let mut completed = self.data.initial_completion(rng);

        info!(
            n_iterations = config.n_iterations,
            leap = rho_sampler.leap(),
            partial_rows = partial_rows.len(),
            "starting sampler"
        );

        let mut rho_chain = Vec::with_capacity(config.n_iterations);
        let mut alpha_chain = Vec::with_capacity(config.n_iterations);
        let mut cancelled = false;

        for iteration in 1..=config.n_iterations {
            if self.stop.as_ref().is_some_and(StopFlag::is_stopped) {
                info!(iteration, "stop requested");
                cancelled = true;
                break;
            }

            for &assessor in &partial_rows {
                let partial = self.data.row(assessor);
                let candidate = self.imputer.impute(
                    partial,
                    &completed[assessor],
                    model.rho(),
                    model.alpha(),
                    rng,
                );
                if is_consistent_completion(partial, &candidate) {
                    completed[assessor] = candidate;
                } else {
                    warn!(assessor, iteration, "inconsistent completion ignored");
                }
            }

            model = rho_sampler.step(model, &completed, rng);
            if iteration % config.alpha_update_interval == 0 {
                model = alpha_sampler.step(model, &completed, rng);
            }

            rho_chain.push(model.rho().to_vec());
            alpha_chain.push(model.alpha());
            trace!(iteration, alpha = model.alpha(), rho = ?model.rho());

            if let Some(callback) = progress_callback.as_mut() {
                callback(&ProgressInfo {
                    iteration,
                    total: config.n_iterations,
                    rho_acceptance_rate: rho_sampler.acceptance().rate(),
                    alpha_acceptance_rate: alpha_sampler.acceptance().rate(),
                    alpha: model.alpha(),
                });
            }
        }

        let chain = MallowsChain {
            metric: config.metric,
            n_items: n,
            rho_chain,
            alpha_chain,
            rho_acceptance: rho_sampler.acceptance(),
            alpha_acceptance: alpha_sampler.acceptance(),
            cancelled,
        };
        info!(
            iterations = chain.len(),
            rho_acceptance = chain.rho_acceptance_rate(),
            alpha_acceptance = chain.alpha_acceptance_rate(),
            cancelled,
            "sampler finished"
        );
        Ok(chain)
    }
}

/// Run the sampler on complete or partial rankings in one call.
///
/// `cardinalities` takes precedence over `fit`; one of them is required.
#[allow(clippy::too_many_arguments)]
pub fn run_sampler<R: Rng>(
    ranking_matrix: RankingMatrix,
    n_iterations: usize,
    cardinalities: Option<CardinalityTable>,
    fit: Option<PartitionFunctionFit>,
    metric: &str,
    leap_window: usize,
    alpha_proposal_sd: f64,
    alpha_init: f64,
    alpha_update_interval: usize,
    alpha_prior_rate: f64,
    rng: &mut R,
) -> Result<MallowsChain> {
    let metric: Metric = metric.parse()?;
    let partition =
        PartitionFunctionSource::from_options(ranking_matrix.n_items(), cardinalities, fit, metric)?;
    let config = SamplerConfig {
        n_iterations,
        leap_window: Some(leap_window),
        alpha_proposal_sd,
        alpha_init,
        alpha_update_interval,
        alpha_prior_rate,
        metric,
        alpha_proposal: AlphaProposal::TruncatedNormal,
        initial_rho: None,
    };
    MallowsSampler::new(ranking_matrix, Arc::new(partition), config)?.run(rng)
}
