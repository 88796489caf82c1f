use rand::Rng;
use rv::prelude::Gaussian;
use rv::traits::Sampleable;

use crate::config::AlphaProposal;
use crate::error::{Error, Result};
use crate::mcmc::{Acceptance, Sampler, metropolis_accept};
use crate::models::mallows::{MallowsModel, Rankings};

/// Random walk Metropolis-Hastings on the dispersion `α`.
#[derive(Clone, Debug)]
pub struct AlphaRandomWalk {
    proposal_dist: Gaussian,
    kind: AlphaProposal,
    acceptance: Acceptance,
}

impl AlphaRandomWalk {
    pub fn new(sd: f64, kind: AlphaProposal) -> Result<Self> {
        let proposal_dist = Gaussian::new(0.0, sd)
            .map_err(|err| Error::invalid(format!("invalid alpha proposal sd {sd}: {err}")))?;
        Ok(Self {
            proposal_dist,
            kind,
            acceptance: Acceptance::default(),
        })
    }

    #[must_use]
    pub const fn acceptance(&self) -> Acceptance {
        self.acceptance
    }

    #[must_use]
    pub const fn kind(&self) -> AlphaProposal {
        self.kind
    }

    /// Draw a proposal, returning it with the log proposal ratio
    /// `ln q(α | α') − ln q(α' | α)`, or `None` when it leaves the support.
    fn propose<R: Rng>(&self, alpha: f64, rng: &mut R) -> Option<(f64, f64)> {
        let eps: f64 = self.proposal_dist.draw(rng);
        match self.kind {
            AlphaProposal::TruncatedNormal => {
                let proposed = alpha + eps;
                (proposed >= 0.0).then_some((proposed, 0.0))
            }
            AlphaProposal::LogNormal => {
                let proposed = alpha * eps.exp();
                (proposed > 0.0).then(|| (proposed, proposed.ln() - alpha.ln()))
            }
        }
    }
}

/// `ln p(α' | ρ, R) − ln p(α | ρ, R)` given the summed distance to the
/// consensus.
fn ln_posterior_ratio(model: &MallowsModel, n_assessors: usize, total: f64, proposed: f64) -> f64 {
    let alpha = model.alpha();
    let partition = model.partition();
    #[allow(clippy::cast_precision_loss)]
    let (n, n_assessors) = (model.n_items() as f64, n_assessors as f64);

    -(proposed - alpha) / n * total
        - n_assessors * (partition.log_z(proposed) - partition.log_z(alpha))
        + model.ln_alpha_prior(proposed)
        - model.ln_alpha_prior(alpha)
}

impl Sampler<MallowsModel, Rankings> for AlphaRandomWalk {
    fn step<R: Rng>(&mut self, model: MallowsModel, data: &Rankings, rng: &mut R) -> MallowsModel {
        let Some((proposed, ln_proposal_ratio)) = self.propose(model.alpha(), rng) else {
            self.acceptance.record(false);
            return model;
        };

        let total = model.total_distance(data);
        let ln_ratio = ln_posterior_ratio(&model, data.len(), total, proposed) + ln_proposal_ratio;

        let accepted = metropolis_accept(ln_ratio, rng);
        self.acceptance.record(accepted);
        if accepted {
            model.with_alpha(proposed)
        } else {
            model
        }
    }
}
