use rand::Rng;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::mcmc::{Acceptance, Sampler, metropolis_accept};
use crate::metric::Metric;
use crate::models::mallows::{MallowsModel, Rankings, total_distance};

/// A candidate consensus produced by one leap-and-shift move.
#[derive(Clone, Debug, PartialEq)]
pub struct LeapShiftProposal {
    /// Candidate ranking; the current one is left untouched.
    pub rho: Vec<usize>,
    /// Items (0-based) whose rank differs between current and candidate.
    pub moved: Vec<usize>,
    pub ln_forward: f64,
    pub ln_backward: f64,
}

impl LeapShiftProposal {
    /// `ln q(current | candidate) − ln q(candidate | current)`.
    #[must_use]
    pub fn ln_proposal_ratio(&self) -> f64 {
        self.ln_backward - self.ln_forward
    }
}

/// Metropolis-Hastings update of the consensus ranking.
///
/// A uniformly chosen item leaps to a rank at most `leap` away from its
/// current one and the items ranked in between shift one step to close the
/// gap. Small windows accept more often and explore more slowly.
#[derive(Clone, Debug)]
pub struct LeapAndShift {
    leap: usize,
    acceptance: Acceptance,
}

impl LeapAndShift {
    pub fn new(leap: usize) -> Result<Self> {
        if leap < 1 {
            return Err(Error::invalid("leap window must be at least 1"));
        }
        Ok(Self {
            leap,
            acceptance: Acceptance::default(),
        })
    }

    #[must_use]
    pub const fn leap(&self) -> usize {
        self.leap
    }

    #[must_use]
    pub const fn acceptance(&self) -> Acceptance {
        self.acceptance
    }

    /// Number of ranks reachable from `rank` in one leap.
    const fn support_size(&self, rank: usize, n: usize) -> usize {
        let below = if rank - 1 < self.leap { rank - 1 } else { self.leap };
        let above = if n - rank < self.leap { n - rank } else { self.leap };
        below + above
    }

    /// Draw a candidate from the current consensus `rho`.
    ///
    /// With a single item there is nowhere to move and the candidate equals
    /// `rho`.
    pub fn propose<R: Rng>(&self, rho: &[usize], rng: &mut R) -> LeapShiftProposal {
        let n = rho.len();
        if n < 2 {
            return LeapShiftProposal {
                rho: rho.to_vec(),
                moved: Vec::new(),
                ln_forward: 0.0,
                ln_backward: 0.0,
            };
        }

        let item = rng.random_range(0..n);
        let old = rho[item];
        let low = old.saturating_sub(self.leap).max(1);
        let high = (old + self.leap).min(n);
        // Draw from low..=high with `old` removed.
        let mut new = rng.random_range(low..high);
        if new >= old {
            new += 1;
        }

        let mut candidate = rho.to_vec();
        let mut moved = vec![item];
        for (other, rank) in candidate.iter_mut().enumerate() {
            if other == item {
                *rank = new;
            } else if new > old && (old + 1..=new).contains(rank) {
                *rank -= 1;
                moved.push(other);
            } else if new < old && (new..old).contains(rank) {
                *rank += 1;
                moved.push(other);
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let (ln_n, forward, backward) = (
            (n as f64).ln(),
            self.support_size(old, n) as f64,
            self.support_size(new, n) as f64,
        );
        let (ln_forward, ln_backward) = if old.abs_diff(new) == 1 {
            // An adjacent swap is also reached by moving the neighbour, from
            // either side.
            let both = (forward.recip() + backward.recip()).ln() - ln_n;
            (both, both)
        } else {
            (-ln_n - forward.ln(), -ln_n - backward.ln())
        };

        LeapShiftProposal {
            rho: candidate,
            moved,
            ln_forward,
            ln_backward,
        }
    }
}

/// Change in `Σ_j d(R_j, rho)` when `current` is replaced by `proposal.rho`.
///
/// Separable metrics only revisit the moved items.
pub(crate) fn distance_change(
    data: &Rankings,
    current: &[usize],
    proposal: &LeapShiftProposal,
    metric: Metric,
) -> f64 {
    if metric.is_separable() {
        data.par_iter()
            .map(|ranking| {
                proposal
                    .moved
                    .iter()
                    .map(|&i| {
                        metric.item_term(ranking[i], proposal.rho[i])
                            - metric.item_term(ranking[i], current[i])
                    })
                    .sum::<f64>()
            })
            .sum()
    } else {
        total_distance(data, &proposal.rho, metric) - total_distance(data, current, metric)
    }
}

impl Sampler<MallowsModel, Rankings> for LeapAndShift {
    fn step<R: Rng>(&mut self, model: MallowsModel, data: &Rankings, rng: &mut R) -> MallowsModel {
        let proposal = self.propose(model.rho(), rng);
        let change = distance_change(data, model.rho(), &proposal, model.metric());

        #[allow(clippy::cast_precision_loss)]
        let n = model.n_items() as f64;
        let ln_ratio = -model.alpha() / n * change + proposal.ln_proposal_ratio();

        let accepted = metropolis_accept(ln_ratio, rng);
        self.acceptance.record(accepted);
        if accepted {
            model.with_rho(proposal.rho)
        } else {
            model
        }
    }
}
