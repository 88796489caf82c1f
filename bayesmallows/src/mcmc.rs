use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::Model;

pub mod augment;
pub mod samplers;

/// Trait for Markov Chain Monte Carlo Samplers.
pub trait Sampler<M, D>: Sized
where
    M: Model<D>,
{
    /// Advance `model` by one transition given `data`.
    fn step<R: Rng>(&mut self, model: M, data: &D, rng: &mut R) -> M;

    /// Run `steps` transitions back to back.
    fn multi_step<R: Rng>(&mut self, model: M, data: &D, steps: usize, rng: &mut R) -> M {
        (0..steps).fold(model, |acc, _| self.step(acc, data, rng))
    }
}

/// Count of proposals made and accepted by one sampler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acceptance {
    pub proposed: usize,
    pub accepted: usize,
}

impl Acceptance {
    pub(crate) fn record(&mut self, accepted: bool) {
        self.proposed += 1;
        if accepted {
            self.accepted += 1;
        }
    }

    /// Fraction of proposals accepted; zero before the first proposal.
    #[must_use]
    pub fn rate(&self) -> f64 {
        if self.proposed == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.accepted as f64 / self.proposed as f64;
        rate
    }
}

/// Metropolis-Hastings accept/reject on a log acceptance ratio.
///
/// A non-finite ratio is a rejection.
pub(crate) fn metropolis_accept<R: Rng>(ln_ratio: f64, rng: &mut R) -> bool {
    if !ln_ratio.is_finite() {
        warn!(ln_ratio, "non-finite acceptance ratio, rejecting");
        return false;
    }
    if ln_ratio >= 0.0 {
        return true;
    }
    rng.random::<f64>() < ln_ratio.exp()
}
