//! Completion of partially observed rankings.
//!
//! Rows with missing ranks are completed once per iteration, before any
//! distance is computed, by an [`Imputer`]. The sampler only checks that the
//! completion is a permutation agreeing with the observed ranks.

use rand::{Rng, RngCore};

/// Produces a completed ranking for one partially observed row.
pub trait Imputer {
    /// Complete `partial` given the row's `current` completion and the
    /// current consensus `rho` and dispersion `alpha`.
    fn impute<R: Rng>(
        &mut self,
        partial: &[Option<usize>],
        current: &[usize],
        rho: &[usize],
        alpha: f64,
        rng: &mut R,
    ) -> Vec<usize>;
}

/// Keeps every row at its current completion.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeepCompletion;

impl Imputer for KeepCompletion {
    fn impute<R: Rng>(
        &mut self,
        _partial: &[Option<usize>],
        current: &[usize],
        _rho: &[usize],
        _alpha: f64,
        _rng: &mut R,
    ) -> Vec<usize> {
        current.to_vec()
    }
}

/// Adapts a closure into an [`Imputer`].
pub struct FnImputer<F>(pub F);

impl<F> Imputer for FnImputer<F>
where
    F: FnMut(&[Option<usize>], &[usize], &[usize], f64, &mut dyn RngCore) -> Vec<usize>,
{
    fn impute<R: Rng>(
        &mut self,
        partial: &[Option<usize>],
        current: &[usize],
        rho: &[usize],
        alpha: f64,
        rng: &mut R,
    ) -> Vec<usize> {
        let rng: &mut dyn RngCore = rng;
        (self.0)(partial, current, rho, alpha, rng)
    }
}
