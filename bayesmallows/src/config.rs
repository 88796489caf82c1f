//! Sampler configuration.
//!
//! Every field has a default, so a partial JSON document such as
//! `{"n_iterations": 500, "metric": "kendall"}` is a complete configuration.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metric::Metric;
use crate::ranking::validate_permutation;

/// How the dispersion random walk proposes a new value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaProposal {
    /// `α' = α + ε`; proposals below zero are rejected outright.
    #[default]
    TruncatedNormal,
    /// `α' = α · exp(ε)`, corrected by the Jacobian `α' / α`.
    LogNormal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub n_iterations: usize,
    /// Maximum rank distance of one leap; `None` picks `max(1, n / 5)`.
    pub leap_window: Option<usize>,
    pub alpha_proposal_sd: f64,
    pub alpha_init: f64,
    /// α is updated on iterations divisible by this interval.
    pub alpha_update_interval: usize,
    /// Rate of the exponential prior on α.
    pub alpha_prior_rate: f64,
    pub metric: Metric,
    pub alpha_proposal: AlphaProposal,
    /// Starting consensus; the identity when absent.
    pub initial_rho: Option<Vec<usize>>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            n_iterations: 2000,
            leap_window: None,
            alpha_proposal_sd: 0.1,
            alpha_init: 1.0,
            alpha_update_interval: 1,
            alpha_prior_rate: 0.1,
            metric: Metric::Footrule,
            alpha_proposal: AlphaProposal::TruncatedNormal,
            initial_rho: None,
        }
    }
}

impl SamplerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Leap window for `n_items` items.
    #[must_use]
    pub fn leap_window_for(&self, n_items: usize) -> usize {
        self.leap_window.unwrap_or_else(|| (n_items / 5).max(1))
    }

    /// Check the configuration against a data set of `n_items` items.
    pub fn validate(&self, n_items: usize) -> Result<()> {
        if n_items < 1 {
            return Err(Error::invalid("number of items must be at least 1"));
        }
        if self.leap_window == Some(0) {
            return Err(Error::invalid("leap window must be at least 1"));
        }
        if self.alpha_update_interval < 1 {
            return Err(Error::invalid("alpha update interval must be at least 1"));
        }
        if !self.alpha_proposal_sd.is_finite() || self.alpha_proposal_sd <= 0.0 {
            return Err(Error::invalid(format!(
                "alpha proposal sd must be positive, got {}",
                self.alpha_proposal_sd
            )));
        }
        if !self.alpha_prior_rate.is_finite() || self.alpha_prior_rate <= 0.0 {
            return Err(Error::invalid(format!(
                "alpha prior rate must be positive, got {}",
                self.alpha_prior_rate
            )));
        }
        let alpha_ok = match self.alpha_proposal {
            AlphaProposal::TruncatedNormal => self.alpha_init >= 0.0,
            AlphaProposal::LogNormal => self.alpha_init > 0.0,
        };
        if !self.alpha_init.is_finite() || !alpha_ok {
            return Err(Error::invalid(format!(
                "alpha_init {} is not a valid start for the {:?} proposal",
                self.alpha_init, self.alpha_proposal
            )));
        }
        if let Some(rho) = &self.initial_rho {
            validate_permutation(rho)?;
            if rho.len() != n_items {
                return Err(Error::invalid(format!(
                    "initial consensus ranks {} items, data has {n_items}",
                    rho.len()
                )));
            }
        }
        Ok(())
    }
}
