use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Distance between rankings. Fixed for an entire run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Sum of absolute rank differences.
    #[default]
    Footrule,
    /// Sum of squared rank differences.
    Spearman,
    /// Minimum number of transpositions.
    Cayley,
    /// Number of discordant pairs.
    Kendall,
    /// Number of positions that differ.
    Hamming,
}

impl Metric {
    pub const ALL: [Self; 5] = [
        Self::Footrule,
        Self::Spearman,
        Self::Cayley,
        Self::Kendall,
        Self::Hamming,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Footrule => "footrule",
            Self::Spearman => "spearman",
            Self::Cayley => "cayley",
            Self::Kendall => "kendall",
            Self::Hamming => "hamming",
        }
    }

    /// Whether the distance is a sum of independent per-item terms.
    ///
    /// For these metrics a change in a handful of ranks only needs the
    /// affected items' contributions to be recomputed.
    #[must_use]
    pub const fn is_separable(self) -> bool {
        matches!(self, Self::Footrule | Self::Spearman | Self::Hamming)
    }

    /// Contribution of a single item ranked `r1` in one ranking and `r2` in the other.
    ///
    /// Only meaningful for separable metrics. Cayley uses the Hamming term as a
    /// local proxy and Kendall returns zero; callers needing those exactly use
    /// the full distance.
    #[must_use]
    pub(crate) fn item_term(self, r1: usize, r2: usize) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let diff = r1.abs_diff(r2) as f64;
        match self {
            Self::Footrule => diff,
            Self::Spearman => diff * diff,
            Self::Hamming | Self::Cayley => {
                if r1 == r2 {
                    0.0
                } else {
                    1.0
                }
            }
            Self::Kendall => 0.0,
        }
    }

    /// Largest attainable distance between two permutations of `n` items.
    #[must_use]
    pub const fn max_distance(self, n: usize) -> usize {
        match self {
            Self::Footrule => n * n / 2,
            // 2 * C(n + 1, 3)
            Self::Spearman => (n + 1) * n * n.saturating_sub(1) / 3,
            Self::Cayley => n.saturating_sub(1),
            Self::Kendall => n * n.saturating_sub(1) / 2,
            Self::Hamming => {
                if n == 1 {
                    0
                } else {
                    n
                }
            }
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "footrule" => Ok(Self::Footrule),
            "spearman" => Ok(Self::Spearman),
            "cayley" => Ok(Self::Cayley),
            "kendall" => Ok(Self::Kendall),
            "hamming" => Ok(Self::Hamming),
            other => Err(Error::invalid(format!("unrecognized metric '{other}'"))),
        }
    }
}
