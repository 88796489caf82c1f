//! Rankings and the assessor ranking matrix.
//!
//! A ranking maps item index `i` to its rank `r[i]` in `1..=n`.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The ranking that gives item `i` rank `i + 1`.
#[must_use]
pub fn identity(n: usize) -> Vec<usize> {
    (1..=n).collect()
}

/// Check that `ranking` is a permutation of `1..=ranking.len()`.
pub fn validate_permutation(ranking: &[usize]) -> Result<()> {
    let n = ranking.len();
    if n == 0 {
        return Err(Error::invalid("ranking must contain at least one item"));
    }
    let mut seen = vec![false; n];
    for (item, &rank) in ranking.iter().enumerate() {
        if rank == 0 || rank > n {
            return Err(Error::invalid(format!(
                "rank {rank} of item {item} is outside 1..={n}"
            )));
        }
        if std::mem::replace(&mut seen[rank - 1], true) {
            return Err(Error::invalid(format!("rank {rank} appears more than once")));
        }
    }
    Ok(())
}

/// Observed rankings, one row per assessor, with `None` marking unranked items.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingMatrix {
    n_items: usize,
    rows: Vec<Vec<Option<usize>>>,
}

impl RankingMatrix {
    /// Build a matrix from complete rankings.
    pub fn from_complete(rows: Vec<Vec<usize>>) -> Result<Self> {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Some).collect())
            .collect();
        Self::from_partial(rows)
    }

    /// Build a matrix that may contain missing ranks.
    ///
    /// Every row must have the same length, and the observed ranks in a row
    /// must be distinct values in `1..=n`.
    pub fn from_partial(rows: Vec<Vec<Option<usize>>>) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(Error::invalid("ranking matrix has no rows"));
        };
        let n_items = first.len();
        if n_items == 0 {
            return Err(Error::invalid("ranking matrix has no items"));
        }

        for (assessor, row) in rows.iter().enumerate() {
            if row.len() != n_items {
                return Err(Error::invalid(format!(
                    "assessor {assessor} ranks {} items, expected {n_items}",
                    row.len()
                )));
            }
            let mut seen = vec![false; n_items];
            for &rank in row.iter().flatten() {
                if rank == 0 || rank > n_items {
                    return Err(Error::invalid(format!(
                        "assessor {assessor} has rank {rank} outside 1..={n_items}"
                    )));
                }
                if std::mem::replace(&mut seen[rank - 1], true) {
                    return Err(Error::invalid(format!(
                        "assessor {assessor} uses rank {rank} more than once"
                    )));
                }
            }
        }

        Ok(Self { n_items, rows })
    }

    #[must_use]
    pub const fn n_items(&self) -> usize {
        self.n_items
    }

    #[must_use]
    pub fn n_assessors(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Option<usize>>] {
        &self.rows
    }

    #[must_use]
    pub fn row(&self, assessor: usize) -> &[Option<usize>] {
        &self.rows[assessor]
    }

    #[must_use]
    pub fn is_row_complete(&self, assessor: usize) -> bool {
        self.rows[assessor].iter().all(Option::is_some)
    }

    #[must_use]
    pub fn has_missing(&self) -> bool {
        self.rows.iter().flatten().any(Option::is_none)
    }

    /// Indices of the assessors whose ranking has missing entries.
    #[must_use]
    pub fn partial_rows(&self) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|&assessor| !self.is_row_complete(assessor))
            .collect()
    }

    /// Complete every row, filling each row's missing items with a random
    /// arrangement of the ranks that row leaves unused.
    pub fn initial_completion<R: Rng>(&self, rng: &mut R) -> Vec<Vec<usize>> {
        self.rows
            .iter()
            .map(|row| {
                let mut used = vec![false; self.n_items];
                for &rank in row.iter().flatten() {
                    used[rank - 1] = true;
                }
                let mut unused: Vec<usize> = (1..=self.n_items).filter(|r| !used[r - 1]).collect();
                unused.shuffle(rng);
                let mut fill = unused.into_iter();
                row.iter()
                    .map(|rank| rank.unwrap_or_else(|| fill.next().unwrap_or_default()))
                    .collect()
            })
            .collect()
    }
}

/// Whether `completed` is a permutation that agrees with every observed entry of `partial`.
#[must_use]
pub fn is_consistent_completion(partial: &[Option<usize>], completed: &[usize]) -> bool {
    completed.len() == partial.len()
        && validate_permutation(completed).is_ok()
        && partial
            .iter()
            .zip(completed)
            .all(|(observed, &rank)| observed.is_none_or(|r| r == rank))
}
