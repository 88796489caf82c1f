//! Number of permutations at each distance from a fixed reference.
//!
//! Counts depend only on `n` and the metric: every metric here is invariant
//! under relabelling the ranks, so the reference permutation is irrelevant and
//! the identity is used throughout.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::metric::Metric;
use crate::utils::{NoPrettyPrint, factorial};

/// Largest `n` for which the Spearman table is enumerated over subsets of ranks.
pub const MAX_SPEARMAN_ITEMS: usize = 14;

/// Dense distance → count mapping for permutations of `n` items.
///
/// `counts()[d]` is the number of permutations at distance exactly `d`
/// from the reference, for `d` in `0..=metric.max_distance(n)`. Unattainable
/// distances (e.g. odd footrule values) hold zero.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardinalityTable {
    n: usize,
    metric: Metric,
    counts: Vec<u128>,
}

impl std::fmt::Debug for CardinalityTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardinalityTable")
            .field("n", &self.n)
            .field("metric", &self.metric)
            .field("counts", &NoPrettyPrint(&self.counts))
            .finish()
    }
}

impl CardinalityTable {
    #[must_use]
    pub const fn n(&self) -> usize {
        self.n
    }

    #[must_use]
    pub const fn metric(&self) -> Metric {
        self.metric
    }

    #[must_use]
    pub fn counts(&self) -> &[u128] {
        &self.counts
    }

    #[must_use]
    pub fn count(&self, distance: usize) -> u128 {
        self.counts.get(distance).copied().unwrap_or(0)
    }

    /// `(distance, count)` for every attainable distance.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u128)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .map(|(d, &c)| (d, c))
    }

    /// Total number of permutations counted, `None` on overflow.
    #[must_use]
    pub fn total(&self) -> Option<u128> {
        self.counts.iter().try_fold(0_u128, |acc, &c| acc.checked_add(c))
    }
}

/// Build the cardinality table for `n` items under `metric`.
///
/// A `cardinalities_hint` of precomputed counts (indexed by distance) is
/// validated and used instead of enumerating.
pub fn summation_distances(
    n: usize,
    cardinalities_hint: Option<&[u128]>,
    metric: Metric,
) -> Result<CardinalityTable> {
    if n < 1 {
        return Err(Error::invalid("number of items must be at least 1"));
    }

    let counts = match cardinalities_hint {
        Some(hint) => validate_hint(n, hint, metric)?,
        None => match metric {
            Metric::Footrule => footrule_counts(n)?,
            Metric::Spearman => spearman_counts(n)?,
            Metric::Cayley => cayley_counts(n)?,
            Metric::Kendall => kendall_counts(n)?,
            Metric::Hamming => hamming_counts(n)?,
        },
    };

    debug!(n, %metric, distances = counts.len(), "built cardinality table");
    Ok(CardinalityTable { n, metric, counts })
}

/// Parse the metric by name and build its cardinality table.
pub fn compute_cardinalities(n: usize, metric: &str) -> Result<CardinalityTable> {
    summation_distances(n, None, metric.parse()?)
}

fn validate_hint(n: usize, hint: &[u128], metric: Metric) -> Result<Vec<u128>> {
    let expected = metric.max_distance(n) + 1;
    if hint.len() != expected {
        return Err(Error::invalid(format!(
            "cardinality hint has {} entries, {metric} with {n} items needs {expected}",
            hint.len()
        )));
    }
    let total = hint.iter().try_fold(0_u128, |acc, &c| acc.checked_add(c));
    if let (Some(total), Some(expected_total)) = (total, factorial(n)) {
        if total != expected_total {
            return Err(Error::invalid(format!(
                "cardinality hint sums to {total}, expected {n}! = {expected_total}"
            )));
        }
    }
    Ok(hint.to_vec())
}

fn overflow(metric: Metric, n: usize) -> Error {
    Error::NumericalInstability(format!(
        "{metric} cardinalities for {n} items overflow 128-bit counts"
    ))
}

fn add_to(slot: &mut u128, value: u128, metric: Metric, n: usize) -> Result<()> {
    *slot = slot.checked_add(value).ok_or_else(|| overflow(metric, n))?;
    Ok(())
}

/// Footrule counts by sweeping positions and ranks together.
///
/// After step `t`, position `t` and rank `t` have both been introduced. The
/// state is the number `k` of positions still waiting for a rank (equal to the
/// number of ranks still waiting for a position) and the distance so far.
/// Each open pair crosses the boundary between `t` and `t + 1`, contributing 2.
fn footrule_counts(n: usize) -> Result<Vec<u128>> {
    let metric = Metric::Footrule;
    let max = metric.max_distance(n);
    let mut dp = vec![vec![0_u128; max + 1]; n + 1];
    dp[0][0] = 1;

    for t in 0..n {
        let remaining = n - t - 1;
        let mut next = vec![vec![0_u128; max + 1]; n + 1];
        for (k, row) in dp.iter().enumerate() {
            let open_pairs = k as u128;
            // (open count after this step, number of ways)
            let mut moves = vec![
                // the new position and the new rank both stay open
                (k + 1, 1),
                // one of them closes against an open partner, or they pair up
                (k, 2 * open_pairs + 1),
            ];
            if k > 0 {
                // both close against open partners
                moves.push((k - 1, open_pairs * open_pairs));
            }

            for (d, &c) in row.iter().enumerate().filter(|(_, c)| **c > 0) {
                for &(open, ways) in moves.iter().filter(|(open, _)| *open <= remaining) {
                    let value = c.checked_mul(ways).ok_or_else(|| overflow(metric, n))?;
                    add_to(&mut next[open][d + 2 * open], value, metric, n)?;
                }
            }
        }
        dp = next;
    }

    Ok(dp.swap_remove(0))
}

/// Spearman counts by assigning ranks to positions in order, keyed by the set
/// of ranks already used.
fn spearman_counts(n: usize) -> Result<Vec<u128>> {
    let metric = Metric::Spearman;
    if n > MAX_SPEARMAN_ITEMS {
        return Err(Error::invalid(format!(
            "exact Spearman cardinalities support at most {MAX_SPEARMAN_ITEMS} items, got {n}; \
             use an importance sampling fit instead"
        )));
    }

    let full = (1_usize << n) - 1;
    let mut partial: Vec<Vec<u128>> = vec![Vec::new(); full + 1];
    partial[0] = vec![1];

    // Transitions only add bits, so ascending mask order is topological.
    for mask in 0..full {
        let current = std::mem::take(&mut partial[mask]);
        if current.is_empty() {
            continue;
        }
        let position = mask.count_ones() as usize;
        for rank in (0..n).filter(|r| mask & (1 << r) == 0) {
            let step = position.abs_diff(rank).pow(2);
            let target = &mut partial[mask | (1 << rank)];
            for (d, &c) in current.iter().enumerate().filter(|(_, c)| **c > 0) {
                let d = d + step;
                if target.len() <= d {
                    target.resize(d + 1, 0);
                }
                add_to(&mut target[d], c, metric, n)?;
            }
        }
    }

    let mut counts = std::mem::take(&mut partial[full]);
    counts.resize(metric.max_distance(n) + 1, 0);
    Ok(counts)
}

/// Cayley counts from the unsigned Stirling numbers of the first kind:
/// a permutation with `c` cycles is `n - c` transpositions away.
fn cayley_counts(n: usize) -> Result<Vec<u128>> {
    let metric = Metric::Cayley;
    // stirling[c] = number of permutations of m items with c cycles
    let mut stirling = vec![0_u128; n + 1];
    stirling[0] = 1;
    for m in 1..=n {
        for c in (1..=m).rev() {
            let stay = stirling[c]
                .checked_mul((m - 1) as u128)
                .ok_or_else(|| overflow(metric, n))?;
            stirling[c] = stirling[c - 1]
                .checked_add(stay)
                .ok_or_else(|| overflow(metric, n))?;
        }
        stirling[0] = 0;
    }
    Ok((0..n).map(|d| stirling[n - d]).collect())
}

/// Kendall counts are the Mahonian numbers, built one item at a time: the
/// `m`-th inserted item adds between 0 and `m - 1` inversions.
fn kendall_counts(n: usize) -> Result<Vec<u128>> {
    let metric = Metric::Kendall;
    let max = metric.max_distance(n);
    let mut counts = vec![0_u128; max + 1];
    counts[0] = 1;
    for m in 2..=n {
        let reach = m * (m - 1) / 2;
        let mut next = vec![0_u128; max + 1];
        // Running sum over the window counts[d - (m - 1)..=d].
        let mut window = 0_u128;
        for d in 0..=reach {
            window = window.checked_add(counts[d]).ok_or_else(|| overflow(metric, n))?;
            if d >= m {
                window -= counts[d - m];
            }
            next[d] = window;
        }
        counts = next;
    }
    Ok(counts)
}

/// Hamming counts: choose which `d` items move and derange them.
fn hamming_counts(n: usize) -> Result<Vec<u128>> {
    let metric = Metric::Hamming;
    let mut derangements = vec![0_u128; n + 1];
    derangements[0] = 1;
    for k in 2..=n {
        let sum = derangements[k - 1]
            .checked_add(derangements[k - 2])
            .ok_or_else(|| overflow(metric, n))?;
        derangements[k] = sum
            .checked_mul((k - 1) as u128)
            .ok_or_else(|| overflow(metric, n))?;
    }

    let mut counts = vec![0_u128; metric.max_distance(n) + 1];
    let mut binomial = 1_u128;
    for d in 0..=n {
        if d > 0 {
            binomial = binomial
                .checked_mul((n - d + 1) as u128)
                .ok_or_else(|| overflow(metric, n))?
                / d as u128;
        }
        if d < counts.len() {
            counts[d] = binomial
                .checked_mul(derangements[d])
                .ok_or_else(|| overflow(metric, n))?;
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;

    use super::*;
    use crate::distance::distance;
    use crate::ranking::identity;

    fn brute_force(n: usize, metric: Metric) -> Vec<u128> {
        brute_force_from(&identity(n), metric)
    }

    fn brute_force_from(reference: &[usize], metric: Metric) -> Vec<u128> {
        let n = reference.len();
        let mut counts = vec![0_u128; metric.max_distance(n) + 1];
        for perm in (1..=n).permutations(n) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let d = distance(&perm, reference, metric).unwrap() as usize;
            counts[d] += 1;
        }
        counts
    }

    #[test]
    fn tables_sum_to_n_factorial() {
        for metric in Metric::ALL {
            for n in 1..=8 {
                let table = summation_distances(n, None, metric).unwrap();
                assert_eq!(table.total(), factorial(n), "{metric} n = {n}");
            }
        }
    }

    #[test]
    fn tables_match_brute_force() {
        for metric in Metric::ALL {
            for n in 1..=7 {
                let table = summation_distances(n, None, metric).unwrap();
                assert_eq!(table.counts(), brute_force(n, metric), "{metric} n = {n}");
            }
        }
    }

    #[test]
    fn counts_do_not_depend_on_the_reference() {
        let mut rng = SmallRng::seed_from_u64(0x5EF);
        for metric in Metric::ALL {
            for n in 2..=6 {
                let table = summation_distances(n, None, metric).unwrap();
                for _ in 0..4 {
                    let mut reference = identity(n);
                    reference.shuffle(&mut rng);
                    let counts = brute_force_from(&reference, metric);
                    assert_eq!(table.counts(), counts, "{metric} n = {n} reference {reference:?}");
                    for (d, &c) in counts.iter().enumerate() {
                        assert_eq!(table.count(d), c);
                    }
                }
                assert_eq!(table.count(metric.max_distance(n) + 1), 0);
            }
        }
    }

    #[test]
    fn footrule_known_sequence() {
        // OEIS A062869, n = 4
        let table = summation_distances(4, None, Metric::Footrule).unwrap();
        let attainable: Vec<u128> = table.iter().map(|(_, c)| c).collect();
        assert_eq!(attainable, vec![1, 3, 7, 9, 4]);
    }

    #[test]
    fn large_tables_stay_consistent() {
        let footrule = summation_distances(20, None, Metric::Footrule).unwrap();
        assert_eq!(footrule.total(), factorial(20));
        let kendall = summation_distances(25, None, Metric::Kendall).unwrap();
        assert_eq!(kendall.total(), factorial(25));
        let spearman = summation_distances(10, None, Metric::Spearman).unwrap();
        assert_eq!(spearman.total(), factorial(10));
    }

    #[test]
    fn hint_is_validated() {
        let table = summation_distances(3, None, Metric::Kendall).unwrap();
        let reused = summation_distances(3, Some(table.counts()), Metric::Kendall).unwrap();
        assert_eq!(reused, table);

        let err = summation_distances(3, Some(&[1, 2, 2]), Metric::Kendall).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = summation_distances(3, Some(&[1, 2, 2, 2]), Metric::Kendall).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn rejects_zero_items_and_unknown_metric() {
        assert!(matches!(
            summation_distances(0, None, Metric::Footrule),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            compute_cardinalities(4, "ulam"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn spearman_limit() {
        assert!(matches!(
            summation_distances(MAX_SPEARMAN_ITEMS + 1, None, Metric::Spearman),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn overflow_is_reported() {
        assert!(matches!(
            summation_distances(40, None, Metric::Hamming),
            Err(Error::NumericalInstability(_))
        ));
    }
}
