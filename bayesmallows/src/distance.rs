//! Distances between rankings.
//!
//! Footrule, Spearman and Hamming are O(n). Cayley is O(n) via cycle counting.
//! Kendall counts inversions with a merge sort in O(n log n); the naive pair
//! scan is O(n²).

use crate::error::{Error, Result};
use crate::metric::Metric;
use crate::ranking::validate_permutation;

/// Distance between two complete rankings of the same items.
pub fn distance(r1: &[usize], r2: &[usize], metric: Metric) -> Result<f64> {
    if r1.len() != r2.len() {
        return Err(Error::invalid(format!(
            "rankings have different lengths ({} and {})",
            r1.len(),
            r2.len()
        )));
    }
    validate_permutation(r1)?;
    validate_permutation(r2)?;
    Ok(distance_unchecked(r1, r2, metric))
}

/// Parse the metric by name and compute the distance.
pub fn compute_distance(r1: &[usize], r2: &[usize], metric: &str) -> Result<f64> {
    distance(r1, r2, metric.parse()?)
}

/// Distance without validating the inputs.
///
/// Both slices must be permutations of `1..=n` of equal length.
#[must_use]
pub(crate) fn distance_unchecked(r1: &[usize], r2: &[usize], metric: Metric) -> f64 {
    match metric {
        Metric::Footrule | Metric::Spearman | Metric::Hamming => r1
            .iter()
            .zip(r2)
            .map(|(&a, &b)| metric.item_term(a, b))
            .sum(),
        #[allow(clippy::cast_precision_loss)]
        Metric::Cayley => cayley(r1, r2) as f64,
        #[allow(clippy::cast_precision_loss)]
        Metric::Kendall => kendall(r1, r2) as f64,
    }
}

fn cayley(r1: &[usize], r2: &[usize]) -> usize {
    let n = r1.len();
    // sigma sends rank r1[i] to rank r2[i]
    let mut sigma = vec![0; n];
    for (&a, &b) in r1.iter().zip(r2) {
        sigma[a - 1] = b - 1;
    }

    let mut visited = vec![false; n];
    let mut cycles = 0;
    for start in 0..n {
        if visited[start] {
            continue;
        }
        cycles += 1;
        let mut k = start;
        while !visited[k] {
            visited[k] = true;
            k = sigma[k];
        }
    }
    n - cycles
}

fn kendall(r1: &[usize], r2: &[usize]) -> usize {
    // Read r2 in the order r1 ranks the items; discordant pairs are inversions.
    let mut seq = vec![0; r1.len()];
    for (&a, &b) in r1.iter().zip(r2) {
        seq[a - 1] = b;
    }
    let mut buf = vec![0; seq.len()];
    count_inversions(&mut seq, &mut buf)
}

fn count_inversions(xs: &mut [usize], buf: &mut [usize]) -> usize {
    let n = xs.len();
    if n < 2 {
        return 0;
    }
    let mid = n / 2;
    let mut count = {
        let (left, right) = xs.split_at_mut(mid);
        let (buf_left, buf_right) = buf.split_at_mut(mid);
        count_inversions(left, buf_left) + count_inversions(right, buf_right)
    };

    let (mut i, mut j, mut k) = (0, mid, 0);
    while i < mid && j < n {
        if xs[i] <= xs[j] {
            buf[k] = xs[i];
            i += 1;
        } else {
            buf[k] = xs[j];
            count += mid - i;
            j += 1;
        }
        k += 1;
    }
    buf[k..k + mid - i].copy_from_slice(&xs[i..mid]);
    k += mid - i;
    buf[k..n].copy_from_slice(&xs[j..n]);
    xs.copy_from_slice(&buf[..n]);
    count
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use proptest::prelude::*;

    use super::*;
    use crate::ranking::identity;

    fn naive_kendall(r1: &[usize], r2: &[usize]) -> usize {
        (0..r1.len())
            .tuple_combinations()
            .filter(|&(i, j)| (r1[i] < r1[j]) != (r2[i] < r2[j]))
            .count()
    }

    fn permutation(n: usize) -> impl Strategy<Value = Vec<usize>> {
        Just(identity(n)).prop_shuffle()
    }

    fn permutation_pair() -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
        (1_usize..30).prop_flat_map(|n| (permutation(n), permutation(n)))
    }

    #[test]
    fn known_values() {
        let a = [1, 2, 3, 4, 5];
        let b = [5, 4, 3, 2, 1];
        assert_eq!(distance(&a, &b, Metric::Footrule).unwrap(), 12.0);
        assert_eq!(distance(&a, &b, Metric::Spearman).unwrap(), 40.0);
        assert_eq!(distance(&a, &b, Metric::Kendall).unwrap(), 10.0);
        assert_eq!(distance(&a, &b, Metric::Hamming).unwrap(), 4.0);
        // (1 5)(2 4)(3)
        assert_eq!(distance(&a, &b, Metric::Cayley).unwrap(), 2.0);
    }

    #[test]
    fn three_cycle_needs_two_transpositions() {
        assert_eq!(distance(&[2, 3, 1], &[1, 2, 3], Metric::Cayley).unwrap(), 2.0);
        assert_eq!(distance(&[2, 1, 3], &[1, 2, 3], Metric::Cayley).unwrap(), 1.0);
    }

    #[test]
    fn rejects_length_mismatch() {
        let err = distance(&[1, 2, 3], &[1, 2], Metric::Footrule).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn rejects_non_permutation() {
        let err = distance(&[1, 2, 2], &[1, 2, 3], Metric::Kendall).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn parses_metric_name() {
        assert_eq!(compute_distance(&[2, 1], &[1, 2], "footrule").unwrap(), 2.0);
        assert!(compute_distance(&[2, 1], &[1, 2], "manhattan").is_err());
    }

    proptest! {
        #[test]
        fn distance_to_self_is_zero(p in (1_usize..30).prop_flat_map(permutation)) {
            for metric in Metric::ALL {
                prop_assert_eq!(distance(&p, &p, metric).unwrap(), 0.0);
            }
        }

        #[test]
        fn distance_is_symmetric((a, b) in permutation_pair()) {
            for metric in Metric::ALL {
                prop_assert_eq!(
                    distance(&a, &b, metric).unwrap(),
                    distance(&b, &a, metric).unwrap()
                );
            }
        }

        #[test]
        fn kendall_matches_pair_scan((a, b) in permutation_pair()) {
            #[allow(clippy::cast_precision_loss)]
            let naive = naive_kendall(&a, &b) as f64;
            prop_assert_eq!(distance(&a, &b, Metric::Kendall).unwrap(), naive);
        }

        #[test]
        fn distance_is_invariant_under_relabelling((a, b) in permutation_pair()) {
            // Relabelling the ranks of both rankings the same way leaves the
            // distance unchanged for every metric.
            let n = a.len();
            let relabel: Vec<usize> = (1..=n).rev().collect();
            let a2: Vec<usize> = a.iter().map(|&r| relabel[r - 1]).collect();
            let b2: Vec<usize> = b.iter().map(|&r| relabel[r - 1]).collect();
            for metric in Metric::ALL {
                prop_assert_eq!(
                    distance(&a, &b, metric).unwrap(),
                    distance(&a2, &b2, metric).unwrap()
                );
            }
        }

        #[test]
        fn distance_is_within_bounds((a, b) in permutation_pair()) {
            for metric in Metric::ALL {
                let d = distance(&a, &b, metric).unwrap();
                #[allow(clippy::cast_precision_loss)]
                let max = metric.max_distance(a.len()) as f64;
                prop_assert!(d >= 0.0 && d <= max);
            }
        }
    }
}
