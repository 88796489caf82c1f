/// Prevent the inner value from being verbosely / pretty printed during a debug.
pub(crate) struct NoPrettyPrint<T: std::fmt::Debug>(pub T);

impl<T: std::fmt::Debug> std::fmt::Debug for NoPrettyPrint<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Prevent "{:#?}" from being used.
        write!(f, "{:?}", self.0)
    }
}

/// `n!`, or `None` when it does not fit in a `u128` (n > 34).
#[must_use]
pub fn factorial(n: usize) -> Option<u128> {
    (1..=n).try_fold(1_u128, |acc, k| acc.checked_mul(k as u128))
}

/// `ln(n!)`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ln_factorial(n: usize) -> f64 {
    (2..=n).map(|k| (k as f64).ln()).sum()
}

/// Online Mean and Variance
#[derive(Default, Clone, Copy, Debug)]
pub struct MeanAndVariance {
    count: usize,
    mean: f64,
    m2: f64,
}

impl MeanAndVariance {
    #[must_use]
    pub fn update(self, new_value: f64) -> Self {
        let count = self.count + 1;
        let delta = new_value - self.mean;
        #[allow(clippy::cast_precision_loss)]
        let mean = self.mean + delta / (count as f64);
        let delta2 = new_value - mean;
        let m2 = delta.mul_add(delta2, self.m2);

        Self { count, mean, m2 }
    }

    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    /// Unbiased sample variance; zero for fewer than two observations.
    #[must_use]
    pub fn sample_variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let denom = (self.count - 1) as f64;
        self.m2 / denom
    }
}

impl FromIterator<f64> for MeanAndVariance {
    fn from_iter<T: IntoIterator<Item = f64>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::default(), |acc, x| acc.update(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_factorials() {
        assert_eq!(factorial(0), Some(1));
        assert_eq!(factorial(5), Some(120));
        assert_eq!(factorial(34).map(|f| f > 0), Some(true));
        assert_eq!(factorial(35), None);
    }

    #[test]
    fn ln_factorial_matches_factorial() {
        #[allow(clippy::cast_precision_loss)]
        let exact = (factorial(12).unwrap() as f64).ln();
        assert::close(ln_factorial(12), exact, 1e-10);
        assert::close(ln_factorial(0), 0.0, 1e-12);
    }

    #[test]
    fn mean_and_variance() {
        let mv: MeanAndVariance = [1.0, 2.0, 3.0, 4.0].into_iter().collect();
        assert_eq!(mv.count(), 4);
        assert::close(mv.mean(), 2.5, 1e-12);
        assert::close(mv.sample_variance(), 5.0 / 3.0, 1e-12);
    }
}
