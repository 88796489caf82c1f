pub mod mallows;

/// A model scored against data through a likelihood and a prior.
pub trait Model<D> {
    /// Log likelihood of `data` under the model's current parameters.
    fn ln_likelihood(&self, data: &D) -> f64;

    /// Log prior density of the model's current parameters.
    fn ln_prior(&self) -> f64;

    /// Unnormalized log posterior.
    ///
    /// Arguments
    /// =========
    ///
    /// * `data` - The data to which the model is being applied.
    fn ln_score(&self, data: &D) -> f64 {
        self.ln_likelihood(data) + self.ln_prior()
    }
}
