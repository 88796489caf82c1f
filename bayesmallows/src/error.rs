use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed permutation, dimension mismatch, unknown metric or `n < 1`.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Neither a cardinality table nor a partition function fit was supplied.
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    /// A non-finite value appeared while building setup artifacts.
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    #[error("Configuration parse error: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
