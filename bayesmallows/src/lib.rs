//! Bayesian inference for the Mallows rank model.
//!
//! ```
//! use std::sync::Arc;
//!
//! use bayesmallows::cardinality::summation_distances;
//! use bayesmallows::{
//!     MallowsSampler, Metric, PartitionFunctionSource, RankingMatrix, SamplerConfig,
//! };
//! use rand::SeedableRng;
//! use rand::rngs::SmallRng;
//!
//! let data = RankingMatrix::from_complete(vec![vec![1, 2, 3, 4], vec![2, 1, 3, 4]])?;
//! let table = summation_distances(4, None, Metric::Footrule)?;
//! let config = SamplerConfig { n_iterations: 100, ..SamplerConfig::default() };
//!
//! let mut sampler =
//!     MallowsSampler::new(data, Arc::new(PartitionFunctionSource::Exact(table)), config)?;
//! let chain = sampler.run(&mut SmallRng::seed_from_u64(1))?;
//! assert_eq!(chain.len(), 100);
//! # Ok::<(), bayesmallows::Error>(())
//! ```

pub mod cardinality;
pub mod config;
pub mod distance;
pub mod error;
pub mod importance;
pub mod mcmc;
pub mod metric;
pub mod models;
pub mod partition;
pub mod ranking;
pub mod run;
pub mod utils;

pub use cardinality::{CardinalityTable, compute_cardinalities};
pub use config::{AlphaProposal, SamplerConfig};
pub use distance::{compute_distance, distance};
pub use error::{Error, Result};
pub use importance::{ImportanceSamplingConfig, estimate_partition_function};
pub use metric::Metric;
pub use partition::{
    PartitionFunctionFit, PartitionFunctionSource, evaluate_log_partition_function,
    log_partition_function,
};
pub use ranking::RankingMatrix;
pub use run::{MallowsChain, MallowsSampler, ProgressInfo, StopFlag, run_sampler};
