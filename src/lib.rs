pub mod config;
pub mod confidence;
pub mod estimate;
pub mod fetch;
pub mod fusion;
pub mod level;
pub mod output;
pub mod prior;
pub mod report;
pub mod store;
pub mod synth;

pub use config::{FusionConfig, Weights};
pub use estimate::{EstimateRequest, Estimator, FusionResult};
pub use report::{PartitionKey, Report, Source};
