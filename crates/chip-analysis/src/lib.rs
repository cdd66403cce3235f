pub mod config;
pub mod simulator;
pub mod statistics;
pub mod patterns;
pub mod profit_loss;
pub mod scoring;
pub mod report;
pub mod trend_mode;
pub mod engine;


pub use config::*;
pub use engine::*;
pub use patterns::*;
pub use profit_loss::*;
pub use report::*;
pub use scoring::*;
pub use simulator::*;
pub use statistics::{ConcentrationIndices, CostPercentiles, DistributionStatistics};
pub use trend_mode::*;
