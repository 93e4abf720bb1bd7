pub mod config;
pub mod dataset;
pub mod reductions;
pub mod thresholds;
