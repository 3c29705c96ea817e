pub mod dataset;
pub mod ensemble;
pub mod holdout;
pub mod integrity;
pub mod leagues;
pub mod metrics;
pub mod odds;
pub mod predictions;
pub mod report;
pub mod simulation;
pub mod thresholds;
