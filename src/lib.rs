// Library for tests to access modules

pub mod config;
pub mod error;
pub mod ingestor;
pub mod models;
pub mod mqtt;
pub mod perf_counter;
pub mod sampler;
pub mod stat_repo;
pub mod telemetry;
