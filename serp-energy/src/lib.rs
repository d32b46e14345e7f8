//! Energy analysis for search-engine measurement campaigns
//!
//! A measurement campaign produces two files: a session table recording when
//! each search engine was driven through a query, and a power log sampled by
//! an external logger. This crate joins them:
//!
//! - [`loader`] reads both inputs and detects the power-log format
//! - [`aggregator`] reduces the samples inside each session window to energy
//! - [`metrics`] derives duration and energy-delay products
//! - [`summary`] averages each engine across iterations
//! - [`comparator`] tests engines against each other
//! - [`report`] writes the result tables
//!
//! [`Pipeline`] wires these stages together.

pub mod aggregator;
pub mod comparator;
pub mod config;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod samples;
pub mod summary;

pub use comparator::{ComparisonReport, NormalityRecord, PairwiseComparison};
pub use config::{AnalysisConfig, Config, PathsConfig};
pub use error::{Error, Result};
pub use model::{EngineSummary, IntervalResult, Metric, SampleTrace, SessionRecord};
pub use pipeline::{Pipeline, PipelineOutput};
pub use samples::{EnergyFormat, SampleTable};
