//! Bar capacity and affluence estimation over merged multi-provider venue feeds.

pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{estimator::EstimatorConfig, local::LocalStorage, toml_config::TomlConfig};

pub use core::{
    analyzer::VenueAnalyzer,
    etl::{EtlEngine, RunReport},
    pipeline::VenuePipeline,
};
pub use domain::model::{
    CapacityEstimate, CapacitySignal, Confidence, RawVenueRecord, ScoredVenue, UnifiedVenueRecord,
    VenueFailure, VenueRow,
};
pub use utils::error::{EtlError, Result};
