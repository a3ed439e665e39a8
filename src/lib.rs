//! Scouting-statistics consolidation pipeline
//!
//! Turns per-match scouting exports into one denormalized, dimensionality-reduced
//! feature row per player: filter, engineer, aggregate, prune, reduce, join.

pub mod aggregate;
pub mod config;
pub mod correlation;
pub mod features;
pub mod filter;
pub mod identity;
pub mod io;
pub mod join;
pub mod pipeline;
pub mod plot;
pub mod reduce;
pub mod table;

pub use config::PipelineConfig;
pub use pipeline::{Pipeline, PipelineOutput, RunSummary};
pub use table::{AuxTable, CanonicalPlayer, PlayerKey, PlayerTable, RawRecord, RawTable};

use thiserror::Error;

/// Pipeline-wide errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Recoverable: only the affected derived feature is skipped.
    #[error("Cannot derive {feature}: source column '{column}' is missing")]
    MissingColumn { feature: String, column: String },

    #[error("Player '{player}' has total exposure {total}; weighted mean is undefined")]
    ZeroExposure { player: String, total: f64 },

    #[error("Player '{player}' has invalid exposure {minutes}")]
    InvalidExposure { player: String, minutes: f64 },

    #[error("Table '{table}' is missing required column '{column}'")]
    Schema { table: String, column: String },

    #[error("Player '{player}' has no finite value for '{column}'")]
    NonFinite { player: String, column: String },

    #[error("No rows left for {0}")]
    EmptyTable(&'static str),

    #[error("Cannot reduce dimensions: {0}")]
    Degenerate(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plot error: {0}")]
    Plot(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
