//! Error types for the aggregation and suppression pipeline.

use thiserror::Error;

use crate::grid::{Period, ZoneId};

/// Main error type for library operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Persisted summary could not be decoded
    #[error("Protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// A record failed validation during ingestion
    #[error("Invalid record at line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Privacy level must be at least 1
    #[error("Invalid privacy level {0}: must be at least 1")]
    InvalidPrivacyLevel(u32),

    /// Persisted zone table is not a dense bijection
    #[error("Invalid zone table: {0}")]
    InvalidZoneTable(String),

    /// Forward and reverse edge sets disagree after k-core peeling
    #[error(
        "Inconsistent flow decomposition in period {period}: {} edge(s) differ between outbound and inbound graphs",
        .mismatched.len()
    )]
    InconsistentDecomposition {
        period: Period,
        mismatched: Vec<(ZoneId, ZoneId)>,
    },

    /// Input file type not recognised
    #[error("Unsupported input file: {0}")]
    UnsupportedInput(String),
}

/// Convenience type alias for library results.
pub type Result<T> = std::result::Result<T, MetricsError>;
