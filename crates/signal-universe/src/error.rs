//! Error types for stock universe operations

use thiserror::Error;

/// Result type alias for universe operations
pub type Result<T> = std::result::Result<T, UniverseError>;

/// Errors that can occur in the stock universe services
#[derive(Debug, Error)]
pub enum UniverseError {
    /// Reference data missing at load; fatal for component startup
    #[error("Stock universe data unavailable: {0}")]
    DataUnavailable(String),

    /// Reference CSV is missing a required column
    #[error("Stock universe CSV missing required column: {0}")]
    MissingColumn(String),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Index build failed; prior index state is unchanged
    #[error("Index build failed: {0}")]
    IndexBuild(String),

    /// Vector backend request failed
    #[error("Vector backend error: {0}")]
    Backend(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Invalid backend URL
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
