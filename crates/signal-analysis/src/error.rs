//! Error types for the analysis pipeline

use thiserror::Error;

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors that can occur in the news analysis pipeline
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Model output failed schema validation; non-fatal, the orchestrator
    /// substitutes empty findings
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    /// Price lookup failed for a symbol; non-fatal, the affected entry is
    /// dropped rather than persisted with a placeholder
    #[error("Price unavailable for {symbol}: {reason}")]
    PriceUnavailable { symbol: String, reason: String },

    /// Language model transport or auth failure; fatal for the invocation,
    /// surfaced to the scheduling layer's retry policy
    #[error("LLM error: {0}")]
    Llm(#[from] signal_llm::LLMError),

    /// Prompt template rendering error
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Persistence failure; fatal for the run
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
