//! News-to-signal analysis pipeline
//!
//! This crate turns raw financial news into persisted trading signals and
//! annotated news records:
//!
//! 1. candidate stocks are retrieved semantically from the universe
//! 2. a fixed-template prompt embeds candidates and news text
//! 3. the language model's raw output is validated against a strict schema
//! 4. extracted company mentions are resolved back to the stock registry
//! 5. surviving records are enriched with live prices and persisted
//!
//! Model output is treated as adversarial input: any schema violation rejects
//! the whole batch and the pipeline degrades to zero findings rather than
//! persisting partially-malformed data.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod price;
pub mod prompt;
pub mod store;
pub mod types;
pub mod validator;

pub use analyzer::{AnalysisOutcome, AnalysisReport, NewsAnalyzer};
pub use config::{AnalyzerConfig, AnalyzerConfigBuilder};
pub use error::{AnalysisError, Result};
pub use price::{PriceSource, YahooPriceSource};
pub use store::{MemoryStore, SignalStore};
pub use types::{
    AnalyzedNews, Confidence, Impact, NewsItem, NewsTags, PricedStock, Sentiment, SignalKind,
    TradingSignal,
};
pub use validator::{parse_model_response, ModelFindings, RawNewsEntry, RawSignal, RawTags};
