//! Pipeline data model
//!
//! Records that cross the API boundary (news items in, signals and analyzed
//! news out) serialize with camelCase field names to match the upstream
//! scraper and downstream API contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// A news story handed to the pipeline by the scraping layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    /// Story title
    pub title: String,

    /// Short summary or description
    #[serde(default)]
    pub summary: String,

    /// Full story content where available
    #[serde(default)]
    pub content: String,

    /// Publication timestamp
    pub published_at: DateTime<Utc>,

    /// Publishing source name
    #[serde(default)]
    pub source: String,

    /// Canonical story URL (link-based identity)
    pub url: String,
}

/// Kind of trading signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// Buy recommendation
    Buy,
    /// Sell recommendation
    Sell,
    /// Entry point recommendation
    Entry,
}

impl FromStr for SignalKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            "entry" => Ok(Self::Entry),
            other => Err(format!("unknown signal type: {other}")),
        }
    }
}

/// Signal confidence: numeric score per the prompt contract, or a
/// categorical label found in legacy model output ("high")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Confidence {
    /// Numeric score in 0..=1
    Score(f64),
    /// Categorical label
    Label(String),
}

/// A buy/sell/entry recommendation derived from news analysis
///
/// Created only after validation, symbol resolution and price lookup all
/// succeed; otherwise the signal is dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingSignal {
    /// Record id
    pub id: Uuid,

    /// Signal kind
    #[serde(rename = "type")]
    pub kind: SignalKind,

    /// Registry symbol the signal refers to
    pub symbol: String,

    /// Price at analysis time
    pub price: f64,

    /// Signal timestamp from the model output
    pub timestamp: DateTime<Utc>,

    /// Model confidence
    pub confidence: Option<Confidence>,

    /// Single-line explanation
    pub reason: String,
}

/// News sentiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    /// Parse from model output, defaulting to neutral on unknown values
    pub fn parse_or_default(s: Option<&str>) -> Self {
        match s.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("positive") => Self::Positive,
            Some("negative") => Self::Negative,
            _ => Self::Neutral,
        }
    }
}

/// Expected market impact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl Impact {
    /// Parse from model output, defaulting to medium on unknown values
    pub fn parse_or_default(s: Option<&str>) -> Self {
        match s.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("high") => Self::High,
            Some("low") => Self::Low,
            _ => Self::Medium,
        }
    }
}

/// A matched registry stock enriched with its current price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricedStock {
    /// Registry symbol
    pub symbol: String,

    /// Current price; stocks whose lookup failed are dropped, never
    /// persisted with a placeholder
    pub price: f64,

    /// Canonical company name
    pub company_name: String,

    /// Industry
    pub industry: String,

    /// ISIN code
    pub isin: String,

    /// Listing series
    pub series: String,
}

/// Structured annotations attached to an analyzed news record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsTags {
    /// Sectors derived from matched stock industries
    pub sectors: Vec<String>,

    /// Matched registry stocks with prices; invariant: only stocks present
    /// in the stock registry appear here
    pub stocks: Vec<PricedStock>,

    /// Overall sentiment
    pub sentiment: Sentiment,

    /// Expected impact
    pub impact: Impact,

    /// Key points extracted from the story
    pub key_points: Vec<String>,

    /// Financial metrics mentioned in the story
    pub financial_metrics: BTreeMap<String, String>,

    /// Company names the model mentioned and the matcher resolved
    pub matched_companies: Vec<String>,
}

/// An analyzed news story ready for persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedNews {
    /// Story title
    pub title: String,

    /// Short summary
    pub summary: String,

    /// Full content
    pub content: String,

    /// Publication timestamp
    pub published_at: DateTime<Utc>,

    /// Publishing source
    pub source: String,

    /// Canonical story URL
    pub url: String,

    /// Structured annotations
    pub tags: NewsTags,
}
