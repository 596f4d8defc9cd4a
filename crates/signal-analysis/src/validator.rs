//! Validation and repair of raw model output
//!
//! The model's response is untrusted text. This module strips wrapping
//! artifacts (code fences), parses the remainder as JSON and enforces the
//! schema contract: top-level `signals` and `news` arrays, string-typed
//! required fields, no embedded line breaks.
//!
//! Policy: any per-field violation rejects the entire batch. Dropping only
//! the offending entry would let partially-malformed output flow downstream
//! unnoticed; zero findings for a round is the safer failure mode.

use crate::error::{AnalysisError, Result};
use crate::types::Confidence;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Strictly-typed intermediate parsed from a raw model response
#[derive(Debug, Clone, Default)]
pub struct ModelFindings {
    /// Validated signal entries
    pub signals: Vec<RawSignal>,

    /// Validated news entries
    pub news: Vec<RawNewsEntry>,
}

/// A signal entry as the model emitted it, before symbol resolution
#[derive(Debug, Clone)]
pub struct RawSignal {
    /// Signal type string ("buy", "sell", "entry")
    pub kind: String,

    /// Symbol as emitted by the model
    pub symbol: String,

    /// Model confidence, when present
    pub confidence: Option<Confidence>,

    /// Single-line explanation
    pub reason: String,

    /// ISO-8601 timestamp string
    pub timestamp: String,
}

/// A news entry as the model emitted it, before company matching
#[derive(Debug, Clone)]
pub struct RawNewsEntry {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub published_at: String,
    pub source: String,
    pub url: String,

    /// Advisory tags; re-derived during matching, lenient parse
    pub tags: RawTags,
}

/// Advisory tag block attached to a news entry
///
/// Tags guide company matching but are re-derived before persistence, so
/// they parse leniently with defaults instead of failing the batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTags {
    /// Symbols the model claims are mentioned
    #[serde(default)]
    pub stocks: Vec<String>,

    /// Companies the model mapped to the provided candidate list
    #[serde(default)]
    pub matched_stocks: Vec<RawMatchedStock>,

    /// Sentiment string ("positive"/"negative"/"neutral")
    #[serde(default)]
    pub sentiment: Option<String>,

    /// Impact string ("high"/"medium"/"low")
    #[serde(default)]
    pub impact: Option<String>,

    /// Key points extracted from the story
    #[serde(default)]
    pub key_points: Vec<String>,

    /// Financial metrics mentioned in the story
    #[serde(default)]
    pub financial_metrics: BTreeMap<String, String>,
}

/// A company-to-stock mapping the model claims
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMatchedStock {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub industry: String,
}

/// Parse and validate a raw model response
///
/// Fails with [`AnalysisError::MalformedResponse`] when the text is not
/// valid JSON after fence stripping, the top-level shape is not an object,
/// `signals`/`news` are absent or not arrays, or any entry violates the
/// per-field contract (whole-batch rejection).
pub fn parse_model_response(raw: &str) -> Result<ModelFindings> {
    let cleaned = strip_code_fences(raw);

    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| AnalysisError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let object = value
        .as_object()
        .ok_or_else(|| AnalysisError::MalformedResponse("response is not an object".to_string()))?;

    let signals = object
        .get("signals")
        .ok_or_else(|| AnalysisError::MalformedResponse("missing signals key".to_string()))?
        .as_array()
        .ok_or_else(|| AnalysisError::MalformedResponse("signals is not an array".to_string()))?;

    let news = object
        .get("news")
        .ok_or_else(|| AnalysisError::MalformedResponse("missing news key".to_string()))?
        .as_array()
        .ok_or_else(|| AnalysisError::MalformedResponse("news is not an array".to_string()))?;

    let signals = signals
        .iter()
        .map(parse_signal)
        .collect::<Result<Vec<_>>>()?;

    let news = news.iter().map(parse_news_entry).collect::<Result<Vec<_>>>()?;

    debug!(
        "Validated model response: {} signal(s), {} news entr(ies)",
        signals.len(),
        news.len()
    );

    Ok(ModelFindings { signals, news })
}

/// Strip leading/trailing markdown code fences the model wraps JSON in
fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Extract a required single-line string field from an entry
fn required_string(entry: &Value, field: &str, context: &str) -> Result<String> {
    let value = entry.get(field).and_then(Value::as_str).ok_or_else(|| {
        AnalysisError::MalformedResponse(format!("invalid type for {context} field {field}"))
    })?;

    if value.contains('\n') {
        return Err(AnalysisError::MalformedResponse(format!(
            "line break found in {context} field {field}"
        )));
    }

    Ok(value.to_string())
}

fn parse_signal(entry: &Value) -> Result<RawSignal> {
    let confidence = entry
        .get("confidence")
        .cloned()
        .and_then(|v| serde_json::from_value::<Confidence>(v).ok());

    Ok(RawSignal {
        kind: required_string(entry, "type", "signal")?,
        symbol: required_string(entry, "symbol", "signal")?,
        confidence,
        reason: required_string(entry, "reason", "signal")?,
        timestamp: required_string(entry, "timestamp", "signal")?,
    })
}

fn parse_news_entry(entry: &Value) -> Result<RawNewsEntry> {
    // Advisory: a malformed tag block degrades to defaults, it does not
    // reject the batch.
    let tags = entry
        .get("tags")
        .cloned()
        .and_then(|v| serde_json::from_value::<RawTags>(v).ok())
        .unwrap_or_default();

    Ok(RawNewsEntry {
        title: required_string(entry, "title", "news")?,
        summary: required_string(entry, "summary", "news")?,
        content: required_string(entry, "content", "news")?,
        published_at: required_string(entry, "publishedAt", "news")?,
        source: required_string(entry, "source", "news")?,
        url: required_string(entry, "url", "news")?,
        tags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_response() -> String {
        r#"{
            "signals": [
                {
                    "type": "buy",
                    "symbol": "RELIANCE",
                    "confidence": 0.9,
                    "reason": "strong earnings",
                    "timestamp": "2024-04-22T10:30:00Z"
                }
            ],
            "news": [
                {
                    "title": "Reliance Q4 Results",
                    "summary": "Record quarterly profit",
                    "content": "Reliance Industries reported record profit.",
                    "publishedAt": "2024-04-22T10:30:00Z",
                    "source": "Economic Times",
                    "url": "https://example.com/reliance-q4",
                    "tags": {
                        "stocks": ["RELIANCE"],
                        "matched_stocks": [
                            {
                                "symbol": "RELIANCE",
                                "company_name": "reliance industries",
                                "industry": "oil & gas"
                            }
                        ],
                        "sentiment": "positive",
                        "impact": "high",
                        "key_points": ["record profit"],
                        "financial_metrics": {"profit": "21k crore"}
                    }
                }
            ]
        }"#
        .to_string()
    }

    #[test]
    fn test_valid_response() {
        let findings = parse_model_response(&valid_response()).expect("parse");
        assert_eq!(findings.signals.len(), 1);
        assert_eq!(findings.news.len(), 1);

        let signal = &findings.signals[0];
        assert_eq!(signal.kind, "buy");
        assert_eq!(signal.symbol, "RELIANCE");
        assert_eq!(signal.confidence, Some(Confidence::Score(0.9)));

        let entry = &findings.news[0];
        assert_eq!(entry.tags.matched_stocks[0].company_name, "reliance industries");
        assert_eq!(entry.tags.sentiment.as_deref(), Some("positive"));
    }

    #[test]
    fn test_strips_code_fences() {
        let fenced = format!("```json\n{}\n```", valid_response());
        let findings = parse_model_response(&fenced).expect("parse");
        assert_eq!(findings.signals.len(), 1);

        let bare_fence = format!("```\n{}\n```", valid_response());
        assert!(parse_model_response(&bare_fence).is_ok());
    }

    #[test]
    fn test_invalid_json() {
        let result = parse_model_response("not json at all");
        assert!(matches!(result, Err(AnalysisError::MalformedResponse(_))));
    }

    #[test]
    fn test_top_level_not_object() {
        let result = parse_model_response("[1, 2, 3]");
        assert!(matches!(result, Err(AnalysisError::MalformedResponse(m)) if m.contains("not an object")));
    }

    #[test]
    fn test_missing_signals_key() {
        let result = parse_model_response(r#"{"news": []}"#);
        assert!(matches!(result, Err(AnalysisError::MalformedResponse(m)) if m.contains("signals")));
    }

    #[test]
    fn test_missing_news_key() {
        let result = parse_model_response(r#"{"signals": []}"#);
        assert!(matches!(result, Err(AnalysisError::MalformedResponse(m)) if m.contains("news")));
    }

    #[test]
    fn test_signals_not_an_array() {
        let result = parse_model_response(r#"{"signals": {}, "news": []}"#);
        assert!(matches!(result, Err(AnalysisError::MalformedResponse(m)) if m.contains("array")));
    }

    #[test]
    fn test_non_string_field_rejects_batch() {
        let raw = r#"{
            "signals": [{"type": "buy", "symbol": 42, "reason": "r", "timestamp": "t"}],
            "news": []
        }"#;
        let result = parse_model_response(raw);
        assert!(matches!(result, Err(AnalysisError::MalformedResponse(m)) if m.contains("symbol")));
    }

    #[test]
    fn test_embedded_line_break_rejects_batch() {
        let raw = r#"{
            "signals": [{"type": "buy", "symbol": "RELIANCE", "reason": "line one\nline two", "timestamp": "t"}],
            "news": []
        }"#;
        let result = parse_model_response(raw);
        assert!(matches!(result, Err(AnalysisError::MalformedResponse(m)) if m.contains("line break")));
    }

    #[test]
    fn test_one_bad_entry_rejects_whole_batch() {
        let raw = r#"{
            "signals": [
                {"type": "buy", "symbol": "RELIANCE", "reason": "ok", "timestamp": "2024-04-22T10:30:00Z"},
                {"type": "sell", "symbol": "TCS", "reason": "ok", "timestamp": null}
            ],
            "news": []
        }"#;
        assert!(parse_model_response(raw).is_err());
    }

    #[test]
    fn test_missing_tags_defaults() {
        let raw = r#"{
            "signals": [],
            "news": [{
                "title": "t", "summary": "s", "content": "c",
                "publishedAt": "2024-04-22T10:30:00Z", "source": "src", "url": "u"
            }]
        }"#;
        let findings = parse_model_response(raw).expect("parse");
        assert!(findings.news[0].tags.stocks.is_empty());
        assert!(findings.news[0].tags.matched_stocks.is_empty());
    }

    #[test]
    fn test_malformed_tags_degrade_to_defaults() {
        let raw = r#"{
            "signals": [],
            "news": [{
                "title": "t", "summary": "s", "content": "c",
                "publishedAt": "2024-04-22T10:30:00Z", "source": "src", "url": "u",
                "tags": {"financial_metrics": {"profit": 21000}}
            }]
        }"#;
        let findings = parse_model_response(raw).expect("parse");
        assert!(findings.news[0].tags.financial_metrics.is_empty());
    }

    #[test]
    fn test_empty_arrays_are_valid() {
        let findings = parse_model_response(r#"{"signals": [], "news": []}"#).expect("parse");
        assert!(findings.signals.is_empty());
        assert!(findings.news.is_empty());
    }
}
