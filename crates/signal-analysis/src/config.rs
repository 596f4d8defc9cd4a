//! Configuration for analysis runs

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the news analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Model identifier passed to the LLM provider
    pub model: String,

    /// Sampling temperature; kept low for deterministic JSON output
    pub temperature: f32,

    /// Output token bound; truncated output is the dominant cause of
    /// malformed JSON, so this trades completeness for parse reliability
    pub max_tokens: usize,

    /// Candidate stocks retrieved per batch; capped low to bound prompt
    /// size and cost
    pub top_candidates: usize,

    /// Market suffix applied for price lookups (e.g. ".NS")
    pub market_suffix: String,

    /// Price cache lifetime
    pub price_cache_ttl: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            temperature: 0.1,
            max_tokens: 2000,
            top_candidates: 5,
            market_suffix: ".NS".to_string(),
            price_cache_ttl: Duration::from_secs(60),
        }
    }
}

impl AnalyzerConfig {
    /// Create a new configuration builder
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder::default()
    }

    /// Override the model from `SIGNAL_MODEL` when set
    pub fn with_env_model(mut self) -> Self {
        if let Ok(model) = std::env::var("SIGNAL_MODEL") {
            self.model = model;
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.is_empty() {
            return Err(AnalysisError::Config("model must not be empty".to_string()));
        }

        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(AnalysisError::Config(
                "temperature must be within 0.0..=1.0".to_string(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(AnalysisError::Config(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.top_candidates == 0 {
            return Err(AnalysisError::Config(
                "top_candidates must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for AnalyzerConfig
#[derive(Debug, Default)]
pub struct AnalyzerConfigBuilder {
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
    top_candidates: Option<usize>,
    market_suffix: Option<String>,
    price_cache_ttl: Option<Duration>,
}

impl AnalyzerConfigBuilder {
    /// Set the model identifier
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the output token bound
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the number of candidate stocks retrieved per batch
    pub fn top_candidates(mut self, top_candidates: usize) -> Self {
        self.top_candidates = Some(top_candidates);
        self
    }

    /// Set the market suffix for price lookups
    pub fn market_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.market_suffix = Some(suffix.into());
        self
    }

    /// Set the price cache lifetime
    pub fn price_cache_ttl(mut self, ttl: Duration) -> Self {
        self.price_cache_ttl = Some(ttl);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<AnalyzerConfig> {
        let defaults = AnalyzerConfig::default();

        let config = AnalyzerConfig {
            model: self.model.unwrap_or(defaults.model),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            top_candidates: self.top_candidates.unwrap_or(defaults.top_candidates),
            market_suffix: self.market_suffix.unwrap_or(defaults.market_suffix),
            price_cache_ttl: self.price_cache_ttl.unwrap_or(defaults.price_cache_ttl),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.top_candidates, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = AnalyzerConfig::builder()
            .model("gpt-4o-mini")
            .temperature(0.2)
            .top_candidates(10)
            .build()
            .unwrap();

        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.top_candidates, 10);
    }

    #[test]
    fn test_validation_rejects_bad_temperature() {
        let result = AnalyzerConfig::builder().temperature(1.5).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_rejects_zero_candidates() {
        let result = AnalyzerConfig::builder().top_candidates(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_rejects_zero_max_tokens() {
        let result = AnalyzerConfig::builder().max_tokens(0).build();
        assert!(result.is_err());
    }
}
