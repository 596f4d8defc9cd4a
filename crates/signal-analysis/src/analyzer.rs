//! Analysis orchestrator
//!
//! One `analyze` call is the externally scheduled unit of work: it retrieves
//! candidate stocks, prompts the model, validates the output, resolves
//! company mentions against the registry and enriches survivors with prices.
//! Everything it persists references only symbols resolvable in the stock
//! registry; unresolvable mentions are dropped, not stored with null
//! references.

use crate::config::AnalyzerConfig;
use crate::error::{AnalysisError, Result};
use crate::price::PriceSource;
use crate::prompt;
use crate::store::SignalStore;
use crate::types::{
    AnalyzedNews, Impact, NewsItem, NewsTags, PricedStock, Sentiment, TradingSignal,
};
use crate::validator::{self, ModelFindings, RawNewsEntry, RawSignal};
use chrono::{DateTime, Utc};
use signal_llm::{CompletionRequest, LLMProvider, Message, StopReason};
use signal_universe::{StockRecord, StockUniverse};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const SYSTEM_PROMPT: &str = "You are a financial news analyzer.";

/// Finalized output of one analysis invocation, before persistence
#[derive(Debug, Clone, Default)]
pub struct AnalysisOutcome {
    /// Signals whose symbol resolved and price lookup succeeded
    pub signals: Vec<TradingSignal>,

    /// News entries with at least one matched, priced registry stock
    pub news: Vec<AnalyzedNews>,
}

/// Per-run persistence counts
#[derive(Debug, Clone, Copy)]
pub struct AnalysisReport {
    /// Signals persisted this run
    pub signals_persisted: usize,

    /// Analyzed news records persisted this run
    pub news_persisted: usize,
}

/// Orchestrates the news-to-signal pipeline
///
/// Explicitly constructed with its collaborators; the composition root owns
/// the lifecycle, no ambient globals.
pub struct NewsAnalyzer {
    provider: Arc<dyn LLMProvider>,
    universe: Arc<StockUniverse>,
    prices: Arc<dyn PriceSource>,
    store: Arc<dyn SignalStore>,
    config: AnalyzerConfig,
}

impl NewsAnalyzer {
    /// Create an analyzer over the given collaborators
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        universe: Arc<StockUniverse>,
        prices: Arc<dyn PriceSource>,
        store: Arc<dyn SignalStore>,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            provider,
            universe,
            prices,
            store,
            config,
        }
    }

    /// Analyze a batch of news items into finalized signals and records
    ///
    /// Model transport/auth failures are not caught here; they propagate as
    /// fatal for this invocation and are retried by the caller's scheduling
    /// policy. A malformed model response degrades to zero findings instead.
    #[instrument(skip(self, items), fields(items = items.len(), model = %self.config.model))]
    pub async fn analyze(&self, items: &[NewsItem]) -> Result<AnalysisOutcome> {
        let news_block = prompt::render_news_block(items);

        let candidates = self
            .universe
            .relevant_stocks(&news_block, self.config.top_candidates)
            .await;
        debug!("Retrieved {} candidate stocks", candidates.len());

        let analysis_prompt = prompt::build_analysis_prompt(&candidates, &news_block)?;

        let request = CompletionRequest::builder(&self.config.model)
            .system(SYSTEM_PROMPT)
            .add_message(Message::user(analysis_prompt))
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
            .build();

        let response = self.provider.complete(request).await?;
        if response.stop_reason == StopReason::MaxTokens {
            warn!(
                "Completion truncated at {} tokens; response is likely unparseable",
                self.config.max_tokens
            );
        }

        let findings = match validator::parse_model_response(response.message.text()) {
            Ok(findings) => findings,
            Err(AnalysisError::MalformedResponse(reason)) => {
                warn!("Malformed model response ({reason}), continuing with zero findings");
                ModelFindings::default()
            }
            Err(e) => return Err(e),
        };

        let mut news = Vec::new();
        for entry in &findings.news {
            if let Some(analyzed) = self.finalize_news_entry(entry).await {
                news.push(analyzed);
            }
        }

        let mut signals = Vec::new();
        for raw in &findings.signals {
            if let Some(signal) = self.finalize_signal(raw).await {
                signals.push(signal);
            }
        }

        info!(
            "Analysis produced {} signal(s) and {} news record(s)",
            signals.len(),
            news.len()
        );
        Ok(AnalysisOutcome { signals, news })
    }

    /// Analyze and persist, returning per-run counts
    pub async fn run(&self, items: &[NewsItem]) -> Result<AnalysisReport> {
        let outcome = self.analyze(items).await?;

        for signal in &outcome.signals {
            self.store.create_signal(signal).await?;
        }
        for news in &outcome.news {
            self.store.create_analyzed_news(news).await?;
        }

        Ok(AnalysisReport {
            signals_persisted: outcome.signals.len(),
            news_persisted: outcome.news.len(),
        })
    }

    /// Resolve and enrich a validated news entry; `None` drops it
    ///
    /// An entry about companies outside the tracked universe is not
    /// persisted. Per-stock price failures drop that stock; an entry whose
    /// every stock lost its price is dropped as a whole.
    async fn finalize_news_entry(&self, entry: &RawNewsEntry) -> Option<AnalyzedNews> {
        let names = self.mentioned_company_names(entry);
        let matches = dedupe_by_symbol(self.universe.find_matching_stocks(&names, None));

        if matches.is_empty() {
            debug!(
                "Dropping news entry {:?}: no mentioned company matched the universe",
                entry.title
            );
            return None;
        }

        let mut stocks = Vec::new();
        for record in &matches {
            match self.prices.latest_price(&record.symbol).await {
                Ok(price) => stocks.push(PricedStock {
                    symbol: record.symbol.clone(),
                    price,
                    company_name: record.company_name.clone(),
                    industry: record.industry.clone(),
                    isin: record.isin_code.clone(),
                    series: record.series.clone(),
                }),
                Err(e) => warn!("Dropping stock {} from news entry: {e}", record.symbol),
            }
        }

        if stocks.is_empty() {
            warn!(
                "Dropping news entry {:?}: no matched stock has a resolvable price",
                entry.title
            );
            return None;
        }

        let Some(published_at) = parse_timestamp(&entry.published_at) else {
            warn!(
                "Dropping news entry {:?}: unparseable publishedAt {:?}",
                entry.title, entry.published_at
            );
            return None;
        };

        let sectors: Vec<String> = stocks
            .iter()
            .map(|s| s.industry.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let matched_companies = matches.iter().map(|m| m.company_name.clone()).collect();

        Some(AnalyzedNews {
            title: entry.title.clone(),
            summary: entry.summary.clone(),
            content: entry.content.clone(),
            published_at,
            source: entry.source.clone(),
            url: entry.url.clone(),
            tags: NewsTags {
                sectors,
                stocks,
                sentiment: Sentiment::parse_or_default(entry.tags.sentiment.as_deref()),
                impact: Impact::parse_or_default(entry.tags.impact.as_deref()),
                key_points: entry.tags.key_points.clone(),
                financial_metrics: entry.tags.financial_metrics.clone(),
                matched_companies,
            },
        })
    }

    /// Company names mentioned by a news entry, in first-seen order
    ///
    /// Union of the model's claimed matches and the registry names behind
    /// any bare symbols it listed.
    fn mentioned_company_names(&self, entry: &RawNewsEntry) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut names = Vec::new();

        for matched in &entry.tags.matched_stocks {
            let name = matched.company_name.trim();
            if !name.is_empty() && seen.insert(name.to_lowercase()) {
                names.push(name.to_string());
            }
        }

        for symbol in &entry.tags.stocks {
            if let Some(record) = self.universe.stock_by_symbol(symbol) {
                if seen.insert(record.company_name.clone()) {
                    names.push(record.company_name.clone());
                }
            }
        }

        names
    }

    /// Resolve, type and price a validated signal; `None` drops it
    async fn finalize_signal(&self, raw: &RawSignal) -> Option<TradingSignal> {
        let Some(record) = self.universe.stock_by_symbol(&raw.symbol) else {
            debug!("Dropping signal for {}: not in the stock universe", raw.symbol);
            return None;
        };
        let symbol = record.symbol.clone();

        let Ok(kind) = raw.kind.parse() else {
            warn!("Dropping signal for {symbol}: unknown type {:?}", raw.kind);
            return None;
        };

        let Some(timestamp) = parse_timestamp(&raw.timestamp) else {
            warn!(
                "Dropping signal for {symbol}: unparseable timestamp {:?}",
                raw.timestamp
            );
            return None;
        };

        let price = match self.prices.latest_price(&symbol).await {
            Ok(price) => price,
            Err(e) => {
                warn!("Dropping signal for {symbol}: {e}");
                return None;
            }
        };

        Some(TradingSignal {
            id: Uuid::new_v4(),
            kind,
            symbol,
            price,
            timestamp,
            confidence: raw.confidence.clone(),
            reason: raw.reason.clone(),
        })
    }
}

/// Parse an ISO-8601 timestamp from model output
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Drop repeated matches for the same symbol, keeping first-seen order
fn dedupe_by_symbol(matches: Vec<StockRecord>) -> Vec<StockRecord> {
    let mut seen = BTreeSet::new();
    matches
        .into_iter()
        .filter(|m| seen.insert(m.symbol.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::MockPriceSource;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use signal_llm::{CompletionResponse, LLMError, TokenUsage};
    use signal_universe::{IndexEntry, StockRegistry, VectorBackend};
    use std::collections::BTreeMap;

    /// Provider double returning a canned response
    struct ScriptedProvider {
        response: String,
        stop_reason: StopReason,
    }

    impl ScriptedProvider {
        fn new(response: impl Into<String>) -> Self {
            Self {
                response: response.into(),
                stop_reason: StopReason::EndTurn,
            }
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> signal_llm::Result<CompletionResponse> {
            Ok(CompletionResponse {
                message: Message::assistant(self.response.clone()),
                stop_reason: self.stop_reason,
                usage: TokenUsage {
                    input_tokens: 500,
                    output_tokens: 200,
                },
            })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Provider double failing like an auth error
    struct FailingProvider;

    #[async_trait]
    impl LLMProvider for FailingProvider {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> signal_llm::Result<CompletionResponse> {
            Err(LLMError::AuthenticationFailed)
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Vector backend double; queries fail so retrieval falls back to the
    /// full registry, which is fine for orchestrator tests.
    struct OfflineBackend;

    #[async_trait]
    impl VectorBackend for OfflineBackend {
        async fn heartbeat(&self) -> signal_universe::Result<()> {
            Err(signal_universe::UniverseError::Backend("offline".to_string()))
        }

        async fn ensure_collection(
            &self,
            _name: &str,
            _metadata: &BTreeMap<String, String>,
        ) -> signal_universe::Result<String> {
            Err(signal_universe::UniverseError::Backend("offline".to_string()))
        }

        async fn count(&self, _collection_id: &str) -> signal_universe::Result<usize> {
            Err(signal_universe::UniverseError::Backend("offline".to_string()))
        }

        async fn add(
            &self,
            _collection_id: &str,
            _entries: &[IndexEntry],
        ) -> signal_universe::Result<()> {
            Err(signal_universe::UniverseError::Backend("offline".to_string()))
        }

        async fn query(
            &self,
            _collection_id: &str,
            _text: &str,
            _top_n: usize,
        ) -> signal_universe::Result<Vec<BTreeMap<String, String>>> {
            Err(signal_universe::UniverseError::Backend("offline".to_string()))
        }
    }

    fn universe() -> Arc<StockUniverse> {
        let registry = Arc::new(StockRegistry::from_records(vec![
            StockRecord {
                symbol: "RELIANCE".to_string(),
                company_name: "reliance industries".to_string(),
                industry: "oil & gas".to_string(),
                isin_code: "INE002A01018".to_string(),
                series: "EQ".to_string(),
            },
            StockRecord {
                symbol: "HDFCBANK".to_string(),
                company_name: "hdfc bank".to_string(),
                industry: "banking".to_string(),
                isin_code: "INE040A01034".to_string(),
                series: "EQ".to_string(),
            },
        ]));
        Arc::new(StockUniverse::new(registry, Arc::new(OfflineBackend)))
    }

    fn news_items() -> Vec<NewsItem> {
        vec![NewsItem {
            title: "Reliance Q4 Results".to_string(),
            summary: "Record quarterly profit".to_string(),
            content: "Reliance Industries reported record profit.".to_string(),
            published_at: Utc.with_ymd_and_hms(2024, 4, 22, 10, 30, 0).unwrap(),
            source: "Economic Times".to_string(),
            url: "https://example.com/reliance-q4".to_string(),
        }]
    }

    fn reliance_response() -> &'static str {
        r#"{
            "signals": [
                {
                    "type": "buy",
                    "symbol": "RELIANCE",
                    "confidence": "high",
                    "reason": "strong earnings",
                    "timestamp": "2024-04-22T10:35:00Z"
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
                                "company_name": "Reliance Industries Limited",
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
    }

    fn priced_source(price: f64) -> Arc<MockPriceSource> {
        let mut prices = MockPriceSource::new();
        prices
            .expect_latest_price()
            .returning(move |_| Ok(price));
        Arc::new(prices)
    }

    fn analyzer(
        provider: Arc<dyn LLMProvider>,
        prices: Arc<dyn PriceSource>,
        store: Arc<MemoryStore>,
    ) -> NewsAnalyzer {
        NewsAnalyzer::new(
            provider,
            universe(),
            prices,
            store,
            AnalyzerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_end_to_end_buy_signal_with_price() {
        let store = Arc::new(MemoryStore::new());
        let analyzer = analyzer(
            Arc::new(ScriptedProvider::new(reliance_response())),
            priced_source(2950.5),
            store.clone(),
        );

        let report = analyzer.run(&news_items()).await.expect("run");
        assert_eq!(report.signals_persisted, 1);
        assert_eq!(report.news_persisted, 1);

        let signals = store.signals().await;
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].symbol, "RELIANCE");
        assert!((signals[0].price - 2950.5).abs() < f64::EPSILON);

        let news = store.news().await;
        assert_eq!(news[0].tags.stocks.len(), 1);
        assert_eq!(news[0].tags.stocks[0].symbol, "RELIANCE");
        assert_eq!(news[0].tags.sectors, vec!["oil & gas".to_string()]);
        assert_eq!(news[0].tags.sentiment, Sentiment::Positive);
    }

    #[tokio::test]
    async fn test_malformed_response_degrades_to_empty() {
        let store = Arc::new(MemoryStore::new());
        let analyzer = analyzer(
            Arc::new(ScriptedProvider::new("I could not find any signals, sorry!")),
            priced_source(100.0),
            store.clone(),
        );

        let outcome = analyzer.analyze(&news_items()).await.expect("analyze");
        assert!(outcome.signals.is_empty());
        assert!(outcome.news.is_empty());
    }

    #[tokio::test]
    async fn test_missing_signals_key_degrades_to_empty() {
        let store = Arc::new(MemoryStore::new());
        let analyzer = analyzer(
            Arc::new(ScriptedProvider::new(r#"{"news": []}"#)),
            priced_source(100.0),
            store.clone(),
        );

        let outcome = analyzer.analyze(&news_items()).await.expect("analyze");
        assert!(outcome.signals.is_empty());
        assert!(outcome.news.is_empty());
    }

    #[tokio::test]
    async fn test_llm_failure_propagates() {
        let store = Arc::new(MemoryStore::new());
        let analyzer = analyzer(Arc::new(FailingProvider), priced_source(100.0), store);

        let result = analyzer.analyze(&news_items()).await;
        assert!(matches!(
            result,
            Err(AnalysisError::Llm(LLMError::AuthenticationFailed))
        ));
    }

    #[tokio::test]
    async fn test_unmatched_news_entry_is_dropped() {
        let response = r#"{
            "signals": [],
            "news": [
                {
                    "title": "Reliance Q4 Results",
                    "summary": "s", "content": "c",
                    "publishedAt": "2024-04-22T10:30:00Z", "source": "src", "url": "u1",
                    "tags": {"matched_stocks": [{"symbol": "RELIANCE", "company_name": "Reliance Industries", "industry": "oil & gas"}]}
                },
                {
                    "title": "Acme Rockets wins contract",
                    "summary": "s", "content": "c",
                    "publishedAt": "2024-04-22T10:30:00Z", "source": "src", "url": "u2",
                    "tags": {"matched_stocks": [{"symbol": "ACME", "company_name": "Acme Rockets", "industry": "defence"}]}
                }
            ]
        }"#;

        let store = Arc::new(MemoryStore::new());
        let analyzer = analyzer(
            Arc::new(ScriptedProvider::new(response)),
            priced_source(2950.5),
            store.clone(),
        );

        let outcome = analyzer.analyze(&news_items()).await.expect("analyze");
        // Validated list had two entries; the unmatched one is gone.
        assert_eq!(outcome.news.len(), 1);
        assert_eq!(outcome.news[0].title, "Reliance Q4 Results");
    }

    #[tokio::test]
    async fn test_signal_outside_universe_is_filtered() {
        let response = r#"{
            "signals": [
                {"type": "buy", "symbol": "RELIANCE", "reason": "r", "timestamp": "2024-04-22T10:35:00Z"},
                {"type": "sell", "symbol": "ACME", "reason": "r", "timestamp": "2024-04-22T10:35:00Z"}
            ],
            "news": []
        }"#;

        let store = Arc::new(MemoryStore::new());
        let analyzer = analyzer(
            Arc::new(ScriptedProvider::new(response)),
            priced_source(2950.5),
            store.clone(),
        );

        let outcome = analyzer.analyze(&news_items()).await.expect("analyze");
        assert_eq!(outcome.signals.len(), 1);
        assert_eq!(outcome.signals[0].symbol, "RELIANCE");
    }

    #[tokio::test]
    async fn test_price_failure_drops_signal_and_entry() {
        let mut prices = MockPriceSource::new();
        prices.expect_latest_price().returning(|symbol| {
            Err(AnalysisError::PriceUnavailable {
                symbol: symbol.to_string(),
                reason: "no quote data".to_string(),
            })
        });

        let store = Arc::new(MemoryStore::new());
        let analyzer = analyzer(
            Arc::new(ScriptedProvider::new(reliance_response())),
            Arc::new(prices),
            store.clone(),
        );

        let outcome = analyzer.analyze(&news_items()).await.expect("analyze");
        assert!(outcome.signals.is_empty());
        assert!(outcome.news.is_empty());
    }

    #[tokio::test]
    async fn test_suffixed_signal_symbol_resolves() {
        let response = r#"{
            "signals": [
                {"type": "buy", "symbol": "RELIANCE.NS", "reason": "r", "timestamp": "2024-04-22T10:35:00Z"}
            ],
            "news": []
        }"#;

        let store = Arc::new(MemoryStore::new());
        let analyzer = analyzer(
            Arc::new(ScriptedProvider::new(response)),
            priced_source(2950.5),
            store.clone(),
        );

        let outcome = analyzer.analyze(&news_items()).await.expect("analyze");
        assert_eq!(outcome.signals.len(), 1);
        // Persisted under the bare registry symbol
        assert_eq!(outcome.signals[0].symbol, "RELIANCE");
    }

    #[tokio::test]
    async fn test_truncated_completion_still_degrades() {
        let mut provider = ScriptedProvider::new(r#"{"signals": [{"type": "b"#);
        provider.stop_reason = StopReason::MaxTokens;

        let store = Arc::new(MemoryStore::new());
        let analyzer = analyzer(Arc::new(provider), priced_source(100.0), store);

        let outcome = analyzer.analyze(&news_items()).await.expect("analyze");
        assert!(outcome.signals.is_empty());
    }

    #[test]
    fn test_parse_timestamp() {
        assert!(parse_timestamp("2024-04-22T10:30:00Z").is_some());
        assert!(parse_timestamp("2024-04-22T10:30:00+05:30").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
