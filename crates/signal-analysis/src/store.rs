//! Persistence seam for finalized pipeline output
//!
//! Creates are fire-and-forget with no update semantics. The task scheduler
//! dispatches at-least-once, so duplicate creates for the same story are
//! acceptable; the store does not deduplicate.

use crate::error::Result;
use crate::types::{AnalyzedNews, TradingSignal};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

/// Sink for finalized signals and analyzed news records
///
/// The production ORM lives behind this trait, out of the pipeline's scope.
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Persist a trading signal
    async fn create_signal(&self, signal: &TradingSignal) -> Result<()>;

    /// Persist an analyzed news record
    async fn create_analyzed_news(&self, news: &AnalyzedNews) -> Result<()>;
}

/// In-memory store for tests and dry runs
///
/// Also serves as the query surface for the CLI run summary.
#[derive(Default)]
pub struct MemoryStore {
    signals: RwLock<Vec<TradingSignal>>,
    news: RwLock<Vec<AnalyzedNews>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of persisted signals
    pub async fn signals(&self) -> Vec<TradingSignal> {
        self.signals.read().await.clone()
    }

    /// Snapshot of persisted analyzed news
    pub async fn news(&self) -> Vec<AnalyzedNews> {
        self.news.read().await.clone()
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn create_signal(&self, signal: &TradingSignal) -> Result<()> {
        debug!("Storing signal {} for {}", signal.id, signal.symbol);
        self.signals.write().await.push(signal.clone());
        Ok(())
    }

    async fn create_analyzed_news(&self, news: &AnalyzedNews) -> Result<()> {
        debug!("Storing analyzed news {:?}", news.title);
        self.news.write().await.push(news.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Confidence, SignalKind};
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        let signal = TradingSignal {
            id: Uuid::new_v4(),
            kind: SignalKind::Buy,
            symbol: "RELIANCE".to_string(),
            price: 2950.5,
            timestamp: Utc::now(),
            confidence: Some(Confidence::Label("high".to_string())),
            reason: "strong earnings".to_string(),
        };

        store.create_signal(&signal).await.expect("create");
        store.create_signal(&signal).await.expect("duplicate create allowed");

        let stored = store.signals().await;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].symbol, "RELIANCE");
    }
}
