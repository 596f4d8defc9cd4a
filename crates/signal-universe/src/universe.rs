//! Facade bundling the registry, matcher and semantic index
//!
//! The orchestrator takes one `Arc<StockUniverse>` instead of three services;
//! the composition root owns construction and the connect/build lifecycle.

use crate::index::{ConnectionState, StockIndex, VectorBackend};
use crate::matcher::CompanyMatcher;
use crate::registry::{StockRecord, StockRegistry};
use crate::Result;
use std::sync::Arc;

/// The stock universe: registry, matcher and semantic index behind one handle
pub struct StockUniverse {
    registry: Arc<StockRegistry>,
    matcher: CompanyMatcher,
    index: StockIndex,
}

impl StockUniverse {
    /// Assemble the universe services over a shared registry
    pub fn new(registry: Arc<StockRegistry>, backend: Arc<dyn VectorBackend>) -> Self {
        let matcher = CompanyMatcher::new(registry.clone());
        let index = StockIndex::new(backend, registry.clone());
        Self {
            registry,
            matcher,
            index,
        }
    }

    /// The underlying registry
    pub fn registry(&self) -> &Arc<StockRegistry> {
        &self.registry
    }

    /// Establish the index backend connection (bounded retry)
    pub async fn connect(&self) -> ConnectionState {
        self.index.connect().await
    }

    /// Build the semantic index unless it already exists
    pub async fn build_if_absent(&self) -> Result<bool> {
        self.index.build_if_absent().await
    }

    /// Stocks most relevant to the given text, best first
    ///
    /// Degrades to the full registry when the index backend is unavailable.
    pub async fn relevant_stocks(&self, text: &str, top_n: usize) -> Vec<StockRecord> {
        self.index.query(text, top_n).await
    }

    /// Resolve extracted company names to registry records
    pub fn find_matching_stocks(
        &self,
        company_names: &[String],
        industries: Option<&[String]>,
    ) -> Vec<StockRecord> {
        self.matcher.find_matching_stocks(company_names, industries)
    }

    /// Exact symbol lookup with market-suffix normalization
    pub fn stock_by_symbol(&self, symbol: &str) -> Option<&StockRecord> {
        self.matcher.stock_by_symbol(symbol)
    }
}
