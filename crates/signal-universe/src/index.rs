//! Semantic stock index over a vector backend
//!
//! One entry per stock, keyed by symbol, with a composed searchable document
//! string and the full record as retrievable metadata. The index is built at
//! most once (check-then-build, safe to race) and thereafter only read.
//!
//! Retrieval degrades rather than fails: when the backend is unreachable the
//! index returns the full registry, unordered, with a logged warning.

use crate::error::{Result, UniverseError};
use crate::registry::{StockRecord, StockRegistry};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Collection holding the stock universe entries
pub const COLLECTION_NAME: &str = "stock_universe";

/// Connection retry attempts at `connect()` time
const CONNECT_ATTEMPTS: u32 = 3;

/// Fixed delay between connection attempts
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// A single entry to be stored in the vector index
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// Entry id (the stock symbol)
    pub id: String,

    /// Searchable document text
    pub document: String,

    /// Retrievable metadata (full stock record fields)
    pub metadata: BTreeMap<String, String>,
}

/// Black-box nearest-neighbor service over text
///
/// The embedding engine behind the index is out of scope; this trait is the
/// seam the pipeline consumes it through.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Check the backend is reachable
    async fn heartbeat(&self) -> Result<()>;

    /// Get or create a named collection, returning its id
    async fn ensure_collection(
        &self,
        name: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<String>;

    /// Number of entries in a collection
    async fn count(&self, collection_id: &str) -> Result<usize>;

    /// Bulk-insert entries into a collection
    async fn add(&self, collection_id: &str, entries: &[IndexEntry]) -> Result<()>;

    /// Query a collection by text, returning metadata maps in descending
    /// similarity order
    async fn query(
        &self,
        collection_id: &str,
        text: &str,
        top_n: usize,
    ) -> Result<Vec<BTreeMap<String, String>>>;
}

/// Connection state of the index backend
///
/// Drives the caller-visible readiness probe instead of a blocking,
/// retry-looping constructor. A `Failed` connection is cached for the
/// lifetime of the index; queries fall back to the full registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection attempted yet
    Disconnected,
    /// Connection attempt in progress
    Connecting,
    /// Connected; holds the collection id
    Connected(String),
    /// All connection attempts exhausted
    Failed,
}

/// Semantic index over the stock registry
pub struct StockIndex {
    backend: Arc<dyn VectorBackend>,
    registry: Arc<StockRegistry>,
    state: RwLock<ConnectionState>,
}

impl StockIndex {
    /// Create an index; no connection is attempted until [`Self::connect`]
    pub fn new(backend: Arc<dyn VectorBackend>, registry: Arc<StockRegistry>) -> Self {
        Self {
            backend,
            registry,
            state: RwLock::new(ConnectionState::Disconnected),
        }
    }

    /// Current connection state (readiness probe)
    pub async fn state(&self) -> ConnectionState {
        self.state.read().await.clone()
    }

    /// Establish the backend connection with bounded retry
    ///
    /// Drives Disconnected -> Connecting -> Connected or Failed with a fixed
    /// number of attempts and a fixed delay. Once Failed, the state is cached
    /// for this instance's lifetime; queries degrade instead of retrying.
    /// Concurrent callers are safe: the second observes the settled state.
    pub async fn connect(&self) -> ConnectionState {
        {
            let mut state = self.state.write().await;
            match &*state {
                ConnectionState::Connected(_) | ConnectionState::Failed => return state.clone(),
                ConnectionState::Connecting => {}
                ConnectionState::Disconnected => *state = ConnectionState::Connecting,
            }
        }

        let metadata: BTreeMap<String, String> = [(
            "description".to_string(),
            "Stock universe data for semantic search".to_string(),
        )]
        .into();

        for attempt in 1..=CONNECT_ATTEMPTS {
            let result = async {
                self.backend.heartbeat().await?;
                self.backend
                    .ensure_collection(COLLECTION_NAME, &metadata)
                    .await
            }
            .await;

            match result {
                Ok(collection_id) => {
                    info!("Connected to vector backend, collection {collection_id}");
                    let mut state = self.state.write().await;
                    *state = ConnectionState::Connected(collection_id);
                    return state.clone();
                }
                Err(e) => {
                    warn!(
                        "Attempt {attempt}/{CONNECT_ATTEMPTS} failed to connect to vector backend: {e}"
                    );
                    if attempt < CONNECT_ATTEMPTS {
                        tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                    }
                }
            }
        }

        warn!("Failed to connect to vector backend after all retries");
        let mut state = self.state.write().await;
        *state = ConnectionState::Failed;
        state.clone()
    }

    /// Build the index from the registry unless it already exists
    ///
    /// Returns `Ok(false)` without touching the backend when the collection
    /// already holds entries (idempotent; concurrent builders race safely).
    /// Otherwise inserts one entry per record in a single bulk add and
    /// returns `Ok(true)`. Storage failures surface as
    /// [`UniverseError::IndexBuild`], leaving prior state unchanged.
    pub async fn build_if_absent(&self) -> Result<bool> {
        let collection_id = match self.state().await {
            ConnectionState::Connected(id) => id,
            other => {
                return Err(UniverseError::IndexBuild(format!(
                    "vector backend not connected (state: {other:?})"
                )));
            }
        };

        let existing = self
            .backend
            .count(&collection_id)
            .await
            .map_err(|e| UniverseError::IndexBuild(e.to_string()))?;
        if existing > 0 {
            info!("Stock index already holds {existing} entries, skipping build");
            return Ok(false);
        }

        let entries: Vec<IndexEntry> = self.registry.all().iter().map(index_entry).collect();

        info!("Adding {} documents to the stock index", entries.len());
        self.backend
            .add(&collection_id, &entries)
            .await
            .map_err(|e| UniverseError::IndexBuild(e.to_string()))?;

        info!("Successfully ingested stock universe into the index");
        Ok(true)
    }

    /// Retrieve the stocks most relevant to the given text
    ///
    /// Ordered by descending semantic similarity. Never errors: when the
    /// backend is unavailable or the query fails, returns the full registry,
    /// unordered, with a logged warning (availability over precision).
    pub async fn query(&self, text: &str, top_n: usize) -> Vec<StockRecord> {
        let collection_id = match self.state().await {
            ConnectionState::Connected(id) => id,
            _ => {
                warn!("Vector backend not available, falling back to full stock list");
                return self.registry.all().to_vec();
            }
        };

        match self.backend.query(&collection_id, text, top_n).await {
            Ok(results) => {
                let stocks: Vec<StockRecord> = results
                    .iter()
                    .filter_map(|metadata| metadata.get("symbol"))
                    .filter_map(|symbol| self.registry.lookup(symbol).cloned())
                    .collect();
                debug!("Semantic query returned {} candidate stocks", stocks.len());
                stocks
            }
            Err(e) => {
                warn!("Error querying vector backend: {e}, falling back to full stock list");
                self.registry.all().to_vec()
            }
        }
    }
}

/// Compose the index entry for a stock record
fn index_entry(record: &StockRecord) -> IndexEntry {
    let metadata: BTreeMap<String, String> = [
        ("symbol".to_string(), record.symbol.clone()),
        ("company_name".to_string(), record.company_name.clone()),
        ("industry".to_string(), record.industry.clone()),
        ("isin".to_string(), record.isin_code.clone()),
        ("series".to_string(), record.series.clone()),
    ]
    .into();

    IndexEntry {
        id: record.symbol.clone(),
        document: format!(
            "{} {} {}",
            record.company_name, record.industry, record.symbol
        ),
        metadata,
    }
}
