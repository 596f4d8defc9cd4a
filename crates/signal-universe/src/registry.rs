//! Canonical stock registry loaded from reference data
//!
//! The registry is loaded once from a reference CSV at startup and shared
//! read-only across all analysis invocations. Company names and industries
//! are lowercased at load so matching downstream is case-insensitive.

use crate::error::{Result, UniverseError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Market suffix used by NSE symbols on external data feeds (e.g. "RELIANCE.NS")
pub const MARKET_SUFFIX: &str = ".NS";

/// Required columns in the reference CSV
const REQUIRED_COLUMNS: [&str; 5] = ["Symbol", "CompanyName", "Industry", "ISIN Code", "Series"];

/// A single stock in the tradable universe
///
/// Immutable once loaded; identity is the symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    /// Exchange symbol (unique, case-sensitive)
    pub symbol: String,

    /// Company name, lowercased canonical form
    pub company_name: String,

    /// Industry, lowercased
    pub industry: String,

    /// ISIN code
    pub isin_code: String,

    /// Listing series (e.g. "EQ")
    pub series: String,
}

/// In-memory registry of the stock universe
///
/// Read-only after construction; intended to be shared via `Arc`.
#[derive(Debug)]
pub struct StockRegistry {
    records: Vec<StockRecord>,
    by_symbol: HashMap<String, usize>,
}

impl StockRegistry {
    /// Load the registry from a reference CSV
    ///
    /// Fails with [`UniverseError::DataUnavailable`] when the file is missing
    /// and [`UniverseError::MissingColumn`] when a required column is absent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading stock universe from {}", path.display());

        if !path.exists() {
            return Err(UniverseError::DataUnavailable(path.display().to_string()));
        }

        let mut reader = csv::Reader::from_path(path)?;

        let headers = reader.headers()?.clone();
        let mut column_index = HashMap::new();
        for column in REQUIRED_COLUMNS {
            let idx = headers
                .iter()
                .position(|h| h.trim() == column)
                .ok_or_else(|| UniverseError::MissingColumn(column.to_string()))?;
            column_index.insert(column, idx);
        }

        let field = |record: &csv::StringRecord, column: &str| -> String {
            record
                .get(column_index[column])
                .unwrap_or_default()
                .trim()
                .to_string()
        };

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            records.push(StockRecord {
                symbol: field(&row, "Symbol"),
                company_name: field(&row, "CompanyName").to_lowercase(),
                industry: field(&row, "Industry").to_lowercase(),
                isin_code: field(&row, "ISIN Code"),
                series: field(&row, "Series"),
            });
        }

        info!("Loaded {} stocks", records.len());
        Ok(Self::from_records(records))
    }

    /// Build a registry directly from records
    ///
    /// Company names and industries are lowercased, matching [`Self::load`].
    pub fn from_records(records: Vec<StockRecord>) -> Self {
        let records: Vec<StockRecord> = records
            .into_iter()
            .map(|mut r| {
                r.company_name = r.company_name.to_lowercase();
                r.industry = r.industry.to_lowercase();
                r
            })
            .collect();

        let by_symbol = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.symbol.clone(), i))
            .collect();

        Self { records, by_symbol }
    }

    /// Look up a record by symbol
    ///
    /// The symbol is normalized by stripping the market suffix (".NS") before
    /// an exact, case-sensitive match.
    pub fn lookup(&self, symbol: &str) -> Option<&StockRecord> {
        let clean = symbol.strip_suffix(MARKET_SUFFIX).unwrap_or(symbol);
        self.by_symbol.get(clean).map(|&i| &self.records[i])
    }

    /// All records, in load order
    ///
    /// Used as the degraded fallback when semantic retrieval is unavailable.
    pub fn all(&self) -> &[StockRecord] {
        &self.records
    }

    /// Number of records in the registry
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Fixture records shared by the crate's unit tests
#[cfg(test)]
pub(crate) fn sample_records() -> Vec<StockRecord> {
    vec![
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
        StockRecord {
            symbol: "TCS".to_string(),
            company_name: "tata consultancy services".to_string(),
            industry: "information technology".to_string(),
            isin_code: "INE467B01029".to_string(),
            series: "EQ".to_string(),
        },
    ]
}
