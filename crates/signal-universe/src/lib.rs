//! Stock universe services for the news signal pipeline
//!
//! This crate owns the canonical set of tradable symbols the pipeline is
//! permitted to reason about, and the three services built on top of it:
//!
//! - [`StockRegistry`]: immutable registry of stock records loaded from a
//!   reference CSV, with suffix-normalizing symbol lookup
//! - [`CompanyMatcher`]: fuzzy resolution of extracted company names back to
//!   registry records
//! - [`StockIndex`]: semantic nearest-neighbor retrieval of candidate stocks
//!   over a vector backend, with a full-registry degraded fallback
//!
//! [`StockUniverse`] bundles the three behind one facade for the orchestrator.

pub mod chroma;
pub mod error;
pub mod index;
pub mod matcher;
pub mod registry;
pub mod universe;

pub use chroma::ChromaBackend;
pub use error::{Result, UniverseError};
pub use index::{ConnectionState, IndexEntry, StockIndex, VectorBackend};
pub use matcher::CompanyMatcher;
pub use registry::{StockRecord, StockRegistry};
pub use universe::StockUniverse;
