//! Fuzzy company-name to stock resolution
//!
//! Model output names companies in free text ("Reliance Industries Limited");
//! the matcher resolves those back to canonical registry records. Matching is
//! deliberately permissive: ambiguous containment matches are kept rather
//! than discarded, trading false positives for signal coverage.

use crate::registry::{StockRecord, StockRegistry};
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

/// Corporate suffixes stripped before matching
const CORPORATE_SUFFIXES: &str = r"\b(limited|ltd|inc|corporation|corp)\b\.?";

/// Resolves extracted company names to registry records
#[derive(Debug, Clone)]
pub struct CompanyMatcher {
    registry: Arc<StockRegistry>,
    suffix_re: Regex,
}

impl CompanyMatcher {
    /// Create a matcher over the given registry
    pub fn new(registry: Arc<StockRegistry>) -> Self {
        // The pattern is a compile-time constant; it cannot fail to parse.
        #[allow(clippy::unwrap_used)]
        let suffix_re = Regex::new(CORPORATE_SUFFIXES).unwrap();
        Self {
            registry,
            suffix_re,
        }
    }

    /// Normalize a company name for matching
    ///
    /// Lowercases, strips corporate suffixes and collapses whitespace.
    fn clean_name(&self, name: &str) -> String {
        let lowered = name.to_lowercase();
        let stripped = self.suffix_re.replace_all(&lowered, "");
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Find registry records matching the given company names
    ///
    /// For each name: exact match against the lowercased registry company
    /// names first (all rows sharing the cleaned name are emitted), falling
    /// back to case-insensitive containment in either direction. Matches are
    /// appended in input-name order. When `industries` is supplied, the
    /// accumulated list is filtered to records whose industry contains at
    /// least one of the supplied industry strings, preserving relative order.
    pub fn find_matching_stocks(
        &self,
        company_names: &[String],
        industries: Option<&[String]>,
    ) -> Vec<StockRecord> {
        let mut matches: Vec<StockRecord> = Vec::new();

        for name in company_names {
            let clean = self.clean_name(name);
            if clean.is_empty() {
                continue;
            }
            debug!("Matching company name {:?} (cleaned: {:?})", name, clean);

            let exact: Vec<&StockRecord> = self
                .registry
                .all()
                .iter()
                .filter(|r| r.company_name == clean)
                .collect();

            if !exact.is_empty() {
                debug!("{} exact match(es) for {:?}", exact.len(), clean);
                matches.extend(exact.into_iter().cloned());
                continue;
            }

            // Containment in either direction so both "reliance" and
            // "reliance industries limited and partners" resolve.
            let partial: Vec<&StockRecord> = self
                .registry
                .all()
                .iter()
                .filter(|r| r.company_name.contains(&clean) || clean.contains(&r.company_name))
                .collect();

            if partial.is_empty() {
                debug!("No matches for {:?}", clean);
            } else {
                debug!("{} partial match(es) for {:?}", partial.len(), clean);
                matches.extend(partial.into_iter().cloned());
            }
        }

        if let Some(industries) = industries {
            let industries: Vec<String> = industries.iter().map(|i| i.to_lowercase()).collect();
            matches.retain(|m| industries.iter().any(|i| m.industry.contains(i.as_str())));
            debug!("After industry filtering: {} match(es)", matches.len());
        }

        matches
    }

    /// Exact lookup by symbol, with market-suffix normalization
    pub fn stock_by_symbol(&self, symbol: &str) -> Option<&StockRecord> {
        self.registry.lookup(symbol)
    }
}
