//! Reconciliation: the fuzzy join of directory metadata onto quote rows.
//!
//! Directory symbols are not guaranteed to match quote-table symbols
//! byte-for-byte for the same instrument (suffix, case, punctuation). Each
//! directory entry is matched against the full primary symbol set with a
//! string-similarity strategy; the single best candidate at or above the
//! acceptance threshold receives the entry's descriptive fields.
//!
//! Matching is many-directory-entries-to-one-quote-row in the worst case: a
//! later entry's match overwrites an earlier merge for the same key. That is
//! the documented behavior of this join, kept as-is.

use std::collections::BTreeMap;

use tracing::debug;

use crate::models::{QuoteRow, StockRecord, SymbolInfo};

/// Minimum similarity for a directory entry to merge onto a quote row.
pub const MATCH_THRESHOLD: f64 = 0.6;

/// String-similarity strategy over symbol pairs.
///
/// Scores are in `[0.0, 1.0]`, 1.0 meaning identical. Injectable so the
/// join can be unit-tested with controlled scores and tie-break inputs.
pub trait SymbolSimilarity: Send + Sync {
    /// Score the similarity of a directory symbol against a quote symbol.
    fn score(&self, reference: &str, primary: &str) -> f64;
}

/// Default similarity: Jaro-Winkler, which favors shared prefixes — a good
/// fit for ticker variants like `ABC` / `ABC1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JaroWinkler;

impl SymbolSimilarity for JaroWinkler {
    fn score(&self, reference: &str, primary: &str) -> f64 {
        strsim::jaro_winkler(reference, primary)
    }
}

/// Joins directory entries onto quote rows.
pub struct Reconciler {
    similarity: Box<dyn SymbolSimilarity>,
    threshold: f64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(Box::new(JaroWinkler), MATCH_THRESHOLD)
    }
}

impl Reconciler {
    /// Build a reconciler with an explicit strategy and threshold.
    #[must_use]
    pub fn new(similarity: Box<dyn SymbolSimilarity>, threshold: f64) -> Self {
        Self {
            similarity,
            threshold,
        }
    }

    /// Merge directory entries into the quote rows.
    ///
    /// Output keys are exactly the input quote keys: no record is fabricated
    /// and none is dropped. Quote rows with no accepted match keep empty
    /// descriptive fields. Deterministic for a given input: quote symbols
    /// are scanned in map order and ties on the best score keep the first
    /// candidate seen.
    #[must_use]
    pub fn reconcile(
        &self,
        quotes: BTreeMap<String, QuoteRow>,
        directory: &[SymbolInfo],
    ) -> BTreeMap<String, StockRecord> {
        let mut records: BTreeMap<String, StockRecord> = quotes
            .into_iter()
            .map(|(symbol, quote)| (symbol, StockRecord::from_quote(quote)))
            .collect();

        for info in directory {
            let Some(matched) = self.best_match(&info.symbol, &records) else {
                continue;
            };

            // A later directory entry may re-match a key an earlier one
            // already merged into; the newer entry wins.
            if let Some(record) = records.get_mut(&matched) {
                if !record.name.is_empty() {
                    debug!(
                        symbol = %matched,
                        reference = %info.symbol,
                        "Reference merge overwrites an earlier match"
                    );
                }
                record.apply_reference(info);
            }
        }

        records
    }

    /// Best-scoring quote symbol at or above the threshold, if any.
    fn best_match(
        &self,
        reference: &str,
        records: &BTreeMap<String, StockRecord>,
    ) -> Option<String> {
        let mut best: Option<(&str, f64)> = None;

        for symbol in records.keys() {
            let score = self.similarity.score(reference, symbol);
            // Strict comparison: the first candidate in map order wins ties.
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((symbol, score));
            }
        }

        best.and_then(|(symbol, score)| {
            (score >= self.threshold).then(|| symbol.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(symbol: &str) -> QuoteRow {
        QuoteRow {
            symbol: symbol.to_string(),
            sector: "0801".to_string(),
            listed_in: "KSE100".to_string(),
            ldcp: "100.00".to_string(),
            open: "100.50".to_string(),
            high: "102.00".to_string(),
            low: "99.80".to_string(),
            current: "101.50".to_string(),
            change: "1.50".to_string(),
            change_percent: "1.5%".to_string(),
            volume: "1,250,000".to_string(),
        }
    }

    fn quotes(symbols: &[&str]) -> BTreeMap<String, QuoteRow> {
        symbols
            .iter()
            .map(|s| ((*s).to_string(), quote(s)))
            .collect()
    }

    fn info(symbol: &str, name: &str) -> SymbolInfo {
        serde_json::from_value(serde_json::json!({
            "symbol": symbol,
            "name": name,
            "sectorName": "Power",
            "isETF": false,
            "isDebt": false,
        }))
        .unwrap()
    }

    /// Scorer returning fixed values keyed by (reference, primary).
    struct FixedScores(Vec<((&'static str, &'static str), f64)>);

    impl SymbolSimilarity for FixedScores {
        fn score(&self, reference: &str, primary: &str) -> f64 {
            self.0
                .iter()
                .find(|((r, p), _)| *r == reference && *p == primary)
                .map_or(0.0, |(_, s)| *s)
        }
    }

    #[test]
    fn close_variant_merges_onto_quote_symbol() {
        let reconciler = Reconciler::default();
        let records = reconciler.reconcile(quotes(&["ABC"]), &[info("ABC1", "ABC Corp")]);

        let abc = &records["ABC"];
        assert_eq!(abc.name, "ABC Corp");
        assert_eq!(abc.sector_name, "Power");
        assert_eq!(abc.is_etf, "false");
        // Quote fields untouched.
        assert_eq!(abc.current, "101.50");
    }

    #[test]
    fn unrelated_entry_leaves_fields_empty() {
        let reconciler = Reconciler::default();
        let records = reconciler.reconcile(quotes(&["KAPCO"]), &[info("ZZZ", "Unrelated")]);

        let kapco = &records["KAPCO"];
        assert!(kapco.name.is_empty());
        assert!(kapco.sector_name.is_empty());
        assert!(kapco.is_etf.is_empty());
        assert!(kapco.is_debt.is_empty());
    }

    #[test]
    fn no_record_fabricated_or_dropped() {
        let reconciler = Reconciler::default();
        let input = quotes(&["AAA", "BBB", "CCC"]);
        let keys: Vec<String> = input.keys().cloned().collect();

        let records = reconciler.reconcile(input, &[info("ZZZ9", "Nowhere")]);
        let out_keys: Vec<String> = records.keys().cloned().collect();
        assert_eq!(keys, out_keys);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let reconciler = Reconciler::default();
        let directory = vec![info("ABC1", "ABC Corp"), info("HUBCO", "Hub Power")];

        let first = reconciler.reconcile(quotes(&["ABC", "HUBC"]), &directory);
        let second = reconciler.reconcile(quotes(&["ABC", "HUBC"]), &directory);
        assert_eq!(first, second);
    }

    #[test]
    fn score_below_threshold_never_merges() {
        let scorer = FixedScores(vec![(("REF", "AAA"), 0.59)]);
        let reconciler = Reconciler::new(Box::new(scorer), MATCH_THRESHOLD);
        let records = reconciler.reconcile(quotes(&["AAA"]), &[info("REF", "Ref Co")]);
        assert!(records["AAA"].name.is_empty());
    }

    #[test]
    fn score_at_threshold_merges() {
        let scorer = FixedScores(vec![(("REF", "AAA"), 0.6)]);
        let reconciler = Reconciler::new(Box::new(scorer), MATCH_THRESHOLD);
        let records = reconciler.reconcile(quotes(&["AAA"]), &[info("REF", "Ref Co")]);
        assert_eq!(records["AAA"].name, "Ref Co");
    }

    #[test]
    fn tie_break_keeps_first_candidate_in_map_order() {
        let scorer = FixedScores(vec![(("REF", "AAA"), 0.9), (("REF", "BBB"), 0.9)]);
        let reconciler = Reconciler::new(Box::new(scorer), MATCH_THRESHOLD);
        let records = reconciler.reconcile(quotes(&["AAA", "BBB"]), &[info("REF", "Ref Co")]);
        assert_eq!(records["AAA"].name, "Ref Co");
        assert!(records["BBB"].name.is_empty());
    }

    #[test]
    fn later_entry_overwrites_earlier_merge() {
        let scorer = FixedScores(vec![(("R1", "AAA"), 0.8), (("R2", "AAA"), 0.7)]);
        let reconciler = Reconciler::new(Box::new(scorer), MATCH_THRESHOLD);
        let directory = vec![info("R1", "First Co"), info("R2", "Second Co")];
        let records = reconciler.reconcile(quotes(&["AAA"]), &directory);
        // Directory order decides, not score magnitude.
        assert_eq!(records["AAA"].name, "Second Co");
    }

    #[test]
    fn default_scorer_prefers_closest_symbol() {
        let reconciler = Reconciler::default();
        let records = reconciler.reconcile(
            quotes(&["HUBC", "KAPCO"]),
            &[info("HUBCO", "Hub Power")],
        );
        assert_eq!(records["HUBC"].name, "Hub Power");
        assert!(records["KAPCO"].name.is_empty());
    }
}
