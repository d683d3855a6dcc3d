//! Signal extraction
//!
//! Case-insensitive substring matching of the request against the router
//! tables. Every collection here is ordered so that the extracted signals do
//! not depend on hash iteration order.

use crate::intent::IntentType;
use crate::tables::RouterTables;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Kind of extracted signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// A configured domain matched
    Domain,
    /// A pattern template matched
    Pattern,
    /// An intent verb matched
    IntentVerb,
    /// A table keyword matched
    Keyword,
}

/// Single extracted signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Signal kind
    pub kind: SignalKind,
    /// Domain, pattern, verb or keyword label
    pub label: String,
    /// Strength (hit count for domains, keyword coverage for patterns)
    pub weight: f64,
}

impl Signal {
    fn new(kind: SignalKind, label: impl Into<String>, weight: f64) -> Self {
        Self {
            kind,
            label: label.into(),
            weight,
        }
    }
}

/// Everything the extractor found in one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedSignals {
    /// Signals in deterministic order: domains, verbs, patterns, keywords
    pub signals: Vec<Signal>,
    /// Identified domains
    pub domains: BTreeSet<String>,
    /// Matched pattern names
    pub patterns: BTreeSet<String>,
    /// Verb hit counts per intent
    pub verb_hits: BTreeMap<IntentType, usize>,
    /// Distinct table keywords found (domain and pattern keywords)
    pub keywords: BTreeSet<String>,
}

/// Pulls domain, verb, pattern and keyword signals out of request text
#[derive(Debug, Clone, Copy)]
pub struct SignalExtractor<'a> {
    tables: &'a RouterTables,
}

impl<'a> SignalExtractor<'a> {
    /// Create extractor over tables
    #[inline]
    #[must_use]
    pub fn new(tables: &'a RouterTables) -> Self {
        Self { tables }
    }

    /// Extract signals from request text
    #[must_use]
    pub fn extract(&self, request: &str) -> ExtractedSignals {
        let text = request.to_lowercase();
        let mut out = ExtractedSignals::default();
        let mut keyword_hits = BTreeSet::new();

        let mut domain_signals = Vec::new();
        for (domain, keywords) in &self.tables.domains {
            let hits: Vec<&str> = matching(&text, keywords).collect();
            if !hits.is_empty() {
                domain_signals.push(Signal::new(SignalKind::Domain, domain, hits.len() as f64));
                out.domains.insert(domain.clone());
                keyword_hits.extend(hits.into_iter().map(str::to_lowercase));
            }
        }

        let mut verb_signals = Vec::new();
        for (intent, verbs) in &self.tables.intent_verbs {
            for verb in matching(&text, verbs) {
                verb_signals.push(Signal::new(SignalKind::IntentVerb, verb, 1.0));
                *out.verb_hits.entry(*intent).or_default() += 1;
            }
        }

        let mut pattern_signals = Vec::new();
        for pattern in &self.tables.patterns {
            let hits: Vec<&str> = matching(&text, &pattern.keywords).collect();
            if hits.is_empty() {
                continue;
            }
            let domain_ok = pattern.domains.is_empty()
                || pattern.domains.iter().any(|d| out.domains.contains(d));
            if !domain_ok {
                continue;
            }
            let coverage = hits.len() as f64 / pattern.keywords.len().max(1) as f64;
            pattern_signals.push(Signal::new(SignalKind::Pattern, &pattern.name, coverage));
            out.patterns.insert(pattern.name.clone());
            keyword_hits.extend(hits.into_iter().map(str::to_lowercase));
        }

        out.signals.extend(domain_signals);
        out.signals.extend(verb_signals);
        out.signals.extend(pattern_signals);
        out.signals.extend(
            keyword_hits
                .iter()
                .map(|k| Signal::new(SignalKind::Keyword, k, 1.0)),
        );
        out.keywords = keyword_hits;

        tracing::trace!(
            domains = out.domains.len(),
            patterns = out.patterns.len(),
            keywords = out.keywords.len(),
            "extracted signals"
        );

        out
    }
}

/// Table entries contained in the (already lowercased) text
fn matching<'t>(text: &'t str, entries: &'t [String]) -> impl Iterator<Item = &'t str> + 't {
    entries
        .iter()
        .map(String::as_str)
        .filter(move |entry| !entry.is_empty() && text.contains(entry.to_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::PatternTemplate;

    fn tables() -> RouterTables {
        RouterTables::empty()
            .with_domain("geometry", &["box", "Sphere"])
            .with_domain("data", &["list"])
            .with_verbs(IntentType::Create, &["make", "create"])
            .with_verbs(IntentType::Debug, &["fix"])
            .with_pattern(PatternTemplate::new("grid", &["grid"], &["geometry"]))
            .with_pattern(PatternTemplate::new("facade", &["facade"], &["architecture"]))
    }

    #[test]
    fn matching_is_case_insensitive() {
        let tables = tables();
        let s = SignalExtractor::new(&tables).extract("Make a SPHERE");
        assert!(s.domains.contains("geometry"));
        assert_eq!(s.verb_hits[&IntentType::Create], 1);
        assert!(s.keywords.contains("sphere"));
    }

    #[test]
    fn pattern_needs_domain_overlap() {
        let tables = tables();
        let s = SignalExtractor::new(&tables).extract("facade grid of boxes");
        assert!(s.patterns.contains("grid"));
        // facade keyword hit, but architecture domain not identified
        assert!(!s.patterns.contains("facade"));
    }

    #[test]
    fn pattern_without_domains_matches_on_keyword() {
        let tables = RouterTables::empty()
            .with_pattern(PatternTemplate::new("loft", &["loft"], &[]));
        let s = SignalExtractor::new(&tables).extract("loft these curves");
        assert!(s.patterns.contains("loft"));
        assert_eq!(s.keywords.len(), 1);
    }

    #[test]
    fn signal_order_is_stable() {
        let tables = tables();
        let a = SignalExtractor::new(&tables).extract("make a list and a box grid");
        let b = SignalExtractor::new(&tables).extract("make a list and a box grid");
        assert_eq!(a, b);
        let kinds: Vec<_> = a.signals.iter().map(|s| s.kind).collect();
        let mut sorted = kinds.clone();
        sorted.sort_by_key(|k| match k {
            SignalKind::Domain => 0,
            SignalKind::IntentVerb => 1,
            SignalKind::Pattern => 2,
            SignalKind::Keyword => 3,
        });
        assert_eq!(kinds, sorted);
    }
}
