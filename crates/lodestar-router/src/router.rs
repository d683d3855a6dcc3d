//! Intent router
//!
//! `route(text)` is a pure function of the request and the configured
//! tables: extract signals, classify intent, score confidence, then apply the
//! routing rules in order (first match wins).

use crate::confidence::ConfidenceWeights;
use crate::error::RouterError;
use crate::intent::{classify, IntentType};
use crate::signal::{ExtractedSignals, Signal, SignalExtractor};
use crate::tables::RouterTables;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// How a request should be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Reuse stored knowledge as-is
    Direct,
    /// Known territory, but stored knowledge must be supplemented
    Supplement,
    /// Low confidence or open-ended: build from scratch
    Explore,
    /// Spans several domains with no known pattern
    Hybrid,
}

impl RoutingMode {
    /// Resolve a provisional `Direct` against the knowledge search outcome
    ///
    /// Without an accepted knowledge result `Direct` becomes `Supplement`;
    /// every other mode is final.
    #[inline]
    #[must_use]
    pub fn resolve(self, knowledge_accepted: bool) -> Self {
        match self {
            Self::Direct if !knowledge_accepted => Self::Supplement,
            other => other,
        }
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Direct => "direct",
            Self::Supplement => "supplement",
            Self::Explore => "explore",
            Self::Hybrid => "hybrid",
        })
    }
}

/// Thresholds of the routing rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoutingThresholds {
    /// Confidence below this routes to Explore
    pub explore_below: f64,
    /// More than this many domains with no pattern routes to Hybrid
    pub hybrid_domain_count: usize,
}

impl Default for RoutingThresholds {
    fn default() -> Self {
        Self {
            explore_below: 0.6,
            hybrid_domain_count: 2,
        }
    }
}

/// Router configuration section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    /// Confidence weights
    pub weights: ConfidenceWeights,
    /// Routing thresholds
    pub thresholds: RoutingThresholds,
    /// Optional YAML/JSON tables file; built-in tables when absent
    pub tables_path: Option<PathBuf>,
}

impl RouterConfig {
    /// Validate weights and thresholds
    ///
    /// # Errors
    /// Returns the first invalid value
    pub fn validate(&self) -> Result<(), RouterError> {
        self.weights.validate()?;
        let t = self.thresholds.explore_below;
        if !(0.0..=1.0).contains(&t) {
            return Err(RouterError::InvalidThreshold {
                field: "explore_below".to_string(),
                value: t,
            });
        }
        Ok(())
    }
}

/// Output of [`Router::route`]; immutable once produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    mode: RoutingMode,
    confidence: f64,
    intent: IntentType,
    domains: BTreeSet<String>,
    matched_patterns: BTreeSet<String>,
    keywords: BTreeSet<String>,
}

impl RoutingDecision {
    /// Routing mode (Direct is provisional, see [`RoutingMode::resolve`])
    #[inline]
    #[must_use]
    pub fn mode(&self) -> RoutingMode {
        self.mode
    }

    /// Confidence in `[0, 1]`
    #[inline]
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Classified intent
    #[inline]
    #[must_use]
    pub fn intent(&self) -> IntentType {
        self.intent
    }

    /// Identified domains
    #[inline]
    #[must_use]
    pub fn domains(&self) -> &BTreeSet<String> {
        &self.domains
    }

    /// Matched pattern templates
    #[inline]
    #[must_use]
    pub fn matched_patterns(&self) -> &BTreeSet<String> {
        &self.matched_patterns
    }

    /// Distinct table keywords found in the request
    #[inline]
    #[must_use]
    pub fn keywords(&self) -> &BTreeSet<String> {
        &self.keywords
    }
}

/// Classifies requests and decides how to resolve them
#[derive(Debug, Clone)]
pub struct Router {
    tables: RouterTables,
    weights: ConfidenceWeights,
    thresholds: RoutingThresholds,
}

impl Router {
    /// Create router over tables with default weights and thresholds
    #[inline]
    #[must_use]
    pub fn new(tables: RouterTables) -> Self {
        Self {
            tables,
            weights: ConfidenceWeights::default(),
            thresholds: RoutingThresholds::default(),
        }
    }

    /// Build router from its configuration section
    ///
    /// A configured tables file that does not exist falls back to the
    /// built-in tables with a warning.
    ///
    /// # Errors
    /// Returns error on invalid weights or an unreadable/malformed tables file
    pub fn from_config(config: &RouterConfig) -> Result<Self, RouterError> {
        config.validate()?;
        let tables = match &config.tables_path {
            Some(path) if path.exists() => RouterTables::load(path)?,
            Some(path) => {
                tracing::warn!(path = %path.display(), "router tables not found, using built-in tables");
                RouterTables::default()
            }
            None => RouterTables::default(),
        };
        Ok(Self::new(tables)
            .with_weights(config.weights)
            .with_thresholds(config.thresholds))
    }

    /// With confidence weights
    #[inline]
    #[must_use]
    pub fn with_weights(mut self, weights: ConfidenceWeights) -> Self {
        self.weights = weights;
        self
    }

    /// With routing thresholds
    #[inline]
    #[must_use]
    pub fn with_thresholds(mut self, thresholds: RoutingThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Tables in use
    #[inline]
    #[must_use]
    pub fn tables(&self) -> &RouterTables {
        &self.tables
    }

    /// Extract raw signals without routing
    #[must_use]
    pub fn signals(&self, request: &str) -> Vec<Signal> {
        SignalExtractor::new(&self.tables).extract(request).signals
    }

    /// Route a request
    #[must_use]
    pub fn route(&self, request: &str) -> RoutingDecision {
        let extracted = SignalExtractor::new(&self.tables).extract(request);
        let intent = classify(&extracted.verb_hits);
        let confidence = self.weights.score(&extracted, intent);
        let mode = self.decide(&extracted, intent, confidence);

        tracing::debug!(
            %mode,
            %intent,
            confidence,
            domains = extracted.domains.len(),
            patterns = extracted.patterns.len(),
            "routed request"
        );

        RoutingDecision {
            mode,
            confidence,
            intent,
            domains: extracted.domains,
            matched_patterns: extracted.patterns,
            keywords: extracted.keywords,
        }
    }

    fn decide(&self, s: &ExtractedSignals, intent: IntentType, confidence: f64) -> RoutingMode {
        if confidence < self.thresholds.explore_below {
            RoutingMode::Explore
        } else if intent.forces_exploration() {
            RoutingMode::Explore
        } else if s.domains.len() > self.thresholds.hybrid_domain_count && s.patterns.is_empty() {
            RoutingMode::Hybrid
        } else {
            RoutingMode::Direct
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RouterTables::default())
    }
}
