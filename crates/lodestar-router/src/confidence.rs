//! Confidence scoring
//!
//! Additive, order-independent score over extracted signals, clipped to
//! `[0, 1]`. The weights are configuration; the defaults reproduce the
//! empirically chosen values.

use crate::error::RouterError;
use crate::intent::IntentType;
use crate::signal::ExtractedSignals;
use serde::{Deserialize, Serialize};

/// Weights of the confidence formula
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfidenceWeights {
    /// At least one domain identified
    pub domain: f64,
    /// Exactly one domain identified
    pub single_domain_bonus: f64,
    /// At least one pattern matched
    pub pattern: f64,
    /// Exactly one pattern matched
    pub single_pattern_bonus: f64,
    /// Intent is not Unknown
    pub intent: f64,
    /// Intent is Create
    pub create_bonus: f64,
    /// Per distinct keyword
    pub per_keyword: f64,
    /// Cap on the keyword contribution
    pub keyword_cap: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            domain: 0.3,
            single_domain_bonus: 0.1,
            pattern: 0.4,
            single_pattern_bonus: 0.1,
            intent: 0.2,
            create_bonus: 0.05,
            per_keyword: 0.05,
            keyword_cap: 0.1,
        }
    }
}

impl ConfidenceWeights {
    /// Reject negative or non-finite weights
    ///
    /// # Errors
    /// Returns the first offending field
    pub fn validate(&self) -> Result<(), RouterError> {
        let fields = [
            ("domain", self.domain),
            ("single_domain_bonus", self.single_domain_bonus),
            ("pattern", self.pattern),
            ("single_pattern_bonus", self.single_pattern_bonus),
            ("intent", self.intent),
            ("create_bonus", self.create_bonus),
            ("per_keyword", self.per_keyword),
            ("keyword_cap", self.keyword_cap),
        ];
        for (field, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(RouterError::InvalidWeight {
                    field: field.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }

    /// Score extracted signals for a classified intent
    #[must_use]
    pub fn score(&self, signals: &ExtractedSignals, intent: IntentType) -> f64 {
        let mut score = 0.0;

        match signals.domains.len() {
            0 => {}
            1 => score += self.domain + self.single_domain_bonus,
            _ => score += self.domain,
        }

        match signals.patterns.len() {
            0 => {}
            1 => score += self.pattern + self.single_pattern_bonus,
            _ => score += self.pattern,
        }

        if intent != IntentType::Unknown {
            score += self.intent;
            if intent == IntentType::Create {
                score += self.create_bonus;
            }
        }

        score += (self.per_keyword * signals.keywords.len() as f64).min(self.keyword_cap);

        score.clamp(0.0, 1.0)
    }
}
