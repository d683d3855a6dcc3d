//! Intent classification
//!
//! Each intent type scores the number of its verbs found in the request.
//! Ties on the maximum resolve by [`IntentType::PRIORITY`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What the request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    /// Build something new
    Create,
    /// Change an existing definition
    Modify,
    /// Measure or inspect
    Analyze,
    /// Find out why something fails
    Debug,
    /// Open-ended exploration
    Explore,
    /// No verb matched
    Unknown,
}

impl IntentType {
    /// Tie-break order for classification. Stable; do not reorder.
    pub const PRIORITY: [IntentType; 5] = [
        IntentType::Create,
        IntentType::Modify,
        IntentType::Analyze,
        IntentType::Debug,
        IntentType::Explore,
    ];

    /// Task type label used by the knowledge store
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Analyze => "analyze",
            Self::Debug => "debug",
            Self::Explore => "explore",
            Self::Unknown => "unknown",
        }
    }

    /// Intents that always route to exploration
    #[inline]
    #[must_use]
    pub fn forces_exploration(self) -> bool {
        matches!(self, Self::Explore | Self::Debug)
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the intent with the most verb hits
///
/// Zero hits everywhere yields [`IntentType::Unknown`].
#[must_use]
pub fn classify(verb_hits: &BTreeMap<IntentType, usize>) -> IntentType {
    let mut best = IntentType::Unknown;
    let mut best_hits = 0usize;

    for intent in IntentType::PRIORITY {
        let hits = verb_hits.get(&intent).copied().unwrap_or(0);
        // strict comparison keeps the earlier intent on ties
        if hits > best_hits {
            best = intent;
            best_hits = hits;
        }
    }

    best
}
