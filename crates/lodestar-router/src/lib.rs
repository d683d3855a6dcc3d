//! Lodestar Router
//!
//! Classifies a natural-language request and decides how it should be
//! resolved:
//! - [`SignalExtractor`]: domain, pattern, verb and keyword signals
//! - [`classify`]: intent from verb hits with a fixed tie-break order
//! - [`ConfidenceWeights`]: additive confidence in `[0, 1]`
//! - [`Router`]: the routing rule producing a [`RoutingDecision`]
//!
//! # Example
//!
//! ```rust
//! use lodestar_router::{Router, RoutingMode};
//!
//! let router = Router::default();
//! let decision = router.route("aggregate cubes");
//!
//! assert_eq!(decision.mode(), RoutingMode::Explore);
//! assert!(decision.confidence() < 0.6);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod confidence;
mod error;
mod intent;
mod router;
mod signal;
mod tables;

pub use confidence::ConfidenceWeights;
pub use error::RouterError;
pub use intent::{classify, IntentType};
pub use router::{Router, RouterConfig, RoutingDecision, RoutingMode, RoutingThresholds};
pub use signal::{ExtractedSignals, Signal, SignalExtractor, SignalKind};
pub use tables::{PatternTemplate, RouterTables};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
