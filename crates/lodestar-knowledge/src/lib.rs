//! Lodestar Knowledge
//!
//! Tiered, trust-ranked store of reusable solutions:
//! - [`KnowledgeStore`]: search, learn, failure accounting, promotion and review
//! - [`Experience`]: one solution with its usage history
//! - [`ExperienceRepository`]: persistence seam ([`FileRepository`], [`MemoryRepository`])
//!
//! Search visits Golden, then CommunityVerified, then Personal, and accepts
//! the first tier whose best candidate clears its threshold.
//!
//! # Example
//!
//! ```rust
//! use lodestar_knowledge::{KnowledgeStore, KnowledgeTier, PlanTemplate};
//! use lodestar_plan::Plan;
//!
//! let store = KnowledgeStore::in_memory();
//! let learned = store
//!     .learn("grid of boxes", "create", PlanTemplate::new("grid", Plan::empty()), vec![], vec![])
//!     .unwrap();
//!
//! let found = store.search_text("boxes in a grid", Some("create")).unwrap();
//! assert_eq!(found.tier, Some(KnowledgeTier::Personal));
//! assert_eq!(found.experience.map(|e| e.id), Some(learned.id));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod cache;
mod config;
mod error;
mod experience;
mod keywords;
mod repository;
mod store;

pub use config::{KnowledgeConfig, TierThresholds};
pub use error::KnowledgeError;
pub use experience::{
    Experience, ExperienceId, ExperienceStatus, Fact, KnowledgeTier, PlanTemplate,
};
pub use keywords::{extract_keywords, overlap};
pub use repository::{ExperienceRepository, FileRepository, IndexEntry, MemoryRepository};
pub use store::{KnowledgeResult, KnowledgeStats, KnowledgeStore, TierStats};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
