//! Facade over the router, knowledge store and validator

use crate::capabilities::Capabilities;
use crate::collaborators::{Executor, PlanProducer};
use crate::config::LodestarConfig;
use crate::error::ConfigError;
use crate::orchestrator::{Orchestrator, OrchestratorPolicy};
use lodestar_knowledge::{
    Experience, ExperienceId, Fact, KnowledgeError, KnowledgeResult, KnowledgeStore, PlanTemplate,
};
use lodestar_plan::{Plan, ValidationReport};
use lodestar_router::{Router, RoutingDecision};
use lodestar_validation::PlanValidator;
use std::sync::Arc;

/// Configured Lodestar components
///
/// Components are shared by `Arc`, so orchestrators created from one facade
/// see the same knowledge store.
#[derive(Debug, Clone)]
pub struct Lodestar {
    router: Arc<Router>,
    store: Arc<KnowledgeStore>,
    validator: Arc<PlanValidator>,
    policy: OrchestratorPolicy,
    capabilities: Capabilities,
}

impl Lodestar {
    /// Build every component from configuration
    ///
    /// # Errors
    /// Returns error on invalid configuration, unreadable tables or an
    /// unreadable knowledge store
    pub fn new(config: &LodestarConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let router = Router::from_config(&config.router)?;
        let store = KnowledgeStore::from_config(config.knowledge.clone())?;
        let validator = PlanValidator::from_config(&config.validation)?;
        tracing::info!(
            knowledge_root = ?config.knowledge.root,
            explosion_threshold = validator.registry().explosion_threshold(),
            "lodestar initialised"
        );
        Ok(Self::from_parts(Arc::new(router), Arc::new(store), Arc::new(validator))
            .with_policy(config.orchestrator))
    }

    /// Assemble from existing components
    #[must_use]
    pub fn from_parts(
        router: Arc<Router>,
        store: Arc<KnowledgeStore>,
        validator: Arc<PlanValidator>,
    ) -> Self {
        Self {
            router,
            store,
            validator,
            policy: OrchestratorPolicy::default(),
            capabilities: Capabilities::default(),
        }
    }

    /// Built-in tables over an in-memory store
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_parts(
            Arc::new(Router::default()),
            Arc::new(KnowledgeStore::in_memory()),
            Arc::new(PlanValidator::default()),
        )
    }

    /// With orchestrator policy
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: OrchestratorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// With host capabilities
    #[inline]
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Router
    #[inline]
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Knowledge store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<KnowledgeStore> {
        &self.store
    }

    /// Validator
    #[inline]
    #[must_use]
    pub fn validator(&self) -> &PlanValidator {
        &self.validator
    }

    /// Orchestrator policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &OrchestratorPolicy {
        &self.policy
    }

    /// Route a request
    #[must_use]
    pub fn route(&self, request: &str) -> RoutingDecision {
        self.router.route(request)
    }

    /// Search the trusted tiers
    ///
    /// # Errors
    /// Returns error if a candidate record cannot be loaded
    pub fn search(
        &self,
        request: &str,
        task_type: Option<&str>,
    ) -> Result<KnowledgeResult, KnowledgeError> {
        self.store.search_text(request, task_type)
    }

    /// Record a successful solution
    ///
    /// # Errors
    /// Returns error if the record cannot be loaded or written
    pub fn learn(
        &self,
        request: &str,
        task_type: &str,
        solution: PlanTemplate,
        facts: Vec<Fact>,
        patterns: Vec<String>,
    ) -> Result<Experience, KnowledgeError> {
        self.store.learn(request, task_type, solution, facts, patterns)
    }

    /// Count a failed use against the best personal match
    ///
    /// # Errors
    /// Returns error if the record cannot be loaded or written
    pub fn record_failure(&self, request: &str) -> Result<Option<ExperienceId>, KnowledgeError> {
        self.store.record_failure(request)
    }

    /// Submit a personal experience for community review
    ///
    /// # Errors
    /// Returns error if the record cannot be loaded or written
    pub fn promote(&self, id: ExperienceId) -> Result<bool, KnowledgeError> {
        self.store.promote(id)
    }

    /// Resolve a pending review
    ///
    /// # Errors
    /// Returns error if the record cannot be loaded, written or removed
    pub fn verify(&self, id: ExperienceId, approved: bool) -> Result<bool, KnowledgeError> {
        self.store.verify(id, approved)
    }

    /// Validate a plan
    #[must_use]
    pub fn validate(&self, plan: &Plan) -> ValidationReport {
        self.validator.validate(plan)
    }

    /// Persist dirty tier indexes
    ///
    /// # Errors
    /// Returns error if an index cannot be written
    pub fn flush(&self) -> Result<(), KnowledgeError> {
        self.store.flush()
    }

    /// Orchestrator over these components
    #[must_use]
    pub fn orchestrator<P: PlanProducer, E: Executor>(
        &self,
        producer: P,
        executor: E,
    ) -> Orchestrator<P, E> {
        Orchestrator::new(
            Arc::clone(&self.router),
            Arc::clone(&self.store),
            Arc::clone(&self.validator),
            producer,
            executor,
        )
        .with_policy(self.policy)
        .with_capabilities(self.capabilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestar_knowledge::KnowledgeTier;
    use lodestar_router::RoutingMode;

    #[test]
    fn aggregate_cubes_explores_with_empty_store() {
        let lodestar = Lodestar::in_memory();
        let decision = lodestar.route("aggregate cubes");
        let found = lodestar.search("aggregate cubes", None).unwrap();

        assert_eq!(found.tier, None);
        assert_eq!(decision.mode().resolve(found.is_accepted()), RoutingMode::Explore);
    }

    #[test]
    fn review_lifecycle_through_facade() {
        let lodestar = Lodestar::in_memory();
        let learned = lodestar
            .learn("grid of boxes", "create", PlanTemplate::new("grid", Plan::empty()), vec![], vec![])
            .unwrap();

        assert!(lodestar.promote(learned.id).unwrap());
        assert!(lodestar.verify(learned.id, true).unwrap());
        assert!(!lodestar.verify(learned.id, true).unwrap());

        // the personal original stays; the verified copy keeps its id
        let (tier, _) = lodestar.store().get(learned.id).unwrap().unwrap();
        assert_eq!(tier, KnowledgeTier::CommunityVerified);
        let stats = lodestar.store().stats();
        assert_eq!(stats.records(KnowledgeTier::Personal), 1);
        assert_eq!(stats.records(KnowledgeTier::CommunityPending), 0);
    }

    #[test]
    fn new_from_config_uses_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LodestarConfig::default();
        config.knowledge.root = Some(dir.path().to_path_buf());
        config.validation.explosion_threshold = Some(42.0);

        let lodestar = Lodestar::new(&config).unwrap();
        assert!((lodestar.validator().registry().explosion_threshold() - 42.0).abs() < f64::EPSILON);

        lodestar
            .learn("twisted tower", "create", PlanTemplate::new("t", Plan::empty()), vec![], vec![])
            .unwrap();
        lodestar.flush().unwrap();
        assert!(dir.path().join("personal").join("index.json").exists());
    }
}
