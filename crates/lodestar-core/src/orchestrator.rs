//! Staged orchestrator
//!
//! Drives one request through
//! `Search → [ConfirmKnowledgeUse] → SyntaxCheck → [ConfirmSyntaxWarnings]
//! → SemanticCheck → [ConfirmSemanticWarnings] → Execute → Learn → Complete`.
//!
//! Bracketed stages suspend the run and hand back a [`PendingConfirmation`];
//! the caller continues it with [`Orchestrator::resume`]. Every transition is
//! checked against [`allowed_transitions`](crate::allowed_transitions) and
//! recorded in the run trace.

use crate::capabilities::{Capabilities, Preview};
use crate::collaborators::{ExecutionOutcome, Executor, PlanProducer, ProducedPlan};
use crate::error::OrchestratorError;
use crate::stage::{validate_transition, Stage};
use lodestar_knowledge::{
    Experience, ExperienceId, KnowledgeResult, KnowledgeStore, KnowledgeTier, PlanTemplate,
};
use lodestar_plan::{
    IssueCategory, Phase, Plan, Severity, ValidationIssue, ValidationReport,
};
use lodestar_router::{IntentType, Router, RoutingDecision, RoutingMode};
use lodestar_validation::{AnalysisError, PlanValidator};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use ulid::Ulid;

/// Handle of a suspended run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(Ulid);

impl ContinuationToken {
    fn new() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// When the orchestrator stops for the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorPolicy {
    /// Ask before reusing an accepted stored solution
    pub confirm_knowledge_use: bool,
    /// Ask before continuing past warnings
    pub confirm_on_warning: bool,
    /// Fail the run on any warning
    pub require_zero_warnings: bool,
}

impl Default for OrchestratorPolicy {
    fn default() -> Self {
        Self {
            confirm_knowledge_use: true,
            confirm_on_warning: true,
            require_zero_warnings: false,
        }
    }
}

impl OrchestratorPolicy {
    /// Never suspend; warnings pass
    #[must_use]
    pub fn unattended() -> Self {
        Self {
            confirm_knowledge_use: false,
            confirm_on_warning: false,
            require_zero_warnings: false,
        }
    }

    /// With knowledge-use confirmation
    #[inline]
    #[must_use]
    pub fn with_confirm_knowledge_use(mut self, confirm: bool) -> Self {
        self.confirm_knowledge_use = confirm;
        self
    }

    /// With warning confirmation
    #[inline]
    #[must_use]
    pub fn with_confirm_on_warning(mut self, confirm: bool) -> Self {
        self.confirm_on_warning = confirm;
        self
    }

    /// With zero-warning requirement
    #[inline]
    #[must_use]
    pub fn with_require_zero_warnings(mut self, require: bool) -> Self {
        self.require_zero_warnings = require;
        self
    }
}

/// Caller's answer at a confirmation point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationDecision {
    /// Continue the run
    Approve,
    /// Stop the run without further effects
    Cancel,
}

/// Accepted stored solution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeMatch {
    /// Accepting tier
    pub tier: KnowledgeTier,
    /// Experience id
    pub id: ExperienceId,
    /// Match score
    pub score: f64,
    /// Solution summary
    pub summary: String,
}

/// A run waiting for the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    /// Token to pass to [`Orchestrator::resume`]
    pub token: ContinuationToken,
    /// Confirmation stage
    pub stage: Stage,
    /// Request being resolved
    pub request: String,
    /// Resolved routing mode
    pub mode: RoutingMode,
    /// Stored solution in use, if any
    pub knowledge: Option<KnowledgeMatch>,
    /// Findings of the phase awaiting approval
    pub issues: Vec<ValidationIssue>,
    /// Plan under consideration
    pub preview: Preview,
}

/// Why a run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The plan producer returned an error
    ProducerFailed,
    /// Critical syntax findings
    CriticalSyntax,
    /// Critical semantic findings
    CriticalSemantics,
    /// The dataflow contains a cycle
    CyclicGraph,
    /// Warnings present while zero warnings are required
    WarningsNotAllowed,
    /// The executor reported failure
    ExecutionFailed,
}

/// A failed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    /// Stage that failed
    pub stage: Stage,
    /// Why
    pub reason: FailureReason,
    /// Blocking findings, verbatim
    pub issues: Vec<ValidationIssue>,
    /// Collaborator diagnostics
    pub errors: Vec<String>,
    /// Personal experience charged with the failure
    pub failure_recorded: Option<ExperienceId>,
    /// Stages visited
    pub trace: Vec<Stage>,
}

/// A run declined at a confirmation point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCancelled {
    /// Confirmation stage that was declined
    pub stage: Stage,
    /// Stages visited
    pub trace: Vec<Stage>,
}

/// A completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Request text
    pub request: String,
    /// Router output
    pub decision: RoutingDecision,
    /// Resolved routing mode
    pub mode: RoutingMode,
    /// Stored solution that was reused
    pub knowledge: Option<KnowledgeMatch>,
    /// Executed plan
    pub plan: Plan,
    /// Findings of both phases
    pub report: ValidationReport,
    /// Experience recorded by the learn stage
    pub experience: Experience,
    /// Stages visited
    pub trace: Vec<Stage>,
}

/// Outcome of [`Orchestrator::run`] and [`Orchestrator::resume`]
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorResult {
    /// Executed and learned
    Completed(Box<RunSummary>),
    /// Suspended at a confirmation point
    PendingConfirmation(Box<PendingConfirmation>),
    /// Declined at a confirmation point
    Cancelled(RunCancelled),
    /// Stopped by findings or a failed execution
    Failed(Box<RunFailure>),
}

impl OrchestratorResult {
    /// Stage the run ended or paused in
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Completed(_) => Stage::Complete,
            Self::PendingConfirmation(p) => p.stage,
            Self::Cancelled(_) => Stage::Cancelled,
            Self::Failed(_) => Stage::Failed,
        }
    }

    /// Pending confirmation, if suspended
    #[must_use]
    pub fn pending(&self) -> Option<&PendingConfirmation> {
        match self {
            Self::PendingConfirmation(p) => Some(p),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Run {
    request: String,
    decision: RoutingDecision,
    knowledge: KnowledgeResult,
    mode: RoutingMode,
    produced: Option<ProducedPlan>,
    report: ValidationReport,
    learned: Option<Experience>,
    stage: Stage,
    trace: Vec<Stage>,
}

impl Run {
    fn new(request: &str, decision: RoutingDecision) -> Self {
        let mode = decision.mode();
        Self {
            request: request.to_string(),
            decision,
            knowledge: KnowledgeResult::none(),
            mode,
            produced: None,
            report: ValidationReport::default(),
            learned: None,
            stage: Stage::Search,
            trace: vec![Stage::Search],
        }
    }

    fn advance(&mut self, to: Stage) -> Result<(), OrchestratorError> {
        validate_transition(self.stage, to)?;
        tracing::debug!(from = %self.stage, %to, "stage transition");
        self.stage = to;
        self.trace.push(to);
        Ok(())
    }

    fn task_type(&self) -> &'static str {
        self.decision.intent().as_str()
    }

    /// Stored solution handed to the producer; exploration starts from scratch
    fn reference(&self) -> Option<&PlanTemplate> {
        if self.mode == RoutingMode::Explore {
            return None;
        }
        self.knowledge.experience.as_ref().map(|e| &e.solution)
    }

    fn knowledge_match(&self) -> Option<KnowledgeMatch> {
        self.reference()?;
        let tier = self.knowledge.tier?;
        let experience = self.knowledge.experience.as_ref()?;
        Some(KnowledgeMatch {
            tier,
            id: experience.id,
            score: self.knowledge.match_score,
            summary: experience.solution.summary.clone(),
        })
    }

    fn plan(&self) -> Result<&Plan, OrchestratorError> {
        self.produced
            .as_ref()
            .map(|p| &p.plan)
            .ok_or(OrchestratorError::InvalidTransition {
                from: Stage::Search,
                to: self.stage,
            })
    }

    fn complete(self) -> Result<RunSummary, OrchestratorError> {
        let knowledge = self.knowledge_match();
        let (Some(produced), Some(experience)) = (self.produced, self.learned) else {
            return Err(OrchestratorError::InvalidTransition {
                from: Stage::Learn,
                to: Stage::Complete,
            });
        };
        Ok(RunSummary {
            request: self.request,
            decision: self.decision,
            mode: self.mode,
            knowledge,
            plan: produced.plan,
            report: self.report,
            experience,
            trace: self.trace,
        })
    }
}

#[derive(Debug)]
struct Failure {
    reason: FailureReason,
    issues: Vec<ValidationIssue>,
    errors: Vec<String>,
    failure_recorded: Option<ExperienceId>,
}

impl Failure {
    fn new(reason: FailureReason) -> Self {
        Self {
            reason,
            issues: Vec::new(),
            errors: Vec::new(),
            failure_recorded: None,
        }
    }

    fn with_issues(mut self, issues: Vec<ValidationIssue>) -> Self {
        self.issues = issues;
        self
    }

    fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }
}

enum Step {
    Advance(Stage),
    Fail(Failure),
}

#[derive(Debug)]
struct Suspended {
    token: ContinuationToken,
    run: Run,
}

/// Drives requests through routing, knowledge, validation, execution and
/// learning
///
/// One run at a time per instance. Instances sharing an
/// `Arc<KnowledgeStore>` may run concurrently.
pub struct Orchestrator<P, E> {
    router: Arc<Router>,
    store: Arc<KnowledgeStore>,
    validator: Arc<PlanValidator>,
    producer: P,
    executor: E,
    policy: OrchestratorPolicy,
    capabilities: Capabilities,
    suspended: Option<Suspended>,
}

impl<P, E> fmt::Debug for Orchestrator<P, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("policy", &self.policy)
            .field("capabilities", &self.capabilities)
            .field("suspended", &self.suspended.as_ref().map(|s| s.run.stage))
            .finish_non_exhaustive()
    }
}

impl<P: PlanProducer, E: Executor> Orchestrator<P, E> {
    /// Create orchestrator with the default policy
    #[must_use]
    pub fn new(
        router: Arc<Router>,
        store: Arc<KnowledgeStore>,
        validator: Arc<PlanValidator>,
        producer: P,
        executor: E,
    ) -> Self {
        Self {
            router,
            store,
            validator,
            producer,
            executor,
            policy: OrchestratorPolicy::default(),
            capabilities: Capabilities::default(),
            suspended: None,
        }
    }

    /// With policy
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: OrchestratorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// With capabilities
    #[inline]
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Active policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &OrchestratorPolicy {
        &self.policy
    }

    /// Stage of the suspended run, if any
    #[must_use]
    pub fn suspended_stage(&self) -> Option<Stage> {
        self.suspended.as_ref().map(|s| s.run.stage)
    }

    /// Start a run
    ///
    /// # Errors
    /// [`OrchestratorError::Busy`] while a run is suspended; knowledge store
    /// failures
    pub fn run(&mut self, request: &str) -> Result<OrchestratorResult, OrchestratorError> {
        if let Some(suspended) = &self.suspended {
            return Err(OrchestratorError::Busy {
                stage: suspended.run.stage,
            });
        }

        let span = tracing::info_span!("orchestrator_run", request = %request);
        let _enter = span.enter();

        let decision = self.router.route(request);
        tracing::info!(
            mode = %decision.mode(),
            confidence = decision.confidence(),
            intent = %decision.intent(),
            "request routed"
        );
        self.drive(Run::new(request, decision))
    }

    /// Continue a suspended run
    ///
    /// # Errors
    /// [`OrchestratorError::UnknownToken`] unless `token` names the suspended
    /// run; knowledge store failures
    pub fn resume(
        &mut self,
        token: ContinuationToken,
        decision: ConfirmationDecision,
    ) -> Result<OrchestratorResult, OrchestratorError> {
        if self.suspended.as_ref().map(|s| s.token) != Some(token) {
            return Err(OrchestratorError::UnknownToken(token));
        }
        let Some(Suspended { mut run, .. }) = self.suspended.take() else {
            return Err(OrchestratorError::UnknownToken(token));
        };

        let span = tracing::info_span!("orchestrator_run", request = %run.request);
        let _enter = span.enter();

        match decision {
            ConfirmationDecision::Cancel => {
                let stage = run.stage;
                run.advance(Stage::Cancelled)?;
                tracing::info!(%stage, "run cancelled");
                Ok(OrchestratorResult::Cancelled(RunCancelled {
                    stage,
                    trace: run.trace,
                }))
            }
            ConfirmationDecision::Approve => {
                let next = run
                    .stage
                    .after_confirmation()
                    .ok_or(OrchestratorError::InvalidTransition {
                        from: run.stage,
                        to: run.stage,
                    })?;
                tracing::info!(stage = %run.stage, "confirmation approved");
                run.advance(next)?;
                self.drive(run)
            }
        }
    }

    fn drive(&mut self, mut run: Run) -> Result<OrchestratorResult, OrchestratorError> {
        loop {
            let step = match run.stage {
                Stage::Search => self.search(&mut run)?,
                Stage::SyntaxCheck => self.syntax_check(&mut run),
                Stage::SemanticCheck => self.semantic_check(&mut run)?,
                Stage::Execute => self.execute(&run)?,
                Stage::Learn => self.learn(&mut run)?,
                Stage::ConfirmKnowledgeUse
                | Stage::ConfirmSyntaxWarnings
                | Stage::ConfirmSemanticWarnings => return self.suspend(run),
                Stage::Complete => {
                    let summary = run.complete()?;
                    tracing::info!(id = %summary.experience.id, mode = %summary.mode, "run completed");
                    return Ok(OrchestratorResult::Completed(Box::new(summary)));
                }
                Stage::Cancelled | Stage::Failed => {
                    return Err(OrchestratorError::InvalidTransition {
                        from: run.stage,
                        to: run.stage,
                    })
                }
            };

            match step {
                Step::Advance(next) => run.advance(next)?,
                Step::Fail(failure) => {
                    let stage = run.stage;
                    run.advance(Stage::Failed)?;
                    tracing::warn!(%stage, reason = ?failure.reason, issues = failure.issues.len(), "run failed");
                    return Ok(OrchestratorResult::Failed(Box::new(RunFailure {
                        stage,
                        reason: failure.reason,
                        issues: failure.issues,
                        errors: failure.errors,
                        failure_recorded: failure.failure_recorded,
                        trace: run.trace,
                    })));
                }
            }
        }
    }

    fn search(&self, run: &mut Run) -> Result<Step, OrchestratorError> {
        let filter = (run.decision.intent() != IntentType::Unknown).then(|| run.task_type());
        run.knowledge = self.store.search_text(&run.request, filter)?;
        run.mode = run.decision.mode().resolve(run.knowledge.is_accepted());
        tracing::info!(
            mode = %run.mode,
            tier = ?run.knowledge.tier,
            score = run.knowledge.match_score,
            "knowledge searched"
        );

        if run.reference().is_some() && self.policy.confirm_knowledge_use {
            Ok(Step::Advance(Stage::ConfirmKnowledgeUse))
        } else {
            Ok(Step::Advance(Stage::SyntaxCheck))
        }
    }

    fn syntax_check(&self, run: &mut Run) -> Step {
        let produced = match run.produced.take() {
            Some(produced) => produced,
            None => match self.producer.produce(&run.request, run.reference()) {
                Ok(produced) => produced,
                Err(e) => {
                    return Step::Fail(
                        Failure::new(FailureReason::ProducerFailed).with_errors(vec![format!("{e:#}")]),
                    )
                }
            },
        };
        let issues = self.validator.check_syntax(&produced.plan);
        run.produced = Some(produced);
        self.gate(
            run,
            issues,
            FailureReason::CriticalSyntax,
            Stage::ConfirmSyntaxWarnings,
            Stage::SemanticCheck,
        )
    }

    fn semantic_check(&self, run: &mut Run) -> Result<Step, OrchestratorError> {
        let analysis = self.validator.check_semantics(run.plan()?);
        Ok(match analysis {
            Ok(issues) => self.gate(
                run,
                issues,
                FailureReason::CriticalSemantics,
                Stage::ConfirmSemanticWarnings,
                Stage::Execute,
            ),
            Err(AnalysisError::CyclicGraph { node }) => {
                let issue = ValidationIssue::semantics(
                    Severity::Critical,
                    IssueCategory::CyclicGraph,
                    format!("dataflow contains a cycle through '{node}'"),
                )
                .at(node);
                run.report.extend([issue.clone()]);
                Step::Fail(Failure::new(FailureReason::CyclicGraph).with_issues(vec![issue]))
            }
        })
    }

    /// Record phase findings and pick the next stage
    fn gate(
        &self,
        run: &mut Run,
        issues: Vec<ValidationIssue>,
        critical: FailureReason,
        confirm: Stage,
        next: Stage,
    ) -> Step {
        let phase = ValidationReport::from_issues(issues);
        run.report.extend(phase.issues().iter().cloned());

        if phase.has_critical() {
            return Step::Fail(Failure::new(critical).with_issues(phase.into_issues()));
        }
        if phase.count(Severity::Warning) > 0 {
            if self.policy.require_zero_warnings {
                return Step::Fail(
                    Failure::new(FailureReason::WarningsNotAllowed).with_issues(phase.into_issues()),
                );
            }
            if self.policy.confirm_on_warning {
                return Step::Advance(confirm);
            }
        }
        Step::Advance(next)
    }

    fn execute(&self, run: &Run) -> Result<Step, OrchestratorError> {
        let outcome = match self.executor.execute(run.plan()?) {
            Ok(outcome) => outcome,
            Err(e) => ExecutionOutcome::failed([format!("{e:#}")]),
        };
        if outcome.success {
            tracing::info!("plan executed");
            return Ok(Step::Advance(Stage::Learn));
        }

        let mut errors = outcome.errors;
        let recorded = match self.store.record_failure(&run.request) {
            Ok(recorded) => recorded,
            Err(e) => {
                tracing::warn!(error = %e, "could not record failure");
                errors.push(format!("failure not recorded: {e}"));
                None
            }
        };
        tracing::warn!(?errors, ?recorded, "execution failed");
        let mut failure = Failure::new(FailureReason::ExecutionFailed).with_errors(errors);
        failure.failure_recorded = recorded;
        Ok(Step::Fail(failure))
    }

    fn learn(&self, run: &mut Run) -> Result<Step, OrchestratorError> {
        let Some(produced) = run.produced.as_ref() else {
            return Err(OrchestratorError::InvalidTransition {
                from: Stage::Search,
                to: run.stage,
            });
        };
        let experience = self.store.learn(
            &run.request,
            run.task_type(),
            PlanTemplate::new(run.request.clone(), produced.plan.clone()),
            produced.facts.clone(),
            run.decision.matched_patterns().iter().cloned().collect(),
        )?;
        run.learned = Some(experience);
        Ok(Step::Advance(Stage::Complete))
    }

    fn suspend(&mut self, run: Run) -> Result<OrchestratorResult, OrchestratorError> {
        let (issues, plan) = match run.stage {
            Stage::ConfirmKnowledgeUse => (Vec::new(), run.reference().map(|t| &t.plan)),
            Stage::ConfirmSyntaxWarnings => (phase_issues(&run.report, Phase::Syntax), run.plan().ok()),
            _ => (phase_issues(&run.report, Phase::Semantics), run.plan().ok()),
        };
        let Some(plan) = plan else {
            return Err(OrchestratorError::InvalidTransition {
                from: Stage::Search,
                to: run.stage,
            });
        };

        let pending = PendingConfirmation {
            token: ContinuationToken::new(),
            stage: run.stage,
            request: run.request.clone(),
            mode: run.mode,
            knowledge: run.knowledge_match(),
            issues,
            preview: self.capabilities.preview(plan),
        };
        tracing::info!(stage = %pending.stage, token = %pending.token, "awaiting confirmation");

        self.suspended = Some(Suspended {
            token: pending.token,
            run,
        });
        Ok(OrchestratorResult::PendingConfirmation(Box::new(pending)))
    }
}

fn phase_issues(report: &ValidationReport, phase: Phase) -> Vec<ValidationIssue> {
    report.by_phase(phase).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::MockExecutor;
    use lodestar_plan::{PlanEdge, PlanNode};
    use lodestar_knowledge::{
        ExperienceRepository, IndexEntry, KnowledgeConfig, KnowledgeError, MemoryRepository,
    };
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

    const REQUEST: &str = "create a twisted tower";

    fn clean_plan() -> Plan {
        let mut b = Plan::builder();
        b.add_node(PlanNode::new("n", "Number Slider").with_number(4.0))
            .unwrap();
        b.add_node(PlanNode::new("s", "Series")).unwrap();
        b.add_edge(PlanEdge::new("n", 0u32, "s", 2u32)).unwrap();
        b.add_command("add_component");
        b.build()
    }

    fn warning_plan() -> Plan {
        let mut plan = clean_plan();
        plan.commands.push("launch".to_string());
        plan
    }

    fn producing(plan: Plan) -> impl Fn(&str, Option<&PlanTemplate>) -> anyhow::Result<ProducedPlan> {
        move |_, _| Ok(ProducedPlan::new(plan.clone()))
    }

    fn succeeding() -> MockExecutor {
        let mut executor = MockExecutor::new();
        executor
            .expect_execute()
            .returning(|_| Ok(ExecutionOutcome::succeeded()));
        executor
    }

    fn orchestrator<P: PlanProducer, E: Executor>(
        store: &Arc<KnowledgeStore>,
        producer: P,
        executor: E,
    ) -> Orchestrator<P, E> {
        Orchestrator::new(
            Arc::new(Router::default()),
            Arc::clone(store),
            Arc::new(PlanValidator::default()),
            producer,
            executor,
        )
    }

    #[test]
    fn clean_run_completes_and_learns() {
        let store = Arc::new(KnowledgeStore::in_memory());
        let mut orch = orchestrator(&store, producing(clean_plan()), succeeding());

        let result = orch.run(REQUEST).unwrap();
        let OrchestratorResult::Completed(summary) = result else {
            panic!("expected completion, got {result:?}");
        };
        assert_eq!(summary.mode, RoutingMode::Supplement);
        assert_eq!(
            summary.trace,
            vec![
                Stage::Search,
                Stage::SyntaxCheck,
                Stage::SemanticCheck,
                Stage::Execute,
                Stage::Learn,
                Stage::Complete,
            ]
        );
        assert_eq!(summary.experience.usage_count(), 1);
        assert!(summary.experience.patterns.contains(&"twisted_tower".to_string()));
        assert_eq!(store.list(KnowledgeTier::Personal).unwrap().len(), 1);
    }

    #[test]
    fn second_run_reuses_knowledge_after_confirmation() {
        let store = Arc::new(KnowledgeStore::in_memory());
        let mut orch = orchestrator(&store, producing(clean_plan()), succeeding());
        assert!(matches!(orch.run(REQUEST).unwrap(), OrchestratorResult::Completed(_)));

        let result = orch.run(REQUEST).unwrap();
        let pending = result.pending().unwrap().clone();
        assert_eq!(pending.stage, Stage::ConfirmKnowledgeUse);
        assert_eq!(pending.mode, RoutingMode::Direct);
        assert_eq!(pending.knowledge.as_ref().map(|k| k.tier), Some(KnowledgeTier::Personal));
        assert!(matches!(pending.preview, Preview::Text(_)));

        let resumed = orch.resume(pending.token, ConfirmationDecision::Approve).unwrap();
        let OrchestratorResult::Completed(summary) = resumed else {
            panic!("expected completion");
        };
        assert_eq!(summary.experience.usage_count(), 2);
        assert_eq!(summary.experience.success_count(), 2);
    }

    #[test]
    fn reference_is_passed_to_producer() {
        let store = Arc::new(KnowledgeStore::in_memory());
        store
            .learn(REQUEST, "create", PlanTemplate::new("stored", clean_plan()), vec![], vec![])
            .unwrap();
        let seen = RefCell::new(Vec::new());
        let producer = |_: &str, reference: Option<&PlanTemplate>| -> anyhow::Result<ProducedPlan> {
            seen.borrow_mut().push(reference.map(|t| t.summary.clone()));
            Ok(ProducedPlan::new(clean_plan()))
        };
        let mut orch = orchestrator(&store, producer, succeeding())
            .with_policy(OrchestratorPolicy::unattended());

        assert!(matches!(orch.run(REQUEST).unwrap(), OrchestratorResult::Completed(_)));
        drop(orch);
        assert_eq!(seen.into_inner(), vec![Some("stored".to_string())]);
    }

    #[test]
    fn busy_while_suspended_and_stale_token_rejected() {
        let store = Arc::new(KnowledgeStore::in_memory());
        let mut orch = orchestrator(&store, producing(warning_plan()), succeeding());

        let pending = orch.run(REQUEST).unwrap().pending().unwrap().clone();
        assert_eq!(pending.stage, Stage::ConfirmSyntaxWarnings);
        assert!(matches!(orch.run(REQUEST), Err(OrchestratorError::Busy { .. })));

        let stale = ContinuationToken::new();
        assert!(matches!(
            orch.resume(stale, ConfirmationDecision::Approve),
            Err(OrchestratorError::UnknownToken(t)) if t == stale
        ));
        assert_eq!(orch.suspended_stage(), Some(Stage::ConfirmSyntaxWarnings));

        assert!(matches!(
            orch.resume(pending.token, ConfirmationDecision::Approve).unwrap(),
            OrchestratorResult::Completed(_)
        ));
        assert!(matches!(
            orch.resume(pending.token, ConfirmationDecision::Approve),
            Err(OrchestratorError::UnknownToken(_))
        ));
    }

    #[test]
    fn cancel_leaves_store_untouched() {
        let store = Arc::new(KnowledgeStore::in_memory());
        let mut executor = MockExecutor::new();
        executor.expect_execute().never();
        let mut orch = orchestrator(&store, producing(warning_plan()), executor);

        let pending = orch.run(REQUEST).unwrap().pending().unwrap().clone();
        let result = orch.resume(pending.token, ConfirmationDecision::Cancel).unwrap();
        let OrchestratorResult::Cancelled(cancelled) = result else {
            panic!("expected cancellation");
        };
        assert_eq!(cancelled.stage, Stage::ConfirmSyntaxWarnings);
        assert_eq!(cancelled.trace.last(), Some(&Stage::Cancelled));
        assert_eq!(store.stats().records(KnowledgeTier::Personal), 0);
    }

    #[test]
    fn zero_warning_policy_fails_run() {
        let store = Arc::new(KnowledgeStore::in_memory());
        let mut executor = MockExecutor::new();
        executor.expect_execute().never();
        let mut orch = orchestrator(&store, producing(warning_plan()), executor)
            .with_policy(OrchestratorPolicy::default().with_require_zero_warnings(true));

        let OrchestratorResult::Failed(failure) = orch.run(REQUEST).unwrap() else {
            panic!("expected failure");
        };
        assert_eq!(failure.reason, FailureReason::WarningsNotAllowed);
        assert_eq!(failure.stage, Stage::SyntaxCheck);
        assert_eq!(failure.issues[0].category, IssueCategory::UnknownCommand);
    }

    #[test]
    fn critical_syntax_fails_before_semantics() {
        let store = Arc::new(KnowledgeStore::in_memory());
        let mut plan = clean_plan();
        plan.commands.push("delete_all".to_string());
        let mut executor = MockExecutor::new();
        executor.expect_execute().never();
        let mut orch = orchestrator(&store, producing(plan), executor);

        let OrchestratorResult::Failed(failure) = orch.run(REQUEST).unwrap() else {
            panic!("expected failure");
        };
        assert_eq!(failure.reason, FailureReason::CriticalSyntax);
        assert!(!failure.trace.contains(&Stage::SemanticCheck));
        assert_eq!(store.stats().records(KnowledgeTier::Personal), 0);
    }

    #[test]
    fn cycle_fails_run() {
        let store = Arc::new(KnowledgeStore::in_memory());
        let plan = Plan {
            nodes: vec![PlanNode::new("a", "Area"), PlanNode::new("b", "Area")],
            edges: vec![
                PlanEdge::new("a", 0u32, "b", 0u32),
                PlanEdge::new("b", 0u32, "a", 0u32),
            ],
            commands: vec![],
        };
        let mut orch = orchestrator(&store, producing(plan), MockExecutor::new());

        let OrchestratorResult::Failed(failure) = orch.run(REQUEST).unwrap() else {
            panic!("expected failure");
        };
        assert_eq!(failure.reason, FailureReason::CyclicGraph);
        assert_eq!(failure.stage, Stage::SemanticCheck);
    }

    #[test]
    fn failed_execution_records_failure() {
        let store = Arc::new(KnowledgeStore::in_memory());
        let learned = store
            .learn(REQUEST, "create", PlanTemplate::new("t", clean_plan()), vec![], vec![])
            .unwrap();
        let mut executor = MockExecutor::new();
        executor
            .expect_execute()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("connection refused")));
        let mut orch = orchestrator(&store, producing(clean_plan()), executor)
            .with_policy(OrchestratorPolicy::unattended());

        let OrchestratorResult::Failed(failure) = orch.run(REQUEST).unwrap() else {
            panic!("expected failure");
        };
        assert_eq!(failure.reason, FailureReason::ExecutionFailed);
        assert_eq!(failure.errors, vec!["connection refused".to_string()]);
        assert_eq!(failure.failure_recorded, Some(learned.id));

        let (_, stored) = store.get(learned.id).unwrap().unwrap();
        assert_eq!(stored.usage_count(), 2);
        assert_eq!(stored.success_count(), 1);
    }

    /// Memory repository whose writes can be switched off
    #[derive(Debug, Default)]
    struct ReadOnlyAfter {
        inner: MemoryRepository,
        locked: AtomicBool,
    }

    impl ReadOnlyAfter {
        fn check(&self) -> Result<(), KnowledgeError> {
            if self.locked.load(AtomicOrdering::SeqCst) {
                return Err(KnowledgeError::Io {
                    path: "personal".into(),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                });
            }
            Ok(())
        }
    }

    impl ExperienceRepository for ReadOnlyAfter {
        fn load_index(&self, tier: KnowledgeTier) -> Result<Vec<IndexEntry>, KnowledgeError> {
            self.inner.load_index(tier)
        }

        fn save_index(&self, tier: KnowledgeTier, entries: &[IndexEntry]) -> Result<(), KnowledgeError> {
            self.check()?;
            self.inner.save_index(tier, entries)
        }

        fn load(&self, tier: KnowledgeTier, id: ExperienceId) -> Result<Option<Experience>, KnowledgeError> {
            self.inner.load(tier, id)
        }

        fn save(&self, tier: KnowledgeTier, experience: &Experience) -> Result<(), KnowledgeError> {
            self.check()?;
            self.inner.save(tier, experience)
        }

        fn remove(&self, tier: KnowledgeTier, id: ExperienceId) -> Result<(), KnowledgeError> {
            self.check()?;
            self.inner.remove(tier, id)
        }
    }

    #[test]
    fn unrecorded_failure_keeps_executor_diagnostics() {
        let repository = Arc::new(ReadOnlyAfter::default());
        let store = Arc::new(
            KnowledgeStore::open(
                KnowledgeConfig::default(),
                Arc::clone(&repository) as Arc<dyn ExperienceRepository>,
            )
            .unwrap(),
        );
        store
            .learn(REQUEST, "create", PlanTemplate::new("t", clean_plan()), vec![], vec![])
            .unwrap();
        repository.locked.store(true, AtomicOrdering::SeqCst);

        let mut executor = MockExecutor::new();
        executor
            .expect_execute()
            .times(1)
            .returning(|_| Ok(ExecutionOutcome::failed(["component 'Series' missing"])));
        let mut orch = orchestrator(&store, producing(clean_plan()), executor)
            .with_policy(OrchestratorPolicy::unattended());

        let OrchestratorResult::Failed(failure) = orch.run(REQUEST).unwrap() else {
            panic!("expected failure");
        };
        assert_eq!(failure.reason, FailureReason::ExecutionFailed);
        assert_eq!(failure.failure_recorded, None);
        assert_eq!(failure.errors.len(), 2);
        assert_eq!(failure.errors[0], "component 'Series' missing");
        assert!(failure.errors[1].starts_with("failure not recorded"));
    }

    #[test]
    fn producer_error_fails_run() {
        let store = Arc::new(KnowledgeStore::in_memory());
        let producer = |_: &str, _: Option<&PlanTemplate>| -> anyhow::Result<ProducedPlan> {
            anyhow::bail!("model unavailable")
        };
        let mut orch = orchestrator(&store, producer, MockExecutor::new());

        let OrchestratorResult::Failed(failure) = orch.run(REQUEST).unwrap() else {
            panic!("expected failure");
        };
        assert_eq!(failure.reason, FailureReason::ProducerFailed);
        assert_eq!(failure.errors, vec!["model unavailable".to_string()]);
    }

    #[test]
    fn diagram_preview_with_renderer() {
        let store = Arc::new(KnowledgeStore::in_memory());
        let mut orch = orchestrator(&store, producing(warning_plan()), succeeding())
            .with_capabilities(Capabilities::default().with_diagram_renderer());

        let pending = orch.run(REQUEST).unwrap().pending().unwrap().clone();
        assert!(matches!(pending.preview, Preview::Diagram(_)));
        assert_eq!(pending.issues.len(), 1);
    }
}
