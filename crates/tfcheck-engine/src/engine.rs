//! # Validation Run
//!
//! ```text
//! CorpusStore ─► compile_active ─► rule pipeline ─┐
//!                                                 ├─► evaluated list ─► policy ─► final list
//! DocumentContext ─────────────► cross-doc checks ┘                       │
//!                                                                         └─► audit events
//! ```
//!
//! Rule results come first (ruleset order, then rule order), then the
//! cross-document results. Policy runs only once the whole list exists.
//! Policy and audit failures are logged and swallowed: the caller always
//! gets the evaluated discrepancies when evaluation succeeded.

use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;

use tfcheck_core::{Clock, Discrepancy, DocumentContext, RulesetId, SessionId, SystemClock, TenantId};
use tfcheck_corpus::{CompiledRuleset, CorpusStore};
use tfcheck_eval::{evaluate_rulesets, partition_issues, CrossDocChecker, IssuePartition};
use tfcheck_policy::{
    ApplicationType, AuditSink, AuditWriter, DiscrepancyMetrics, InMemoryAuditSink,
    JsonlAuditSink, NullAuditSink, PolicyEngine, PolicyProvider,
};
use tfcheck_semantic::SemanticComparator;

use crate::config::{AuditSinkKind, EngineConfig, EvaluationConfig};
use crate::error::{ConfigError, EngineError};

/// Ruleset that took part in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RulesetSummary {
    pub id: RulesetId,
    pub domain: String,
    pub rulebook_version: String,
    pub ruleset_version: String,
    pub rules: usize,
}

impl From<&CompiledRuleset> for RulesetSummary {
    fn from(r: &CompiledRuleset) -> Self {
        Self {
            id: r.id,
            domain: r.domain.clone(),
            rulebook_version: r.rulebook_version.clone(),
            ruleset_version: r.ruleset_version.clone(),
            rules: r.len(),
        }
    }
}

/// Everything a validation run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub session_id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    pub rulesets: Vec<RulesetSummary>,
    /// Discrepancies as evaluated, before any policy.
    pub evaluated: Vec<Discrepancy>,
    /// Discrepancies after overlay and exceptions.
    pub discrepancies: Vec<Discrepancy>,
    pub before: DiscrepancyMetrics,
    pub after: DiscrepancyMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_applied: Option<ApplicationType>,
    pub issues: IssuePartition,
    pub audit_events_written: usize,
}

impl ValidationReport {
    /// Whether any final discrepancy is still failing.
    pub fn has_failures(&self) -> bool {
        self.discrepancies.iter().any(Discrepancy::is_failing)
    }
}

/// Runs validations. Build once and share; the comparator cache lives here.
#[derive(Debug)]
pub struct ValidationEngine {
    comparator: SemanticComparator,
    policy: PolicyEngine,
    audit: AuditWriter,
    clock: Arc<dyn Clock>,
    evaluation: EvaluationConfig,
}

impl ValidationEngine {
    /// Build from configuration with the system clock.
    pub fn from_config(
        config: &EngineConfig,
        provider: Arc<dyn PolicyProvider>,
    ) -> Result<Self, ConfigError> {
        Self::from_config_with_clock(config, provider, Arc::new(SystemClock))
    }

    pub fn from_config_with_clock(
        config: &EngineConfig,
        provider: Arc<dyn PolicyProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let sink: Arc<dyn AuditSink> = match config.audit.sink {
            AuditSinkKind::Memory => Arc::new(InMemoryAuditSink::new()),
            AuditSinkKind::Disabled => Arc::new(NullAuditSink),
            AuditSinkKind::Jsonl => {
                let path = config.audit.path.clone().ok_or_else(|| ConfigError::Invalid {
                    field: "audit.path",
                    detail: "required for the jsonl sink".into(),
                })?;
                Arc::new(JsonlAuditSink::new(path))
            }
        };
        Ok(Self::from_parts(
            SemanticComparator::from_config(&config.comparator, clock.clone()),
            PolicyEngine::new(provider, clock.clone()),
            AuditWriter::new(sink),
            clock,
            config.evaluation.clone(),
        ))
    }

    /// Assemble from prebuilt parts (tests inject fakes here).
    pub fn from_parts(
        comparator: SemanticComparator,
        policy: PolicyEngine,
        audit: AuditWriter,
        clock: Arc<dyn Clock>,
        evaluation: EvaluationConfig,
    ) -> Self {
        Self {
            comparator,
            policy,
            audit,
            clock,
            evaluation,
        }
    }

    pub fn comparator(&self) -> &SemanticComparator {
        &self.comparator
    }

    pub fn audit(&self) -> &AuditWriter {
        &self.audit
    }

    /// Validate against the store's active rulesets for the configured domains.
    ///
    /// # Errors
    ///
    /// An active ruleset that no longer compiles.
    pub async fn validate(
        &self,
        corpus: &CorpusStore,
        ctx: &DocumentContext,
    ) -> Result<ValidationReport, EngineError> {
        let rulesets = corpus.compile_active(&self.evaluation.domains)?;
        Ok(self.validate_compiled(&rulesets, ctx).await)
    }

    /// Validate against already compiled rulesets, in the given order.
    pub async fn validate_compiled(
        &self,
        rulesets: &[CompiledRuleset],
        ctx: &DocumentContext,
    ) -> ValidationReport {
        let session_id = SessionId::new();
        let span = tracing::info_span!(
            "validation_run",
            session_id = %session_id,
            tenant = ctx.tenant_id.as_ref().map(TenantId::as_str).unwrap_or("-"),
        );
        self.run(session_id, rulesets, ctx).instrument(span).await
    }

    async fn run(
        &self,
        session_id: SessionId,
        rulesets: &[CompiledRuleset],
        ctx: &DocumentContext,
    ) -> ValidationReport {
        let jurisdiction = ctx
            .jurisdiction
            .as_deref()
            .or(self.evaluation.jurisdiction.as_deref());

        let mut evaluated = evaluate_rulesets(rulesets, ctx, jurisdiction, &self.comparator).await;
        let rule_results = evaluated.len();
        if self.evaluation.cross_doc_enabled {
            evaluated.extend(CrossDocChecker::new(&self.comparator).run(ctx).await);
        }
        tracing::info!(
            rulesets = rulesets.len(),
            rule_results,
            cross_doc_results = evaluated.len() - rule_results,
            failing = evaluated.iter().filter(|d| d.is_failing()).count(),
            "evaluation complete"
        );

        let outcome = self.policy.apply_or_original(evaluated.clone(), ctx);
        let policy_applied = outcome.application_type();

        let mut audit_events_written = 0;
        if let (Some(tenant), Some(_)) = (ctx.tenant_id.as_ref(), policy_applied) {
            match self
                .audit
                .write_run(session_id, tenant, &outcome, self.clock.now())
            {
                Ok(n) => audit_events_written = n,
                Err(e) => {
                    tracing::warn!(error = %e, "policy audit write failed; continuing");
                }
            }
        }

        let issues = partition_issues(&outcome.discrepancies);
        ValidationReport {
            session_id,
            tenant_id: ctx.tenant_id.clone(),
            rulesets: rulesets.iter().map(RulesetSummary::from).collect(),
            evaluated,
            before: outcome.before,
            after: outcome.after,
            discrepancies: outcome.discrepancies,
            policy_applied,
            issues,
            audit_events_written,
        }
    }
}
