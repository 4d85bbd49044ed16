//! # Overlay / Exception Application
//!
//! Two phases over the complete discrepancy list of one run, in this order:
//!
//! 1. **Overlay.** With an active overlay carrying
//!    `discrepancy_severity_override`, every failing discrepancy takes that
//!    severity and is marked `policy_override`.
//! 2. **Exceptions.** Every discrepancy still failing after phase 1 is
//!    matched against the tenant's active exceptions in
//!    `(created_at, exception_id)` order. The first exception whose rule
//!    code and scope match is applied and the rest are ignored.
//!
//! The pure core is [`apply_policy`]; [`PolicyEngine`] adds provider
//! lookup, timing and logging.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tfcheck_core::{Clock, Discrepancy, DocumentContext, ScopeContext, Severity};

use crate::error::PolicyError;
use crate::exception::{sort_exceptions, ExceptionEffect, PolicyException};
use crate::metrics::{DiscrepancyMetrics, MetricsDelta};
use crate::overlay::PolicyOverlay;
use crate::provider::PolicyProvider;

/// Which policy mechanisms fired in a run (or for one audit event).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationType {
    Overlay,
    Exception,
    Both,
}

impl ApplicationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overlay => "overlay",
            Self::Exception => "exception",
            Self::Both => "both",
        }
    }
}

/// The overlay's effect on a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayApplication {
    pub overlay_id: String,
    pub severity: Severity,
    /// Rule codes rewritten, in list order.
    pub rule_codes: Vec<String>,
}

/// One exception applied to one discrepancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionApplication {
    pub exception_id: String,
    pub rule_code: String,
    pub effect: ExceptionEffect,
    pub severity_before: Severity,
    pub severity_after: Severity,
}

/// Result of applying policy to a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyOutcome {
    /// The final list, same length and order as the input.
    pub discrepancies: Vec<Discrepancy>,
    pub before: DiscrepancyMetrics,
    pub after: DiscrepancyMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlayApplication>,
    #[serde(default)]
    pub exceptions: Vec<ExceptionApplication>,
    pub processing_time_ms: u64,
}

impl PolicyOutcome {
    /// An outcome that changed nothing.
    pub fn unchanged(discrepancies: Vec<Discrepancy>) -> Self {
        let metrics = DiscrepancyMetrics::from_discrepancies(&discrepancies);
        Self {
            discrepancies,
            before: metrics.clone(),
            after: metrics,
            overlay: None,
            exceptions: Vec::new(),
            processing_time_ms: 0,
        }
    }

    pub fn delta(&self) -> MetricsDelta {
        DiscrepancyMetrics::delta(&self.before, &self.after)
    }

    /// `None` when nothing fired; no audit event is written then.
    pub fn application_type(&self) -> Option<ApplicationType> {
        match (self.overlay.is_some(), !self.exceptions.is_empty()) {
            (true, true) => Some(ApplicationType::Both),
            (true, false) => Some(ApplicationType::Overlay),
            (false, true) => Some(ApplicationType::Exception),
            (false, false) => None,
        }
    }

    /// Rule codes touched by either phase, first-touched order, deduplicated.
    pub fn affected_rules(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let overlay_codes = self.overlay.iter().flat_map(|o| o.rule_codes.iter());
        let exception_codes = self.exceptions.iter().map(|e| &e.rule_code);
        for code in overlay_codes.chain(exception_codes) {
            if !out.contains(code) {
                out.push(code.clone());
            }
        }
        out
    }
}

/// Apply an overlay and exceptions to `discrepancies`.
///
/// `exceptions` may be unsorted and may include expired entries; only
/// those active at `now` are considered, in `(created_at, exception_id)`
/// order.
pub fn apply_policy(
    mut discrepancies: Vec<Discrepancy>,
    overlay: Option<&PolicyOverlay>,
    exceptions: &[PolicyException],
    scope: &ScopeContext,
    now: DateTime<Utc>,
) -> PolicyOutcome {
    let before = DiscrepancyMetrics::from_discrepancies(&discrepancies);

    let mut overlay_applied = None;
    if let Some(overlay) = overlay.filter(|o| o.active) {
        if let Some(days) = overlay.stricter_checks.max_date_slippage_days {
            tracing::debug!(
                overlay = %overlay.overlay_id,
                max_date_slippage_days = days,
                "date-slippage threshold is reserved and has no effect"
            );
        }
        if let Some(severity) = overlay.severity_override() {
            let mut rule_codes = Vec::new();
            for d in discrepancies.iter_mut().filter(|d| d.is_failing()) {
                d.severity = severity;
                d.policy_override = true;
                rule_codes.push(d.rule.clone());
            }
            if !rule_codes.is_empty() {
                overlay_applied = Some(OverlayApplication {
                    overlay_id: overlay.overlay_id.clone(),
                    severity,
                    rule_codes,
                });
            }
        }
    }

    let mut active: Vec<PolicyException> = exceptions
        .iter()
        .filter(|e| e.is_active(now))
        .cloned()
        .collect();
    sort_exceptions(&mut active);

    let mut applied = Vec::new();
    for d in discrepancies.iter_mut().filter(|d| d.is_failing()) {
        let Some(exception) = active.iter().find(|e| e.matches(&*d, scope)) else {
            continue;
        };
        let severity_before = d.severity;
        exception.effect.apply(d, &exception.exception_id);
        applied.push(ExceptionApplication {
            exception_id: exception.exception_id.clone(),
            rule_code: d.rule.clone(),
            effect: exception.effect,
            severity_before,
            severity_after: d.severity,
        });
    }

    let after = DiscrepancyMetrics::from_discrepancies(&discrepancies);
    PolicyOutcome {
        discrepancies,
        before,
        after,
        overlay: overlay_applied,
        exceptions: applied,
        processing_time_ms: 0,
    }
}

/// Applies tenant policy looked up through a [`PolicyProvider`].
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    provider: Arc<dyn PolicyProvider>,
    clock: Arc<dyn Clock>,
}

impl PolicyEngine {
    pub fn new(provider: Arc<dyn PolicyProvider>, clock: Arc<dyn Clock>) -> Self {
        Self { provider, clock }
    }

    /// Apply the context tenant's policy. A context without a tenant gets
    /// an unchanged outcome.
    ///
    /// # Errors
    ///
    /// Provider failures. The input list is consumed; callers that want
    /// the original on failure use [`PolicyEngine::apply_or_original`].
    pub fn apply(
        &self,
        discrepancies: Vec<Discrepancy>,
        ctx: &DocumentContext,
    ) -> Result<PolicyOutcome, PolicyError> {
        let Some(tenant) = ctx.tenant_id.as_ref() else {
            return Ok(PolicyOutcome::unchanged(discrepancies));
        };
        let started = Instant::now();
        let overlay = self.provider.active_overlay(tenant)?;
        let exceptions = self.provider.exceptions(tenant)?;
        if let Some(foreign) = exceptions.iter().find(|e| &e.tenant_id != tenant) {
            return Err(PolicyError::InvalidException {
                exception_id: foreign.exception_id.clone(),
                detail: format!("belongs to tenant {}, not {tenant}", foreign.tenant_id),
            });
        }

        let mut outcome = apply_policy(
            discrepancies,
            overlay.as_ref(),
            &exceptions,
            &ctx.scope,
            self.clock.now(),
        );
        outcome.processing_time_ms = started.elapsed().as_millis() as u64;

        if let Some(o) = &outcome.overlay {
            tracing::info!(
                tenant = %tenant,
                overlay = %o.overlay_id,
                severity = %o.severity,
                rewritten = o.rule_codes.len(),
                "policy overlay applied"
            );
        }
        for e in &outcome.exceptions {
            tracing::info!(
                tenant = %tenant,
                exception = %e.exception_id,
                rule = %e.rule_code,
                effect = %e.effect,
                "policy exception applied"
            );
        }
        Ok(outcome)
    }

    /// [`apply`](Self::apply), falling back to the unmodified list when
    /// policy cannot be applied.
    pub fn apply_or_original(&self, discrepancies: Vec<Discrepancy>, ctx: &DocumentContext) -> PolicyOutcome {
        let original = discrepancies.clone();
        match self.apply(discrepancies, ctx) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "policy application failed; returning evaluated discrepancies");
                PolicyOutcome::unchanged(original)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryPolicyProvider;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use tfcheck_core::{ManualClock, TenantId};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    fn tenant() -> TenantId {
        TenantId::new("bank-a").unwrap()
    }

    fn failing(rule: &str, severity: Severity) -> Discrepancy {
        Discrepancy::new(rule, rule, "icc.ucp600").with_outcome(false, severity, "a", "b")
    }

    fn exception(id: &str, rule: &str, effect: ExceptionEffect, created: DateTime<Utc>) -> PolicyException {
        PolicyException::new(id, tenant(), rule, effect, created)
    }

    #[test]
    fn overlay_rewrites_failing_only() {
        let list = vec![
            failing("R-1", Severity::Critical),
            Discrepancy::new("R-2", "t", "icc.ucp600"),
        ];
        let overlay = PolicyOverlay::new("ov", tenant()).with_severity_override(Severity::Minor);
        let out = apply_policy(list, Some(&overlay), &[], &ScopeContext::default(), t0());
        assert_eq!(out.discrepancies[0].severity, Severity::Minor);
        assert!(out.discrepancies[0].policy_override);
        assert!(!out.discrepancies[1].policy_override);
        assert_eq!(out.application_type(), Some(ApplicationType::Overlay));
        assert_eq!(out.affected_rules(), vec!["R-1"]);
    }

    #[test]
    fn overlay_then_downgrade() {
        let overlay = PolicyOverlay::new("ov", tenant()).with_severity_override(Severity::Major);
        let ex = exception("ex-1", "R-1", ExceptionEffect::Downgrade, t0());
        let out = apply_policy(
            vec![failing("R-1", Severity::Info)],
            Some(&overlay),
            &[ex],
            &ScopeContext::default(),
            t0(),
        );
        // Overlay sets major, then the downgrade softens it to minor.
        assert_eq!(out.discrepancies[0].severity, Severity::Minor);
        assert!(out.discrepancies[0].policy_override && out.discrepancies[0].exception_applied);
        assert_eq!(out.application_type(), Some(ApplicationType::Both));
        assert_eq!(out.exceptions[0].severity_before, Severity::Major);
    }

    #[test]
    fn first_matching_exception_wins_by_creation_order() {
        let later = exception("ex-a", "R-1", ExceptionEffect::Override, t0());
        let earlier = exception("ex-b", "R-1", ExceptionEffect::Waive, t0() - Duration::days(3));
        let out = apply_policy(
            vec![failing("R-1", Severity::Critical)],
            None,
            &[later, earlier],
            &ScopeContext::default(),
            t0(),
        );
        let d = &out.discrepancies[0];
        assert!(d.waived && !d.overridden);
        assert_eq!(d.exception_id.as_deref(), Some("ex-b"));
        assert_eq!(out.exceptions.len(), 1);
    }

    #[test]
    fn expired_and_out_of_scope_exceptions_are_skipped() {
        let expired = exception("ex-1", "R-1", ExceptionEffect::Waive, t0() - Duration::days(10))
            .with_expiry(t0() - Duration::days(1));
        let scoped = exception("ex-2", "R-1", ExceptionEffect::Waive, t0()).with_scope(
            crate::exception::ExceptionScope {
                branch: Some("LHR".into()),
                ..Default::default()
            },
        );
        let out = apply_policy(
            vec![failing("R-1", Severity::Critical)],
            None,
            &[expired, scoped],
            &ScopeContext {
                branch: Some("DXB".into()),
                ..Default::default()
            },
            t0(),
        );
        assert!(out.discrepancies[0].is_failing());
        assert!(out.application_type().is_none());
        assert!(out.delta().is_zero());
    }

    #[test]
    fn engine_skips_contexts_without_tenant_and_falls_back_on_error() {
        let provider = Arc::new(InMemoryPolicyProvider::new());
        provider.put_overlay(PolicyOverlay::new("ov-1", tenant()).with_severity_override(Severity::Minor));
        let engine = PolicyEngine::new(provider.clone(), Arc::new(ManualClock::new(t0())));

        let list = vec![failing("R-1", Severity::Critical)];
        let untouched = engine.apply(list.clone(), &DocumentContext::new()).unwrap();
        assert_eq!(untouched.discrepancies, list);

        let ctx = DocumentContext::new().with_tenant(tenant());
        let out = engine.apply(list.clone(), &ctx).unwrap();
        assert_eq!(out.discrepancies[0].severity, Severity::Minor);

        provider.add_exception(PolicyException::new(
            "ex-x",
            TenantId::new("bank-b").unwrap(),
            "R-1",
            ExceptionEffect::Waive,
            t0(),
        ));
        // Stored under bank-b, so bank-a's lookup stays clean.
        assert!(engine.apply(list.clone(), &ctx).is_ok());
    }

    #[derive(Debug)]
    struct BrokenProvider;

    impl PolicyProvider for BrokenProvider {
        fn active_overlay(&self, tenant: &TenantId) -> Result<Option<PolicyOverlay>, PolicyError> {
            Err(PolicyError::ProviderUnavailable {
                tenant: tenant.clone(),
                detail: "connection refused".into(),
            })
        }

        fn exceptions(&self, _tenant: &TenantId) -> Result<Vec<PolicyException>, PolicyError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn apply_or_original_returns_input_on_provider_failure() {
        let engine = PolicyEngine::new(Arc::new(BrokenProvider), Arc::new(ManualClock::new(t0())));
        let ctx = DocumentContext::new().with_tenant(tenant());
        let list = vec![failing("R-1", Severity::Critical)];
        assert!(engine.apply(list.clone(), &ctx).is_err());
        let out = engine.apply_or_original(list.clone(), &ctx);
        assert_eq!(out.discrepancies, list);
        assert!(out.application_type().is_none());
    }

    fn effect() -> impl Strategy<Value = ExceptionEffect> {
        prop_oneof![
            Just(ExceptionEffect::Waive),
            Just(ExceptionEffect::Downgrade),
            Just(ExceptionEffect::Override),
        ]
    }

    fn severity() -> impl Strategy<Value = Severity> {
        prop_oneof![
            Just(Severity::Critical),
            Just(Severity::Major),
            Just(Severity::Minor),
            Just(Severity::Info),
        ]
    }

    proptest! {
        #[test]
        fn at_most_one_exception_per_discrepancy(
            effects in proptest::collection::vec(effect(), 1..5),
            sev in severity(),
        ) {
            let exceptions: Vec<_> = effects
                .iter()
                .enumerate()
                .map(|(i, e)| exception(&format!("ex-{i}"), "R-1", *e, t0() + Duration::minutes(i as i64)))
                .collect();
            let out = apply_policy(
                vec![failing("R-1", sev)],
                None,
                &exceptions,
                &ScopeContext::default(),
                t0() + Duration::days(1),
            );
            prop_assert_eq!(out.exceptions.len(), 1);
            let d = &out.discrepancies[0];
            prop_assert_eq!(d.exception_id.as_deref(), Some("ex-0"));
            match effects[0] {
                ExceptionEffect::Waive => {
                    prop_assert!(d.passed);
                    prop_assert_eq!(d.severity, Severity::Info);
                }
                ExceptionEffect::Override => {
                    prop_assert!(d.passed);
                    prop_assert_eq!(d.severity, sev);
                }
                ExceptionEffect::Downgrade => {
                    prop_assert!(!d.passed);
                    prop_assert_eq!(d.severity, sev.downgrade());
                }
            }
        }

        #[test]
        fn policy_application_is_deterministic(
            sevs in proptest::collection::vec(severity(), 0..8),
            override_sev in proptest::option::of(severity()),
        ) {
            let list: Vec<_> = sevs.iter().enumerate().map(|(i, s)| failing(&format!("R-{}", i % 3), *s)).collect();
            let overlay = override_sev.map(|s| PolicyOverlay::new("ov", tenant()).with_severity_override(s));
            let exceptions = vec![
                exception("ex-1", "R-1", ExceptionEffect::Downgrade, t0()),
                exception("ex-2", "R-2", ExceptionEffect::Waive, t0()),
            ];
            let a = apply_policy(list.clone(), overlay.as_ref(), &exceptions, &ScopeContext::default(), t0());
            let b = apply_policy(list, overlay.as_ref(), &exceptions, &ScopeContext::default(), t0());
            prop_assert_eq!(a, b);
        }
    }
}
