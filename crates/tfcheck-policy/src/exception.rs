//! # Policy Exceptions
//!
//! A compliance officer's standing decision about one rule code for one
//! tenant, optionally narrowed to a client, branch or product. Exceptions
//! are never deleted; once `expires_at` passes they stop matching.
//!
//! ## Ordering
//!
//! Exceptions are tried in `(created_at, exception_id)` ascending order and
//! the first match wins. [`sort_exceptions`] establishes that order; the
//! engine sorts whatever the provider returns before matching.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tfcheck_core::{Discrepancy, ScopeContext, TenantId};

/// What an exception does to a matching failing discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionEffect {
    /// Pass it and drop severity to info.
    Waive,
    /// Soften severity one step (critical → major → minor).
    Downgrade,
    /// Pass it, keep the severity.
    Override,
}

impl ExceptionEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waive => "waive",
            Self::Downgrade => "downgrade",
            Self::Override => "override",
        }
    }

    /// Apply to `d` in place and stamp it with `exception_id`.
    pub fn apply(self, d: &mut Discrepancy, exception_id: &str) {
        match self {
            Self::Waive => {
                d.passed = true;
                d.waived = true;
                d.severity = tfcheck_core::Severity::Info;
            }
            Self::Downgrade => {
                d.severity = d.severity.downgrade();
                d.exception_applied = true;
            }
            Self::Override => {
                d.passed = true;
                d.overridden = true;
            }
        }
        d.exception_id = Some(exception_id.to_string());
    }
}

impl std::fmt::Display for ExceptionEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filters an exception is limited to. `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionScope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
}

impl ExceptionScope {
    /// Every set filter must equal the run's value (trimmed,
    /// case-insensitive). A set filter never matches an absent value.
    pub fn matches(&self, ctx: &ScopeContext) -> bool {
        filter_matches(&self.client, &ctx.client)
            && filter_matches(&self.branch, &ctx.branch)
            && filter_matches(&self.product, &ctx.product)
    }
}

fn filter_matches(filter: &Option<String>, value: &Option<String>) -> bool {
    match filter.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        None => true,
        Some(f) => value
            .as_deref()
            .is_some_and(|v| v.trim().eq_ignore_ascii_case(f)),
    }
}

/// A stored exception.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyException {
    pub exception_id: String,
    pub tenant_id: TenantId,
    pub rule_code: String,
    #[serde(default)]
    pub scope: ExceptionScope,
    pub effect: ExceptionEffect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl PolicyException {
    pub fn new(
        exception_id: impl Into<String>,
        tenant_id: TenantId,
        rule_code: impl Into<String>,
        effect: ExceptionEffect,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            exception_id: exception_id.into(),
            tenant_id,
            rule_code: rule_code.into(),
            scope: ExceptionScope::default(),
            effect,
            reason: None,
            created_by: None,
            created_at,
            expires_at: None,
        }
    }

    pub fn with_scope(mut self, scope: ExceptionScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Not yet expired at `now`. Expiry is exclusive: an exception expiring
    /// exactly at `now` is inactive.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }

    /// Whether this exception applies to `d` under `scope`.
    pub fn matches(&self, d: &Discrepancy, scope: &ScopeContext) -> bool {
        self.rule_code.trim() == d.rule && self.scope.matches(scope)
    }
}

/// Sort into matching order: `created_at`, then `exception_id`.
pub fn sort_exceptions(exceptions: &mut [PolicyException]) {
    exceptions.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.exception_id.cmp(&b.exception_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tfcheck_core::Severity;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn tenant() -> TenantId {
        TenantId::new("bank-a").unwrap()
    }

    fn failing(severity: Severity) -> Discrepancy {
        Discrepancy::new("R-1", "t", "icc.ucp600").with_outcome(false, severity, "a", "b")
    }

    #[test]
    fn effects() {
        let mut d = failing(Severity::Major);
        ExceptionEffect::Waive.apply(&mut d, "ex-1");
        assert!(d.passed && d.waived);
        assert_eq!(d.severity, Severity::Info);
        assert_eq!(d.exception_id.as_deref(), Some("ex-1"));

        let mut d = failing(Severity::Critical);
        ExceptionEffect::Downgrade.apply(&mut d, "ex-2");
        assert!(!d.passed && d.exception_applied);
        assert_eq!(d.severity, Severity::Major);

        let mut d = failing(Severity::Critical);
        ExceptionEffect::Override.apply(&mut d, "ex-3");
        assert!(d.passed && d.overridden);
        assert_eq!(d.severity, Severity::Critical);
    }

    #[test]
    fn expiry_is_exclusive() {
        let ex = PolicyException::new("ex", tenant(), "R-1", ExceptionEffect::Waive, t0())
            .with_expiry(t0() + Duration::days(30));
        assert!(ex.is_active(t0() + Duration::days(29)));
        assert!(!ex.is_active(t0() + Duration::days(30)));
    }

    #[test]
    fn scope_filters_must_all_match() {
        let scope = ExceptionScope {
            client: Some("ACME".into()),
            branch: None,
            product: Some("import_lc".into()),
        };
        let run = ScopeContext {
            client: Some("acme ".into()),
            branch: Some("DXB".into()),
            product: Some("import_lc".into()),
        };
        assert!(scope.matches(&run));
        let other_product = ScopeContext {
            product: Some("export_lc".into()),
            ..run.clone()
        };
        assert!(!scope.matches(&other_product));
        assert!(!scope.matches(&ScopeContext::default()));
        assert!(ExceptionScope::default().matches(&ScopeContext::default()));
    }

    #[test]
    fn ordering_is_created_at_then_id() {
        let mut list = vec![
            PolicyException::new("b", tenant(), "R-1", ExceptionEffect::Waive, t0()),
            PolicyException::new("z", tenant(), "R-1", ExceptionEffect::Waive, t0() - Duration::days(1)),
            PolicyException::new("a", tenant(), "R-1", ExceptionEffect::Waive, t0()),
        ];
        sort_exceptions(&mut list);
        let ids: Vec<_> = list.iter().map(|e| e.exception_id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "b"]);
    }
}
