//! # Ruleset Integrity Checker
//!
//! Read-only auditor over a [`CorpusStore`]. It never mutates the corpus;
//! it reports defects for operators and gates activation.
//!
//! ## Checks
//!
//! | Category | Level | Scope |
//! |---|---|---|
//! | `count_mismatch` | warning | every ruleset |
//! | `active_with_zero_rules` | error | active rulesets |
//! | `multiple_active` | error | active rulesets per `(domain, rulebook_version)` |
//! | `missing_field` | error | rules of active rulesets |
//! | `invalid_severity` | error | rules of active rulesets |
//! | `invalid_flag` | error | rules of active rulesets |
//! | `unknown_condition_type` | error | rules of active rulesets |
//! | `malformed_condition` | error | rules of active rulesets |
//! | `duplicate_rule_id` | error | every ruleset |
//! | `active_collision` | error | across active rulesets |
//! | `orphaned_rule` | error | every rule |
//!
//! [`IntegrityChecker::include_inactive`] widens the rule-level checks to
//! draft and deprecated rulesets.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tfcheck_core::RulesetId;

use crate::condition::{Condition, ConditionError};
use crate::rule::{parse_rule_severity, ExpectedOutcome, RuleRecord};
use crate::ruleset::{RulesetRecord, RulesetStatus};
use crate::store::CorpusStore;

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// Defect category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectKind {
    CountMismatch,
    ActiveWithZeroRules,
    MultipleActive,
    MissingField,
    InvalidSeverity,
    InvalidFlag,
    UnknownConditionType,
    MalformedCondition,
    DuplicateRuleId,
    ActiveCollision,
    OrphanedRule,
}

impl DefectKind {
    /// Every category, in report order.
    pub const ALL: [DefectKind; 11] = [
        Self::CountMismatch,
        Self::ActiveWithZeroRules,
        Self::MultipleActive,
        Self::MissingField,
        Self::InvalidSeverity,
        Self::InvalidFlag,
        Self::UnknownConditionType,
        Self::MalformedCondition,
        Self::DuplicateRuleId,
        Self::ActiveCollision,
        Self::OrphanedRule,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CountMismatch => "count_mismatch",
            Self::ActiveWithZeroRules => "active_with_zero_rules",
            Self::MultipleActive => "multiple_active",
            Self::MissingField => "missing_field",
            Self::InvalidSeverity => "invalid_severity",
            Self::InvalidFlag => "invalid_flag",
            Self::UnknownConditionType => "unknown_condition_type",
            Self::MalformedCondition => "malformed_condition",
            Self::DuplicateRuleId => "duplicate_rule_id",
            Self::ActiveCollision => "active_collision",
            Self::OrphanedRule => "orphaned_rule",
        }
    }

    /// Level findings of this category are reported at.
    pub fn level(&self) -> FindingLevel {
        match self {
            Self::CountMismatch => FindingLevel::Warning,
            _ => FindingLevel::Error,
        }
    }
}

impl fmt::Display for DefectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a finding blocks activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingLevel {
    Error,
    Warning,
}

/// One reported defect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: DefectKind,
    pub level: FindingLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruleset_id: Option<RulesetId>,
    /// `domain rulebook_version/ruleset_version` of the ruleset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruleset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub detail: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            FindingLevel::Error => "error",
            FindingLevel::Warning => "warning",
        };
        write!(f, "[{level}] {}", self.kind)?;
        if let Some(rs) = &self.ruleset {
            write!(f, " ruleset {rs}")?;
        }
        if let Some(rule) = &self.rule_id {
            write!(f, " rule {rule}")?;
        }
        write!(f, ": {}", self.detail)
    }
}

/// Result of an integrity run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub rulesets_checked: usize,
    pub rules_checked: usize,
    pub findings: Vec<Finding>,
}

impl IntegrityReport {
    /// No error-level findings.
    pub fn is_clean(&self) -> bool {
        self.errors().next().is_none()
    }

    /// Error-level findings.
    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.level == FindingLevel::Error)
    }

    /// Warning-level findings.
    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.level == FindingLevel::Warning)
    }

    /// Findings of one category.
    pub fn of_kind(&self, kind: DefectKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.kind == kind)
    }

    /// Count per category, every category present (zero when clean).
    pub fn counts(&self) -> BTreeMap<DefectKind, usize> {
        let mut counts: BTreeMap<DefectKind, usize> =
            DefectKind::ALL.iter().map(|k| (*k, 0)).collect();
        for f in &self.findings {
            *counts.entry(f.kind).or_default() += 1;
        }
        counts
    }

    /// Operator-facing text rendering.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str("Ruleset integrity report\n");
        out.push_str(&format!("  rulesets checked: {}\n", self.rulesets_checked));
        out.push_str(&format!("  rules checked:    {}\n", self.rules_checked));
        out.push_str(&format!(
            "  errors: {}  warnings: {}\n\n",
            self.errors().count(),
            self.warnings().count()
        ));
        for (kind, count) in self.counts() {
            out.push_str(&format!("  {:<24} {count}\n", kind.as_str()));
        }
        out.push('\n');
        if self.findings.is_empty() {
            out.push_str("OK: no defects found\n");
        } else {
            for f in &self.findings {
                out.push_str(&f.to_string());
                out.push('\n');
            }
        }
        out
    }

    fn push(
        &mut self,
        kind: DefectKind,
        ruleset: Option<&RulesetRecord>,
        rule_id: Option<&str>,
        detail: impl Into<String>,
    ) {
        self.findings.push(Finding {
            kind,
            level: kind.level(),
            ruleset_id: ruleset.map(|r| r.id),
            ruleset: ruleset.map(RulesetRecord::label),
            rule_id: rule_id.map(str::to_string),
            detail: detail.into(),
        });
    }
}

// ---------------------------------------------------------------------------
// Checker
// ---------------------------------------------------------------------------

/// Runs the integrity checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrityChecker {
    include_inactive: bool,
}

impl IntegrityChecker {
    /// Checker with rule-level checks limited to active rulesets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also run rule-level checks on draft and deprecated rulesets.
    pub fn include_inactive(mut self, yes: bool) -> Self {
        self.include_inactive = yes;
        self
    }

    /// Audit the whole store.
    pub fn check(&self, store: &CorpusStore) -> IntegrityReport {
        let mut report = IntegrityReport {
            rulesets_checked: store.rulesets().len(),
            rules_checked: store.rules().len(),
            findings: Vec::new(),
        };

        let active: Vec<&RulesetRecord> = store
            .rulesets()
            .iter()
            .filter(|r| r.status == RulesetStatus::Active)
            .collect();

        for ruleset in store.rulesets() {
            let is_active = ruleset.status == RulesetStatus::Active;
            let rules: Vec<&RuleRecord> = store.rules_of(ruleset.id).collect();
            check_counts(&mut report, ruleset, rules.len(), is_active);
            if is_active || self.include_inactive {
                for rule in &rules {
                    check_rule(&mut report, ruleset, rule);
                }
            }
            check_duplicates(&mut report, ruleset, &rules);
        }

        check_multiple_active(&mut report, &active);
        check_collisions(&mut report, store, &active);
        check_orphans(&mut report, store);

        tracing::debug!(
            findings = report.findings.len(),
            errors = report.errors().count(),
            "integrity check complete"
        );
        report
    }

    /// Audit one ruleset as though it were being made active.
    ///
    /// Rule-level checks always run. Collisions are checked against the
    /// active rulesets that would stay active, i.e. those outside this
    /// ruleset's `(domain, rulebook_version)` slot.
    pub fn check_activation(&self, store: &CorpusStore, id: RulesetId) -> IntegrityReport {
        let mut report = IntegrityReport::default();
        let Some(target) = store.ruleset(id) else {
            return report;
        };
        let rules: Vec<&RuleRecord> = store.rules_of(id).collect();
        report.rulesets_checked = 1;
        report.rules_checked = rules.len();

        check_counts(&mut report, target, rules.len(), true);
        for rule in &rules {
            check_rule(&mut report, target, rule);
        }
        check_duplicates(&mut report, target, &rules);

        let mut would_be_active: Vec<&RulesetRecord> = store
            .rulesets()
            .iter()
            .filter(|r| {
                r.id != id && r.status == RulesetStatus::Active && !r.shares_active_slot(target)
            })
            .collect();
        would_be_active.push(target);
        check_collisions(&mut report, store, &would_be_active);
        report
            .findings
            .retain(|f| f.kind != DefectKind::ActiveCollision || f.ruleset_id == Some(id));
        report
    }
}

fn check_counts(report: &mut IntegrityReport, ruleset: &RulesetRecord, bound: usize, active: bool) {
    if ruleset.rule_count != bound {
        report.push(
            DefectKind::CountMismatch,
            Some(ruleset),
            None,
            format!(
                "stored rule_count {} but {bound} rule(s) bound",
                ruleset.rule_count
            ),
        );
    }
    if active && bound == 0 {
        report.push(
            DefectKind::ActiveWithZeroRules,
            Some(ruleset),
            None,
            "active ruleset has no rules",
        );
    }
}

fn check_rule(report: &mut IntegrityReport, ruleset: &RulesetRecord, rule: &RuleRecord) {
    let rule_id = rule.rule_id();

    let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
    for (name, missing) in [
        ("rule_id", rule_id.is_none()),
        ("domain", blank(&rule.domain)),
        ("jurisdiction", blank(&rule.jurisdiction)),
        ("document_type", blank(&rule.document_type)),
        ("title", blank(&rule.title)),
    ] {
        if missing {
            report.push(
                DefectKind::MissingField,
                Some(ruleset),
                rule_id,
                format!("missing {name}"),
            );
        }
    }

    match &rule.severity {
        None | Some(Value::Null) => report.push(
            DefectKind::MissingField,
            Some(ruleset),
            rule_id,
            "missing severity",
        ),
        Some(v) if parse_rule_severity(v).is_none() => report.push(
            DefectKind::InvalidSeverity,
            Some(ruleset),
            rule_id,
            format!("severity {v} is not one of fail, warn, info"),
        ),
        Some(_) => {}
    }

    for (name, value) in [
        ("deterministic", &rule.deterministic),
        ("requires_llm", &rule.requires_llm),
    ] {
        if let Some(v) = value {
            if !v.is_boolean() {
                report.push(
                    DefectKind::InvalidFlag,
                    Some(ruleset),
                    rule_id,
                    format!("{name} must be a boolean, got {v}"),
                );
            }
        }
    }

    match &rule.conditions {
        Some(Value::Array(items)) if !items.is_empty() => {
            for (i, item) in items.iter().enumerate() {
                match Condition::from_value(item) {
                    Ok(_) => {}
                    Err(e @ (ConditionError::UnknownType(_) | ConditionError::MissingType)) => {
                        report.push(
                            DefectKind::UnknownConditionType,
                            Some(ruleset),
                            rule_id,
                            format!("conditions[{i}]: {e}"),
                        )
                    }
                    Err(e) => report.push(
                        DefectKind::MalformedCondition,
                        Some(ruleset),
                        rule_id,
                        format!("conditions[{i}]: {e}"),
                    ),
                }
            }
        }
        _ => report.push(
            DefectKind::MissingField,
            Some(ruleset),
            rule_id,
            "conditions must be a non-empty list",
        ),
    }

    let has_outcome = rule
        .expected_outcome
        .as_ref()
        .and_then(ExpectedOutcome::from_value)
        .is_some_and(|eo| eo.has_narrative());
    if !has_outcome {
        report.push(
            DefectKind::MissingField,
            Some(ruleset),
            rule_id,
            "expected_outcome needs a valid or invalid narrative",
        );
    }
}

fn check_duplicates(report: &mut IntegrityReport, ruleset: &RulesetRecord, rules: &[&RuleRecord]) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for id in rules.iter().filter_map(|r| r.rule_id()) {
        *counts.entry(id).or_default() += 1;
    }
    for (id, n) in counts.into_iter().filter(|(_, n)| *n > 1) {
        report.push(
            DefectKind::DuplicateRuleId,
            Some(ruleset),
            Some(id),
            format!("rule_id appears {n} times"),
        );
    }
}

fn check_multiple_active(report: &mut IntegrityReport, active: &[&RulesetRecord]) {
    let mut slots: BTreeMap<(&str, &str), Vec<&RulesetRecord>> = BTreeMap::new();
    for r in active {
        slots
            .entry((r.domain.as_str(), r.rulebook_version.as_str()))
            .or_default()
            .push(r);
    }
    for ((domain, rulebook), rulesets) in slots.into_iter().filter(|(_, v)| v.len() > 1) {
        let versions: Vec<&str> = rulesets.iter().map(|r| r.ruleset_version.as_str()).collect();
        report.push(
            DefectKind::MultipleActive,
            rulesets.first().copied(),
            None,
            format!(
                "{} active rulesets for {domain} {rulebook}: versions {}",
                rulesets.len(),
                versions.join(", ")
            ),
        );
    }
}

type CollisionKey = (String, String, String, String);

fn check_collisions(report: &mut IntegrityReport, store: &CorpusStore, active: &[&RulesetRecord]) {
    let mut owners: BTreeMap<CollisionKey, BTreeSet<usize>> = BTreeMap::new();
    for (pos, ruleset) in active.iter().enumerate() {
        for rule in store.rules_of(ruleset.id) {
            let Some(rule_id) = rule.rule_id() else {
                continue;
            };
            let norm = |v: &Option<String>| v.as_deref().unwrap_or("").trim().to_ascii_lowercase();
            let key = (
                norm(&rule.domain),
                norm(&rule.jurisdiction),
                norm(&rule.document_type),
                rule_id.to_string(),
            );
            owners.entry(key).or_default().insert(pos);
        }
    }
    for ((domain, jurisdiction, doc_type, rule_id), positions) in owners {
        if positions.len() < 2 {
            continue;
        }
        let labels: Vec<String> = positions.iter().map(|p| active[*p].label()).collect();
        for p in &positions {
            report.push(
                DefectKind::ActiveCollision,
                Some(active[*p]),
                Some(rule_id.as_str()),
                format!(
                    "({domain}, {jurisdiction}, {doc_type}) also defined by active rulesets: {}",
                    labels
                        .iter()
                        .filter(|l| **l != active[*p].label())
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            );
        }
    }
}

fn check_orphans(report: &mut IntegrityReport, store: &CorpusStore) {
    for rule in store.rules() {
        let detail = match rule.ruleset_id {
            None => "rule is not bound to any ruleset".to_string(),
            Some(id) if store.ruleset(id).is_none() => format!("references missing {id}"),
            Some(_) => continue,
        };
        report.push(DefectKind::OrphanedRule, None, rule.rule_id(), detail);
    }
}
