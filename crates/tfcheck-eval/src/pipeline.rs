//! # Rule Evaluation Pipeline
//!
//! Runs every applicable rule of every compiled ruleset against one
//! document context and produces one [`Discrepancy`] per rule, passed or
//! failed.
//!
//! ## Ordering
//!
//! Output order is ruleset order (as given, normally
//! [`CorpusStore::active_rulesets`](tfcheck_corpus::CorpusStore::active_rulesets)
//! order) then rule order within the ruleset. Rules are evaluated one at a
//! time; evaluation has no side effects other than comparator cache fills,
//! so repeated runs over the same inputs produce identical lists.
//!
//! ## Verdict
//!
//! A rule passes iff every condition passes. The expected/actual pair is
//! taken from the first failing condition, or from the first condition
//! when the rule passes. Conditions after the first failure are still
//! evaluated so comparator caching behaves the same regardless of order.

use tfcheck_core::{Discrepancy, DocumentContext, DocumentLabels, DocumentType};
use tfcheck_corpus::{CompiledRuleset, Rule, WILDCARD_DOCUMENT_TYPES};
use tfcheck_semantic::SemanticComparator;

use crate::condition::{evaluate, ConditionOutcome};

/// Verdict of a whole rule before it is shaped into a discrepancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleVerdict {
    pub passed: bool,
    /// Index of the first failing condition.
    pub failed_at: Option<usize>,
    pub expected: String,
    pub actual: String,
}

/// AND together a rule's condition outcomes.
pub fn combine_outcomes(outcomes: &[ConditionOutcome]) -> RuleVerdict {
    let failed_at = outcomes.iter().position(|o| !o.passed);
    let surfaced = failed_at.or(if outcomes.is_empty() { None } else { Some(0) });
    let (expected, actual) = surfaced
        .and_then(|i| outcomes.get(i))
        .map(|o| (o.expected.clone(), o.actual.clone()))
        .unwrap_or_default();
    RuleVerdict {
        passed: failed_at.is_none(),
        failed_at,
        expected,
        actual,
    }
}

/// Evaluate one rule.
pub async fn evaluate_rule(
    rule: &Rule,
    ctx: &DocumentContext,
    labels: &DocumentLabels,
    comparator: &SemanticComparator,
) -> Discrepancy {
    let mut outcomes = Vec::with_capacity(rule.conditions.len());
    for condition in &rule.conditions {
        outcomes.push(evaluate(condition, ctx, comparator).await);
    }
    let verdict = combine_outcomes(&outcomes);

    if !verdict.passed {
        tracing::debug!(
            rule = %rule.rule_id,
            domain = %rule.domain,
            condition = verdict.failed_at.unwrap_or_default(),
            expected = %verdict.expected,
            actual = %verdict.actual,
            "rule failed"
        );
    }

    let message = message_for(rule, &verdict);
    let mut d = Discrepancy::new(&rule.rule_id, &rule.title, &rule.domain)
        .with_outcome(
            verdict.passed,
            rule.severity.discrepancy_severity(),
            verdict.expected,
            verdict.actual,
        )
        .with_message(message)
        .with_documents(labels, &rule_documents(rule));
    d.display_card = rule.display_card;
    d.suggested_fix = if d.passed { None } else { rule.suggested_fix.clone() };
    d
}

/// Evaluate every applicable rule of `rulesets`, in order.
///
/// `jurisdiction` selects non-global rules; `None` runs global rules only.
pub async fn evaluate_rulesets(
    rulesets: &[CompiledRuleset],
    ctx: &DocumentContext,
    jurisdiction: Option<&str>,
    comparator: &SemanticComparator,
) -> Vec<Discrepancy> {
    let labels = DocumentLabels::from_context(ctx);
    let mut out = Vec::new();
    for ruleset in rulesets {
        let mut skipped = 0usize;
        for rule in &ruleset.rules {
            if !rule.applies_to(ctx, jurisdiction) {
                skipped += 1;
                continue;
            }
            out.push(evaluate_rule(rule, ctx, &labels, comparator).await);
        }
        tracing::debug!(
            ruleset = %ruleset.id,
            domain = %ruleset.domain,
            rules = ruleset.len(),
            skipped,
            "ruleset evaluated"
        );
    }
    out
}

fn message_for(rule: &Rule, verdict: &RuleVerdict) -> String {
    let narrative = if verdict.passed {
        rule.expected_outcome.valid.as_deref()
    } else {
        rule.expected_outcome.invalid.as_deref()
    };
    match narrative {
        Some(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ if verdict.passed => format!("{}: satisfied", rule.title),
        _ => format!(
            "{}: expected {}, found {}",
            rule.title, verdict.expected, verdict.actual
        ),
    }
}

fn rule_documents(rule: &Rule) -> Vec<DocumentType> {
    let mut types = rule.document_types();
    if !WILDCARD_DOCUMENT_TYPES.contains(&rule.document_type.as_str())
        && !types.contains(&rule.document_type)
    {
        types.insert(0, rule.document_type.clone());
    }
    types
}
