//! # Condition Evaluator
//!
//! `evaluate(condition, context) -> (passed, expected, actual)`.
//!
//! Missing, blank or unparseable input fails the condition closed; nothing
//! here returns an error or panics on document data. Every kind except
//! `consistency_check` is a pure synchronous function of the context
//! ([`evaluate_static`]); `consistency_check` with `semantic: true` is the
//! only path that consults the [`SemanticComparator`].

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tfcheck_core::document::parse_amount;
use tfcheck_core::{DocumentContext, DocumentType};
use tfcheck_corpus::{Condition, DateOrdering};
use tfcheck_semantic::{normalize_text, ComparisonRequest, SemanticComparator};

const MISSING: &str = "missing";

/// Verdict of one condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionOutcome {
    pub passed: bool,
    pub expected: String,
    pub actual: String,
}

impl ConditionOutcome {
    fn new(passed: bool, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            passed,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    fn fail(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::new(false, expected, actual)
    }
}

/// Evaluate a condition, consulting `comparator` for semantic consistency checks.
pub async fn evaluate(
    condition: &Condition,
    ctx: &DocumentContext,
    comparator: &SemanticComparator,
) -> ConditionOutcome {
    match condition {
        Condition::ConsistencyCheck {
            left_field,
            right_field,
            semantic: true,
            context,
            threshold,
        } => {
            let (left, right) = match resolve_pair(ctx, left_field, right_field) {
                Ok(pair) => pair,
                Err(outcome) => return outcome,
            };
            let mut request = ComparisonRequest::new(
                left.clone(),
                right.clone(),
                context.as_deref().unwrap_or("consistency"),
            )
            .with_documents(document_heads(&[left_field, right_field]));
            if let Some(t) = threshold {
                request = request.with_threshold(*t);
            }
            let result = comparator.compare(&request).await;
            tracing::trace!(
                left = %left_field,
                right = %right_field,
                source = ?result.source,
                confidence = result.confidence,
                "semantic consistency check"
            );
            ConditionOutcome::new(result.is_match, left, right)
        }
        other => evaluate_static(other, ctx),
    }
}

/// Evaluate a condition without the comparator. A semantic
/// `consistency_check` falls back to normalized exact matching.
pub fn evaluate_static(condition: &Condition, ctx: &DocumentContext) -> ConditionOutcome {
    match condition {
        Condition::FieldPresence { field } => match ctx.resolve_text(field) {
            Some(v) => ConditionOutcome::new(true, format!("{field} present"), v),
            None => ConditionOutcome::fail(format!("{field} present"), MISSING),
        },

        Condition::EnumValue {
            field,
            allowed_values,
        } => {
            let expected = format!("one of [{}]", allowed_values.join(", "));
            match ctx.resolve_text(field) {
                None => ConditionOutcome::fail(expected, MISSING),
                Some(v) => {
                    let key = fold(&v);
                    let passed = allowed_values.iter().any(|a| fold(a) == key);
                    ConditionOutcome::new(passed, expected, v)
                }
            }
        }

        Condition::DocRequired { document_type } => {
            let expected = format!("{} present", document_type.default_label());
            if ctx.is_present(document_type) {
                ConditionOutcome::new(true, expected, "present")
            } else {
                ConditionOutcome::fail(expected, MISSING)
            }
        }

        Condition::EqualityMatch {
            left_field,
            right_field,
        } => match resolve_pair(ctx, left_field, right_field) {
            Err(outcome) => outcome,
            Ok((left, right)) => {
                let passed = match (plain_number(&left), plain_number(&right)) {
                    (Some(l), Some(r)) => l == r,
                    _ => fold(&left) == fold(&right),
                };
                ConditionOutcome::new(passed, left, right)
            }
        },

        Condition::ConsistencyCheck {
            left_field,
            right_field,
            ..
        } => match resolve_pair(ctx, left_field, right_field) {
            Err(outcome) => outcome,
            Ok((left, right)) => {
                let passed = normalize_text(&left) == normalize_text(&right);
                ConditionOutcome::new(passed, left, right)
            }
        },

        Condition::DateOrder {
            left_field,
            right_field,
            order,
        } => {
            let (left, right) = match (date(ctx, left_field), date(ctx, right_field)) {
                (Ok(l), Ok(r)) => (l, r),
                (Err(actual), _) => {
                    return ConditionOutcome::fail(format!("{left_field} {order} {right_field}"), actual)
                }
                (_, Err(actual)) => {
                    return ConditionOutcome::fail(format!("{left_field} {order} {right_field}"), actual)
                }
            };
            let passed = match order {
                DateOrdering::Before => left < right,
                DateOrdering::After => left > right,
                DateOrdering::OnOrBefore => left <= right,
            };
            ConditionOutcome::new(passed, format!("{order} {right}"), left.to_string())
        }

        Condition::NumericRange { field, min, max } => {
            let expected = match (min, max) {
                (Some(lo), Some(hi)) => format!("between {lo} and {hi}"),
                (Some(lo), None) => format!(">= {lo}"),
                (None, Some(hi)) => format!("<= {hi}"),
                (None, None) => "any value".to_string(),
            };
            let Some(raw) = ctx.resolve_text(field) else {
                return ConditionOutcome::fail(expected, MISSING);
            };
            let Some(value) = ctx.resolve_decimal(field) else {
                return ConditionOutcome::fail(expected, format!("not numeric: {raw}"));
            };
            let passed = min.map_or(true, |lo| value >= lo) && max.map_or(true, |hi| value <= hi);
            ConditionOutcome::new(passed, expected, value.normalize().to_string())
        }

        Condition::TimeConstraint {
            start_field,
            end_field,
            min_days,
            max_days,
        } => {
            let expected = match (min_days, max_days) {
                (Some(lo), Some(hi)) => format!("between {lo} and {hi} days"),
                (Some(lo), None) => format!("at least {lo} days"),
                (None, Some(hi)) => format!("within {hi} days"),
                (None, None) => "any interval".to_string(),
            };
            let (start, end) = match (date(ctx, start_field), date(ctx, end_field)) {
                (Ok(s), Ok(e)) => (s, e),
                (Err(actual), _) | (_, Err(actual)) => return ConditionOutcome::fail(expected, actual),
            };
            let days = (end - start).num_days();
            let passed =
                min_days.map_or(true, |lo| days >= lo) && max_days.map_or(true, |hi| days <= hi);
            ConditionOutcome::new(passed, expected, format!("{days} days"))
        }
    }
}

fn resolve_pair(
    ctx: &DocumentContext,
    left_field: &str,
    right_field: &str,
) -> Result<(String, String), ConditionOutcome> {
    match (ctx.resolve_text(left_field), ctx.resolve_text(right_field)) {
        (Some(l), Some(r)) => Ok((l, r)),
        (None, _) => Err(ConditionOutcome::fail(
            format!("{left_field} present"),
            format!("{left_field} {MISSING}"),
        )),
        (_, None) => Err(ConditionOutcome::fail(
            format!("{right_field} present"),
            format!("{right_field} {MISSING}"),
        )),
    }
}

fn date(ctx: &DocumentContext, field: &str) -> Result<NaiveDate, String> {
    match ctx.resolve_text(field) {
        None => Err(format!("{field} {MISSING}")),
        Some(raw) => ctx
            .resolve_date(field)
            .ok_or_else(|| format!("unparseable date {raw:?} in {field}")),
    }
}

/// Case-fold and collapse whitespace.
fn fold(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Parse `s` as a number only if it looks like one (digits, separators,
/// sign). Keeps identifiers such as `LC-2024-001` out of numeric comparison.
fn plain_number(s: &str) -> Option<Decimal> {
    let t = s.trim();
    let looks_numeric = t.chars().any(|c| c.is_ascii_digit())
        && t.chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+' | ' '));
    if looks_numeric {
        parse_amount(t)
    } else {
        None
    }
}

fn document_heads(fields: &[&String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for f in fields {
        if let Some(head) = f.split('.').next() {
            let label = DocumentType::new(head).default_label();
            if !out.contains(&label) {
                out.push(label);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tfcheck_core::SystemClock;

    fn ctx() -> DocumentContext {
        DocumentContext::new()
            .with_fields(
                "letter_of_credit",
                json!({
                    "number": "LC-2024-001",
                    "form": "Irrevocable",
                    "amount": "USD 100,000.00",
                    "currency": "USD",
                    "issue_date": "2024-03-01",
                    "latest_shipment_date": "15/04/2024",
                    "expiry_date": "2024-05-31",
                    "applicant": "Acme Imports Ltd",
                    "blank": " "
                }),
            )
            .with_fields(
                "commercial_invoice",
                json!({
                    "currency": "usd",
                    "amount": 98000,
                    "credit_number": "lc-2024-001",
                    "buyer": "ACME IMPORTS LIMITED",
                    "date": "garbage"
                }),
            )
            .with_fields(
                "bill_of_lading",
                json!({"on_board_date": "10 Apr 2024"}),
            )
            .with_document("d-bl", "bl.pdf", "bill_of_lading")
    }

    fn cond(v: serde_json::Value) -> Condition {
        Condition::from_value(&v).unwrap()
    }

    #[test]
    fn field_presence_fails_closed_on_blank() {
        let c = ctx();
        assert!(evaluate_static(&cond(json!({"type": "field_presence", "field": "lc.number"})), &c).passed);
        let out = evaluate_static(&cond(json!({"type": "field_presence", "field": "lc.blank"})), &c);
        assert!(!out.passed);
        assert_eq!(out.actual, "missing");
    }

    #[test]
    fn enum_value_is_case_insensitive() {
        let c = ctx();
        let out = evaluate_static(
            &cond(json!({"type": "enum_value", "field": "lc.form", "allowed_values": ["IRREVOCABLE"]})),
            &c,
        );
        assert!(out.passed);
        assert_eq!(out.expected, "one of [IRREVOCABLE]");
    }

    #[test]
    fn doc_required_uses_presence() {
        let c = ctx();
        assert!(evaluate_static(&cond(json!({"type": "doc_required", "document_type": "bl"})), &c).passed);
        let out = evaluate_static(&cond(json!({"type": "doc_required", "document_type": "insurance"})), &c);
        assert!(!out.passed);
        assert_eq!(out.expected, "Insurance Certificate present");
    }

    #[test]
    fn equality_match_folds_case_and_compares_numbers() {
        let c = ctx();
        assert!(evaluate_static(
            &cond(json!({"type": "equality_match", "left_field": "lc.currency", "right_field": "invoice.currency"})),
            &c
        )
        .passed);
        assert!(evaluate_static(
            &cond(json!({"type": "equality_match", "left_field": "lc.number", "right_field": "invoice.credit_number"})),
            &c
        )
        .passed);
        let missing = evaluate_static(
            &cond(json!({"type": "equality_match", "left_field": "lc.number", "right_field": "invoice.nope"})),
            &c,
        );
        assert!(!missing.passed);
        assert_eq!(missing.actual, "invoice.nope missing");
    }

    #[test]
    fn date_order_and_unparseable_dates() {
        let c = ctx();
        let ok = evaluate_static(
            &cond(json!({"type": "date_order", "left_field": "bl.on_board_date", "right_field": "lc.latest_shipment_date", "order": "on_or_before"})),
            &c,
        );
        assert!(ok.passed);
        assert_eq!(ok.actual, "2024-04-10");
        assert_eq!(ok.expected, "on_or_before 2024-04-15");

        let bad = evaluate_static(
            &cond(json!({"type": "date_order", "left_field": "invoice.date", "right_field": "lc.expiry_date", "order": "before"})),
            &c,
        );
        assert!(!bad.passed);
        assert!(bad.actual.contains("unparseable date"));
    }

    #[test]
    fn numeric_range_inclusive_and_fails_closed() {
        let c = ctx();
        let inclusive = evaluate_static(
            &cond(json!({"type": "numeric_range", "field": "lc.amount", "min": 1, "max": 100000})),
            &c,
        );
        assert!(inclusive.passed);
        assert_eq!(inclusive.actual, "100000");

        let not_numeric = evaluate_static(
            &cond(json!({"type": "numeric_range", "field": "lc.applicant", "min": 1})),
            &c,
        );
        assert!(!not_numeric.passed);
        assert!(not_numeric.actual.starts_with("not numeric"));

        let missing = evaluate_static(
            &cond(json!({"type": "numeric_range", "field": "lc.nope", "max": 5})),
            &c,
        );
        assert!(!missing.passed);
    }

    #[test]
    fn time_constraint_counts_days() {
        let c = ctx();
        let out = evaluate_static(
            &cond(json!({"type": "time_constraint", "start_field": "bl.on_board_date", "end_field": "lc.expiry_date", "max_days": 21})),
            &c,
        );
        assert!(!out.passed);
        assert_eq!(out.actual, "51 days");
        assert_eq!(out.expected, "within 21 days");
    }

    #[tokio::test]
    async fn consistency_check_semantic_uses_comparator() {
        let c = ctx();
        let cmp = SemanticComparator::lexical(Arc::new(SystemClock));
        let semantic = cond(json!({
            "type": "consistency_check", "left_field": "lc.applicant", "right_field": "invoice.buyer",
            "semantic": true, "context": "party_name", "threshold": 0.9
        }));
        assert!(evaluate(&semantic, &c, &cmp).await.passed);
        assert_eq!(cmp.cache().len(), 1);

        let exact = cond(json!({
            "type": "consistency_check", "left_field": "lc.applicant", "right_field": "invoice.buyer"
        }));
        assert!(evaluate(&exact, &c, &cmp).await.passed);
        assert_eq!(cmp.cache().len(), 1);
    }
}
