//! # Rules
//!
//! Two shapes of the same thing:
//!
//! - [`RuleRecord`] is a rule as stored: loosely typed, so the integrity
//!   checker can report on whatever is actually in the corpus (a numeric
//!   severity, a string `deterministic` flag, an unknown condition type).
//! - [`Rule`] is the typed form the evaluator runs. It can only be built
//!   through [`Rule::from_record`], which enforces the ingestion schema.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tfcheck_core::{DocumentContext, DocumentType, RuleSeverity, RulesetId};

use crate::condition::Condition;
use crate::ruleset::{RulesetRecord, GLOBAL_JURISDICTION};

/// Document types that make a rule apply to the whole bundle.
pub const WILDCARD_DOCUMENT_TYPES: [&str; 2] = ["lc_bundle", "*"];

/// A rule as stored in the corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleRecord {
    /// Owning ruleset. `None` or a dangling id is an orphan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruleset_id: Option<RulesetId>,
    #[serde(default)]
    pub rule_id: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub severity: Option<Value>,
    #[serde(default)]
    pub conditions: Option<Value>,
    #[serde(default)]
    pub expected_outcome: Option<Value>,
    #[serde(default)]
    pub deterministic: Option<Value>,
    #[serde(default)]
    pub requires_llm: Option<Value>,
    /// Rulebook article or paragraph, e.g. `UCP600 Art. 14(d)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_card: Option<bool>,
}

impl RuleRecord {
    /// The rule id if it is present and non-blank.
    pub fn rule_id(&self) -> Option<&str> {
        self.rule_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Human-readable narrative of what compliance looks like.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid: Option<String>,
}

impl ExpectedOutcome {
    /// Whether at least one narrative is populated.
    pub fn has_narrative(&self) -> bool {
        [&self.valid, &self.invalid]
            .iter()
            .any(|n| n.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }

    /// Read the narrative out of a raw corpus value.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let text = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Some(Self {
            valid: text("valid"),
            invalid: text("invalid"),
        })
    }
}

/// A compiled rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub rule_id: String,
    pub domain: String,
    pub jurisdiction: String,
    pub document_type: DocumentType,
    pub severity: RuleSeverity,
    pub title: String,
    pub conditions: Vec<Condition>,
    pub expected_outcome: ExpectedOutcome,
    pub deterministic: bool,
    pub requires_llm: bool,
    pub reference: Option<String>,
    pub suggested_fix: Option<String>,
    pub display_card: bool,
}

impl Rule {
    /// Validate a stored record and build the typed rule.
    ///
    /// Required: `rule_id`, `severity` in `{fail, warn, info}`, a non-empty
    /// `conditions` array of known condition objects, and an
    /// `expected_outcome` object with at least one narrative. `domain` and
    /// `jurisdiction` fall back to the owning ruleset's, `document_type` to
    /// the bundle wildcard and `title` to the rule id.
    ///
    /// Every problem is reported, not just the first.
    pub fn from_record(record: &RuleRecord, ruleset: &RulesetRecord) -> Result<Self, Vec<String>> {
        let mut errors = Vec::new();

        let rule_id = record.rule_id().map(str::to_string);
        if rule_id.is_none() {
            errors.push("missing rule_id".to_string());
        }

        let severity = match &record.severity {
            None | Some(Value::Null) => {
                errors.push("missing severity".to_string());
                None
            }
            Some(v) => match parse_rule_severity(v) {
                Some(s) => Some(s),
                None => {
                    errors.push(format!("invalid severity {v} (expected fail, warn or info)"));
                    None
                }
            },
        };

        let mut conditions = Vec::new();
        match &record.conditions {
            None | Some(Value::Null) => errors.push("missing conditions".to_string()),
            Some(Value::Array(items)) if items.is_empty() => {
                errors.push("conditions must not be empty".to_string())
            }
            Some(Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    match Condition::from_value(item) {
                        Ok(c) => conditions.push(c),
                        Err(e) => errors.push(format!("conditions[{i}]: {e}")),
                    }
                }
            }
            Some(_) => errors.push("conditions must be an array".to_string()),
        }

        let expected_outcome = match &record.expected_outcome {
            None | Some(Value::Null) => {
                errors.push("missing expected_outcome".to_string());
                None
            }
            Some(v) => match ExpectedOutcome::from_value(v) {
                None => {
                    errors.push("expected_outcome must be an object".to_string());
                    None
                }
                Some(eo) if !eo.has_narrative() => {
                    errors.push("expected_outcome needs a valid or invalid narrative".to_string());
                    None
                }
                Some(eo) => Some(eo),
            },
        };

        let deterministic = flag(&record.deterministic, "deterministic", true, &mut errors);
        let requires_llm = flag(&record.requires_llm, "requires_llm", false, &mut errors);

        match (rule_id, severity, expected_outcome) {
            (Some(rule_id), Some(severity), Some(expected_outcome)) if errors.is_empty() => {
                Ok(Self {
                    domain: non_blank(&record.domain).unwrap_or_else(|| ruleset.domain.clone()),
                    jurisdiction: non_blank(&record.jurisdiction)
                        .unwrap_or_else(|| ruleset.jurisdiction.clone()),
                    document_type: DocumentType::new(
                        non_blank(&record.document_type)
                            .as_deref()
                            .unwrap_or(WILDCARD_DOCUMENT_TYPES[0]),
                    ),
                    title: non_blank(&record.title).unwrap_or_else(|| rule_id.clone()),
                    rule_id,
                    severity,
                    conditions,
                    expected_outcome,
                    deterministic,
                    requires_llm,
                    reference: non_blank(&record.reference),
                    suggested_fix: non_blank(&record.suggested_fix),
                    display_card: record.display_card.unwrap_or(false),
                })
            }
            _ => Err(errors),
        }
    }

    /// Whether the rule runs for this context and run jurisdiction.
    ///
    /// The document type must be present in the context (or be a bundle
    /// wildcard) and the rule jurisdiction must be global or equal to
    /// `jurisdiction`.
    pub fn applies_to(&self, ctx: &DocumentContext, jurisdiction: Option<&str>) -> bool {
        let doc_ok = WILDCARD_DOCUMENT_TYPES.contains(&self.document_type.as_str())
            || ctx.is_present(&self.document_type);
        let jurisdiction_ok = self.jurisdiction.eq_ignore_ascii_case(GLOBAL_JURISDICTION)
            || jurisdiction.is_some_and(|j| self.jurisdiction.eq_ignore_ascii_case(j.trim()));
        doc_ok && jurisdiction_ok
    }

    /// Document types the rule's conditions touch, first-seen order.
    pub fn document_types(&self) -> Vec<DocumentType> {
        let mut out: Vec<DocumentType> = Vec::new();
        for t in self.conditions.iter().flat_map(Condition::document_types) {
            if !out.contains(&t) {
                out.push(t);
            }
        }
        out
    }
}

/// Parse a stored severity. Only the three rule severities are accepted.
pub fn parse_rule_severity(value: &Value) -> Option<RuleSeverity> {
    value.as_str().and_then(|s| s.parse().ok())
}

fn flag(value: &Option<Value>, name: &str, default: bool, errors: &mut Vec<String>) -> bool {
    match value {
        None | Some(Value::Null) => default,
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            errors.push(format!("{name} must be a boolean, got {other}"));
            default
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A rule refused at ingestion or compilation, with every reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRejection {
    /// Position in the submitted batch (or in the ruleset, when compiling).
    pub index: usize,
    pub rule_id: Option<String>,
    pub errors: Vec<String>,
}

impl fmt::Display for RuleRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule_id {
            Some(id) => write!(f, "rule #{} ({id}): ", self.index)?,
            None => write!(f, "rule #{}: ", self.index)?,
        }
        f.write_str(&self.errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    use crate::ruleset::RulesetStatus;

    fn ruleset() -> RulesetRecord {
        RulesetRecord {
            id: RulesetId::new(),
            domain: "icc.ucp600".into(),
            jurisdiction: "global".into(),
            rulebook_version: "UCP600:2007".into(),
            ruleset_version: "1.0.0".into(),
            status: RulesetStatus::Draft,
            rule_count: 0,
            created_at: Utc::now(),
            notes: None,
        }
    }

    fn record(v: Value) -> RuleRecord {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn minimal_rule_compiles_with_defaults() {
        let r = Rule::from_record(
            &record(json!({
                "rule_id": "UCP600-14D",
                "severity": "fail",
                "conditions": [{"type": "field_presence", "field": "invoice.goods_description"}],
                "expected_outcome": {"valid": "Invoice describes the goods"}
            })),
            &ruleset(),
        )
        .unwrap();
        assert_eq!(r.domain, "icc.ucp600");
        assert_eq!(r.jurisdiction, "global");
        assert_eq!(r.document_type.as_str(), "lc_bundle");
        assert_eq!(r.title, "UCP600-14D");
        assert!(r.deterministic);
        assert!(!r.requires_llm);
    }

    #[test]
    fn collects_every_error() {
        let errs = Rule::from_record(
            &record(json!({
                "severity": "critical",
                "conditions": [{"type": "mystery"}, {"field": "x"}],
                "expected_outcome": {},
                "deterministic": "yes"
            })),
            &ruleset(),
        )
        .unwrap_err();
        assert_eq!(errs.len(), 6, "{errs:?}");
        assert!(errs.iter().any(|e| e == "missing rule_id"));
        assert!(errs.iter().any(|e| e.contains("invalid severity")));
        assert!(errs.iter().any(|e| e.contains("conditions[0]: unknown condition type")));
        assert!(errs.iter().any(|e| e.contains("conditions[1]: condition has no type")));
        assert!(errs.iter().any(|e| e.contains("narrative")));
        assert!(errs.iter().any(|e| e.contains("deterministic must be a boolean")));
    }

    #[test]
    fn empty_or_non_array_conditions_rejected() {
        for conditions in [json!([]), json!({"type": "field_presence"})] {
            let errs = Rule::from_record(
                &record(json!({
                    "rule_id": "R-1",
                    "severity": "warn",
                    "conditions": conditions,
                    "expected_outcome": {"invalid": "x"}
                })),
                &ruleset(),
            )
            .unwrap_err();
            assert_eq!(errs.len(), 1);
        }
    }

    #[test]
    fn applicability_checks_document_and_jurisdiction() {
        let mut r = Rule::from_record(
            &record(json!({
                "rule_id": "R-BL",
                "document_type": "bl",
                "jurisdiction": "SG",
                "severity": "warn",
                "conditions": [{"type": "field_presence", "field": "bill_of_lading.shipper"}],
                "expected_outcome": {"valid": "ok"}
            })),
            &ruleset(),
        )
        .unwrap();
        let with_bl = DocumentContext::new().with_document("d1", "bl.pdf", "bill_of_lading");
        assert!(r.applies_to(&with_bl, Some("sg")));
        assert!(!r.applies_to(&with_bl, Some("AE")));
        assert!(!r.applies_to(&with_bl, None));
        assert!(!r.applies_to(&DocumentContext::new(), Some("SG")));

        r.jurisdiction = "global".into();
        assert!(r.applies_to(&with_bl, None));
    }

    #[test]
    fn rejection_display() {
        let rej = RuleRejection {
            index: 3,
            rule_id: Some("R-9".into()),
            errors: vec!["missing severity".into(), "missing conditions".into()],
        };
        assert_eq!(
            rej.to_string(),
            "rule #3 (R-9): missing severity; missing conditions"
        );
    }
}
