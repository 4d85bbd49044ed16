//! # Discrepancy Records
//!
//! The unit of output for both rule evaluation and cross-document checks.
//! The serialized shape is consumed by the API layer and persisted for
//! audit, so field names are stable.
//!
//! The policy layer mutates a discrepancy in place (severity, pass state,
//! mutation markers). Callers that need the evaluation-time verdict must
//! keep a copy of the list from before policy application.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::{DocumentContext, DocumentType};
use crate::severity::Severity;

/// Ruleset domain reported by the cross-document check engine.
pub const CROSS_DOC_DOMAIN: &str = "crossdoc";

fn is_false(b: &bool) -> bool {
    !*b
}

/// One evaluated check, passed or failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    /// Rule code (`rule_id` for corpus rules, `CROSSDOC-*` for cross-document checks).
    pub rule: String,
    /// Short title.
    pub title: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Current severity.
    pub severity: Severity,
    /// Narrative for the reviewer.
    pub message: String,
    /// What the check required.
    pub expected: String,
    /// What the documents showed.
    pub actual: String,
    /// Document types the check read.
    #[serde(default)]
    pub documents: Vec<DocumentType>,
    /// Display names (file names or default labels) of those documents.
    #[serde(default)]
    pub document_names: Vec<String>,
    /// Storage ids of concrete documents involved.
    #[serde(default)]
    pub document_ids: Vec<String>,
    /// Domain of the ruleset (or [`CROSS_DOC_DOMAIN`]).
    pub ruleset_domain: String,
    /// Force display as an issue card regardless of domain.
    #[serde(default, skip_serializing_if = "is_false")]
    pub display_card: bool,
    /// Suggested remediation, when one is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    /// Set when a `waive` exception cleared this discrepancy.
    #[serde(default, skip_serializing_if = "is_false")]
    pub waived: bool,
    /// Set when an `override` exception cleared this discrepancy.
    #[serde(default, skip_serializing_if = "is_false")]
    pub overridden: bool,
    /// Set when a `downgrade` exception softened this discrepancy.
    #[serde(default, skip_serializing_if = "is_false")]
    pub exception_applied: bool,
    /// Set when a tenant overlay rewrote the severity.
    #[serde(default, skip_serializing_if = "is_false")]
    pub policy_override: bool,
    /// The exception that was applied, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_id: Option<String>,
}

impl Discrepancy {
    /// Start a record for a check. Defaults to a passing, informational result.
    pub fn new(
        rule: impl Into<String>,
        title: impl Into<String>,
        ruleset_domain: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.into(),
            title: title.into(),
            passed: true,
            severity: Severity::Info,
            message: String::new(),
            expected: String::new(),
            actual: String::new(),
            documents: Vec::new(),
            document_names: Vec::new(),
            document_ids: Vec::new(),
            ruleset_domain: ruleset_domain.into(),
            display_card: false,
            suggested_fix: None,
            waived: false,
            overridden: false,
            exception_applied: false,
            policy_override: false,
            exception_id: None,
        }
    }

    /// Record the verdict.
    pub fn with_outcome(
        mut self,
        passed: bool,
        severity: Severity,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        self.passed = passed;
        self.severity = severity;
        self.expected = expected.into();
        self.actual = actual.into();
        self
    }

    /// Set the reviewer narrative.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach document references resolved through `labels`.
    pub fn with_documents(mut self, labels: &DocumentLabels, types: &[DocumentType]) -> Self {
        for doc_type in types {
            if self.documents.contains(doc_type) {
                continue;
            }
            self.documents.push(doc_type.clone());
            let (names, ids) = labels.resolve(doc_type);
            self.document_names.extend(names);
            self.document_ids.extend(ids);
        }
        self
    }

    /// Whether this discrepancy currently fails.
    pub fn is_failing(&self) -> bool {
        !self.passed
    }

    /// Whether this discrepancy is shown to users as an issue card rather
    /// than a technical reference. Depends only on the flag and the domain.
    pub fn is_issue_card(&self) -> bool {
        self.display_card || self.ruleset_domain == CROSS_DOC_DOMAIN
    }
}

/// Lookup from document type to the concrete documents supplied for it,
/// built once per run from [`DocumentContext::documents`].
#[derive(Debug, Clone, Default)]
pub struct DocumentLabels {
    by_type: BTreeMap<DocumentType, Vec<(String, String)>>,
}

impl DocumentLabels {
    /// Build the lookup from a context's document list.
    pub fn from_context(ctx: &DocumentContext) -> Self {
        let mut by_type: BTreeMap<DocumentType, Vec<(String, String)>> = BTreeMap::new();
        for doc in &ctx.documents {
            by_type
                .entry(doc.document_type.clone())
                .or_default()
                .push((doc.filename.clone(), doc.id.clone()));
        }
        Self { by_type }
    }

    /// Names and ids for a document type. Falls back to the type's default
    /// label (and no id) when no concrete document was supplied.
    pub fn resolve(&self, doc_type: &DocumentType) -> (Vec<String>, Vec<String>) {
        match self.by_type.get(doc_type) {
            Some(docs) if !docs.is_empty() => docs
                .iter()
                .map(|(name, id)| (name.clone(), id.clone()))
                .unzip(),
            _ => (vec![doc_type.default_label()], Vec::new()),
        }
    }
}
