//! # Document Context
//!
//! The input to a validation run: per-document-type extracted field maps, a
//! presence map, the concrete document instances (for reference resolution
//! in discrepancy output), the tenant, and the scope values exception
//! filters are matched against.
//!
//! ## Field Paths
//!
//! A field path is dotted: the first segment names the document type
//! (aliases such as `lc`, `credit`, `bl`, `invoice` are accepted), the rest
//! walks the extracted JSON. Numeric segments index into arrays.
//!
//! ```text
//! lc.amount.value            -> fields["letter_of_credit"]["amount"]["value"]
//! invoice.line_items.0.qty   -> fields["commercial_invoice"]["line_items"][0]["qty"]
//! ```
//!
//! Every accessor returns `Option`; a missing segment, a `null`, or an
//! unparseable value all resolve to `None`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::TenantId;
use crate::temporal::parse_document_date;

/// Canonical document-type name. Construction normalizes aliases, so
/// `"LC"`, `"credit"` and `"letter_of_credit"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DocumentType(String);

impl DocumentType {
    /// Letter of credit (MT700 or equivalent).
    pub const LETTER_OF_CREDIT: &'static str = "letter_of_credit";
    /// Commercial invoice.
    pub const COMMERCIAL_INVOICE: &'static str = "commercial_invoice";
    /// Bill of lading.
    pub const BILL_OF_LADING: &'static str = "bill_of_lading";
    /// Insurance certificate or policy.
    pub const INSURANCE_CERTIFICATE: &'static str = "insurance_certificate";
    /// Packing list.
    pub const PACKING_LIST: &'static str = "packing_list";
    /// Certificate of origin.
    pub const CERTIFICATE_OF_ORIGIN: &'static str = "certificate_of_origin";

    /// Normalize a raw document-type name.
    pub fn new(raw: &str) -> Self {
        let lowered = raw
            .trim()
            .to_ascii_lowercase()
            .replace([' ', '-'], "_");
        let canonical = match lowered.as_str() {
            "lc" | "credit" | "mt700" | "documentary_credit" => Self::LETTER_OF_CREDIT,
            "invoice" => Self::COMMERCIAL_INVOICE,
            "bl" | "bol" | "b_l" | "bill_of_lading_ocean" | "ocean_bill_of_lading" => {
                Self::BILL_OF_LADING
            }
            "insurance" | "insurance_policy" | "insurance_cert" => Self::INSURANCE_CERTIFICATE,
            "coo" | "origin_certificate" => Self::CERTIFICATE_OF_ORIGIN,
            other => other,
        };
        Self(canonical.to_string())
    }

    /// Access the canonical name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable label used when no concrete document is available.
    pub fn default_label(&self) -> String {
        match self.0.as_str() {
            Self::LETTER_OF_CREDIT => "Letter of Credit".to_string(),
            Self::COMMERCIAL_INVOICE => "Commercial Invoice".to_string(),
            Self::BILL_OF_LADING => "Bill of Lading".to_string(),
            Self::INSURANCE_CERTIFICATE => "Insurance Certificate".to_string(),
            Self::PACKING_LIST => "Packing List".to_string(),
            Self::CERTIFICATE_OF_ORIGIN => "Certificate of Origin".to_string(),
            other => other
                .split('_')
                .filter(|w| !w.is_empty())
                .map(|w| {
                    let mut chars = w.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl From<String> for DocumentType {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<&str> for DocumentType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<DocumentType> for String {
    fn from(t: DocumentType) -> Self {
        t.0
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A concrete uploaded document instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Storage identifier of the document.
    pub id: String,
    /// Original file name.
    pub filename: String,
    /// Classified document type.
    pub document_type: DocumentType,
}

/// Values that exception scope filters are matched against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeContext {
    /// Client (applicant/beneficiary account) the run is for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    /// Bank branch processing the presentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Trade product (e.g. `import_lc`, `export_lc`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
}

/// Everything a validation run reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentContext {
    /// Extracted fields keyed by document type.
    #[serde(default)]
    pub fields: BTreeMap<DocumentType, Value>,
    /// Explicit presence flags, for documents known to exist without extracted fields.
    #[serde(default)]
    pub presence: BTreeMap<DocumentType, bool>,
    /// Concrete document instances, used for reference resolution.
    #[serde(default)]
    pub documents: Vec<DocumentRef>,
    /// Tenant whose overlay and exceptions apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    /// Jurisdiction the presentation is examined under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    /// Exception scope values.
    #[serde(default)]
    pub scope: ScopeContext,
}

impl DocumentContext {
    /// Empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add extracted fields for a document type.
    pub fn with_fields(mut self, doc_type: impl Into<DocumentType>, fields: Value) -> Self {
        self.fields.insert(doc_type.into(), fields);
        self
    }

    /// Add a concrete document instance.
    pub fn with_document(
        mut self,
        id: impl Into<String>,
        filename: impl Into<String>,
        doc_type: impl Into<DocumentType>,
    ) -> Self {
        self.documents.push(DocumentRef {
            id: id.into(),
            filename: filename.into(),
            document_type: doc_type.into(),
        });
        self
    }

    /// Set the tenant.
    pub fn with_tenant(mut self, tenant: TenantId) -> Self {
        self.tenant_id = Some(tenant);
        self
    }

    /// Set the exception scope values.
    pub fn with_scope(mut self, scope: ScopeContext) -> Self {
        self.scope = scope;
        self
    }

    /// Whether a document of the given type was supplied.
    ///
    /// A document counts as present if the presence map says so, a concrete
    /// instance of that type exists, or non-empty extracted fields exist.
    /// An explicit `false` in the presence map wins over everything else.
    pub fn is_present(&self, doc_type: &DocumentType) -> bool {
        if let Some(flag) = self.presence.get(doc_type) {
            return *flag;
        }
        self.documents.iter().any(|d| &d.document_type == doc_type)
            || self.fields.get(doc_type).is_some_and(is_non_empty)
    }

    /// Concrete documents of the given type, in supplied order.
    pub fn documents_of<'a>(&'a self, doc_type: &'a DocumentType) -> impl Iterator<Item = &'a DocumentRef> + 'a {
        self.documents
            .iter()
            .filter(move |d| &d.document_type == doc_type)
    }

    /// Resolve a dotted field path to a JSON value. `null` resolves to `None`.
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.').map(str::trim).filter(|s| !s.is_empty());
        let doc_type = DocumentType::new(segments.next()?);
        let mut current = self.fields.get(&doc_type)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        if current.is_null() {
            None
        } else {
            Some(current)
        }
    }

    /// Whether the path resolves to a non-empty value.
    pub fn has_value(&self, path: &str) -> bool {
        self.resolve(path).is_some_and(is_non_empty)
    }

    /// Resolve a path as text. Scalars are stringified, arrays of scalars are
    /// joined line by line, and amount-like objects yield their `value`.
    pub fn resolve_text(&self, path: &str) -> Option<String> {
        self.resolve(path).and_then(value_as_text)
    }

    /// Resolve a path as a document date.
    pub fn resolve_date(&self, path: &str) -> Option<NaiveDate> {
        let text = self.resolve_text(path)?;
        parse_document_date(&text).ok()
    }

    /// Resolve a path as a decimal amount.
    pub fn resolve_decimal(&self, path: &str) -> Option<Decimal> {
        match self.resolve(path)? {
            Value::Number(n) => Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&n.to_string()))
                .ok(),
            Value::String(s) => parse_amount(s),
            Value::Object(map) => map
                .get("value")
                .or_else(|| map.get("amount"))
                .and_then(|v| match v {
                    Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
                    Value::String(s) => parse_amount(s),
                    _ => None,
                }),
            _ => None,
        }
    }
}

/// Whether a JSON value counts as "populated".
pub fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => items.iter().any(is_non_empty),
        Value::Object(map) => map.values().any(is_non_empty),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(value_as_text)
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => return map.get("value").and_then(value_as_text),
        Value::Null => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Parse a monetary amount as written on a document.
///
/// Strips currency codes, symbols and thousands separators:
/// `"USD 100,000.00"`, `"$1,250.5"` and `"100000"` all parse. A value with a
/// comma but no dot and exactly two trailing digits after the last comma
/// (`"1.250,50"`-style continental notation) is read with the comma as the
/// decimal separator.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let continental = kept.contains(',')
        && kept
            .rsplit_once(',')
            .is_some_and(|(_, tail)| tail.len() == 2 && !tail.contains('.'))
        && kept.matches(',').count() == 1
        && (kept.contains('.') || kept.len() > 3);
    let normalized = if continental {
        kept.replace('.', "").replace(',', ".")
    } else {
        kept.replace(',', "")
    };
    Decimal::from_str(&normalized).ok()
}
