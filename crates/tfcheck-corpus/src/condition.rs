//! # Conditions
//!
//! A condition is one typed, parameterized check within a rule. The set of
//! kinds is closed: [`Condition`] is a tagged union keyed by the `type`
//! field, and an unknown or missing `type` is rejected when the rule is
//! constructed, never at evaluation time.
//!
//! ```yaml
//! - type: numeric_range
//!   field: credit.amount
//!   min: 1
//! - type: date_order
//!   left_field: bill_of_lading.on_board_date
//!   right_field: credit.latest_shipment_date
//!   order: on_or_before
//! ```

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use tfcheck_core::DocumentType;

/// Every condition `type` the evaluator understands, in declaration order.
pub const KNOWN_CONDITION_TYPES: [&str; 8] = [
    "enum_value",
    "field_presence",
    "doc_required",
    "equality_match",
    "consistency_check",
    "date_order",
    "numeric_range",
    "time_constraint",
];

/// Whether `kind` names a known condition type.
pub fn is_known_condition_type(kind: &str) -> bool {
    KNOWN_CONDITION_TYPES.contains(&kind)
}

/// Required relation between the left and right date of a `date_order` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrdering {
    /// left < right
    Before,
    /// left > right
    After,
    /// left <= right
    OnOrBefore,
}

impl DateOrdering {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
            Self::OnOrBefore => "on_or_before",
        }
    }
}

impl fmt::Display for DateOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single check within a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Resolved value (case-normalized) must be one of `allowed_values`.
    EnumValue {
        #[serde(alias = "path", alias = "field_path")]
        field: String,
        #[serde(alias = "values", alias = "allowed")]
        allowed_values: Vec<String>,
    },
    /// Field must resolve to a non-empty value.
    FieldPresence {
        #[serde(alias = "path", alias = "field_path")]
        field: String,
    },
    /// A document of this type must be present.
    DocRequired {
        #[serde(alias = "doc_type", alias = "document")]
        document_type: DocumentType,
    },
    /// Two fields must be equal after normalization.
    EqualityMatch {
        #[serde(alias = "left")]
        left_field: String,
        #[serde(alias = "right")]
        right_field: String,
    },
    /// Two free-text fields must agree. Only this kind may consult the
    /// semantic comparator, and only when `semantic` is set.
    ConsistencyCheck {
        #[serde(alias = "left")]
        left_field: String,
        #[serde(alias = "right")]
        right_field: String,
        #[serde(default)]
        semantic: bool,
        /// Comparison context handed to the comparator (e.g. `goods_description`).
        #[serde(default)]
        context: Option<String>,
        /// Match threshold in `[0, 1]`; the comparator default applies when absent.
        #[serde(default)]
        threshold: Option<f64>,
    },
    /// Two dates must satisfy `order`.
    DateOrder {
        #[serde(alias = "left")]
        left_field: String,
        #[serde(alias = "right")]
        right_field: String,
        order: DateOrdering,
    },
    /// Numeric value must lie in `[min, max]`, inclusive; either bound may be open.
    NumericRange {
        #[serde(alias = "path", alias = "field_path")]
        field: String,
        #[serde(default)]
        min: Option<Decimal>,
        #[serde(default)]
        max: Option<Decimal>,
    },
    /// Days elapsed from `start_field` to `end_field` must lie in `[min_days, max_days]`.
    TimeConstraint {
        #[serde(alias = "start")]
        start_field: String,
        #[serde(alias = "end")]
        end_field: String,
        #[serde(default)]
        min_days: Option<i64>,
        #[serde(default)]
        max_days: Option<i64>,
    },
}

/// Why a condition object could not be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    /// The object is not a JSON object.
    #[error("condition must be an object")]
    NotAnObject,
    /// No `type` field, or `type` is not a string.
    #[error("condition has no type")]
    MissingType,
    /// `type` is outside the known set.
    #[error("unknown condition type {0:?}")]
    UnknownType(String),
    /// Parameters do not fit the kind.
    #[error("invalid {kind} condition: {detail}")]
    InvalidParameters { kind: String, detail: String },
}

impl Condition {
    /// Build a condition from a raw corpus object.
    ///
    /// The `type` tag is checked against [`KNOWN_CONDITION_TYPES`] before
    /// parameters are parsed, so an unknown kind is reported as such rather
    /// than as a parameter error.
    pub fn from_value(value: &Value) -> Result<Self, ConditionError> {
        let obj = value.as_object().ok_or(ConditionError::NotAnObject)?;
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ConditionError::MissingType)?;
        if !is_known_condition_type(kind) {
            return Err(ConditionError::UnknownType(kind.to_string()));
        }
        let condition: Condition =
            serde_json::from_value(value.clone()).map_err(|e| ConditionError::InvalidParameters {
                kind: kind.to_string(),
                detail: e.to_string(),
            })?;
        condition.check_parameters()?;
        Ok(condition)
    }

    /// The wire name of this condition's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EnumValue { .. } => "enum_value",
            Self::FieldPresence { .. } => "field_presence",
            Self::DocRequired { .. } => "doc_required",
            Self::EqualityMatch { .. } => "equality_match",
            Self::ConsistencyCheck { .. } => "consistency_check",
            Self::DateOrder { .. } => "date_order",
            Self::NumericRange { .. } => "numeric_range",
            Self::TimeConstraint { .. } => "time_constraint",
        }
    }

    /// Field paths this condition reads.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::EnumValue { field, .. }
            | Self::FieldPresence { field }
            | Self::NumericRange { field, .. } => vec![field.as_str()],
            Self::DocRequired { .. } => Vec::new(),
            Self::EqualityMatch {
                left_field,
                right_field,
            }
            | Self::ConsistencyCheck {
                left_field,
                right_field,
                ..
            }
            | Self::DateOrder {
                left_field,
                right_field,
                ..
            } => vec![left_field.as_str(), right_field.as_str()],
            Self::TimeConstraint {
                start_field,
                end_field,
                ..
            } => vec![start_field.as_str(), end_field.as_str()],
        }
    }

    /// Document types this condition touches, first-seen order.
    pub fn document_types(&self) -> Vec<DocumentType> {
        let mut out: Vec<DocumentType> = Vec::new();
        let mut push = |t: DocumentType| {
            if !out.contains(&t) {
                out.push(t);
            }
        };
        if let Self::DocRequired { document_type } = self {
            push(document_type.clone());
        }
        for path in self.fields() {
            if let Some(head) = path.split('.').next().filter(|h| !h.is_empty()) {
                push(DocumentType::new(head));
            }
        }
        out
    }

    fn check_parameters(&self) -> Result<(), ConditionError> {
        let invalid = |detail: &str| ConditionError::InvalidParameters {
            kind: self.kind().to_string(),
            detail: detail.to_string(),
        };
        if self.fields().iter().any(|f| f.trim().is_empty()) {
            return Err(invalid("field path must not be empty"));
        }
        match self {
            Self::EnumValue { allowed_values, .. } if allowed_values.is_empty() => {
                Err(invalid("allowed_values must not be empty"))
            }
            Self::DocRequired { document_type } if document_type.as_str().is_empty() => {
                Err(invalid("document_type must not be empty"))
            }
            Self::ConsistencyCheck {
                threshold: Some(t), ..
            } if !(0.0..=1.0).contains(t) => Err(invalid("threshold must be within [0, 1]")),
            Self::NumericRange { min, max, .. } => match (min, max) {
                (None, None) => Err(invalid("at least one of min/max is required")),
                (Some(lo), Some(hi)) if lo > hi => Err(invalid("min exceeds max")),
                _ => Ok(()),
            },
            Self::TimeConstraint {
                min_days, max_days, ..
            } => match (min_days, max_days) {
                (None, None) => Err(invalid("at least one of min_days/max_days is required")),
                (Some(lo), Some(hi)) if lo > hi => Err(invalid("min_days exceeds max_days")),
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }
}
