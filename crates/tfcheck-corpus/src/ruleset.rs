//! # Rulesets
//!
//! A ruleset is a versioned, domain-scoped collection of rules identified by
//! `(domain, rulebook_version, ruleset_version)`. It moves through
//! `draft → active → deprecated`; at most one ruleset per
//! `(domain, rulebook_version)` should be active at a time.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tfcheck_core::RulesetId;

use crate::error::{CorpusError, CorpusResult};
use crate::rule::Rule;

/// Jurisdiction that applies everywhere.
pub const GLOBAL_JURISDICTION: &str = "global";

fn default_jurisdiction() -> String {
    GLOBAL_JURISDICTION.to_string()
}

/// Lifecycle status of a ruleset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulesetStatus {
    /// Being assembled; never evaluated.
    #[default]
    Draft,
    /// Evaluated at runtime.
    Active,
    /// Superseded; kept for audit.
    Deprecated,
}

impl RulesetStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Deprecated => "deprecated",
        }
    }
}

impl fmt::Display for RulesetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header of a stored ruleset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesetRecord {
    pub id: RulesetId,
    pub domain: String,
    #[serde(default = "default_jurisdiction")]
    pub jurisdiction: String,
    pub rulebook_version: String,
    pub ruleset_version: String,
    #[serde(default)]
    pub status: RulesetStatus,
    /// Denormalized count of bound rules. Drift from the real count is an
    /// integrity defect, not something the store prevents.
    #[serde(default)]
    pub rule_count: usize,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RulesetRecord {
    /// `domain rulebook_version/ruleset_version`, for logs and reports.
    pub fn label(&self) -> String {
        format!(
            "{} {}/{}",
            self.domain, self.rulebook_version, self.ruleset_version
        )
    }

    /// Whether `other` competes with this ruleset for the active slot.
    pub fn shares_active_slot(&self, other: &RulesetRecord) -> bool {
        self.domain == other.domain && self.rulebook_version == other.rulebook_version
    }
}

/// Input for creating a ruleset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRuleset {
    pub domain: String,
    #[serde(default = "default_jurisdiction")]
    pub jurisdiction: String,
    pub rulebook_version: String,
    pub ruleset_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewRuleset {
    /// A global-jurisdiction ruleset header.
    pub fn new(
        domain: impl Into<String>,
        rulebook_version: impl Into<String>,
        ruleset_version: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            jurisdiction: default_jurisdiction(),
            rulebook_version: rulebook_version.into(),
            ruleset_version: ruleset_version.into(),
            notes: None,
        }
    }

    /// Restrict the ruleset to one jurisdiction.
    pub fn with_jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.jurisdiction = jurisdiction.into();
        self
    }

    pub(crate) fn validate(&self) -> CorpusResult<()> {
        for (name, value) in [
            ("domain", &self.domain),
            ("jurisdiction", &self.jurisdiction),
            ("rulebook_version", &self.rulebook_version),
            ("ruleset_version", &self.ruleset_version),
        ] {
            if value.trim().is_empty() {
                return Err(CorpusError::InvalidRuleset(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }
}

/// A ruleset whose rules have been turned into typed [`Rule`]s, ready for
/// evaluation. Rule order is ingestion order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRuleset {
    pub id: RulesetId,
    pub domain: String,
    pub jurisdiction: String,
    pub rulebook_version: String,
    pub ruleset_version: String,
    pub rules: Vec<Rule>,
}

impl CompiledRuleset {
    /// Number of compiled rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the ruleset has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
