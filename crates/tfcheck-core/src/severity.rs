//! # Severities
//!
//! Two scales exist. Rule authors classify rules with [`RuleSeverity`]
//! (`fail`, `warn`, `info`). Evaluation results carry a [`Severity`], the
//! scale that policy overlays and exceptions rewrite.
//!
//! ```text
//! RuleSeverity::Fail -> Severity::Critical
//! RuleSeverity::Warn -> Severity::Major
//! RuleSeverity::Info -> Severity::Info
//!
//! downgrade: Critical -> Major -> Minor (floor); Info stays Info
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Severity assigned to a rule in the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSeverity {
    /// Non-compliance blocks presentation.
    Fail,
    /// Non-compliance should be reviewed.
    Warn,
    /// Informational only.
    Info,
}

impl RuleSeverity {
    /// All allowed values, in declaration order.
    pub const ALL: [RuleSeverity; 3] = [Self::Fail, Self::Warn, Self::Info];

    /// The wire string for this severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Warn => "warn",
            Self::Info => "info",
        }
    }

    /// Severity a failing result of this rule is reported with.
    pub fn discrepancy_severity(self) -> Severity {
        match self {
            Self::Fail => Severity::Critical,
            Self::Warn => Severity::Major,
            Self::Info => Severity::Info,
        }
    }
}

impl FromStr for RuleSeverity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            _ => Err(ValidationError::InvalidRuleSeverity(s.to_string())),
        }
    }
}

impl fmt::Display for RuleSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity carried by a [`Discrepancy`](crate::Discrepancy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocking discrepancy.
    #[serde(alias = "fail")]
    Critical,
    /// Significant discrepancy requiring review.
    #[serde(alias = "warn", alias = "warning")]
    Major,
    /// Minor discrepancy.
    Minor,
    /// Informational.
    Info,
}

impl Severity {
    /// Every level, most severe first. Used as histogram keys.
    pub const ALL: [Severity; 4] = [Self::Critical, Self::Major, Self::Minor, Self::Info];

    /// The wire string for this severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Info => "info",
        }
    }

    /// One-step monotonic softening: critical → major → minor.
    ///
    /// `Minor` is the floor of the softening chain and `Info` is left alone,
    /// so a downgrade never makes a discrepancy more severe.
    pub fn downgrade(self) -> Self {
        match self {
            Self::Critical => Self::Major,
            Self::Major | Self::Minor => Self::Minor,
            Self::Info => Self::Info,
        }
    }
}

impl FromStr for Severity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" | "fail" => Ok(Self::Critical),
            "major" | "warn" | "warning" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "info" => Ok(Self::Info),
            _ => Err(ValidationError::InvalidSeverity(s.to_string())),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
