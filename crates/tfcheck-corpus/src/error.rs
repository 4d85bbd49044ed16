//! Corpus error types.
//!
//! Structured errors for ruleset lifecycle operations and corpus file
//! loading. Per-rule ingestion failures are not errors: they are collected
//! into an [`IngestReport`](crate::IngestReport) so one malformed rule does
//! not hide the others.

use std::path::PathBuf;

use thiserror::Error;

use tfcheck_core::RulesetId;

/// Errors that can occur during corpus operations.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// YAML parsing failed.
    #[error("failed to parse YAML at {path}: {source}")]
    YamlParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// JSON parsing failed.
    #[error("failed to parse JSON at {path}: {source}")]
    JsonParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A corpus file was not found.
    #[error("corpus file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// A corpus bundle is structurally unusable (missing `ruleset` header, `rules` not a list).
    #[error("invalid corpus bundle at {path}: {detail}")]
    InvalidBundle { path: PathBuf, detail: String },

    /// No ruleset with this id exists.
    #[error("unknown ruleset {0}")]
    UnknownRuleset(RulesetId),

    /// A ruleset with the same (domain, rulebook_version, ruleset_version) already exists.
    #[error("ruleset {domain} {rulebook_version}/{ruleset_version} already exists as {existing}")]
    DuplicateVersion {
        domain: String,
        rulebook_version: String,
        ruleset_version: String,
        existing: RulesetId,
    },

    /// The ruleset header itself is invalid.
    #[error("invalid ruleset header: {0}")]
    InvalidRuleset(String),

    /// Integrity defects prevent promoting the ruleset to active.
    #[error("ruleset {ruleset} cannot be activated: {} defect(s): {}", defects.len(), defects.join("; "))]
    ActivationBlocked {
        ruleset: RulesetId,
        defects: Vec<String>,
    },

    /// Bound rule records could not be compiled into typed rules.
    #[error("ruleset {ruleset} failed to compile: {} rule(s) rejected", rejections.len())]
    Compile {
        ruleset: RulesetId,
        rejections: Vec<crate::RuleRejection>,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for corpus operations.
pub type CorpusResult<T> = Result<T, CorpusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_blocked_lists_defects() {
        let err = CorpusError::ActivationBlocked {
            ruleset: RulesetId::new(),
            defects: vec!["rule R-1: missing title".into(), "zero rules".into()],
        };
        let msg = format!("{err}");
        assert!(msg.contains("2 defect(s)"));
        assert!(msg.contains("missing title; zero rules"));
    }

    #[test]
    fn file_not_found_display() {
        let err = CorpusError::FileNotFound {
            path: PathBuf::from("/tmp/missing.yaml"),
        };
        assert!(format!("{err}").contains("/tmp/missing.yaml"));
    }
}
