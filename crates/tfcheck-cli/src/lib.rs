//! # tfcheck-cli — Command-Line Interface
//!
//! Provides the `tfcheck` binary. Argument parsing lives in the subcommand
//! modules; the work itself is delegated to the library crates.
//!
//! ## Subcommands
//!
//! - `tfcheck validate`: Run a presentation through the rule corpus,
//!   cross-document checks and tenant policy.
//! - `tfcheck ingest`: Load corpus bundles and report per-rule rejections.
//! - `tfcheck audit-corpus`: Ruleset integrity report, as text or JSON.
//!
//! ```bash
//! tfcheck validate --corpus corpus/ucp600.yaml --context presentation.json --policy bank-a.yaml
//! tfcheck ingest --corpus corpus/ucp600.yaml
//! tfcheck audit-corpus --corpus corpus/ucp600.yaml corpus/isbp745.yaml --json
//! ```
//!
//! ## Exit Codes
//!
//! `0` success, `1` operational error, `2` the run completed but found
//! failing discrepancies, rejected rules, or integrity errors.

pub mod audit;
pub mod ingest;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use tfcheck_core::RulesetId;
use tfcheck_corpus::{load_bundle, CorpusError, CorpusStore, IngestReport, RulesetStatus};

/// Exit code for a completed run with blocking findings.
pub const EXIT_FINDINGS: u8 = 2;

/// Read a YAML or JSON document. `.json` files are parsed as JSON,
/// anything else as YAML.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse JSON at {}", path.display()))
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse YAML at {}", path.display()))
    }
}

/// What happened to a bundle's requested status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// The bundle asked to stay in draft.
    NotRequested,
    /// Activated; the listed rulesets were demoted to deprecated.
    Activated { demoted: Vec<RulesetId> },
    /// Activation was requested but some rules were rejected at ingest.
    SkippedRejected,
    /// The integrity gate refused activation.
    Blocked { defects: Vec<String> },
    /// The bundle asked to be stored as deprecated.
    Deprecated,
}

impl Activation {
    /// Whether the bundle ended up somewhere other than where it asked to be.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::SkippedRejected | Self::Blocked { .. })
    }
}

/// One corpus file after loading.
#[derive(Debug, Clone)]
pub struct StagedBundle {
    pub path: PathBuf,
    pub ruleset_id: RulesetId,
    pub label: String,
    pub ingest: IngestReport,
    pub activation: Activation,
}

/// Load a corpus file into `store`, reporting rejected rules and a blocked
/// activation instead of failing on them.
///
/// # Errors
///
/// Unreadable or structurally invalid files and duplicate ruleset versions.
pub fn stage_bundle(store: &mut CorpusStore, path: &Path) -> Result<StagedBundle> {
    let bundle = load_bundle(path)?;
    let requested = bundle.status;
    let ruleset_id = store
        .create_ruleset(bundle.ruleset)
        .with_context(|| format!("creating ruleset from {}", path.display()))?;
    let ingest = store.ingest_rules(ruleset_id, bundle.rules)?;
    let activation = match requested {
        RulesetStatus::Draft => Activation::NotRequested,
        RulesetStatus::Deprecated => {
            store.deprecate_ruleset(ruleset_id)?;
            Activation::Deprecated
        }
        RulesetStatus::Active if !ingest.is_clean() => Activation::SkippedRejected,
        RulesetStatus::Active => match store.activate_ruleset(ruleset_id) {
            Ok(demoted) => Activation::Activated { demoted },
            Err(CorpusError::ActivationBlocked { defects, .. }) => Activation::Blocked { defects },
            Err(e) => return Err(e.into()),
        },
    };
    let label = store
        .ruleset(ruleset_id)
        .map(|r| r.label())
        .unwrap_or_else(|| ruleset_id.to_string());
    Ok(StagedBundle {
        path: path.to_path_buf(),
        ruleset_id,
        label,
        ingest,
        activation,
    })
}

/// Load every corpus file into a fresh store. Bundles that could not be
/// activated are kept as drafts and reported at `warn`.
pub fn load_corpus(paths: &[PathBuf]) -> Result<CorpusStore> {
    let mut store = CorpusStore::new();
    for path in paths {
        let staged = stage_bundle(&mut store, path)?;
        if staged.activation.is_failure() {
            tracing::warn!(
                path = %path.display(),
                ruleset = %staged.label,
                rejected = staged.ingest.rejected.len(),
                "corpus bundle not activated; its rules will not run"
            );
        }
    }
    Ok(store)
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::path::{Path, PathBuf};

    pub const CORPUS: &str = r#"
ruleset:
  domain: icc.ucp600
  rulebook_version: "UCP600:2007"
  ruleset_version: "1.0.0"
  status: active
rules:
  - rule_id: UCP600-18B
    document_type: commercial_invoice
    severity: fail
    title: Invoice within credit amount
    conditions:
      - type: numeric_range
        field: invoice.total_amount
        max: 100000
    expected_outcome:
      invalid: Invoice amount exceeds the credit amount
    deterministic: true
    requires_llm: false
"#;

    pub fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::{write, CORPUS};
    use super::*;

    #[test]
    fn read_document_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = write(dir.path(), "a.json", r#"{"x": 1}"#);
        let yaml = write(dir.path(), "a.yaml", "x: 1\n");
        let a: serde_json::Value = read_document(&json).unwrap();
        let b: serde_json::Value = read_document(&yaml).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn read_document_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write(dir.path(), "bad.json", "{");
        let err = read_document::<serde_json::Value>(&bad).unwrap_err();
        assert!(format!("{err:#}").contains("bad.json"));
    }

    #[test]
    fn stage_bundle_activates_clean_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "ucp.yaml", CORPUS);
        let mut store = CorpusStore::new();
        let staged = stage_bundle(&mut store, &path).unwrap();
        assert_eq!(staged.ingest.accepted, 1);
        assert_eq!(staged.activation, Activation::Activated { demoted: vec![] });
        assert_eq!(staged.label, "icc.ucp600 UCP600:2007/1.0.0");
        assert_eq!(store.active_rulesets(&[]).len(), 1);
    }

    #[test]
    fn stage_bundle_keeps_partly_rejected_bundle_in_draft() {
        let dir = tempfile::tempdir().unwrap();
        let broken = format!("{CORPUS}  - rule_id: UCP600-99\n    severity: urgent\n");
        let path = write(dir.path(), "broken.yaml", &broken);
        let mut store = CorpusStore::new();
        let staged = stage_bundle(&mut store, &path).unwrap();
        assert_eq!(staged.ingest.rejected.len(), 1);
        assert_eq!(staged.activation, Activation::SkippedRejected);
        assert!(store.active_rulesets(&[]).is_empty());
    }

    #[test]
    fn load_corpus_fails_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_corpus(&[dir.path().join("nope.yaml")]).is_err());
    }
}
