//! # Audit-Corpus Subcommand
//!
//! Loads corpus bundles and runs the ruleset integrity checker over the
//! resulting store. Exits with status 2 when any error-level defect exists.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use tfcheck_corpus::{CorpusStore, IntegrityChecker, IntegrityReport};

use crate::{stage_bundle, EXIT_FINDINGS};

/// Arguments for the audit-corpus subcommand.
#[derive(Args, Debug)]
pub struct AuditCorpusArgs {
    /// Corpus bundle files (YAML or JSON).
    #[arg(long, required = true, num_args = 1..)]
    pub corpus: Vec<PathBuf>,

    /// Limit rule-level checks to active rulesets.
    #[arg(long)]
    pub active_only: bool,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute the audit-corpus subcommand.
pub fn run_audit_corpus(args: &AuditCorpusArgs) -> Result<u8> {
    let report = audit_files(args)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(if report.is_clean() { 0 } else { EXIT_FINDINGS })
}

/// Load the files and check the store.
pub fn audit_files(args: &AuditCorpusArgs) -> Result<IntegrityReport> {
    let mut store = CorpusStore::new();
    for path in &args.corpus {
        let staged = stage_bundle(&mut store, path)?;
        tracing::debug!(
            path = %path.display(),
            ruleset = %staged.label,
            accepted = staged.ingest.accepted,
            rejected = staged.ingest.rejected.len(),
            "bundle staged for audit"
        );
    }
    Ok(IntegrityChecker::new()
        .include_inactive(!args.active_only)
        .check(&store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{write, CORPUS};

    #[test]
    fn clean_corpus_passes() {
        let dir = tempfile::tempdir().unwrap();
        let args = AuditCorpusArgs {
            corpus: vec![write(dir.path(), "ucp.yaml", CORPUS)],
            active_only: false,
            json: true,
        };
        let report = audit_files(&args).unwrap();
        assert!(report.is_clean(), "{}", report.render_text());
        assert_eq!(report.rulesets_checked, 1);
        assert_eq!(report.rules_checked, 1);
        assert_eq!(run_audit_corpus(&args).unwrap(), 0);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = AuditCorpusArgs {
            corpus: vec![dir.path().join("absent.yaml")],
            active_only: false,
            json: false,
        };
        assert!(run_audit_corpus(&args).is_err());
    }
}
