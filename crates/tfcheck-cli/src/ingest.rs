//! # Ingest Subcommand
//!
//! Loads corpus bundles the way the store would in production and prints
//! what happened to every rule: accepted, or rejected with its reasons.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use tfcheck_corpus::CorpusStore;

use crate::{stage_bundle, Activation, StagedBundle, EXIT_FINDINGS};

/// Arguments for the ingest subcommand.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Corpus bundle files (YAML or JSON), loaded in order into one store.
    #[arg(long, required = true, num_args = 1..)]
    pub corpus: Vec<PathBuf>,
}

/// Execute the ingest subcommand.
pub fn run_ingest(args: &IngestArgs) -> Result<u8> {
    let mut store = CorpusStore::new();
    let mut failed = false;
    for path in &args.corpus {
        let staged = stage_bundle(&mut store, path)?;
        failed |= !staged.ingest.is_clean() || staged.activation.is_failure();
        print!("{}", render_staged(&staged));
    }
    Ok(if failed { EXIT_FINDINGS } else { 0 })
}

/// Text summary of one loaded bundle.
pub fn render_staged(staged: &StagedBundle) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}: {}", staged.path.display(), staged.label);
    let _ = writeln!(out, "  ruleset id: {}", staged.ruleset_id);
    let _ = writeln!(
        out,
        "  accepted: {}  rejected: {}",
        staged.ingest.accepted,
        staged.ingest.rejected.len()
    );
    for rejection in &staged.ingest.rejected {
        let _ = writeln!(out, "  REJECTED {rejection}");
    }
    let status = match &staged.activation {
        Activation::NotRequested => "draft".to_string(),
        Activation::Deprecated => "deprecated".to_string(),
        Activation::Activated { demoted } if demoted.is_empty() => "active".to_string(),
        Activation::Activated { demoted } => format!("active (deprecated {})", demoted.len()),
        Activation::SkippedRejected => "draft (activation skipped: rejected rules)".to_string(),
        Activation::Blocked { defects } => {
            let mut s = format!("draft (activation blocked by {} defect(s))", defects.len());
            for d in defects {
                s.push_str("\n    ");
                s.push_str(d);
            }
            s
        }
    };
    let _ = writeln!(out, "  status: {status}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{write, CORPUS};

    #[test]
    fn clean_bundle_exits_zero() {
        let dir = tempfile::tempdir().unwrap();
        let args = IngestArgs {
            corpus: vec![write(dir.path(), "ucp.yaml", CORPUS)],
        };
        assert_eq!(run_ingest(&args).unwrap(), 0);
    }

    #[test]
    fn rejected_rules_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        let broken = format!("{CORPUS}  - rule_id: UCP600-99\n    severity: urgent\n");
        let path = write(dir.path(), "broken.yaml", &broken);
        let args = IngestArgs { corpus: vec![path.clone()] };
        assert_eq!(run_ingest(&args).unwrap(), EXIT_FINDINGS);

        let mut store = CorpusStore::new();
        let text = render_staged(&stage_bundle(&mut store, &path).unwrap());
        assert!(text.contains("accepted: 1  rejected: 1"));
        assert!(text.contains("REJECTED rule #1 (UCP600-99)"));
        assert!(text.contains("activation skipped"));
    }

    #[test]
    fn duplicate_version_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.yaml", CORPUS);
        let b = write(dir.path(), "b.yaml", CORPUS);
        let args = IngestArgs { corpus: vec![a, b] };
        assert!(run_ingest(&args).is_err());
    }
}
