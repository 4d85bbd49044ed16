//! # Validate Subcommand
//!
//! Runs one presentation through the active rulesets, the cross-document
//! checks and the tenant's policy, then prints the report.
//!
//! ```bash
//! tfcheck validate --corpus corpus/ucp600.yaml --context presentation.json
//! tfcheck --config tfcheck.yaml validate --corpus corpus/ucp600.yaml \
//!     --context presentation.json --policy policy/bank-a.yaml --json
//! ```

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use tfcheck_core::{Discrepancy, DocumentContext, TenantId};
use tfcheck_engine::{EngineConfig, ValidationEngine, ValidationReport};
use tfcheck_policy::{InMemoryPolicyProvider, PolicyDocument};

use crate::{load_corpus, read_document, EXIT_FINDINGS};

/// Arguments for the validate subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Corpus bundle files (YAML or JSON).
    #[arg(long, required = true, num_args = 1..)]
    pub corpus: Vec<PathBuf>,

    /// Document context: extracted fields, documents, tenant and scope.
    #[arg(long)]
    pub context: PathBuf,

    /// Tenant policy file with overlays and exceptions.
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Override the context's tenant.
    #[arg(long)]
    pub tenant: Option<String>,

    /// Override the context's jurisdiction.
    #[arg(long)]
    pub jurisdiction: Option<String>,

    /// Print the full report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute the validate subcommand.
pub fn run_validate(args: &ValidateArgs, config_path: Option<&Path>) -> Result<u8> {
    let config = EngineConfig::load(config_path).context("loading engine configuration")?;
    let store = load_corpus(&args.corpus)?;

    let mut ctx: DocumentContext = read_document(&args.context)?;
    if let Some(tenant) = &args.tenant {
        ctx.tenant_id = Some(TenantId::new(tenant)?);
    }
    if let Some(jurisdiction) = &args.jurisdiction {
        ctx.jurisdiction = Some(jurisdiction.clone());
    }

    let provider = match &args.policy {
        Some(path) => InMemoryPolicyProvider::from_document(read_document::<PolicyDocument>(path)?),
        None => InMemoryPolicyProvider::new(),
    };
    let engine = ValidationEngine::from_config(&config, Arc::new(provider))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let report = runtime.block_on(engine.validate(&store, &ctx))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(if report.has_failures() { EXIT_FINDINGS } else { 0 })
}

/// Operator-facing text rendering of a report.
pub fn render_report(report: &ValidationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Validation session {}", report.session_id);
    if let Some(tenant) = &report.tenant_id {
        let _ = writeln!(out, "  tenant:   {tenant}");
    }
    for r in &report.rulesets {
        let _ = writeln!(
            out,
            "  ruleset:  {} {}/{} ({} rules)",
            r.domain, r.rulebook_version, r.ruleset_version, r.rules
        );
    }
    let _ = writeln!(
        out,
        "  checks:   {}  failing: {}",
        report.discrepancies.len(),
        report.after.discrepancies
    );
    if let Some(applied) = report.policy_applied {
        let _ = writeln!(
            out,
            "  policy:   {} (failing before policy: {})",
            applied.as_str(),
            report.before.discrepancies
        );
    }
    out.push('\n');

    if report.issues.issue_cards.is_empty() && report.issues.references.is_empty() {
        out.push_str("OK: no discrepancies\n");
        return out;
    }
    render_section(&mut out, "Issues", &report.issues.issue_cards);
    render_section(&mut out, "References", &report.issues.references);
    out
}

fn render_section(out: &mut String, heading: &str, items: &[Discrepancy]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "{heading}");
    for d in items {
        let _ = writeln!(out, "  [{}] {}  {}", d.severity, d.rule, d.title);
        if !d.message.is_empty() {
            let _ = writeln!(out, "      {}", d.message);
        }
        let _ = writeln!(out, "      expected:  {}", d.expected);
        let _ = writeln!(out, "      found:     {}", d.actual);
        if !d.document_names.is_empty() {
            let _ = writeln!(out, "      documents: {}", d.document_names.join(", "));
        }
        if let Some(fix) = &d.suggested_fix {
            let _ = writeln!(out, "      fix:       {fix}");
        }
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{write, CORPUS};

    const CONTEXT: &str = r#"{
        "fields": {
            "lc": {"amount": "100,000.00", "currency": "USD", "tolerance": "5%"},
            "invoice": {"total_amount": "106,000.00", "currency": "USD"}
        },
        "documents": [
            {"id": "doc-inv", "filename": "invoice_0412.pdf", "document_type": "invoice"}
        ],
        "tenant_id": "bank-a"
    }"#;

    fn args(dir: &Path, policy: Option<PathBuf>) -> ValidateArgs {
        ValidateArgs {
            corpus: vec![write(dir, "ucp.yaml", CORPUS)],
            context: write(dir, "ctx.json", CONTEXT),
            policy,
            tenant: None,
            jurisdiction: None,
            json: true,
        }
    }

    #[test]
    fn failing_presentation_exits_with_findings() {
        let dir = tempfile::tempdir().unwrap();
        let code = run_validate(&args(dir.path(), None), None).unwrap();
        assert_eq!(code, EXIT_FINDINGS);
    }

    #[test]
    fn waived_presentation_exits_clean() {
        let dir = tempfile::tempdir().unwrap();
        let policy = write(
            dir.path(),
            "policy.yaml",
            r#"
exceptions:
  - exception_id: ex-1
    tenant_id: bank-a
    rule_code: UCP600-18B
    effect: waive
    created_at: "2026-01-01T00:00:00Z"
  - exception_id: ex-2
    tenant_id: bank-a
    rule_code: CROSSDOC-AMOUNT-1
    effect: override
    created_at: "2026-01-01T00:00:00Z"
"#,
        );
        let code = run_validate(&args(dir.path(), Some(policy)), None).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn missing_context_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path(), None);
        a.context = dir.path().join("missing.json");
        assert!(run_validate(&a, None).is_err());
    }

    #[test]
    fn render_lists_issue_cards_before_references() {
        let report = ValidationReport {
            session_id: tfcheck_core::SessionId::new(),
            tenant_id: None,
            rulesets: vec![],
            evaluated: vec![],
            discrepancies: vec![],
            before: Default::default(),
            after: Default::default(),
            policy_applied: None,
            issues: partition(),
            audit_events_written: 0,
        };
        let text = render_report(&report);
        let issues = text.find("Issues").unwrap();
        let refs = text.find("References").unwrap();
        assert!(issues < refs);
        assert!(text.contains("[critical] CROSSDOC-AMOUNT-1"));
        assert!(text.contains("expected:  <= 105,000.00 USD"));
    }

    #[test]
    fn render_empty_report() {
        let report = ValidationReport {
            session_id: tfcheck_core::SessionId::new(),
            tenant_id: None,
            rulesets: vec![],
            evaluated: vec![],
            discrepancies: vec![],
            before: Default::default(),
            after: Default::default(),
            policy_applied: None,
            issues: Default::default(),
            audit_events_written: 0,
        };
        assert!(render_report(&report).contains("OK: no discrepancies"));
    }

    fn partition() -> tfcheck_eval::IssuePartition {
        use tfcheck_core::{Severity, CROSS_DOC_DOMAIN};
        let card = Discrepancy::new("CROSSDOC-AMOUNT-1", "Invoice amount exceeds credit amount", CROSS_DOC_DOMAIN)
            .with_outcome(false, Severity::Critical, "<= 105,000.00 USD", "106,000.00 USD");
        let reference = Discrepancy::new("UCP600-18B", "Invoice within credit amount", "icc.ucp600")
            .with_outcome(false, Severity::Critical, "<= 100000", "106000");
        tfcheck_eval::partition_issues(&[reference, card])
    }
}
