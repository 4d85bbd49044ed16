//! # tfcheck CLI entry point
//!
//! Parses command-line arguments, initializes logging, and dispatches to
//! the subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tfcheck_cli::audit::{run_audit_corpus, AuditCorpusArgs};
use tfcheck_cli::ingest::{run_ingest, IngestArgs};
use tfcheck_cli::validate::{run_validate, ValidateArgs};

/// tfcheck: documentary-credit compliance checking.
///
/// Evaluates presentations against a versioned rule corpus, runs
/// cross-document consistency checks, and applies tenant policy.
#[derive(Parser, Debug)]
#[command(name = "tfcheck", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Path to the engine configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a presentation against the corpus and tenant policy.
    Validate(ValidateArgs),

    /// Load corpus bundles and report rejected rules.
    Ingest(IngestArgs),

    /// Run the ruleset integrity checker over corpus bundles.
    AuditCorpus(AuditCorpusArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let result = match &cli.command {
        Commands::Validate(args) => run_validate(args, cli.config.as_deref()),
        Commands::Ingest(args) => run_ingest(args),
        Commands::AuditCorpus(args) => run_audit_corpus(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn filter_for(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: u8, json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter_for(verbose))
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_validate() {
        let cli = Cli::try_parse_from([
            "tfcheck",
            "validate",
            "--corpus",
            "ucp600.yaml",
            "isbp745.yaml",
            "--context",
            "ctx.json",
            "--policy",
            "bank-a.yaml",
        ])
        .unwrap();
        let Commands::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(
            args.corpus,
            vec![PathBuf::from("ucp600.yaml"), PathBuf::from("isbp745.yaml")]
        );
        assert_eq!(args.context, PathBuf::from("ctx.json"));
        assert_eq!(args.policy, Some(PathBuf::from("bank-a.yaml")));
        assert!(!args.json);
    }

    #[test]
    fn cli_parse_validate_requires_context_and_corpus() {
        assert!(Cli::try_parse_from(["tfcheck", "validate", "--corpus", "a.yaml"]).is_err());
        assert!(Cli::try_parse_from(["tfcheck", "validate", "--context", "c.json"]).is_err());
    }

    #[test]
    fn cli_parse_audit_corpus() {
        let cli =
            Cli::try_parse_from(["tfcheck", "audit-corpus", "--corpus", "a.yaml", "--json"]).unwrap();
        let Commands::AuditCorpus(args) = cli.command else {
            panic!("expected audit-corpus");
        };
        assert!(args.json);
        assert!(!args.active_only);
    }

    #[test]
    fn cli_parse_ingest() {
        let cli = Cli::try_parse_from(["tfcheck", "ingest", "--corpus", "a.yaml"]).unwrap();
        assert!(matches!(cli.command, Commands::Ingest(_)));
    }

    #[test]
    fn cli_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "tfcheck",
            "-vv",
            "--log-json",
            "--config",
            "tfcheck.yaml",
            "ingest",
            "--corpus",
            "a.yaml",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.log_json);
        assert_eq!(cli.config, Some(PathBuf::from("tfcheck.yaml")));
    }

    #[test]
    fn cli_parse_no_subcommand_errors() {
        assert!(Cli::try_parse_from(["tfcheck"]).is_err());
    }
}
