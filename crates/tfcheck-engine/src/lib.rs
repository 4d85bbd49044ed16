//! # tfcheck-engine — Validation Runs
//!
//! Wires the corpus, the evaluator, the cross-document checks, tenant
//! policy and the audit trail into one [`ValidationEngine`], configured
//! by [`EngineConfig`] (YAML plus `TFCHECK_*` environment overrides).
//!
//! Cross-crate behaviour (ordering, idempotence, policy interplay) is
//! covered by the integration tests under `tests/`.

pub mod config;
pub mod engine;
pub mod error;

pub use config::{AuditConfig, AuditSinkKind, EngineConfig, EvaluationConfig};
pub use engine::{RulesetSummary, ValidationEngine, ValidationReport};
pub use error::{ConfigError, EngineError};
