//! # tfcheck-eval — Evaluation
//!
//! Turns compiled rules plus a [`DocumentContext`](tfcheck_core::DocumentContext)
//! into discrepancies.
//!
//! - [`condition`]: one typed condition → `(passed, expected, actual)`.
//!   Missing or unparseable data fails closed.
//! - [`pipeline`]: every applicable rule of every ruleset, in stable order.
//!   A rule is the AND of its conditions.
//! - [`crossdoc`]: the fixed cross-document checks (goods, amount,
//!   insurance, B/L parties).
//! - [`partition`]: issue cards vs technical references.
//!
//! Nothing in this crate returns an error for bad document data; the
//! [`SemanticComparator`](tfcheck_semantic::SemanticComparator) degrades
//! internally, so evaluation is infallible once rules are compiled.

pub mod condition;
pub mod crossdoc;
pub mod partition;
pub mod pipeline;

pub use condition::{evaluate, evaluate_static, ConditionOutcome};
pub use crossdoc::{money, parse_tolerance, CrossDocChecker};
pub use partition::{partition_issues, IssuePartition};
pub use pipeline::{combine_outcomes, evaluate_rule, evaluate_rulesets, RuleVerdict};
