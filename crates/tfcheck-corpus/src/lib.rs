//! # tfcheck-corpus — Rule Corpus Store
//!
//! Versioned rulesets and the compliance rules bound to them.
//!
//! - [`ruleset`]: ruleset headers, lifecycle status, compiled rulesets.
//! - [`rule`]: stored [`RuleRecord`]s and typed [`Rule`]s.
//! - [`condition`]: the closed [`Condition`] union.
//! - [`store`]: [`CorpusStore`] lifecycle operations and ingestion.
//! - [`bundle`]: YAML/JSON corpus bundle files.
//! - [`integrity`]: the read-only [`IntegrityChecker`].
//!
//! Rules are stored loosely typed so the integrity checker can describe
//! whatever is actually in the corpus; the evaluator only ever sees
//! [`CompiledRuleset`]s, built through [`CorpusStore::compile`].

pub mod bundle;
pub mod condition;
pub mod error;
pub mod integrity;
pub mod rule;
pub mod ruleset;
pub mod store;

pub use bundle::{load_bundle, CorpusBundle};
pub use condition::{Condition, ConditionError, DateOrdering, KNOWN_CONDITION_TYPES};
pub use error::{CorpusError, CorpusResult};
pub use integrity::{DefectKind, Finding, FindingLevel, IntegrityChecker, IntegrityReport};
pub use rule::{ExpectedOutcome, Rule, RuleRecord, RuleRejection, WILDCARD_DOCUMENT_TYPES};
pub use ruleset::{CompiledRuleset, NewRuleset, RulesetRecord, RulesetStatus, GLOBAL_JURISDICTION};
pub use store::{CorpusStore, IngestReport};
