#![deny(missing_docs)]

//! # tfcheck-core — Foundational Types
//!
//! Every other crate in the workspace depends on `tfcheck-core`; it depends
//! on nothing internal.
//!
//! ## Design Principles
//!
//! 1. **One discrepancy shape.** [`Discrepancy`] is produced by both the rule
//!    evaluation pipeline and the cross-document check engine, mutated only by
//!    the policy layer, and serialized unchanged to the API layer and the
//!    audit trail.
//!
//! 2. **Typed severities.** Rule authors write [`RuleSeverity`]
//!    (`fail`/`warn`/`info`); evaluation results carry [`Severity`]
//!    (`critical`/`major`/`minor`/`info`), which is what overlays and
//!    exceptions rewrite.
//!
//! 3. **Fail-closed data access.** [`DocumentContext::resolve`] returns
//!    `None` for anything missing, and the typed accessors (`resolve_date`,
//!    `resolve_decimal`) return `None` for unparseable values. Callers turn
//!    `None` into a failing verdict; nothing in this crate panics on
//!    malformed document data.
//!
//! 4. **[`CanonicalBytes`] is the sole path to digest computation.** Audit
//!    events are digested through `CanonicalBytes::new()` → [`sha256_digest`].
//!
//! ## Crate Policy
//!
//! - No `unsafe` code.
//! - No `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod discrepancy;
pub mod document;
pub mod error;
pub mod identity;
pub mod severity;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, sha256_hex, ContentDigest};
pub use discrepancy::{Discrepancy, DocumentLabels, CROSS_DOC_DOMAIN};
pub use document::{DocumentContext, DocumentRef, DocumentType, ScopeContext};
pub use error::{CanonicalizationError, TfError, ValidationError};
pub use identity::{RulesetId, SessionId, TenantId};
pub use severity::{RuleSeverity, Severity};
pub use temporal::{parse_document_date, Clock, ManualClock, SystemClock};
