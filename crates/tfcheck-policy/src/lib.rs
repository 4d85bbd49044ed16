//! # tfcheck-policy — Tenant Policy and Audit
//!
//! Applied once per validation run, after the full discrepancy list exists:
//!
//! ```text
//! discrepancies ──► overlay phase ──► exception phase ──► final list
//!        │                                                  │
//!        └──────── before metrics          after metrics ◄──┘
//!                              │
//!                              ▼
//!                    PolicyApplicationEvent(s) ──► AuditSink
//! ```
//!
//! - [`overlay`]: tenant-wide severity override.
//! - [`exception`]: scoped waive / downgrade / override per rule code.
//! - [`apply`]: the two phases, in order, plus [`PolicyEngine`].
//! - [`metrics`]: failing-discrepancy counts and their delta.
//! - [`audit`]: events, sinks and the best-effort writer.
//! - [`provider`]: where a tenant's overlay and exceptions come from.

pub mod apply;
pub mod audit;
pub mod error;
pub mod exception;
pub mod metrics;
pub mod overlay;
pub mod provider;

pub use apply::{
    apply_policy, ApplicationType, ExceptionApplication, OverlayApplication, PolicyEngine,
    PolicyOutcome,
};
pub use audit::{
    events_for_run, AuditSink, AuditWriter, InMemoryAuditSink, JsonlAuditSink, NullAuditSink,
    PolicyApplicationEvent,
};
pub use error::{AuditError, PolicyError};
pub use exception::{sort_exceptions, ExceptionEffect, ExceptionScope, PolicyException};
pub use metrics::{DiscrepancyMetrics, MetricsDelta};
pub use overlay::{OverlayThresholds, PolicyOverlay, StricterChecks};
pub use provider::{InMemoryPolicyProvider, PolicyDocument, PolicyProvider};
