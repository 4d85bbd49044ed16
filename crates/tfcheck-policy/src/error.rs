//! Error types for the policy layer and the audit writer.

use std::path::PathBuf;

use thiserror::Error;

use tfcheck_core::{CanonicalizationError, TenantId};

/// Errors raised while loading or applying tenant policy.
#[derive(Error, Debug)]
pub enum PolicyError {
    /// The policy backend could not be read.
    #[error("policy provider unavailable for tenant {tenant}: {detail}")]
    ProviderUnavailable { tenant: TenantId, detail: String },

    /// More than one overlay is marked active for a tenant.
    #[error("tenant {tenant} has {count} active overlays; at most one is allowed")]
    ConflictingOverlays { tenant: TenantId, count: usize },

    /// An exception record cannot be applied.
    #[error("invalid exception {exception_id}: {detail}")]
    InvalidException { exception_id: String, detail: String },
}

/// Errors raised by audit sinks.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize audit event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to canonicalize audit event: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// The sink refuses writes (e.g. a backing store is down).
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}
