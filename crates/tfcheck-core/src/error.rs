//! # Error Hierarchy
//!
//! Structured error types shared across tfcheck, built with `thiserror`.
//! Subsystem crates define their own enums (`CorpusError`, `ComparatorError`,
//! `PolicyError`, ...) and wrap these where they cross a boundary.

use thiserror::Error;

/// Top-level error type for the core crate.
#[derive(Error, Debug)]
pub enum TfError {
    /// Canonicalization failure during digest computation.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Domain primitive validation failure.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    /// Amounts and ratios must be strings or integers.
    #[error("float values are not permitted in canonical representations; use string or integer: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Validation errors for domain primitive newtypes and enums parsed from text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Tenant identifier is empty.
    #[error("invalid tenant ID: must be non-empty")]
    InvalidTenantId,

    /// Identifier is not a valid UUID.
    #[error("invalid {kind} \"{value}\": not a UUID")]
    InvalidUuid {
        /// Which identifier was being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    /// Rule severity is not one of `fail`, `warn`, `info`.
    #[error("invalid rule severity \"{0}\" (expected fail, warn or info)")]
    InvalidRuleSeverity(String),

    /// Discrepancy severity is not a known level.
    #[error("invalid severity \"{0}\" (expected critical, major, minor or info)")]
    InvalidSeverity(String),

    /// Document date could not be parsed in any accepted format.
    #[error("invalid document date: \"{0}\"")]
    InvalidDate(String),
}
