//! Comparator error types.
//!
//! These never leave [`SemanticComparator::compare`](crate::SemanticComparator::compare):
//! every variant is turned into a lexical fallback whose `degraded_reason`
//! carries the rendered error.

use thiserror::Error;

/// Failure of the high-fidelity comparison path.
#[derive(Debug, Error)]
pub enum ComparatorError {
    /// The call did not complete within the configured budget.
    #[error("high-fidelity comparator timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Transport-level failure.
    #[error("HTTP request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("comparator returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response could not be read as a verdict.
    #[error("malformed comparator response: {0}")]
    Malformed(String),

    /// The verdict carried a confidence outside `[0, 1]`.
    #[error("comparator confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),

    /// The comparator could not be constructed from configuration.
    #[error("comparator not configured: {0}")]
    NotConfigured(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_detail() {
        assert_eq!(
            ComparatorError::Timeout { elapsed_ms: 800 }.to_string(),
            "high-fidelity comparator timed out after 800ms"
        );
        assert!(ComparatorError::ConfidenceOutOfRange(1.7)
            .to_string()
            .contains("1.7"));
    }
}
