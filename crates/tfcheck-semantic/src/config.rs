//! Comparator configuration.
//!
//! Defaults keep the AI path off: a fresh deployment compares text with the
//! goods-line heuristic and lexical similarity only.

use serde::{Deserialize, Serialize};
use url::Url;
use zeroize::Zeroizing;

/// Default high-fidelity call budget.
pub const DEFAULT_TIMEOUT_MS: u64 = 800;
/// Default match threshold when a condition does not set one.
pub const DEFAULT_THRESHOLD: f64 = 0.82;
/// Default cache entry lifetime.
pub const DEFAULT_CACHE_TTL_DAYS: i64 = 7;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_cache_ttl_days() -> i64 {
    DEFAULT_CACHE_TTL_DAYS
}

fn default_model() -> String {
    "compare-v1".to_string()
}

/// Settings for the semantic comparator.
///
/// Custom `Debug` implementation redacts `api_key`. The key is never read
/// from or written to configuration files; it is supplied through the
/// environment.
#[derive(Clone, Serialize, Deserialize)]
pub struct ComparatorConfig {
    /// Whether to call the high-fidelity comparator at all.
    #[serde(default)]
    pub ai_enabled: bool,
    /// Endpoint of the high-fidelity comparator.
    #[serde(default)]
    pub endpoint: Option<Url>,
    /// Bearer token for the endpoint.
    #[serde(skip)]
    pub api_key: Option<Zeroizing<String>>,
    /// Model identifier forwarded to the endpoint.
    #[serde(default = "default_model")]
    pub model: String,
    /// Budget for one high-fidelity call, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Threshold used when the caller supplies none.
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,
    /// Cache entry lifetime in days.
    #[serde(default = "default_cache_ttl_days")]
    pub cache_ttl_days: i64,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            ai_enabled: false,
            endpoint: None,
            api_key: None,
            model: default_model(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            default_threshold: DEFAULT_THRESHOLD,
            cache_ttl_days: DEFAULT_CACHE_TTL_DAYS,
        }
    }
}

impl std::fmt::Debug for ComparatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparatorConfig")
            .field("ai_enabled", &self.ai_enabled)
            .field("endpoint", &self.endpoint.as_ref().map(Url::as_str))
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("timeout_ms", &self.timeout_ms)
            .field("default_threshold", &self.default_threshold)
            .field("cache_ttl_days", &self.cache_ttl_days)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_api_key() {
        let cfg = ComparatorConfig {
            api_key: Some(Zeroizing::new("sk-very-secret".into())),
            ..ComparatorConfig::default()
        };
        let dbg = format!("{cfg:?}");
        assert!(dbg.contains("[REDACTED]"));
        assert!(!dbg.contains("sk-very-secret"));
    }

    #[test]
    fn defaults_apply_to_partial_documents() {
        let cfg: ComparatorConfig =
            serde_json::from_value(serde_json::json!({"ai_enabled": true})).unwrap();
        assert!(cfg.ai_enabled);
        assert_eq!(cfg.timeout_ms, 800);
        assert_eq!(cfg.default_threshold, 0.82);
        assert_eq!(cfg.cache_ttl_days, 7);
        assert!(cfg.api_key.is_none());
    }
}
