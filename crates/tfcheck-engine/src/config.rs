//! # Engine Configuration
//!
//! One YAML document, every section optional:
//!
//! ```yaml
//! comparator:
//!   ai_enabled: true
//!   endpoint: https://compare.example.net/v1/compare
//!   timeout_ms: 800
//! audit:
//!   sink: jsonl
//!   path: /var/log/tfcheck/policy_audit.jsonl
//! evaluation:
//!   domains: [icc.ucp600, icc.isbp745]
//!   jurisdiction: AE
//! ```
//!
//! Environment variables override the file:
//!
//! | Variable | Setting |
//! |---|---|
//! | `TFCHECK_AI_ENABLED` | `comparator.ai_enabled` (`true`/`false`/`1`/`0`) |
//! | `TFCHECK_AI_ENDPOINT` | `comparator.endpoint` |
//! | `TFCHECK_AI_API_KEY` | comparator bearer token (environment only) |
//! | `TFCHECK_AI_MODEL` | `comparator.model` |
//! | `TFCHECK_AI_TIMEOUT_MS` | `comparator.timeout_ms` |
//! | `TFCHECK_AUDIT_PATH` | `audit.path`, and selects the `jsonl` sink |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;
use zeroize::Zeroizing;

use tfcheck_semantic::ComparatorConfig;

use crate::error::ConfigError;

pub const ENV_AI_ENABLED: &str = "TFCHECK_AI_ENABLED";
pub const ENV_AI_ENDPOINT: &str = "TFCHECK_AI_ENDPOINT";
pub const ENV_AI_API_KEY: &str = "TFCHECK_AI_API_KEY";
pub const ENV_AI_MODEL: &str = "TFCHECK_AI_MODEL";
pub const ENV_AI_TIMEOUT_MS: &str = "TFCHECK_AI_TIMEOUT_MS";
pub const ENV_AUDIT_PATH: &str = "TFCHECK_AUDIT_PATH";

/// Where policy audit events go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    #[default]
    Memory,
    Jsonl,
    Disabled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Required for `jsonl`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Ruleset domains to run, in order. Empty runs every active ruleset.
    #[serde(default)]
    pub domains: Vec<String>,
    /// Run jurisdiction when the document context carries none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    #[serde(default = "default_true")]
    pub cross_doc_enabled: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            jurisdiction: None,
            cross_doc_enabled: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Full engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub comparator: ComparatorConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

impl EngineConfig {
    /// Read a YAML file (if given), apply the process environment, validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text, path)
    }

    pub fn from_yaml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Override settings from variables resolved through `lookup`.
    /// Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get(ENV_AI_ENABLED) {
            self.comparator.ai_enabled = parse_bool(ENV_AI_ENABLED, &raw)?;
        }
        if let Some(raw) = get(ENV_AI_ENDPOINT) {
            let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidEnv {
                var: ENV_AI_ENDPOINT,
                value: raw.clone(),
                detail: e.to_string(),
            })?;
            self.comparator.endpoint = Some(url);
        }
        if let Some(raw) = get(ENV_AI_API_KEY) {
            self.comparator.api_key = Some(Zeroizing::new(raw.trim().to_string()));
        }
        if let Some(raw) = get(ENV_AI_MODEL) {
            self.comparator.model = raw.trim().to_string();
        }
        if let Some(raw) = get(ENV_AI_TIMEOUT_MS) {
            self.comparator.timeout_ms =
                raw.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::InvalidEnv {
                    var: ENV_AI_TIMEOUT_MS,
                    value: raw.clone(),
                    detail: e.to_string(),
                })?;
        }
        if let Some(raw) = get(ENV_AUDIT_PATH) {
            self.audit.sink = AuditSinkKind::Jsonl;
            self.audit.path = Some(PathBuf::from(raw.trim()));
        }
        Ok(())
    }

    /// Range and consistency checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.comparator;
        if !(0.0..=1.0).contains(&c.default_threshold) {
            return Err(ConfigError::Invalid {
                field: "comparator.default_threshold",
                detail: format!("{} is outside [0, 1]", c.default_threshold),
            });
        }
        if c.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "comparator.timeout_ms",
                detail: "must be positive".into(),
            });
        }
        if c.cache_ttl_days <= 0 {
            return Err(ConfigError::Invalid {
                field: "comparator.cache_ttl_days",
                detail: "must be positive".into(),
            });
        }
        if c.ai_enabled && c.endpoint.is_none() {
            return Err(ConfigError::Invalid {
                field: "comparator.endpoint",
                detail: "required when ai_enabled is true".into(),
            });
        }
        if self.audit.sink == AuditSinkKind::Jsonl && self.audit.path.is_none() {
            return Err(ConfigError::Invalid {
                field: "audit.path",
                detail: "required for the jsonl sink".into(),
            });
        }
        Ok(())
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var,
            value: raw.to_string(),
            detail: "expected true or false".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = EngineConfig::default();
        cfg.validate().unwrap();
        assert!(!cfg.comparator.ai_enabled);
        assert_eq!(cfg.audit.sink, AuditSinkKind::Memory);
        assert!(cfg.evaluation.cross_doc_enabled);
    }

    #[test]
    fn parses_yaml_sections() {
        let cfg = EngineConfig::from_yaml_str(
            "comparator:\n  timeout_ms: 500\naudit:\n  sink: disabled\nevaluation:\n  domains: [icc.ucp600]\n  jurisdiction: AE\n  cross_doc_enabled: false\n",
            Path::new("engine.yaml"),
        )
        .unwrap();
        assert_eq!(cfg.comparator.timeout_ms, 500);
        assert_eq!(cfg.comparator.default_threshold, 0.82);
        assert_eq!(cfg.audit.sink, AuditSinkKind::Disabled);
        assert_eq!(cfg.evaluation.domains, vec!["icc.ucp600"]);
        assert!(!cfg.evaluation.cross_doc_enabled);
    }

    #[test]
    fn bad_yaml_names_the_file() {
        let err = EngineConfig::from_yaml_str("comparator: [", Path::new("bad.yaml")).unwrap_err();
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn environment_overrides_file() {
        let mut cfg = EngineConfig::from_yaml_str(
            "comparator:\n  ai_enabled: false\n  model: old\n",
            Path::new("engine.yaml"),
        )
        .unwrap();
        cfg.apply_env(env(&[
            (ENV_AI_ENABLED, "true"),
            (ENV_AI_ENDPOINT, "https://compare.example.net/v1"),
            (ENV_AI_API_KEY, "secret-token"),
            (ENV_AI_MODEL, "compare-v2"),
            (ENV_AI_TIMEOUT_MS, "1200"),
            (ENV_AUDIT_PATH, "/tmp/audit.jsonl"),
        ]))
        .unwrap();
        cfg.validate().unwrap();
        assert!(cfg.comparator.ai_enabled);
        assert_eq!(cfg.comparator.model, "compare-v2");
        assert_eq!(cfg.comparator.timeout_ms, 1200);
        assert_eq!(cfg.audit.sink, AuditSinkKind::Jsonl);
        assert!(!format!("{cfg:?}").contains("secret-token"));
    }

    #[test]
    fn invalid_environment_values_are_errors() {
        let mut cfg = EngineConfig::default();
        let err = cfg.apply_env(env(&[(ENV_AI_TIMEOUT_MS, "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: ENV_AI_TIMEOUT_MS, .. }));
        let err = cfg.apply_env(env(&[(ENV_AI_ENABLED, "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
        let err = cfg.apply_env(env(&[(ENV_AI_ENDPOINT, "not a url")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn validation_catches_inconsistent_settings() {
        let mut cfg = EngineConfig::default();
        cfg.comparator.ai_enabled = true;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.audit.sink = AuditSinkKind::Jsonl;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.comparator.default_threshold = 1.5;
        assert!(cfg.validate().is_err());
    }
}
