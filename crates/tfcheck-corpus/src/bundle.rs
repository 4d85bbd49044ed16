//! Corpus bundle files.
//!
//! A bundle carries one ruleset header and its rules:
//!
//! ```yaml
//! ruleset:
//!   domain: icc.ucp600
//!   rulebook_version: "UCP600:2007"
//!   ruleset_version: "1.2.0"
//!   status: active        # optional; draft when absent
//! rules:
//!   - rule_id: UCP600-18A
//!     ...
//! ```
//!
//! YAML and JSON go through the same path: both are read into a
//! `serde_json::Value` first, so the rule objects reach ingestion in the
//! same loose shape regardless of source format.

use std::path::Path;

use serde_json::Value;

use crate::error::{CorpusError, CorpusResult};
use crate::ruleset::{NewRuleset, RulesetStatus};
use crate::store::{CorpusStore, IngestReport};

/// A parsed bundle file.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusBundle {
    pub ruleset: NewRuleset,
    /// Requested status after loading.
    pub status: RulesetStatus,
    /// Raw rule objects, validated at ingestion.
    pub rules: Vec<Value>,
}

/// Read a bundle from disk. `.json` files are parsed as JSON, anything
/// else as YAML.
pub fn load_bundle(path: &Path) -> CorpusResult<CorpusBundle> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CorpusError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            CorpusError::Io(e)
        }
    })?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let value = if is_json {
        serde_json::from_str(&content).map_err(|e| CorpusError::JsonParse {
            path: path.to_path_buf(),
            source: e,
        })?
    } else {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(&content).map_err(|e| CorpusError::YamlParse {
                path: path.to_path_buf(),
                source: e,
            })?;
        yaml_to_json_value(yaml)
    };
    bundle_from_value(value, path)
}

/// Interpret an already-parsed bundle document.
pub fn bundle_from_value(value: Value, path: &Path) -> CorpusResult<CorpusBundle> {
    let invalid = |detail: String| CorpusError::InvalidBundle {
        path: path.to_path_buf(),
        detail,
    };
    let Value::Object(mut doc) = value else {
        return Err(invalid("top level must be a mapping".into()));
    };
    let header = doc
        .remove("ruleset")
        .ok_or_else(|| invalid("missing `ruleset` header".into()))?;
    let status = match header.get("status") {
        None | Some(Value::Null) => RulesetStatus::Draft,
        Some(s) => serde_json::from_value(s.clone())
            .map_err(|e| invalid(format!("ruleset.status: {e}")))?,
    };
    let ruleset: NewRuleset =
        serde_json::from_value(header).map_err(|e| invalid(format!("ruleset: {e}")))?;
    let rules = match doc.remove("rules") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(invalid("`rules` must be a list".into())),
    };
    Ok(CorpusBundle {
        ruleset,
        status,
        rules,
    })
}

fn yaml_to_json_value(yaml: serde_yaml::Value) -> Value {
    match yaml {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                // Thresholds are legitimately fractional; NaN/inf become null.
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(seq) => {
            Value::Array(seq.into_iter().map(yaml_to_json_value).collect())
        }
        serde_yaml::Value::Mapping(map) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    serde_yaml::Value::Null => "null".to_string(),
                    other => format!("{other:?}"),
                };
                obj.insert(key, yaml_to_json_value(v));
            }
            Value::Object(obj)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json_value(tagged.value),
    }
}

impl CorpusStore {
    /// Create, ingest and (if the bundle asks for it) activate or deprecate
    /// a bundle's ruleset.
    ///
    /// Activation is attempted only when every rule was accepted; a partly
    /// rejected bundle stays in draft so it never goes live short of rules.
    pub fn load_bundle(&mut self, bundle: CorpusBundle) -> CorpusResult<IngestReport> {
        let id = self.create_ruleset(bundle.ruleset)?;
        let report = self.ingest_rules(id, bundle.rules)?;
        match bundle.status {
            RulesetStatus::Active if report.is_clean() => {
                self.activate_ruleset(id)?;
            }
            RulesetStatus::Active => {
                tracing::warn!(
                    ruleset = %id,
                    rejected = report.rejected.len(),
                    "bundle requested activation but has rejected rules; left in draft"
                );
            }
            RulesetStatus::Deprecated => self.deprecate_ruleset(id)?,
            RulesetStatus::Draft => {}
        }
        Ok(report)
    }

    /// [`load_bundle`](Self::load_bundle) from a file.
    pub fn load_bundle_file(&mut self, path: &Path) -> CorpusResult<IngestReport> {
        let bundle = load_bundle(path)?;
        tracing::debug!(path = %path.display(), rules = bundle.rules.len(), "corpus bundle read");
        self.load_bundle(bundle)
    }
}
