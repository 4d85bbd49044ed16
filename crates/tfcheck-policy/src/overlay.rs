//! # Policy Overlays
//!
//! A tenant-wide adjustment applied to every failing discrepancy of a run.
//! Only `thresholds.discrepancy_severity_override` has an effect today.
//! `stricter_checks.max_date_slippage_days` is accepted and retained but
//! does not change any result; unrecognised keys in either map are kept
//! so a round trip through this type loses nothing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tfcheck_core::{Severity, TenantId};

/// Stricter-check knobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StricterChecks {
    /// Reserved. Parsed, logged, no effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_date_slippage_days: Option<i64>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Threshold knobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlayThresholds {
    /// Severity forced onto every still-failing discrepancy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discrepancy_severity_override: Option<Severity>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// A tenant's policy overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyOverlay {
    pub overlay_id: String,
    pub tenant_id: TenantId,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub stricter_checks: StricterChecks,
    #[serde(default)]
    pub thresholds: OverlayThresholds,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl PolicyOverlay {
    pub fn new(overlay_id: impl Into<String>, tenant_id: TenantId) -> Self {
        Self {
            overlay_id: overlay_id.into(),
            tenant_id,
            active: true,
            stricter_checks: StricterChecks::default(),
            thresholds: OverlayThresholds::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_severity_override(mut self, severity: Severity) -> Self {
        self.thresholds.discrepancy_severity_override = Some(severity);
        self
    }

    /// The severity this overlay forces, if any.
    pub fn severity_override(&self) -> Option<Severity> {
        self.thresholds.discrepancy_severity_override
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_and_unknown_knobs() {
        let overlay: PolicyOverlay = serde_json::from_value(json!({
            "overlay_id": "ov-1",
            "tenant_id": "bank-a",
            "stricter_checks": {"max_date_slippage_days": 2, "require_original_bl": true},
            "thresholds": {"discrepancy_severity_override": "warn", "amount_tolerance_pct": 3}
        }))
        .unwrap();
        assert!(overlay.active);
        assert_eq!(overlay.severity_override(), Some(Severity::Major));
        assert_eq!(overlay.stricter_checks.max_date_slippage_days, Some(2));
        assert_eq!(overlay.stricter_checks.other["require_original_bl"], json!(true));
        assert_eq!(overlay.thresholds.other["amount_tolerance_pct"], json!(3));
    }

    #[test]
    fn overlay_without_thresholds_has_no_override() {
        let overlay: PolicyOverlay =
            serde_json::from_value(json!({"overlay_id": "ov-2", "tenant_id": "bank-a"})).unwrap();
        assert!(overlay.severity_override().is_none());
    }
}
