//! Before/after discrepancy metrics.
//!
//! Both figures count failing discrepancies only, so a waived or overridden
//! discrepancy leaves the count and its severity bucket.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tfcheck_core::{Discrepancy, Severity};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscrepancyMetrics {
    /// Failing discrepancies.
    pub discrepancies: u64,
    /// Failing discrepancies per severity. Every level is present.
    pub severity: BTreeMap<Severity, u64>,
}

impl DiscrepancyMetrics {
    pub fn from_discrepancies(list: &[Discrepancy]) -> Self {
        let mut severity: BTreeMap<Severity, u64> = Severity::ALL.iter().map(|s| (*s, 0)).collect();
        let mut discrepancies = 0;
        for d in list.iter().filter(|d| d.is_failing()) {
            discrepancies += 1;
            *severity.entry(d.severity).or_default() += 1;
        }
        Self {
            discrepancies,
            severity,
        }
    }

    /// `after - before`.
    pub fn delta(before: &Self, after: &Self) -> MetricsDelta {
        let severity = Severity::ALL
            .iter()
            .map(|s| {
                let b = before.severity.get(s).copied().unwrap_or_default() as i64;
                let a = after.severity.get(s).copied().unwrap_or_default() as i64;
                (*s, a - b)
            })
            .collect();
        MetricsDelta {
            discrepancies: after.discrepancies as i64 - before.discrepancies as i64,
            severity,
        }
    }
}

/// Signed change between two [`DiscrepancyMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsDelta {
    pub discrepancies: i64,
    pub severity: BTreeMap<Severity, i64>,
}

impl MetricsDelta {
    pub fn is_zero(&self) -> bool {
        self.discrepancies == 0 && self.severity.values().all(|v| *v == 0)
    }
}
