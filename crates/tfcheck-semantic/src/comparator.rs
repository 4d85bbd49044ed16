//! # Semantic Comparator
//!
//! `compare(left, right, context, documents, threshold)` decides whether two
//! free-text values say the same thing.
//!
//! ```text
//! normalize both sides
//!   -> goods context and goods-line heuristic agrees?  => forced match (not cached)
//!   -> per-key cache slot (locked)
//!        fresh entry?                                   => cached result
//!        AI enabled: high-fidelity call under timeout
//!            ok, confidence in [0, 1]                   => result (cached)
//!            timeout / error / bad confidence           => lexical fallback (not cached)
//!        AI disabled                                    => lexical result (cached)
//! ```
//!
//! Failures never escape `compare`: the degraded path is recorded in
//! [`Comparison::source`] and [`Comparison::degraded_reason`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tfcheck_core::Clock;

use crate::cache::{CacheKey, ComparisonCache};
use crate::config::ComparatorConfig;
use crate::error::ComparatorError;
use crate::heuristic::{goods_lines_match, is_goods_context};
use crate::http::HttpComparator;
use crate::normalize::normalize_text;

/// How much a mismatch matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Materiality {
    None,
    Minor,
    Major,
}

/// Which path produced a [`Comparison`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonSource {
    /// Goods-line heuristic forced a match.
    Heuristic,
    /// The high-fidelity comparator answered.
    HighFidelity,
    /// Lexical similarity, with the AI path disabled.
    Lexical,
    /// Lexical similarity after the high-fidelity path failed.
    LexicalFallback,
}

/// A comparison request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRequest {
    pub left: String,
    pub right: String,
    /// What is being compared, e.g. `goods_description` or `party_name`.
    pub context: String,
    /// Labels of the documents the values came from.
    #[serde(default)]
    pub documents: Vec<String>,
    /// Match threshold; the configured default applies when absent.
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl ComparisonRequest {
    /// Request with no document labels and the default threshold.
    pub fn new(left: impl Into<String>, right: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            context: context.into(),
            documents: Vec::new(),
            threshold: None,
        }
    }

    /// Set the threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Set the document labels.
    pub fn with_documents(mut self, documents: Vec<String>) -> Self {
        self.documents = documents;
        self
    }
}

/// Result of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    #[serde(rename = "match")]
    pub is_match: bool,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub materiality: Materiality,
    pub expected: String,
    pub found: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    pub source: ComparisonSource,
    /// Why the high-fidelity path was abandoned, for `LexicalFallback`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
    /// Served from the cache.
    #[serde(default)]
    pub cached: bool,
}

/// Raw answer from a high-fidelity comparator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighFidelityVerdict {
    #[serde(rename = "match", alias = "is_match")]
    pub is_match: bool,
    pub confidence: f64,
    #[serde(default)]
    pub materiality: Option<Materiality>,
    #[serde(default)]
    pub expected: Option<String>,
    #[serde(default)]
    pub found: Option<String>,
    #[serde(default)]
    pub suggested_fix: Option<String>,
}

/// A text-equivalence oracle slower and smarter than lexical similarity.
///
/// Implementations may fail in any way; [`SemanticComparator`] bounds the
/// call with a timeout and validates the verdict.
#[async_trait]
pub trait HighFidelityComparator: Send + Sync + std::fmt::Debug {
    /// Compare the request's two values.
    async fn compare(&self, request: &ComparisonRequest) -> Result<HighFidelityVerdict, ComparatorError>;
}

/// The comparator used by `consistency_check` conditions and cross-document
/// checks. Construct one per process (or per test) and share it by
/// reference.
#[derive(Debug)]
pub struct SemanticComparator {
    high_fidelity: Option<Arc<dyn HighFidelityComparator>>,
    cache: ComparisonCache,
    timeout: Duration,
    default_threshold: f64,
}

impl SemanticComparator {
    /// Build from configuration. When the AI path is enabled but cannot be
    /// constructed (no endpoint, client build failure) the comparator runs
    /// lexical-only and says so at `warn`.
    pub fn from_config(config: &ComparatorConfig, clock: Arc<dyn Clock>) -> Self {
        let high_fidelity: Option<Arc<dyn HighFidelityComparator>> = if config.ai_enabled {
            match HttpComparator::from_config(config) {
                Ok(http) => Some(Arc::new(http)),
                Err(e) => {
                    tracing::warn!(error = %e, "high-fidelity comparator unavailable; lexical only");
                    None
                }
            }
        } else {
            None
        };
        Self::build(config, clock, high_fidelity)
    }

    /// Build with an explicit high-fidelity implementation (or none).
    pub fn with_high_fidelity(
        config: &ComparatorConfig,
        clock: Arc<dyn Clock>,
        high_fidelity: Option<Arc<dyn HighFidelityComparator>>,
    ) -> Self {
        Self::build(config, clock, high_fidelity)
    }

    /// Lexical-only comparator with default settings.
    pub fn lexical(clock: Arc<dyn Clock>) -> Self {
        Self::build(&ComparatorConfig::default(), clock, None)
    }

    fn build(
        config: &ComparatorConfig,
        clock: Arc<dyn Clock>,
        high_fidelity: Option<Arc<dyn HighFidelityComparator>>,
    ) -> Self {
        Self {
            high_fidelity,
            cache: ComparisonCache::new(chrono::Duration::days(config.cache_ttl_days), clock),
            timeout: Duration::from_millis(config.timeout_ms),
            default_threshold: config.default_threshold,
        }
    }

    /// The result cache.
    pub fn cache(&self) -> &ComparisonCache {
        &self.cache
    }

    /// Threshold applied when a request carries none.
    pub fn default_threshold(&self) -> f64 {
        self.default_threshold
    }

    /// Compare two values. Never fails.
    pub async fn compare(&self, request: &ComparisonRequest) -> Comparison {
        let threshold = request
            .threshold
            .unwrap_or(self.default_threshold)
            .clamp(0.0, 1.0);
        let left = normalize_text(&request.left);
        let right = normalize_text(&request.right);

        if is_goods_context(&request.context) && goods_lines_match(&request.left, &request.right) {
            tracing::debug!(context = %request.context, "goods-line heuristic match");
            return Comparison {
                is_match: true,
                confidence: 1.0,
                materiality: Materiality::None,
                expected: request.left.clone(),
                found: request.right.clone(),
                suggested_fix: None,
                source: ComparisonSource::Heuristic,
                degraded_reason: None,
                cached: false,
            };
        }

        let key = CacheKey::new(&left, &right, &request.context, threshold);
        let slot = self.cache.slot(&key);
        let mut entry = slot.lock().await;
        if let Some(mut hit) = self.cache.fresh(&entry) {
            hit.cached = true;
            hit.expected = request.left.clone();
            hit.found = request.right.clone();
            return hit;
        }

        let (result, cacheable) = match &self.high_fidelity {
            None => (lexical(request, &left, &right, threshold, None), true),
            Some(hf) => match self.call_high_fidelity(hf.as_ref(), request).await {
                Ok(verdict) => (from_verdict(request, verdict, threshold), true),
                Err(e) => {
                    tracing::warn!(context = %request.context, error = %e, "high-fidelity comparison degraded to lexical");
                    (
                        lexical(request, &left, &right, threshold, Some(e.to_string())),
                        false,
                    )
                }
            },
        };

        if cacheable {
            *entry = Some(self.cache.stamp(result.clone()));
            drop(entry);
            self.cache.record_store();
        } else {
            drop(entry);
            self.cache.release(&key, &slot);
        }
        result
    }

    async fn call_high_fidelity(
        &self,
        hf: &dyn HighFidelityComparator,
        request: &ComparisonRequest,
    ) -> Result<HighFidelityVerdict, ComparatorError> {
        let started = Instant::now();
        let verdict = tokio::time::timeout(self.timeout, hf.compare(request))
            .await
            .map_err(|_| ComparatorError::Timeout {
                elapsed_ms: started.elapsed().as_millis() as u64,
            })??;
        if !verdict.confidence.is_finite() || !(0.0..=1.0).contains(&verdict.confidence) {
            return Err(ComparatorError::ConfidenceOutOfRange(verdict.confidence));
        }
        Ok(verdict)
    }
}

fn from_verdict(request: &ComparisonRequest, verdict: HighFidelityVerdict, threshold: f64) -> Comparison {
    let is_match = verdict.is_match && verdict.confidence >= threshold;
    let materiality = if is_match {
        Materiality::None
    } else {
        match verdict.materiality {
            Some(Materiality::None) => Materiality::Minor,
            Some(m) => m,
            None => Materiality::Major,
        }
    };
    Comparison {
        is_match,
        confidence: verdict.confidence,
        materiality,
        expected: verdict.expected.unwrap_or_else(|| request.left.clone()),
        found: verdict.found.unwrap_or_else(|| request.right.clone()),
        suggested_fix: if is_match { None } else { verdict.suggested_fix },
        source: ComparisonSource::HighFidelity,
        degraded_reason: None,
        cached: false,
    }
}

/// Lexical similarity ratio of two normalized strings, in `[0, 1]`.
pub fn similarity(left: &str, right: &str) -> f64 {
    strsim::normalized_levenshtein(left, right)
}

fn lexical(
    request: &ComparisonRequest,
    left: &str,
    right: &str,
    threshold: f64,
    degraded_reason: Option<String>,
) -> Comparison {
    let ratio = similarity(left, right);
    let is_match = ratio >= threshold;
    let materiality = if is_match {
        Materiality::None
    } else if ratio >= threshold * 0.75 {
        Materiality::Minor
    } else {
        Materiality::Major
    };
    Comparison {
        is_match,
        confidence: ratio,
        materiality,
        expected: request.left.clone(),
        found: request.right.clone(),
        suggested_fix: (!is_match).then(|| {
            format!(
                "Align the {} wording with \"{}\"",
                request.context.replace('_', " "),
                request.left.trim()
            )
        }),
        source: if degraded_reason.is_some() {
            ComparisonSource::LexicalFallback
        } else {
            ComparisonSource::Lexical
        },
        degraded_reason,
        cached: false,
    }
}
