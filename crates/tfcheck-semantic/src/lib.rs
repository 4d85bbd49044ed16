//! # tfcheck-semantic — Semantic Comparator
//!
//! A caching text-equivalence oracle for free-text fields (goods
//! descriptions, party names).
//!
//! - [`normalize`]: case-folding, punctuation and synonym normalization.
//! - [`heuristic`]: the goods-line heuristic that forces exact matches for
//!   itemized descriptions agreeing on names, quantities and HS codes.
//! - [`cache`]: the per-key-locked TTL cache.
//! - [`comparator`]: [`SemanticComparator`] and the
//!   [`HighFidelityComparator`] seam.
//! - [`http`]: the HTTP-backed high-fidelity comparator.
//!
//! There is no global instance. Callers construct a [`SemanticComparator`]
//! and pass it by reference, so tests inject fakes and tenants do not share
//! cache state unless the caller shares the comparator.

pub mod cache;
pub mod comparator;
pub mod config;
pub mod error;
pub mod heuristic;
pub mod http;
pub mod normalize;

pub use cache::{CacheKey, ComparisonCache};
pub use comparator::{
    similarity, Comparison, ComparisonRequest, ComparisonSource, HighFidelityComparator,
    HighFidelityVerdict, Materiality, SemanticComparator,
};
pub use config::ComparatorConfig;
pub use error::ComparatorError;
pub use heuristic::{goods_lines_match, is_goods_context, GoodsSignature};
pub use http::HttpComparator;
pub use normalize::normalize_text;
