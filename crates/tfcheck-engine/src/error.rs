//! Engine error types.

use std::path::PathBuf;

use thiserror::Error;

use tfcheck_corpus::CorpusError;

/// Invalid or unreadable engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An environment variable held a value of the wrong shape.
    #[error("invalid value for {var}: {value:?} ({detail})")]
    InvalidEnv {
        var: &'static str,
        value: String,
        detail: String,
    },

    /// A setting is out of range or inconsistent with another.
    #[error("invalid setting {field}: {detail}")]
    Invalid { field: &'static str, detail: String },
}

/// Failure of a validation run before any discrepancy was produced.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("corpus error: {0}")]
    Corpus(#[from] CorpusError),
}
