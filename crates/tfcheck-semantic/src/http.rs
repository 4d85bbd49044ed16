//! HTTP implementation of [`HighFidelityComparator`].
//!
//! Posts the comparison request as JSON to the configured endpoint with a
//! bearer token. The endpoint may answer with the verdict object directly,
//! or wrap model output in an envelope (`output`, `content`, `text`,
//! `result`, or `choices[0].message.content`) whose text contains the
//! verdict JSON, possibly inside a Markdown code fence.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::comparator::{ComparisonRequest, HighFidelityComparator, HighFidelityVerdict};
use crate::config::ComparatorConfig;
use crate::error::ComparatorError;

const ENVELOPE_KEYS: [&str; 4] = ["output", "content", "text", "result"];
const BODY_EXCERPT: usize = 200;

/// Comparator backed by a remote service.
#[derive(Debug, Clone)]
pub struct HttpComparator {
    http: reqwest::Client,
    endpoint: Url,
    model: String,
}

#[derive(Serialize)]
struct CompareBody<'a> {
    model: &'a str,
    left: &'a str,
    right: &'a str,
    context: &'a str,
    documents: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    threshold: Option<f64>,
}

impl HttpComparator {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// [`ComparatorError::NotConfigured`] without an endpoint or with an API
    /// key that is not a valid header value.
    pub fn from_config(config: &ComparatorConfig) -> Result<Self, ComparatorError> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| ComparatorError::NotConfigured("no endpoint configured".into()))?;

        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key.as_str())).map_err(|_| {
                ComparatorError::NotConfigured("API key is not a valid header value".into())
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(|e| ComparatorError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        Ok(Self {
            http,
            endpoint,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl HighFidelityComparator for HttpComparator {
    async fn compare(&self, request: &ComparisonRequest) -> Result<HighFidelityVerdict, ComparatorError> {
        let body = CompareBody {
            model: &self.model,
            left: &request.left,
            right: &request.right,
            context: &request.context,
            documents: &request.documents,
            threshold: request.threshold,
        };
        let resp = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ComparatorError::Http {
                endpoint: self.endpoint.to_string(),
                source: e,
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| ComparatorError::Http {
            endpoint: self.endpoint.to_string(),
            source: e,
        })?;
        if !status.is_success() {
            return Err(ComparatorError::Status {
                status: status.as_u16(),
                body: text.chars().take(BODY_EXCERPT).collect(),
            });
        }
        parse_verdict(&text)
    }
}

/// Read a verdict out of a response body.
pub fn parse_verdict(body: &str) -> Result<HighFidelityVerdict, ComparatorError> {
    let value = parse_json_text(body)?;
    verdict_from_value(value, 0)
}

fn verdict_from_value(value: Value, depth: u8) -> Result<HighFidelityVerdict, ComparatorError> {
    if depth > 2 {
        return Err(ComparatorError::Malformed("verdict nested too deeply".into()));
    }
    if value.get("match").is_some() || value.get("is_match").is_some() {
        return serde_json::from_value(value).map_err(|e| ComparatorError::Malformed(e.to_string()));
    }

    let choice_content = value
        .pointer("/choices/0/message/content")
        .cloned();
    let inner = ENVELOPE_KEYS
        .iter()
        .find_map(|k| value.get(*k).cloned())
        .or(choice_content);

    match inner {
        Some(Value::String(text)) => verdict_from_value(parse_json_text(&text)?, depth + 1),
        Some(obj @ Value::Object(_)) => verdict_from_value(obj, depth + 1),
        _ => Err(ComparatorError::Malformed(
            "response carries no verdict".into(),
        )),
    }
}

/// Parse JSON that may be wrapped in prose or a Markdown code fence.
fn parse_json_text(text: &str) -> Result<Value, ComparatorError> {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str(trimmed) {
        return Ok(v);
    }
    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if s < e => serde_json::from_str(&trimmed[s..=e])
            .map_err(|err| ComparatorError::Malformed(err.to_string())),
        _ => Err(ComparatorError::Malformed("no JSON object in response".into())),
    }
}
