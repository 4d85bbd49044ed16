//! HTTP comparator against a mock endpoint.

use std::sync::Arc;

use tfcheck_core::SystemClock;
use tfcheck_semantic::{
    ComparatorConfig, ComparatorError, ComparisonRequest, ComparisonSource, HighFidelityComparator,
    HttpComparator, SemanticComparator,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zeroize::Zeroizing;

fn config(server: &MockServer) -> ComparatorConfig {
    ComparatorConfig {
        ai_enabled: true,
        endpoint: Some(format!("{}/v1/compare", server.uri()).parse().unwrap()),
        api_key: Some(Zeroizing::new("test-key".into())),
        timeout_ms: 2_000,
        ..ComparatorConfig::default()
    }
}

fn request() -> ComparisonRequest {
    ComparisonRequest::new("Acme Textiles Ltd", "ACME TEXTILE LIMITED", "party_name")
        .with_threshold(0.8)
}

#[tokio::test]
async fn posts_request_and_reads_verdict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/compare"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({"context": "party_name", "model": "compare-v1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "match": true, "confidence": 0.88, "materiality": "none"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpComparator::from_config(&config(&server)).unwrap();
    let verdict = client.compare(&request()).await.unwrap();
    assert!(verdict.is_match);
    assert_eq!(verdict.confidence, 0.88);
}

#[tokio::test]
async fn server_error_is_reported_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let client = HttpComparator::from_config(&config(&server)).unwrap();
    match client.compare(&request()).await {
        Err(ComparatorError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn comparator_degrades_when_endpoint_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let cmp = SemanticComparator::from_config(&config(&server), Arc::new(SystemClock));
    let out = cmp.compare(&request()).await;
    assert_eq!(out.source, ComparisonSource::LexicalFallback);
    assert!(out.degraded_reason.unwrap().contains("HTTP 500"));
    assert!(cmp.cache().is_empty());
}

#[tokio::test]
async fn comparator_caches_remote_verdicts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "output": "```json\n{\"match\": true, \"confidence\": 0.9}\n```"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cmp = SemanticComparator::from_config(&config(&server), Arc::new(SystemClock));
    let first = cmp.compare(&request()).await;
    let second = cmp.compare(&request()).await;
    assert_eq!(first.source, ComparisonSource::HighFidelity);
    assert!(second.cached);
}
