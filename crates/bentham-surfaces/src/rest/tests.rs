// crates/bentham-surfaces/src/rest/tests.rs
// ============================================================================
// Module: REST Adapter Unit Tests
// Description: Unit tests for request shaping, classification, and parsing.
// Purpose: Validate adapter internals without network access.
// Dependencies: bentham-surfaces
// ============================================================================

//! ## Overview
//! Exercises request-body construction, HTTP status classification, and
//! completion parsing with in-memory payloads.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only framing assertions."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use bentham_core::ConversationTurn;
use bentham_core::EvidenceLevel;
use bentham_core::FailureKind;
use bentham_core::QueryRequest;
use bentham_core::SessionId;
use reqwest::StatusCode;
use serde_json::json;

use super::RestSurfaceAdapter;
use super::RestSurfaceConfig;
use super::build_request_body;
use super::classify_status;
use super::parse_completion;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn sample_request() -> QueryRequest {
    QueryRequest {
        query: "what changed".to_string(),
        model: Some("gpt-test".to_string()),
        system_prompt: Some("answer briefly".to_string()),
        history: vec![ConversationTurn {
            role: "user".to_string(),
            content: "earlier turn".to_string(),
        }],
        temperature: Some(0.2),
        max_tokens: Some(64),
        location: None,
        evidence_level: EvidenceLevel::Metadata,
        session_id: SessionId::new("sess_rest"),
        options: None,
    }
}

// ============================================================================
// SECTION: Request Shaping
// ============================================================================

#[test]
fn request_bodies_order_system_history_then_user() {
    let body = build_request_body("default-model", &sample_request());
    assert_eq!(body["model"], "gpt-test");
    assert_eq!(body["temperature"], 0.2);
    assert_eq!(body["max_tokens"], 64);
    let messages = body["messages"].as_array().expect("messages array");
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["content"], "earlier turn");
    assert_eq!(messages[2]["role"], "user");
    assert_eq!(messages[2]["content"], "what changed");
}

#[test]
fn default_model_applies_without_an_override() {
    let mut request = sample_request();
    request.model = None;
    let body = build_request_body("default-model", &request);
    assert_eq!(body["model"], "default-model");
}

// ============================================================================
// SECTION: Classification
// ============================================================================

#[test]
fn http_statuses_map_to_stable_failure_kinds() {
    assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS).kind, FailureKind::RateLimit);
    assert_eq!(classify_status(StatusCode::UNAUTHORIZED).kind, FailureKind::SessionExpired);
    assert_eq!(classify_status(StatusCode::FORBIDDEN).kind, FailureKind::SessionExpired);
    assert_eq!(classify_status(StatusCode::GATEWAY_TIMEOUT).kind, FailureKind::Timeout);
    assert_eq!(classify_status(StatusCode::BAD_GATEWAY).kind, FailureKind::NetworkError);
    assert_eq!(classify_status(StatusCode::IM_A_TEAPOT).kind, FailureKind::Unknown);
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

#[test]
fn chat_payloads_parse_with_usage() {
    let payload = json!({
        "choices": [{"message": {"content": "the answer"}}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
    });
    let bytes = serde_json::to_vec(&payload).expect("serialize");
    let response =
        parse_completion(&bytes, 42, EvidenceLevel::Metadata).expect("payload parses");
    assert_eq!(response.text, "the answer");
    assert_eq!(response.duration_ms, 42);
    let usage = response.token_usage.expect("usage present");
    assert_eq!(usage.input_tokens, 10);
    assert_eq!(usage.output_tokens, 5);
    assert_eq!(usage.total_tokens, 15);
    assert!(response.provenance.is_none());
}

#[test]
fn legacy_text_payloads_parse_and_full_evidence_keeps_provenance() {
    let payload = json!({"choices": [{"text": "legacy answer"}]});
    let bytes = serde_json::to_vec(&payload).expect("serialize");
    let response = parse_completion(&bytes, 7, EvidenceLevel::Full).expect("payload parses");
    assert_eq!(response.text, "legacy answer");
    assert!(response.provenance.is_some());
}

#[test]
fn contentless_payloads_fail_closed() {
    let empty = serde_json::to_vec(&json!({"choices": []})).expect("serialize");
    let err = parse_completion(&empty, 1, EvidenceLevel::Metadata).expect_err("no content");
    assert_eq!(err.kind, FailureKind::Unknown);

    let garbage = b"not json at all";
    let err = parse_completion(garbage, 1, EvidenceLevel::Metadata).expect_err("not json");
    assert_eq!(err.kind, FailureKind::Unknown);
}

// ============================================================================
// SECTION: Construction Policy
// ============================================================================

#[test]
fn cleartext_endpoints_require_an_explicit_opt_in() {
    let denied = RestSurfaceAdapter::new(RestSurfaceConfig {
        endpoint: "http://surface.example/v1/chat".to_string(),
        ..RestSurfaceConfig::default()
    });
    assert!(denied.is_err());

    let allowed = RestSurfaceAdapter::new(RestSurfaceConfig {
        endpoint: "http://surface.example/v1/chat".to_string(),
        allow_http: true,
        ..RestSurfaceConfig::default()
    });
    assert!(allowed.is_ok());

    let invalid = RestSurfaceAdapter::new(RestSurfaceConfig {
        endpoint: "not a url".to_string(),
        ..RestSurfaceConfig::default()
    });
    assert!(invalid.is_err());
}
