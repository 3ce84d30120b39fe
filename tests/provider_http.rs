//! # HTTP provider clients against a mock server
//!
//! Covers the wire contract of every network provider:
//! - request path and auth headers
//! - response text extraction
//! - non-2xx status mapping
//! - empty and malformed bodies
//! - deadline enforcement through `invoke_with_timeout`

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reason_orchestrator::provider::{
    invoke_with_timeout, AnthropicProvider, GoogleProvider, OpenAiProvider,
};
use reason_orchestrator::{Provider, ProviderError, ProviderKind};

const TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// OpenAI
// ============================================================================

#[tokio::test]
async fn test_openai_success_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Paris"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("sk-test").with_base_url(server.uri());
    let text = provider
        .invoke("capital of France?", "gpt-4o", TIMEOUT)
        .await
        .expect("test: openai success");
    assert_eq!(text, "Paris");
}

#[tokio::test]
async fn test_openai_rate_limit_maps_to_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("sk-test").with_base_url(server.uri());
    let err = provider
        .invoke("hi", "gpt-4o", TIMEOUT)
        .await
        .expect_err("test: 429 must fail");
    match err {
        ProviderError::Status {
            provider,
            status,
            body,
        } => {
            assert_eq!(provider, ProviderKind::OpenAi);
            assert_eq!(status, 429);
            assert_eq!(body, "slow down");
        }
        other => unreachable!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn test_openai_null_content_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        })))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("sk-test").with_base_url(server.uri());
    let err = provider
        .invoke("hi", "gpt-4o", TIMEOUT)
        .await
        .expect_err("test: empty content must fail");
    assert!(matches!(err, ProviderError::EmptyResponse(ProviderKind::OpenAi)));
}

#[tokio::test]
async fn test_xai_uses_openai_wire_format_with_its_own_tag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::xai("xai-key").with_base_url(format!("{}/", server.uri()));
    assert_eq!(provider.kind(), ProviderKind::Xai);
    let err = provider
        .invoke("hi", "grok-2", TIMEOUT)
        .await
        .expect_err("test: 500 must fail");
    assert!(matches!(
        err,
        ProviderError::Status {
            provider: ProviderKind::Xai,
            status: 500,
            ..
        }
    ));
}

// ============================================================================
// Anthropic
// ============================================================================

#[tokio::test]
async fn test_anthropic_success_concatenates_text_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "ak-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"type": "text", "text": "Yes, "},
                {"type": "text", "text": "Socrates is mortal."}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("ak-test").with_base_url(server.uri());
    let text = provider
        .invoke("Is Socrates mortal?", "claude-3-5-sonnet", TIMEOUT)
        .await
        .expect("test: anthropic success");
    assert_eq!(text, "Yes, Socrates is mortal.");
}

#[tokio::test]
async fn test_anthropic_unauthorized_maps_to_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"type": "authentication_error"}
        })))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("bad").with_base_url(server.uri());
    let err = provider
        .invoke("hi", "claude-3-5-sonnet", TIMEOUT)
        .await
        .expect_err("test: 401 must fail");
    assert!(matches!(
        err,
        ProviderError::Status {
            provider: ProviderKind::Anthropic,
            status: 401,
            ..
        }
    ));
}

#[tokio::test]
async fn test_anthropic_empty_content_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": []})))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("ak-test").with_base_url(server.uri());
    let err = provider
        .invoke("hi", "claude-3-5-sonnet", TIMEOUT)
        .await
        .expect_err("test: empty must fail");
    assert!(matches!(err, ProviderError::EmptyResponse(ProviderKind::Anthropic)));
}

// ============================================================================
// Google
// ============================================================================

#[tokio::test]
async fn test_google_success_reads_first_candidate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-pro:generateContent"))
        .and(header("x-goog-api-key", "g-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [
                {"content": {"parts": [{"text": "4"}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GoogleProvider::new("g-test").with_base_url(server.uri());
    let text = provider
        .invoke("2 + 2", "gemini-1.5-pro", TIMEOUT)
        .await
        .expect("test: google success");
    assert_eq!(text, "4");
}

#[tokio::test]
async fn test_google_malformed_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let provider = GoogleProvider::new("g-test").with_base_url(server.uri());
    let err = provider
        .invoke("2 + 2", "gemini-1.5-pro", TIMEOUT)
        .await
        .expect_err("test: malformed must fail");
    assert!(matches!(
        err,
        ProviderError::Parse {
            provider: ProviderKind::Google,
            ..
        }
    ));
}

#[tokio::test]
async fn test_google_no_candidates_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let provider = GoogleProvider::new("g-test").with_base_url(server.uri());
    let err = provider
        .invoke("2 + 2", "gemini-1.5-pro", TIMEOUT)
        .await
        .expect_err("test: empty must fail");
    assert!(matches!(err, ProviderError::EmptyResponse(ProviderKind::Google)));
}

// ============================================================================
// Deadlines
// ============================================================================

#[tokio::test]
async fn test_slow_server_hits_invoke_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(json!({
                    "choices": [{"message": {"content": "late"}}]
                })),
        )
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("sk-test").with_base_url(server.uri());
    let result =
        invoke_with_timeout(&provider, "hi", "gpt-4o", Duration::from_millis(100)).await;
    assert!(result.is_err(), "a 2s response must not beat a 100ms deadline");
}
