#![cfg(feature = "provider-anthropic")]

use std::sync::Arc;

use futures_util::StreamExt;
use qprovider::adapters::anthropic::{ANTHROPIC_VERSION, AnthropicHttpTransport, AnthropicProvider};
use qprovider::{
    ChatCompletionRequest, ChatMessage, ChatProvider, CredentialStore, FinishReason,
    ProviderErrorKind, collect_stream,
};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "claude-3-5-sonnet-20241022";

fn provider_for(server: &MockServer) -> AnthropicProvider {
    let credentials = CredentialStore::from_lookup(|name| {
        (name == "ANTHROPIC_API_KEY").then(|| "sk-ant-test".to_string())
    });
    let transport = AnthropicHttpTransport::new(reqwest::Client::new())
        .with_base_url(format!("{}/v1", server.uri()));

    AnthropicProvider::new(&credentials, Arc::new(transport)).expect("provider should build")
}

fn hello() -> ChatCompletionRequest {
    ChatCompletionRequest::new(vec![ChatMessage::user("hello")])
}

fn event_stream(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

fn error_body(kind: &str, message: &str) -> serde_json::Value {
    json!({"type": "error", "error": {"type": kind, "message": message}})
}

#[tokio::test]
async fn message_request_carries_key_and_version_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", ANTHROPIC_VERSION))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_01",
            "type": "message",
            "model": MODEL,
            "content": [{"type": "text", "text": "Hi there"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 3, "output_tokens": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = provider_for(&server)
        .generate_chat_completion(hello())
        .await
        .expect("completion should succeed");

    assert_eq!(response.text, "Hi there");
    assert_eq!(response.model, MODEL);
    assert_eq!(response.finish_reason, FinishReason::Stop);
    assert_eq!(response.usage.total_tokens, 5);
}

#[tokio::test]
async fn rejected_key_is_an_anthropic_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(error_body("authentication_error", "invalid x-api-key")),
        )
        .mount(&server)
        .await;

    let error = provider_for(&server)
        .generate_chat_completion(hello())
        .await
        .expect_err("401 should fail the request");

    assert_eq!(error.kind, ProviderErrorKind::Authentication);
    assert_eq!(error.provider, "anthropic");
    assert_eq!(error.message, "invalid x-api-key");
    assert!(!error.retryable);
}

#[tokio::test]
async fn throttling_and_overload_are_retryable() {
    let cases = [
        (429, "rate_limit_error", "Number of requests has exceeded your rate limit"),
        (529, "overloaded_error", "Overloaded"),
        (500, "api_error", "Internal server error"),
    ];

    for (status, kind, message) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(status).set_body_json(error_body(kind, message)))
            .mount(&server)
            .await;

        let error = provider_for(&server)
            .generate_chat_completion(hello())
            .await
            .expect_err("failure status should fail the request");

        assert_eq!(error.kind, ProviderErrorKind::RateLimit, "status {status}");
        assert!(error.retryable, "status {status}");
        assert_eq!(error.message, message);
    }
}

#[tokio::test]
async fn forbidden_without_an_envelope_is_still_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(403).set_body_string("<html>forbidden</html>"))
        .mount(&server)
        .await;

    let error = provider_for(&server)
        .generate_chat_completion(hello())
        .await
        .expect_err("403 should fail the request");

    assert!(error.is_authentication());
    assert!(error.message.contains("403"));
}

#[tokio::test]
async fn named_events_stream_text_until_message_stop() {
    let server = MockServer::start().await;
    let body = concat!(
        "event: message_start\n",
        "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_01\",\"model\":\"claude-3-5-sonnet-20241022\",\"usage\":{\"input_tokens\":3}}}\n\n",
        "event: content_block_start\n",
        "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
        "event: ping\n",
        "data: {\"type\":\"ping\"}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel\"}}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"lo\"}}\n\n",
        "event: content_block_stop\n",
        "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
        "event: message_delta\n",
        "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"max_tokens\",\"stop_sequence\":null},\"usage\":{\"output_tokens\":2}}\n\n",
        "event: message_stop\n",
        "data: {\"type\":\"message_stop\"}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(event_stream(body))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let stream = provider
        .stream_chat_completion(hello())
        .await
        .expect("stream should open");
    let collected = collect_stream(stream).await.expect("stream should drain");

    assert_eq!(collected.text, "Hello");
    assert_eq!(collected.model, MODEL);
    assert_eq!(collected.finish_reason, Some(FinishReason::Length));
}

#[tokio::test]
async fn error_event_mid_stream_fails_after_the_earlier_deltas() {
    let server = MockServer::start().await;
    let body = concat!(
        "event: message_start\n",
        "data: {\"type\":\"message_start\",\"message\":{\"model\":\"claude-3-5-sonnet-20241022\"}}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel\"}}\n\n",
        "event: error\n",
        "data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(event_stream(body))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let items = provider
        .stream_chat_completion(hello())
        .await
        .expect("stream should open")
        .collect::<Vec<_>>()
        .await;

    assert_eq!(items.len(), 2);
    let first = items[0].as_ref().expect("first delta should arrive");
    assert_eq!(first.text.as_deref(), Some("Hel"));

    let error = items[1].as_ref().expect_err("error event should fail the stream");
    assert_eq!(error.kind, ProviderErrorKind::RateLimit);
    assert_eq!(error.provider, "anthropic");
    assert_eq!(error.message, "Overloaded");
}

#[tokio::test]
async fn rejected_stream_fails_before_any_chunk() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(error_body("authentication_error", "invalid x-api-key")),
        )
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let error = provider
        .stream_chat_completion(hello())
        .await
        .err()
        .expect("401 should fail before streaming");

    assert!(error.is_authentication());
    assert_eq!(error.provider, "anthropic");
}
