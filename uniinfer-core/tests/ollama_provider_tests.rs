//! Tests for the Ollama adapter against a mocked HTTP backend

use futures::StreamExt;
use serde_json::json;
use uniinfer_core::providers::OllamaProvider;
use uniinfer_core::{ChatCompletionRequest, ChatProvider, Message, MessageRole, UniInferError};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> ChatCompletionRequest {
    ChatCompletionRequest::new(vec![Message::user("Hello")]).with_model("llama2")
}

#[tokio::test]
async fn complete_normalizes_response_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "llama2", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama2",
            "message": {"role": "assistant", "content": "Hello yourself."},
            "done": true,
            "prompt_eval_count": 12,
            "eval_count": 7
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OllamaProvider::with_base_url(server.uri()).unwrap();
    let response = provider.complete(&request()).await.unwrap();

    assert_eq!(response.message.role, MessageRole::Assistant);
    assert_eq!(response.message.content, "Hello yourself.");
    assert_eq!(response.provider, "ollama");
    assert_eq!(response.model, "llama2");
    assert_eq!(response.usage.prompt_tokens, 12);
    assert_eq!(response.usage.completion_tokens, 7);
    assert_eq!(response.usage.total_tokens, 19);
}

#[tokio::test]
async fn missing_message_content_is_a_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
        .mount(&server)
        .await;

    let provider = OllamaProvider::with_base_url(server.uri()).unwrap();
    let err = provider.complete(&request()).await.unwrap_err();
    assert!(matches!(err, UniInferError::Provider(_)));
}

#[tokio::test]
async fn server_error_maps_through_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model load failed"))
        .mount(&server)
        .await;

    let provider = OllamaProvider::with_base_url(server.uri()).unwrap();
    let err = provider.complete(&request()).await.unwrap_err();
    assert!(matches!(err, UniInferError::Provider(_)));
    assert!(err.to_string().contains("ollama"));
}

#[tokio::test]
async fn stream_complete_parses_ndjson_until_done() {
    let ndjson_body = concat!(
        "{\"model\":\"llama2\",\"message\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"done\":false}\n",
        "{\"model\":\"llama2\",\"message\":{\"role\":\"assistant\",\"content\":\"lo\"},\"done\":false}\n",
        "{\"model\":\"llama2\",\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true,\"eval_count\":9}\n",
    );
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(ndjson_body, "application/x-ndjson"),
        )
        .mount(&server)
        .await;

    let provider = OllamaProvider::with_base_url(server.uri()).unwrap();
    let stream = provider.stream_complete(&request()).await.unwrap();
    let chunks: Vec<_> = stream.collect().await;

    assert_eq!(chunks.len(), 2);
    let contents: Vec<&str> = chunks
        .iter()
        .map(|chunk| chunk.as_ref().unwrap().message.content.as_str())
        .collect();
    assert_eq!(contents, ["Hel", "lo"]);
    assert!(chunks
        .iter()
        .all(|chunk| chunk.as_ref().unwrap().message.role == MessageRole::Assistant));
}

#[tokio::test]
async fn stream_open_failure_maps_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .mount(&server)
        .await;

    let provider = OllamaProvider::with_base_url(server.uri()).unwrap();
    let err = provider.stream_complete(&request()).await.unwrap_err();
    assert!(matches!(err, UniInferError::Provider(_)));
}
