//! Gemini engine against a mock HTTP server.

#![cfg(feature = "gemini")]

use std::time::Duration;

use agentweave::error::{FailureKind, WeaveError};
use agentweave::model::{GeminiEngine, GenerateRequest, ReasoningEngine};
use agentweave::types::{GenerationSettings, Message, ServerTool};
use agentweave::util::retry::RetryPolicy;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/models/gemini-test:generateContent";

fn engine(server: &MockServer) -> GeminiEngine {
    GeminiEngine::new("gemini-test", "test-key")
        .unwrap()
        .with_base_url(server.uri())
        .with_retry(RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2.0,
            retry_statuses: vec![429, 500, 503, 504],
        })
}

fn request(text: &str) -> GenerateRequest {
    GenerateRequest::new("Be brief.", vec![Message::user(text)])
}

#[tokio::test]
async fn text_response_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "systemInstruction": { "parts": [{ "text": "Be brief." }] },
            "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Hi " }, { "text": "there" }] },
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generation = engine(&server).generate(&request("hello")).await.unwrap();

    assert_eq!(generation.text, "Hi there");
    assert!(generation.is_final());
}

#[tokio::test]
async fn function_calls_become_tool_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{
                    "functionCall": {
                        "name": "get_exchange_rate",
                        "args": { "base_currency": "USD", "target_currency": "EUR" }
                    }
                }]}
            }]
        })))
        .mount(&server)
        .await;

    let generation = engine(&server).generate(&request("rate?")).await.unwrap();

    assert_eq!(generation.tool_calls.len(), 1);
    assert_eq!(generation.tool_calls[0].name, "get_exchange_rate");
    assert_eq!(generation.tool_calls[0].arguments["target_currency"], "EUR");
}

#[tokio::test]
async fn unavailable_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "recovered" }] } }]
        })))
        .mount(&server)
        .await;

    let generation = engine(&server).generate(&request("hi")).await.unwrap();

    assert_eq!(generation.text, "recovered");
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "Invalid JSON payload" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = engine(&server).generate(&request("hi")).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::UpstreamFailure);
    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("Invalid JSON payload"));
}

#[tokio::test]
async fn rejected_key_is_a_configuration_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "API key not valid" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = engine(&server).generate(&request("hi")).await.unwrap_err();

    assert!(matches!(err, WeaveError::Configuration(_)));
}

#[tokio::test]
async fn blocked_prompt_is_an_upstream_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [],
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .mount(&server)
        .await;

    let err = engine(&server).generate(&request("hi")).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::UpstreamFailure);
    assert!(err.to_string().contains("SAFETY"));
}

fn with_server_tools(text: &str, tools: Vec<ServerTool>) -> GenerateRequest {
    GenerateRequest {
        settings: GenerationSettings::builder().server_tools(tools).build(),
        ..request(text)
    }
}

#[tokio::test]
async fn search_grounding_is_requested_as_a_server_tool() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_partial_json(json!({ "tools": [{ "googleSearch": {} }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Rust 1.90 is the latest stable release." }] },
                "finishReason": "STOP",
                "groundingMetadata": {
                    "webSearchQueries": ["latest rust release"],
                    "groundingChunks": [{ "web": { "uri": "https://blog.rust-lang.org", "title": "Rust Blog" } }]
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generation = engine(&server)
        .generate(&with_server_tools("latest rust?", vec![ServerTool::GoogleSearch]))
        .await
        .unwrap();

    assert_eq!(generation.text, "Rust 1.90 is the latest stable release.");
    assert!(generation.is_final());
}

#[tokio::test]
async fn code_execution_parts_are_folded_into_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_partial_json(json!({ "tools": [{ "codeExecution": {} }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [
                    { "text": "Let me compute." },
                    { "executableCode": { "language": "PYTHON", "code": "print(2**10)\n" } },
                    { "codeExecutionResult": { "outcome": "OUTCOME_OK", "output": "1024\n" } },
                    { "text": "The answer is 1024." }
                ]},
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generation = engine(&server)
        .generate(&with_server_tools("2^10?", vec![ServerTool::CodeExecution]))
        .await
        .unwrap();

    assert_eq!(
        generation.text,
        "Let me compute.\n```python\nprint(2**10)\n```\n```\n1024\n```\nThe answer is 1024."
    );
    assert!(generation.tool_calls.is_empty());
}

#[test]
fn from_config_requires_a_key() {
    let config = agentweave::config::WeaveConfig::default();
    let err = GeminiEngine::from_config(&config).unwrap_err();
    assert_eq!(err.kind(), FailureKind::Configuration);
}
