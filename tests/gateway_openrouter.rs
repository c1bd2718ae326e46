use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use model_advisor::gateway::openrouter::{ChatProvider, OpenRouterAdapter};
use model_advisor::gateway::usage::{CallStatus, ProviderCallRecord};
use model_advisor::gateway::{
    Attribution, ChatModel, ChatRequest, ErrorKind, FinishReason, Message, NoopUsageSink,
    ProviderError, ProviderGateway, UsageSink,
};
use model_advisor::{InferenceConfig, InferenceInvoker, ModelDescriptor};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn adapter(server: &MockServer) -> OpenRouterAdapter {
    OpenRouterAdapter::with_config(
        Some("sk-test".to_string()),
        server.uri(),
        Duration::from_secs(5),
        Some("http://localhost:3000".to_string()),
        Some("AI Model Advisor".to_string()),
    )
    .unwrap()
}

fn request() -> ChatRequest {
    ChatRequest::new(
        ChatModel::openrouter("openai/gpt-3.5-turbo"),
        vec![Message::user("hi")],
        Attribution::new("test").with_prompt(1),
    )
    .temperature(0.7)
    .max_tokens(1024)
}

#[tokio::test]
async fn openrouter_sends_fixed_parameters_and_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(header("x-title", "AI Model Advisor"))
        .and(header("http-referer", "http://localhost:3000"))
        .and(body_partial_json(json!({
            "model": "openai/gpt-3.5-turbo",
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 1024
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "hello" }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30, "cost": 0.0004 },
            "response_ms": 850.0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = adapter(&server).chat(&request()).await.unwrap();
    assert_eq!(resp.content, "hello");
    assert_eq!(resp.finish_reason, FinishReason::Stop);
    assert_eq!(resp.total_tokens, 30);
    assert_eq!(resp.provider_cost_usd, Some(0.0004));
    assert_eq!(resp.generation_latency(), Duration::from_millis(850));
}

#[tokio::test]
async fn openrouter_missing_usage_defaults_to_zero() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "bare" } }]
        })))
        .mount(&server)
        .await;

    let resp = adapter(&server).chat(&request()).await.unwrap();
    assert_eq!(resp.total_tokens, 0);
    assert_eq!(resp.provider_cost_usd, None);
    assert_eq!(resp.provider_latency, None);
}

#[tokio::test]
async fn openrouter_non_2xx_carries_upstream_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("x-request-id", "req-42")
                .set_body_json(json!({
                    "error": { "message": "Rate limit exceeded", "code": 429 }
                })),
        )
        .mount(&server)
        .await;

    let err = adapter(&server).chat(&request()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert_eq!(err.to_string(), "Rate limit exceeded");
    assert_eq!(err.request_id(), Some("req-42"));
    let ctx = err.context().unwrap();
    assert_eq!(ctx.http_status, Some(429));
    assert_eq!(ctx.provider_code.as_deref(), Some("429"));
}

#[tokio::test]
async fn openrouter_non_json_error_body_uses_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = adapter(&server).chat(&request()).await.unwrap_err();
    assert_eq!(err.to_string(), "HTTP 502");
}

#[tokio::test]
async fn openrouter_malformed_success_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = adapter(&server).chat(&request()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Malformed);

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let err = adapter(&server).chat(&request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Malformed { .. }));
}

#[tokio::test]
async fn openrouter_without_credential_fails_before_network() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let adapter =
        OpenRouterAdapter::with_config(None, server.uri(), Duration::from_secs(5), None, None)
            .unwrap();
    let err = adapter.chat(&request()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigMissing);
}

#[derive(Default)]
struct CollectingSink {
    records: Mutex<Vec<ProviderCallRecord>>,
}

#[async_trait]
impl UsageSink for CollectingSink {
    async fn record(&self, record: ProviderCallRecord) {
        self.records.lock().unwrap().push(record);
    }
}

#[tokio::test]
async fn gateway_records_usage_for_success_and_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": "openai/gpt-3.5-turbo" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "ok" } }],
            "usage": { "total_tokens": 12, "cost": 0.001 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": "acme/down" })))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": { "message": "No endpoints available" }
        })))
        .mount(&server)
        .await;

    let sink = Arc::new(CollectingSink::default());
    let gateway = ProviderGateway::new(adapter(&server), sink.clone());

    gateway.chat(request()).await.unwrap();
    let mut failing = request();
    failing.model = ChatModel::openrouter("acme/down");
    gateway.chat(failing).await.unwrap_err();

    let records = sink.records.lock().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, CallStatus::Success);
    assert_eq!(records[0].tokens, 12);
    assert_eq!(records[0].cost_usd, Some(0.001));
    assert_eq!(records[0].prompt_index, Some(1));
    assert_eq!(records[1].status, CallStatus::Error);
    assert_eq!(records[1].error_code.as_deref(), Some("upstream_error"));
    assert_eq!(records[1].model, "acme/down");
}

#[tokio::test]
async fn out_of_range_provider_latency_falls_back_to_wall_clock() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "slow" } }],
            "usage": { "total_tokens": 5, "cost": 0.0001 },
            "response_ms": 1e30
        })))
        .mount(&server)
        .await;

    let resp = adapter(&server).chat(&request()).await.unwrap();
    assert_eq!(resp.provider_latency, None);
    assert_eq!(resp.generation_latency(), resp.latency);

    let gateway = ProviderGateway::new(adapter(&server), Arc::new(NoopUsageSink));
    let invoker = InferenceInvoker::new(Arc::new(gateway), &InferenceConfig::default());
    let model = ModelDescriptor::new("gpt-3.5-turbo", "GPT-3.5 Turbo", "OpenAI", "openai/gpt-3.5-turbo");
    let result = invoker.invoke(&model, "hi").await;
    assert!(!result.is_error);
    assert_eq!(result.output, "slow");
    assert!(result.metrics.response_time_seconds < 60.0);
}
