//! Inference Invoker: one (model, prompt) execution against the gateway.
//!
//! Never fails past its boundary. Every failure becomes an error-flagged
//! [`InvocationResult`] whose output starts with [`FAILURE_MARKER`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::ModelDescriptor;
use crate::config::{CostSource, InferenceConfig};
use crate::gateway::{
    chat_cost_usd, Attribution, ChatGateway, ChatModel, ChatRequest, ChatResponse, Message,
};

/// Prefix of every failed invocation's output.
pub const FAILURE_MARKER: &str = "Error:";

/// Output used when the gateway answers without any message content.
pub const EMPTY_CONTENT: &str = "No response content";

/// Per-invocation measurements. All zero on error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub tokens_used: u32,
    pub response_time_seconds: f64,
    pub cost_units: f64,
}

/// Outcome of one invocation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    pub model: ModelDescriptor,
    pub prompt_index: u32,
    pub prompt_text: String,
    pub output: String,
    pub metrics: Metrics,
    pub is_error: bool,
    /// Cross-prompt ranking score (1 to 10) for this result's model, once ranked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl InvocationResult {
    /// Build a result; `is_error` follows the output's failure marker and
    /// error results carry zero metrics.
    pub fn new(
        model: ModelDescriptor,
        prompt_index: u32,
        prompt_text: impl Into<String>,
        output: impl Into<String>,
        metrics: Metrics,
    ) -> Self {
        let output = output.into();
        let is_error = output.starts_with(FAILURE_MARKER);
        Self {
            model,
            prompt_index,
            prompt_text: prompt_text.into(),
            output,
            metrics: if is_error { Metrics::default() } else { metrics },
            is_error,
            score: None,
        }
    }

    pub fn failure(
        model: ModelDescriptor,
        prompt_index: u32,
        prompt_text: impl Into<String>,
        detail: impl std::fmt::Display,
    ) -> Self {
        Self::new(
            model,
            prompt_index,
            prompt_text,
            format!("{FAILURE_MARKER} {detail}"),
            Metrics::default(),
        )
    }
}

pub struct InferenceInvoker {
    gateway: Arc<dyn ChatGateway>,
    max_tokens: u32,
    temperature: f32,
    cost_source: CostSource,
}

impl InferenceInvoker {
    pub fn new(gateway: Arc<dyn ChatGateway>, config: &InferenceConfig) -> Self {
        Self {
            gateway,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            cost_source: config.cost_source,
        }
    }

    /// Invoke without a prompt group; the result's `prompt_index` is 0.
    pub async fn invoke(&self, model: &ModelDescriptor, prompt_text: &str) -> InvocationResult {
        self.invoke_indexed(model, 0, prompt_text).await
    }

    /// Invoke on behalf of prompt group `prompt_index`.
    pub async fn invoke_indexed(
        &self,
        model: &ModelDescriptor,
        prompt_index: u32,
        prompt_text: &str,
    ) -> InvocationResult {
        let mut attribution = Attribution::new("invoker::invoke");
        if prompt_index > 0 {
            attribution = attribution.with_prompt(prompt_index);
        }
        let req = ChatRequest::new(
            ChatModel::openrouter(&model.inference_id),
            vec![Message::user(prompt_text)],
            attribution,
        )
        .temperature(self.temperature)
        .max_tokens(self.max_tokens);

        match self.gateway.chat(req).await {
            Ok(resp) => {
                let metrics = self.metrics_for(&model.inference_id, &resp);
                let output = if resp.content.is_empty() {
                    EMPTY_CONTENT.to_string()
                } else {
                    resp.content
                };
                tracing::debug!(
                    model = %model.id,
                    prompt_index,
                    tokens = metrics.tokens_used,
                    elapsed_ms = (metrics.response_time_seconds * 1_000.0) as u64,
                    "invocation succeeded"
                );
                InvocationResult::new(model.clone(), prompt_index, prompt_text, output, metrics)
            }
            Err(e) => {
                tracing::warn!(
                    model = %model.id,
                    prompt_index,
                    code = e.code(),
                    error = %e,
                    "invocation failed"
                );
                InvocationResult::failure(model.clone(), prompt_index, prompt_text, e)
            }
        }
    }

    fn metrics_for(&self, inference_id: &str, resp: &ChatResponse) -> Metrics {
        let cost_units = match self.cost_source {
            CostSource::Provider => resp.provider_cost_usd.unwrap_or(0.0),
            CostSource::FlatRate { usd_per_token } => resp.total_tokens as f64 * usd_per_token,
            CostSource::PricingTable => {
                chat_cost_usd(inference_id, resp.input_tokens, resp.output_tokens)
            }
        };
        Metrics {
            tokens_used: resp.total_tokens,
            response_time_seconds: resp.generation_latency().as_secs_f64(),
            cost_units: cost_units.max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::gateway::{FinishReason, ProviderError};

    struct FixedGateway {
        response: Mutex<Option<Result<ChatResponse, ProviderError>>>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl FixedGateway {
        fn new(response: Result<ChatResponse, ProviderError>) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Some(response)),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatGateway for FixedGateway {
        async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.seen.lock().unwrap().push(req);
            self.response
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(ProviderError::upstream("openrouter", "exhausted")))
        }
    }

    fn response(content: &str) -> ChatResponse {
        ChatResponse {
            content: content.to_string(),
            input_tokens: 40,
            output_tokens: 60,
            total_tokens: 100,
            provider_cost_usd: Some(0.01),
            provider_latency: Some(Duration::from_millis(1_250)),
            latency: Duration::from_millis(1_400),
            finish_reason: FinishReason::Stop,
        }
    }

    fn model() -> ModelDescriptor {
        ModelDescriptor::new("gpt-3.5-turbo", "GPT-3.5 Turbo", "OpenAI", "openai/gpt-3.5-turbo")
    }

    #[tokio::test]
    async fn success_reads_usage_and_provider_latency() {
        let gateway = FixedGateway::new(Ok(response("Paris")));
        let invoker = InferenceInvoker::new(gateway.clone(), &InferenceConfig::default());

        let result = invoker.invoke_indexed(&model(), 2, "Capital of France?").await;

        assert!(!result.is_error);
        assert_eq!(result.output, "Paris");
        assert_eq!(result.prompt_index, 2);
        assert_eq!(result.metrics.tokens_used, 100);
        assert!((result.metrics.cost_units - 0.01).abs() < 1e-12);
        assert!((result.metrics.response_time_seconds - 1.25).abs() < 1e-9);

        let seen = gateway.seen.lock().unwrap();
        assert_eq!(seen[0].model.model_id(), "openai/gpt-3.5-turbo");
        assert_eq!(seen[0].max_tokens, Some(1024));
        assert_eq!(seen[0].messages.len(), 1);
        assert_eq!(seen[0].attribution.prompt_index, Some(2));
    }

    #[tokio::test]
    async fn failure_becomes_marked_result_with_zero_metrics() {
        let gateway = FixedGateway::new(Err(ProviderError::upstream(
            "openrouter",
            "Rate limit exceeded",
        )));
        let invoker = InferenceInvoker::new(gateway, &InferenceConfig::default());

        let result = invoker.invoke(&model(), "hi").await;

        assert!(result.is_error);
        assert_eq!(result.output, "Error: Rate limit exceeded");
        assert_eq!(result.metrics, Metrics::default());
    }

    #[tokio::test]
    async fn flat_rate_cost_uses_total_tokens() {
        let gateway = FixedGateway::new(Ok(response("ok")));
        let config = InferenceConfig {
            cost_source: CostSource::FlatRate {
                usd_per_token: 0.000_02,
            },
            ..Default::default()
        };
        let invoker = InferenceInvoker::new(gateway, &config);

        let result = invoker.invoke(&model(), "hi").await;
        assert!((result.metrics.cost_units - 0.002).abs() < 1e-12);
    }

    #[tokio::test]
    async fn empty_content_is_replaced() {
        let gateway = FixedGateway::new(Ok(response("")));
        let invoker = InferenceInvoker::new(gateway, &InferenceConfig::default());
        let result = invoker.invoke(&model(), "hi").await;
        assert!(!result.is_error);
        assert_eq!(result.output, EMPTY_CONTENT);
    }

    #[test]
    fn marker_drives_error_flag() {
        let metrics = Metrics {
            tokens_used: 5,
            response_time_seconds: 1.0,
            cost_units: 0.1,
        };
        let r = InvocationResult::new(model(), 1, "p", "Error: boom", metrics);
        assert!(r.is_error);
        assert_eq!(r.metrics, Metrics::default());

        let r = InvocationResult::new(model(), 1, "p", "fine", metrics);
        assert!(!r.is_error);
        assert_eq!(r.metrics.tokens_used, 5);
    }
}
