//! Gateways to the two external services: the OpenRouter inference gateway
//! and the asynchronous run service used for prompt crafting and evaluation.

pub mod error;
pub mod openrouter;
pub mod pricing;
pub mod runs;
pub mod types;
pub mod usage;

use std::sync::Arc;

use openrouter::{ChatProvider, OpenRouterAdapter};
use usage::{CallStatus, ProviderCallRecord, UsageSink as UsageSinkTrait};

pub use error::{ErrorContext, ErrorKind, ProviderError};
pub use pricing::*;
pub use runs::{
    Requirement, RunOutput, RunRequest, RunService, RunServiceClient, RunStatus,
};
pub use types::*;
pub use usage::{NoopUsageSink, TracingUsageSink, UsageSink};

#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Inference gateway: one adapter call per request, usage recorded either way.
///
/// There is deliberately no retry loop: a failed invocation becomes an
/// error-flagged result, not a second attempt.
pub struct ProviderGateway<U: UsageSinkTrait> {
    openrouter: OpenRouterAdapter,
    usage_sink: Arc<U>,
}

#[async_trait::async_trait]
impl<U: UsageSinkTrait> ChatGateway for ProviderGateway<U> {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        ProviderGateway::chat(self, req).await
    }
}

impl<U: UsageSinkTrait> ProviderGateway<U> {
    pub fn new(openrouter: OpenRouterAdapter, usage_sink: Arc<U>) -> Self {
        Self {
            openrouter,
            usage_sink,
        }
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let result = self.openrouter.chat(&req).await;
        match &result {
            Ok(resp) => {
                self.record_usage(&req, Some(resp), CallStatus::Success, None)
                    .await
            }
            Err(err) => self.record_usage(&req, None, CallStatus::Error, Some(err)).await,
        }
        result
    }

    async fn record_usage(
        &self,
        req: &ChatRequest,
        resp: Option<&ChatResponse>,
        status: CallStatus,
        error: Option<&ProviderError>,
    ) {
        let record = ProviderCallRecord::new(
            req.model.provider(),
            "chat/completions",
            req.model.model_id(),
            req.attribution.caller,
        )
        .prompt(req.attribution.prompt_index);

        let record = match resp {
            Some(resp) => record
                .tokens(resp.total_tokens)
                .cost(resp.provider_cost_usd)
                .latency(resp.generation_latency().as_millis() as u64),
            None => record,
        };

        let record = match (status, error) {
            (CallStatus::Error, Some(err)) => record
                .error(err.code())
                .request_id(err.request_id().map(str::to_string)),
            (CallStatus::Error, None) => record.error("provider_error"),
            (CallStatus::Success, _) => record,
        };

        self.usage_sink.record(record).await;
    }
}
