//! Client for the asynchronous run service used for prompt crafting and
//! qualitative evaluation.
//!
//! A run is submitted with free-text instructions plus structured
//! requirements, then polled at a fixed interval until it settles as
//! `completed` or `failed`. A run still in flight after the maximum wait is a
//! [`ProviderError::Timeout`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::RunServiceConfig;

use super::error::{ErrorContext, ProviderError};

const SERVICE: &str = "runs";

pub const DEFAULT_BASE_URL: &str = "https://api.ai21.com/studio/v1/maestro";

// =============================================================================
// TYPES
// =============================================================================

/// A constraint on the shape of the run's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub name: String,
    pub description: String,
    pub is_mandatory: bool,
}

impl Requirement {
    pub fn mandatory(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            is_mandatory: true,
        }
    }

    pub fn optional(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            is_mandatory: false,
        }
    }
}

/// One run submission.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub input: String,
    pub system: Option<String>,
    pub requirements: Vec<Requirement>,
}

impl RunRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }
}

/// Lifecycle status reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Failed,
    /// Anything else ("queued", "in_progress", ...) means keep polling.
    Running(String),
}

impl From<&str> for RunStatus {
    fn from(s: &str) -> Self {
        match s {
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            other => RunStatus::Running(other.to_string()),
        }
    }
}

/// Result payload of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutput {
    /// The result was a list, either natively or as text that parses as one.
    List(Vec<String>),
    Text(String),
}

impl RunOutput {
    /// Interpret a raw `result` value.
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Array(items) => Some(RunOutput::List(list_items(items))),
            serde_json::Value::String(text) => {
                match serde_json::from_str::<serde_json::Value>(text.trim()) {
                    Ok(serde_json::Value::Array(items)) => Some(RunOutput::List(list_items(items))),
                    _ => Some(RunOutput::Text(text)),
                }
            }
            other => Some(RunOutput::Text(other.to_string())),
        }
    }

    /// The output as narrative text; lists are joined one item per line.
    pub fn into_text(self) -> String {
        match self {
            RunOutput::Text(text) => text,
            RunOutput::List(items) => items.join("\n"),
        }
    }
}

fn list_items(items: Vec<serde_json::Value>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .collect()
}

// =============================================================================
// TRAIT
// =============================================================================

/// Submit-and-wait access to the run service.
#[async_trait]
pub trait RunService: Send + Sync {
    async fn run(&self, req: &RunRequest) -> Result<RunOutput, ProviderError>;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

#[derive(Serialize)]
struct CreateRunBody<'a> {
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    requirements: &'a [Requirement],
}

#[derive(Deserialize)]
struct RunEnvelope {
    id: Option<String>,
    status: Option<String>,
    result: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<serde_json::Value>,
    detail: Option<serde_json::Value>,
}

/// Pull a human-readable message out of `{error: {message}}`, `{error: "..."}`
/// or `{detail: ...}` shapes.
fn error_message(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Object(map) => map
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// HTTP client for the run service.
#[derive(Debug, Clone)]
pub struct RunServiceClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: Option<String>,
    poll_interval: Duration,
    max_wait: Duration,
}

impl RunServiceClient {
    pub fn from_config(config: &RunServiceConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| ProviderError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: config.model.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_wait: Duration::from_secs(config.max_wait_secs),
        })
    }

    /// Override polling cadence.
    pub fn with_polling(mut self, poll_interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_wait = max_wait;
        self
    }

    fn runs_url(&self) -> String {
        format!("{}/runs", self.base_url)
    }

    fn run_url(&self, id: &str) -> String {
        format!("{}/runs/{}", self.base_url, id)
    }

    async fn read_envelope(response: reqwest::Response) -> Result<RunEnvelope, ProviderError> {
        let status = response.status();
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        if !status.is_success() {
            let mut ctx = ErrorContext::new().with_status(status.as_u16());
            if let Some(id) = request_id {
                ctx = ctx.with_request_id(id);
            }
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.or(b.detail))
                .as_ref()
                .and_then(error_message)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(ProviderError::upstream_with_context(SERVICE, message, ctx));
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::malformed(SERVICE, format!("Invalid JSON: {e}")))
    }

    /// Settle an envelope: `Some` once the run is terminal, `None` to keep polling.
    fn settle(envelope: RunEnvelope) -> Option<Result<RunOutput, ProviderError>> {
        let status = RunStatus::from(envelope.status.as_deref().unwrap_or(""));
        match status {
            RunStatus::Completed => Some(
                envelope
                    .result
                    .and_then(RunOutput::from_value)
                    .ok_or_else(|| ProviderError::malformed(SERVICE, "completed run has no result")),
            ),
            RunStatus::Failed => {
                let message = envelope
                    .error
                    .as_ref()
                    .and_then(error_message)
                    .unwrap_or_else(|| "run failed".to_string());
                Some(Err(ProviderError::upstream(SERVICE, message)))
            }
            RunStatus::Running(_) => None,
        }
    }
}

#[async_trait]
impl RunService for RunServiceClient {
    async fn run(&self, req: &RunRequest) -> Result<RunOutput, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::config("run service credential not configured"))?;

        let body = CreateRunBody {
            input: &req.input,
            system: req.system.as_deref(),
            model: self.model.as_deref(),
            requirements: &req.requirements,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(self.runs_url())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        let created = Self::read_envelope(response).await?;

        let id = created
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::malformed(SERVICE, "run submission returned no id"))?;

        if let Some(settled) = Self::settle(created) {
            return settled;
        }

        tracing::debug!(run_id = %id, "run submitted, polling");

        loop {
            if start.elapsed() >= self.max_wait {
                return Err(ProviderError::timeout(SERVICE, self.max_wait));
            }
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .client
                .get(self.run_url(&id))
                .bearer_auth(api_key)
                .send()
                .await?;
            let envelope = Self::read_envelope(response).await?;

            if let Some(settled) = Self::settle(envelope) {
                tracing::debug!(
                    run_id = %id,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    ok = settled.is_ok(),
                    "run settled"
                );
                return settled;
            }
        }
    }
}
