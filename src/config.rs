//! Advisor configuration.
//!
//! Credentials are plain optional values. A missing credential is not an
//! error at load time; it surfaces as a config-missing failure on each call
//! into the affected service.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AdvisorError;
use crate::gateway::openrouter::DEFAULT_BASE_URL as OPENROUTER_BASE_URL;
use crate::gateway::runs::DEFAULT_BASE_URL as RUNS_BASE_URL;

/// Legacy per-token estimate used by the flat-rate cost source.
pub const DEFAULT_USD_PER_TOKEN: f64 = 0.000_02;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub inference: InferenceConfig,
    pub runs: RunServiceConfig,
}

/// Where an invocation's `cost_units` come from.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CostSource {
    /// The gateway's usage accounting (`usage.cost`, 0 when absent).
    #[default]
    Provider,
    /// Total tokens times a fixed rate.
    FlatRate {
        #[serde(default = "default_usd_per_token")]
        usd_per_token: f64,
    },
    /// Per-model input/output prices from the local pricing registry.
    PricingTable,
}

fn default_usd_per_token() -> f64 {
    DEFAULT_USD_PER_TOKEN
}

/// Inference gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Bearer credential. `None` makes every invocation fail soft.
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Sent as `HTTP-Referer`.
    pub referer: Option<String>,
    /// Sent as `X-Title`.
    pub app_title: Option<String>,
    /// Token ceiling for every invocation.
    pub max_tokens: u32,
    /// Sampling temperature for every invocation.
    pub temperature: f32,
    pub cost_source: CostSource,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: OPENROUTER_BASE_URL.to_string(),
            timeout_secs: 120,
            referer: Some("http://localhost:3000".to_string()),
            app_title: Some("AI Model Advisor".to_string()),
            max_tokens: 1024,
            temperature: 0.7,
            cost_source: CostSource::default(),
        }
    }
}

/// Asynchronous run service settings (prompt crafting and evaluation).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunServiceConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Model requested for each run; omitted from the request when `None`.
    pub model: Option<String>,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Upper bound on polling before the run counts as timed out.
    pub max_wait_secs: u64,
}

impl Default for RunServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: RUNS_BASE_URL.to_string(),
            model: Some("jamba-large".to_string()),
            timeout_secs: 30,
            poll_interval_ms: 2_000,
            max_wait_secs: 120,
        }
    }
}

impl AdvisorConfig {
    /// Load from a TOML file. Missing sections and fields take defaults.
    pub fn load(path: &Path) -> Result<Self, AdvisorError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, AdvisorError> {
        toml::from_str(raw)
            .map_err(|e| AdvisorError::Config(format!("invalid configuration: {e}")))
    }

    /// Overlay credentials and endpoints from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Overlay from an arbitrary lookup. Blank values are ignored.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENROUTER_API_KEY") {
            self.inference.api_key = Some(key);
        }
        if let Some(url) = get("OPENROUTER_BASE_URL") {
            self.inference.base_url = url;
        }
        if let Some(key) = get("AI21_API_KEY") {
            self.runs.api_key = Some(key);
        }
        if let Some(url) = get("AI21_BASE_URL") {
            self.runs.base_url = url;
        }
        self
    }
}
