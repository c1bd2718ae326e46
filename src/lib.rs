#![forbid(unsafe_code)]

//! # model-advisor
//!
//! Describe a use case, get test prompts for it, run them against several
//! language models at once, and compare the answers on speed, cost and
//! quality.
//!
//! The engine fans every (model, prompt) pair out concurrently through an
//! OpenRouter-compatible gateway. Failures never abort a run: a failed
//! invocation is an ordinary result flagged as an error. Per-model
//! aggregates feed a small recommender, each prompt group gets a
//! qualitative comparison from an asynchronous run service, and one more run
//! scores every model across the whole prompt set.

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod crafting;
pub mod error;
pub mod evaluation;
pub mod gateway;
pub mod invoker;
pub mod orchestrator;
pub mod pipeline;
pub mod prompts;
pub mod ranking;
pub mod recommend;
pub mod report;
pub mod telemetry;
pub mod trace;
pub mod workflow;

pub use aggregate::{aggregate, AggregatedPerformance};
pub use catalog::{default_catalog, ModelDescriptor};
pub use config::{AdvisorConfig, CostSource, InferenceConfig, RunServiceConfig};
pub use crafting::{
    fallback_prompt, is_soft_failure, join_prompts, split_prompts, PromptCraftingClient,
    TestPrompt, PROMPT_GENERATION_FAILED,
};
pub use error::AdvisorError;
pub use evaluation::{
    fallback_evaluation, EvaluationBoard, EvaluationOrchestrator, EvaluationRecord,
    EvaluationStatus,
};
pub use gateway::{Attribution, ChatGateway, ProviderError, ProviderGateway, RunService, UsageSink};
pub use invoker::{InferenceInvoker, InvocationResult, Metrics, FAILURE_MARKER};
pub use orchestrator::TestOrchestrator;
pub use pipeline::{Advisor, ComparisonReport, ComparisonRequest, EvaluationMode};
pub use ranking::{fallback_ranking, ModelRanker, ModelRanking};
pub use recommend::{recommend, Recommendations};
pub use report::render_report_markdown;
pub use trace::{InvocationTrace, JsonlTraceSink, TraceError, TraceSink, TraceWorker};
pub use workflow::{Workflow, WorkflowError, WorkflowState};
