//! Comparison pipeline: craft → test → aggregate/recommend → evaluate → rank.
//!
//! [`Advisor`] wires the clients and orchestrators together and drives the
//! workflow state machine through one full comparison.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{aggregate, order_by_catalog, AggregatedPerformance};
use crate::catalog::{default_catalog, sort_by_catalog, ModelDescriptor};
use crate::config::{AdvisorConfig, InferenceConfig};
use crate::crafting::{
    fallback_prompt, is_soft_failure, join_prompts, split_prompts, PromptCraftingClient,
    TestPrompt,
};
use crate::error::AdvisorError;
use crate::evaluation::{
    fallback_evaluation, EvaluationBoard, EvaluationOrchestrator, EvaluationRecord,
    EvaluationStatus,
};
use crate::gateway::openrouter::OpenRouterAdapter;
use crate::gateway::{ChatGateway, ProviderGateway, RunService, RunServiceClient, TracingUsageSink};
use crate::invoker::{InferenceInvoker, InvocationResult};
use crate::orchestrator::TestOrchestrator;
use crate::ranking::{apply_scores, fallback_ranking, ModelRanker, ModelRanking};
use crate::recommend::{recommend, Recommendations};
use crate::trace::{JsonlTraceSink, TraceSink};
use crate::workflow::{Workflow, WorkflowState};

// =============================================================================
// Request / report
// =============================================================================

/// What to do about qualitative evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Skip the evaluation pass.
    Skip,
    /// Evaluate through the run service; failures stay failures.
    #[default]
    Service,
    /// As `Service`, and attach a local placeholder to every failed group.
    ServiceWithFallback,
}

#[derive(Debug, Clone)]
pub struct ComparisonRequest {
    /// Use case to craft prompts from. Required unless `prompts` is set.
    pub use_case: Option<String>,
    /// Prompts supplied directly; skips crafting.
    pub prompts: Option<Vec<TestPrompt>>,
    pub desired_count: usize,
    pub models: Vec<ModelDescriptor>,
    pub evaluation: EvaluationMode,
    /// Continue with a local placeholder prompt when crafting fails.
    pub prompt_fallback: bool,
    /// Rank models across all prompts. Follows `evaluation`: skipped with
    /// `Skip`, falls back to a placeholder ranking with `ServiceWithFallback`.
    pub ranking: bool,
}

impl ComparisonRequest {
    pub fn from_use_case(use_case: impl Into<String>, models: Vec<ModelDescriptor>) -> Self {
        Self {
            use_case: Some(use_case.into()),
            prompts: None,
            desired_count: 3,
            models,
            evaluation: EvaluationMode::default(),
            prompt_fallback: false,
            ranking: true,
        }
    }

    pub fn from_prompts(prompts: Vec<TestPrompt>, models: Vec<ModelDescriptor>) -> Self {
        Self {
            use_case: None,
            prompts: Some(prompts),
            desired_count: 0,
            models,
            evaluation: EvaluationMode::default(),
            prompt_fallback: false,
            ranking: true,
        }
    }

    pub fn desired_count(mut self, count: usize) -> Self {
        self.desired_count = count;
        self
    }

    pub fn evaluation(mut self, mode: EvaluationMode) -> Self {
        self.evaluation = mode;
        self
    }

    pub fn prompt_fallback(mut self, enabled: bool) -> Self {
        self.prompt_fallback = enabled;
        self
    }

    pub fn ranking(mut self, enabled: bool) -> Self {
        self.ranking = enabled;
        self
    }
}

/// Everything one comparison produced. Serializable for `--out` and `report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub id: Uuid,
    pub created_at: String,
    /// blake3 over the prompt texts and model ids.
    pub request_hash: String,
    pub use_case: Option<String>,
    pub prompts: Vec<TestPrompt>,
    pub models: Vec<ModelDescriptor>,
    pub results: Vec<InvocationResult>,
    pub aggregated: Vec<AggregatedPerformance>,
    pub recommendations: Recommendations,
    pub evaluations: Vec<EvaluationRecord>,
    /// Local placeholders for failed evaluation groups, when requested.
    #[serde(default)]
    pub fallback_evaluations: BTreeMap<u32, String>,
    /// Cross-prompt ranking, best first. Empty when skipped or failed.
    #[serde(default)]
    pub rankings: Vec<ModelRanking>,
    /// True when `rankings` is the local placeholder.
    #[serde(default)]
    pub ranking_fallback: bool,
    pub state: WorkflowState,
    pub elapsed_ms: u64,
}

impl ComparisonReport {
    /// Results for one prompt group, ordered by model position in `models`.
    pub fn results_for_prompt(&self, prompt_index: u32) -> Vec<&InvocationResult> {
        let mut group: Vec<&InvocationResult> = self
            .results
            .iter()
            .filter(|r| r.prompt_index == prompt_index)
            .collect();
        group.sort_by_key(|r| {
            self.models
                .iter()
                .position(|m| m.id == r.model.id)
                .unwrap_or(usize::MAX)
        });
        group
    }

    pub fn ranking_for(&self, model_id: &str) -> Option<&ModelRanking> {
        self.rankings.iter().find(|r| r.model == model_id)
    }

    pub fn evaluation_for(&self, prompt_index: u32) -> Option<&EvaluationRecord> {
        self.evaluations
            .iter()
            .find(|e| e.prompt_index == prompt_index)
    }
}

fn hash_request(prompts: &[TestPrompt], models: &[ModelDescriptor]) -> String {
    let texts: Vec<&str> = prompts.iter().map(|p| p.text.as_str()).collect();
    let ids: Vec<&str> = models.iter().map(|m| m.inference_id.as_str()).collect();
    let bytes = serde_json::to_vec(&(texts, ids)).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

// =============================================================================
// Advisor
// =============================================================================

pub struct Advisor {
    crafting: PromptCraftingClient,
    orchestrator: TestOrchestrator,
    evaluation: EvaluationOrchestrator,
    ranker: ModelRanker,
    catalog: Vec<ModelDescriptor>,
}

impl Advisor {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        runs: Arc<dyn RunService>,
        inference: &InferenceConfig,
    ) -> Self {
        let invoker = Arc::new(InferenceInvoker::new(gateway, inference));
        Self {
            crafting: PromptCraftingClient::new(runs.clone()),
            orchestrator: TestOrchestrator::new(invoker),
            evaluation: EvaluationOrchestrator::new(runs.clone()),
            ranker: ModelRanker::new(runs),
            catalog: default_catalog(),
        }
    }

    /// Build HTTP clients for both services. Missing credentials are fine
    /// here; they fail each call instead.
    pub fn from_config(config: &AdvisorConfig) -> Result<Self, AdvisorError> {
        let adapter = OpenRouterAdapter::from_config(&config.inference)
            .map_err(|e| AdvisorError::Config(e.to_string()))?;
        let gateway = ProviderGateway::new(adapter, Arc::new(TracingUsageSink));
        let runs = RunServiceClient::from_config(&config.runs)
            .map_err(|e| AdvisorError::Config(e.to_string()))?;
        Ok(Self::new(
            Arc::new(gateway),
            Arc::new(runs),
            &config.inference,
        ))
    }

    pub fn with_catalog(mut self, catalog: Vec<ModelDescriptor>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn catalog(&self) -> &[ModelDescriptor] {
        &self.catalog
    }

    pub async fn generate_prompts(&self, use_case: &str, desired_count: usize) -> Vec<TestPrompt> {
        self.crafting.generate_prompts(use_case, desired_count).await
    }

    /// Run one full comparison.
    ///
    /// Only caller mistakes come back as `Err`: no models, no usable prompts,
    /// or a crafting failure without `prompt_fallback`. Every external
    /// failure after that is data inside the report.
    pub async fn compare(
        &self,
        req: ComparisonRequest,
        trace: Option<&dyn TraceSink>,
    ) -> Result<ComparisonReport, AdvisorError> {
        let start = Instant::now();
        let mut workflow = Workflow::new();

        if req.models.is_empty() {
            return Err(AdvisorError::invalid_input("no models selected"));
        }
        let mut models = req.models;
        sort_by_catalog(&mut models, &self.catalog);

        // --- Phase 1: Prompts ---
        let prompts = match req.prompts {
            Some(prompts) => prompts,
            None => {
                let use_case = req
                    .use_case
                    .as_deref()
                    .filter(|u| !u.trim().is_empty())
                    .ok_or_else(|| {
                        AdvisorError::invalid_input("a use case or explicit prompts are required")
                    })?;
                let crafted = self
                    .crafting
                    .generate_prompts(use_case, req.desired_count.max(1))
                    .await;
                if is_soft_failure(&crafted) && req.prompt_fallback {
                    tracing::warn!("prompt crafting failed, continuing with local placeholder");
                    vec![TestPrompt::new(1, fallback_prompt(use_case))]
                } else {
                    crafted
                }
            }
        };
        workflow.prompts_ready(&prompts)?;
        tracing::info!(prompts = prompts.len(), state = %workflow.state(), "prompts ready");

        // --- Phase 2: Test ---
        let joined = join_prompts(&prompts);
        workflow.submit(models.len(), &joined)?;
        let prompts = split_prompts(&joined);

        let mut results = match self
            .orchestrator
            .run_with_trace(&models, &prompts, trace)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                workflow.run_rejected()?;
                return Err(e);
            }
        };
        workflow.run_resolved()?;

        // --- Phase 3: Aggregate + recommend ---
        let aggregated = order_by_catalog(aggregate(&results), &models);
        let recommendations = recommend(&aggregated);
        match &recommendations.best_overall {
            Some(best) => tracing::info!(best_overall = %best.model.id, "recommendation ready"),
            None => tracing::warn!("no model produced a successful response"),
        }

        // --- Phase 4: Evaluate ---
        let mut fallback_evaluations = BTreeMap::new();
        let evaluations = match req.evaluation {
            EvaluationMode::Skip => Vec::new(),
            EvaluationMode::Service | EvaluationMode::ServiceWithFallback => {
                let mut board = EvaluationBoard::new();
                let mut updates = Box::pin(self.evaluation.evaluate_all(&results));
                while let Some(record) = updates.next().await {
                    tracing::debug!(
                        prompt_index = record.prompt_index,
                        status = ?record.status,
                        "evaluation update"
                    );
                    board.apply(record);
                }

                if req.evaluation == EvaluationMode::ServiceWithFallback {
                    for record in board.records() {
                        if record.status == EvaluationStatus::Failed {
                            let group: Vec<InvocationResult> = results
                                .iter()
                                .filter(|r| r.prompt_index == record.prompt_index)
                                .cloned()
                                .collect();
                            let prompt_text = group
                                .first()
                                .map(|r| r.prompt_text.as_str())
                                .unwrap_or_default();
                            fallback_evaluations.insert(
                                record.prompt_index,
                                fallback_evaluation(prompt_text, &group),
                            );
                        }
                    }
                }
                board.into_records()
            }
        };

        // --- Phase 5: Rank ---
        let mut rankings = Vec::new();
        let mut ranking_fallback = false;
        let wants_ranking = req.ranking && req.evaluation != EvaluationMode::Skip;
        if wants_ranking && results.iter().any(|r| !r.is_error) {
            match self.ranker.rank_models(&results).await {
                Ok(ranked) => rankings = ranked,
                Err(e) => {
                    tracing::warn!(code = e.code(), error = %e, "ranking failed");
                    if req.evaluation == EvaluationMode::ServiceWithFallback {
                        rankings = fallback_ranking(&models);
                        ranking_fallback = true;
                    }
                }
            }
            apply_scores(&mut results, &rankings);
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            invocations = results.len(),
            evaluations = evaluations.len(),
            elapsed_ms,
            "comparison complete"
        );

        Ok(ComparisonReport {
            id: Uuid::new_v4(),
            created_at: Utc::now().to_rfc3339(),
            request_hash: hash_request(&prompts, &models),
            use_case: req.use_case,
            prompts,
            models,
            results,
            aggregated,
            recommendations,
            evaluations,
            fallback_evaluations,
            rankings,
            ranking_fallback,
            state: workflow.state(),
            elapsed_ms,
        })
    }

    /// Convenience: run a comparison and write the invocation trace to a file.
    pub async fn compare_with_trace_file(
        &self,
        req: ComparisonRequest,
        trace_path: Option<std::path::PathBuf>,
    ) -> Result<ComparisonReport, AdvisorError> {
        let (trace_sink, trace_worker) = if let Some(path) = trace_path {
            let (sink, worker) = JsonlTraceSink::new(path)
                .map_err(|e| AdvisorError::Config(format!("cannot open trace file: {e}")))?;
            (Some(sink), Some(worker))
        } else {
            (None, None)
        };
        let trace_ref = trace_sink.as_ref().map(|s| s as &dyn TraceSink);

        let result = self.compare(req, trace_ref).await;

        drop(trace_sink);
        if let Some(worker) = trace_worker {
            if let Err(e) = worker.join() {
                tracing::warn!(error = %e, "trace writer failed");
            }
        }

        result
    }
}
