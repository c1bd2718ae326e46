//! Test Orchestrator: fans every (model, prompt) pair out concurrently.
//!
//! Concurrency is unbounded: all `|models| x |prompts|` invocations are in
//! flight at once, with no queue and no backpressure. Large selections hit
//! the gateway's rate limits as a burst; that shows up as error-flagged
//! results, not as a failed run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};

use crate::catalog::ModelDescriptor;
use crate::crafting::TestPrompt;
use crate::error::AdvisorError;
use crate::invoker::{InferenceInvoker, InvocationResult};
use crate::trace::{InvocationTrace, TraceSink};

pub struct TestOrchestrator {
    invoker: Arc<InferenceInvoker>,
}

impl TestOrchestrator {
    pub fn new(invoker: Arc<InferenceInvoker>) -> Self {
        Self { invoker }
    }

    /// Run the full cross product and wait for every invocation.
    ///
    /// Results arrive in completion order; partition by `prompt_index` and
    /// `model.id` instead of relying on position.
    pub async fn run(
        &self,
        models: &[ModelDescriptor],
        prompts: &[TestPrompt],
    ) -> Result<Vec<InvocationResult>, AdvisorError> {
        self.run_with_trace(models, prompts, None).await
    }

    pub async fn run_with_trace(
        &self,
        models: &[ModelDescriptor],
        prompts: &[TestPrompt],
        trace: Option<&dyn TraceSink>,
    ) -> Result<Vec<InvocationResult>, AdvisorError> {
        if models.is_empty() {
            return Err(AdvisorError::invalid_input("no models selected"));
        }
        if prompts.is_empty() {
            return Err(AdvisorError::invalid_input("no prompts to run"));
        }
        if let Some(blank) = prompts.iter().find(|p| p.text.trim().is_empty()) {
            return Err(AdvisorError::invalid_input(format!(
                "prompt {} is empty",
                blank.index
            )));
        }
        let mut seen_models = HashSet::new();
        if let Some(dup) = models.iter().find(|m| !seen_models.insert(m.id.as_str())) {
            return Err(AdvisorError::invalid_input(format!(
                "model {} selected more than once",
                dup.id
            )));
        }
        let mut seen_prompts = HashSet::new();
        if let Some(dup) = prompts.iter().find(|p| !seen_prompts.insert(p.index)) {
            return Err(AdvisorError::invalid_input(format!(
                "prompt index {} used more than once",
                dup.index
            )));
        }

        let total = models.len() * prompts.len();
        let start = Instant::now();
        tracing::info!(
            models = models.len(),
            prompts = prompts.len(),
            invocations = total,
            "dispatching test run"
        );

        let tasks = prompts.iter().flat_map(|prompt| {
            models.iter().map(move |model| {
                let invoker = self.invoker.clone();
                async move {
                    invoker
                        .invoke_indexed(model, prompt.index, &prompt.text)
                        .await
                }
            })
        });

        let mut results = Vec::with_capacity(total);
        let mut completions = stream::iter(tasks).buffer_unordered(total);
        while let Some(result) = completions.next().await {
            if let Some(sink) = trace {
                if let Err(e) = sink.record(InvocationTrace::from_result(results.len(), &result)) {
                    tracing::warn!(error = %e, "failed to record invocation trace");
                }
            }
            results.push(result);
        }

        let failures = results.iter().filter(|r| r.is_error).count();
        tracing::info!(
            invocations = results.len(),
            failures,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "test run complete"
        );

        Ok(results)
    }
}
