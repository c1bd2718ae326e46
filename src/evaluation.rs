//! Evaluation Orchestrator: one qualitative comparison per prompt group.
//!
//! Groups are evaluated independently and concurrently. Each eligible group
//! produces a `Pending` record as soon as it is dispatched and then exactly one
//! terminal record (`Complete` or `Failed`). A failed evaluation is reported as
//! failed; substituting [`fallback_evaluation`] is the caller's call.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{self, FuturesUnordered, Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::gateway::RunService;
use crate::invoker::InvocationResult;
use crate::prompts::{evaluation_request, EvaluationEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    Pending,
    Complete,
    Failed,
}

impl EvaluationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, EvaluationStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRecord {
    pub prompt_index: u32,
    pub status: EvaluationStatus,
    /// Narrative for `Complete`; `None` otherwise.
    pub content: Option<String>,
}

impl EvaluationRecord {
    pub fn pending(prompt_index: u32) -> Self {
        Self {
            prompt_index,
            status: EvaluationStatus::Pending,
            content: None,
        }
    }

    pub fn complete(prompt_index: u32, content: impl Into<String>) -> Self {
        Self {
            prompt_index,
            status: EvaluationStatus::Complete,
            content: Some(content.into()),
        }
    }

    pub fn failed(prompt_index: u32) -> Self {
        Self {
            prompt_index,
            status: EvaluationStatus::Failed,
            content: None,
        }
    }
}

/// Per-prompt evaluation state, keyed by prompt index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationBoard {
    records: BTreeMap<u32, EvaluationRecord>,
}

impl EvaluationBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert one record. A terminal record is never replaced; returns
    /// whether the update was stored.
    pub fn apply(&mut self, record: EvaluationRecord) -> bool {
        if let Some(current) = self.records.get(&record.prompt_index) {
            if current.status.is_terminal() {
                tracing::debug!(
                    prompt_index = record.prompt_index,
                    current = ?current.status,
                    incoming = ?record.status,
                    "ignoring update to settled evaluation"
                );
                return false;
            }
        }
        self.records.insert(record.prompt_index, record);
        true
    }

    pub fn get(&self, prompt_index: u32) -> Option<&EvaluationRecord> {
        self.records.get(&prompt_index)
    }

    /// Records in ascending prompt-index order.
    pub fn records(&self) -> impl Iterator<Item = &EvaluationRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True once every tracked group has reached a terminal status.
    pub fn is_settled(&self) -> bool {
        self.records.values().all(|r| r.status.is_terminal())
    }

    pub fn into_records(self) -> Vec<EvaluationRecord> {
        self.records.into_values().collect()
    }
}

/// Owned snapshot of one prompt group, ready to send.
#[derive(Debug, Clone)]
struct PromptGroup {
    prompt_index: u32,
    prompt_text: String,
    members: Vec<(String, String)>,
}

/// Partition by prompt index and keep groups with at least one success.
/// Error members stay in their group.
fn eligible_groups(results: &[InvocationResult]) -> Vec<PromptGroup> {
    let mut by_prompt: BTreeMap<u32, Vec<&InvocationResult>> = BTreeMap::new();
    for result in results {
        by_prompt.entry(result.prompt_index).or_default().push(result);
    }

    by_prompt
        .into_iter()
        .filter(|(_, members)| members.iter().any(|r| !r.is_error))
        .map(|(prompt_index, mut members)| {
            members.sort_by(|a, b| a.model.id.cmp(&b.model.id));
            PromptGroup {
                prompt_index,
                prompt_text: members[0].prompt_text.clone(),
                members: members
                    .iter()
                    .map(|r| (r.model.display_name.clone(), r.output.clone()))
                    .collect(),
            }
        })
        .collect()
}

pub struct EvaluationOrchestrator {
    runs: Arc<dyn RunService>,
}

impl EvaluationOrchestrator {
    pub fn new(runs: Arc<dyn RunService>) -> Self {
        Self { runs }
    }

    /// Evaluate every eligible group, yielding state transitions as they
    /// happen: all `Pending` records first, then one terminal record per
    /// group in completion order. The stream is lazy and finite.
    pub fn evaluate_all(
        &self,
        results: &[InvocationResult],
    ) -> impl Stream<Item = EvaluationRecord> + Send + 'static {
        let groups = eligible_groups(results);
        tracing::info!(groups = groups.len(), "dispatching evaluations");

        let pending: Vec<EvaluationRecord> = groups
            .iter()
            .map(|g| EvaluationRecord::pending(g.prompt_index))
            .collect();

        let settled: FuturesUnordered<_> = groups
            .into_iter()
            .map(|group| {
                let runs = self.runs.clone();
                async move { evaluate_group(runs.as_ref(), group).await }
            })
            .collect();

        stream::iter(pending).chain(settled)
    }

    /// Drive [`Self::evaluate_all`] to completion into a board.
    pub async fn evaluate_into_board(&self, results: &[InvocationResult]) -> EvaluationBoard {
        let mut board = EvaluationBoard::new();
        let mut updates = Box::pin(self.evaluate_all(results));
        while let Some(record) = updates.next().await {
            board.apply(record);
        }
        board
    }
}

async fn evaluate_group(runs: &dyn RunService, group: PromptGroup) -> EvaluationRecord {
    let entries: Vec<EvaluationEntry<'_>> = group
        .members
        .iter()
        .map(|(model_name, output)| EvaluationEntry {
            model_name,
            output,
        })
        .collect();
    let request = evaluation_request(&group.prompt_text, &entries);

    match runs.run(&request).await {
        Ok(output) => {
            let content = output.into_text();
            if content.trim().is_empty() {
                tracing::warn!(
                    prompt_index = group.prompt_index,
                    "evaluation returned empty content"
                );
                return EvaluationRecord::failed(group.prompt_index);
            }
            tracing::debug!(prompt_index = group.prompt_index, "evaluation complete");
            EvaluationRecord::complete(group.prompt_index, content)
        }
        Err(e) => {
            tracing::warn!(
                prompt_index = group.prompt_index,
                code = e.code(),
                error = %e,
                "evaluation failed"
            );
            EvaluationRecord::failed(group.prompt_index)
        }
    }
}

/// Local markdown skeleton naming every model in a group. Marked as
/// auto-generated; never produced by the orchestrator on its own.
pub fn fallback_evaluation(prompt_text: &str, outputs: &[InvocationResult]) -> String {
    let names: Vec<&str> = outputs
        .iter()
        .map(|r| r.model.display_name.as_str())
        .collect();

    let mut md = String::new();
    md.push_str("# Model Evaluation\n\n");
    md.push_str("_Auto-generated placeholder: the evaluation service was unavailable._\n\n");
    md.push_str("## Summary of Model Performances\n\n");
    md.push_str(&format!(
        "Responses from {} to the prompt: \"{}\".\n\n",
        names.join(", "),
        prompt_text.trim()
    ));

    for result in outputs {
        md.push_str(&format!("### {}\n\n", result.model.display_name));
        if result.is_error {
            md.push_str("- The invocation failed; no response to assess.\n\n");
        } else {
            md.push_str(&format!(
                "- Responded in {:.2}s using {} tokens.\n\n",
                result.metrics.response_time_seconds, result.metrics.tokens_used
            ));
        }
    }

    md.push_str("## Comparative Analysis\n\n");
    md.push_str("Not available without the evaluation service.\n\n");
    md.push_str("## Recommendation\n\n");
    match outputs.iter().find(|r| !r.is_error) {
        Some(first) => md.push_str(&format!(
            "No qualitative ranking. {} is the first model with a usable response.\n",
            first.model.display_name
        )),
        None => md.push_str("No model produced a usable response.\n"),
    }
    md
}
