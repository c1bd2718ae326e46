//! Cross-prompt ranking: one run service call scores every model over the
//! whole prompt set.
//!
//! A failed or unparsable ranking is returned as an error. Substituting
//! [`fallback_ranking`] is the caller's decision.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::ModelDescriptor;
use crate::crafting::extract_json_array;
use crate::gateway::{ProviderError, RunOutput, RunService};
use crate::invoker::InvocationResult;
use crate::prompts::{ranking_request, EvaluationEntry, RankingQuestion};

const SERVICE: &str = "ranking";

/// Score given to every model by [`fallback_ranking`].
pub const FALLBACK_SCORE: f64 = 5.0;

pub const FALLBACK_JUSTIFICATION: &str = "Automatic ranking fallback";

/// One model's place in the cross-prompt ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRanking {
    /// 1 is best.
    pub rank: u32,
    /// Catalog id of the ranked model.
    pub model: String,
    /// 1 to 10.
    pub score: f64,
    pub justification: String,
}

/// Shape the service is asked to return. Extra fields are ignored.
#[derive(Debug, Deserialize)]
struct RankingEntry {
    rank: u32,
    model: String,
    score: f64,
    #[serde(default)]
    justification: String,
}

pub struct ModelRanker {
    runs: Arc<dyn RunService>,
}

impl ModelRanker {
    pub fn new(runs: Arc<dyn RunService>) -> Self {
        Self { runs }
    }

    /// Rank every model present in `results` across all of their prompts.
    ///
    /// Entries naming a model that was not tested are dropped; scores are
    /// clamped to 1..=10. The returned rankings are sorted by rank.
    pub async fn rank_models(
        &self,
        results: &[InvocationResult],
    ) -> Result<Vec<ModelRanking>, ProviderError> {
        if results.is_empty() {
            return Err(ProviderError::invalid_request("nothing to rank"));
        }

        let mut by_prompt: BTreeMap<u32, Vec<&InvocationResult>> = BTreeMap::new();
        for result in results {
            by_prompt.entry(result.prompt_index).or_default().push(result);
        }
        let questions: Vec<RankingQuestion<'_>> = by_prompt
            .into_values()
            .map(|mut members| {
                members.sort_by(|a, b| a.model.id.cmp(&b.model.id));
                let first: &InvocationResult = members[0];
                RankingQuestion {
                    prompt_text: first.prompt_text.as_str(),
                    entries: members
                        .into_iter()
                        .map(|r| EvaluationEntry {
                            model_name: r.model.id.as_str(),
                            output: r.output.as_str(),
                        })
                        .collect(),
                }
            })
            .collect();

        let output = self.runs.run(&ranking_request(&questions)).await?;
        let entries = match output {
            RunOutput::List(items) => items
                .iter()
                .map(|item| serde_json::from_str::<RankingEntry>(item))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ProviderError::malformed(SERVICE, format!("Invalid ranking: {e}")))?,
            RunOutput::Text(text) => parse_ranking_text(&text)?,
        };

        let mut rankings: Vec<ModelRanking> = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(model) = resolve_model(results, &entry.model) else {
                tracing::warn!(model = %entry.model, "ranking names an untested model, dropping");
                continue;
            };
            if rankings.iter().any(|r| r.model == model.id) {
                continue;
            }
            if !entry.score.is_finite() {
                return Err(ProviderError::malformed(SERVICE, "non-numeric score"));
            }
            rankings.push(ModelRanking {
                rank: entry.rank,
                model: model.id.clone(),
                score: entry.score.clamp(1.0, 10.0),
                justification: entry.justification.trim().to_string(),
            });
        }

        if rankings.is_empty() {
            return Err(ProviderError::malformed(SERVICE, "ranking named no tested model"));
        }
        rankings.sort_by_key(|r| r.rank);
        tracing::info!(ranked = rankings.len(), "ranking complete");
        Ok(rankings)
    }
}

fn parse_ranking_text(text: &str) -> Result<Vec<RankingEntry>, ProviderError> {
    let json = extract_json_array(text)
        .ok_or_else(|| ProviderError::malformed(SERVICE, "no JSON array in result"))?;
    serde_json::from_str(json)
        .map_err(|e| ProviderError::malformed(SERVICE, format!("Invalid ranking: {e}")))
}

/// Match a ranked name against the tested models by id, then display name.
fn resolve_model<'a>(results: &'a [InvocationResult], name: &str) -> Option<&'a ModelDescriptor> {
    let name = name.trim();
    results
        .iter()
        .map(|r| &r.model)
        .find(|m| m.id == name)
        .or_else(|| {
            results
                .iter()
                .map(|r| &r.model)
                .find(|m| m.display_name.eq_ignore_ascii_case(name))
        })
}

/// Placeholder ranking in the given model order, every model at
/// [`FALLBACK_SCORE`]. Never produced by [`ModelRanker`] on its own.
pub fn fallback_ranking(models: &[ModelDescriptor]) -> Vec<ModelRanking> {
    models
        .iter()
        .enumerate()
        .map(|(i, model)| ModelRanking {
            rank: i as u32 + 1,
            model: model.id.clone(),
            score: FALLBACK_SCORE,
            justification: FALLBACK_JUSTIFICATION.to_string(),
        })
        .collect()
}

/// Copy each model's ranking score onto its results.
pub fn apply_scores(results: &mut [InvocationResult], rankings: &[ModelRanking]) {
    for result in results {
        result.score = rankings
            .iter()
            .find(|r| r.model == result.model.id)
            .map(|r| r.score);
    }
}
