//! Aggregator: per-model statistics over successful invocations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::ModelDescriptor;
use crate::invoker::InvocationResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedPerformance {
    pub model: ModelDescriptor,
    pub successful_prompt_count: u32,
    pub total_response_time: f64,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub avg_response_time: f64,
    pub avg_cost: f64,
    pub avg_tokens: f64,
}

#[derive(Default)]
struct Totals {
    successes: u32,
    response_time: f64,
    cost: f64,
    tokens: u64,
}

/// Reduce a result set to one record per model.
///
/// Error results count toward neither totals nor denominators; a model whose
/// invocations all failed gets zero averages. Always recompute from the full
/// result set. The output is sorted by model id, so it does not depend on the
/// order of `results`.
pub fn aggregate(results: &[InvocationResult]) -> Vec<AggregatedPerformance> {
    let mut by_model: BTreeMap<&str, (&ModelDescriptor, Vec<&InvocationResult>)> =
        BTreeMap::new();
    for result in results {
        by_model
            .entry(result.model.id.as_str())
            .or_insert_with(|| (&result.model, Vec::new()))
            .1
            .push(result);
    }

    by_model
        .into_values()
        .map(|(model, members)| {
            // Sum in a fixed order so float totals are reproducible.
            let mut successes: Vec<&InvocationResult> =
                members.into_iter().filter(|r| !r.is_error).collect();
            successes.sort_by_key(|r| r.prompt_index);

            let totals = successes.iter().fold(Totals::default(), |mut acc, r| {
                acc.successes += 1;
                acc.response_time += r.metrics.response_time_seconds;
                acc.cost += r.metrics.cost_units;
                acc.tokens += u64::from(r.metrics.tokens_used);
                acc
            });

            let n = f64::from(totals.successes);
            let avg = |total: f64| if totals.successes > 0 { total / n } else { 0.0 };

            AggregatedPerformance {
                model: model.clone(),
                successful_prompt_count: totals.successes,
                total_response_time: totals.response_time,
                total_cost: totals.cost,
                total_tokens: totals.tokens,
                avg_response_time: avg(totals.response_time),
                avg_cost: avg(totals.cost),
                avg_tokens: avg(totals.tokens as f64),
            }
        })
        .collect()
}

/// Reorder aggregates to follow `catalog`; models not in the catalog keep
/// their relative order at the end.
pub fn order_by_catalog(
    mut aggregated: Vec<AggregatedPerformance>,
    catalog: &[ModelDescriptor],
) -> Vec<AggregatedPerformance> {
    aggregated.sort_by_key(|a| {
        catalog
            .iter()
            .position(|m| m.id == a.model.id)
            .unwrap_or(usize::MAX)
    });
    aggregated
}
