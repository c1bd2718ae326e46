//! Recommender: category winners from aggregated performance.

use serde::{Deserialize, Serialize};

use crate::aggregate::AggregatedPerformance;

/// Keeps the inverse scores finite when an average is zero.
pub const EPSILON: f64 = 1e-3;

const SPEED_WEIGHT: f64 = 0.4;
const COST_WEIGHT: f64 = 0.4;
const TOKEN_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    pub speed: f64,
    pub cost: f64,
    pub tokens: f64,
    pub overall: f64,
}

impl Scores {
    pub fn of(record: &AggregatedPerformance) -> Self {
        let speed = 1.0 / (record.avg_response_time + EPSILON);
        let cost = 1.0 / (record.avg_cost + EPSILON);
        let tokens = 1.0 / (record.avg_tokens + EPSILON);
        Self {
            speed,
            cost,
            tokens,
            overall: SPEED_WEIGHT * speed + COST_WEIGHT * cost + TOKEN_WEIGHT * tokens,
        }
    }
}

/// Category winners. `None` means no model had a successful invocation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    pub best_overall: Option<AggregatedPerformance>,
    pub fastest: Option<AggregatedPerformance>,
    pub cheapest: Option<AggregatedPerformance>,
}

impl Recommendations {
    pub fn has_data(&self) -> bool {
        self.best_overall.is_some()
    }
}

/// Pick category winners. Records with no successful invocations are not
/// ranked. Ties go to the record that appears first in `aggregated`, so pass
/// it in catalog order.
pub fn recommend(aggregated: &[AggregatedPerformance]) -> Recommendations {
    let ranked: Vec<(&AggregatedPerformance, Scores)> = aggregated
        .iter()
        .filter(|a| a.successful_prompt_count > 0)
        .map(|a| (a, Scores::of(a)))
        .collect();

    let winner = |score: fn(&Scores) -> f64| -> Option<AggregatedPerformance> {
        let mut best: Option<(&AggregatedPerformance, f64)> = None;
        for (record, scores) in &ranked {
            let value = score(scores);
            match best {
                Some((_, top)) if value <= top => {}
                _ => best = Some((*record, value)),
            }
        }
        best.map(|(record, _)| record.clone())
    };

    Recommendations {
        best_overall: winner(|s| s.overall),
        fastest: winner(|s| s.speed),
        cheapest: winner(|s| s.cost),
    }
}
