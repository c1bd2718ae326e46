//! Markdown rendering for comparison reports.

use crate::aggregate::AggregatedPerformance;
use crate::evaluation::EvaluationStatus;
use crate::pipeline::ComparisonReport;

fn winner_line(label: &str, winner: &Option<AggregatedPerformance>, detail: String) -> String {
    match winner {
        Some(w) => format!("- **{label}:** {} ({detail})\n", w.model.display_name),
        None => format!("- **{label}:** no data\n"),
    }
}

pub fn render_report_markdown(report: &ComparisonReport) -> String {
    let mut out = String::new();
    out.push_str("# Model Comparison Report\n\n");
    out.push_str(&format!("- Report id: `{}`\n", report.id));
    out.push_str(&format!("- Created: {}\n", report.created_at));
    out.push_str(&format!("- Request hash: `{}`\n", report.request_hash));
    if let Some(use_case) = &report.use_case {
        out.push_str(&format!("- Use case: {}\n", use_case.trim()));
    }
    let failures = report.results.iter().filter(|r| r.is_error).count();
    out.push_str(&format!(
        "- Models/prompts/invocations/failures: {}/{}/{}/{}\n",
        report.models.len(),
        report.prompts.len(),
        report.results.len(),
        failures
    ));
    out.push_str(&format!("- Final state: {}\n", report.state));
    out.push_str(&format!("- Elapsed: {} ms\n", report.elapsed_ms));

    out.push_str("\n## Performance\n\n");
    out.push_str("| Model | Provider | Successes | Avg time (s) | Avg cost | Avg tokens | Total cost |\n");
    out.push_str("|---|---|---:|---:|---:|---:|---:|\n");
    for agg in &report.aggregated {
        out.push_str(&format!(
            "| {} | {} | {}/{} | {:.2} | {:.6} | {:.1} | {:.6} |\n",
            agg.model.display_name,
            agg.model.provider,
            agg.successful_prompt_count,
            report.prompts.len(),
            agg.avg_response_time,
            agg.avg_cost,
            agg.avg_tokens,
            agg.total_cost
        ));
    }

    out.push_str("\n## Recommendations\n\n");
    let recs = &report.recommendations;
    if recs.has_data() {
        out.push_str(&winner_line(
            "Best overall",
            &recs.best_overall,
            "weighted speed, cost and token efficiency".to_string(),
        ));
        out.push_str(&winner_line(
            "Fastest",
            &recs.fastest,
            recs.fastest
                .as_ref()
                .map(|w| format!("{:.2}s average", w.avg_response_time))
                .unwrap_or_default(),
        ));
        out.push_str(&winner_line(
            "Cheapest",
            &recs.cheapest,
            recs.cheapest
                .as_ref()
                .map(|w| format!("{:.6} average cost", w.avg_cost))
                .unwrap_or_default(),
        ));
    } else {
        out.push_str("No data: no model produced a successful response.\n");
    }

    if !report.rankings.is_empty() {
        out.push_str("\n## Rankings\n\n");
        if report.ranking_fallback {
            out.push_str("_Auto-generated placeholder: the ranking service was unavailable._\n\n");
        }
        out.push_str("| Rank | Model | Score | Justification |\n");
        out.push_str("|---:|---|---:|---|\n");
        for ranking in &report.rankings {
            let name = report
                .models
                .iter()
                .find(|m| m.id == ranking.model)
                .map_or(ranking.model.as_str(), |m| m.display_name.as_str());
            out.push_str(&format!(
                "| {} | {} | {:.1} | {} |\n",
                ranking.rank,
                name,
                ranking.score,
                ranking.justification.replace('|', "\\|").replace('\n', " ")
            ));
        }
    }

    out.push_str("\n## Prompts\n");
    for prompt in &report.prompts {
        out.push_str(&format!("\n### Prompt {}\n\n", prompt.index));
        out.push_str(&format!("> {}\n", prompt.text.replace('\n', "\n> ")));

        for result in report.results_for_prompt(prompt.index) {
            let status = if result.is_error { "failed" } else { "ok" };
            out.push_str(&format!(
                "\n#### {} ({status}, {:.2}s, {} tokens)\n\n{}\n",
                result.model.display_name,
                result.metrics.response_time_seconds,
                result.metrics.tokens_used,
                result.output.trim()
            ));
        }

        if let Some(record) = report.evaluation_for(prompt.index) {
            out.push_str(&format!("\n#### Evaluation for prompt {}\n\n", prompt.index));
            match (record.status, &record.content) {
                (EvaluationStatus::Complete, Some(content)) => {
                    out.push_str(content.trim());
                    out.push('\n');
                }
                (EvaluationStatus::Pending, _) => out.push_str("_Evaluation pending._\n"),
                _ => {
                    out.push_str("_Evaluation failed._\n");
                    if let Some(fallback) = report.fallback_evaluations.get(&prompt.index) {
                        out.push('\n');
                        out.push_str(fallback.trim());
                        out.push('\n');
                    }
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    use crate::aggregate::aggregate;
    use crate::catalog::ModelDescriptor;
    use crate::crafting::TestPrompt;
    use crate::evaluation::EvaluationRecord;
    use crate::invoker::{InvocationResult, Metrics};
    use crate::ranking::ModelRanking;
    use crate::recommend::recommend;
    use crate::workflow::WorkflowState;

    fn report(results: Vec<InvocationResult>, evaluations: Vec<EvaluationRecord>) -> ComparisonReport {
        let models = vec![
            ModelDescriptor::new("m1", "Model One", "P", "p/m1"),
            ModelDescriptor::new("m2", "Model Two", "P", "p/m2"),
        ];
        let aggregated = aggregate(&results);
        let recommendations = recommend(&aggregated);
        ComparisonReport {
            id: Uuid::nil(),
            created_at: "2026-01-01T00:00:00Z".into(),
            request_hash: "abc".into(),
            use_case: Some("tutoring".into()),
            prompts: vec![TestPrompt::new(1, "Explain gravity")],
            models,
            results,
            aggregated,
            recommendations,
            evaluations,
            fallback_evaluations: BTreeMap::new(),
            rankings: Vec::new(),
            ranking_fallback: false,
            state: WorkflowState::Complete,
            elapsed_ms: 12,
        }
    }

    fn ok(id: &str, name: &str) -> InvocationResult {
        InvocationResult::new(
            ModelDescriptor::new(id, name, "P", format!("p/{id}")),
            1,
            "Explain gravity",
            "Things fall.",
            Metrics {
                tokens_used: 50,
                response_time_seconds: 1.5,
                cost_units: 0.002,
            },
        )
    }

    #[test]
    fn renders_winners_outputs_and_evaluation() {
        let md = render_report_markdown(&report(
            vec![ok("m1", "Model One"), ok("m2", "Model Two")],
            vec![EvaluationRecord::complete(1, "## Verdict\nTie.")],
        ));
        assert!(md.contains("# Model Comparison Report"));
        assert!(md.contains("| Model One | P | 1/1 |"));
        assert!(md.contains("**Fastest:** Model One"));
        assert!(md.contains("#### Model Two (ok, 1.50s, 50 tokens)"));
        assert!(md.contains("## Verdict\nTie."));
        assert!(md.contains("Final state: complete"));
    }

    #[test]
    fn renders_no_data_when_everything_failed() {
        let failed = InvocationResult::failure(
            ModelDescriptor::new("m1", "Model One", "P", "p/m1"),
            1,
            "Explain gravity",
            "rate limited",
        );
        let md = render_report_markdown(&report(vec![failed], vec![]));
        assert!(md.contains("No data: no model produced a successful response."));
        assert!(md.contains("Error: rate limited"));
        assert!(!md.contains("**Fastest:**"));
    }

    #[test]
    fn failed_evaluation_shows_fallback_when_present() {
        let mut r = report(vec![ok("m1", "Model One")], vec![EvaluationRecord::failed(1)]);
        r.fallback_evaluations
            .insert(1, "# Model Evaluation\n_Auto-generated placeholder_".into());
        let md = render_report_markdown(&r);
        assert!(md.contains("_Evaluation failed._"));
        assert!(md.contains("Auto-generated placeholder"));
    }

    #[test]
    fn renders_rankings_with_display_names() {
        let mut r = report(vec![ok("m1", "Model One"), ok("m2", "Model Two")], vec![]);
        r.rankings = vec![
            ModelRanking {
                rank: 1,
                model: "m2".into(),
                score: 8.0,
                justification: "Clear | concise".into(),
            },
            ModelRanking {
                rank: 2,
                model: "m1".into(),
                score: 6.5,
                justification: "Fine.".into(),
            },
        ];
        let md = render_report_markdown(&r);
        assert!(md.contains("## Rankings"));
        assert!(md.contains("| 1 | Model Two | 8.0 | Clear \\| concise |"));
        assert!(md.contains("| 2 | Model One | 6.5 | Fine. |"));
        assert!(!md.contains("ranking service was unavailable"));

        r.ranking_fallback = true;
        assert!(render_report_markdown(&r).contains("ranking service was unavailable"));
    }

    #[test]
    fn rankings_section_omitted_when_empty() {
        let md = render_report_markdown(&report(vec![ok("m1", "Model One")], vec![]));
        assert!(!md.contains("## Rankings"));
    }
}
