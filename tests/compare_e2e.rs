use std::time::Duration;

use model_advisor::catalog::{default_catalog, select};
use model_advisor::config::{AdvisorConfig, CostSource};
use model_advisor::crafting::TestPrompt;
use model_advisor::evaluation::EvaluationStatus;
use model_advisor::pipeline::{Advisor, ComparisonRequest, EvaluationMode};
use model_advisor::workflow::WorkflowState;
use model_advisor::{render_report_markdown, AdvisorError};
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Crafting runs return two prompts, the ranking run returns a JSON string
/// and evaluation runs fail for the second prompt.
struct RunsResponder;

impl Respond for RunsResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body = String::from_utf8_lossy(&request.body);
        if body.contains("json_list") {
            ResponseTemplate::new(200).set_body_json(json!({
                "id": "craft-1",
                "status": "completed",
                "result": ["What is 2 + 2?", "Summarize the plot of Hamlet."]
            }))
        } else if body.contains("ranking_json") {
            let ranking = json!([
                { "rank": 1, "model": "gpt-3.5-turbo", "score": 7, "justification": "Answered both." },
                { "rank": 2, "model": "mistral-7b", "score": 1, "justification": "No responses." }
            ]);
            ResponseTemplate::new(200).set_body_json(json!({
                "id": "rank-1",
                "status": "completed",
                "result": ranking.to_string()
            }))
        } else if body.contains("Hamlet") {
            ResponseTemplate::new(200).set_body_json(json!({
                "id": "eval-2",
                "status": "failed",
                "error": "evaluation model unavailable"
            }))
        } else {
            ResponseTemplate::new(200).set_body_json(json!({
                "id": "eval-1",
                "status": "completed",
                "result": "## Recommendation\nGPT-3.5 Turbo answered correctly."
            }))
        }
    }
}

async fn mount_inference(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": "openai/gpt-3.5-turbo" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "4" }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 90, "total_tokens": 100, "cost": 0.01 },
            "response_ms": 1000.0
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": "mistralai/mistral-7b-instruct" })))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": { "message": "No endpoints found" }
        })))
        .mount(server)
        .await;
}

fn config(inference: &MockServer, runs: Option<&MockServer>) -> AdvisorConfig {
    let mut config = AdvisorConfig::default();
    config.inference.api_key = Some("sk-or".into());
    config.inference.base_url = inference.uri();
    config.inference.timeout_secs = 5;
    if let Some(runs) = runs {
        config.runs.api_key = Some("ai21".into());
        config.runs.base_url = runs.uri();
    }
    config.runs.poll_interval_ms = 10;
    config.runs.max_wait_secs = 5;
    config
}

fn models() -> Vec<model_advisor::ModelDescriptor> {
    select(&default_catalog(), &["gpt-3.5-turbo", "mistral-7b"]).unwrap()
}

#[tokio::test]
async fn end_to_end_comparison_with_partial_failures() {
    let inference = MockServer::start().await;
    let runs = MockServer::start().await;
    mount_inference(&inference).await;
    Mock::given(method("POST"))
        .and(path("/runs"))
        .respond_with(RunsResponder)
        .mount(&runs)
        .await;

    let advisor = Advisor::from_config(&config(&inference, Some(&runs))).unwrap();
    let dir = tempdir().unwrap();
    let trace_path = dir.path().join("trace.jsonl");

    let req = ComparisonRequest::from_use_case("math and literature tutoring", models())
        .desired_count(2)
        .evaluation(EvaluationMode::ServiceWithFallback);
    let report = advisor
        .compare_with_trace_file(req, Some(trace_path.clone()))
        .await
        .unwrap();

    assert_eq!(report.state, WorkflowState::Complete);
    assert_eq!(report.prompts.len(), 2);
    assert_eq!(report.results.len(), 4);

    let failed: Vec<_> = report.results.iter().filter(|r| r.is_error).collect();
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().all(|r| r.model.id == "mistral-7b"));
    assert!(failed.iter().all(|r| r.output == "Error: No endpoints found"));

    let gpt = report
        .aggregated
        .iter()
        .find(|a| a.model.id == "gpt-3.5-turbo")
        .unwrap();
    assert_eq!(gpt.successful_prompt_count, 2);
    assert_eq!(gpt.avg_response_time, 1.0);
    assert_eq!(gpt.total_tokens, 200);
    assert!((gpt.total_cost - 0.02).abs() < 1e-12);

    let mistral = report
        .aggregated
        .iter()
        .find(|a| a.model.id == "mistral-7b")
        .unwrap();
    assert_eq!(mistral.successful_prompt_count, 0);
    assert_eq!(mistral.avg_cost, 0.0);

    let best = report.recommendations.best_overall.as_ref().unwrap();
    assert_eq!(best.model.id, "gpt-3.5-turbo");

    assert_eq!(
        report.evaluation_for(1).map(|e| e.status),
        Some(EvaluationStatus::Complete)
    );
    assert_eq!(
        report.evaluation_for(2).map(|e| e.status),
        Some(EvaluationStatus::Failed)
    );
    assert!(report.evaluation_for(2).unwrap().content.is_none());
    assert!(report.fallback_evaluations.contains_key(&2));
    assert!(!report.fallback_evaluations.contains_key(&1));

    assert!(!report.ranking_fallback);
    assert_eq!(report.rankings.len(), 2);
    assert_eq!(report.rankings[0].model, "gpt-3.5-turbo");
    assert!(report
        .results
        .iter()
        .all(|r| r.score == Some(if r.is_error { 1.0 } else { 7.0 })));

    let trace = std::fs::read_to_string(&trace_path).unwrap();
    assert_eq!(trace.lines().count(), 4);

    let md = render_report_markdown(&report);
    assert!(md.contains("GPT-3.5 Turbo answered correctly."));
    assert!(md.contains("_Evaluation failed._"));
    assert!(md.contains("| 1 | GPT-3.5 Turbo | 7.0 | Answered both. |"));
}

#[tokio::test]
async fn missing_run_service_credential_blocks_crafting() {
    let inference = MockServer::start().await;
    mount_inference(&inference).await;

    let advisor = Advisor::from_config(&config(&inference, None)).unwrap();
    let req = ComparisonRequest::from_use_case("anything", models());

    let err = advisor.compare(req, None).await.unwrap_err();
    assert!(matches!(err, AdvisorError::Workflow(_)));
}

#[tokio::test]
async fn missing_run_service_credential_fails_evaluations_softly() {
    let inference = MockServer::start().await;
    mount_inference(&inference).await;

    let advisor = Advisor::from_config(&config(&inference, None)).unwrap();
    let req = ComparisonRequest::from_prompts(
        vec![TestPrompt::new(1, "What is 2 + 2?")],
        models(),
    );

    let report = advisor.compare(req, None).await.unwrap();
    assert_eq!(report.state, WorkflowState::Complete);
    assert_eq!(report.evaluations.len(), 1);
    assert_eq!(report.evaluations[0].status, EvaluationStatus::Failed);
    assert!(report.fallback_evaluations.is_empty());
}

#[tokio::test]
async fn flat_rate_cost_source_overrides_provider_cost() {
    let inference = MockServer::start().await;
    mount_inference(&inference).await;

    let mut config = config(&inference, None);
    config.inference.cost_source = CostSource::FlatRate {
        usd_per_token: 0.000_02,
    };
    let advisor = Advisor::from_config(&config).unwrap();
    let req = ComparisonRequest::from_prompts(vec![TestPrompt::new(1, "hi")], models())
        .evaluation(EvaluationMode::Skip);

    let report = advisor.compare(req, None).await.unwrap();
    let ok = report.results.iter().find(|r| !r.is_error).unwrap();
    assert!((ok.metrics.cost_units - 0.002).abs() < 1e-12);
    assert_eq!(
        Duration::from_secs_f64(ok.metrics.response_time_seconds),
        Duration::from_secs(1)
    );
}
