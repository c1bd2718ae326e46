use std::collections::BTreeMap;
use std::process::Command;

use model_advisor::aggregate::aggregate;
use model_advisor::catalog::{default_catalog, select};
use model_advisor::crafting::TestPrompt;
use model_advisor::evaluation::EvaluationRecord;
use model_advisor::invoker::{InvocationResult, Metrics};
use model_advisor::pipeline::ComparisonReport;
use model_advisor::ranking::ModelRanking;
use model_advisor::recommend::recommend;
use model_advisor::workflow::WorkflowState;
use tempfile::tempdir;

fn advisor() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_advisor"));
    // Keep the host environment from leaking credentials into the run.
    cmd.env_remove("OPENROUTER_API_KEY")
        .env_remove("AI21_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn models_lists_catalog_as_json() {
    let output = advisor().args(["models", "--json"]).output().unwrap();
    assert!(output.status.success());

    let listed: Vec<model_advisor::ModelDescriptor> =
        serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(listed, default_catalog());
}

#[test]
fn report_renders_saved_json() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("report.json");
    let out = dir.path().join("report.md");

    let models = select(&default_catalog(), &["claude-3-opus", "gpt-4-turbo"]).unwrap();
    let results = vec![
        InvocationResult::new(
            models[0].clone(),
            1,
            "Write a haiku about rust",
            "Iron slowly blooms",
            Metrics {
                tokens_used: 30,
                response_time_seconds: 2.5,
                cost_units: 0.003,
            },
        ),
        InvocationResult::failure(models[1].clone(), 1, "Write a haiku about rust", "overloaded"),
    ];
    let aggregated = aggregate(&results);
    let report = ComparisonReport {
        id: uuid::Uuid::new_v4(),
        created_at: "2026-10-19T00:00:00Z".to_string(),
        request_hash: "deadbeef".to_string(),
        use_case: Some("poetry".to_string()),
        prompts: vec![TestPrompt::new(1, "Write a haiku about rust")],
        recommendations: recommend(&aggregated),
        models,
        results,
        aggregated,
        evaluations: vec![EvaluationRecord::complete(1, "Opus wins on imagery.")],
        fallback_evaluations: BTreeMap::new(),
        rankings: vec![ModelRanking {
            rank: 1,
            model: "claude-3-opus".to_string(),
            score: 8.5,
            justification: "Only model that answered.".to_string(),
        }],
        ranking_fallback: false,
        state: WorkflowState::Complete,
        elapsed_ms: 2_600,
    };
    std::fs::write(&input, serde_json::to_string(&report).unwrap()).unwrap();

    let status = advisor()
        .args(["report", "--input"])
        .arg(&input)
        .arg("--out")
        .arg(&out)
        .status()
        .unwrap();
    assert!(status.success());

    let md = std::fs::read_to_string(&out).unwrap();
    assert!(md.contains("# Model Comparison Report"));
    assert!(md.contains("**Best overall:** Claude 3 Opus"));
    assert!(md.contains("Error: overloaded"));
    assert!(md.contains("Opus wins on imagery."));
    assert!(md.contains("| 1 | Claude 3 Opus | 8.5 | Only model that answered. |"));
}

#[test]
fn compare_rejects_unknown_model() {
    let dir = tempdir().unwrap();
    let prompts = dir.path().join("prompts.txt");
    std::fs::write(&prompts, "one\n\ntwo\n").unwrap();

    let output = advisor()
        .args(["compare", "--models", "gpt-9", "--prompts-file"])
        .arg(&prompts)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown model id"));
}

#[test]
fn prompts_without_credential_fails() {
    let output = advisor()
        .args(["prompts", "--use-case", "math tutoring"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}
