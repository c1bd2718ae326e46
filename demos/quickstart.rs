//! Minimal end-to-end example for `model-advisor`.
//!
//! Runs two hand-written prompts against two catalog models and prints the
//! markdown report.
//!
//! To run:
//! - Set `OPENROUTER_API_KEY` (and `AI21_API_KEY` for qualitative evaluations)
//! - `cargo run --example quickstart`

use model_advisor::catalog::select;
use model_advisor::{
    default_catalog, render_report_markdown, Advisor, AdvisorConfig, ComparisonRequest,
    EvaluationMode, TestPrompt,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    model_advisor::telemetry::init_tracing(false, tracing::Level::INFO);

    let config = AdvisorConfig::default().with_env_overrides();
    let advisor = Advisor::from_config(&config)?;

    let models = select(&default_catalog(), &["gpt-3.5-turbo", "mistral-7b"])?;
    let prompts = vec![
        TestPrompt::new(1, "Explain recursion to a ten year old."),
        TestPrompt::new(2, "Write a SQL query that finds duplicate emails in a users table."),
    ];

    let req = ComparisonRequest::from_prompts(prompts, models)
        .evaluation(EvaluationMode::ServiceWithFallback);
    let report = advisor.compare(req, None).await?;

    println!("{}", render_report_markdown(&report));
    Ok(())
}
