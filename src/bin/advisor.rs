#![forbid(unsafe_code)]

use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use model_advisor::catalog::{self, default_catalog};
use model_advisor::crafting::{is_soft_failure, join_prompts, split_prompts};
use model_advisor::pipeline::{Advisor, ComparisonReport, ComparisonRequest, EvaluationMode};
use model_advisor::report::render_report_markdown;
use model_advisor::telemetry::init_tracing;
use model_advisor::AdvisorConfig;

#[derive(Parser)]
#[command(
    name = "advisor",
    version,
    about = "Compare language models on prompts crafted for your use case"
)]
struct Cli {
    /// Default log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the model catalog
    Models {
        #[arg(long)]
        json: bool,
    },
    /// Generate test prompts for a use case
    Prompts {
        #[arg(long)]
        use_case: String,
        #[arg(long, default_value_t = 3)]
        count: usize,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run a full comparison
    Compare {
        /// Use case to craft prompts from
        #[arg(long, required_unless_present = "prompts_file")]
        use_case: Option<String>,
        /// Prompts separated by blank lines; skips crafting
        #[arg(long)]
        prompts_file: Option<PathBuf>,
        /// Comma-separated catalog ids (default: whole catalog)
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,
        #[arg(long, default_value_t = 3)]
        count: usize,
        /// Write the JSON report here (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also write a markdown rendering
        #[arg(long)]
        markdown: Option<PathBuf>,
        /// JSONL trace of every invocation
        #[arg(long)]
        trace: Option<PathBuf>,
        #[arg(long)]
        no_evaluation: bool,
        /// Attach a local placeholder to failed evaluations and rankings
        #[arg(long, conflicts_with = "no_evaluation")]
        fallback_evaluation: bool,
        /// Skip the cross-prompt model ranking
        #[arg(long)]
        no_ranking: bool,
        /// Continue with a local placeholder prompt if crafting fails
        #[arg(long)]
        fallback_prompt: bool,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Render a saved JSON report as markdown
    Report {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_json, cli.log_level);

    match cli.command {
        Commands::Models { json } => {
            let models = default_catalog();
            if json {
                println!("{}", serde_json::to_string_pretty(&models)?);
            } else {
                for model in models {
                    println!(
                        "{:<16} {:<16} {:<12} {}",
                        model.id, model.display_name, model.provider, model.inference_id
                    );
                }
            }
        }
        Commands::Prompts {
            use_case,
            count,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let advisor = Advisor::from_config(&config)?;
            let prompts = advisor.generate_prompts(&use_case, count).await;
            if is_soft_failure(&prompts) {
                return Err("prompt generation failed; see log for details".into());
            }
            println!("{}", join_prompts(&prompts));
        }
        Commands::Compare {
            use_case,
            prompts_file,
            models,
            count,
            out,
            markdown,
            trace,
            no_evaluation,
            fallback_evaluation,
            no_ranking,
            fallback_prompt,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let advisor = Advisor::from_config(&config)?;

            let selected = if models.is_empty() {
                advisor.catalog().to_vec()
            } else {
                catalog::select(advisor.catalog(), &models)?
            };

            let req = match prompts_file {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)?;
                    let mut req = ComparisonRequest::from_prompts(split_prompts(&text), selected);
                    req.use_case = use_case;
                    req
                }
                None => {
                    let use_case = use_case.ok_or("--use-case or --prompts-file is required")?;
                    ComparisonRequest::from_use_case(use_case, selected).desired_count(count)
                }
            };
            let mode = if no_evaluation {
                EvaluationMode::Skip
            } else if fallback_evaluation {
                EvaluationMode::ServiceWithFallback
            } else {
                EvaluationMode::Service
            };
            let req = req
                .evaluation(mode)
                .prompt_fallback(fallback_prompt)
                .ranking(!no_ranking);

            let report = advisor.compare_with_trace_file(req, trace).await?;

            match &out {
                Some(path) => {
                    write_json(path, &report)?;
                    eprintln!("[compare] report written to {}", path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&report)?),
            }
            if let Some(path) = markdown {
                std::fs::write(&path, render_report_markdown(&report))?;
                eprintln!("[compare] markdown written to {}", path.display());
            }
        }
        Commands::Report { input, out } => {
            let raw = std::fs::read_to_string(&input)?;
            let report: ComparisonReport = serde_json::from_str(&raw)?;
            let md = render_report_markdown(&report);
            match out {
                Some(path) => std::fs::write(path, md)?,
                None => print!("{md}"),
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AdvisorConfig, model_advisor::AdvisorError> {
    let config = match path {
        Some(path) => AdvisorConfig::load(path)?,
        None => AdvisorConfig::default(),
    };
    Ok(config.with_env_overrides())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    std::fs::write(path, json)
}
