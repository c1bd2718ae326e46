//! Instruction templates for the run service.
//!
//! Three jobs go through the run service: crafting test prompts from a
//! use-case description, comparing model outputs for one prompt group, and
//! ranking the models across all prompts. Each is rendered here into a
//! [`RunRequest`] with structured requirements.

use crate::gateway::{Requirement, RunRequest};

/// Escape XML special characters to prevent prompt injection via tag breaking.
fn escape_xml_chars(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// =============================================================================
// Prompt crafting
// =============================================================================

const CRAFTING_SYSTEM: &str = "You are an AI test prompt designer. Given a description of what someone wants to use AI for, you write specific, clear test prompts that compare how well different language models handle that use case. You answer only with a JSON array of strings.";

const CRAFTING_USER: &str = r#"Write {count} distinct test prompts for the use case below. Each prompt must be self-contained and exercise a different capability the use case depends on.

<use_case>
{use_case}
</use_case>

Respond with a JSON array of exactly {count} strings and nothing else.
Example:
["Explain the difference between TCP and UDP to a new engineer.", "Write a function that deduplicates a list while preserving order."]"#;

/// Render the prompt-crafting run.
pub fn crafting_request(use_case: &str, count: usize) -> RunRequest {
    let count_text = count.to_string();
    let input = CRAFTING_USER
        .replace("{count}", &count_text)
        .replace("{use_case}", &escape_xml_chars(use_case.trim()));

    RunRequest::new(input)
        .system(CRAFTING_SYSTEM)
        .requirement(Requirement::mandatory(
            "prompt_count",
            format!("Return exactly {count} distinct prompts."),
        ))
        .requirement(Requirement::mandatory(
            "json_list",
            "Return the prompts as a JSON array of strings with no surrounding text.",
        ))
        .requirement(Requirement::optional(
            "relevance",
            "Every prompt tests a capability relevant to the described use case.",
        ))
}

// =============================================================================
// Evaluation
// =============================================================================

const EVALUATION_SYSTEM: &str = "You are an expert at evaluating AI model outputs. You are given a prompt and the responses several models produced for it. Analyze each response for accuracy, clarity, creativity and usefulness. Responses that begin with \"Error:\" are failed invocations; say so in your analysis instead of skipping them.";

/// One member of a prompt group as seen by the evaluator.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationEntry<'a> {
    pub model_name: &'a str,
    pub output: &'a str,
}

/// Render the evaluation run for one prompt group.
pub fn evaluation_request(prompt_text: &str, entries: &[EvaluationEntry<'_>]) -> RunRequest {
    let mut parts = vec![format!(
        "<prompt>\n{}\n</prompt>",
        escape_xml_chars(prompt_text.trim())
    )];
    for entry in entries {
        parts.push(format!(
            "<response model=\"{}\">\n{}\n</response>",
            escape_xml_chars(entry.model_name),
            escape_xml_chars(entry.output.trim())
        ));
    }
    parts.push("Provide your evaluation in markdown.".to_string());

    RunRequest::new(parts.join("\n\n"))
        .system(EVALUATION_SYSTEM)
        .requirement(Requirement::mandatory(
            "per_model_summary",
            "A section per model with its strengths and weaknesses.",
        ))
        .requirement(Requirement::mandatory(
            "comparative_analysis",
            "A section comparing the responses against each other.",
        ))
        .requirement(Requirement::mandatory(
            "recommendation",
            "A section naming the model that performed best and why.",
        ))
        .requirement(Requirement::mandatory(
            "markdown",
            "Format the whole answer as markdown.",
        ))
}

// =============================================================================
// Ranking
// =============================================================================

const RANKING_SYSTEM: &str = "You are an expert at evaluating language model responses. You rank models by the accuracy, completeness, clarity and relevance of their answers across a whole set of questions. Responses that begin with \"Error:\" are failed invocations and count against the model.";

const RANKING_INSTRUCTIONS: &str = r#"Rank the models above from best to worst over all questions.
Respond with a JSON array of objects with the fields "rank", "model", "score" and "justification".
"model" is the name exactly as it appears in the response tags. "score" is a number from 1 to 10."#;

/// One question and every model's answer to it.
#[derive(Debug, Clone)]
pub struct RankingQuestion<'a> {
    pub prompt_text: &'a str,
    pub entries: Vec<EvaluationEntry<'a>>,
}

/// Render the single cross-prompt ranking run.
pub fn ranking_request(questions: &[RankingQuestion<'_>]) -> RunRequest {
    let mut parts = Vec::with_capacity(questions.len() + 1);
    for (i, question) in questions.iter().enumerate() {
        let mut block = format!(
            "<question index=\"{}\">\n{}\n</question>",
            i + 1,
            escape_xml_chars(question.prompt_text.trim())
        );
        for entry in &question.entries {
            block.push_str(&format!(
                "\n<response model=\"{}\">\n{}\n</response>",
                escape_xml_chars(entry.model_name),
                escape_xml_chars(entry.output.trim())
            ));
        }
        parts.push(block);
    }
    parts.push(RANKING_INSTRUCTIONS.to_string());

    RunRequest::new(parts.join("\n\n"))
        .system(RANKING_SYSTEM)
        .requirement(Requirement::mandatory(
            "ranking_json",
            "Return a JSON array of {rank, model, score, justification} objects, one per model.",
        ))
        .requirement(Requirement::mandatory(
            "score_scale",
            "Every score is a number from 1 to 10.",
        ))
        .requirement(Requirement::optional(
            "justification",
            "Each justification is one or two sentences.",
        ))
}

// =============================================================================
// TESTS
// =============================================================================
