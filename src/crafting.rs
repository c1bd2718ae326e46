//! Prompt Crafting Client: turns a use-case description into test prompts.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::gateway::{ProviderError, RunOutput, RunService};
use crate::prompts::crafting_request;

const SERVICE: &str = "prompt-crafting";

/// Reserved text returned as the only prompt when crafting fails.
pub const PROMPT_GENERATION_FAILED: &str =
    "Prompt generation failed. Check the prompt service configuration and try again.";

/// Separator between prompts in their joined, user-editable form.
pub const PROMPT_SEPARATOR: &str = "\n\n";

/// One test prompt. `index` starts at 1 and identifies the prompt group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPrompt {
    pub index: u32,
    pub text: String,
}

impl TestPrompt {
    pub fn new(index: u32, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

/// True when `prompts` is the single-element soft-failure placeholder.
pub fn is_soft_failure(prompts: &[TestPrompt]) -> bool {
    matches!(prompts, [only] if only.text == PROMPT_GENERATION_FAILED)
}

pub struct PromptCraftingClient {
    runs: Arc<dyn RunService>,
}

impl PromptCraftingClient {
    pub fn new(runs: Arc<dyn RunService>) -> Self {
        Self { runs }
    }

    /// Generate up to `desired_count` prompts, failing soft.
    ///
    /// On any failure the result is a single prompt whose text is
    /// [`PROMPT_GENERATION_FAILED`]; check with [`is_soft_failure`].
    pub async fn generate_prompts(&self, use_case: &str, desired_count: usize) -> Vec<TestPrompt> {
        match self.try_generate_prompts(use_case, desired_count).await {
            Ok(prompts) => prompts,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    code = e.code(),
                    "prompt generation failed, returning placeholder"
                );
                vec![TestPrompt::new(1, PROMPT_GENERATION_FAILED)]
            }
        }
    }

    /// Generate prompts, surfacing the failure instead of the placeholder.
    pub async fn try_generate_prompts(
        &self,
        use_case: &str,
        desired_count: usize,
    ) -> Result<Vec<TestPrompt>, ProviderError> {
        if use_case.trim().is_empty() {
            return Err(ProviderError::invalid_request("use case must not be empty"));
        }
        if desired_count == 0 {
            return Err(ProviderError::invalid_request(
                "desired prompt count must be at least 1",
            ));
        }

        let output = self.runs.run(&crafting_request(use_case, desired_count)).await?;
        let items = match output {
            RunOutput::List(items) => items,
            RunOutput::Text(text) => parse_prompt_list(&text)?,
        };

        let prompts: Vec<TestPrompt> = items
            .iter()
            .map(|item| normalize_prompt(item))
            .filter(|text| !text.is_empty())
            .take(desired_count)
            .enumerate()
            .map(|(i, text)| TestPrompt::new(i as u32 + 1, text))
            .collect();

        if prompts.is_empty() {
            return Err(ProviderError::malformed(SERVICE, "result contained no prompts"));
        }
        if prompts.len() < desired_count {
            tracing::debug!(
                requested = desired_count,
                received = prompts.len(),
                "prompt service under-delivered"
            );
        }
        Ok(prompts)
    }
}

/// Find the first JSON array in free text and read it as strings.
fn parse_prompt_list(raw: &str) -> Result<Vec<String>, ProviderError> {
    let json = extract_json_array(raw)
        .ok_or_else(|| ProviderError::malformed(SERVICE, "no JSON array in result"))?;
    let values: Vec<serde_json::Value> = serde_json::from_str(json)
        .map_err(|e| ProviderError::malformed(SERVICE, format!("Invalid JSON array: {e}")))?;
    Ok(values
        .into_iter()
        .map(|v| match v {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .collect())
}

/// Slice out the first balanced `[...]`, skipping brackets inside strings.
pub(crate) fn extract_json_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let remainder = &raw[start..];
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in remainder.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&remainder[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Trim and drop blank lines so a prompt never contains the separator.
fn normalize_prompt(text: &str) -> String {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

// =============================================================================
// Joined form
// =============================================================================

/// Join prompts into the editable single-text form.
pub fn join_prompts(prompts: &[TestPrompt]) -> String {
    prompts
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(PROMPT_SEPARATOR)
}

/// Split edited text back into prompts, renumbering from 1.
///
/// Adding a separator while editing adds a prompt and removing one merges
/// two; blank segments are dropped.
pub fn split_prompts(text: &str) -> Vec<TestPrompt> {
    text.replace("\r\n", "\n")
        .split(PROMPT_SEPARATOR)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .enumerate()
        .map(|(i, segment)| TestPrompt::new(i as u32 + 1, segment))
        .collect()
}

// =============================================================================
// Local fallback
// =============================================================================

/// Topic-keyed placeholder prompt for callers that choose to continue
/// without the prompt service.
pub fn fallback_prompt(use_case: &str) -> String {
    let lower = use_case.to_lowercase();
    let topic = if lower.contains("math") {
        "math problem"
    } else if lower.contains("story") {
        "creative story"
    } else if lower.contains("code") {
        "coding challenge"
    } else {
        "general knowledge question"
    };
    format!(
        "Create a detailed response to the following {topic}: [Insert specific question related to {}]",
        use_case.trim()
    )
}
