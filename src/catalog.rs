//! Provider catalog: the fixed set of models a comparison can target.

use serde::{Deserialize, Serialize};

use crate::error::AdvisorError;

/// A candidate model. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    /// Stable catalog id, used to group results.
    pub id: String,
    pub display_name: String,
    pub provider: String,
    /// Model id understood by the inference gateway.
    pub inference_id: String,
}

impl ModelDescriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        provider: impl Into<String>,
        inference_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            provider: provider.into(),
            inference_id: inference_id.into(),
        }
    }
}

const DEFAULT_MODELS: &[(&str, &str, &str, &str)] = &[
    ("gpt-4-turbo", "GPT-4 Turbo", "OpenAI", "openai/gpt-4-turbo"),
    ("claude-3-opus", "Claude 3 Opus", "Anthropic", "anthropic/claude-3-opus"),
    ("gemini-pro", "Gemini Pro", "Google", "google/gemini-pro"),
    ("llama-3-70b", "Llama 3 70B", "Meta", "meta-llama/llama-3-70b-instruct"),
    ("gpt-3.5-turbo", "GPT-3.5 Turbo", "OpenAI", "openai/gpt-3.5-turbo"),
    ("mistral-7b", "Mistral 7B", "Mistral AI", "mistralai/mistral-7b-instruct"),
];

/// The built-in catalog, in display order.
pub fn default_catalog() -> Vec<ModelDescriptor> {
    DEFAULT_MODELS
        .iter()
        .map(|(id, name, provider, inference_id)| {
            ModelDescriptor::new(*id, *name, *provider, *inference_id)
        })
        .collect()
}

pub fn find<'a>(catalog: &'a [ModelDescriptor], id: &str) -> Option<&'a ModelDescriptor> {
    catalog.iter().find(|m| m.id == id)
}

/// Select models by id. The result keeps catalog order regardless of the
/// order of `ids`; duplicates collapse. An unknown id is rejected.
pub fn select<S: AsRef<str>>(
    catalog: &[ModelDescriptor],
    ids: &[S],
) -> Result<Vec<ModelDescriptor>, AdvisorError> {
    if let Some(unknown) = ids.iter().find(|id| find(catalog, id.as_ref()).is_none()) {
        return Err(AdvisorError::invalid_input(format!(
            "unknown model id: {}",
            unknown.as_ref()
        )));
    }

    Ok(catalog
        .iter()
        .filter(|m| ids.iter().any(|id| id.as_ref() == m.id))
        .cloned()
        .collect())
}

/// Reorder `models` into catalog order. Models missing from the catalog
/// keep their relative order after the known ones.
pub fn sort_by_catalog(models: &mut [ModelDescriptor], catalog: &[ModelDescriptor]) {
    models.sort_by_key(|m| {
        catalog
            .iter()
            .position(|c| c.id == m.id)
            .unwrap_or(usize::MAX)
    });
}
