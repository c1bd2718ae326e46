//! Workflow state machine sequencing a comparison behind UI-visible stages.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crafting::{is_soft_failure, TestPrompt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Initial,
    PromptReady,
    Testing,
    Complete,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowState::Initial => "initial",
            WorkflowState::PromptReady => "prompt_ready",
            WorkflowState::Testing => "testing",
            WorkflowState::Complete => "complete",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("cannot {action} from state {from}")]
    IllegalTransition {
        from: WorkflowState,
        action: &'static str,
    },
    #[error("prompt generation produced no prompts")]
    NoPrompts,
    #[error("prompt generation failed")]
    PromptGenerationFailed,
    #[error("at least one model must be selected")]
    NoModelsSelected,
    #[error("prompt text is empty")]
    EmptyPromptText,
}

#[derive(Debug, Clone, Default)]
pub struct Workflow {
    state: WorkflowState,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    fn require(&self, allowed: &[WorkflowState], action: &'static str) -> Result<(), WorkflowError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(WorkflowError::IllegalTransition {
                from: self.state,
                action,
            })
        }
    }

    /// `Initial -> PromptReady` once crafting yields usable prompts. Also
    /// accepted from `PromptReady` to replace regenerated prompts.
    pub fn prompts_ready(&mut self, prompts: &[TestPrompt]) -> Result<(), WorkflowError> {
        self.require(
            &[WorkflowState::Initial, WorkflowState::PromptReady],
            "accept prompts",
        )?;
        if prompts.is_empty() {
            return Err(WorkflowError::NoPrompts);
        }
        if is_soft_failure(prompts) {
            return Err(WorkflowError::PromptGenerationFailed);
        }
        self.state = WorkflowState::PromptReady;
        Ok(())
    }

    /// `PromptReady -> Testing`, guarded by a model selection and prompt text.
    pub fn submit(&mut self, model_count: usize, prompt_text: &str) -> Result<(), WorkflowError> {
        self.require(&[WorkflowState::PromptReady], "submit")?;
        if model_count == 0 {
            return Err(WorkflowError::NoModelsSelected);
        }
        if prompt_text.trim().is_empty() {
            return Err(WorkflowError::EmptyPromptText);
        }
        self.state = WorkflowState::Testing;
        Ok(())
    }

    /// `Testing -> Complete` once the run resolves, whatever its failures.
    pub fn run_resolved(&mut self) -> Result<(), WorkflowError> {
        self.require(&[WorkflowState::Testing], "complete run")?;
        self.state = WorkflowState::Complete;
        Ok(())
    }

    /// `Testing -> PromptReady` when the run was rejected as invalid input.
    pub fn run_rejected(&mut self) -> Result<(), WorkflowError> {
        self.require(&[WorkflowState::Testing], "reject run")?;
        self.state = WorkflowState::PromptReady;
        Ok(())
    }

    /// `Complete -> PromptReady` to edit or regenerate prompts.
    pub fn edit(&mut self) -> Result<(), WorkflowError> {
        self.require(&[WorkflowState::Complete], "edit")?;
        self.state = WorkflowState::PromptReady;
        Ok(())
    }

    /// `PromptReady -> Initial`.
    pub fn back(&mut self) -> Result<(), WorkflowError> {
        self.require(&[WorkflowState::PromptReady], "go back")?;
        self.state = WorkflowState::Initial;
        Ok(())
    }

    /// Start over. Refused while `Testing`: a started run always completes.
    pub fn reset(&mut self) -> Result<(), WorkflowError> {
        self.require(
            &[
                WorkflowState::Initial,
                WorkflowState::PromptReady,
                WorkflowState::Complete,
            ],
            "reset",
        )?;
        self.state = WorkflowState::Initial;
        Ok(())
    }
}
