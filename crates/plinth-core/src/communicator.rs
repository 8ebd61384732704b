//! Answer backends for a [`QuestionFlow`](crate::flow::QuestionFlow).
//!
//! The flow never talks to the user directly. It hands a [`Prompt`] to a
//! communicator, which may ask interactively (see `tui::InteractiveCommunicator`),
//! fall back to defaults, or replay answers recorded earlier.

use crate::error::{Result, ScaffoldError};
use crate::question::Prompt;
use anyhow::Context;
use serde_json::{Map, Value};
use std::path::Path;

/// Produces the raw answer for a prompt.
pub trait Communicator {
    fn ask(&mut self, prompt: &Prompt<'_>, name: Option<&str>) -> Result<Value>;
}

impl<C: Communicator + ?Sized> Communicator for Box<C> {
    fn ask(&mut self, prompt: &Prompt<'_>, name: Option<&str>) -> Result<Value> {
        (**self).ask(prompt, name)
    }
}

/// Answers every prompt with its default. Used for non-interactive runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultsCommunicator;

impl Communicator for DefaultsCommunicator {
    fn ask(&mut self, prompt: &Prompt<'_>, _name: Option<&str>) -> Result<Value> {
        Ok(prompt.default.clone())
    }
}

/// Answers from a pre-computed map; a named prompt without an entry fails.
#[derive(Debug, Clone, Default)]
pub struct AnswersCommunicator {
    answers: Map<String, Value>,
}

impl AnswersCommunicator {
    pub fn new(answers: Map<String, Value>) -> Self {
        Self { answers }
    }

    /// Load answers from a JSON object file.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read answers file {}", path.display()))?;
        let answers: Map<String, Value> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse answers file {}", path.display()))?;
        Ok(Self::new(answers))
    }
}

impl Communicator for AnswersCommunicator {
    fn ask(&mut self, prompt: &Prompt<'_>, name: Option<&str>) -> Result<Value> {
        let Some(name) = name else {
            return Ok(prompt.default.clone());
        };
        self.answers
            .get(name)
            .cloned()
            .ok_or_else(|| ScaffoldError::MissingAnswer {
                name: name.to_string(),
            })
    }
}

/// Replays known answers and delegates everything else.
///
/// Used to resume a run from a recovery cache.
pub struct PrefilledCommunicator<C> {
    answers: Map<String, Value>,
    fallback: C,
}

impl<C: Communicator> PrefilledCommunicator<C> {
    pub fn new(answers: Map<String, Value>, fallback: C) -> Self {
        Self { answers, fallback }
    }
}

impl<C: Communicator> Communicator for PrefilledCommunicator<C> {
    fn ask(&mut self, prompt: &Prompt<'_>, name: Option<&str>) -> Result<Value> {
        if let Some(value) = name.and_then(|name| self.answers.get(name)) {
            tracing::debug!(question = name, "replaying cached answer");
            return Ok(value.clone());
        }
        self.fallback.ask(prompt, name)
    }
}
