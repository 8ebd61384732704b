//! Drives questions through a communicator into an [`AnswerStore`].

use crate::answers::AnswerStore;
use crate::communicator::Communicator;
use crate::defaults::{DefaultSpec, DefaultValueResolver};
use crate::error::{Result, ScaffoldError};
use crate::question::{Prompt, Question};
use serde_json::{Map, Value};

/// One question-asking session.
///
/// Owns the answers recorded during the run; named questions may only be
/// answered once. Profile-level defaults take precedence over a question's own
/// default and go through the same `@` expression handling as variables.
pub struct QuestionFlow<'a> {
    answers: AnswerStore,
    resolver: DefaultValueResolver<'a>,
    communicator: &'a mut dyn Communicator,
    overrides: &'a Map<String, Value>,
    skip_optional: bool,
    configurator: Option<String>,
}

impl<'a> QuestionFlow<'a> {
    pub fn new(
        resolver: DefaultValueResolver<'a>,
        communicator: &'a mut dyn Communicator,
        overrides: &'a Map<String, Value>,
        skip_optional: bool,
    ) -> Self {
        Self {
            answers: AnswerStore::new(),
            resolver,
            communicator,
            overrides,
            skip_optional,
            configurator: None,
        }
    }

    /// Ask `question`, storing the result under `name` when given.
    pub fn communicate(&mut self, name: Option<&str>, question: Question) -> Result<Value> {
        if let Some(name) = name {
            if self.answers.has(name) {
                return Err(ScaffoldError::DuplicateAnswer {
                    name: name.to_string(),
                });
            }
        }

        let default = self.resolve_default(name, &question.default)?;

        let raw = if self.skip_optional && question.optional {
            tracing::debug!(question = name, "optional question skipped");
            default
        } else {
            let prompt = Prompt {
                question: &question,
                default,
            };
            self.communicator.ask(&prompt, name)?
        };

        let Some(name) = name else {
            return Ok(raw);
        };

        let validated = question
            .validate(&raw)
            .map_err(|message| ScaffoldError::Validation {
                question: name.to_string(),
                configurator: self.configurator.clone(),
                message,
            })?;
        let stored = question.normalize(validated);
        self.answers.set(name, raw, stored)
    }

    /// Record a value without prompting.
    pub fn set(&mut self, name: &str, value: Value) -> Result<Value> {
        self.answers.set(name, value.clone(), value)
    }

    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    pub fn resolver(&self) -> &DefaultValueResolver<'a> {
        &self.resolver
    }

    pub fn skips_optional(&self) -> bool {
        self.skip_optional
    }

    /// Tag subsequent validation failures with the running configurator.
    pub fn enter_configurator(&mut self, id: &str) {
        self.configurator = Some(id.to_string());
    }

    pub fn leave_configurator(&mut self) {
        self.configurator = None;
    }

    /// Consume the flow and hand back the recorded answers.
    pub fn into_answers(self) -> AnswerStore {
        self.answers
    }

    fn resolve_default(&self, name: Option<&str>, own: &DefaultSpec) -> Result<Value> {
        match name.and_then(|name| self.overrides.get(name)) {
            Some(raw) => self.resolver.resolve_value(raw, &self.answers),
            None => self.resolver.resolve(own, &self.answers),
        }
    }
}
