//! Question definitions built by configurators.

use crate::defaults::DefaultSpec;
use serde_json::Value;
use std::fmt;

/// Turns a raw answer into a validated one, or explains why it is rejected.
pub type Validator = Box<dyn Fn(&Value) -> Result<Value, String>>;

/// Turns a validated answer into the value that gets stored.
pub type Normalizer = Box<dyn Fn(Value) -> Value>;

/// Shape of the expected answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    Text,
    Choice,
    MultiChoice,
    Confirm,
}

/// A single prompt specification.
pub struct Question {
    pub label: String,
    pub kind: QuestionKind,
    pub choices: Vec<String>,
    pub default: DefaultSpec,
    pub validator: Option<Validator>,
    pub normalizer: Option<Normalizer>,
    pub optional: bool,
    pub help: Option<String>,
}

impl Question {
    fn new(label: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            label: label.into(),
            kind,
            choices: Vec::new(),
            default: DefaultSpec::default(),
            validator: None,
            normalizer: None,
            optional: false,
            help: None,
        }
    }

    /// Free-text question.
    pub fn text(label: impl Into<String>) -> Self {
        Self::new(label, QuestionKind::Text)
    }

    /// Yes/no question.
    pub fn confirm(label: impl Into<String>) -> Self {
        Self::new(label, QuestionKind::Confirm)
    }

    /// Single choice among `choices`; the answer must be one of them.
    pub fn choice<I, S>(label: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut question = Self::new(label, QuestionKind::Choice);
        question.choices = choices.into_iter().map(Into::into).collect();
        question
    }

    /// Any subset of `choices`.
    pub fn multi_choice<I, S>(label: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut question = Self::new(label, QuestionKind::MultiChoice);
        question.choices = choices.into_iter().map(Into::into).collect();
        question
    }

    pub fn with_default(mut self, default: impl Into<DefaultSpec>) -> Self {
        self.default = default.into();
        self
    }

    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + 'static,
    {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn with_normalizer<F>(mut self, normalizer: F) -> Self
    where
        F: Fn(Value) -> Value + 'static,
    {
        self.normalizer = Some(Box::new(normalizer));
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Run the built-in kind check followed by the custom validator.
    pub fn validate(&self, raw: &Value) -> Result<Value, String> {
        let checked = self.check_kind(raw)?;
        match &self.validator {
            Some(validator) => validator(&checked),
            None => Ok(checked),
        }
    }

    /// Apply the normalizer, if any.
    pub fn normalize(&self, value: Value) -> Value {
        match &self.normalizer {
            Some(normalizer) => normalizer(value),
            None => value,
        }
    }

    fn check_kind(&self, raw: &Value) -> Result<Value, String> {
        match (self.kind, raw) {
            (_, Value::Null) if self.optional => Ok(Value::Null),
            (QuestionKind::Text, Value::String(_) | Value::Number(_) | Value::Bool(_)) => {
                Ok(raw.clone())
            }
            (QuestionKind::Text, Value::Null) => Err("a value is required".to_string()),
            (QuestionKind::Confirm, Value::Bool(_)) => Ok(raw.clone()),
            (QuestionKind::Confirm, Value::String(text)) => parse_bool(text)
                .map(Value::Bool)
                .ok_or_else(|| format!("expected yes or no, got \"{}\"", text)),
            (QuestionKind::Choice, Value::String(text)) => {
                if self.choices.iter().any(|c| c == text) {
                    Ok(raw.clone())
                } else {
                    Err(format!(
                        "\"{}\" is not one of: {}",
                        text,
                        self.choices.join(", ")
                    ))
                }
            }
            (QuestionKind::MultiChoice, Value::Array(items)) => {
                for item in items {
                    let known = item
                        .as_str()
                        .is_some_and(|text| self.choices.iter().any(|c| c == text));
                    if !known {
                        return Err(format!(
                            "{} is not one of: {}",
                            item,
                            self.choices.join(", ")
                        ));
                    }
                }
                Ok(raw.clone())
            }
            (kind, other) => Err(format!("unexpected value {} for a {:?} question", other, kind)),
        }
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "y" | "yes" | "true" | "1" => Some(true),
        "n" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

impl fmt::Debug for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Question")
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("choices", &self.choices)
            .field("default", &self.default)
            .field("optional", &self.optional)
            .field("help", &self.help)
            .finish_non_exhaustive()
    }
}

/// A question bound to its resolved default, as shown to a communicator.
#[derive(Debug)]
pub struct Prompt<'q> {
    pub question: &'q Question,
    pub default: Value,
}

impl Prompt<'_> {
    /// Default rendered as text input, if it has a textual form.
    pub fn default_text(&self) -> Option<String> {
        match &self.default {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Default selections for a multi-choice question.
    pub fn default_choices(&self) -> Vec<String> {
        match &self.default {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            Value::String(s) => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}
